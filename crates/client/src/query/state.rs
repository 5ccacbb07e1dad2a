use campus_shared::ApiError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing cached and nothing in flight (e.g. a disabled query).
    Idle,
    /// First fetch in flight.
    Loading,
    Success,
    /// The last fetch failed. `data` may still hold an older value.
    Error,
}

/// What a hook hands back to its caller: data, error and fetch flags in one
/// shape. Errors land here instead of being raised.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub updated_at: Option<DateTime<Utc>>,
    /// Consecutive failed fetches for this key.
    pub failure_count: u32,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_stale: true,
            is_fetching: false,
            updated_at: None,
            failure_count: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            status: self.status,
            data: self.data.map(f),
            error: self.error,
            is_stale: self.is_stale,
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
            failure_count: self.failure_count,
        }
    }
}
