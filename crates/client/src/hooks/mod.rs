//! Domain hooks over the query cache.
//!
//! Every read hook comes in two forms: `*_query` builds the [`Query`]
//! descriptor (key, staleness window, enabled guard and fetch), and `use_*`
//! runs it through the context's cache. Mutation hooks call the API, then
//! invalidate the key prefixes whose data the write could have staled.
//!
//! ```rust,ignore
//! // First call fetches; repeat calls inside five minutes are served from cache.
//! let courses = use_courses(&ctx, CourseFilter { is_public: Some(true), ..Default::default() }).await;
//!
//! // Keep a list live while a screen shows it.
//! let notes = ctx.queries.watch(notes_query(&ctx, NoteFilter::default()));
//! create_note(&ctx, &NewNote { title: "A".into(), ..Default::default() }).await?;
//! assert!(notes.state().data.unwrap().iter().any(|n| n.title == "A"));
//! ```

pub mod assignments;
pub mod courses;
pub mod notes;
pub mod notifications;
pub mod quizzes;
pub mod tracks;

pub use assignments::*;
pub use courses::*;
pub use notes::*;
pub use notifications::*;
pub use quizzes::*;
pub use tracks::*;

use std::future::Future;
use std::time::Duration;

use campus_shared::ApiError;

use crate::query::{Query, QueryKey};

/// Bind a query key to a call on a cloned domain API.
fn api_query<A, T, F, Fut>(key: QueryKey, stale_time: Duration, api: &A, call: F) -> Query<T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    let api = api.clone();
    Query::new(key, move || call(api.clone())).stale_time(stale_time)
}

/// A query whose required id is still unknown: never fetched.
fn missing<T>(what: &str) -> Result<T, ApiError> {
    Err(ApiError::InvalidRequest(format!("{what} is required")))
}
