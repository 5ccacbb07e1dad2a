//! Query cache: keyed, stale-while-revalidate reads and invalidating mutations.

mod client;
mod clock;
mod key;
mod state;

pub use client::{CacheEvent, Query, QueryClient, QueryWatcher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::QueryKey;
pub use state::{QueryState, QueryStatus};
