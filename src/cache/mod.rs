//! Cache module for memoizing query results in memory
//!
//! This module provides a keyed cache whose entries expire after a fixed TTL
//! (60 seconds by default) and can be cleared in one call when a write makes
//! cached reads stale. The time source is injectable so expiry can be tested
//! without sleeping.

mod clock;
mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use query::{cache_key, QueryCache, DEFAULT_TTL_SECS};
