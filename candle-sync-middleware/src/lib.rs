//! Request budget enforcement and fetcher wrappers for candle-sync.
//!
//! - [`TokenBucketLimiter`]: FIFO-fair token bucket implementing the
//!   `RateLimiter` contract, with an optional private-tier budget.
//! - [`TimeoutFetcher`]: bounds every upstream fetch, mapping an elapsed
//!   timeout to a transient failure.
#![warn(missing_docs)]

mod limiter;
mod timeout;

pub use limiter::TokenBucketLimiter;
pub use timeout::TimeoutFetcher;
