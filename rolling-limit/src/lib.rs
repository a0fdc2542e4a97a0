//! # rolling-limit
//!
//! `rolling-limit` decides whether an actor, identified by a string key, may
//! perform its next action under a rolling time-window quota that is shared by
//! every process talking to the same store.
//!
//! ## Core Philosophy
//!
//! The limiter keeps no state and takes no locks of its own. Each window is a
//! sorted set of timestamps in a shared [`TimestampStore`], and every check is
//! a single store transaction (prune, read, record, refresh TTL). Per-key
//! ordering of those transactions is what keeps concurrent callers from
//! over-admitting.
//!
//! ## Key Concepts
//!
//! * **Rolling window**: the quota slides with the clock instead of resetting on
//!   fixed boundaries.
//! * **Burst guard**: a call is also denied when the most recent prior attempt
//!   is already at least 90% of the interval old.
//! * **Fail-closed**: if the store cannot be reached the call is denied.
//! * **Self-expiring**: idle windows vanish through the store's TTL.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rolling_limit::MemoryStore;
//! use rolling_limit::RollingWindow;
//! use rolling_limit::TracingSink;
//! use rolling_limit::WindowSettings;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let settings = WindowSettings::new(NonZeroUsize::new(100).unwrap(), Duration::from_secs(60))
//!     .unwrap();
//! let limiter = RollingWindow::new(settings, Arc::new(MemoryStore::new()), Arc::new(TracingSink));
//!
//! if limiter.allowed("api:client-42").await.unwrap() {
//!     // Request allowed
//! }
//! # }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;

use async_trait::async_trait;

mod config;
mod error;
mod log;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod rolling_window;
mod store;

pub use config::LimiterConfig;
pub use config::WindowSettings;
pub use error::LimitError;
pub use error::StoreError;
pub use log::LogSink;
pub use log::TracingSink;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use rolling_window::BURST_GUARD_FACTOR;
pub use rolling_window::RollingWindow;
pub use store::Committed;
pub use store::TimestampStore;
pub use store::Transaction;
pub use store::WindowOp;
pub use store::member_for;

/// Why a call was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The window already holds `limit` attempts.
    Exhausted,
    /// The most recent prior attempt is too old relative to the window.
    Stale,
    /// The store could not be consulted.
    Unavailable,
}

/// The seam admission layers are generic over.
///
/// Implementations must be `Send` and `Sync` so they can be shared across
/// tasks via `Arc`.
#[async_trait]
pub trait Limiter: Debug + Send + Sync {
    /// Checks and records one attempt for `key`.
    ///
    /// # Errors
    ///
    /// Only for defects; transient infrastructure failures are reported as
    /// `Break(Reason::Unavailable)`.
    async fn process(&self, key: &str) -> Result<ControlFlow<Reason>, LimitError>;
}
