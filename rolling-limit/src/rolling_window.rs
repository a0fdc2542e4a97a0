use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use quanta::Clock;
use quanta::Instant;
use tokio::time::timeout;
use tracing::Level;

use super::Limiter;
use super::Reason;
use crate::config::WindowSettings;
use crate::error::LimitError;
use crate::error::StoreError;
use crate::log::LogSink;
use crate::store::Committed;
use crate::store::TimestampStore;
use crate::store::Transaction;

/// Share of the interval after which the most recent prior attempt counts as
/// stale.
pub const BURST_GUARD_FACTOR: f64 = 0.9;

/// A rolling-window limiter backed by a shared [`TimestampStore`].
///
/// Every check prunes the key's window, reads what is left, records the
/// current attempt and refreshes the window's TTL, all inside one store
/// transaction. The decision is then made from the elements read *before* the
/// insert:
///
/// * deny if there are already `limit` elements in the window;
/// * deny if the newest of them is at least `0.9 * interval` old;
/// * allow otherwise.
///
/// The attempt is recorded whatever the outcome, so denied calls keep
/// consuming quota. If the store cannot be reached the call is denied.
#[derive(Debug)]
pub struct RollingWindow<S>
where
    S: ?Sized,
{
    limit: usize,
    interval: Duration,
    store: Arc<S>,
    logger: Arc<dyn LogSink>,
    timeout: Option<Duration>,
    clock: Option<AnchoredClock>,
}

/// A quanta clock pinned to the wall-clock reading taken when it was installed.
#[derive(Debug)]
struct AnchoredClock {
    clock: Clock,
    anchor: Instant,
    anchor_secs: f64,
}

impl AnchoredClock {
    fn new(clock: Clock) -> Self {
        Self {
            anchor: clock.now(),
            clock,
            anchor_secs: epoch_seconds(),
        }
    }

    fn now(&self) -> f64 {
        self.anchor_secs + self.clock.now().duration_since(self.anchor).as_secs_f64()
    }
}

impl<S> RollingWindow<S>
where
    S: TimestampStore + ?Sized,
{
    pub fn new(settings: WindowSettings, store: Arc<S>, logger: Arc<dyn LogSink>) -> Self {
        Self {
            limit: settings.limit().get(),
            interval: settings.interval(),
            store,
            logger,
            timeout: None,
            clock: None,
        }
    }

    /// Bound each store round trip. An elapsed timeout denies the call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Drive [`RollingWindow::now`] from `clock` instead of the system clock.
    ///
    /// The wall-clock reading taken here becomes the anchor; only the elapsed
    /// time since then comes from `clock`. Meant for `Clock::mock()` in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(AnchoredClock::new(clock));
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current time in seconds since the Unix epoch.
    ///
    /// Read from the system clock on every call, so steps of the wall clock
    /// are picked up and timestamps agree with other processes.
    pub fn now(&self) -> f64 {
        match &self.clock {
            Some(clock) => clock.now(),
            None => epoch_seconds(),
        }
    }

    /// Check and record an attempt for `key` at `now` (seconds since the epoch).
    ///
    /// # Errors
    ///
    /// Only [`LimitError::MissingRead`]. Store failures become
    /// `Break(Reason::Unavailable)`.
    pub async fn process_at(
        &self,
        key: &str,
        now: f64,
    ) -> Result<ControlFlow<Reason>, LimitError> {
        let interval = self.interval.as_secs_f64();
        let tx = Transaction::new(key)
            .remove_range(0.0, now - interval)
            .read_all()
            .insert(now)
            .set_expiry(self.interval);

        let committed = match self.commit(tx).await {
            Ok(committed) => committed,
            Err(err) => {
                self.logger.log(
                    Level::ERROR,
                    &format!("rate limit check for key `{key}` failed closed: {err}"),
                );
                return Ok(ControlFlow::Break(Reason::Unavailable));
            }
        };

        let Some(elements) = committed.read(0) else {
            return Err(LimitError::MissingRead {
                key: key.to_string(),
            });
        };

        let decision = decide(elements, now, self.limit, interval);
        self.logger.log(
            Level::DEBUG,
            &format!(
                "key `{key}` had {} of {} in window: {decision:?}",
                elements.len(),
                self.limit
            ),
        );
        Ok(decision)
    }

    pub async fn allowed_at(&self, key: &str, now: f64) -> Result<bool, LimitError> {
        Ok(self.process_at(key, now).await?.is_continue())
    }

    pub async fn allowed(&self, key: &str) -> Result<bool, LimitError> {
        self.allowed_at(key, self.now()).await
    }

    async fn commit(&self, tx: Transaction) -> Result<Committed, StoreError> {
        match self.timeout {
            Some(limit) => match timeout(limit, self.store.commit(tx)).await {
                Ok(res) => res,
                Err(_) => Err(StoreError::Timeout),
            },
            None => self.store.commit(tx).await,
        }
    }
}

#[async_trait]
impl<S> Limiter for RollingWindow<S>
where
    S: TimestampStore + ?Sized,
{
    async fn process(&self, key: &str) -> Result<ControlFlow<Reason>, LimitError> {
        self.process_at(key, self.now()).await
    }
}

/// Decide from the elements that were in the window before this attempt.
fn decide(elements: &[f64], now: f64, limit: usize, interval: f64) -> ControlFlow<Reason> {
    if elements.len() >= limit {
        return ControlFlow::Break(Reason::Exhausted);
    }

    let latest = elements.iter().copied().reduce(f64::max);
    if let Some(latest) = latest
        && latest <= now - interval * BURST_GUARD_FACTOR
    {
        return ControlFlow::Break(Reason::Stale);
    }

    ControlFlow::Continue(())
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
