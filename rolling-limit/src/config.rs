use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::LimitError;

/// Raw limiter settings as they appear in a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum admitted events per interval.
    pub limit: usize,
    /// Length of the rolling window in seconds. Fractions are honoured.
    pub interval_secs: f64,
}

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    limit: NonZeroUsize,
    interval: Duration,
}

impl WindowSettings {
    /// Creates settings for `limit` events per `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Config`] if `interval` is zero.
    pub fn new(limit: NonZeroUsize, interval: Duration) -> Result<Self, LimitError> {
        if interval.is_zero() {
            return Err(LimitError::Config("interval must be positive".to_string()));
        }
        Ok(Self { limit, interval })
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TryFrom<LimiterConfig> for WindowSettings {
    type Error = LimitError;

    fn try_from(config: LimiterConfig) -> Result<Self, Self::Error> {
        let limit = NonZeroUsize::new(config.limit)
            .ok_or_else(|| LimitError::Config("limit must be positive".to_string()))?;
        let interval = Duration::try_from_secs_f64(config.interval_secs).map_err(|err| {
            LimitError::Config(format!(
                "interval of {} seconds is unusable: {err}",
                config.interval_secs
            ))
        })?;
        Self::new(limit, interval)
    }
}
