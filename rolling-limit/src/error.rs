/// Failures while talking to the shared timestamp store.
///
/// Every variant is a transient infrastructure condition. [`crate::RollingWindow`]
/// absorbs them, logs them and denies the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The round trip did not complete in time.
    #[error("store round trip timed out")]
    Timeout,

    /// The connection to the store failed or was dropped.
    #[error("store transport failure: {0}")]
    Transport(String),

    /// The store answered with an error or a reply that could not be read.
    #[error("store protocol failure: {0}")]
    Protocol(String),
}

/// Errors surfaced by the limiter itself.
///
/// Store failures never show up here; they are turned into a deny decision.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LimitError {
    /// The limit or interval is unusable. Only produced at construction.
    #[error("invalid limiter configuration: {0}")]
    Config(String),

    /// A store committed the transaction but did not hand back the read it
    /// was asked for. This is a defect in the store implementation.
    #[error("store commit for `{key}` returned no read result")]
    MissingRead {
        /// The window key the transaction was scoped to.
        key: String,
    },
}
