use rolling_limit::LimitError;

/// Errors produced by the admission middleware itself.
///
/// A denial is not an error: it is answered with the configured failure
/// response. Errors from the inner service are passed through untouched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    /// The limiter hit a defect it could not turn into a decision.
    ///
    /// When the `axum` feature is enabled, this converts to `500 Internal Server Error`.
    #[error("rate limiter failed: {0}")]
    Limiter(#[from] LimitError),
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AdmissionError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
