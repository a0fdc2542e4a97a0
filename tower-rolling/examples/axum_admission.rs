use axum::{
    Router, error_handling::HandleErrorLayer, http::HeaderName, http::StatusCode,
    response::IntoResponse, routing::get,
};
use rolling_limit::{LimiterConfig, MemoryStore, RollingWindow, TracingSink, WindowSettings};
use std::sync::Arc;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_rolling::{AdmissionError, AdmissionLayer, FailedResponse, HeaderKeyResolver};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Setup Limiter: 10 requests per client per minute
    let config = LimiterConfig {
        limit: 10,
        interval_secs: 60.0,
    };
    let settings = WindowSettings::try_from(config)?;
    let limiter = Arc::new(RollingWindow::new(
        settings,
        Arc::new(MemoryStore::new()),
        Arc::new(TracingSink),
    ));

    // 2. Setup Admission Layer keyed on the API key header
    let admission = AdmissionLayer::new(limiter, FailedResponse::too_many_requests())
        .with_resolver(
            HeaderKeyResolver::new(HeaderName::from_static("x-api-key")).with_namespace("api"),
        );

    // 3. Build the Router
    let app = Router::new()
        .route("/", get(|| async { "Hello, Rolling!" }))
        .layer(
            ServiceBuilder::new()
                // Turns limiter defects back into responses
                .layer(HandleErrorLayer::new(handle_admission_error))
                .layer(admission)
                // Route is Infallible; the admission service speaks BoxError
                .map_err(BoxError::from),
        );

    // 4. Serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on http://127.0.0.1:3000");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_admission_error(err: BoxError) -> impl IntoResponse {
    if let Some(admission_err) = err.downcast_ref::<AdmissionError>() {
        admission_err.clone().into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Service Error").into_response()
    }
}
