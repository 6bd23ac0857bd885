//! HTTP application object served by the container entry point.

use crate::config::Settings;
use crate::utils::error::{DataError, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const HOME_MESSAGE: &str = "Diamond Data Application is running.";

pub const NOT_FOUND_MESSAGE: &str = "404 Not Found: The requested URL was not found on the server. \
If you entered the URL manually please check your spelling and try again.";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str =
    "405 Method Not Allowed: The method is not allowed for the requested URL.";

/// Every error, routing errors included, becomes a 500 with the message as plain text.
#[derive(Debug)]
pub struct AppError {
    message: String,
}

impl AppError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DataError> for AppError {
    fn from(error: DataError) -> Self {
        Self::new(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("An error occurred: {}", self.message);
        (StatusCode::INTERNAL_SERVER_ERROR, self.message).into_response()
    }
}

async fn home() -> &'static str {
    tracing::info!("Home endpoint accessed");
    HOME_MESSAGE
}

async fn not_found() -> AppError {
    AppError::new(NOT_FOUND_MESSAGE)
}

async fn method_not_allowed() -> AppError {
    AppError::new(METHOD_NOT_ALLOWED_MESSAGE)
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(home).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// Binds `host:port` and serves [`app`] until Ctrl+C / SIGTERM.
pub async fn serve(settings: &Settings) -> Result<()> {
    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_is_plain_500() {
        let response = AppError::from(DataError::processing("database unavailable")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
    }
}
