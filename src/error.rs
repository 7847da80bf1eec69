use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed candle at {timestamp}: {reason}")]
    MalformedCandle { timestamp: i64, reason: String },

    #[error("unsupported interval: {0}")]
    UnsupportedInterval(String),

    #[error("exchange API error ({status}): {msg}")]
    ExchangeApi { status: String, msg: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Recover a typed error from an adapter's `anyhow` chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let err = match err.downcast::<AppError>() {
            Ok(app) => return app,
            Err(err) => err,
        };
        match err.downcast::<reqwest::Error>() {
            Ok(http) => Self::Http(http),
            Err(err) => Self::Other(err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::MalformedCandle { .. } | Self::UnsupportedInterval(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::ExchangeApi { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Json(_) | Self::Storage(_) | Self::Io(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_map_to_bad_request() {
        assert_eq!(
            AppError::invalid_argument("period must be > 0").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnsupportedInterval("minutes/7".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let err = AppError::ExchangeApi {
            status: "5600".to_string(),
            msg: "market not found".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "exchange API error (5600): market not found");
    }

    #[test]
    fn from_anyhow_keeps_typed_variant() {
        let err: anyhow::Error = AppError::UnsupportedInterval("binance minutes/10".into()).into();
        assert!(matches!(
            AppError::from_anyhow(err),
            AppError::UnsupportedInterval(_)
        ));
        let other = AppError::from_anyhow(anyhow::anyhow!("socket closed"));
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.to_string(), "socket closed");
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        assert_eq!(
            AppError::NotFound("coin KRW-XYZ".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn venue_gaps_map_to_not_implemented() {
        let err: anyhow::Error = AppError::Unsupported("binance market list".into()).into();
        assert_eq!(
            AppError::from_anyhow(err).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
    }
}
