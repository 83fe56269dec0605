//! HTTP error mapping

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use camera_session::{ErrorKind, SessionError};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Errors returned by route handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Session(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::State => match err {
                    SessionError::AlreadyRecording | SessionError::NotRecording => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::SERVICE_UNAVAILABLE,
                },
                ErrorKind::Hardware | ErrorKind::Process | ErrorKind::FileIo => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!("Request failed ({}): {}", status, self);
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the API error body
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(SessionError::CameraNotFound(3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SessionError::AlreadyRecording).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SessionError::NothingToUpdate).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(SessionError::NoFrame).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(SessionError::Process("died".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
