//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep [`HandledError`] HTTP-agnostic while letting Actix handlers
//! turn failures into consistent JSON responses and status codes.
//! Client-facing kinds are shown verbatim; every other kind is masked.

use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use tracing::{error, warn};

use super::context::{HttpContext, REQUEST_ID_HEADER};
use crate::domain::{Cause, ErrorCode, ErrorInfo, ErrorKind, HandledError};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Message shown instead of internal error text.
pub const MASKED_MESSAGE: &str = "Internal Server error";

/// Non-standard status for requests the client abandoned.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Status code for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
        ErrorKind::IncorrectInput => StatusCode::BAD_REQUEST,
        ErrorKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ContextCancelled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
        }
        ErrorKind::Unknown | ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Error message, masked for internal failures.
    pub error: String,
    /// Stable machine-readable code.
    pub error_code: String,
    /// Correlation id of the failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Per-field validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorInfo>>,
}

impl ErrorBody {
    /// Body for `err`, masked unless its kind is client-facing.
    pub fn from_error(err: &HandledError, request_id: Option<&str>) -> Self {
        let request_id = request_id.filter(|id| !id.is_empty()).map(str::to_owned);
        if !err.is_client_facing() {
            return Self {
                error: MASKED_MESSAGE.to_owned(),
                error_code: ErrorCode::INTERNAL_ERROR.as_str().to_owned(),
                request_id,
                errors: None,
            };
        }
        Self {
            error: err.message().to_owned(),
            error_code: err.code().as_str().to_owned(),
            request_id,
            errors: (!err.details().is_empty()).then(|| err.details().to_vec()),
        }
    }
}

/// A [`HandledError`] tied to the request it failed.
#[derive(Debug, Clone)]
pub struct ApiError {
    error: HandledError,
    request_id: Option<String>,
}

impl ApiError {
    /// Attach the request id carried by `ctx`.
    pub fn new(error: HandledError, ctx: &HttpContext) -> Self {
        let request_id = ctx.request_id();
        Self {
            error,
            request_id: (!request_id.is_empty()).then(|| request_id.to_owned()),
        }
    }

    /// The wrapped error.
    pub fn error(&self) -> &HandledError {
        &self.error
    }

    /// JSON payload failures become `IncorrectInput`.
    ///
    /// Used as the `JsonConfig` error handler.
    pub fn from_payload(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
        let ctx = HttpContext::from_request_head(req);
        let handled = HandledError::incorrect_input(
            Cause::message(err.to_string()),
            format!("invalid request body: {err}"),
            ErrorCode::INVALID_REQUEST,
        );
        Self::new(handled, &ctx).into()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        status_for(self.error.kind())
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let request_id = self.request_id.as_deref().unwrap_or_default();
        if status.is_server_error() {
            error!(
                status = status.as_u16(),
                error = %self.error,
                error_kind = %self.error.kind(),
                request_id,
                "request failed"
            );
        } else {
            warn!(
                status = status.as_u16(),
                error = %self.error,
                error_kind = %self.error.kind(),
                request_id,
                "request rejected"
            );
        }

        let mut builder = HttpResponse::build(status);
        if let Some(value) = self
            .request_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            builder.insert_header((HeaderName::from_static(REQUEST_ID_HEADER), value));
        }
        builder.json(ErrorBody::from_error(
            &self.error,
            self.request_id.as_deref(),
        ))
    }
}
