//! Disbursement endpoints.
//!
//! ```text
//! POST /api/v1/disburse {"amount":100.0}
//! ```

use actix_web::{HttpResponse, post, web};
use serde::Serialize;

use super::context::HttpContext;
use super::error::{ApiError, ApiResult};
use super::state::HttpState;
use crate::domain::DisburseCommand;
use crate::domain::cqrs::Handler;

/// Success body for `POST /api/v1/disburse`.
#[derive(Debug, Serialize)]
pub struct DisburseResponse {
    /// Confirmation text.
    pub message: &'static str,
}

/// Record a disbursement.
///
/// Responds 201 on success; failures follow the shared error mapping.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use disbursement::inbound::http::disbursements::disburse;
///
/// let app = App::new().service(web::scope("/api/v1").service(disburse));
/// # let _ = app;
/// ```
#[post("/disburse")]
pub async fn disburse(
    ctx: HttpContext,
    state: web::Data<HttpState>,
    payload: web::Json<DisburseCommand>,
) -> ApiResult<HttpResponse> {
    state
        .app
        .commands
        .disburse
        .handle(&ctx, payload.into_inner())
        .await
        .map_err(|err| ApiError::new(err, &ctx))?;
    Ok(HttpResponse::Created().json(DisburseResponse {
        message: "disbursement created",
    }))
}
