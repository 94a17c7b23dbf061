//! HTTP inbound adapter exposing REST endpoints.

pub mod context;
pub mod disbursements;
pub mod error;
pub mod state;

use actix_web::web;

pub use context::{HttpContext, REQUEST_ID_HEADER, RequestContext};
pub use error::{ApiError, ApiResult};
pub use state::HttpState;

/// JSON extractor configuration mapping decode failures to `IncorrectInput`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(ApiError::from_payload)
}

/// Register the `/api/v1` routes.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use disbursement::inbound::http::configure;
///
/// let app = App::new().service(web::scope("/api/v1").configure(configure));
/// # let _ = app;
/// ```
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(disbursements::disburse);
}
