//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on the decorated application handlers and remain testable without I/O.

use crate::app::Application;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Decorated handlers.
    pub app: Application,
}

impl HttpState {
    /// Wrap the application for the HTTP adapter.
    pub fn new(app: Application) -> Self {
        Self { app }
    }
}
