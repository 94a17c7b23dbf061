//! RPC entry point for disbursements.

use serde::{Deserialize, Serialize};
use tonic::{Request, Status};

use super::metadata::context_from_metadata;
use super::status::to_status;
use crate::app::Application;
use crate::domain::cqrs::Handler;
use crate::domain::{Context, DisburseCommand, RequestId};

/// Wire message for the `Disburse` method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisburseRequest {
    /// Amount to disburse; must be positive.
    pub amount: f64,
}

/// RPC service backed by the application's decorated handlers.
#[derive(Clone)]
pub struct DisbursementRpc {
    app: Application,
}

impl DisbursementRpc {
    /// Serve `app` over RPC.
    pub fn new(app: Application) -> Self {
        Self { app }
    }

    /// Record a disbursement.
    ///
    /// The context is rebuilt from the request metadata; a request id is
    /// generated when the caller sent none.
    ///
    /// # Errors
    ///
    /// Returns the status mapped from the handler's error kind.
    pub async fn disburse(&self, request: Request<DisburseRequest>) -> Result<(), Status> {
        let ctx = context_from_metadata(&Context::background(), request.metadata());
        let ctx = if ctx.request_id().is_empty() {
            ctx.with_request_id(&RequestId::generate())
        } else {
            ctx
        };
        let DisburseRequest { amount } = request.into_inner();

        self.app
            .commands
            .disburse
            .handle(&ctx, DisburseCommand { amount })
            .await
            .map_err(|err| to_status(&err))
    }
}
