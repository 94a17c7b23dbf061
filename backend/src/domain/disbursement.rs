//! Disbursement entity and the command that creates one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::Context;
use super::cqrs::Handler;
use super::error::{Cause, ErrorCode, ErrorInfo, HandledError};
use super::ports::DisbursementRepository;
use super::transaction::TransactionManager;

/// A payout of `amount` recorded under a fresh identifier.
///
/// ## Invariants
/// - `amount` is finite and strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disbursement {
    id: Uuid,
    amount: f64,
}

impl Disbursement {
    /// Validate `amount` and assign a new identifier.
    ///
    /// # Examples
    /// ```
    /// use disbursement::domain::{Disbursement, ErrorKind};
    ///
    /// assert!(Disbursement::new(100.0).is_ok());
    /// let err = Disbursement::new(0.0).expect_err("zero is rejected");
    /// assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    /// ```
    #[track_caller]
    pub fn new(amount: f64) -> Result<Self, HandledError> {
        Self::with_id(Uuid::new_v4(), amount)
    }

    /// Rebuild a disbursement with a known identifier.
    #[track_caller]
    pub fn with_id(id: Uuid, amount: f64) -> Result<Self, HandledError> {
        validate_amount(amount)?;
        Ok(Self { id, amount })
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Amount paid out.
    #[must_use]
    pub fn amount(&self) -> f64 {
        self.amount
    }
}

#[track_caller]
fn validate_amount(amount: f64) -> Result<(), HandledError> {
    let reason = if !amount.is_finite() {
        "must be a finite number"
    } else if amount <= 0.0 {
        "must be greater than zero"
    } else {
        return Ok(());
    };
    Err(HandledError::unprocessable_entity(
        Cause::message(format!("amount {reason}")),
        "invalid disbursement request",
        ErrorCode::INVALID_REQUEST,
        vec![ErrorInfo::new("amount", reason)],
    ))
}

/// Request to pay out `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseCommand {
    /// Amount to pay out.
    pub amount: f64,
}

/// Business logic behind [`DisburseCommand`].
///
/// Applications expose it wrapped in the decorator pipeline; see
/// [`Pipeline::command`](super::cqrs::Pipeline::command).
#[derive(Clone)]
pub struct DisburseHandler {
    transactions: TransactionManager,
    repository: Arc<dyn DisbursementRepository>,
}

impl DisburseHandler {
    /// Build the handler.
    pub fn new(transactions: TransactionManager, repository: Arc<dyn DisbursementRepository>) -> Self {
        Self {
            transactions,
            repository,
        }
    }
}

#[async_trait]
impl Handler<DisburseCommand> for DisburseHandler {
    type Output = ();

    async fn handle(&self, ctx: &Context, input: DisburseCommand) -> Result<(), HandledError> {
        let disbursement = Disbursement::new(input.amount)?;
        let repository = Arc::clone(&self.repository);
        self.transactions
            .run_in_transaction(ctx, |tx_ctx| async move {
                repository
                    .create_disbursement(&tx_ctx, &disbursement)
                    .await
                    .map_err(HandledError::from)
            })
            .await
    }
}
