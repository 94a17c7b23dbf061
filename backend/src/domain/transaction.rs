//! Ambient, context-carried database transactions.
//!
//! [`TransactionManager::run_in_transaction`] opens exactly one physical
//! transaction per logical operation. The handle is bound into the
//! [`Context`] handed to the unit of work, so nested data-access calls reuse
//! it by looking it up instead of receiving it as a parameter. Nested
//! `run_in_transaction` calls see the ambient transaction and pass straight
//! through; only the outermost call commits or rolls back.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, warn};
use uuid::Uuid;

use super::context::Context;
use super::error::{Cause, ErrorCode, HandledError};
use super::ports::{StoreError, StoreTransaction, TransactionalStore};

type Slot = Option<Box<dyn StoreTransaction>>;

/// Open transaction reachable through [`Context::transaction`].
///
/// The handle is taken out when the owning manager commits or rolls back,
/// after which [`AmbientTransaction::lock`] fails with
/// [`StoreError::TransactionFinished`].
pub struct AmbientTransaction {
    id: Uuid,
    handle: Mutex<Slot>,
}

impl AmbientTransaction {
    fn new(handle: Box<dyn StoreTransaction>) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Identifier used to correlate log records of one transaction.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Exclusive access to the open handle.
    ///
    /// Statements of one transaction run sequentially; concurrent callers
    /// wait here.
    pub async fn lock(&self) -> Result<TransactionGuard<'_>, StoreError> {
        let guard = self.handle.lock().await;
        if guard.is_none() {
            return Err(StoreError::transaction_finished());
        }
        Ok(TransactionGuard { guard })
    }

    async fn take(&self) -> Slot {
        self.handle.lock().await.take()
    }
}

/// Locked access to an ambient transaction's handle.
pub struct TransactionGuard<'a> {
    guard: MutexGuard<'a, Slot>,
}

impl TransactionGuard<'_> {
    /// The handle as the adapter's concrete type, if it is one.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.guard
            .as_mut()
            .and_then(|handle| handle.as_any_mut().downcast_mut::<T>())
    }
}

/// Runs units of work inside a single ambient transaction.
#[derive(Clone)]
pub struct TransactionManager {
    store: Arc<dyn TransactionalStore>,
}

impl TransactionManager {
    /// Build a manager over `store`.
    pub fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }

    /// Run `unit_of_work` inside a transaction.
    ///
    /// When `ctx` already carries an ambient transaction the unit of work is
    /// called directly with `ctx` and its result returned untouched.
    /// Otherwise a transaction is opened, bound into the context passed to
    /// the unit of work, and committed on success or rolled back on failure
    /// or panic. Every failure leaving this function is a [`HandledError`];
    /// failures of the store itself are of kind `Database`.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use disbursement::domain::ports::TransactionalStore;
    /// use disbursement::domain::{Context, TransactionManager};
    ///
    /// # async fn demo(store: Arc<dyn TransactionalStore>) {
    /// let manager = TransactionManager::new(store);
    /// let total = manager
    ///     .run_in_transaction(&Context::background(), |ctx| async move {
    ///         assert!(ctx.transaction().is_some());
    ///         Ok(42)
    ///     })
    ///     .await;
    /// assert_eq!(total.ok(), Some(42));
    /// # }
    /// ```
    pub async fn run_in_transaction<T, F, Fut>(
        &self,
        ctx: &Context,
        unit_of_work: F,
    ) -> Result<T, HandledError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, HandledError>>,
    {
        if ctx.transaction().is_some() {
            return unit_of_work(ctx.clone()).await;
        }

        let handle = self.store.begin_transaction(ctx).await.map_err(|err| {
            let message = format!("error begin transaction: {err}");
            HandledError::database(err, message, ErrorCode::INTERNAL_ERROR)
        })?;

        let ambient = Arc::new(AmbientTransaction::new(handle));
        let tx_ctx = ctx.with_transaction(Arc::clone(&ambient));
        let mut abandoned = AbandonGuard::new(ambient.id());

        let outcome = AssertUnwindSafe(async move { unit_of_work(tx_ctx).await })
            .catch_unwind()
            .await;

        let Some(mut handle) = ambient.take().await else {
            abandoned.disarm();
            return Err(HandledError::database(
                StoreError::transaction_finished(),
                "transaction already finished",
                ErrorCode::INTERNAL_ERROR,
            ));
        };

        let result = match outcome {
            Err(payload) => {
                let payload = panic_text(payload.as_ref());
                Err(rollback_after_panic(handle.as_mut(), payload).await)
            }
            Ok(Err(err)) => Err(rollback_after_error(handle.as_mut(), err).await),
            Ok(Ok(value)) => match handle.commit().await {
                Ok(()) => Ok(value),
                Err(err) => Err(cleanup_after_failed_commit(handle.as_mut(), err).await),
            },
        };
        abandoned.disarm();
        result
    }
}

async fn rollback_after_panic(handle: &mut dyn StoreTransaction, payload: String) -> HandledError {
    error!(panic = %payload, "unit of work panicked inside transaction");
    match handle.rollback().await {
        Ok(()) => HandledError::database(
            Cause::Panic(payload.clone()),
            format!("panic error: {payload}"),
            ErrorCode::INTERNAL_ERROR,
        ),
        Err(rollback) => HandledError::database(
            Cause::Panic(payload.clone()),
            format!("error on rollback: {rollback}, original panic: {payload}"),
            ErrorCode::INTERNAL_ERROR,
        ),
    }
}

async fn rollback_after_error(handle: &mut dyn StoreTransaction, err: HandledError) -> HandledError {
    match handle.rollback().await {
        Ok(()) => err.rewrap(),
        Err(rollback) => {
            error!(error = %err, rollback_error = %rollback, "transaction rollback failed");
            let message = format!("error on rollback: {rollback}, original error: {err}");
            HandledError::database(err, message, ErrorCode::INTERNAL_ERROR)
        }
    }
}

async fn cleanup_after_failed_commit(
    handle: &mut dyn StoreTransaction,
    commit: StoreError,
) -> HandledError {
    error!(error = %commit, "transaction commit failed");
    let message = match handle.rollback().await {
        Ok(()) => format!("error on commit: {commit}"),
        Err(rollback) if rollback.is_transaction_finished() => format!("error on commit: {commit}"),
        Err(rollback) => format!("error on commit: {commit}, rollback also failed: {rollback}"),
    };
    HandledError::database(commit, message, ErrorCode::INTERNAL_ERROR)
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_owned()
}

/// Warns when the outermost call is dropped before the transaction finished.
///
/// The store discards connections still inside a transaction, so dropping is
/// equivalent to a rollback; the warning makes the abandonment visible.
struct AbandonGuard {
    id: Uuid,
    armed: bool,
}

impl AbandonGuard {
    fn new(id: Uuid) -> Self {
        Self { id, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(transaction_id = %self.id, "transaction abandoned before commit or rollback");
        }
    }
}
