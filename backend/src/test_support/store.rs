//! Recording transactional store and disbursement repository.

use std::any::Any;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::lock;
use crate::domain::ports::{
    DisbursementRepository, StoreError, StoreTransaction, TransactionalStore,
};
use crate::domain::{Context, Disbursement};

/// Call observed by a [`RecordingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// `begin_transaction` was called.
    Begin,
    /// `commit` was called.
    Commit,
    /// `rollback` was called.
    Rollback,
}

#[derive(Default)]
struct StoreState {
    events: Vec<StoreEvent>,
    committed: Vec<Disbursement>,
    fail_begin: Option<StoreError>,
    fail_insert: Option<StoreError>,
    fail_commit: Option<StoreError>,
    fail_rollback: Option<StoreError>,
}

/// Store that records begin/commit/rollback calls and keeps committed
/// disbursements in memory.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the application owns another.
#[derive(Clone, Default)]
pub struct RecordingStore {
    state: Arc<Mutex<StoreState>>,
}

impl RecordingStore {
    /// Empty store where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `begin_transaction` fail with `error`.
    #[must_use]
    pub fn failing_begin(self, error: StoreError) -> Self {
        lock(&self.state).fail_begin = Some(error);
        self
    }

    /// Make repository inserts fail with `error`.
    #[must_use]
    pub fn failing_insert(self, error: StoreError) -> Self {
        lock(&self.state).fail_insert = Some(error);
        self
    }

    /// Make `commit` fail with `error`.
    #[must_use]
    pub fn failing_commit(self, error: StoreError) -> Self {
        lock(&self.state).fail_commit = Some(error);
        self
    }

    /// Make `rollback` fail with `error`.
    #[must_use]
    pub fn failing_rollback(self, error: StoreError) -> Self {
        lock(&self.state).fail_rollback = Some(error);
        self
    }

    /// Every call observed so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        lock(&self.state).events.clone()
    }

    /// How many times `event` was observed.
    #[must_use]
    pub fn count(&self, event: StoreEvent) -> usize {
        lock(&self.state)
            .events
            .iter()
            .filter(|seen| **seen == event)
            .count()
    }

    /// Disbursements made durable so far.
    #[must_use]
    pub fn committed(&self) -> Vec<Disbursement> {
        lock(&self.state).committed.clone()
    }

    /// Repository writing through this store.
    #[must_use]
    pub fn repository(&self) -> RecordingDisbursementRepository {
        RecordingDisbursementRepository {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl TransactionalStore for RecordingStore {
    async fn begin_transaction(
        &self,
        _ctx: &Context,
    ) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut state = lock(&self.state);
        state.events.push(StoreEvent::Begin);
        if let Some(error) = state.fail_begin.clone() {
            return Err(error);
        }
        Ok(Box::new(RecordingTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        }))
    }
}

/// Transaction staging inserts until commit.
pub struct RecordingTransaction {
    state: Arc<Mutex<StoreState>>,
    staged: Vec<Disbursement>,
}

#[async_trait]
impl StoreTransaction for RecordingTransaction {
    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.events.push(StoreEvent::Commit);
        if let Some(error) = state.fail_commit.clone() {
            return Err(error);
        }
        state.committed.append(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.events.push(StoreEvent::Rollback);
        self.staged.clear();
        match state.fail_rollback.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn as_any_mut(&mut self) -> &mut (dyn Any + Send) {
        self
    }
}

/// Repository staging rows in the ambient [`RecordingTransaction`], or
/// committing them directly when called outside a transaction.
#[derive(Clone)]
pub struct RecordingDisbursementRepository {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl DisbursementRepository for RecordingDisbursementRepository {
    async fn create_disbursement(
        &self,
        ctx: &Context,
        disbursement: &Disbursement,
    ) -> Result<(), StoreError> {
        if let Some(error) = lock(&self.state).fail_insert.clone() {
            return Err(error);
        }
        let Some(transaction) = ctx.transaction() else {
            lock(&self.state).committed.push(disbursement.clone());
            return Ok(());
        };
        let mut guard = transaction.lock().await?;
        let handle = guard
            .downcast_mut::<RecordingTransaction>()
            .ok_or_else(|| StoreError::query("ambient transaction belongs to another store"))?;
        handle.staged.push(disbursement.clone());
        Ok(())
    }
}
