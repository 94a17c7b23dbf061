//! Test utilities for the disbursement crate.
//!
//! In-memory recording fakes for the store, logger and tracer ports. They
//! serve unit tests in `src/` and, through the `test-support` feature,
//! integration tests in `tests/`.

mod store;
mod telemetry;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use store::{RecordingDisbursementRepository, RecordingStore, StoreEvent};
pub use telemetry::{LogRecord, RecordingLogger, RecordingTracer, SpanRecord};

/// Lock `mutex`, recovering the data if a failing test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
