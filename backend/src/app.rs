//! Application wiring: decorated handlers grouped by command and query.
//!
//! Transports depend on [`Application`] only; every handler it exposes has
//! already been wrapped by the decorator pipeline.

use std::sync::Arc;

use crate::domain::cqrs::{AttributePolicy, CommandHandler, Pipeline};
use crate::domain::ports::{DisbursementRepository, Logger, Tracer, TransactionalStore};
use crate::domain::{DisburseCommand, DisburseHandler, TransactionManager};

/// Decorated command handlers.
#[derive(Clone)]
pub struct Commands {
    /// Records a disbursement.
    pub disburse: CommandHandler<DisburseCommand>,
}

/// Decorated query handlers. The service exposes none yet.
#[derive(Clone, Default)]
pub struct Queries {}

/// Handlers available to the transports.
#[derive(Clone)]
pub struct Application {
    /// Decorated command handlers.
    pub commands: Commands,
    /// Decorated query handlers.
    pub queries: Queries,
}

/// Collaborators the application is assembled from.
#[derive(Clone)]
pub struct ApplicationPorts {
    /// Store the transaction manager opens transactions on.
    pub store: Arc<dyn TransactionalStore>,
    /// Disbursement persistence.
    pub disbursements: Arc<dyn DisbursementRepository>,
    /// Span factory for the tracing layer.
    pub tracer: Arc<dyn Tracer>,
    /// Sink for the logging layer.
    pub logger: Arc<dyn Logger>,
}

impl Application {
    /// Build the application with the default attribute policy.
    ///
    /// # Examples
    /// ```ignore
    /// use std::sync::Arc;
    ///
    /// use disbursement::app::{Application, ApplicationPorts};
    /// use disbursement::domain::ports::NoOpTracer;
    /// use disbursement::outbound::telemetry::TracingLogger;
    /// use disbursement::test_support::RecordingStore;
    ///
    /// let store = RecordingStore::new();
    /// let app = Application::new(ApplicationPorts {
    ///     store: Arc::new(store.clone()),
    ///     disbursements: Arc::new(store.repository()),
    ///     tracer: Arc::new(NoOpTracer),
    ///     logger: Arc::new(TracingLogger),
    /// });
    /// # let _ = app;
    /// ```
    pub fn new(ports: ApplicationPorts) -> Self {
        Self::with_attribute_policy(ports, AttributePolicy::default())
    }

    /// Build the application with an explicit attribute policy.
    pub fn with_attribute_policy(ports: ApplicationPorts, policy: AttributePolicy) -> Self {
        let ApplicationPorts {
            store,
            disbursements,
            tracer,
            logger,
        } = ports;
        let pipeline = Pipeline::new(tracer, logger).with_attribute_policy(policy);
        let transactions = TransactionManager::new(store);

        Self {
            commands: Commands {
                disburse: Arc::new(pipeline.command::<DisburseCommand, _>(DisburseHandler::new(
                    transactions,
                    disbursements,
                ))),
            },
            queries: Queries::default(),
        }
    }
}
