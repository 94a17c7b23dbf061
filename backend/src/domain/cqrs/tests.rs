//! Tests for the decorator pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use rstest::{fixture, rstest};
use serde::Serialize;
use serde_json::json;

use super::*;
use crate::domain::cancellation::{CONTEXT_CANCELED, PQ_STATEMENT_CANCELED};
use crate::domain::ports::{AttributeValue, LogLevel, StoreError};
use crate::domain::{
    Cause, DisburseCommand, DisburseHandler, ErrorCode, ErrorKind, RequestId, TransactionManager,
};
use crate::test_support::{RecordingLogger, RecordingStore, RecordingTracer, StoreEvent};

struct Telemetry {
    logger: RecordingLogger,
    tracer: RecordingTracer,
    pipeline: Pipeline,
}

#[fixture]
fn telemetry() -> Telemetry {
    let logger = RecordingLogger::new();
    let tracer = RecordingTracer::new();
    let pipeline = Pipeline::new(Arc::new(tracer.clone()), Arc::new(logger.clone()));
    Telemetry {
        logger,
        tracer,
        pipeline,
    }
}

#[derive(Debug, Clone, Serialize)]
struct FailWith {
    text: String,
}

struct FailingHandler;

#[async_trait]
impl Handler<FailWith> for FailingHandler {
    type Output = ();

    async fn handle(&self, _ctx: &Context, input: FailWith) -> Result<(), HandledError> {
        Err(HandledError::from(StoreError::query(input.text)))
    }
}

#[derive(Debug, Clone, Serialize)]
struct CountRows {
    table: String,
}

struct CountingHandler;

#[async_trait]
impl Handler<CountRows> for CountingHandler {
    type Output = u64;

    async fn handle(&self, ctx: &Context, _input: CountRows) -> Result<u64, HandledError> {
        ctx.check_cancelled()?;
        Ok(3)
    }
}

#[derive(Debug, Serialize)]
struct Explode;

struct PanickingHandler;

#[async_trait]
impl Handler<Explode> for PanickingHandler {
    type Output = ();

    async fn handle(&self, _ctx: &Context, _input: Explode) -> Result<(), HandledError> {
        panic!("handler blew up");
    }
}

fn disburse_handler(store: &RecordingStore) -> DisburseHandler {
    DisburseHandler::new(
        TransactionManager::new(Arc::new(store.clone())),
        Arc::new(store.repository()),
    )
}

#[rstest]
#[case(CONTEXT_CANCELED)]
#[case(PQ_STATEMENT_CANCELED)]
#[tokio::test]
async fn cancellation_signature_is_logged_once_as_warning(
    telemetry: Telemetry,
    #[case] text: &str,
) {
    let handler = telemetry.pipeline.command::<FailWith, _>(FailingHandler);

    let err = handler
        .handle(
            &Context::background(),
            FailWith {
                text: text.to_owned(),
            },
        )
        .await
        .expect_err("handler fails");

    assert_eq!(err.kind(), ErrorKind::ContextCancelled);
    assert_eq!(telemetry.logger.at(LogLevel::Warn).len(), 1);
    assert!(telemetry.logger.at(LogLevel::Error).is_empty());
}

#[rstest]
#[tokio::test]
async fn successful_disbursement_logs_and_traces_once(telemetry: Telemetry) {
    let store = RecordingStore::new();
    let handler = telemetry.pipeline.command::<DisburseCommand, _>(disburse_handler(&store));
    let ctx = Context::background().with_request_id(&RequestId::new("req-a").expect("valid id"));

    handler
        .handle(&ctx, DisburseCommand { amount: 100.0 })
        .await
        .expect("disbursement succeeds");

    let records = telemetry.logger.records();
    assert_eq!(records.len(), 1);
    let record = records.first().expect("one record");
    assert_eq!(record.level, LogLevel::Info);
    assert_eq!(record.message, "Executing command");
    assert_eq!(record.field("command"), Some(&json!("DisburseCommand")));
    assert_eq!(record.field("command_body"), Some(&json!({ "amount": 100 })));
    assert_eq!(record.request_id, "req-a");

    let spans = telemetry.tracer.spans();
    assert_eq!(spans.len(), 1);
    let span = spans.first().expect("one span");
    assert_eq!(span.name, "disbursecommand");
    assert_eq!(span.end_calls, 1);
    assert!(span.errors.is_empty());
    assert_eq!(
        span.attribute("cqrs.type"),
        Some(&AttributeValue::String("command".to_owned()))
    );
    assert_eq!(
        span.attribute("cqrs.operation"),
        Some(&AttributeValue::String("disbursecommand".to_owned()))
    );
    assert_eq!(
        span.attribute("request_id"),
        Some(&AttributeValue::String("req-a".to_owned()))
    );
    assert!(span.attribute("cqrs.timestamp").is_some());
    assert_eq!(store.events(), vec![StoreEvent::Begin, StoreEvent::Commit]);
}

#[rstest]
#[tokio::test]
async fn driver_failure_is_database_kind_logged_as_error(telemetry: Telemetry) {
    let store = RecordingStore::new().failing_insert(StoreError::query("connection reset"));
    let handler = telemetry.pipeline.command::<DisburseCommand, _>(disburse_handler(&store));

    let err = handler
        .handle(&Context::background(), DisburseCommand { amount: 5.0 })
        .await
        .expect_err("insert fails");

    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(err.message(), "connection reset");
    assert_eq!(store.events(), vec![StoreEvent::Begin, StoreEvent::Rollback]);

    let errors = telemetry.logger.at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    let record = errors.first().expect("one error record");
    assert_eq!(record.message, "internal error: failed to execute: command");
    assert_eq!(record.field("error"), Some(&json!("connection reset")));
    assert_eq!(record.field("error_original"), Some(&json!("connection reset")));

    let span = telemetry.tracer.spans().into_iter().next().expect("one span");
    assert_eq!(span.errors.len(), 1);
    assert_eq!(span.end_calls, 1);
}

#[rstest]
#[tokio::test]
async fn validation_failure_is_a_client_warning(telemetry: Telemetry) {
    let store = RecordingStore::new();
    let handler = telemetry.pipeline.command::<DisburseCommand, _>(disburse_handler(&store));

    let err = handler
        .handle(&Context::background(), DisburseCommand { amount: 0.0 })
        .await
        .expect_err("zero amount rejected");

    assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    let warnings = telemetry.logger.at(LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings.first().map(|record| record.message.as_str()),
        Some("client error: failed to execute: command")
    );
}

#[rstest]
#[tokio::test]
async fn queries_return_their_output(telemetry: Telemetry) {
    let handler = telemetry.pipeline.query::<CountRows, _>(CountingHandler);

    let rows = handler
        .handle(
            &Context::background(),
            CountRows {
                table: "disbursements".to_owned(),
            },
        )
        .await
        .expect("query succeeds");

    assert_eq!(rows, 3);
    let record = telemetry.logger.records().into_iter().next().expect("record");
    assert_eq!(record.message, "Executing query");
    assert_eq!(record.field("query"), Some(&json!("CountRows")));
    assert_eq!(
        record.field("query_body"),
        Some(&json!({ "table": "disbursements" }))
    );
    let span = telemetry.tracer.spans().into_iter().next().expect("span");
    assert_eq!(
        span.attribute("cqrs.type"),
        Some(&AttributeValue::String("query".to_owned()))
    );
}

#[rstest]
#[tokio::test]
async fn cancelled_context_surfaces_as_context_cancelled(telemetry: Telemetry) {
    let handler = telemetry.pipeline.query::<CountRows, _>(CountingHandler);
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();
    let ctx = Context::background().with_cancellation(token);

    let err = handler
        .handle(
            &ctx,
            CountRows {
                table: "t".to_owned(),
            },
        )
        .await
        .expect_err("cancelled");

    assert_eq!(err.kind(), ErrorKind::ContextCancelled);
    assert_eq!(err.code(), &ErrorCode::CANCELLED);
    assert_eq!(telemetry.logger.at(LogLevel::Warn).len(), 1);
}

#[rstest]
#[tokio::test]
async fn input_attributes_are_captured_when_enabled() {
    let tracer = RecordingTracer::new();
    let pipeline = Pipeline::new(Arc::new(tracer.clone()), Arc::new(RecordingLogger::new()))
        .with_attribute_policy(AttributePolicy {
            capture_input: true,
            truncate: true,
        });
    let handler = pipeline.query::<CountRows, _>(CountingHandler);

    handler
        .handle(
            &Context::background(),
            CountRows {
                table: "disbursements".to_owned(),
            },
        )
        .await
        .expect("query succeeds");

    let span = tracer.spans().into_iter().next().expect("span");
    assert_eq!(
        span.attribute("cqrs.input.table"),
        Some(&AttributeValue::String("disbursements".to_owned()))
    );
}

#[rstest]
#[tokio::test]
async fn panics_still_end_the_span_and_log_a_failure(telemetry: Telemetry) {
    let handler = telemetry.pipeline.command::<Explode, _>(PanickingHandler);
    let ctx = Context::background();

    let outcome = AssertUnwindSafe(handler.handle(&ctx, Explode))
        .catch_unwind()
        .await;

    assert!(outcome.is_err(), "panic propagates to the transport boundary");
    let span = telemetry.tracer.spans().into_iter().next().expect("span");
    assert_eq!(span.end_calls, 1);
    let errors = telemetry.logger.at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    let reason = errors.first().and_then(|record| record.field("error")).cloned();
    assert!(
        matches!(
            reason,
            Some(serde_json::Value::String(ref text))
                if text == "handler panicked" || text == "handler dropped before completion"
        ),
        "unexpected reason: {reason:?}"
    );
}

#[rstest]
#[tokio::test]
async fn error_layer_leaves_unrelated_errors_alone() {
    struct NotFoundHandler;

    #[async_trait]
    impl Handler<FailWith> for NotFoundHandler {
        type Output = ();

        async fn handle(&self, _ctx: &Context, input: FailWith) -> Result<(), HandledError> {
            Err(HandledError::not_found(
                Cause::message(input.text),
                "disbursement not found",
                ErrorCode::NOT_FOUND,
            ))
        }
    }

    let layer = ErrorLayer::new(NotFoundHandler);
    let err = layer
        .handle(
            &Context::background(),
            FailWith {
                text: "no rows".to_owned(),
            },
        )
        .await
        .expect_err("fails");

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
fn operation_names_strip_paths_and_generics() {
    assert_eq!(operation_name::<FailWith>(), "FailWith");
    assert_eq!(operation_name::<Option<FailWith>>(), "Option");
}

#[rstest]
#[tokio::test]
async fn type_erased_handlers_dispatch_through_arc(telemetry: Telemetry) {
    let store = RecordingStore::new();
    let handler: CommandHandler<DisburseCommand> = Arc::new(
        telemetry
            .pipeline
            .command::<DisburseCommand, _>(disburse_handler(&store)),
    );

    handler
        .handle(&Context::background(), DisburseCommand { amount: 1.0 })
        .await
        .expect("disbursement succeeds");

    assert_eq!(store.committed().len(), 1);
}
