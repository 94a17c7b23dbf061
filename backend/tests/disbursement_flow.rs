//! End-to-end flows through the HTTP and queue transports using the
//! recording fakes from the `test-support` feature.

use std::sync::Arc;

use actix_web::{App, test, web};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use disbursement::app::{Application, ApplicationPorts};
use disbursement::domain::ports::{LogLevel, StoreError};
use disbursement::domain::{Context, REQUEST_ID_KEY};
use disbursement::inbound::http::{
    HttpState, REQUEST_ID_HEADER, RequestContext, configure, json_config,
};
use disbursement::inbound::queue::{
    ChannelSource, DisbursementProcessor, QueueMessage, run_consumer,
};
use disbursement::test_support::{RecordingLogger, RecordingStore, RecordingTracer, StoreEvent};

struct Harness {
    store: RecordingStore,
    logger: RecordingLogger,
    tracer: RecordingTracer,
}

impl Harness {
    fn app(&self) -> Application {
        Application::new(ApplicationPorts {
            store: Arc::new(self.store.clone()),
            disbursements: Arc::new(self.store.repository()),
            tracer: Arc::new(self.tracer.clone()),
            logger: Arc::new(self.logger.clone()),
        })
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        store: RecordingStore::new(),
        logger: RecordingLogger::new(),
        tracer: RecordingTracer::new(),
    }
}

fn failing_harness(error: StoreError) -> Harness {
    Harness {
        store: RecordingStore::new().failing_insert(error),
        logger: RecordingLogger::new(),
        tracer: RecordingTracer::new(),
    }
}

async fn post_disburse(
    harness: &Harness,
    request_id: Option<&str>,
    body: Value,
) -> (u16, Option<String>, Value) {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(HttpState::new(harness.app())))
            .app_data(json_config())
            .wrap(RequestContext)
            .service(web::scope("/api/v1").configure(configure)),
    )
    .await;
    let mut req = test::TestRequest::post().uri("/api/v1/disburse").set_json(body);
    if let Some(id) = request_id {
        req = req.insert_header((REQUEST_ID_HEADER, id));
    }
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status().as_u16();
    let echoed = res
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let bytes = test::read_body(res).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, echoed, body)
}

#[rstest]
#[actix_web::test]
async fn http_disbursement_commits_and_traces(harness: Harness) {
    let (status, echoed, body) =
        post_disburse(&harness, Some("flow-1"), json!({ "amount": 250.5 })).await;

    assert_eq!(status, 201);
    assert_eq!(echoed.as_deref(), Some("flow-1"));
    assert_eq!(body["message"], json!("disbursement created"));
    assert_eq!(harness.store.events(), vec![StoreEvent::Begin, StoreEvent::Commit]);
    assert_eq!(harness.store.committed().len(), 1);

    let span = harness.tracer.spans().into_iter().next().expect("one span");
    assert_eq!(span.name, "disbursecommand");
    assert_eq!(span.end_calls, 1);

    let record = harness.logger.records().into_iter().next().expect("log record");
    assert_eq!(record.request_id, "flow-1");
    assert_eq!(record.field("command_body"), Some(&json!({ "amount": 250.5 })));
}

#[rstest]
#[actix_web::test]
async fn http_generates_a_request_id_when_absent(harness: Harness) {
    let (status, echoed, _) = post_disburse(&harness, None, json!({ "amount": 1.0 })).await;

    assert_eq!(status, 201);
    let echoed = echoed.expect("request id header");
    assert!(!echoed.is_empty());
    let record = harness.logger.records().into_iter().next().expect("log record");
    assert_eq!(record.request_id, echoed);
}

#[rstest]
#[actix_web::test]
async fn cancelled_statement_maps_to_client_closed_request() {
    let harness = failing_harness(StoreError::query(
        "pq: canceling statement due to user request",
    ));

    let (status, echoed, body) =
        post_disburse(&harness, Some("flow-cancel"), json!({ "amount": 3.0 })).await;

    assert_eq!(status, 499);
    assert_eq!(echoed.as_deref(), Some("flow-cancel"));
    assert_eq!(body["error_code"], json!("CANCELLED"));
    assert_eq!(harness.logger.at(LogLevel::Warn).len(), 1);
    assert!(harness.logger.at(LogLevel::Error).is_empty());
    assert_eq!(harness.store.count(StoreEvent::Rollback), 1);
}

#[rstest]
#[tokio::test]
async fn queue_messages_flow_through_the_consumer(harness: Harness) {
    let (sender, source) = ChannelSource::new(4);
    let processor = DisbursementProcessor::new(harness.app());

    for (id, value) in [
        ("q-1", br#"{"data":{"amount":10.0}}"#.to_vec()),
        ("q-2", b"garbage".to_vec()),
        ("q-3", br#"{"data":{"amount":20.0}}"#.to_vec()),
    ] {
        sender
            .send(QueueMessage::new("disbursements", value).with_header(REQUEST_ID_KEY, id))
            .await
            .expect("channel open");
    }
    drop(sender);

    let processed = run_consumer(&Context::background(), &source, &processor)
        .await
        .expect("consumer drains the channel");

    assert_eq!(processed, 2);
    let amounts: Vec<f64> = harness
        .store
        .committed()
        .iter()
        .map(|row| row.amount())
        .collect();
    assert_eq!(amounts, vec![10.0, 20.0]);
    let ids: Vec<String> = harness
        .logger
        .records()
        .into_iter()
        .map(|record| record.request_id)
        .collect();
    assert_eq!(ids, vec!["q-1".to_owned(), "q-3".to_owned()]);
}

#[rstest]
#[tokio::test]
async fn consumer_stops_when_cancelled(harness: Harness) {
    let (_sender, source) = ChannelSource::new(1);
    let processor = DisbursementProcessor::new(harness.app());
    let token = CancellationToken::new();
    let ctx = Context::background().with_cancellation(token.clone());

    let consumer = tokio::spawn(async move { run_consumer(&ctx, &source, &processor).await });
    token.cancel();

    let processed = consumer
        .await
        .expect("consumer task joins")
        .expect("cancellation is a clean stop");
    assert_eq!(processed, 0);
    assert!(harness.store.events().is_empty());
}
