//! Tests for error classification, rewrapping and extraction.

use std::fmt;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::cancellation::{CONTEXT_CANCELED, PQ_STATEMENT_CANCELED};

#[derive(Debug)]
struct DriverError(&'static str);

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl StdError for DriverError {}

#[derive(Debug)]
struct Wrapper(HandledError);

impl fmt::Display for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrapped: {}", self.0)
    }
}

impl StdError for Wrapper {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

#[fixture]
fn not_found() -> HandledError {
    HandledError::not_found(
        Cause::other(DriverError("no rows in result set")),
        "disbursement not found",
        ErrorCode::NOT_FOUND,
    )
}

fn constructed(kind: ErrorKind) -> HandledError {
    let cause = Cause::message("boom");
    let code = ErrorCode::new("SOME_CODE");
    match kind {
        ErrorKind::Unknown => HandledError::classify(cause, "m", code),
        ErrorKind::Database => HandledError::database(cause, "m", code),
        ErrorKind::Authorization => HandledError::authorization(cause, "m", code),
        ErrorKind::IncorrectInput => HandledError::incorrect_input(cause, "m", code),
        ErrorKind::UnprocessableEntity => {
            HandledError::unprocessable_entity(cause, "m", code, Vec::new())
        }
        ErrorKind::NotFound => HandledError::not_found(cause, "m", code),
        ErrorKind::Forbidden => HandledError::forbidden(cause, "m", code),
        ErrorKind::ContextCancelled => HandledError::context_cancelled(cause, "m", code),
    }
}

#[rstest]
fn constructors_record_their_kind() {
    for kind in ErrorKind::ALL {
        let err = constructed(kind);
        assert_eq!(err.kind(), kind);
        assert_eq!(err.message(), "m");
        assert_eq!(err.code().as_str(), "SOME_CODE");
        assert_eq!(err.stack_trace().len(), 1, "fresh errors carry one frame");
    }
}

#[rstest]
fn client_facing_partition_is_exhaustive() {
    let client_facing: Vec<_> = ErrorKind::ALL
        .into_iter()
        .filter(|kind| kind.is_client_facing())
        .collect();

    assert_eq!(
        client_facing,
        vec![
            ErrorKind::Authorization,
            ErrorKind::IncorrectInput,
            ErrorKind::UnprocessableEntity,
            ErrorKind::NotFound,
            ErrorKind::Forbidden,
            ErrorKind::ContextCancelled,
        ]
    );
    assert!(!ErrorKind::Unknown.is_client_facing());
    assert!(!ErrorKind::Database.is_client_facing());
}

#[rstest]
fn frames_point_at_the_construction_site() {
    let line = line!() + 1;
    let err = HandledError::new(ErrorKind::Unknown, "synthetic", ErrorCode::INTERNAL_ERROR);

    let frame = err.stack_trace().first().copied().expect("one frame");
    assert_eq!(frame.line, line);
    assert!(frame.file.ends_with("tests.rs"));
}

#[rstest]
fn synthetic_errors_have_no_cause() {
    let err = HandledError::new(ErrorKind::Forbidden, "not yours", ErrorCode::FORBIDDEN);

    assert!(err.cause().is_none());
    assert!(err.original_text().is_none());
    assert!(StdError::source(&err).is_none());
}

#[rstest]
fn wrapping_a_handled_error_keeps_its_trace(not_found: HandledError) {
    let outer = HandledError::classify(not_found.clone(), "outer", ErrorCode::INTERNAL_ERROR);

    assert_eq!(outer.stack_trace(), not_found.stack_trace());
    assert_eq!(outer.original_text().as_deref(), Some("no rows in result set"));
}

#[rstest]
fn rewrap_preserves_classification_and_adds_a_frame(not_found: HandledError) {
    let rewrapped = rewrap_preserving_trace(not_found.clone());

    assert_eq!(rewrapped.kind(), ErrorKind::NotFound);
    assert_eq!(rewrapped.message(), not_found.message());
    assert_eq!(rewrapped.code(), not_found.code());
    assert_eq!(rewrapped.stack_trace().len(), not_found.stack_trace().len() + 1);
}

#[rstest]
fn rewrap_classifies_raw_errors_as_unknown() {
    let rewrapped = rewrap_preserving_trace(Cause::other(DriverError("socket closed")));

    assert_eq!(rewrapped.kind(), ErrorKind::Unknown);
    assert_eq!(rewrapped.message(), "socket closed");
    assert_eq!(rewrapped.code(), &ErrorCode::INTERNAL_ERROR);
}

#[rstest]
fn rewrap_of_an_ok_result_is_untouched() {
    let result: Result<u8, Cause> = Ok(7);
    assert_eq!(result.map_err(rewrap_preserving_trace).ok(), Some(7));
}

#[rstest]
#[case::handled(
    Cause::from(HandledError::forbidden(Cause::message("x"), "no", ErrorCode::FORBIDDEN)),
    ErrorKind::Forbidden
)]
#[case::store(Cause::from(StoreError::query("duplicate key")), ErrorKind::Unknown)]
#[case::raw(Cause::other(DriverError("eof")), ErrorKind::Unknown)]
#[case::message(Cause::message("plain"), ErrorKind::Unknown)]
fn extraction_after_rewrap_always_succeeds(#[case] error: Cause, #[case] expected: ErrorKind) {
    let rewrapped = rewrap_preserving_trace(error);

    let extracted =
        extract_handled_error(&Cause::from(rewrapped)).expect("handled after rewrap");

    assert_eq!(extracted.kind(), expected);
}

#[rstest]
fn extraction_walks_foreign_wrappers(not_found: HandledError) {
    let wrapped = Cause::other(Wrapper(not_found));

    let extracted = extract_handled_error(&wrapped).expect("found through source chain");

    assert_eq!(extracted.kind(), ErrorKind::NotFound);
    assert!(is_client_facing(&wrapped));
}

#[rstest]
fn extraction_fails_for_unclassified_errors() {
    let raw = Cause::other(DriverError("eof"));

    assert!(extract_handled_error(&raw).is_none());
    assert!(!is_client_facing(&raw));
}

#[rstest]
fn remote_status_is_reconstructed_from_its_kind() {
    let remote = Cause::from(RemoteStatus {
        code: "NotFound".to_owned(),
        kind: ErrorKind::NotFound,
        message: "merchant not found".to_owned(),
    });

    let extracted = extract_handled_error(&remote).expect("remote statuses are classified");

    assert_eq!(extracted.kind(), ErrorKind::NotFound);
    assert_eq!(extracted.message(), "merchant not found");
    assert_eq!(extracted.code(), &ErrorCode::NOT_FOUND);
}

#[rstest]
#[case(CONTEXT_CANCELED)]
#[case(PQ_STATEMENT_CANCELED)]
fn remote_cancellation_text_is_reclassified(#[case] message: &str) {
    let remote = Cause::from(RemoteStatus {
        code: "Unknown".to_owned(),
        kind: ErrorKind::Unknown,
        message: message.to_owned(),
    });

    let extracted = extract_handled_error(&remote).expect("classified");

    assert_eq!(extracted.kind(), ErrorKind::ContextCancelled);
    assert_eq!(extracted.code(), &ErrorCode::CANCELLED);
}

#[rstest]
fn remote_status_renders_like_a_wire_error() {
    let status = RemoteStatus {
        code: "Cancelled".to_owned(),
        kind: ErrorKind::ContextCancelled,
        message: CONTEXT_CANCELED.to_owned(),
    };
    let cause = Cause::from(status);

    assert_eq!(
        cause.to_string(),
        "rpc error: code = Cancelled desc = context canceled"
    );
    assert_eq!(cause.original_text(), CONTEXT_CANCELED);
}

#[rstest]
fn store_errors_convert_to_database_kind() {
    let err: HandledError = StoreError::query("insert failed").into();

    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(err.message(), "insert failed");
    assert!(!err.is_client_facing());
    assert!(matches!(err.cause(), Some(Cause::Store(_))));
}

#[rstest]
fn details_are_carried_for_validation_failures() {
    let err = HandledError::unprocessable_entity(
        Cause::message("amount must be positive"),
        "invalid disbursement",
        ErrorCode::INVALID_REQUEST,
        vec![ErrorInfo::new("amount", "must be greater than zero")],
    );

    assert_eq!(err.details().len(), 1);
    assert_eq!(err.details().first().map(|info| info.field.as_str()), Some("amount"));
}

#[rstest]
fn kinds_serialise_as_kebab_case_tokens() {
    for kind in ErrorKind::ALL {
        let json = serde_json::to_value(kind).expect("kind serialises");
        assert_eq!(json, serde_json::Value::String(kind.as_str().to_owned()));
    }
}
