//! Conversions between [`HandledError`] and `tonic` statuses.

use tonic::{Code, Status};

use crate::domain::{
    Cause, ErrorCode, ErrorKind, HandledError, RemoteStatus, extract_handled_error,
};

/// Status code sent for an error kind.
pub fn code_for(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::Authorization => Code::Unauthenticated,
        ErrorKind::IncorrectInput | ErrorKind::UnprocessableEntity => Code::InvalidArgument,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::Forbidden => Code::PermissionDenied,
        ErrorKind::ContextCancelled => Code::Cancelled,
        ErrorKind::Unknown | ErrorKind::Database => Code::Internal,
    }
}

/// Error kind for a received status code.
pub fn kind_for(code: Code) -> ErrorKind {
    match code {
        Code::Unauthenticated => ErrorKind::Authorization,
        Code::InvalidArgument => ErrorKind::IncorrectInput,
        Code::NotFound => ErrorKind::NotFound,
        Code::ResourceExhausted => ErrorKind::Forbidden,
        Code::Cancelled => ErrorKind::ContextCancelled,
        _ => ErrorKind::Unknown,
    }
}

/// Status returned to an RPC caller.
pub fn to_status(err: &HandledError) -> Status {
    Status::new(code_for(err.kind()), err.message())
}

/// Cause recorded for a status received from a peer.
pub fn remote_status(status: &Status) -> RemoteStatus {
    RemoteStatus {
        code: format!("{:?}", status.code()),
        kind: kind_for(status.code()),
        message: status.message().to_owned(),
    }
}

/// Classified error for a status received from a peer.
///
/// The kind follows [`kind_for`], except that messages carrying a
/// cancellation signature become `ContextCancelled`.
#[track_caller]
pub fn from_status(status: &Status) -> HandledError {
    let cause = Cause::from(remote_status(status));
    extract_handled_error(&cause)
        .unwrap_or_else(|| HandledError::classify(cause, status.message(), ErrorCode::INTERNAL_ERROR))
}
