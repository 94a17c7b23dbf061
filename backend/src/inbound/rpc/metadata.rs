//! Context propagation through RPC metadata.
//!
//! Only the keys in [`PROPAGATED_KEYS`] cross the wire. Incoming keys with
//! more than one value are ignored.

use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::debug;

use crate::domain::{Context, PROPAGATED_KEYS};

/// Context for a server call: `base` plus the propagated metadata values.
pub fn context_from_metadata(base: &Context, metadata: &MetadataMap) -> Context {
    PROPAGATED_KEYS.iter().fold(base.clone(), |ctx, key| {
        let mut values = metadata.get_all(*key).iter();
        match (values.next(), values.next()) {
            (Some(value), None) => match value.to_str() {
                Ok(text) if !text.is_empty() => ctx.with_value(*key, text),
                _ => ctx,
            },
            _ => ctx,
        }
    })
}

/// Copy the propagated context values into outgoing `metadata`.
pub fn inject_metadata(ctx: &Context, metadata: &mut MetadataMap) {
    for key in PROPAGATED_KEYS {
        let value = ctx.get_string(key);
        if value.is_empty() {
            continue;
        }
        match AsciiMetadataValue::try_from(value) {
            Ok(value) => {
                metadata.insert(key, value);
            }
            Err(err) => debug!(key, error = %err, "context value not sent as metadata"),
        }
    }
}

/// Client interceptor attaching a context's propagated values to every call.
///
/// # Examples
/// ```
/// use disbursement::domain::{Context, RequestId};
/// use disbursement::inbound::rpc::OutgoingContext;
/// use tonic::service::Interceptor;
///
/// let ctx = Context::background().with_request_id(&RequestId::new("req-1").unwrap());
/// let request = OutgoingContext(ctx).call(tonic::Request::new(())).unwrap();
/// let sent = request.metadata().get("request_id").unwrap().to_str().unwrap();
/// assert_eq!(sent, "req-1");
/// ```
#[derive(Debug, Clone)]
pub struct OutgoingContext(pub Context);

impl Interceptor for OutgoingContext {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        inject_metadata(&self.0, request.metadata_mut());
        Ok(request)
    }
}
