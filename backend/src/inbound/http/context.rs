//! Request-context middleware and extractor.
//!
//! [`RequestContext`] reads `x-request-id` (generating a UUID when it is
//! missing or malformed), binds a domain [`Context`] into the request
//! extensions and echoes the id on the response. The context's
//! cancellation token fires when the request future is dropped, e.g. when
//! the client disconnects.
//!
//! Handlers take [`HttpContext`] to receive that context.

use std::future::{Ready, ready};
use std::task::{Context as TaskContext, Poll};

use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span};

use crate::domain::{Context, RequestId};

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware binding a [`Context`] to every request.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use disbursement::inbound::http::RequestContext;
///
/// let app = App::new().wrap(RequestContext);
/// # let _ = app;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext;

impl<S, B> Transform<S, ServiceRequest> for RequestContext
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestContextMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestContextMiddleware { service }))
    }
}

/// Service wrapper produced by [`RequestContext`].
pub struct RequestContextMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestContextMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = RequestId::or_generate(
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok()),
        );
        let token = CancellationToken::new();
        let span = info_span!(
            "http.request",
            method = %req.method(),
            path = %req.path(),
            request_id = %request_id,
        );
        let ctx = Context::background()
            .with_request_id(&request_id)
            .with_cancellation(token.clone())
            .with_span(span);
        req.extensions_mut().insert(ctx);

        let fut = self.service.call(req);
        Box::pin(async move {
            // Cancels the context if the response is never produced.
            let cancel_on_drop = token.drop_guard();
            let mut res = fut.await?;
            cancel_on_drop.disarm();
            echo_request_id(&mut res, &request_id);
            Ok(res)
        })
    }
}

fn echo_request_id<B>(res: &mut ServiceResponse<B>, request_id: &RequestId) {
    match HeaderValue::from_str(request_id.as_str()) {
        Ok(value) => {
            res.response_mut()
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        Err(err) => {
            error!(error = %err, %request_id, "failed to encode request id header");
        }
    }
}

/// Extractor yielding the request's [`Context`].
///
/// Falls back to a fresh context built from the headers when the middleware
/// is not installed.
#[derive(Debug, Clone)]
pub struct HttpContext(pub Context);

impl HttpContext {
    /// Context for `req`.
    pub fn from_request_head(req: &HttpRequest) -> Self {
        if let Some(ctx) = req.extensions().get::<Context>() {
            return Self(ctx.clone());
        }
        let request_id = RequestId::or_generate(
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok()),
        );
        Self(Context::background().with_request_id(&request_id))
    }
}

impl std::ops::Deref for HttpContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for HttpContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_request_head(req)))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    use super::*;

    async fn echo_context(ctx: HttpContext) -> HttpResponse {
        HttpResponse::Ok().body(ctx.request_id().to_owned())
    }

    #[rstest]
    #[actix_web::test]
    async fn supplied_request_id_is_bound_and_echoed() {
        let app = test::init_service(
            App::new()
                .wrap(RequestContext)
                .route("/", web::get().to(echo_context)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "req-42"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(
            res.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok()),
            Some("req-42")
        );
        let body = test::read_body(res).await;
        assert_eq!(body.as_ref(), b"req-42");
    }

    #[rstest]
    #[case(None)]
    #[case(Some("bad id with spaces"))]
    #[actix_web::test]
    async fn missing_or_invalid_request_id_is_generated(#[case] header: Option<&str>) {
        let app = test::init_service(
            App::new()
                .wrap(RequestContext)
                .route("/", web::get().to(echo_context)),
        )
        .await;

        let mut req = test::TestRequest::get().uri("/");
        if let Some(value) = header {
            req = req.insert_header((REQUEST_ID_HEADER, value));
        }
        let res = test::call_service(&app, req.to_request()).await;

        let echoed = res
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("request id echoed");
        assert!(uuid::Uuid::parse_str(&echoed).is_ok(), "generated id: {echoed}");
        let body = test::read_body(res).await;
        assert_eq!(body.as_ref(), echoed.as_bytes());
    }

    #[rstest]
    #[actix_web::test]
    async fn extractor_works_without_middleware() {
        let app = test::init_service(App::new().route("/", web::get().to(echo_context))).await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "req-9"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body.as_ref(), b"req-9");
    }
}
