//! Request metrics for hyper services

use super::metrics::{TransportInfo, TransportMetrics};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

/// Wraps a hyper service and records every request in [`TransportMetrics`].
///
/// The request path is the operation label and the response status is the
/// code. Statuses below 400 carry an empty reason; errors returned by the
/// inner service are recorded as 500 with the error's string form.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: TransportMetrics,
}

impl<S> MetricsService<S> {
    pub fn new(inner: S, metrics: TransportMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }
}

impl<S, B, ResBody> Service<Request<B>> for MetricsService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let info = TransportInfo::http(req.uri().path());
        let metrics = self.metrics.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            metrics
                .observe_with(&info, fut, |result| match result {
                    Ok(response) => status_label(response.status()),
                    Err(e) => (
                        i32::from(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
                        e.to_string(),
                    ),
                })
                .await
        })
    }
}

fn status_label(status: StatusCode) -> (i32, String) {
    let reason = if status.is_client_error() || status.is_server_error() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        String::new()
    };
    (i32::from(status.as_u16()), reason)
}
