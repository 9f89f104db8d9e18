//! HTTP exposition of a [`CollectorRegistry`]
//!
//! Available when the `server` feature is enabled.
//!
//! # Available Endpoints
//!
//! - `GET /metrics` - Prometheus-formatted metrics
//! - `GET /health` - Health check endpoint

use crate::error::Result;
use crate::registry::CollectorRegistry;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{body::Incoming, service::service_fn, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Configuration for the metrics HTTP server
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub port: u16,
    pub bind_address: [u8; 4],
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: [0, 0, 0, 0],
        }
    }
}

impl MetricsServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.bind_address, self.port))
    }
}

/// HTTP server serving one registry on `/metrics` and a health check on `/health`
#[derive(Debug)]
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<CollectorRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: Arc<CollectorRegistry>) -> Self {
        Self { config, registry }
    }

    /// Bind the configured address and serve until `cancellation_token` is cancelled
    pub async fn start(&self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener, cancellation_token).await
    }

    /// Serve connections accepted on `listener` until `cancellation_token` is cancelled.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve(&self, listener: TcpListener, cancellation_token: CancellationToken) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Metrics server listening on http://{}", addr);

        loop {
            let (stream, _) = tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    info!("Metrics server on {} received cancellation signal", addr);
                    return Ok(());
                }
                accepted = listener.accept() => accepted?,
            };
            let io = TokioIo::new(stream);
            let registry = Arc::clone(&self.registry);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| handle_request(Arc::clone(&registry), req));
                if let Err(err) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    if !err.is_incomplete_message() {
                        error!("Error serving connection: {:?}", err);
                    }
                }
            });
        }
    }

    pub fn config(&self) -> &MetricsServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CollectorRegistry> {
        &self.registry
    }
}

async fn handle_request(
    registry: Arc<CollectorRegistry>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(&registry, req.method(), req.uri().path()))
}

fn route(registry: &CollectorRegistry, method: &Method, path: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => match registry.gather_text() {
            Ok(metrics) => text_response(StatusCode::OK, Some(TEXT_CONTENT_TYPE), metrics),
            Err(err) => {
                error!("Failed to collect metrics: {}", err);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, None, "Failed to collect metrics")
            }
        },
        (&Method::GET, "/health") => text_response(
            StatusCode::OK,
            Some("application/json"),
            r#"{"status":"healthy"}"#,
        ),
        _ => text_response(StatusCode::NOT_FOUND, None, "Not Found"),
    }
}

fn text_response<B: Into<Bytes>>(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: B,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static(content_type));
    }
    response
}

/// Create a metrics server on `port` serving the shared default registry
pub fn create_metrics_server(port: u16) -> MetricsServer {
    let config = MetricsServerConfig {
        port,
        ..Default::default()
    };
    MetricsServer::new(config, crate::registry::default_registry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use prometheus::Counter;

    #[test]
    fn test_metrics_server_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, [0, 0, 0, 0]);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_create_metrics_server() {
        let server = create_metrics_server(9090);
        assert_eq!(server.config().port, 9090);
        assert_eq!(server.config().bind_address, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_route_metrics() {
        let registry = CollectorRegistry::new();
        registry
            .register(Counter::new("served_total", "Served").unwrap())
            .unwrap()
            .inc();

        let response = route(&registry, &Method::GET, "/metrics");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_CONTENT_TYPE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("served_total 1"));
    }

    #[test]
    fn test_route_health_and_not_found() {
        let registry = CollectorRegistry::new();
        assert_eq!(route(&registry, &Method::GET, "/health").status(), StatusCode::OK);
        assert_eq!(route(&registry, &Method::GET, "/nope").status(), StatusCode::NOT_FOUND);
        assert_eq!(route(&registry, &Method::POST, "/metrics").status(), StatusCode::NOT_FOUND);
    }
}
