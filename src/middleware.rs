//! HTTP middleware for request logging and Prometheus metrics
//!
//! Every request is counted and timed. Requests outside `/internal/` are
//! also logged. The recorded series are:
//!
//! - `http_requests_total{code,method}`
//! - `http_in_flight_requests`
//! - `http_request_duration_milliseconds{code,method}`

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing::info;

/// Requests under this prefix are measured but not logged.
pub const INTERNAL_PREFIX: &str = "/internal/";

const IN_FLIGHT_METRIC: &str = "http_in_flight_requests";
const REQUEST_DURATION_METRIC: &str = "http_request_duration_milliseconds";
const DURATION_BUCKETS_MS: &[f64] = &[1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0];

/// Install the global Prometheus recorder
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_METRIC.to_string()),
            DURATION_BUCKETS_MS,
        )?
        .install_recorder()
}

/// One unit of the in-flight gauge, released on drop.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        gauge!(IN_FLIGHT_METRIC).increment(1.0);
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_METRIC).decrement(1.0);
    }
}

/// Log and measure one request
pub async fn track_requests(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let method = req.method().to_string();
    let start = Instant::now();

    let in_flight = InFlight::enter();
    let response = next.run(req).await;
    drop(in_flight);

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();
    let code = status.to_string();

    counter!("http_requests_total", "code" => code.clone(), "method" => method.clone()).increment(1);
    histogram!(REQUEST_DURATION_METRIC, "code" => code, "method" => method.clone()).record(elapsed_ms);

    if !path.starts_with(INTERNAL_PREFIX) {
        info!(method = %method, path = %path, status, latency_ms = elapsed_ms, "request");
    }
    response
}
