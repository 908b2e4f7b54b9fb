//! Access logging valve.

use std::time::Instant;

use crate::observability::metrics;
use crate::pipeline::{Next, Valve, ValveError};
use crate::request::{Request, ServletRequest};
use crate::response::{Response, ServletResponse};

/// Logs one line per request once the rest of the pipeline has run, and
/// records request metrics.
#[derive(Debug, Default)]
pub struct AccessLogValve;

impl Valve for AccessLogValve {
    fn name(&self) -> &'static str {
        "access-log"
    }

    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), ValveError> {
        let start = Instant::now();
        let result = next.invoke(request, response);
        let method = request.method();

        tracing::info!(
            request_id = %request.request_id(),
            method = %method,
            uri = %request.request_uri(),
            host = %request.server_name(),
            status = response.status(),
            bytes = response.body().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        metrics::record_request(&method, response.status(), start);
        result
    }
}
