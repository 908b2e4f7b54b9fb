//! Host stage: context selection and error handling for recorded failures.

use crate::messages::message;
use crate::pipeline::{Next, Valve, ValveError};
use crate::request::globals::{RecordedFailure, EXCEPTION_ATTR};
use crate::request::{attribute_as, AttributeHolder, Request};
use crate::response::{emit_error, Response, ServletResponse};

#[derive(Debug, Default)]
pub struct HostValve;

impl Valve for HostValve {
    fn name(&self) -> &'static str {
        "host"
    }

    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        _next: Next<'_>,
    ) -> Result<(), ValveError> {
        let Some(context) = request.context().cloned() else {
            tracing::debug!(
                request_id = %request.request_id(),
                path = %request.decoded_path(),
                "No context matched"
            );
            emit_error(response, 500, &message("host.noContext", &[]));
            return Ok(());
        };

        context.pipeline().invoke(request, response)?;

        // A failure recorded deeper down that nobody reported yet becomes a 500
        if !response.is_error() && !response.is_committed() {
            if let Some(value) = request.attribute(EXCEPTION_ATTR) {
                let text = attribute_as::<RecordedFailure>(&value)
                    .map(|f| f.message.clone())
                    .unwrap_or_default();
                emit_error(response, 500, &text);
            }
        }
        Ok(())
    }
}
