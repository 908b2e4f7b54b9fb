//! Wrapper stage: allocate the handler, build the filter chain, run it.

use crate::filter::{DispatcherType, FilterChain, UnitError};
use crate::messages::message;
use crate::pipeline::{record_failure, Next, Valve, ValveError};
use crate::request::Request;
use crate::response::{emit_error, Response};
use crate::servlet::ServletError;

#[derive(Debug, Default)]
pub struct WrapperValve;

fn status_for(error: &ServletError) -> u16 {
    match error {
        ServletError::Unavailable(_) | ServletError::Unit(UnitError::Stopped { .. }) => 503,
        ServletError::Unit(UnitError::Access { .. }) => 403,
        _ => 500,
    }
}

impl Valve for WrapperValve {
    fn name(&self) -> &'static str {
        "wrapper"
    }

    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        _next: Next<'_>,
    ) -> Result<(), ValveError> {
        let (Some(context), Some(wrapper)) =
            (request.context().cloned(), request.wrapper().cloned())
        else {
            emit_error(response, 404, &message("context.notFound", &[&request.decoded_path()]));
            return Ok(());
        };

        if !wrapper.is_available() {
            emit_error(response, 503, &message("wrapper.unavailable", &[&wrapper.name()]));
            return Ok(());
        }

        let handler = match wrapper.allocate() {
            Ok(handler) => handler,
            Err(e) => {
                let text = message("wrapper.serviceError", &[&wrapper.name(), &e]);
                tracing::error!(
                    request_id = %request.request_id(),
                    context = %context.path(),
                    servlet = %wrapper.name(),
                    "{}",
                    text
                );
                record_failure(request, wrapper.name(), &e);
                let status = status_for(&e);
                if status == 403 {
                    let uri = request.decoded_path().to_string();
                    emit_error(response, status, &message("wrapper.forbidden", &[&uri]));
                } else {
                    emit_error(response, status, &text);
                }
                return Ok(());
            }
        };

        let relative = context.relative_path(request.decoded_path()).to_string();
        let filters = match context.filter_chain(&wrapper, &relative, DispatcherType::Request) {
            Ok(filters) => filters,
            Err(e) => {
                let text = message("wrapper.filterError", &[&wrapper.name(), &e]);
                tracing::error!(
                    request_id = %request.request_id(),
                    context = %context.path(),
                    servlet = %wrapper.name(),
                    "{}",
                    text
                );
                record_failure(request, wrapper.name(), &e);
                let status = if matches!(e, UnitError::Stopped { .. }) { 503 } else { 500 };
                emit_error(response, status, &text);
                return Ok(());
            }
        };

        let result = FilterChain::new(&filters, handler.as_ref()).do_filter(request, response);
        if let Err(e) = result {
            if matches!(e, ServletError::Unavailable(_)) {
                wrapper.set_available(false);
            }
            let text = message("wrapper.serviceError", &[&wrapper.name(), &e]);
            tracing::error!(
                request_id = %request.request_id(),
                context = %context.path(),
                servlet = %wrapper.name(),
                "{}",
                text
            );
            record_failure(request, wrapper.name(), &e);
            emit_error(response, status_for(&e), &text);
        }
        Ok(())
    }
}
