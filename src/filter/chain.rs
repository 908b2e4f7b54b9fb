//! Filter chain for one dispatch.

use std::sync::Arc;

use crate::filter::Filter;
use crate::request::ServletRequest;
use crate::response::ServletResponse;
use crate::servlet::{Handler, ServletError};

/// Ordered filters ending in a handler. Each filter continues the chain by
/// calling [`FilterChain::do_filter`]; not calling it short-circuits.
pub struct FilterChain<'a> {
    filters: &'a [Arc<dyn Filter>],
    position: usize,
    handler: &'a dyn Handler,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], handler: &'a dyn Handler) -> Self {
        Self {
            filters,
            position: 0,
            handler,
        }
    }

    pub fn do_filter(
        &mut self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let filters = self.filters;
        match filters.get(self.position) {
            Some(filter) => {
                self.position += 1;
                filter.do_filter(request, response, self)
            }
            None => self.handler.service(request, response),
        }
    }
}
