//! Request lifecycle listeners.

use std::sync::Arc;

use crate::facade::ContextFacade;
use crate::request::ServletRequest;
use crate::servlet::ServletError;

/// Observer notified when a request enters and leaves a context.
pub trait RequestListener: Send + Sync {
    fn request_initialized(&self, event: &mut RequestEvent<'_>) -> Result<(), ServletError>;

    fn request_destroyed(&self, event: &mut RequestEvent<'_>) -> Result<(), ServletError>;
}

/// A listener registered on a context, with the class id it was loaded from.
#[derive(Clone)]
pub struct ListenerEntry {
    pub name: String,
    pub listener: Arc<dyn RequestListener>,
}

impl ListenerEntry {
    pub fn new(name: impl Into<String>, listener: Arc<dyn RequestListener>) -> Self {
        Self {
            name: name.into(),
            listener,
        }
    }
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry").field("name", &self.name).finish()
    }
}

/// Event shared by every listener for one request at one context.
pub struct RequestEvent<'a> {
    context: ContextFacade,
    request: &'a mut dyn ServletRequest,
}

impl<'a> RequestEvent<'a> {
    pub fn new(context: ContextFacade, request: &'a mut dyn ServletRequest) -> Self {
        Self { context, request }
    }

    pub fn servlet_context(&self) -> &ContextFacade {
        &self.context
    }

    pub fn request(&mut self) -> &mut dyn ServletRequest {
        &mut *self.request
    }
}
