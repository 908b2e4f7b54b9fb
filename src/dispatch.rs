//! Nested include and forward.
//!
//! # Include
//! ```text
//! caller request ──► AttributeOverlay (javax.servlet.include.* local)
//! caller response ─► ResponseGuard (included: header/length/type changes ignored)
//!                    └─► target filter chain (INCLUDE) ─► target handler
//! ```
//!
//! # Forward
//! ```text
//! committed? ─► DispatchError::Committed
//! reset response
//! caller request ──► AttributeOverlay (target paths, javax.servlet.forward.* = original)
//! caller response ─► ResponseGuard (not included)
//!                    └─► target filter chain (FORWARD) ─► target handler
//! flush response
//! ```

use std::sync::Arc;

use crate::container::{Context, Wrapper};
use crate::filter::{DispatcherType, FilterChain};
use crate::request::globals::{
    FORWARD_CONTEXT_PATH, FORWARD_PATH_INFO, FORWARD_QUERY_STRING, FORWARD_REQUEST_URI,
    FORWARD_SERVLET_PATH, INCLUDE_CONTEXT_PATH, INCLUDE_PATH_INFO, INCLUDE_QUERY_STRING,
    INCLUDE_REQUEST_URI, INCLUDE_SERVLET_PATH,
};
use crate::request::overlay::PathOverrides;
use crate::request::{AttributeHolder, AttributeOverlay, AttributeValue, ServletRequest};
use crate::response::{ResponseGuard, ServletResponse};
use crate::servlet::{DispatchError, ServletError};

/// Dispatcher to one wrapper of a context, for a fixed target path.
pub struct RequestDispatcher {
    context: Arc<Context>,
    wrapper: Arc<Wrapper>,
    request_uri: String,
    servlet_path: String,
    path_info: Option<String>,
    query_string: Option<String>,
}

fn text(value: impl Into<String>) -> AttributeValue {
    Arc::new(value.into())
}

impl RequestDispatcher {
    pub fn new(
        context: Arc<Context>,
        wrapper: Arc<Wrapper>,
        request_uri: String,
        servlet_path: String,
        path_info: Option<String>,
        query_string: Option<String>,
    ) -> Self {
        Self {
            context,
            wrapper,
            request_uri,
            servlet_path,
            path_info,
            query_string,
        }
    }

    pub fn wrapper_name(&self) -> &str {
        self.wrapper.name()
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    /// Run the target inside the caller's response.
    pub fn include(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let mut overlay = AttributeOverlay::new(&mut *request);
        overlay.set(INCLUDE_REQUEST_URI, text(self.request_uri.as_str()));
        overlay.set(INCLUDE_CONTEXT_PATH, text(self.context.path()));
        overlay.set(INCLUDE_SERVLET_PATH, text(self.servlet_path.as_str()));
        match &self.path_info {
            Some(info) => overlay.set(INCLUDE_PATH_INFO, text(info.as_str())),
            None => overlay.remove(INCLUDE_PATH_INFO),
        }
        match &self.query_string {
            Some(query) => overlay.set(INCLUDE_QUERY_STRING, text(query.as_str())),
            None => overlay.remove(INCLUDE_QUERY_STRING),
        }

        let mut guard = ResponseGuard::new(&mut *response, true);
        tracing::debug!(
            context = %self.context.path(),
            servlet = %self.wrapper.name(),
            uri = %self.request_uri,
            "Include"
        );
        self.invoke(&mut overlay, &mut guard, DispatcherType::Include)
    }

    /// Hand the request over to the target; the caller must not write afterwards.
    pub fn forward(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        if response.is_committed() {
            return Err(DispatchError::Committed.into());
        }
        response.reset()?;

        // Nested forwards keep the values of the first one
        let first_forward = request.attribute(FORWARD_REQUEST_URI).is_none();
        let original = [
            (FORWARD_REQUEST_URI, Some(request.request_uri())),
            (FORWARD_CONTEXT_PATH, Some(request.context_path())),
            (FORWARD_SERVLET_PATH, Some(request.servlet_path())),
            (FORWARD_PATH_INFO, request.path_info()),
            (FORWARD_QUERY_STRING, request.query_string()),
        ];
        let query_string = self.query_string.clone().or_else(|| request.query_string());

        let mut overlay = AttributeOverlay::new(&mut *request).with_paths(PathOverrides {
            request_uri: self.request_uri.clone(),
            servlet_path: self.servlet_path.clone(),
            path_info: self.path_info.clone(),
            query_string,
        });
        if first_forward {
            for (name, value) in original {
                if let Some(value) = value {
                    overlay.set(name, text(value));
                }
            }
        }

        tracing::debug!(
            context = %self.context.path(),
            servlet = %self.wrapper.name(),
            uri = %self.request_uri,
            "Forward"
        );
        {
            let mut guard = ResponseGuard::new(&mut *response, false);
            self.invoke(&mut overlay, &mut guard, DispatcherType::Forward)?;
        }
        response.flush_buffer();
        Ok(())
    }

    fn invoke(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
        dispatcher: DispatcherType,
    ) -> Result<(), ServletError> {
        if !self.wrapper.is_available() {
            return Err(ServletError::Unavailable(self.wrapper.name().to_string()));
        }
        let handler = self.wrapper.allocate()?;
        let relative = match &self.path_info {
            Some(info) => format!("{}{}", self.servlet_path, info),
            None => self.servlet_path.clone(),
        };
        let filters = self
            .context
            .filter_chain(&self.wrapper, &relative, dispatcher)?;
        FilterChain::new(&filters, handler.as_ref()).do_filter(request, response)
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("context", &self.context.path())
            .field("wrapper", &self.wrapper.name())
            .field("request_uri", &self.request_uri)
            .finish()
    }
}
