//! Container-provided classes, registered under the `system::` namespace.

use std::sync::Arc;
use std::time::Instant;

use crate::facade::{ConfigFacade, ContextFacade, UnitConfig};
use crate::filter::loader::ClassRegistry;
use crate::filter::{Filter, FilterChain};
use crate::listener::{RequestEvent, RequestListener};
use crate::request::{attribute_as, AttributeHolder, ServletRequest};
use crate::response::ServletResponse;
use crate::servlet::{DispatchError, Handler, ServletError};

/// Attribute holding the time a request entered its context.
pub const REQUEST_START_ATTR: &str = "valve.request.start";

/// Registry with every built-in class.
pub fn system_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry
        .register_restricted_filter("system::RequestDumper", || Ok(Box::new(RequestDumper)))
        .register_filter("system::AddHeader", || Ok(Box::new(AddHeader::default())))
        .register_handler("system::Echo", || Ok(Box::new(Echo)))
        .register_handler("system::Hello", || Ok(Box::new(Hello::default())))
        .register_handler("system::Include", || Ok(Box::new(Include::default())))
        .register_restricted_handler("system::ContextInfo", || {
            Ok(Box::new(ContextInfo::default()))
        })
        .register_listener("system::RequestTimer", || Ok(Box::new(RequestTimer)));
    registry
}

/// Logs the request line and attribute names, then continues the chain.
pub struct RequestDumper;

impl Filter for RequestDumper {
    fn do_filter(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
        chain: &mut FilterChain<'_>,
    ) -> Result<(), ServletError> {
        let mut names = request.attribute_names();
        names.sort();
        tracing::info!(
            method = %request.method(),
            uri = %request.request_uri(),
            context_path = %request.context_path(),
            servlet_path = %request.servlet_path(),
            path_info = ?request.path_info(),
            query = ?request.query_string(),
            attributes = ?names,
            "Request dump"
        );
        chain.do_filter(request, response)
    }
}

/// Sets one response header, named by the `name` and `value` init parameters.
#[derive(Default)]
pub struct AddHeader {
    header: Option<(String, String)>,
}

impl Filter for AddHeader {
    fn init(&mut self, config: &dyn UnitConfig) -> Result<(), ServletError> {
        let name = config
            .init_parameter("name")
            .ok_or_else(|| ServletError::failed("missing init parameter 'name'"))?;
        let value = config.init_parameter("value").unwrap_or_default();
        self.header = Some((name, value));
        Ok(())
    }

    fn do_filter(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
        chain: &mut FilterChain<'_>,
    ) -> Result<(), ServletError> {
        if let Some((name, value)) = &self.header {
            response.set_header(name, value);
        }
        chain.do_filter(request, response)
    }
}

/// Writes back what the container knows about the request.
pub struct Echo;

impl Handler for Echo {
    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        response.set_content_type("text/plain; charset=utf-8");
        let body = format!(
            "method: {}\nrequest_uri: {}\ncontext_path: {}\nservlet_path: {}\npath_info: {}\nquery_string: {}\n",
            request.method(),
            request.request_uri(),
            request.context_path(),
            request.servlet_path(),
            request.path_info().unwrap_or_default(),
            request.query_string().unwrap_or_default(),
        );
        response.write(body.as_bytes())?;
        Ok(())
    }
}

/// Writes a fixed greeting (init parameter `greeting`).
#[derive(Default)]
pub struct Hello {
    greeting: String,
}

impl Handler for Hello {
    fn init(&mut self, config: &ConfigFacade) -> Result<(), ServletError> {
        self.greeting = config
            .init_parameter("greeting")
            .unwrap_or_else(|| format!("Hello from {}", config.servlet_context().server_info()));
        Ok(())
    }

    fn service(
        &self,
        _request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        response.set_content_type("text/plain; charset=utf-8");
        response.write(self.greeting.as_bytes())?;
        response.write(b"\n")?;
        Ok(())
    }
}

/// Includes the context-relative path named by the `target` init parameter.
#[derive(Default)]
pub struct Include {
    target: String,
}

impl Handler for Include {
    fn init(&mut self, config: &ConfigFacade) -> Result<(), ServletError> {
        self.target = config
            .init_parameter("target")
            .ok_or_else(|| ServletError::failed("missing init parameter 'target'"))?;
        Ok(())
    }

    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let dispatcher = request
            .dispatcher(&self.target)
            .ok_or_else(|| DispatchError::NotMapped(self.target.clone()))?;
        response.set_content_type("text/plain; charset=utf-8");
        dispatcher.include(request, response)
    }
}

/// Describes the owning context. Restricted to privileged contexts.
#[derive(Default)]
pub struct ContextInfo {
    context: Option<ContextFacade>,
}

impl Handler for ContextInfo {
    fn init(&mut self, config: &ConfigFacade) -> Result<(), ServletError> {
        self.context = Some(config.servlet_context());
        Ok(())
    }

    fn service(
        &self,
        _request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| ServletError::Unavailable("not initialized".into()))?;
        let mut names = context.init_parameter_names();
        names.sort();
        response.set_content_type("text/plain; charset=utf-8");
        let body = format!(
            "context_path: {}\ndisplay_name: {}\nserver_info: {}\nparameters: {}\n",
            context.context_path(),
            context.display_name(),
            context.server_info(),
            names.join(","),
        );
        response.write(body.as_bytes())?;
        Ok(())
    }
}

/// Logs how long each request spent inside its context.
pub struct RequestTimer;

impl RequestListener for RequestTimer {
    fn request_initialized(&self, event: &mut RequestEvent<'_>) -> Result<(), ServletError> {
        event
            .request()
            .set_attribute(REQUEST_START_ATTR, Arc::new(Instant::now()));
        Ok(())
    }

    fn request_destroyed(&self, event: &mut RequestEvent<'_>) -> Result<(), ServletError> {
        let context = event.servlet_context().context_path().to_string();
        let request = event.request();
        if let Some(value) = request.attribute(REQUEST_START_ATTR) {
            if let Some(start) = attribute_as::<Instant>(&value) {
                tracing::debug!(
                    context = %context,
                    uri = %request.request_uri(),
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "Request timed"
                );
            }
        }
        Ok(())
    }
}
