//! Request model subsystem.
//!
//! # Data Flow
//! ```text
//! axum::Request (http/request.rs)
//!     → connector.rs (container Request, mapping data attached by routing)
//!     → pipeline valves (engine → host → context → wrapper)
//!     → &mut dyn ServletRequest handed to filters and handlers
//!
//! Nested include/forward (dispatch.rs):
//!     &mut dyn ServletRequest
//!     → overlay.rs (AttributeOverlay shadows attributes + paths)
//!     → target filter chain
//! ```
//!
//! # Design Decisions
//! - Attribute values are opaque (`Arc<dyn Any>`); the container never inspects them
//! - `AttributeHolder` is the minimal capability the overlay needs
//! - Accessors return owned strings so wrappers can answer from behind a lock

pub mod connector;
pub mod globals;
pub mod overlay;

use std::any::Any;
use std::sync::Arc;

use crate::dispatch::RequestDispatcher;

pub use connector::{MappingData, Request};
pub use overlay::AttributeOverlay;

/// Opaque attribute value.
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// Minimal attribute read/write surface of a request.
pub trait AttributeHolder {
    fn attribute(&self, name: &str) -> Option<AttributeValue>;

    fn attribute_names(&self) -> Vec<String>;

    fn set_attribute(&mut self, name: &str, value: AttributeValue);

    fn remove_attribute(&mut self, name: &str);
}

/// Request view handed to filters, handlers and listeners.
pub trait ServletRequest: AttributeHolder + Send {
    fn method(&self) -> String;

    /// Request URI as received, without the query string.
    fn request_uri(&self) -> String;

    fn context_path(&self) -> String;

    fn servlet_path(&self) -> String;

    fn path_info(&self) -> Option<String>;

    fn query_string(&self) -> Option<String>;

    fn header(&self, name: &str) -> Option<String>;

    /// Dispatcher for a context-relative path, if the path maps to a unit.
    fn dispatcher(&self, path: &str) -> Option<RequestDispatcher>;
}

impl<T: AttributeHolder + ?Sized> AttributeHolder for &mut T {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        (**self).attribute(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        (**self).attribute_names()
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        (**self).set_attribute(name, value)
    }

    fn remove_attribute(&mut self, name: &str) {
        (**self).remove_attribute(name)
    }
}

impl<T: AttributeHolder + ?Sized> AttributeHolder for Box<T> {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        (**self).attribute(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        (**self).attribute_names()
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        (**self).set_attribute(name, value)
    }

    fn remove_attribute(&mut self, name: &str) {
        (**self).remove_attribute(name)
    }
}

impl<T: ServletRequest + ?Sized> ServletRequest for &mut T {
    fn method(&self) -> String {
        (**self).method()
    }

    fn request_uri(&self) -> String {
        (**self).request_uri()
    }

    fn context_path(&self) -> String {
        (**self).context_path()
    }

    fn servlet_path(&self) -> String {
        (**self).servlet_path()
    }

    fn path_info(&self) -> Option<String> {
        (**self).path_info()
    }

    fn query_string(&self) -> Option<String> {
        (**self).query_string()
    }

    fn header(&self, name: &str) -> Option<String> {
        (**self).header(name)
    }

    fn dispatcher(&self, path: &str) -> Option<RequestDispatcher> {
        (**self).dispatcher(path)
    }
}

impl<T: ServletRequest + ?Sized> ServletRequest for Box<T> {
    fn method(&self) -> String {
        (**self).method()
    }

    fn request_uri(&self) -> String {
        (**self).request_uri()
    }

    fn context_path(&self) -> String {
        (**self).context_path()
    }

    fn servlet_path(&self) -> String {
        (**self).servlet_path()
    }

    fn path_info(&self) -> Option<String> {
        (**self).path_info()
    }

    fn query_string(&self) -> Option<String> {
        (**self).query_string()
    }

    fn header(&self, name: &str) -> Option<String> {
        (**self).header(name)
    }

    fn dispatcher(&self, path: &str) -> Option<RequestDispatcher> {
        (**self).dispatcher(path)
    }
}

/// Downcast helper for attribute values.
pub fn attribute_as<T: Any + Send + Sync>(value: &AttributeValue) -> Option<&T> {
    value.downcast_ref::<T>()
}
