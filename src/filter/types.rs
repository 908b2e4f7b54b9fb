//! Filter declarations, mappings and error definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::matcher::UrlPattern;
use crate::servlet::ServletError;

/// Immutable filter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDef {
    /// Unique within the owning context.
    pub name: String,
    /// Class identifier resolved by the loaders.
    pub class: String,
    pub parameters: HashMap<String, String>,
}

impl FilterDef {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// How a request reached the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherType {
    Request,
    Include,
    Forward,
}

/// Maps a filter onto URL patterns and/or servlet names.
#[derive(Debug, Clone)]
pub struct FilterMap {
    pub filter_name: String,
    pub url_patterns: Vec<UrlPattern>,
    /// Servlet names; `*` matches every servlet.
    pub servlet_names: Vec<String>,
    /// Empty means `Request` only.
    pub dispatchers: Vec<DispatcherType>,
}

impl FilterMap {
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            filter_name: filter_name.into(),
            url_patterns: Vec::new(),
            servlet_names: Vec::new(),
            dispatchers: Vec::new(),
        }
    }

    pub fn with_url_pattern(mut self, pattern: UrlPattern) -> Self {
        self.url_patterns.push(pattern);
        self
    }

    pub fn with_servlet_name(mut self, name: impl Into<String>) -> Self {
        self.servlet_names.push(name.into());
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherType) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn applies_to(&self, dispatcher: DispatcherType) -> bool {
        if self.dispatchers.is_empty() {
            dispatcher == DispatcherType::Request
        } else {
            self.dispatchers.contains(&dispatcher)
        }
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.url_patterns.iter().any(|p| p.matches(path))
    }

    pub fn matches_servlet(&self, servlet_name: &str) -> bool {
        self.servlet_names
            .iter()
            .any(|n| n == "*" || n == servlet_name)
    }
}

/// Errors bringing a unit (filter, handler, listener) online.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The unit has no definition bound to it.
    #[error("no definition bound to unit")]
    MissingDefinition,

    #[error("class {class} not found")]
    ClassNotFound { class: String },

    #[error("cannot instantiate class {class}: {reason}")]
    Instantiation { class: String, reason: String },

    /// Restricted container class requested by an unprivileged context.
    #[error("access to class {class} denied for context '{context}'")]
    Access { class: String, context: String },

    #[error("unit {name} failed to initialize: {source}")]
    Init {
        name: String,
        #[source]
        source: Box<ServletError>,
    },

    /// The owning context has been stopped; no new instances are created.
    #[error("context '{context}' is stopped")]
    Stopped { context: String },
}
