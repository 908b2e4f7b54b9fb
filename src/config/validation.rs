//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (mappings reference declared filters and servlets)
//! - Validate URL patterns and context paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{ContextConfig, EngineConfig};
use crate::routing::UrlPattern;

/// One semantic problem, located by host and context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub location: String,
    pub message: String,
}

impl ValidationError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts", "request_secs must be > 0"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener", "max_connections must be > 0"));
    }

    let mut host_names = HashSet::new();
    for host in &config.hosts {
        if host.name.is_empty() {
            errors.push(ValidationError::new("hosts", "host name is empty"));
        } else if !host_names.insert(host.name.to_lowercase()) {
            errors.push(ValidationError::new(
                format!("host {}", host.name),
                "duplicate host name",
            ));
        }

        let mut paths = HashSet::new();
        for context in &host.contexts {
            let location = format!("host {} context {}", host.name, context.path);
            if !paths.insert(normalize_path(&context.path)) {
                errors.push(ValidationError::new(&location, "duplicate context path"));
            }
            validate_context(&location, context, &mut errors);
        }
    }

    let default_host = &config.engine.default_host;
    let declared = config.hosts.iter().any(|h| {
        h.name.eq_ignore_ascii_case(default_host)
            || h.aliases.iter().any(|a| a.eq_ignore_ascii_case(default_host))
    });
    if !config.hosts.is_empty() && !declared {
        errors.push(ValidationError::new(
            "engine",
            format!("default host {} is not declared", config.engine.default_host),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Context path as stored by the container: `/` and `` are the root (`""`),
/// trailing slashes dropped.
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

fn validate_context(location: &str, context: &ContextConfig, errors: &mut Vec<ValidationError>) {
    if !context.path.is_empty() && !context.path.starts_with('/') {
        errors.push(ValidationError::new(location, "context path must start with '/'"));
    }

    let mut filters = HashSet::new();
    for filter in &context.filters {
        if filter.class.trim().is_empty() {
            errors.push(ValidationError::new(
                location,
                format!("filter {} has an empty class", filter.name),
            ));
        }
        if !filters.insert(filter.name.as_str()) {
            errors.push(ValidationError::new(
                location,
                format!("duplicate filter name {}", filter.name),
            ));
        }
    }

    let mut servlets = HashSet::new();
    for servlet in &context.servlets {
        if servlet.class.trim().is_empty() {
            errors.push(ValidationError::new(
                location,
                format!("servlet {} has an empty class", servlet.name),
            ));
        }
        if !servlets.insert(servlet.name.as_str()) {
            errors.push(ValidationError::new(
                location,
                format!("duplicate servlet name {}", servlet.name),
            ));
        }
        for pattern in &servlet.mappings {
            if UrlPattern::parse(pattern).is_none() {
                errors.push(ValidationError::new(
                    location,
                    format!("servlet {} has invalid url pattern {}", servlet.name, pattern),
                ));
            }
        }
    }

    for mapping in &context.filter_mappings {
        if !filters.contains(mapping.filter.as_str()) {
            errors.push(ValidationError::new(
                location,
                format!("mapping names unknown filter {}", mapping.filter),
            ));
        }
        if mapping.url_patterns.is_empty() && mapping.servlet_names.is_empty() {
            errors.push(ValidationError::new(
                location,
                format!("mapping for filter {} has no url pattern or servlet name", mapping.filter),
            ));
        }
        for pattern in &mapping.url_patterns {
            if UrlPattern::parse(pattern).is_none() {
                errors.push(ValidationError::new(
                    location,
                    format!("mapping for filter {} has invalid url pattern {}", mapping.filter, pattern),
                ));
            }
        }
        for name in &mapping.servlet_names {
            if name != "*" && !servlets.contains(name.as_str()) {
                errors.push(ValidationError::new(
                    location,
                    format!("mapping for filter {} names unknown servlet {}", mapping.filter, name),
                ));
            }
        }
    }

    for class in &context.listeners {
        if class.trim().is_empty() {
            errors.push(ValidationError::new(location, "listener with an empty class"));
        }
    }
}
