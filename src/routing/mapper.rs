//! Request mapping: server name → host, path → context → wrapper.
//!
//! # Responsibilities
//! - Hold the engine's current host set
//! - Attach host, context and wrapper selections to a request
//! - Re-map after a held request resumes (the scope may have been reloaded)
//!
//! # Design Decisions
//! - Host set swapped atomically (arc-swap); lookups never block on reloads
//! - Unknown server names fall back to the default host
//! - Contexts are tried longest path first

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::container::{Context, Host};
use crate::request::Request;

pub struct Mapper {
    hosts: ArcSwap<Vec<Arc<Host>>>,
    default_host: ArcSwap<String>,
}

impl Mapper {
    pub fn new(default_host: &str) -> Self {
        Self {
            hosts: ArcSwap::from_pointee(Vec::new()),
            default_host: ArcSwap::from_pointee(default_host.to_lowercase()),
        }
    }

    pub fn default_host(&self) -> String {
        self.default_host.load().as_ref().clone()
    }

    pub fn set_default_host(&self, name: &str) {
        self.default_host.store(Arc::new(name.to_lowercase()));
    }

    pub fn hosts(&self) -> Arc<Vec<Arc<Host>>> {
        self.hosts.load_full()
    }

    /// Add a host, replacing any host of the same name.
    pub fn add_host(&self, host: Arc<Host>) {
        self.hosts.rcu(|hosts| {
            let mut next: Vec<Arc<Host>> = hosts
                .iter()
                .filter(|h| h.name() != host.name())
                .cloned()
                .collect();
            next.push(host.clone());
            next
        });
    }

    pub fn remove_host(&self, name: &str) -> Option<Arc<Host>> {
        let removed = self.hosts.load().iter().find(|h| h.name() == name).cloned();
        self.hosts.rcu(|hosts| {
            hosts
                .iter()
                .filter(|h| h.name() != name)
                .cloned()
                .collect::<Vec<_>>()
        });
        removed
    }

    pub fn find_host(&self, server_name: &str) -> Option<Arc<Host>> {
        let hosts = self.hosts.load();
        hosts
            .iter()
            .find(|h| h.matches(server_name))
            .or_else(|| {
                let default_host = self.default_host.load();
                hosts.iter().find(|h| h.matches(default_host.as_str()))
            })
            .cloned()
    }

    /// Attach host, context and wrapper selections to `request`.
    pub fn map(&self, request: &mut Request) {
        let host = self.find_host(request.server_name());
        let context = host
            .as_ref()
            .and_then(|h| h.map_context(request.decoded_path()));
        request.set_host(host);
        request.set_context(context.clone());
        match context {
            Some(context) => map_wrapper(&context, request),
            None => request.set_wrapper(None, String::new(), None),
        }
    }
}

/// Select the wrapper within `context` for the request's path.
pub fn map_wrapper(context: &Context, request: &mut Request) {
    let relative = context.relative_path(request.decoded_path()).to_string();
    match context.map_wrapper(&relative) {
        Some((wrapper, servlet_path, path_info)) => {
            request.set_wrapper(Some(wrapper), servlet_path, path_info)
        }
        None => request.set_wrapper(None, String::new(), None),
    }
}
