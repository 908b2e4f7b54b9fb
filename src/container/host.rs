//! Virtual host: a set of contexts under one server name and its aliases.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::container::Context;
use crate::pipeline::{HostValve, Pipeline};
use crate::routing::matcher::{HostMatcher, Matcher};

pub struct Host {
    name: String,
    aliases: Vec<String>,
    matcher: HostMatcher,
    /// Longest context path first.
    contexts: ArcSwap<Vec<Arc<Context>>>,
    pipeline: Pipeline,
}

impl Host {
    pub fn new(name: &str, aliases: &[String]) -> Self {
        let name = name.to_lowercase();
        let matcher = HostMatcher::new(
            std::iter::once(name.as_str()).chain(aliases.iter().map(String::as_str)),
        );
        Self {
            name,
            aliases: aliases.to_vec(),
            matcher,
            contexts: ArcSwap::from_pointee(Vec::new()),
            pipeline: Pipeline::new(Arc::new(HostValve)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn matches(&self, server_name: &str) -> bool {
        self.matcher.matches(server_name)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn contexts(&self) -> Arc<Vec<Arc<Context>>> {
        self.contexts.load_full()
    }

    pub fn find_context(&self, path: &str) -> Option<Arc<Context>> {
        self.contexts.load().iter().find(|c| c.path() == path).cloned()
    }

    /// Longest context path that prefixes `path`.
    pub fn map_context(&self, path: &str) -> Option<Arc<Context>> {
        self.contexts.load().iter().find(|c| c.matches(path)).cloned()
    }

    /// Add a context, replacing any context with the same path.
    pub fn add_context(&self, context: Arc<Context>) {
        self.contexts.rcu(|contexts| {
            let mut next: Vec<Arc<Context>> = contexts
                .iter()
                .filter(|c| c.path() != context.path())
                .cloned()
                .collect();
            next.push(context.clone());
            next.sort_by(|a, b| b.path().len().cmp(&a.path().len()));
            next
        });
    }

    pub fn remove_context(&self, path: &str) -> Option<Arc<Context>> {
        let removed = self.find_context(path);
        self.contexts.rcu(|contexts| {
            contexts
                .iter()
                .filter(|c| c.path() != path)
                .cloned()
                .collect::<Vec<_>>()
        });
        removed
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish()
    }
}
