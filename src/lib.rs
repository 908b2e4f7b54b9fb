//! Valve Engine: a request-processing container library

// Container tree
pub mod container;
pub mod dispatch;
pub mod pipeline;
pub mod routing;

// Units and their facades
pub mod builtin;
pub mod facade;
pub mod filter;
pub mod listener;
pub mod servlet;

// Request and response flavors
pub mod request;
pub mod response;

// Cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod messages;
pub mod native;
pub mod observability;

pub use config::schema::EngineConfig;
pub use container::{Deployer, Engine};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
