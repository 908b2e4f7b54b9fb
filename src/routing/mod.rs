//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (server name, decoded path)
//!     → mapper.rs (host lookup, longest context path, servlet mapping)
//!     → matcher.rs (evaluate host names, context prefixes, URL patterns)
//!     → Request mapping data (host, context, wrapper) or partial match
//! ```
//!
//! # Design Decisions
//! - Mapping runs before the engine pipeline; valves only read the result
//! - A partial match is not an error here; the owning valve emits the status
//! - Deterministic: same input always maps to the same wrapper

pub mod mapper;
pub mod matcher;

pub use mapper::Mapper;
pub use matcher::UrlPattern;
