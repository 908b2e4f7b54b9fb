//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → container::Deployer builds the engine tree
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the HTTP server task
//!     → Engine::apply_config reloads each context under its pause gate
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{ContextConfig, EngineConfig, HostConfig, ListenerConfig, ObservabilityConfig};
