//! HTTP front subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, concurrency limit)
//!     → request.rs (request ID, container Request)
//!     → Engine::invoke on a blocking worker
//!     → response.rs (container Response → axum Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
