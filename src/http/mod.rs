//! HTTP adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, timeouts, graceful shutdown)
//!     → handlers.rs (JSON in/out)
//!     → TreasuryService
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
