//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Load key → Wire treasury → Spawn scheduler → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → scheduler stops, HTTP server drains → Exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
