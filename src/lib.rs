//! Treasury relay library.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod scheduler;
pub mod treasury;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use config::schema::TreasuryConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use treasury::TreasuryService;
