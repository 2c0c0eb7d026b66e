// Job Board Aggregator - API Core
//
// HTTP surface and wiring for the aggregator library: configuration,
// long-lived dependencies, the per-request job search workflow and routes.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
