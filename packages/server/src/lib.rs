// URL Risk Scoring - API Core
//
// Serves classifier predictions over the url-features extraction pipeline.
// The model handle is loaded once at startup and shared read-only.

pub mod config;
pub mod server;

pub use config::*;
