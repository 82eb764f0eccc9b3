// Tsubame offline caching orchestrator library

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod expiration;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod logging;
pub mod precache;
pub mod reload;
pub mod request;
pub mod router;
pub mod server;
pub mod strategy;
