//! # cached-updater-server
//!
//! HTTP front for the caches in `cached-updater-core`: a report refreshed
//! from an upstream endpoint on a timer, and Keycloak user lookups answered
//! from a TTL cache.

pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod producer;
pub mod server;

pub use config::AppConfig;
pub use error::ServerError;
pub use server::{AppState, build_app, run, serve};
