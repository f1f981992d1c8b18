//! REST API server module.
//!
//! Provides the HTTP surface (spec §6) for queuing and managing downloads,
//! serving completed files, and reading/writing runtime settings.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
