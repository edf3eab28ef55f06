//! HTTP front end for the sluice upload spooler.
//!
//! This crate provides:
//! - The explorer upload endpoint, streaming multipart bodies into the
//!   ingest pipeline
//! - Health and status endpoints
//! - The `sluiced` binary

pub mod activity;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use activity::ActivityTracker;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
