//! HTTP handlers, organized by concern.
//!
//! - `classify`: the classification endpoint and its wire contract
//! - `health`: health probes and the Prometheus metrics endpoint
//! - `router`: route table assembly
//! - `state`: shared service state injected into handlers

pub mod classify;
pub mod health;
pub mod router;
pub mod state;

pub use router::{build_api_routes, build_public_routes, build_router};
pub use state::{AppState, ServiceState};
