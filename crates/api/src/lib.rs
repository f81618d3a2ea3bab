//! Gift API
//!
//! Axum routes and middleware for the VIP gift order orchestrator.

pub mod handlers;
pub mod router;
pub mod security;
pub mod state;

pub use router::create_router;
pub use state::AppState;
