//! HTTP trigger surface
//!
//! The original deployment receives trigger events from a notification
//! topic; here the same event envelope arrives over HTTP. Per-request
//! failures are structured error responses, never process exits.

pub mod handlers;
pub mod state;

pub use handlers::create_router;
pub use state::AppState;
