//! Web layer for the reconciliation server.
//!
//! One POST endpoint per contributor plus health and status probes.

mod routes;
mod state;

pub use routes::{AppError, create_router};
pub use state::AppState;
