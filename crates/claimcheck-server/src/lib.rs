//! Claimcheck server library: the Axum API layer, exported for the binary
//! and the integration tests.

pub mod api;

pub use api::{router, ApiError, AppState};
