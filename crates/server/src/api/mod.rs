//! HTTP endpoint modules.

mod health;
mod predict;

pub use health::{health, HealthResponse};
pub use predict::predict;
