//! HTTP API handlers for bowl-re

pub mod health;
pub mod recommendations;

pub use health::health_routes;
pub use recommendations::recommendation_routes;
