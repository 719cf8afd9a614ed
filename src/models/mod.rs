//! Response models for the demo server's admin endpoints.

pub mod responses;

pub use responses::{HealthResponse, StatsResponse, TimeResponse};
