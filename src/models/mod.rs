//! Request and Response models for the log viewer API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! deserializing query parameters and serializing response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::PageParams;
pub use responses::{ErrorResponse, HealthResponse, MediaResponse, StatsResponse};
