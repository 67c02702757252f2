//! API Module
//!
//! HTTP handlers and routing for the log viewer REST API. Every endpoint
//! except `/health` and `/stats` acts on behalf of the user named in the
//! [`USER_HEADER`] header.
//!
//! # Endpoints
//! - `GET /messages`, `GET /calls`, `GET /alerts` - One page of records
//! - `GET /messages/:sid`, `GET /calls/:sid` - A single record
//! - `GET /messages/:sid/media` - Sealed media paths for a message
//! - `GET /calls/:sid/recordings` - Recordings made during a call
//! - `GET /stats` - Cache and prefetch statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
