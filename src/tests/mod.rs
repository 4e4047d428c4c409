//! Integration tests
//!
//! Everything runs against the real router over the in-memory storage; no
//! external services involved.

mod analytics;
mod links;
mod resolver;
