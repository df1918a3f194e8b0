//! HTTP boundary for the engine.
//!
//! The engine ships no router. This module lets any axum handler return an
//! [`EngineError`](crate::error::EngineError) directly and get the stable
//! status code and a JSON error body.

mod response;

pub use response::{ApiError, ApiErrorResponse};
