//! HTTP API Module
//!
//! Provides a REST API for session lookups and state or role changes.

mod http;

pub use http::{HttpServer, LocateRequest};
