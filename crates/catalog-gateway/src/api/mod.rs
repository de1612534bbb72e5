//! Jikan API v4 access.
//!
//! This module provides the HTTP transport the gateway drives and the payload
//! types the catalog layer decodes into.

pub mod client;
pub mod types;

pub use client::{HttpTransport, Params, Transport};
pub use types::*;
