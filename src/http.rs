//! HTTP transport helpers for platform API calls.

pub mod client;
