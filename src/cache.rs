//! In-memory caches: process-wide verification contexts and per-client user records.

pub mod key_set;
pub mod remote;
pub mod user;
