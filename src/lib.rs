//! Async Rownd client: bearer-token validation against a cached remote key set, single-flight
//! application configuration, and user data management with a write-fenced record cache.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod client;
pub mod config;
pub mod http;
pub mod metrics;
pub mod model;
pub mod smart_link;
pub mod token;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::key_set::{KeySetCache, VerificationContext, WellKnownConfig},
	client::{RowndClient, init::InitState},
	config::{ConfigOverrides, Settings},
	error::{Error, Result},
	model::{AppConfig, CreateSmartLink, FetchUserInfo, RowndUser, SmartLink, UserInfo},
	token::{CLAIM_IS_VERIFIED_USER, CLAIM_USER_ID, Claims, ValidationResult},
};
