//! Process-wide cache of verification contexts keyed by API origin.

// std
use std::{
	collections::HashMap,
	sync::{LazyLock, Mutex, PoisonError},
};
// crates.io
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::remote::RemoteKeySet,
	http::client::{Transport, join_path},
	metrics,
};

/// Discovery document location relative to the API origin.
pub const DISCOVERY_PATH: &str = "/hub/auth/.well-known/oauth-authorization-server";

static GLOBAL: LazyLock<KeySetCache> = LazyLock::new(KeySetCache::new);

/// OAuth authorization server metadata published by the platform.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellKnownConfig {
	pub issuer: String,
	pub jwks_uri: Url,
	#[serde(default)]
	pub token_endpoint: Option<String>,
	#[serde(default)]
	pub userinfo_endpoint: Option<String>,
	#[serde(default)]
	pub response_types_supported: Vec<String>,
	#[serde(default)]
	pub id_token_signing_alg_values_supported: Vec<String>,
	#[serde(default)]
	pub grant_types_supported: Vec<String>,
	#[serde(default)]
	pub subject_types_supported: Vec<String>,
	#[serde(default)]
	pub scopes_supported: Vec<String>,
	#[serde(default)]
	pub token_endpoint_auth_methods_supported: Vec<String>,
	#[serde(default)]
	pub claims_supported: Vec<String>,
	#[serde(default)]
	pub code_challenge_methods_supported: Vec<String>,
	#[serde(default)]
	pub introspection_endpoint_auth_methods_supported: Vec<String>,
	#[serde(default)]
	pub request_parameter_supported: Option<bool>,
	#[serde(default)]
	pub request_object_signing_alg_values_supported: Vec<String>,
}

/// Discovery document and remote key set for one origin.
#[derive(Debug)]
pub struct VerificationContext {
	/// Normalized origin the context was fetched for.
	pub origin: String,
	/// Discovery document.
	pub discovery: WellKnownConfig,
	/// Remote key set built from the discovery document's `jwks_uri`.
	pub keys: RemoteKeySet,
}

/// Origin-keyed verification contexts.
///
/// Entries are complete once visible and live for the lifetime of the cache. Concurrent lookups
/// for the same origin share a single discovery fetch; a failed fetch stores nothing.
#[derive(Debug, Default)]
pub struct KeySetCache {
	entries: Mutex<HashMap<String, Arc<OnceCell<Arc<VerificationContext>>>>>,
}
impl KeySetCache {
	/// Create an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Cache shared by every client in the process.
	pub fn global() -> &'static Self {
		&GLOBAL
	}

	/// Return the verification context for `origin`, fetching the discovery document on first use.
	#[tracing::instrument(skip(self, origin, transport), fields(origin = %origin))]
	pub async fn verification_context(
		&self,
		origin: &Url,
		transport: &Transport,
	) -> Result<Arc<VerificationContext>> {
		let key = normalize_origin(origin);
		let cell = {
			let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

			entries.entry(key.clone()).or_default().clone()
		};

		cell.get_or_try_init(|| fetch_context(key, origin, transport)).await.cloned()
	}

	/// Whether a context for `origin` has been stored.
	pub fn contains(&self, origin: &Url) -> bool {
		let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

		entries.get(&normalize_origin(origin)).is_some_and(|cell| cell.initialized())
	}
}

async fn fetch_context(
	key: String,
	origin: &Url,
	transport: &Transport,
) -> Result<Arc<VerificationContext>> {
	let discovery = async {
		let url = join_path(origin, DISCOVERY_PATH)?;

		transport.get::<WellKnownConfig>(url, HeaderMap::new()).await
	}
	.await;

	metrics::record_discovery_fetch(&key, discovery.is_ok());

	let discovery = discovery
		.map_err(|source| Error::DiscoveryFetch { origin: key.clone(), source: Box::new(source) })?;

	tracing::debug!(jwks_uri = %discovery.jwks_uri, "discovery document fetched");

	let keys = RemoteKeySet::new(discovery.jwks_uri.clone(), transport.clone());

	Ok(Arc::new(VerificationContext { origin: key, discovery, keys }))
}

fn normalize_origin(origin: &Url) -> String {
	origin.as_str().trim_end_matches('/').to_owned()
}
