//! Lazily fetched remote JSON Web Key Set.

// crates.io
use http::HeaderMap;
use jsonwebtoken::{
	Algorithm,
	jwk::{Jwk, JwkSet},
};
use tokio::sync::{Mutex, RwLock};
use url::Url;
// self
use crate::{_prelude::*, http::client::Transport, metrics};

/// Minimum spacing between two fetches triggered by unknown key ids.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);
/// Age after which a fetched key set is refreshed on next use.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
struct Fetched {
	jwks: Arc<JwkSet>,
	fetched_at: Instant,
}

/// Handle on a remote key set that is fetched on first use and re-fetched when a token names a key
/// the current set does not contain.
#[derive(Debug)]
pub struct RemoteKeySet {
	jwks_uri: Url,
	transport: Transport,
	cooldown: Duration,
	max_age: Duration,
	current: RwLock<Option<Fetched>>,
	single_flight: Mutex<()>,
}
impl RemoteKeySet {
	/// Create a handle; nothing is fetched until the first lookup.
	pub fn new(jwks_uri: Url, transport: Transport) -> Self {
		Self {
			jwks_uri,
			transport,
			cooldown: DEFAULT_COOLDOWN,
			max_age: DEFAULT_MAX_AGE,
			current: RwLock::new(None),
			single_flight: Mutex::new(()),
		}
	}

	/// Override the refetch cooldown.
	pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
		self.cooldown = cooldown;

		self
	}

	/// Override the maximum key set age.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;

		self
	}

	/// Key set endpoint.
	pub fn jwks_uri(&self) -> &Url {
		&self.jwks_uri
	}

	/// Find the key matching `kid` and `alg`, fetching or refreshing the set when needed.
	#[tracing::instrument(skip(self), fields(jwks_uri = %self.jwks_uri))]
	pub async fn resolve(&self, kid: Option<&str>, alg: Algorithm) -> Result<Jwk> {
		let current = { self.current.read().await.clone() };
		let now = Instant::now();
		let observed = match current {
			Some(fetched) if now.duration_since(fetched.fetched_at) < self.max_age => {
				if let Some(jwk) = select_key(&fetched.jwks, kid, alg) {
					return Ok(jwk);
				}

				tracing::debug!("no matching key in cached set; refreshing");

				Some(fetched.fetched_at)
			},
			Some(fetched) => Some(fetched.fetched_at),
			None => None,
		};
		let jwks = self.refresh(observed).await?;

		select_key(&jwks, kid, alg).ok_or_else(|| {
			Error::SignatureInvalid(format!(
				"No key matching kid {kid:?} and algorithm {alg:?} in the remote key set."
			))
		})
	}

	/// Fetch a fresh key set unless another caller already did since `observed`, or the cooldown
	/// has not elapsed yet.
	async fn refresh(&self, observed: Option<Instant>) -> Result<Arc<JwkSet>> {
		let _guard = self.single_flight.lock().await;

		let current = { self.current.read().await.clone() };

		if let Some(fetched) = current {
			let refreshed_by_peer = observed.is_none_or(|seen| fetched.fetched_at > seen);
			let cooling_down = fetched.fetched_at.elapsed() < self.cooldown;

			if refreshed_by_peer || cooling_down {
				return Ok(fetched.jwks);
			}
		}

		let result = self.transport.get::<JwkSet>(self.jwks_uri.clone(), HeaderMap::new()).await;

		metrics::record_jwks_fetch(result.is_ok());

		let jwks = Arc::new(result?);

		tracing::debug!(keys = jwks.keys.len(), "remote key set fetched");

		*self.current.write().await = Some(Fetched { jwks: jwks.clone(), fetched_at: Instant::now() });

		Ok(jwks)
	}
}

fn select_key(jwks: &JwkSet, kid: Option<&str>, alg: Algorithm) -> Option<Jwk> {
	jwks.keys
		.iter()
		.filter(|jwk| match kid {
			Some(kid) => jwk.common.key_id.as_deref() == Some(kid),
			None => true,
		})
		.find(|jwk| match &jwk.common.key_algorithm {
			Some(key_alg) => format!("{key_alg:?}") == format!("{alg:?}"),
			None => true,
		})
		.cloned()
}
