//! Rownd client instance.
//!
//! A [`RowndClient`] owns one application configuration loader and one user-record cache. Token
//! validation goes through the process-wide [`KeySetCache`] and does not wait for initialization.

pub mod init;

// crates.io
use http::Method;
use serde_json::{Value, json};
use tokio::{runtime::Handle, time};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::{key_set::KeySetCache, user::UserRecordCache},
	client::init::{AppConfigLoader, InitState},
	config::{ConfigOverrides, Settings},
	http::client::Transport,
	model::{AppConfig, CreateSmartLink, FetchUserInfo, RowndUser, SmartLink, UserInfo},
	smart_link,
	token::{self, ValidationResult},
};

/// Client for the Rownd platform API.
///
/// Cloning is cheap; clones share initialization state and the user-record cache.
#[derive(Clone, Debug)]
pub struct RowndClient {
	inner: Arc<ClientInner>,
}
#[derive(Debug)]
struct ClientInner {
	settings: Arc<Settings>,
	transport: Transport,
	loader: Arc<AppConfigLoader>,
	users: UserRecordCache,
	key_sets: &'static KeySetCache,
}
impl RowndClient {
	/// Create a client from caller overrides merged over the process environment.
	///
	/// When called inside a Tokio runtime the application configuration fetch starts right away;
	/// otherwise it starts with the first operation that needs it.
	pub fn new(overrides: ConfigOverrides) -> Result<Self> {
		Self::with_settings(Settings::resolve(overrides)?)
	}

	/// Create a client from resolved settings.
	pub fn with_settings(settings: Settings) -> Result<Self> {
		Ok(Self::with_transport(settings, Transport::new()?))
	}

	/// Create a client that sends requests through `transport`.
	pub fn with_transport(settings: Settings, transport: Transport) -> Self {
		let settings = Arc::new(settings);
		let loader = AppConfigLoader::new(settings.clone(), transport.clone());

		if let Ok(runtime) = Handle::try_current() {
			loader.start(&runtime);
		}

		Self {
			inner: Arc::new(ClientInner {
				settings,
				transport,
				loader,
				users: UserRecordCache::new(),
				key_sets: KeySetCache::global(),
			}),
		}
	}

	/// Resolved settings.
	pub fn settings(&self) -> &Settings {
		&self.inner.settings
	}

	/// Initialization state of the application configuration.
	pub fn init_state(&self) -> InitState {
		self.inner.loader.state()
	}

	/// Wait for the application configuration without a timeout.
	pub async fn app_config(&self) -> Result<Arc<AppConfig>> {
		self.inner.loader.resolve().await
	}

	/// Validate a bearer token against the platform's published keys.
	pub async fn validate_token(&self, token: &str) -> Result<ValidationResult> {
		let inner = &self.inner;

		token::validate_token(inner.key_sets, &inner.transport, inner.settings.api_origin(), token)
			.await
	}

	/// Read a user's data, serving repeated reads from the per-client cache.
	///
	/// Records are cached per application, so reads with an explicit `app_id` never serve or
	/// replace records of the resolved application.
	#[tracing::instrument(skip_all, fields(user_id = %opts.user_id))]
	pub async fn fetch_user_info(&self, opts: FetchUserInfo) -> Result<Arc<UserInfo>> {
		let app = self.await_app_config().await?;
		let FetchUserInfo { user_id, app_id } = opts;
		let app_id = app_id.unwrap_or_else(|| app.id.clone());

		if app_id.is_empty() {
			return Err(Error::MissingAppId);
		}
		if let Some(record) = self.inner.users.get(&app_id, &user_id) {
			tracing::debug!("user record served from cache");

			return Ok(record);
		}

		let ticket = self.inner.users.begin_read(&app_id, &user_id);
		let url = self.user_data_url(&app_id, &user_id)?;
		let headers = self.inner.settings.credential_headers()?;
		let record = Arc::new(self.inner.transport.get::<UserInfo>(url, headers).await?);

		self.inner.users.complete_read(ticket, record.clone());

		Ok(record)
	}

	/// Replace a user's data.
	///
	/// The cached record for the user is evicted once the request completes, whatever its outcome.
	/// An empty or non-JSON success response yields an empty [`UserInfo`].
	#[tracing::instrument(skip_all, fields(user_id = %user.id))]
	pub async fn create_or_update_user(&self, user: RowndUser) -> Result<UserInfo> {
		let app = self.await_app_config().await?;
		let url = self.user_data_url(&app.id, &user.id)?;
		let headers = self.inner.settings.credential_headers()?;
		let body = json!({ "data": user.data });
		let result = self.inner.transport.request(Method::PUT, url, headers, Some(&body)).await;

		self.inner.users.invalidate(&app.id, &user.id);

		match result? {
			Value::Null => Ok(UserInfo::default()),
			body => Ok(serde_json::from_value(body)?),
		}
	}

	/// Delete a user's data and evict the cached record.
	#[tracing::instrument(skip(self))]
	pub async fn delete_user(&self, user_id: &str) -> Result<()> {
		let app = self.await_app_config().await?;
		let url = self.user_data_url(&app.id, user_id)?;
		let headers = self.inner.settings.credential_headers()?;
		let result = self.inner.transport.request(Method::DELETE, url, headers, None::<&()>).await;

		self.inner.users.invalidate(&app.id, user_id);

		result.map(drop)
	}

	/// Create a passwordless smart link; does not wait for initialization.
	pub async fn create_smart_link(&self, opts: CreateSmartLink) -> Result<SmartLink> {
		smart_link::create_smart_link(&self.inner.settings, &self.inner.transport, opts).await
	}

	/// Wait for the application configuration, giving up after the configured timeout.
	///
	/// Giving up does not stop the fetch; a later call picks up its result.
	async fn await_app_config(&self) -> Result<Arc<AppConfig>> {
		let timeout = self.inner.settings.timeout();

		time::timeout(timeout, self.inner.loader.resolve()).await.map_err(|_| {
			tracing::warn!(?timeout, "timed out waiting for app config");

			Error::InitializationTimeout { timeout_ms: timeout.as_millis() as u64 }
		})?
	}

	fn user_data_url(&self, app_id: &str, user_id: &str) -> Result<Url> {
		let mut url = self.inner.settings.endpoint("/applications")?;

		url.path_segments_mut()
			.map_err(|_| Error::Validation {
				field: "api_origin",
				reason: "Cannot be used as a base URL.".into(),
			})?
			.extend([app_id, "users", user_id, "data"]);

		Ok(url)
	}
}
