//! Client settings resolution.
//!
//! Caller overrides are merged over process defaults into an immutable [`Settings`] value that is
//! shared by everything a client instance does.

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Default platform API origin.
pub const DEFAULT_API_ORIGIN: &str = "https://api.rownd.io";
/// Default wait applied to application configuration initialization.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Header carrying the application key.
pub const APP_KEY_HEADER: HeaderName = HeaderName::from_static("x-rownd-app-key");
/// Header carrying the application secret.
pub const APP_SECRET_HEADER: HeaderName = HeaderName::from_static("x-rownd-app-secret");

const ENV_APP_KEY: [&str; 2] = ["ROWND_APP_KEY", "APP_KEY"];
const ENV_APP_SECRET: [&str; 2] = ["ROWND_APP_SECRET", "APP_SECRET"];
const ENV_TIMEOUT: [&str; 2] = ["ROWND_TIMEOUT", "TIMEOUT"];

/// Caller-supplied settings; every unset field falls back to the environment or a default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
	/// Platform API origin, e.g. `https://api.rownd.io`.
	#[serde(default, alias = "api_url")]
	pub api_origin: Option<String>,
	/// Application key sent as `x-rownd-app-key`.
	#[serde(default)]
	pub app_key: Option<String>,
	/// Application secret sent as `x-rownd-app-secret`.
	#[serde(default)]
	pub app_secret: Option<String>,
	/// Initialization timeout in milliseconds.
	#[serde(default, alias = "timeout")]
	pub timeout_ms: Option<u64>,
}
impl ConfigOverrides {
	/// Create an empty override set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Override the API origin.
	pub fn api_origin(mut self, api_origin: impl Into<String>) -> Self {
		self.api_origin = Some(api_origin.into());

		self
	}

	/// Override the application key.
	pub fn app_key(mut self, app_key: impl Into<String>) -> Self {
		self.app_key = Some(app_key.into());

		self
	}

	/// Override the application secret.
	pub fn app_secret(mut self, app_secret: impl Into<String>) -> Self {
		self.app_secret = Some(app_secret.into());

		self
	}

	/// Override the initialization timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);

		self
	}
}

/// Immutable settings consumed by a client instance.
#[derive(Clone, Debug)]
pub struct Settings {
	api_origin: Url,
	app_key: Option<String>,
	app_secret: Option<String>,
	timeout: Duration,
}
impl Settings {
	/// Merge `overrides` over the process environment and built-in defaults.
	pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
		Self::resolve_with(overrides, |name| std::env::var(name).ok())
	}

	/// Merge `overrides` over defaults read through `lookup` instead of the process environment.
	pub fn resolve_with<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let first = |names: [&str; 2]| names.into_iter().find_map(|name| lookup(name));
		let api_origin = overrides.api_origin.as_deref().unwrap_or(DEFAULT_API_ORIGIN);
		let api_origin = Url::parse(api_origin)?;
		let app_key = overrides.app_key.or_else(|| first(ENV_APP_KEY));
		let app_secret = overrides.app_secret.or_else(|| first(ENV_APP_SECRET));
		let timeout = match overrides.timeout_ms {
			Some(ms) => Duration::from_millis(ms),
			None => match first(ENV_TIMEOUT) {
				Some(raw) => parse_timeout(&raw)?,
				None => DEFAULT_TIMEOUT,
			},
		};
		let settings = Self { api_origin, app_key, app_secret, timeout };

		settings.validate()?;

		Ok(settings)
	}

	/// Validate the merged settings.
	pub fn validate(&self) -> Result<()> {
		if !matches!(self.api_origin.scheme(), "http" | "https") {
			return Err(Error::Validation {
				field: "api_origin",
				reason: "Must use the http or https scheme.".into(),
			});
		}
		if self.api_origin.host_str().is_none() {
			return Err(Error::Validation {
				field: "api_origin",
				reason: "Must include a host component.".into(),
			});
		}
		if self.timeout.is_zero() {
			return Err(Error::Validation {
				field: "timeout",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}

	/// Platform API origin.
	pub fn api_origin(&self) -> &Url {
		&self.api_origin
	}

	/// Configured application key, if any.
	pub fn app_key(&self) -> Option<&str> {
		self.app_key.as_deref()
	}

	/// Configured application secret, if any.
	pub fn app_secret(&self) -> Option<&str> {
		self.app_secret.as_deref()
	}

	/// Initialization timeout.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Build an absolute URL for `path` under the API origin.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		crate::http::client::join_path(&self.api_origin, path)
	}

	/// Headers identifying the application only.
	pub fn app_key_headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::with_capacity(1);

		headers.insert(APP_KEY_HEADER, header_value("app_key", self.app_key.as_deref())?);

		Ok(headers)
	}

	/// Headers carrying both application credentials.
	pub fn credential_headers(&self) -> Result<HeaderMap> {
		let mut headers = self.app_key_headers()?;

		headers.insert(APP_SECRET_HEADER, header_value("app_secret", self.app_secret.as_deref())?);

		Ok(headers)
	}
}
fn parse_timeout(raw: &str) -> Result<Duration> {
	raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|err| Error::Validation {
		field: "timeout",
		reason: format!("Expected a base-10 integer of milliseconds, got '{raw}': {err}."),
	})
}

fn header_value(field: &'static str, value: Option<&str>) -> Result<HeaderValue> {
	let value = value.ok_or(Error::MissingCredential(field))?;

	HeaderValue::from_str(value).map_err(|err| Error::Validation {
		field,
		reason: format!("Not a valid header value: {err}."),
	})
}
