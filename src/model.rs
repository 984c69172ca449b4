//! Payloads exchanged with the platform API.

// crates.io
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque JSON object used for user data and extension fields.
pub type JsonObject = Map<String, Value>;

/// Tenant application registration returned by `/hub/app-config`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
	/// Application identifier scoping user-data operations.
	pub id: String,
	/// Application user-data schema.
	#[serde(default)]
	pub schema: Value,
	/// Application settings.
	#[serde(default)]
	pub config: Value,
	/// Fields not modelled above.
	#[serde(flatten)]
	pub extra: JsonObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppConfigEnvelope {
	pub app: AppConfig,
}

/// User record written through [`crate::RowndClient::create_or_update_user`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowndUser {
	/// Platform user identifier.
	pub id: String,
	/// Full replacement user data.
	#[serde(default)]
	pub data: JsonObject,
}
impl RowndUser {
	/// Create a user record.
	pub fn new(id: impl Into<String>, data: JsonObject) -> Self {
		Self { id: id.into(), data }
	}
}

/// User data as returned by the platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
	/// User data fields.
	#[serde(default)]
	pub data: JsonObject,
	/// Fields not modelled above.
	#[serde(flatten)]
	pub extra: JsonObject,
}

/// Arguments for [`crate::RowndClient::fetch_user_info`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchUserInfo {
	/// User to read.
	pub user_id: String,
	/// Application to read from; defaults to the resolved application.
	#[serde(default)]
	pub app_id: Option<String>,
}
impl FetchUserInfo {
	/// Read `user_id` from the resolved application.
	pub fn new(user_id: impl Into<String>) -> Self {
		Self { user_id: user_id.into(), app_id: None }
	}

	/// Read from an explicit application instead.
	pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
		self.app_id = Some(app_id.into());

		self
	}
}

/// Arguments for [`crate::RowndClient::create_smart_link`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSmartLink {
	/// Email address to verify; takes precedence over `phone`.
	#[serde(default)]
	pub email: Option<String>,
	/// Phone number to verify.
	#[serde(default)]
	pub phone: Option<String>,
	/// Where the user lands after verification.
	pub redirect_url: String,
	/// Extra user data attached to the link.
	#[serde(default)]
	pub data: Option<JsonObject>,
}
impl CreateSmartLink {
	/// Smart link verifying an email address.
	pub fn email(email: impl Into<String>, redirect_url: impl Into<String>) -> Self {
		Self { email: Some(email.into()), redirect_url: redirect_url.into(), ..Default::default() }
	}

	/// Smart link verifying a phone number.
	pub fn phone(phone: impl Into<String>, redirect_url: impl Into<String>) -> Self {
		Self { phone: Some(phone.into()), redirect_url: redirect_url.into(), ..Default::default() }
	}

	/// Attach extra user data.
	pub fn with_data(mut self, data: JsonObject) -> Self {
		self.data = Some(data);

		self
	}
}

/// Link descriptor returned by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartLink {
	/// Verification URL.
	pub link: String,
	/// User the link belongs to.
	pub app_user_id: String,
}
