//! Passwordless smart-link creation.

// crates.io
use http::Method;
use serde::Serialize;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	config::Settings,
	http::client::Transport,
	model::{CreateSmartLink, JsonObject, SmartLink},
};

/// Smart-link endpoint relative to the API origin.
pub const SMART_LINK_PATH: &str = "/hub/auth/magic";

/// Contact channel the platform verifies when the link is visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
	/// Verify an email address.
	Email,
	/// Verify a phone number.
	Phone,
}

/// Request body sent to the smart-link endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SmartLinkRequest {
	/// Channel to verify.
	pub verification_mode: VerificationMode,
	/// Where the user lands after verification.
	pub redirect_url: String,
	/// Contact fields followed by caller-supplied data.
	pub data: JsonObject,
}
impl SmartLinkRequest {
	/// Build the request body; email wins when both contact fields are present.
	pub fn build(opts: CreateSmartLink) -> Result<Self> {
		let CreateSmartLink { email, phone, redirect_url, data } = opts;
		let verification_mode = match (&email, &phone) {
			(Some(_), _) => VerificationMode::Email,
			(None, Some(_)) => VerificationMode::Phone,
			(None, None) =>
				return Err(Error::Validation {
					field: "email",
					reason: "Either an email or a phone number is required.".into(),
				}),
		};
		let mut merged = JsonObject::new();

		if let Some(email) = email {
			merged.insert("email".into(), Value::String(email));
		}
		if let Some(phone) = phone {
			merged.insert("phone".into(), Value::String(phone));
		}

		merged.extend(data.unwrap_or_default());

		Ok(Self { verification_mode, redirect_url, data: merged })
	}
}

/// Create a smart link using the configured credentials.
///
/// Every failure is reported as [`Error::SmartLink`].
#[tracing::instrument(skip_all, fields(redirect_url = %opts.redirect_url))]
pub async fn create_smart_link(
	settings: &Settings,
	transport: &Transport,
	opts: CreateSmartLink,
) -> Result<SmartLink> {
	send(settings, transport, opts).await.map_err(|err| {
		tracing::warn!(error = %err, "smart link creation failed");

		Error::smart_link(err)
	})
}

async fn send(settings: &Settings, transport: &Transport, opts: CreateSmartLink) -> Result<SmartLink> {
	let body = SmartLinkRequest::build(opts)?;
	let url = settings.endpoint(SMART_LINK_PATH)?;
	let headers = settings.credential_headers()?;
	let response = transport.request(Method::POST, url, headers, Some(&body)).await?;

	Ok(serde_json::from_value(response)?)
}
