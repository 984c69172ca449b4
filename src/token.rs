//! Bearer token verification against the platform's published key set.

// crates.io
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;
// self
use crate::{
	_prelude::*, cache::key_set::KeySetCache, http::client::Transport, metrics, model::JsonObject,
};

/// Claim carrying the platform user id.
pub const CLAIM_USER_ID: &str = "https://auth.rownd.io/app_user_id";
/// Claim flagging users with a verified contact method.
pub const CLAIM_IS_VERIFIED_USER: &str = "https://auth.rownd.io/is_verified_user";

/// Verified token payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
	/// Token identifier.
	#[serde(default)]
	pub jti: Option<String>,
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Audiences; a single string audience is read as a one-element list.
	#[serde(default, deserialize_with = "deserialize_audience")]
	pub aud: Vec<String>,
	/// Issued-at, seconds since the epoch.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Expiry, seconds since the epoch.
	pub exp: i64,
	/// Issuer.
	#[serde(default)]
	pub iss: Option<String>,
	/// Platform user id.
	#[serde(default, rename = "https://auth.rownd.io/app_user_id")]
	pub app_user_id: Option<String>,
	/// Whether the user has verified a contact method.
	#[serde(default, rename = "https://auth.rownd.io/is_verified_user")]
	pub is_verified_user: Option<bool>,
	/// Every other claim.
	#[serde(flatten)]
	pub extra: JsonObject,
}
impl Claims {
	/// Expiry as a UTC timestamp.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		DateTime::<Utc>::from_timestamp(self.exp, 0)
	}

	/// Issued-at as a UTC timestamp.
	pub fn issued_at(&self) -> Option<DateTime<Utc>> {
		self.iat.and_then(|iat| DateTime::<Utc>::from_timestamp(iat, 0))
	}
}

/// Outcome of a successful validation. Never cached.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationResult {
	/// Decoded claims.
	pub decoded_token: Claims,
	/// Platform user id taken from [`CLAIM_USER_ID`].
	pub user_id: String,
	/// Token exactly as supplied.
	pub raw_token: String,
}

/// Verify `token` against the key set published under `origin`.
///
/// Rejections surface as [`Error::SignatureInvalid`], [`Error::TokenExpired`], or
/// [`Error::TokenMalformed`]. Discovery failures surface as [`Error::DiscoveryFetch`].
#[tracing::instrument(skip_all, fields(origin = %origin))]
pub async fn validate_token(
	cache: &KeySetCache,
	transport: &Transport,
	origin: &Url,
	token: &str,
) -> Result<ValidationResult> {
	let result = verify(cache, transport, origin, token).await;

	metrics::record_token_validation(match &result {
		Ok(_) => "valid",
		Err(Error::TokenExpired) => "expired",
		Err(Error::SignatureInvalid(_)) => "signature_invalid",
		Err(Error::TokenMalformed(_)) => "malformed",
		Err(_) => "error",
	});

	if let Err(err) = &result {
		tracing::debug!(error = %err, "token rejected");
	}

	result
}

async fn verify(
	cache: &KeySetCache,
	transport: &Transport,
	origin: &Url,
	token: &str,
) -> Result<ValidationResult> {
	let header = decode_header(token).map_err(|err| Error::TokenMalformed(err.to_string()))?;
	let context = cache.verification_context(origin, transport).await?;
	let jwk = context.keys.resolve(header.kid.as_deref(), header.alg).await?;
	let key = DecodingKey::from_jwk(&jwk)
		.map_err(|err| Error::SignatureInvalid(format!("Unusable verification key: {err}.")))?;
	let mut validation = Validation::new(header.alg);

	validation.leeway = 0;
	validation.validate_nbf = true;
	validation.validate_aud = false;

	let claims = decode::<Claims>(token, &key, &validation)?.claims;
	let user_id = claims
		.app_user_id
		.clone()
		.ok_or_else(|| Error::TokenMalformed(format!("Missing the '{CLAIM_USER_ID}' claim.")))?;

	Ok(ValidationResult { decoded_token: claims, user_id, raw_token: token.to_owned() })
}

fn deserialize_audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::String(aud)) => vec![aud],
		Some(Value::Array(values)) =>
			values.into_iter().filter_map(|value| value.as_str().map(str::to_owned)).collect(),
		_ => Vec::new(),
	})
}
