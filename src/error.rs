//! Crate-wide error types and `Result` alias.

// std
use std::sync::Arc;
// crates.io
use http::StatusCode;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the Rownd client crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[cfg(feature = "prometheus")]
	#[error("Metrics error: {0}")]
	Metrics(String),

	#[error("Failed to fetch app config: {source}")]
	AppConfig { source: Arc<Error> },
	#[error("Failed to fetch the discovery document for {origin}: {source}")]
	DiscoveryFetch { origin: String, source: Box<Error> },
	#[error("Request failed with status {status} from {url}: {body:?}")]
	HttpStatus { status: StatusCode, url: url::Url, body: Option<String> },
	#[error("App config fetch ended without reporting an outcome.")]
	InitializationAborted,
	#[error("Timed out after {timeout_ms} ms waiting for the app config.")]
	InitializationTimeout { timeout_ms: u64 },
	#[error("An app_id must be provided.")]
	MissingAppId,
	#[error("Missing credential '{0}'; configure it explicitly or through the environment.")]
	MissingCredential(&'static str),
	#[error("No Tokio runtime is available to run the app config fetch.")]
	RuntimeUnavailable,
	#[error("Token signature is invalid: {0}")]
	SignatureInvalid(String),
	#[error("Failed to generate the requested smart link. Reason: {message}")]
	SmartLink { message: String, status: StatusCode, source: Option<Box<Error>> },
	#[error("Token has expired.")]
	TokenExpired,
	#[error("Token is malformed: {0}")]
	TokenMalformed(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// HTTP-style status carried by the error, if any.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::HttpStatus { status, .. } | Self::SmartLink { status, .. } => Some(*status),
			Self::Reqwest(err) => err.status(),
			Self::AppConfig { source } => source.status(),
			Self::DiscoveryFetch { source, .. } => source.status(),
			Self::SignatureInvalid(_) | Self::TokenExpired | Self::TokenMalformed(_) =>
				Some(StatusCode::UNAUTHORIZED),
			_ => None,
		}
	}

	/// Wrap a failure raised while creating a smart link.
	///
	/// The status is taken from the cause when it carries one and defaults to 500.
	pub fn smart_link(source: Error) -> Self {
		let status = source.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		Self::SmartLink { message: source.to_string(), status, source: Some(Box::new(source)) }
	}

	/// Whether the error reports a token rejected by validation.
	pub fn is_token_rejection(&self) -> bool {
		matches!(self, Self::SignatureInvalid(_) | Self::TokenExpired | Self::TokenMalformed(_))
	}
}
impl From<jsonwebtoken::errors::Error> for Error {
	fn from(value: jsonwebtoken::errors::Error) -> Self {
		use jsonwebtoken::errors::ErrorKind;

		match value.kind() {
			ErrorKind::ExpiredSignature => Self::TokenExpired,
			ErrorKind::InvalidSignature
			| ErrorKind::InvalidAlgorithm
			| ErrorKind::InvalidKeyFormat
			| ErrorKind::MissingAlgorithm => Self::SignatureInvalid(value.to_string()),
			_ => Self::TokenMalformed(value.to_string()),
		}
	}
}
