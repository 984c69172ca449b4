//! HTTP transport for platform API calls.

// crates.io
use http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE};
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;
// self
use crate::_prelude::*;

/// Default connect timeout for platform requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs single JSON exchanges against the platform API.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct Transport {
	client: Client,
}
impl Transport {
	/// Build a transport with the crate user agent.
	pub fn new() -> Result<Self> {
		let client = Client::builder()
			.user_agent(user_agent())
			.connect_timeout(DEFAULT_CONNECT_TIMEOUT)
			.build()?;

		Ok(Self { client })
	}

	/// Build a transport around an existing reqwest client.
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}

	/// Issue a `GET` and decode the response body.
	pub async fn get<T>(&self, url: Url, headers: HeaderMap) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.request(Method::GET, url, headers, None::<&()>).await?;

		Ok(serde_json::from_value(body)?)
	}

	/// Issue a request and return the parsed JSON body.
	///
	/// Bodies that are empty or not JSON come back as [`Value::Null`]; non-2xx statuses fail with
	/// [`Error::HttpStatus`].
	pub async fn request<B>(
		&self,
		method: Method,
		url: Url,
		headers: HeaderMap,
		body: Option<&B>,
	) -> Result<Value>
	where
		B: Serialize + ?Sized,
	{
		let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);

		if let Some(body) = body {
			builder = builder.header(CONTENT_TYPE, "application/json").json(body);
		}

		let start = Instant::now();
		let response = builder.send().await?;
		let elapsed = start.elapsed();
		let status = response.status();

		tracing::debug!(%method, %url, %status, ?elapsed, "platform request complete");

		if !status.is_success() {
			let body = response.text().await.ok().filter(|body| !body.is_empty());

			return Err(Error::HttpStatus { status, url, body });
		}
		if status == StatusCode::NO_CONTENT {
			return Ok(Value::Null);
		}

		let bytes = response.bytes().await?;

		Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}
}

/// Join an absolute `path` onto `origin`, keeping any path prefix the origin carries.
pub fn join_path(origin: &Url, path: &str) -> Result<Url> {
	let base = origin.as_str().trim_end_matches('/');
	let path = path.trim_start_matches('/');

	Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// User agent sent with every request.
pub fn user_agent() -> String {
	format!("rownd-rust/{}", env!("CARGO_PKG_VERSION"))
}
