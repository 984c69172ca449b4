// std
use std::time::Duration;
// crates.io
use rownd::{ConfigOverrides, CreateSmartLink, Error, RowndClient, Settings};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_partial_json, header, method, path},
};
// self
use crate::common::*;

const TIMEOUT: Duration = Duration::from_secs(5);
const SMART_LINK_PATH: &str = "/hub/auth/magic";

fn link_response() -> ResponseTemplate {
	ResponseTemplate::new(200).set_body_json(json!({
		"link": "https://rownd.link/abc123",
		"app_user_id": "user-1",
	}))
}

#[tokio::test]
async fn email_link_is_created_without_waiting_for_initialization() {
	init_tracing();

	let server = MockServer::start().await;

	// No app-config mock is mounted; initialization fails in the background.
	Mock::given(method("POST"))
		.and(path(SMART_LINK_PATH))
		.and(header("x-rownd-app-key", APP_KEY))
		.and(header("x-rownd-app-secret", APP_SECRET))
		.and(body_partial_json(json!({
			"verification_mode": "email",
			"redirect_url": "https://example.com/welcome",
			"data": { "email": "ada@example.com", "first_name": "Ada" },
		})))
		.respond_with(link_response())
		.expect(1)
		.mount(&server)
		.await;

	let mut data = serde_json::Map::new();

	data.insert("first_name".into(), json!("Ada"));

	let client = client(&server, TIMEOUT);
	let link = client
		.create_smart_link(
			CreateSmartLink::email("ada@example.com", "https://example.com/welcome").with_data(data),
		)
		.await
		.expect("link");

	assert_eq!(link.link, "https://rownd.link/abc123");
	assert_eq!(link.app_user_id, "user-1");

	server.verify().await;
}

#[tokio::test]
async fn phone_link_uses_phone_verification() {
	init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(SMART_LINK_PATH))
		.and(body_partial_json(json!({
			"verification_mode": "phone",
			"data": { "phone": "+15551234567" },
		})))
		.respond_with(link_response())
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server, TIMEOUT);

	client
		.create_smart_link(CreateSmartLink::phone("+15551234567", "https://example.com"))
		.await
		.expect("link");

	server.verify().await;
}

#[tokio::test]
async fn upstream_rejection_keeps_its_status() {
	init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(SMART_LINK_PATH))
		.respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server, TIMEOUT);
	let err = client
		.create_smart_link(CreateSmartLink::email("ada@example.com", "https://example.com"))
		.await
		.expect_err("rejected");

	assert!(matches!(err, Error::SmartLink { .. }));
	assert_eq!(err.status().map(|status| status.as_u16()), Some(403));

	server.verify().await;
}

#[tokio::test]
async fn missing_contact_fails_locally() {
	init_tracing();

	let server = MockServer::start().await;
	let client = client(&server, TIMEOUT);
	let opts = CreateSmartLink {
		email: None,
		phone: None,
		redirect_url: "https://example.com".into(),
		data: None,
	};
	let err = client.create_smart_link(opts).await.expect_err("no contact");

	assert!(matches!(err, Error::SmartLink { .. }));
	assert_eq!(err.status().map(|status| status.as_u16()), Some(500));
	assert!(
		server
			.received_requests()
			.await
			.unwrap_or_default()
			.iter()
			.all(|request| request.url.path() != SMART_LINK_PATH)
	);
}

#[tokio::test]
async fn missing_secret_is_reported_as_a_smart_link_failure() {
	init_tracing();

	let server = MockServer::start().await;
	let overrides = ConfigOverrides::new().api_origin(server.uri()).app_key(APP_KEY);
	let settings = Settings::resolve_with(overrides, |_| None).expect("settings");
	let client = RowndClient::with_settings(settings).expect("client");
	let err = client
		.create_smart_link(CreateSmartLink::email("ada@example.com", "https://example.com"))
		.await
		.expect_err("no secret");

	match err {
		Error::SmartLink { source: Some(source), .. } =>
			assert!(matches!(*source, Error::MissingCredential("app_secret"))),
		other => panic!("unexpected error: {other:?}"),
	}
}
