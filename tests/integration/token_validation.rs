// std
use std::time::Duration;
// crates.io
use jsonwebtoken::Algorithm;
use rownd::{
	Error, KeySetCache, cache::remote::RemoteKeySet, http::client::Transport, token,
};
use serde_json::json;
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::common::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn origin(server: &MockServer) -> Url {
	Url::parse(&server.uri()).expect("origin")
}

#[tokio::test]
async fn valid_token_yields_the_user_id() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let client = client(&server, TIMEOUT);
	let token = sign(&claims("user-1", 3_600), SIGNING_KID, SIGNING_SECRET);
	let first = client.validate_token(&token).await.expect("valid");
	let second = client.validate_token(&token).await.expect("valid");

	assert_eq!(first.user_id, "user-1");
	assert_eq!(first.raw_token, token);
	assert_eq!(first.decoded_token.is_verified_user, Some(true));
	assert_eq!(first.decoded_token.aud, vec![format!("app:{APP_ID}")]);
	assert_eq!(second.user_id, "user-1");
	assert!(KeySetCache::global().contains(&origin(&server)));

	server.verify().await;
}

#[tokio::test]
async fn expired_token_is_rejected() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let token = sign(&claims("user-1", -3_600), SIGNING_KID, SIGNING_SECRET);
	let err = token::validate_token(&cache, &transport, &origin(&server), &token)
		.await
		.expect_err("expired");

	assert!(matches!(err, Error::TokenExpired));
	assert!(err.is_token_rejection());

	server.verify().await;
}

#[tokio::test]
async fn recently_expired_token_gets_no_grace_period() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let token = sign(&claims("user-1", -5), SIGNING_KID, SIGNING_SECRET);
	let err = token::validate_token(&cache, &transport, &origin(&server), &token)
		.await
		.expect_err("expired five seconds ago");

	assert!(matches!(err, Error::TokenExpired), "unexpected error: {err:?}");

	server.verify().await;
}

#[tokio::test]
async fn token_not_yet_valid_is_rejected() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let mut claims = claims("user-1", 7_200);

	claims["nbf"] = json!(chrono::Utc::now().timestamp() + 3_600);

	let token = sign(&claims, SIGNING_KID, SIGNING_SECRET);
	let err = token::validate_token(&cache, &transport, &origin(&server), &token)
		.await
		.expect_err("not yet valid");

	assert!(err.is_token_rejection(), "unexpected error: {err:?}");
	assert!(!matches!(err, Error::TokenExpired));

	server.verify().await;
}

#[tokio::test]
async fn wrong_signature_is_rejected() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let token = sign(&claims("user-1", 3_600), SIGNING_KID, b"some-other-signing-secret-000000");
	let err = token::validate_token(&cache, &transport, &origin(&server), &token)
		.await
		.expect_err("bad signature");

	assert!(matches!(err, Error::SignatureInvalid(_)), "unexpected error: {err:?}");

	server.verify().await;
}

#[tokio::test]
async fn unknown_key_id_is_rejected() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let origin = origin(&server);
	let known = sign(&claims("user-1", 3_600), SIGNING_KID, SIGNING_SECRET);
	let unknown = sign(&claims("user-1", 3_600), "retired", SIGNING_SECRET);

	token::validate_token(&cache, &transport, &origin, &known).await.expect("valid");

	let err =
		token::validate_token(&cache, &transport, &origin, &unknown).await.expect_err("unknown kid");

	assert!(matches!(err, Error::SignatureInvalid(_)), "unexpected error: {err:?}");

	// The key set was fetched moments ago, so the miss does not trigger another fetch.
	server.verify().await;
}

#[tokio::test]
async fn malformed_token_fails_before_any_request() {
	init_tracing();

	let server = MockServer::start().await;
	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let err = token::validate_token(&cache, &transport, &origin(&server), "not-a-jwt")
		.await
		.expect_err("malformed");

	assert!(matches!(err, Error::TokenMalformed(_)));
	assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn token_without_user_id_claim_is_malformed() {
	init_tracing();

	let server = MockServer::start().await;

	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let now = chrono::Utc::now().timestamp();
	let token =
		sign(&json!({ "sub": "user-1", "iat": now, "exp": now + 3_600 }), SIGNING_KID, SIGNING_SECRET);
	let err = token::validate_token(&cache, &transport, &origin(&server), &token)
		.await
		.expect_err("missing claim");

	assert!(matches!(err, Error::TokenMalformed(_)));

	server.verify().await;
}

#[tokio::test]
async fn discovery_failure_is_not_cached() {
	init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(ResponseTemplate::new(503))
		.up_to_n_times(1)
		.expect(1)
		.mount(&server)
		.await;
	mount_discovery(&server).await;
	mount_jwks(&server).await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let origin = origin(&server);
	let token = sign(&claims("user-1", 3_600), SIGNING_KID, SIGNING_SECRET);
	let err = token::validate_token(&cache, &transport, &origin, &token)
		.await
		.expect_err("discovery down");

	assert!(matches!(err, Error::DiscoveryFetch { .. }));
	assert_eq!(err.status().map(|status| status.as_u16()), Some(503));
	assert!(!cache.contains(&origin));

	let valid = token::validate_token(&cache, &transport, &origin, &token).await.expect("valid");

	assert_eq!(valid.user_id, "user-1");
	assert!(cache.contains(&origin));

	server.verify().await;
}

#[tokio::test]
async fn concurrent_lookups_share_one_discovery_fetch() {
	init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(DISCOVERY_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({
					"issuer": server.uri(),
					"jwks_uri": format!("{}{JWKS_PATH}", server.uri()),
				}))
				.set_delay(Duration::from_millis(100)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let cache = KeySetCache::new();
	let transport = Transport::new().expect("transport");
	let origin = origin(&server);
	let (a, b, c) = tokio::join!(
		cache.verification_context(&origin, &transport),
		cache.verification_context(&origin, &transport),
		cache.verification_context(&origin, &transport),
	);
	let (a, b, c) = (a.expect("context"), b.expect("context"), c.expect("context"));

	assert!(std::sync::Arc::ptr_eq(&a, &b));
	assert!(std::sync::Arc::ptr_eq(&a, &c));
	assert_eq!(a.discovery.jwks_uri.path(), JWKS_PATH);

	server.verify().await;
}

#[tokio::test]
async fn rotated_key_is_picked_up_after_cooldown() {
	init_tracing();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_json(jwks(&["old"], SIGNING_SECRET)))
		.up_to_n_times(1)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(jwks(&["old", "new"], SIGNING_SECRET)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let jwks_uri = Url::parse(&format!("{}{JWKS_PATH}", server.uri())).expect("jwks uri");
	let keys = RemoteKeySet::new(jwks_uri, Transport::new().expect("transport"))
		.with_cooldown(Duration::ZERO);
	let old = keys.resolve(Some("old"), Algorithm::HS256).await.expect("old key");
	let new = keys.resolve(Some("new"), Algorithm::HS256).await.expect("new key");

	assert_eq!(old.common.key_id.as_deref(), Some("old"));
	assert_eq!(new.common.key_id.as_deref(), Some("new"));

	// Both keys are cached now.
	keys.resolve(Some("old"), Algorithm::HS256).await.expect("old key");
	keys.resolve(Some("new"), Algorithm::HS256).await.expect("new key");

	server.verify().await;
}
