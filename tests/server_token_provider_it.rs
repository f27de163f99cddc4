mod support;

// crates.io
use httpmock::prelude::*;
// self
use arcgis_gateway::{
	auth::{GenerateTokenRequest, RsaCredentialEncryptor},
	cancel::CancelToken,
	error::{Error, TransportError},
	provider::{ReqwestServerTokenProvider, TokenProvider},
};

fn provider(server: &MockServer) -> ReqwestServerTokenProvider {
	support::server_provider(&support::site(server))
		.with_credentials(GenerateTokenRequest::new("a", "b"))
}

#[tokio::test]
async fn second_call_reuses_cached_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(support::token_body("T1"));
		})
		.await;
	let provider = provider(&server);
	let cancel = CancelToken::new();
	let first = provider
		.check_generate_token(&cancel)
		.await
		.expect("First token request should succeed.")
		.expect("Token should be issued.");
	let second = provider
		.check_generate_token(&cancel)
		.await
		.expect("Second call should hit the cache.")
		.expect("Token should be cached.");

	assert_eq!(first.value(), "T1");
	assert_eq!(first, second);
	assert_eq!(provider.metrics().cache_hits(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unreachable_public_key_is_attempted_once() {
	let server = MockServer::start_async().await;
	let public_key = server
		.mock_async(|when, then| {
			when.method(GET).path("/arcgis/admin/publicKey").query_param("f", "json");
			then.status(500).body("unavailable");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(support::token_body("T1"));
		})
		.await;
	let provider = provider(&server).with_encryptor(RsaCredentialEncryptor);
	let cancel = CancelToken::new();

	for _ in 0..2 {
		let issued = provider
			.check_generate_token(&cancel)
			.await
			.expect("Plaintext fallback should succeed.")
			.expect("Token should be issued.");

		assert_eq!(issued.value(), "T1");
	}

	assert!(provider.public_key_unreachable());
	assert_eq!(provider.metrics().public_key_requests(), 1);

	public_key.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn embedded_token_error_is_authentication_failure() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200).header("content-type", "application/json").body(
				r#"{"error":{"code":400,"message":"Unable to generate token.","details":["Invalid username or password."]}}"#,
			);
		})
		.await;
	let provider = provider(&server);
	let err = provider
		.check_generate_token(&CancelToken::new())
		.await
		.expect_err("Envelope should surface as an error.");
	let platform = err.platform_error().expect("Authentication errors carry the envelope.");

	assert!(matches!(err, Error::Authentication(_)));
	assert_eq!(platform.code, 400);
	assert_eq!(platform.details, vec!["Invalid username or password.".to_owned()]);
	assert!(provider.cached_token().is_none());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn token_endpoint_status_is_transport_failure() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(403).body("forbidden");
		})
		.await;

	let err = provider(&server)
		.check_generate_token(&CancelToken::new())
		.await
		.expect_err("403 should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 403, .. })));
}
