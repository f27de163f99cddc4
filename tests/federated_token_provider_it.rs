mod support;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use arcgis_gateway::{
	auth::GenerateTokenRequest,
	cancel::CancelToken,
	error::Error,
	provider::{ReqwestFederatedTokenProvider, TokenProvider},
};

#[tokio::test]
async fn portal_token_is_exchanged_for_a_server_token() {
	let portal = MockServer::start_async().await;
	let server = MockServer::start_async().await;
	let upstream_mock = portal
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(support::token_body("U1"));
		})
		.await;
	let exchange_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(support::token_body("D1"));
		})
		.await;
	let upstream = support::server_provider(&support::site(&portal))
		.with_credentials(GenerateTokenRequest::new("a", "b"));
	let federated = ReqwestFederatedTokenProvider::with_http_client(
		Arc::new(upstream),
		&support::site(&server),
		support::http_client(),
	)
	.expect("Federated provider should build.");
	let cancel = CancelToken::new();

	for _ in 0..2 {
		let token = federated
			.check_generate_token(&cancel)
			.await
			.expect("Exchange should succeed.")
			.expect("Token should be issued.");

		assert_eq!(token.value(), "D1");
	}

	assert_eq!(
		federated.cached_token().map(|token| token.value().to_owned()).as_deref(),
		Some("D1")
	);

	upstream_mock.assert_calls_async(1).await;
	exchange_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn exchange_envelope_is_authentication_failure() {
	let portal = MockServer::start_async().await;
	let server = MockServer::start_async().await;

	portal
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(support::token_body("U1"));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":{"code":498,"message":"Invalid token."}}"#);
		})
		.await;

	let upstream = support::server_provider(&support::site(&portal))
		.with_credentials(GenerateTokenRequest::new("a", "b"));
	let federated = ReqwestFederatedTokenProvider::with_http_client(
		Arc::new(upstream),
		&support::site(&server),
		support::http_client(),
	)
	.expect("Federated provider should build.");
	let err = federated
		.check_generate_token(&CancelToken::new())
		.await
		.expect_err("Envelope should fail.");

	assert!(matches!(err, Error::Authentication(_)));
	assert_eq!(err.platform_code(), Some(498));
}
