//! Demonstrates exchanging a portal token for a token scoped to a federated server.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use arcgis_gateway::{
	auth::GenerateTokenRequest,
	cancel::CancelToken,
	http::ReqwestHttpClient,
	provider::{ReqwestFederatedTokenProvider, ReqwestServerTokenProvider, TokenProvider},
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let portal = MockServer::start_async().await;
	let server = MockServer::start_async().await;
	let portal_mock = portal
		.mock_async(|when, then| {
			when.method(POST).path("/portal/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"portal-token\",\"expires\":0,\"ssl\":false}");
		})
		.await;
	let exchange_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"server-token\",\"expires\":0,\"ssl\":false}");
		})
		.await;
	let http_client = Arc::new(ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	));
	let upstream =
		ReqwestServerTokenProvider::with_http_client(&portal.url("/portal"), http_client.clone())?
			.with_credentials(GenerateTokenRequest::new("publisher", "publisher-password"));
	let federated = ReqwestFederatedTokenProvider::with_http_client(
		Arc::new(upstream),
		&server.url("/arcgis"),
		http_client,
	)?;

	if let Some(token) = federated.check_generate_token(&CancelToken::new()).await? {
		println!("Server-scoped token issued for {}: {:?}.", federated.root_url(), token);
	}

	portal_mock.assert_async().await;
	exchange_mock.assert_async().await;

	Ok(())
}
