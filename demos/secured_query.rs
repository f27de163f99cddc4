//! Demonstrates a secured query: the gateway obtains a token with encrypted credentials
//! (falling back to plaintext when the public key is unavailable) and attaches it to a
//! feature-service query served by a local mock server.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::{Deserialize, Serialize};
// self
use arcgis_gateway::{
	auth::{GenerateTokenRequest, RsaCredentialEncryptor},
	cancel::CancelToken,
	endpoint::Endpoint,
	gateway::{Operation, ReqwestGateway},
	http::ReqwestHttpClient,
	provider::ReqwestServerTokenProvider,
	reqwest::Client,
};

#[derive(Serialize)]
struct CountQuery {
	#[serde(skip)]
	layer: Endpoint,
	#[serde(rename = "where")]
	where_clause: &'static str,
	#[serde(rename = "returnCountOnly")]
	return_count_only: bool,
}
impl Operation for CountQuery {
	type Response = CountResponse;

	fn endpoint(&self) -> Endpoint {
		self.layer.clone()
	}
}

#[derive(Debug, Deserialize)]
struct CountResponse {
	count: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let site = server.url("/arcgis");
	let public_key_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/arcgis/admin/publicKey");
			then.status(404);
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/arcgis/tokens/generateToken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"demo-token\",\"expires\":0,\"ssl\":false}");
		})
		.await;
	let query_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/arcgis/rest/services/Parcels/MapServer/0/query")
				.query_param("token", "demo-token");
			then.status(200).header("content-type", "application/json").body("{\"count\":1284}");
		})
		.await;
	let http_client = Arc::new(ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	));
	let provider = ReqwestServerTokenProvider::with_http_client(&site, http_client.clone())?
		.with_credentials(
			GenerateTokenRequest::new("viewer", "viewer-password")
				.with_referer("https://maps.example.com")?,
		)
		.with_encryptor(RsaCredentialEncryptor);
	let gateway = ReqwestGateway::with_http_client(&site, http_client)?
		.with_token_provider(Arc::new(provider))
		.with_links(true);
	let query = CountQuery {
		layer: Endpoint::server("Parcels/MapServer/0/query")?,
		where_clause: "ZONING = 'R1'",
		return_count_only: true,
	};

	if let Some(response) = gateway.execute(&query, &CancelToken::new()).await? {
		println!("Parcels zoned R1: {}.", response.body.count);

		if let Some(link) = response.link {
			println!("Dispatched as {} {}.", link.method, link.href);
		}
	}

	public_key_mock.assert_async().await;
	token_mock.assert_async().await;
	query_mock.assert_async().await;

	Ok(())
}
