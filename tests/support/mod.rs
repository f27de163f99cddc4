//! Shared fixtures for the mock-server integration tests.

#![allow(dead_code)]

// crates.io
use httpmock::MockServer;
use time::{Duration, OffsetDateTime};
// self
use arcgis_gateway::{
	gateway::ReqwestGateway, http::ReqwestHttpClient, provider::ReqwestServerTokenProvider,
	reqwest::Client,
};

/// Reqwest transport that accepts the self-signed certificates served by `httpmock`.
pub fn http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Server token provider for `site` without credentials.
pub fn server_provider(site: &str) -> ReqwestServerTokenProvider {
	ReqwestServerTokenProvider::with_http_client(site, http_client())
		.expect("Provider should build against the mock server.")
}

/// Anonymous gateway for `site`.
pub fn gateway(site: &str) -> ReqwestGateway {
	ReqwestGateway::with_http_client(site, http_client())
		.expect("Gateway should build against the mock server.")
}

/// Mock server site root, e.g. `http://127.0.0.1:1234/arcgis`.
pub fn site(server: &MockServer) -> String {
	server.url("/arcgis")
}

/// Milliseconds since the Unix epoch, `ttl` from now.
pub fn expiry_in(ttl: Duration) -> i64 {
	let instant = OffsetDateTime::now_utc() + ttl;

	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// `generateToken` response body for `value`, valid for thirty minutes.
pub fn token_body(value: &str) -> String {
	format!(r#"{{"token":"{value}","expires":{},"ssl":false}}"#, expiry_in(Duration::minutes(30)))
}
