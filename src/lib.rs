//! Typed gateway for ArcGIS-style REST servers: normalized endpoints, cached and federated
//! tokens with optional credential encryption, and dispatch that turns HTTP 200 error
//! envelopes into typed failures.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cancel;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod provider;

mod dispatch;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and stub collaborators for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::convert::Infallible;
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
	// self
	use crate::{
		auth::Token,
		cancel::CancelToken,
		endpoint::RootUrl,
		http::{GatewayHttpClient, ResponseMetadata, ResponseMetadataSlot},
		provider::{TokenFuture, TokenProvider},
	};

	/// Request captured by [`StubHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method label (`GET`, `POST`).
		pub method: String,
		/// Full request URL including the query string.
		pub url: String,
		/// Header name/value pairs in insertion order.
		pub headers: Vec<(String, String)>,
		/// UTF-8 body (form-encoded for POST).
		pub body: String,
	}
	impl RecordedRequest {
		/// Returns the first header value matching `name` (case-insensitive).
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value.as_str())
		}

		/// Decodes the query string and form body into one list of pairs.
		pub fn params(&self) -> Vec<(String, String)> {
			let query = Url::parse(&self.url)
				.map(|url| url.query_pairs().into_owned().collect::<Vec<_>>())
				.unwrap_or_default();
			let form = url::form_urlencoded::parse(self.body.as_bytes()).into_owned();

			query.into_iter().chain(form).collect()
		}

		/// Returns the value of a query or form parameter.
		pub fn param(&self, name: &str) -> Option<String> {
			self.params().into_iter().find(|(key, _)| key == name).map(|(_, value)| value)
		}
	}

	#[derive(Clone, Debug)]
	struct StubRoute {
		path_suffix: String,
		status: u16,
		body: String,
	}

	#[derive(Debug, Default)]
	struct StubState {
		routes: Vec<StubRoute>,
		requests: Vec<RecordedRequest>,
	}

	/// In-process [`GatewayHttpClient`] that answers from canned routes and records every
	/// request it receives.
	///
	/// Routes match on URL path suffix; the most recently added matching route wins. Requests
	/// without a matching route receive HTTP 404.
	#[derive(Clone, Debug, Default)]
	pub struct StubHttpClient(Arc<Mutex<StubState>>);
	impl StubHttpClient {
		/// Registers a canned response for URLs whose path ends with `path_suffix`.
		pub fn route(self, path_suffix: &str, status: u16, body: &str) -> Self {
			self.0.lock().routes.push(StubRoute {
				path_suffix: path_suffix.into(),
				status,
				body: body.into(),
			});

			self
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.lock().requests.clone()
		}

		/// Returns the requests whose path ends with `path_suffix`.
		pub fn requests_to(&self, path_suffix: &str) -> Vec<RecordedRequest> {
			self.requests()
				.into_iter()
				.filter(|request| {
					Url::parse(&request.url)
						.map(|url| url.path().ends_with(path_suffix))
						.unwrap_or(false)
				})
				.collect()
		}
	}
	impl GatewayHttpClient for StubHttpClient {
		type Handle = StubHandle;
		type TransportError = Infallible;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			StubHandle { state: self.0.clone(), slot }
		}
	}

	/// Handle returned by [`StubHttpClient::with_metadata`].
	pub struct StubHandle {
		state: Arc<Mutex<StubState>>,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for StubHandle {
		type Error = HttpClientError<Infallible>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.slot.take();

				let recorded = RecordedRequest {
					method: request.method().as_str().to_owned(),
					url: request.uri().to_string(),
					headers: request
						.headers()
						.iter()
						.map(|(name, value)| {
							let value = value.to_str().unwrap_or_default();

							(name.as_str().to_owned(), value.to_owned())
						})
						.collect(),
					body: String::from_utf8_lossy(request.body()).into_owned(),
				};
				let path = request.uri().path().to_owned();
				let mut state = self.state.lock();
				let route = state
					.routes
					.iter()
					.rev()
					.find(|route| path.ends_with(&route.path_suffix))
					.cloned()
					.unwrap_or(StubRoute {
						path_suffix: String::new(),
						status: 404,
						body: String::new(),
					});

				state.requests.push(recorded);
				self.slot.store(ResponseMetadata { status: Some(route.status), retry_after: None });

				let mut response = HttpResponse::new(route.body.into_bytes());

				*response.status_mut() =
					StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

				Ok(response)
			})
		}
	}

	/// [`TokenProvider`] that always hands out the same token and counts invocations.
	#[derive(Debug)]
	pub struct StaticTokenProvider {
		root_url: RootUrl,
		token: Option<Token>,
		calls: std::sync::atomic::AtomicUsize,
	}
	impl StaticTokenProvider {
		/// Creates a provider bound to `root_url` that returns `token` on every call.
		pub fn new(root_url: &str, token: Option<Token>) -> Self {
			Self {
				root_url: RootUrl::parse(root_url).expect("Stub root URL should be valid."),
				token,
				calls: Default::default(),
			}
		}

		/// Number of `check_generate_token` invocations observed.
		pub fn calls(&self) -> usize {
			self.calls.load(std::sync::atomic::Ordering::Relaxed)
		}
	}
	impl TokenProvider for StaticTokenProvider {
		fn root_url(&self) -> &RootUrl {
			&self.root_url
		}

		fn check_generate_token<'a>(&'a self, cancel: &'a CancelToken) -> TokenFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

				if cancel.is_cancelled() {
					return Ok(None);
				}

				Ok(self.token.clone())
			})
		}
	}

	/// Milliseconds since the Unix epoch, offset by `delta`.
	pub fn epoch_millis_from_now(delta: Duration) -> i64 {
		let instant = OffsetDateTime::now_utc() + delta;

		(instant.unix_timestamp_nanos() / 1_000_000) as i64
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
