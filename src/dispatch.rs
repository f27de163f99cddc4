//! Request construction and response classification shared by the gateway and providers.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName, REFERER},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	cancel::CancelToken,
	codec::{self, PlatformError},
	error::TransportError,
	http::{GatewayHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const BODY_PREVIEW_LEN: usize = 256;

/// Extra headers attached to a request.
#[derive(Clone, Debug, Default)]
pub(crate) struct Headers {
	pub(crate) bearer: Option<String>,
	pub(crate) referer: Option<String>,
}
impl Headers {
	fn pairs(&self) -> impl Iterator<Item = (HeaderName, String)> + '_ {
		self.bearer
			.iter()
			.map(|token| (AUTHORIZATION, format!("Bearer {token}")))
			.chain(self.referer.iter().map(|referer| (REFERER, referer.clone())))
	}
}

/// Appends `params` to the query string of `url`.
pub(crate) fn with_query(url: &Url, params: &BTreeMap<String, String>) -> Url {
	let mut url = url.clone();

	if !params.is_empty() {
		url.query_pairs_mut().extend_pairs(params);
	}

	url
}

/// Fails with [`Error::InvalidRequest`] unless `url` is an absolute HTTP(S) URL with a host.
pub(crate) fn validate_url(url: &Url) -> Result<()> {
	let reason = if !matches!(url.scheme(), "http" | "https") {
		format!("scheme `{}` is not supported", url.scheme())
	} else if url.host_str().is_none_or(str::is_empty) {
		"host is missing".to_owned()
	} else {
		return Ok(());
	};

	Err(Error::InvalidRequest { url: url.to_string(), reason })
}

/// Builds a GET request carrying `params` in the query string.
pub(crate) fn build_get(
	url: &Url,
	params: &BTreeMap<String, String>,
	headers: &Headers,
) -> Result<HttpRequest> {
	let url = with_query(url, params);

	build(Method::GET, &url, None, headers, Vec::new())
}

/// Builds a form-encoded POST request carrying `params` in the body.
pub(crate) fn build_post(
	url: &Url,
	params: &BTreeMap<String, String>,
	headers: &Headers,
) -> Result<HttpRequest> {
	let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();

	build(Method::POST, url, Some(FORM_CONTENT_TYPE), headers, body.into_bytes())
}

fn build(
	method: Method,
	url: &Url,
	content_type: Option<&str>,
	headers: &Headers,
	body: Vec<u8>,
) -> Result<HttpRequest> {
	validate_url(url)?;

	let mut builder =
		Request::builder().method(method).uri(url.as_str()).header(ACCEPT, "application/json");

	if let Some(content_type) = content_type {
		builder = builder.header(CONTENT_TYPE, content_type);
	}
	for (name, value) in headers.pairs() {
		builder = builder.header(name, value);
	}

	builder
		.body(body)
		.map_err(|e| Error::InvalidRequest { url: url.to_string(), reason: e.to_string() })
}

/// Sends `request`, resolving to `None` when `cancel` fires first.
///
/// Non-2xx responses fail with [`TransportError::Status`].
pub(crate) async fn send<C>(
	client: &C,
	request: HttpRequest,
	cancel: &CancelToken,
) -> Result<Option<HttpResponse>>
where
	C: ?Sized + GatewayHttpClient,
{
	let url = request.uri().to_string();
	let slot = ResponseMetadataSlot::default();
	let handle = client.with_metadata(slot.clone());
	let Some(outcome) = cancel.run(handle.call(request)).await else {
		return Ok(None);
	};
	let meta = slot.take();
	let response = outcome.map_err(|e| map_client_error(&url, meta.as_ref(), e))?;
	let status = response.status();

	if !status.is_success() {
		return Err(TransportError::Status {
			status: status.as_u16(),
			retry_after: meta.and_then(|meta| meta.retry_after),
			body_preview: preview(response.body()),
		}
		.into());
	}

	Ok(Some(response))
}

/// Sends `request` and decodes a JSON body, mapping any embedded error envelope through
/// `embedded` before typed decoding runs.
pub(crate) async fn call_json<C, T>(
	client: &C,
	request: HttpRequest,
	cancel: &CancelToken,
	embedded: fn(PlatformError) -> Error,
) -> Result<Option<T>>
where
	C: ?Sized + GatewayHttpClient,
	T: DeserializeOwned,
{
	let Some(response) = send(client, request, cancel).await? else {
		return Ok(None);
	};

	decode(&response, embedded).map(Some)
}

/// Checks `response` for an embedded error, then decodes it into `T`.
pub(crate) fn decode<T>(response: &HttpResponse, embedded: fn(PlatformError) -> Error) -> Result<T>
where
	T: DeserializeOwned,
{
	if let Some(err) = codec::probe_error(response.body()) {
		return Err(embedded(err));
	}

	codec::as_response(response.body(), Some(response.status().as_u16()))
}

fn map_client_error<E>(url: &str, meta: Option<&ResponseMetadata>, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(source) => TransportError::Network { source }.into(),
		HttpClientError::Http(source) =>
			Error::InvalidRequest { url: url.to_owned(), reason: source.to_string() },
		HttpClientError::Io(source) => TransportError::Io(source).into(),
		HttpClientError::Other(message) =>
			TransportError::Other { message, status: meta.and_then(|meta| meta.status) }.into(),
		other => TransportError::Other {
			message: other.to_string(),
			status: meta.and_then(|meta| meta.status),
		}
		.into(),
	}
}

fn preview(body: &[u8]) -> String {
	String::from_utf8_lossy(body).chars().take(BODY_PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::StubHttpClient;

	fn params() -> BTreeMap<String, String> {
		BTreeMap::from([
			("f".to_owned(), "json".to_owned()),
			("where".to_owned(), "a = 'b&c'".to_owned()),
		])
	}

	#[test]
	fn get_and_post_carry_identical_parameters() {
		let url = Url::parse("https://gis.example.com/arcgis/rest/services/x/query")
			.expect("Fixture URL should parse.");
		let headers = Headers { bearer: Some("tok".into()), referer: Some("https://app".into()) };
		let get = build_get(&url, &params(), &headers).expect("GET should build.");
		let post = build_post(&url, &params(), &headers).expect("POST should build.");
		let get_pairs = Url::parse(&get.uri().to_string())
			.expect("GET URI should parse.")
			.query_pairs()
			.into_owned()
			.collect::<BTreeMap<_, _>>();
		let post_pairs =
			form_urlencoded::parse(post.body()).into_owned().collect::<BTreeMap<_, _>>();

		let header = |request: &HttpRequest, name: HeaderName| {
			request.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
		};

		assert_eq!(get.method(), Method::GET);
		assert_eq!(post.method(), Method::POST);
		assert_eq!(get_pairs, post_pairs);
		assert_eq!(header(&post, CONTENT_TYPE).as_deref(), Some(FORM_CONTENT_TYPE));
		assert_eq!(header(&get, AUTHORIZATION).as_deref(), Some("Bearer tok"));
		assert_eq!(header(&get, REFERER).as_deref(), Some("https://app"));
	}

	#[test]
	fn invalid_urls_fail_fast() {
		let url = Url::parse("ftp://gis.example.com/file").expect("Fixture URL should parse.");
		let err = build_get(&url, &params(), &Headers::default()).expect_err("FTP should fail.");

		assert!(matches!(err, Error::InvalidRequest { .. }));

		let url = Url::parse("https://gis.example.com/x").expect("Fixture URL should parse.");
		let headers = Headers { bearer: Some("bad\nvalue".into()), referer: None };
		let err = build_post(&url, &params(), &headers).expect_err("Header injection should fail.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	#[tokio::test]
	async fn non_success_statuses_become_transport_errors() {
		let client = StubHttpClient::default().route("/down", 503, "busy");
		let url = Url::parse("https://gis.example.com/down").expect("Fixture URL should parse.");
		let request = build_get(&url, &params(), &Headers::default()).expect("GET should build.");
		let err = send(&client, request, &CancelToken::new())
			.await
			.expect_err("503 should fail.");

		assert!(matches!(
			err,
			Error::Transport(TransportError::Status { status: 503, ref body_preview, .. })
				if body_preview == "busy"
		));
	}

	#[tokio::test]
	async fn embedded_errors_win_over_decoding() {
		let client = StubHttpClient::default()
			.route("/query", 200, r#"{"error":{"code":400,"message":"Bad where"}}"#);
		let url = Url::parse("https://gis.example.com/query").expect("Fixture URL should parse.");
		let request = build_get(&url, &params(), &Headers::default()).expect("GET should build.");
		let err = call_json::<_, serde_json::Value>(
			&client,
			request,
			&CancelToken::new(),
			Error::Operation,
		)
		.await
		.expect_err("Envelope should fail.");

		assert_eq!(err.platform_code(), Some(400));
		assert!(matches!(err, Error::Operation(_)));
	}

	#[tokio::test]
	async fn cancelled_calls_resolve_to_none() {
		let client = StubHttpClient::default().route("/query", 200, "{}");
		let url = Url::parse("https://gis.example.com/query").expect("Fixture URL should parse.");
		let request = build_get(&url, &params(), &Headers::default()).expect("GET should build.");
		let cancel = CancelToken::new();

		cancel.cancel();

		let outcome = send(&client, request, &cancel).await.expect("Cancellation is not an error.");

		assert!(outcome.is_none());
		assert!(client.requests().is_empty());
	}
}
