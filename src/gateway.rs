//! Request dispatch against one server root.
//!
//! Every call resolves a token through the injected [`TokenProvider`], forces `f=json`,
//! attaches the token (query or form field plus `Authorization`), upgrades to HTTPS when the
//! token demands it, and falls back from GET to POST once the GET URL grows past the
//! configured limit. Responses are always checked for an embedded error envelope before
//! they are decoded.

// crates.io
use oauth2::http::Method;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::Token,
	cancel::CancelToken,
	codec,
	dispatch::{self, Headers},
	endpoint::{Endpoint, RootUrl},
	http::GatewayHttpClient,
	obs::{self, OperationKind, OperationSpan, Outcome},
	provider::TokenProvider,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// GET URLs longer than this are sent as POST by default.
pub const DEFAULT_MAX_GET_URL_LEN: usize = 2047;
/// Root-relative path of the server info resource.
pub const SERVER_INFO_PATH: &str = "rest/info";

#[cfg(feature = "reqwest")]
/// Gateway on the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestHttpClient>;

/// Typed request object naming its endpoint, preferred method, and response shape.
///
/// The operation itself is flattened into request parameters through
/// [`codec::as_dictionary`], so fields that are not parameters should be skipped by serde.
pub trait Operation
where
	Self: Serialize,
{
	/// Decoded response body.
	type Response: DeserializeOwned;

	/// Endpoint the operation targets.
	fn endpoint(&self) -> Endpoint;

	/// Preferred HTTP method; GET requests may still be sent as POST when too long.
	fn method(&self) -> Method {
		Method::GET
	}
}

/// HTTP method and absolute URL actually used for a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
	/// Method on the wire.
	pub method: Method,
	/// Absolute URL (including the query string for GET).
	pub href: String,
}

/// Decoded response plus optional link metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Response<T> {
	/// Decoded body.
	pub body: T,
	/// Present when the gateway was configured with [`Gateway::with_links`].
	pub link: Option<Link>,
}
impl<T> Response<T> {
	/// Discards link metadata.
	pub fn into_body(self) -> T {
		self.body
	}
}

/// Subset of `rest/info` describing the server version and its token service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
	/// Numeric server version, e.g. `11.1`.
	#[serde(default)]
	pub current_version: Option<f64>,
	/// Full version string, e.g. `11.1.0`.
	#[serde(default)]
	pub full_version: Option<String>,
	/// Token-service description.
	#[serde(default)]
	pub auth_info: Option<AuthInfo>,
}

/// Token-service description embedded in [`ServerInfo`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
	/// Whether the server requires tokens.
	#[serde(default)]
	pub is_token_based_security: bool,
	/// Token endpoint advertised by the server.
	#[serde(default)]
	pub token_services_url: Option<String>,
	/// Lifetime of short-lived tokens, in minutes.
	#[serde(default)]
	pub short_lived_token_validity: Option<i64>,
}

/// Façade for issuing requests against one server root.
///
/// Whether requests are secured is decided solely by the presence of a token provider.
pub struct Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	root_url: RootUrl,
	token_provider: Option<Arc<dyn TokenProvider>>,
	max_get_url_len: usize,
	attach_links: bool,
}
impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates an anonymous gateway for `root_url` on the caller's transport.
	pub fn with_http_client(root_url: &str, http_client: impl Into<Arc<C>>) -> Result<Self> {
		Ok(Self {
			http_client: http_client.into(),
			root_url: RootUrl::parse(root_url)?,
			token_provider: None,
			max_get_url_len: DEFAULT_MAX_GET_URL_LEN,
			attach_links: false,
		})
	}

	/// Authorizes every request with tokens from `provider`.
	pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
		self.token_provider = Some(provider);

		self
	}

	/// Overrides the GET URL length above which requests are sent as POST.
	pub fn with_max_get_url_len(mut self, max_len: usize) -> Self {
		self.max_get_url_len = max_len;

		self
	}

	/// Attaches [`Link`] metadata to responses.
	pub fn with_links(mut self, attach: bool) -> Self {
		self.attach_links = attach;

		self
	}

	/// Normalized server root.
	pub fn root_url(&self) -> &RootUrl {
		&self.root_url
	}

	/// Injected token provider, if any.
	pub fn token_provider(&self) -> Option<&Arc<dyn TokenProvider>> {
		self.token_provider.as_ref()
	}

	/// GETs `endpoint` and decodes the body.
	pub async fn get<T>(&self, endpoint: &Endpoint, cancel: &CancelToken) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.send(Method::GET, endpoint, BTreeMap::new(), cancel).await?;

		Ok(response.map(Response::into_body))
	}

	/// GETs `endpoint` with `params` flattened into the query string.
	pub async fn get_with<T, P>(
		&self,
		endpoint: &Endpoint,
		params: &P,
		cancel: &CancelToken,
	) -> Result<Option<T>>
	where
		T: DeserializeOwned,
		P: ?Sized + Serialize,
	{
		let params = codec::as_dictionary(params)?;
		let response = self.send(Method::GET, endpoint, params, cancel).await?;

		Ok(response.map(Response::into_body))
	}

	/// POSTs `params` as a form to `endpoint` and decodes the body.
	pub async fn post<T, P>(
		&self,
		endpoint: &Endpoint,
		params: &P,
		cancel: &CancelToken,
	) -> Result<Option<T>>
	where
		T: DeserializeOwned,
		P: ?Sized + Serialize,
	{
		let params = codec::as_dictionary(params)?;
		let response = self.send(Method::POST, endpoint, params, cancel).await?;

		Ok(response.map(Response::into_body))
	}

	/// Dispatches a typed operation.
	pub async fn execute<O>(
		&self,
		operation: &O,
		cancel: &CancelToken,
	) -> Result<Option<Response<O::Response>>>
	where
		O: Operation,
	{
		let params = codec::as_dictionary(operation)?;

		self.send(operation.method(), &operation.endpoint(), params, cancel).await
	}

	/// GETs any endpoint and returns its raw JSON body.
	pub async fn ping(&self, endpoint: &Endpoint, cancel: &CancelToken) -> Result<Option<Value>> {
		self.get(endpoint, cancel).await
	}

	/// GETs `rest/info`.
	pub async fn server_info(&self, cancel: &CancelToken) -> Result<Option<ServerInfo>> {
		self.get(&Endpoint::absolute(self.root_url.join(SERVER_INFO_PATH)), cancel).await
	}

	/// Sends a request with explicit parameters and returns the decoded body plus link data.
	pub async fn send<T>(
		&self,
		method: Method,
		endpoint: &Endpoint,
		params: BTreeMap<String, String>,
		cancel: &CancelToken,
	) -> Result<Option<Response<T>>>
	where
		T: DeserializeOwned,
	{
		const KIND: OperationKind = OperationKind::Request;

		let span = OperationSpan::new(KIND, "send");

		obs::record_outcome(KIND, Outcome::Attempt);

		let result = span.instrument(self.dispatch(method, endpoint, params, cancel)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn dispatch<T>(
		&self,
		method: Method,
		endpoint: &Endpoint,
		mut params: BTreeMap<String, String>,
		cancel: &CancelToken,
	) -> Result<Option<Response<T>>>
	where
		T: DeserializeOwned,
	{
		let token = match &self.token_provider {
			Some(provider) => match provider.check_generate_token(cancel).await? {
				None if cancel.is_cancelled() => return Ok(None),
				token => token,
			},
			None => None,
		};
		let raw = endpoint.build_absolute_url(&self.root_url);
		let mut url = Url::parse(&raw)
			.map_err(|e| Error::InvalidRequest { url: raw.clone(), reason: e.to_string() })?;

		for (key, value) in url.query_pairs().into_owned() {
			params.entry(key).or_insert(value);
		}

		url.set_query(None);
		params.entry("f".into()).or_insert_with(|| "json".into());

		let headers = match &token {
			Some(token) => authorize(&mut url, &mut params, token)?,
			None => Headers::default(),
		};
		let method = if method == Method::GET
			&& dispatch::with_query(&url, &params).as_str().len() > self.max_get_url_len
		{
			Method::POST
		} else {
			method
		};
		let (request, href) = if method == Method::GET {
			let href = dispatch::with_query(&url, &params).to_string();

			(dispatch::build_get(&url, &params, &headers)?, href)
		} else {
			(dispatch::build_post(&url, &params, &headers)?, url.to_string())
		};
		let Some(response) = dispatch::send(&*self.http_client, request, cancel).await?
		else {
			return Ok(None);
		};
		let body = dispatch::decode(&response, Error::Operation)?;
		let link = self.attach_links.then_some(Link { method, href });

		Ok(Some(Response { body, link }))
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates an anonymous gateway for `root_url` on a default reqwest transport.
	pub fn new(root_url: &str) -> Result<Self> {
		Self::with_http_client(root_url, ReqwestHttpClient::default())
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("root_url", &self.root_url)
			.field("secured", &self.token_provider.is_some())
			.field("max_get_url_len", &self.max_get_url_len)
			.field("attach_links", &self.attach_links)
			.finish()
	}
}

fn authorize(
	url: &mut Url,
	params: &mut BTreeMap<String, String>,
	token: &Token,
) -> Result<Headers> {
	if token.always_use_ssl() && url.scheme() == "http" {
		url.set_scheme("https").map_err(|()| Error::InvalidRequest {
			url: url.to_string(),
			reason: "scheme cannot be upgraded to https".into(),
		})?;
	}

	// A caller-embedded token wins; the provider's token is then neither sent nor advertised.
	let embedded = params.contains_key("token");
	let bearer =
		Some(token.value()).filter(|value| !embedded && !value.is_empty()).map(str::to_owned);

	if let Some(bearer) = &bearer {
		params.insert("token".into(), bearer.clone());
	}

	Ok(Headers { bearer, referer: token.referer().map(str::to_owned) })
}
