//! App login: client-credentials tokens issued by the hosted platform.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_EXPIRATION, Token, TokenSecret},
	cancel::CancelToken,
	dispatch::{self, Headers},
	endpoint::{Endpoint, ONLINE_ROOT, RootUrl},
	http::GatewayHttpClient,
	obs::{self, OperationKind, OperationSpan, Outcome},
	provider::{TokenFuture, TokenMetrics, TokenProvider, cache::TokenCache},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Online path of the OAuth token endpoint.
pub const APP_LOGIN_PATH: &str = "oauth2/token";

#[cfg(feature = "reqwest")]
/// App-login provider on the crate's default reqwest transport.
pub type ReqwestAppLoginTokenProvider = AppLoginTokenProvider<ReqwestHttpClient>;

#[derive(Debug, Deserialize)]
struct AppLoginResponse {
	access_token: String,
	#[serde(default)]
	expires_in: i64,
}

/// Caches an application token obtained with a client id and secret.
pub struct AppLoginTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	root_url: RootUrl,
	client_id: String,
	client_secret: TokenSecret,
	expiration: Duration,
	token_endpoint: Endpoint,
	cache: TokenCache,
	metrics: Arc<TokenMetrics>,
}
impl<C> AppLoginTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a provider for the given application credentials on the caller's transport.
	pub fn with_http_client(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		Ok(Self {
			http_client: http_client.into(),
			root_url: RootUrl::parse(ONLINE_ROOT)?,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			expiration: DEFAULT_EXPIRATION,
			token_endpoint: Endpoint::online(APP_LOGIN_PATH),
			cache: TokenCache::default(),
			metrics: Default::default(),
		})
	}

	/// Overrides the requested token lifetime (at least one minute).
	pub fn with_expiration(mut self, expiration: Duration) -> Self {
		self.expiration = expiration.max(Duration::MINUTE);

		self
	}

	/// Overrides the token endpoint (defaults to the hosted `sharing/oauth2/token`).
	pub fn with_token_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.token_endpoint = endpoint;

		self
	}

	/// Returns the cached token when it is still valid.
	pub fn cached_token(&self) -> Option<Token> {
		self.cache.fresh()
	}

	/// Counters for this provider.
	pub fn metrics(&self) -> &Arc<TokenMetrics> {
		&self.metrics
	}

	async fn login(&self, cancel: &CancelToken) -> Result<Option<Token>> {
		const KIND: OperationKind = OperationKind::AppLogin;

		let span = OperationSpan::new(KIND, "login");

		obs::record_outcome(KIND, Outcome::Attempt);
		self.metrics.record_token_request();

		let result = span
			.instrument(async move {
				let raw = self.token_endpoint.build_absolute_url(&self.root_url);
				let url = Url::parse(&raw)
					.map_err(|e| Error::InvalidRequest { url: raw, reason: e.to_string() })?;
				let params = BTreeMap::from([
					("client_id".to_owned(), self.client_id.clone()),
					("client_secret".to_owned(), self.client_secret.expose().to_owned()),
					("grant_type".to_owned(), "client_credentials".to_owned()),
					("expiration".to_owned(), self.expiration.whole_minutes().to_string()),
					("f".to_owned(), "json".to_owned()),
				]);
				let request = dispatch::build_post(&url, &params, &Headers::default())?;
				let issued_at = OffsetDateTime::now_utc();
				let response = dispatch::call_json::<_, AppLoginResponse>(
					&*self.http_client,
					request,
					cancel,
					Error::Authentication,
				)
				.await?;

				Ok(response.map(|response| {
					Token::expiring_in(
						response.access_token,
						issued_at,
						Duration::seconds(response.expires_in),
					)
					.with_always_use_ssl(true)
				}))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
#[cfg(feature = "reqwest")]
impl AppLoginTokenProvider<ReqwestHttpClient> {
	/// Creates a provider on a default reqwest transport.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
		Self::with_http_client(client_id, client_secret, ReqwestHttpClient::default())
	}
}
impl<C> TokenProvider for AppLoginTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn root_url(&self) -> &RootUrl {
		&self.root_url
	}

	fn check_generate_token<'a>(&'a self, cancel: &'a CancelToken) -> TokenFuture<'a> {
		Box::pin(async move {
			self.cache.get_or_refresh(cancel, &self.metrics, || self.login(cancel)).await
		})
	}
}
impl<C> Debug for AppLoginTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppLoginTokenProvider")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("expiration", &self.expiration)
			.field("token_endpoint", &self.token_endpoint)
			.finish()
	}
}
