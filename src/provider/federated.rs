//! Exchanges an upstream (portal) token for a token scoped to a federated server.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenResponse},
	cancel::CancelToken,
	dispatch::{self, Headers},
	endpoint::{Endpoint, RootUrl},
	http::GatewayHttpClient,
	obs::{self, OperationKind, OperationSpan, Outcome},
	provider::{TOKEN_PATH, TokenFuture, TokenMetrics, TokenProvider, cache::TokenCache},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Federated token provider on the crate's default reqwest transport.
pub type ReqwestFederatedTokenProvider = FederatedTokenProvider<ReqwestHttpClient>;

/// Caches a server-scoped token obtained by exchanging the upstream provider's token.
///
/// The upstream token is only ever sent in the exchange request; it is neither cached nor
/// returned by this provider.
pub struct FederatedTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	upstream: Arc<dyn TokenProvider>,
	root_url: RootUrl,
	token_endpoint: Endpoint,
	cache: TokenCache,
	metrics: Arc<TokenMetrics>,
}
impl<C> FederatedTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a provider exchanging `upstream` tokens for tokens valid on `server_url`.
	pub fn with_http_client(
		upstream: Arc<dyn TokenProvider>,
		server_url: &str,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let root_url = RootUrl::parse(server_url)?;
		let token_endpoint = Endpoint::absolute(root_url.join(TOKEN_PATH));

		Ok(Self {
			http_client: http_client.into(),
			upstream,
			root_url,
			token_endpoint,
			cache: TokenCache::default(),
			metrics: Default::default(),
		})
	}

	/// Overrides the exchange endpoint (defaults to `<server root>tokens/generateToken`).
	pub fn with_token_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.token_endpoint = endpoint;

		self
	}

	/// Returns the cached server-scoped token when it is still valid.
	pub fn cached_token(&self) -> Option<Token> {
		self.cache.fresh()
	}

	/// Counters for this provider.
	pub fn metrics(&self) -> &Arc<TokenMetrics> {
		&self.metrics
	}

	async fn exchange(&self, cancel: &CancelToken) -> Result<Option<Token>> {
		const KIND: OperationKind = OperationKind::FederatedExchange;

		let Some(upstream) = self.upstream.check_generate_token(cancel).await? else {
			return Ok(None);
		};

		if cancel.is_cancelled() {
			return Ok(None);
		}

		let span = OperationSpan::new(KIND, "exchange");

		obs::record_outcome(KIND, Outcome::Attempt);
		self.metrics.record_token_request();

		let result = span
			.instrument(async move {
				let raw = self.token_endpoint.build_absolute_url(&self.root_url);
				let url = Url::parse(&raw)
					.map_err(|e| Error::InvalidRequest { url: raw, reason: e.to_string() })?;
				let mut params = BTreeMap::from([
					("token".to_owned(), upstream.value().to_owned()),
					("serverUrl".to_owned(), self.root_url.as_str().to_owned()),
					("request".to_owned(), "getToken".to_owned()),
					("f".to_owned(), "json".to_owned()),
				]);
				let referer = upstream.referer().map(str::to_owned);

				if let Some(referer) = &referer {
					params.insert("client".into(), "referer".into());
					params.insert("referer".into(), referer.clone());
				}

				let headers = Headers { bearer: None, referer: referer.clone() };
				let request = dispatch::build_post(&url, &params, &headers)?;
				let response = dispatch::call_json::<_, TokenResponse>(
					&*self.http_client,
					request,
					cancel,
					Error::Authentication,
				)
				.await?;

				Ok(response.map(|response| response.into_token(referer)))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
#[cfg(feature = "reqwest")]
impl FederatedTokenProvider<ReqwestHttpClient> {
	/// Creates a provider on a default reqwest transport.
	pub fn new(upstream: Arc<dyn TokenProvider>, server_url: &str) -> Result<Self> {
		Self::with_http_client(upstream, server_url, ReqwestHttpClient::default())
	}
}
impl<C> TokenProvider for FederatedTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn root_url(&self) -> &RootUrl {
		&self.root_url
	}

	fn check_generate_token<'a>(&'a self, cancel: &'a CancelToken) -> TokenFuture<'a> {
		Box::pin(async move {
			self.cache.get_or_refresh(cancel, &self.metrics, || self.exchange(cancel)).await
		})
	}
}
impl<C> Debug for FederatedTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FederatedTokenProvider")
			.field("upstream_root_url", self.upstream.root_url())
			.field("root_url", &self.root_url)
			.field("token_endpoint", &self.token_endpoint)
			.finish()
	}
}
