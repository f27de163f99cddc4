//! Username/password tokens issued by a server's own token endpoint.
//!
//! A cache miss runs the full acquisition: optionally fetch the server's public key and
//! encrypt the credential form, then POST it to `tokens/generateToken`. A public key that
//! cannot be fetched or used for encryption is remembered for the lifetime of the provider,
//! and the provider falls back to plaintext credentials from then on.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{
		CredentialEncryptor, CredentialForm, GenerateTokenRequest, PublicKey, Token,
		TokenResponse,
	},
	cancel::CancelToken,
	codec,
	dispatch::{self, Headers},
	endpoint::{Endpoint, RootUrl},
	http::GatewayHttpClient,
	obs::{self, OperationKind, OperationSpan, Outcome},
	provider::{TokenFuture, TokenMetrics, TokenProvider, cache::TokenCache},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Relative path of the token endpoint below a server root.
pub const TOKEN_PATH: &str = "tokens/generateToken";
/// Relative path of the public key endpoint below the admin prefix.
pub const PUBLIC_KEY_PATH: &str = "publicKey";

#[cfg(feature = "reqwest")]
/// Server token provider on the crate's default reqwest transport.
pub type ReqwestServerTokenProvider = ServerTokenProvider<ReqwestHttpClient>;

/// Caches one token for one username/password against one server root.
pub struct ServerTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	root_url: RootUrl,
	credentials: Option<GenerateTokenRequest>,
	encryptor: Option<Arc<dyn CredentialEncryptor>>,
	token_endpoint: Endpoint,
	public_key_endpoint: Endpoint,
	cache: TokenCache,
	public_key: Mutex<Option<PublicKey>>,
	public_key_unreachable: AtomicBool,
	metrics: Arc<TokenMetrics>,
}
impl<C> ServerTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates an anonymous provider for `root_url` on the caller's transport.
	///
	/// Without [`with_credentials`](Self::with_credentials) the provider yields no token.
	pub fn with_http_client(root_url: &str, http_client: impl Into<Arc<C>>) -> Result<Self> {
		let root_url = RootUrl::parse(root_url)?;
		let token_endpoint = Endpoint::absolute(root_url.join(TOKEN_PATH));

		Ok(Self {
			http_client: http_client.into(),
			root_url,
			credentials: None,
			encryptor: None,
			token_endpoint,
			public_key_endpoint: Endpoint::admin(PUBLIC_KEY_PATH)?,
			cache: TokenCache::default(),
			public_key: Mutex::new(None),
			public_key_unreachable: AtomicBool::new(false),
			metrics: Default::default(),
		})
	}

	/// Sets the credentials used for every token request.
	pub fn with_credentials(mut self, credentials: GenerateTokenRequest) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Encrypts credentials with the server's public key before posting them.
	pub fn with_encryptor(mut self, encryptor: impl 'static + CredentialEncryptor) -> Self {
		self.encryptor = Some(Arc::new(encryptor));

		self
	}

	/// Overrides the token endpoint (defaults to `<root>tokens/generateToken`).
	pub fn with_token_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.token_endpoint = endpoint;

		self
	}

	/// Overrides the public key endpoint (defaults to `<root>admin/publicKey`).
	pub fn with_public_key_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.public_key_endpoint = endpoint;

		self
	}

	/// Returns the cached token when it is still valid.
	pub fn cached_token(&self) -> Option<Token> {
		self.cache.fresh()
	}

	/// Public key used for the most recent encrypted token request.
	pub fn public_key(&self) -> Option<PublicKey> {
		self.public_key.lock().clone()
	}

	/// Returns `true` once a public key lookup has failed for this provider.
	pub fn public_key_unreachable(&self) -> bool {
		self.public_key_unreachable.load(Ordering::Relaxed)
	}

	/// Counters for this provider.
	pub fn metrics(&self) -> &Arc<TokenMetrics> {
		&self.metrics
	}

	async fn acquire(
		&self,
		credentials: &GenerateTokenRequest,
		cancel: &CancelToken,
	) -> Result<Option<Token>> {
		self.public_key.lock().take();

		let mut form = credentials.to_form();
		let encryptor = self.encryptor.as_deref().filter(|_| !self.public_key_unreachable());

		if let Some(encryptor) = encryptor {
			match self.encrypt(encryptor, &form, cancel).await {
				Ok(Some(encrypted)) => form = encrypted,
				Ok(None) => return Ok(None),
				Err(e) => {
					self.public_key_unreachable.store(true, Ordering::Relaxed);

					obs::warn_degraded(OperationKind::PublicKey, &e);
				},
			}
		}

		self.request_token(&form, credentials.referer(), cancel).await
	}

	async fn encrypt(
		&self,
		encryptor: &dyn CredentialEncryptor,
		form: &CredentialForm,
		cancel: &CancelToken,
	) -> Result<Option<CredentialForm>> {
		let Some(key) = self.fetch_public_key(cancel).await? else {
			return Ok(None);
		};
		let encrypted = encryptor.encrypt(form, &key.exponent()?, &key.modulus()?)?;

		*self.public_key.lock() = Some(key);

		Ok(Some(encrypted))
	}

	async fn fetch_public_key(&self, cancel: &CancelToken) -> Result<Option<PublicKey>> {
		const KIND: OperationKind = OperationKind::PublicKey;

		let span = OperationSpan::new(KIND, "fetch_public_key");

		obs::record_outcome(KIND, Outcome::Attempt);
		self.metrics.record_public_key_request();

		let result = span
			.instrument(async move {
				let url = self.resolve(&self.public_key_endpoint)?;
				let params = BTreeMap::from([("f".to_owned(), "json".to_owned())]);
				let request = dispatch::build_get(&url, &params, &Headers::default())?;

				dispatch::call_json::<_, PublicKey>(
					&*self.http_client,
					request,
					cancel,
					Error::Authentication,
				)
				.await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn request_token(
		&self,
		form: &CredentialForm,
		referer: Option<&str>,
		cancel: &CancelToken,
	) -> Result<Option<Token>> {
		const KIND: OperationKind = OperationKind::GenerateToken;

		let span = OperationSpan::new(KIND, "request_token");

		obs::record_outcome(KIND, Outcome::Attempt);
		self.metrics.record_token_request();

		let result = span
			.instrument(async move {
				let url = self.resolve(&self.token_endpoint)?;
				let params = codec::as_dictionary(form)?;
				let headers = Headers { bearer: None, referer: referer.map(str::to_owned) };
				let request = dispatch::build_post(&url, &params, &headers)?;
				let response = dispatch::call_json::<_, TokenResponse>(
					&*self.http_client,
					request,
					cancel,
					Error::Authentication,
				)
				.await?;

				Ok(response.map(|response| response.into_token(referer.map(str::to_owned))))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	fn resolve(&self, endpoint: &Endpoint) -> Result<Url> {
		let raw = endpoint.build_absolute_url(&self.root_url);

		Url::parse(&raw).map_err(|e| Error::InvalidRequest { url: raw, reason: e.to_string() })
	}
}
#[cfg(feature = "reqwest")]
impl ServerTokenProvider<ReqwestHttpClient> {
	/// Creates an anonymous provider for `root_url` on a default reqwest transport.
	pub fn new(root_url: &str) -> Result<Self> {
		Self::with_http_client(root_url, ReqwestHttpClient::default())
	}
}
impl<C> TokenProvider for ServerTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn root_url(&self) -> &RootUrl {
		&self.root_url
	}

	fn check_generate_token<'a>(&'a self, cancel: &'a CancelToken) -> TokenFuture<'a> {
		Box::pin(async move {
			let Some(credentials) = &self.credentials else {
				return Ok(None);
			};

			self.cache
				.get_or_refresh(cancel, &self.metrics, || self.acquire(credentials, cancel))
				.await
		})
	}
}
impl<C> Debug for ServerTokenProvider<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServerTokenProvider")
			.field("root_url", &self.root_url)
			.field("credentials", &self.credentials)
			.field("encrypted", &self.encryptor.is_some())
			.field("token_endpoint", &self.token_endpoint)
			.field("public_key_endpoint", &self.public_key_endpoint)
			.field("public_key_unreachable", &self.public_key_unreachable())
			.finish()
	}
}
