//! Credential requests for the token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Default lifetime requested for generated tokens.
pub const DEFAULT_EXPIRATION: Duration = Duration::minutes(60);

/// Identifies who the issued token is bound to.
///
/// The referer value lives inside [`TokenClient::Referer`], so a request can never carry a
/// referer alongside a different client type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenClient {
	/// No client binding is sent.
	Unspecified,
	/// Token is bound to the IP address the request originates from.
	#[default]
	RequestIp,
	/// Token is bound to an explicit IP address.
	Ip(String),
	/// Token is bound to a referer URL.
	Referer(String),
}
impl TokenClient {
	/// Wire value of the `client` form field (empty for [`TokenClient::Unspecified`]).
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Unspecified => "",
			Self::RequestIp => "requestip",
			Self::Ip(_) => "ip",
			Self::Referer(_) => "referer",
		}
	}

	/// Parses the wire pair (`client`, `referer`/`ip` value) into a consistent binding.
	pub fn from_wire(client: &str, value: Option<&str>) -> Result<Self, ConfigError> {
		let value = value.map(str::trim).filter(|v| !v.is_empty());

		match client.trim().to_ascii_lowercase().as_str() {
			"" => Ok(Self::Unspecified),
			"requestip" => Ok(Self::RequestIp),
			"ip" => value.map(|ip| Self::Ip(ip.to_owned())).ok_or(ConfigError::MissingIp),
			"referer" => {
				let referer = value.ok_or(ConfigError::MissingReferer)?;

				validate_referer(referer)?;

				Ok(Self::Referer(referer.to_owned()))
			},
			_ => match value {
				Some(referer) => {
					validate_referer(referer)?;

					Ok(Self::Referer(referer.to_owned()))
				},
				None => Ok(Self::Unspecified),
			},
		}
	}

	/// Referer value, when bound to one.
	pub fn referer(&self) -> Option<&str> {
		match self {
			Self::Referer(referer) => Some(referer),
			_ => None,
		}
	}
}

/// Username/password request sent to the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerateTokenRequest {
	username: String,
	password: TokenSecret,
	client: TokenClient,
	expiration: Duration,
}
impl GenerateTokenRequest {
	/// Creates a request bound to the caller's IP with the default expiration.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			password: TokenSecret::new(password),
			client: TokenClient::default(),
			expiration: DEFAULT_EXPIRATION,
		}
	}

	/// Binds the token to `referer`, which must be an absolute URL.
	///
	/// An empty referer clears the binding back to [`TokenClient::Unspecified`].
	pub fn with_referer(mut self, referer: impl Into<String>) -> Result<Self, ConfigError> {
		let referer = referer.into();

		self.client = if referer.trim().is_empty() {
			TokenClient::Unspecified
		} else {
			validate_referer(&referer)?;

			TokenClient::Referer(referer)
		};

		Ok(self)
	}

	/// Replaces the client binding; choosing any non-referer client drops the referer.
	pub fn with_client(mut self, client: TokenClient) -> Self {
		self.client = client;

		self
	}

	/// Overrides the requested token lifetime (rounded down to whole minutes, at least one).
	pub fn with_expiration(mut self, expiration: Duration) -> Self {
		self.expiration = expiration.max(Duration::MINUTE);

		self
	}

	/// Username sent to the token endpoint.
	pub fn username(&self) -> &str {
		&self.username
	}

	/// Client binding.
	pub fn client(&self) -> &TokenClient {
		&self.client
	}

	/// Referer the issued token will be bound to, if any.
	pub fn referer(&self) -> Option<&str> {
		self.client.referer()
	}

	/// Requested lifetime.
	pub fn expiration(&self) -> Duration {
		self.expiration
	}

	/// Builds the plaintext form submitted to the token endpoint.
	pub fn to_form(&self) -> CredentialForm {
		let (referer, ip) = match &self.client {
			TokenClient::Referer(referer) => (Some(referer.clone()), None),
			TokenClient::Ip(ip) => (None, Some(ip.clone())),
			_ => (None, None),
		};
		let client = Some(self.client.as_str()).filter(|c| !c.is_empty()).map(str::to_owned);

		CredentialForm {
			username: self.username.clone(),
			password: self.password.expose().to_owned(),
			client,
			referer,
			ip,
			expiration: self.expiration.whole_minutes().to_string(),
			f: "json".into(),
			encrypted: None,
		}
	}
}
impl Debug for GenerateTokenRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GenerateTokenRequest")
			.field("username", &self.username)
			.field("password", &self.password)
			.field("client", &self.client)
			.field("expiration", &self.expiration)
			.finish()
	}
}

/// Wire form posted to the token endpoint.
///
/// When [`encrypted`](Self::encrypted) is `Some("true")`, `username`, `password`, `client`
/// and `expiration` hold lowercase hex ciphertext.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CredentialForm {
	/// Username (plaintext or hex ciphertext).
	pub username: String,
	/// Password (plaintext or hex ciphertext).
	pub password: String,
	/// Client binding (plaintext or hex ciphertext).
	pub client: Option<String>,
	/// Referer, sent in plaintext.
	pub referer: Option<String>,
	/// Explicit IP binding, sent in plaintext.
	pub ip: Option<String>,
	/// Expiration in minutes (plaintext or hex ciphertext).
	pub expiration: String,
	/// Response format; always `json`.
	pub f: String,
	/// `true` once the credential fields are encrypted.
	pub encrypted: Option<String>,
}
impl CredentialForm {
	/// Returns `true` once the credential fields are encrypted.
	pub fn is_encrypted(&self) -> bool {
		self.encrypted.as_deref() == Some("true")
	}
}
impl Debug for CredentialForm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialForm")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("client", &self.client)
			.field("referer", &self.referer)
			.field("expiration", &self.expiration)
			.field("encrypted", &self.is_encrypted())
			.finish()
	}
}

fn validate_referer(referer: &str) -> Result<(), ConfigError> {
	Url::parse(referer)
		.map(|_| ())
		.map_err(|source| ConfigError::InvalidReferer { referer: referer.to_owned(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::codec;

	#[test]
	fn referer_forces_referer_client_and_empty_client_clears_it() {
		let request = GenerateTokenRequest::new("a", "b")
			.with_referer("https://x")
			.expect("Referer should be accepted.");

		assert_eq!(request.client().as_str(), "referer");
		assert_eq!(request.referer(), Some("https://x"));

		let request = request.with_client(TokenClient::Unspecified);

		assert_eq!(request.client().as_str(), "");
		assert_eq!(request.referer(), None);
	}

	#[test]
	fn invalid_referers_are_rejected() {
		let err = GenerateTokenRequest::new("a", "b")
			.with_referer("not a url")
			.expect_err("Relative referers should fail.");

		assert!(matches!(err, ConfigError::InvalidReferer { .. }));
		assert!(matches!(
			TokenClient::from_wire("referer", None),
			Err(ConfigError::MissingReferer)
		));
		assert!(matches!(TokenClient::from_wire("ip", Some(" ")), Err(ConfigError::MissingIp)));
		assert_eq!(
			TokenClient::from_wire("RequestIP", Some("ignored")).ok(),
			Some(TokenClient::RequestIp)
		);
	}

	#[test]
	fn form_carries_client_binding_and_expiration() {
		let request = GenerateTokenRequest::new("alice", "pw")
			.with_referer("https://app.example.com")
			.expect("Referer should be accepted.")
			.with_expiration(Duration::minutes(90));
		let params = codec::as_dictionary(&request.to_form()).expect("Form should flatten.");

		assert_eq!(params.get("username").map(String::as_str), Some("alice"));
		assert_eq!(params.get("client").map(String::as_str), Some("referer"));
		assert_eq!(params.get("referer").map(String::as_str), Some("https://app.example.com"));
		assert_eq!(params.get("expiration").map(String::as_str), Some("90"));
		assert_eq!(params.get("f").map(String::as_str), Some("json"));
		assert!(!params.contains_key("encrypted"));
		assert!(!params.contains_key("ip"));

		let params = codec::as_dictionary(
			&GenerateTokenRequest::new("alice", "pw")
				.with_client(TokenClient::Unspecified)
				.with_expiration(Duration::seconds(5))
				.to_form(),
		)
		.expect("Form should flatten.");

		assert!(!params.contains_key("client"));
		assert_eq!(params.get("expiration").map(String::as_str), Some("1"));
	}

	#[test]
	fn debug_output_redacts_password() {
		let request = GenerateTokenRequest::new("alice", "hunter2");

		assert!(!format!("{request:?}").contains("hunter2"));
		assert!(!format!("{:?}", request.to_form()).contains("hunter2"));
	}
}
