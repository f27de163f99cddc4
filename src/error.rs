//! Gateway-level error types shared across endpoints, token providers, and dispatch.

// self
use crate::{_prelude::*, auth::CryptoError, codec::PlatformError, endpoint::EndpointError};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Cancellation is not represented here; cancellable calls return `Ok(None)` instead.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, non-2xx status).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A built request URL failed validation before dispatch.
	#[error("Request URL `{url}` is invalid: {reason}.")]
	InvalidRequest {
		/// URL (or URL fragment) that failed validation.
		url: String,
		/// Human-readable validation failure.
		reason: String,
	},
	/// Token, app-login, or federated exchange response carried an error envelope.
	#[error("Authentication failed: {0}")]
	Authentication(#[source] PlatformError),
	/// Operation response carried an error envelope despite a successful HTTP status.
	#[error("Operation failed: {0}")]
	Operation(#[source] PlatformError),
	/// Response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl Error {
	/// Returns the platform error carried by authentication/operation failures.
	pub fn platform_error(&self) -> Option<&PlatformError> {
		match self {
			Self::Authentication(err) | Self::Operation(err) => Some(err),
			_ => None,
		}
	}

	/// Returns the platform error code carried by authentication/operation failures.
	pub fn platform_code(&self) -> Option<i64> {
		self.platform_error().map(|err| err.code)
	}
}

/// Configuration and validation failures raised at construction time.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Root URL was empty.
	#[error("Root URL is required.")]
	MissingRootUrl,
	/// Root URL cannot be parsed or is not an HTTP(S) URL.
	#[error("Root URL `{url}` is invalid: {reason}.")]
	InvalidRootUrl {
		/// Offending input.
		url: String,
		/// Human-readable validation failure.
		reason: String,
	},
	/// Endpoint path cannot be normalized.
	#[error(transparent)]
	Endpoint(#[from] EndpointError),
	/// Referer is not an absolute URL.
	#[error("Referer `{referer}` is not a valid URL.")]
	InvalidReferer {
		/// Offending input.
		referer: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// `client=referer` was requested without a referer value.
	#[error("Client `referer` requires a referer value.")]
	MissingReferer,
	/// `client=ip` was requested without an address.
	#[error("Client `ip` requires an IP address.")]
	MissingIp,
	/// Request parameters could not be flattened into form fields.
	#[error("Request parameters could not be encoded.")]
	Serialize(#[from] serde_json::Error),
	/// Request parameters did not serialize into a JSON object.
	#[error("Request parameters must serialize into an object, found {found}.")]
	NotAnObject {
		/// JSON kind that was produced instead.
		found: &'static str,
	},
	/// Credential encryption failed.
	#[error("Credentials could not be encrypted.")]
	Encryption(#[from] CryptoError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<EndpointError> for Error {
	fn from(e: EndpointError) -> Self {
		Self::Config(e.into())
	}
}
impl From<CryptoError> for Error {
	fn from(e: CryptoError) -> Self {
		Self::Config(e.into())
	}
}

/// Transport-level failures (network, IO, HTTP status).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the server.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the server.")]
	Io(#[from] std::io::Error),
	/// Server answered with a non-success HTTP status.
	#[error("Server responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Leading part of the response body.
		body_preview: String,
	},
	/// HTTP client failed for a reason it only described in text.
	#[error("HTTP client error occurred while calling the server: {message}.")]
	Other {
		/// Client-supplied description.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns the HTTP status code associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			Self::Other { status, .. } => *status,
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
