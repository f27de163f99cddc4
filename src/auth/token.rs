//! Immutable bearer tokens and their expiry rules.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Lifecycle status for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// No token value; expiry rules do not apply.
	Empty,
	/// Token is usable (including tokens without an expiry).
	Active,
	/// Token expiry instant has passed.
	Expired,
}

/// Bearer credential issued by a token endpoint.
///
/// Tokens are never mutated after issue; providers replace them wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	value: TokenSecret,
	/// Expiry in milliseconds since the Unix epoch; `<= 0` means no expiry.
	expiry: i64,
	referer: Option<String>,
	always_use_ssl: bool,
}
impl Token {
	/// Creates a token expiring at `expiry_millis` (milliseconds since the Unix epoch).
	pub fn new(value: impl Into<String>, expiry_millis: i64) -> Self {
		Self {
			value: TokenSecret::new(value),
			expiry: expiry_millis,
			referer: None,
			always_use_ssl: false,
		}
	}

	/// Creates a token expiring `lifetime` after `issued_at`.
	pub fn expiring_in(
		value: impl Into<String>,
		issued_at: OffsetDateTime,
		lifetime: Duration,
	) -> Self {
		Self::new(value, epoch_millis(issued_at + lifetime))
	}

	/// Binds the token to the referer it was issued for.
	pub fn with_referer(mut self, referer: Option<String>) -> Self {
		self.referer = referer;

		self
	}

	/// Marks whether requests carrying this token must use HTTPS.
	pub fn with_always_use_ssl(mut self, always_use_ssl: bool) -> Self {
		self.always_use_ssl = always_use_ssl;

		self
	}

	/// Token value. Callers must avoid logging this string.
	pub fn value(&self) -> &str {
		self.value.expose()
	}

	/// Expiry in milliseconds since the Unix epoch (`<= 0` when the token never expires).
	pub fn expiry_millis(&self) -> i64 {
		self.expiry
	}

	/// Expiry instant, if the token expires.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		if self.expiry <= 0 {
			return None;
		}

		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.expiry) * 1_000_000).ok()
	}

	/// Referer the token was issued for, if any.
	pub fn referer(&self) -> Option<&str> {
		self.referer.as_deref()
	}

	/// Whether requests carrying this token must be upgraded to HTTPS.
	pub fn always_use_ssl(&self) -> bool {
		self.always_use_ssl
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.value.is_empty() {
			return TokenStatus::Empty;
		}
		if self.expiry > 0 && self.expiry <= epoch_millis(instant) {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token has a value and its expiry is at or before `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("value", &self.value)
			.field("expiry", &self.expiry)
			.field("referer", &self.referer)
			.field("always_use_ssl", &self.always_use_ssl)
			.finish()
	}
}

/// Token endpoint payload (`{token, expires, ssl}`).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
	pub(crate) token: String,
	#[serde(default)]
	pub(crate) expires: i64,
	#[serde(default)]
	pub(crate) ssl: bool,
}
impl TokenResponse {
	pub(crate) fn into_token(self, referer: Option<String>) -> Token {
		Token::new(self.token, self.expires).with_referer(referer).with_always_use_ssl(self.ssl)
	}
}

/// Milliseconds since the Unix epoch for `instant`.
pub(crate) fn epoch_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}
