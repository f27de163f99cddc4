//! Serializer collaborator: request flattening, typed response decoding, and error-envelope
//! probing.
//!
//! The platform answers logical failures with HTTP 200 and a body shaped like
//! `{"error":{"code":498,"message":"Invalid token","details":[]}}`. [`probe_error`] finds that
//! envelope without requiring the rest of the body to match the expected response type, so
//! the check can run before (and independently of) typed decoding.

// crates.io
use serde::Deserializer;
use serde_json::Value;
// self
use crate::{_prelude::*, error::ConfigError};

/// Logical error reported inside an otherwise successful response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("server error {code}: {message}")]
pub struct PlatformError {
	/// Numeric platform error code (e.g. `498` invalid token, `499` token required).
	#[serde(default, deserialize_with = "lenient_code")]
	pub code: i64,
	/// Human-readable message.
	#[serde(default, deserialize_with = "null_as_default")]
	pub message: String,
	/// Additional detail strings, verbatim.
	#[serde(default, deserialize_with = "null_as_default")]
	pub details: Vec<String>,
}
impl PlatformError {
	/// Creates an error with no details.
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), details: Vec::new() }
	}

	/// Appends a detail string.
	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.details.push(detail.into());

		self
	}
}

/// Flattens a request value into form/query parameters.
///
/// `null` fields are omitted, strings are passed through, numbers and booleans are
/// stringified, and nested arrays/objects are JSON-encoded (the platform expects JSON for
/// geometry and spatial-reference parameters).
pub fn as_dictionary<T>(value: &T) -> Result<BTreeMap<String, String>>
where
	T: ?Sized + Serialize,
{
	let fields = match serde_json::to_value(value).map_err(ConfigError::from)? {
		Value::Object(fields) => fields,
		other => return Err(ConfigError::NotAnObject { found: json_kind(&other) }.into()),
	};
	let mut params = BTreeMap::new();

	for (key, field) in fields {
		let encoded = match field {
			Value::Null => continue,
			Value::String(text) => text,
			Value::Bool(flag) => flag.to_string(),
			Value::Number(number) => number.to_string(),
			nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
		};

		params.insert(key, encoded);
	}

	Ok(params)
}

/// Decodes a JSON body into `T`, reporting the JSON path of any mismatch.
pub fn as_response<T>(body: &[u8], status: Option<u16>) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { source, status })
}

/// Extracts an embedded error envelope, if the body carries one.
///
/// Bodies that are not JSON objects, or whose `error` member is `null`, carry no envelope.
/// A bare string `error` member is reported with code `0`.
pub fn probe_error(body: &[u8]) -> Option<PlatformError> {
	let value = serde_json::from_slice::<Value>(body).ok()?;

	match value.get("error")? {
		Value::Null => None,
		Value::String(message) => Some(PlatformError::new(0, message.clone())),
		envelope @ Value::Object(_) => Some(
			serde_json::from_value(envelope.clone())
				.unwrap_or_else(|_| PlatformError::new(0, envelope.to_string())),
		),
		other => Some(PlatformError::new(0, other.to_string())),
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

fn lenient_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Code {
		Number(i64),
		Text(String),
		Missing,
	}

	Ok(match Code::deserialize(deserializer)? {
		Code::Number(code) => code,
		Code::Text(text) => text.trim().parse().unwrap_or_default(),
		Code::Missing => 0,
	})
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
