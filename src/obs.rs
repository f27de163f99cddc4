//! Optional observability helpers for gateway dispatch and token acquisition.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `arcgis_gateway.operation` with `operation` and
//!   `stage` fields, plus a warn-level event when a provider falls back to plaintext
//!   credentials.
//! - Enable `metrics` to increment the `arcgis_gateway_operation_total` counter for every
//!   attempt/success/failure/cancellation, labeled by `operation` + `outcome`, and the
//!   `arcgis_gateway_operation_errors_total` counter for failures, labeled by `operation` +
//!   `error`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Network operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Username/password token request.
	GenerateToken,
	/// Public key lookup preceding credential encryption.
	PublicKey,
	/// Federated token exchange.
	FederatedExchange,
	/// Online app-login (client credentials) token request.
	AppLogin,
	/// Gateway request against a service endpoint.
	Request,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::GenerateToken => "generate_token",
			OperationKind::PublicKey => "public_key",
			OperationKind::FederatedExchange => "federated_exchange",
			OperationKind::AppLogin => "app_login",
			OperationKind::Request => "request",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Caller cancelled before completion.
	Cancelled,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::Cancelled => "cancelled",
		}
	}

	/// Classifies a cancellable result.
	pub fn of<T>(result: &Result<Option<T>>) -> Self {
		match result {
			Ok(Some(_)) => Outcome::Success,
			Ok(None) => Outcome::Cancelled,
			Err(_) => Outcome::Failure,
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
