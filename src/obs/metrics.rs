// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	obs::{OperationKind, Outcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(kind: OperationKind, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"arcgis_gateway_operation_total",
			"operation" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how a cancellable operation ended.
///
/// Failures additionally bump `arcgis_gateway_operation_errors_total`, labeled with the
/// [`error_class`] of the error, so HTTP 200 error envelopes stay distinguishable from
/// transport failures.
pub fn record_result<T>(kind: OperationKind, result: &Result<Option<T>>) {
	record_outcome(kind, Outcome::of(result));

	let Err(err) = result else {
		return;
	};

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"arcgis_gateway_operation_errors_total",
			"operation" => kind.as_str(),
			"error" => error_class(err)
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = err;
	}
}

/// Stable, low-cardinality label for an error.
pub fn error_class(err: &Error) -> &'static str {
	match err {
		Error::Config(ConfigError::Encryption(_)) => "encryption",
		Error::Config(_) => "config",
		Error::Transport(TransportError::Status { .. }) => "http_status",
		Error::Transport(_) => "transport",
		Error::InvalidRequest { .. } => "invalid_request",
		Error::Authentication(_) => "authentication",
		Error::Operation(_) => "operation",
		Error::Decode { .. } => "decode",
	}
}
