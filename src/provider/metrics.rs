// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one token provider.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	cache_hits: AtomicU64,
	token_requests: AtomicU64,
	public_key_requests: AtomicU64,
	failures: AtomicU64,
}
impl TokenMetrics {
	/// Returns how many calls were answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns how many token (or exchange) requests were sent.
	pub fn token_requests(&self) -> u64 {
		self.token_requests.load(Ordering::Relaxed)
	}

	/// Returns how many public key lookups were sent.
	pub fn public_key_requests(&self) -> u64 {
		self.public_key_requests.load(Ordering::Relaxed)
	}

	/// Returns how many token acquisitions failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_token_request(&self) {
		self.token_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_public_key_request(&self) {
		self.public_key_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
