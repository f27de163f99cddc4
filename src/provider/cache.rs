//! Single-token cache with a single-flight refresh guard.

// self
use crate::{_prelude::*, auth::Token, cancel::CancelToken, provider::TokenMetrics};

#[derive(Debug, Default)]
pub(crate) struct TokenCache {
	token: Mutex<Option<Token>>,
	flight: AsyncMutex<()>,
}
impl TokenCache {
	/// Cached token, if present and not expired.
	pub(crate) fn fresh(&self) -> Option<Token> {
		self.token.lock().as_ref().filter(|token| !token.is_expired()).cloned()
	}

	/// Returns the cached token or runs `refresh` to replace it.
	///
	/// The cache is cleared before `refresh` runs and only repopulated by `Ok(Some(_))`.
	/// Callers queued behind an in-flight refresh re-check the cache once it completes.
	pub(crate) async fn get_or_refresh<F, Fut>(
		&self,
		cancel: &CancelToken,
		metrics: &TokenMetrics,
		refresh: F,
	) -> Result<Option<Token>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Option<Token>>>,
	{
		if let Some(token) = self.fresh() {
			metrics.record_cache_hit();

			return Ok(Some(token));
		}

		let Some(_flight) = cancel.run(self.flight.lock()).await else {
			return Ok(None);
		};

		if let Some(token) = self.fresh() {
			metrics.record_cache_hit();

			return Ok(Some(token));
		}

		self.token.lock().take();

		let outcome = refresh().await;

		match &outcome {
			Ok(Some(token)) => *self.token.lock() = Some(token.clone()),
			Ok(None) => {},
			Err(_) => metrics.record_failure(),
		}

		outcome
	}
}
