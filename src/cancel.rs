//! Cooperative cancellation shared by providers and the gateway.
//!
//! Cancellation is a normal outcome, not a failure: cancellable calls resolve to
//! `Ok(None)` and never cache partial results.

// crates.io
use tokio::sync::watch;
// self
use crate::_prelude::*;

/// Cloneable cancellation signal passed into every provider and gateway call.
///
/// All clones observe the same signal. [`CancelToken::default`] creates a fresh signal
/// that only fires if [`cancel`](CancelToken::cancel) is called on it or one of its clones.
#[derive(Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);
impl CancelToken {
	/// Creates a new, not-yet-cancelled signal.
	pub fn new() -> Self {
		let (tx, _) = watch::channel(false);

		Self(Arc::new(tx))
	}

	/// Fires the signal; in-flight and future calls observing it resolve to `None`.
	pub fn cancel(&self) {
		self.0.send_replace(true);
	}

	/// Returns `true` once [`cancel`](Self::cancel) has been called.
	pub fn is_cancelled(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the signal fires.
	pub async fn cancelled(&self) {
		let mut rx = self.0.subscribe();

		loop {
			let fired = *rx.borrow_and_update();

			if fired {
				return;
			}
			if rx.changed().await.is_err() {
				// The sender lives inside `self`, so this branch only guards against misuse.
				std::future::pending::<()>().await;
			}
		}
	}

	/// Drives `fut` to completion unless the signal fires first.
	pub async fn run<F>(&self, fut: F) -> Option<F::Output>
	where
		F: Future,
	{
		if self.is_cancelled() {
			return None;
		}

		tokio::select! {
			biased;
			_ = self.cancelled() => None,
			output = fut => Some(output),
		}
	}
}
impl Default for CancelToken {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for CancelToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("CancelToken").field(&self.is_cancelled()).finish()
	}
}
