//! Token providers: cached username/password tokens, federated exchanges, and app logins.
//!
//! Every provider owns one cached [`Token`] for one credential set against one root URL.
//! Cache misses are serialized per provider, so concurrent callers share a single
//! authentication round trip instead of racing each other.

pub mod app_login;
pub mod federated;
pub mod server;

mod cache;
mod metrics;

pub use app_login::*;
pub use federated::*;
pub use metrics::TokenMetrics;
pub use server::*;

// self
use crate::{_prelude::*, auth::Token, cancel::CancelToken, endpoint::RootUrl};

/// Boxed future returned by [`TokenProvider::check_generate_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Token>>> + 'a + Send>>;

/// Capability injected into a [`Gateway`](crate::gateway::Gateway) to authorize requests.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Root URL the issued tokens are valid for.
	fn root_url(&self) -> &RootUrl;

	/// Returns a valid token, acquiring a fresh one when the cache is empty or expired.
	///
	/// Resolves to `Ok(None)` when no credentials are configured (anonymous access) or when
	/// `cancel` fires before a token is obtained.
	fn check_generate_token<'a>(&'a self, cancel: &'a CancelToken) -> TokenFuture<'a>;
}
