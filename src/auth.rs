//! Credential, token, and credential-encryption models.

pub mod crypto;
pub mod request;
pub mod secret;
pub mod token;

pub use crypto::*;
pub use request::*;
pub use secret::*;
pub use token::*;
