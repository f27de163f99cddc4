//! RSA encryption of credential forms using a server-supplied public key.

// std
use std::fmt::Write as _;
// crates.io
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey, rand_core::OsRng};
// self
use crate::{_prelude::*, auth::CredentialForm};

/// Credential encryption failures.
#[derive(Debug, ThisError)]
pub enum CryptoError {
	/// Public key component is not valid hexadecimal.
	#[error("Public key {component} is not valid hex.")]
	InvalidHex {
		/// Which component failed (`exponent` or `modulus`).
		component: &'static str,
	},
	/// Exponent/modulus do not form a usable RSA key.
	#[error("Public key is not a valid RSA key.")]
	InvalidKey(#[source] rsa::Error),
	/// Encryption of a credential field failed.
	#[error("Credential field `{field}` could not be encrypted.")]
	Encrypt {
		/// Field being encrypted.
		field: &'static str,
		/// Underlying RSA failure.
		#[source]
		source: rsa::Error,
	},
}

/// Public key payload returned by the server (`{publicKey, modulus}`), hex encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
	/// Public exponent, hex encoded.
	#[serde(rename = "publicKey")]
	pub exponent_hex: String,
	/// Modulus, hex encoded.
	#[serde(rename = "modulus")]
	pub modulus_hex: String,
}
impl PublicKey {
	/// Decodes the exponent into big-endian bytes.
	pub fn exponent(&self) -> Result<Vec<u8>, CryptoError> {
		decode_hex(&self.exponent_hex, "exponent")
	}

	/// Decodes the modulus into big-endian bytes.
	pub fn modulus(&self) -> Result<Vec<u8>, CryptoError> {
		decode_hex(&self.modulus_hex, "modulus")
	}
}

/// Transforms plaintext credential forms into encrypted ones.
pub trait CredentialEncryptor
where
	Self: Send + Sync,
{
	/// Encrypts `form` with the RSA key given as big-endian `exponent` and `modulus` bytes.
	fn encrypt(
		&self,
		form: &CredentialForm,
		exponent: &[u8],
		modulus: &[u8],
	) -> Result<CredentialForm, CryptoError>;
}

/// PKCS#1 v1.5 encryptor backed by the `rsa` crate.
///
/// Encrypts `username`, `password`, `client`, and `expiration` into lowercase hex and marks
/// the form `encrypted=true`. `referer` stays in plaintext.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsaCredentialEncryptor;
impl CredentialEncryptor for RsaCredentialEncryptor {
	fn encrypt(
		&self,
		form: &CredentialForm,
		exponent: &[u8],
		modulus: &[u8],
	) -> Result<CredentialForm, CryptoError> {
		let key =
			RsaPublicKey::new(BigUint::from_bytes_be(modulus), BigUint::from_bytes_be(exponent))
				.map_err(CryptoError::InvalidKey)?;
		let seal = |field: &'static str, plain: &str| -> Result<String, CryptoError> {
			key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plain.as_bytes())
				.map(|cipher| encode_hex(&cipher))
				.map_err(|source| CryptoError::Encrypt { field, source })
		};
		let client = form.client.as_deref().map(|client| seal("client", client)).transpose()?;

		Ok(CredentialForm {
			username: seal("username", &form.username)?,
			password: seal("password", &form.password)?,
			client,
			referer: form.referer.clone(),
			ip: form.ip.clone(),
			expiration: seal("expiration", &form.expiration)?,
			f: form.f.clone(),
			encrypted: Some("true".into()),
		})
	}
}

fn decode_hex(hex: &str, component: &'static str) -> Result<Vec<u8>, CryptoError> {
	let hex = hex.trim();

	if hex.is_empty() {
		return Err(CryptoError::InvalidHex { component });
	}

	BigUint::parse_bytes(hex.as_bytes(), 16)
		.map(|value| value.to_bytes_be())
		.ok_or(CryptoError::InvalidHex { component })
}

fn encode_hex(bytes: &[u8]) -> String {
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
		let _ = write!(out, "{byte:02x}");

		out
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use rsa::{RsaPrivateKey, traits::PublicKeyParts};
	// self
	use super::*;
	use crate::auth::GenerateTokenRequest;

	fn decode(hex: &str) -> Vec<u8> {
		(0..hex.len())
			.step_by(2)
			.map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Ciphertext should be hex."))
			.collect()
	}

	#[test]
	fn public_key_decodes_hex_components() {
		let key = PublicKey { exponent_hex: "010001".into(), modulus_hex: "00ff".into() };

		assert_eq!(key.exponent().ok(), Some(vec![1, 0, 1]));
		assert_eq!(key.modulus().ok(), Some(vec![255]));
		assert!(matches!(
			PublicKey { exponent_hex: "zz".into(), modulus_hex: "".into() }.exponent(),
			Err(CryptoError::InvalidHex { component: "exponent" })
		));
		assert!(matches!(
			PublicKey { exponent_hex: "01".into(), modulus_hex: " ".into() }.modulus(),
			Err(CryptoError::InvalidHex { component: "modulus" })
		));
	}

	#[test]
	fn encrypted_fields_decrypt_with_private_key() {
		let private = RsaPrivateKey::new(&mut OsRng, 512).expect("Key generation should succeed.");
		let public = private.to_public_key();
		let form = GenerateTokenRequest::new("alice", "pw")
			.with_referer("https://app.example.com")
			.expect("Referer should be accepted.")
			.to_form();
		let encrypted = RsaCredentialEncryptor
			.encrypt(&form, &public.e().to_bytes_be(), &public.n().to_bytes_be())
			.expect("Encryption should succeed.");

		assert!(encrypted.is_encrypted());
		assert_eq!(encrypted.referer.as_deref(), Some("https://app.example.com"));
		assert!(encrypted.username.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));

		let open = |hex: &str| {
			String::from_utf8(
				private.decrypt(Pkcs1v15Encrypt, &decode(hex)).expect("Decryption should succeed."),
			)
			.expect("Plaintext should be UTF-8.")
		};

		assert_eq!(open(&encrypted.username), "alice");
		assert_eq!(open(&encrypted.password), "pw");
		assert_eq!(open(encrypted.client.as_deref().unwrap_or_default()), "referer");
		assert_eq!(open(&encrypted.expiration), "60");
	}

	#[test]
	fn degenerate_keys_are_rejected() {
		let form = GenerateTokenRequest::new("a", "b").to_form();
		let err = RsaCredentialEncryptor
			.encrypt(&form, &[1, 0, 1], &[0x0f])
			.expect_err("Tiny moduli should fail.");

		assert!(matches!(err, CryptoError::InvalidKey(_) | CryptoError::Encrypt { .. }));
	}
}
