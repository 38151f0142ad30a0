//! Account identity: public keys, signatures, and the in-memory keypair.
//!
//! # Security
//! - The secret half is generated from the OS entropy source and lives only in memory
//! - `Keypair` is neither `Clone` nor `Serialize`; share it behind an `Arc`
//! - `Debug` output never includes secret bytes

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a public key or blockhash in bytes.
pub const PUBKEY_BYTES: usize = 32;

/// Length of an ed25519 signature in bytes.
pub const SIGNATURE_BYTES: usize = 64;

/// Errors raised while creating or decoding key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The OS entropy source could not provide key material.
    #[error("identity generation failed: {0}")]
    IdentityGenerationFailure(String),

    #[error("invalid public key '{input}': {reason}")]
    InvalidPublicKey { input: String, reason: String },

    #[error("invalid hash '{input}': {reason}")]
    InvalidHash { input: String, reason: String },

    #[error("invalid signature '{input}': {reason}")]
    InvalidSignature { input: String, reason: String },
}

/// Implements base58 `Display`/`FromStr` and string serde for a fixed-size byte newtype.
macro_rules! base58_newtype {
    ($name:ident, $len:expr, $err:ident) => {
        impl $name {
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = KeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let invalid = |reason: String| KeyError::$err {
                    input: s.to_string(),
                    reason,
                };
                let decoded = bs58::decode(s)
                    .into_vec()
                    .map_err(|e| invalid(e.to_string()))?;
                let bytes: [u8; $len] = decoded.try_into().map_err(|v: Vec<u8>| {
                    invalid(format!("expected {} bytes, got {}", $len, v.len()))
                })?;
                Ok(Self(bytes))
            }
        }

        impl TryFrom<String> for $name {
            type Error = KeyError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

/// Public identity of an account (ed25519 public key).
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey([u8; PUBKEY_BYTES]);

base58_newtype!(Pubkey, PUBKEY_BYTES, InvalidPublicKey);

impl Pubkey {
    /// Check an ed25519 signature over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig).is_ok()
    }
}

/// 32-byte ledger hash (used for blockhashes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash([u8; PUBKEY_BYTES]);

base58_newtype!(Hash, PUBKEY_BYTES, InvalidHash);

/// Ed25519 signature; the first signature of a transaction doubles as its id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature([u8; SIGNATURE_BYTES]);

base58_newtype!(Signature, SIGNATURE_BYTES, InvalidSignature);

/// In-memory account keypair. Created once, never persisted.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS entropy source.
    ///
    /// Fails only when the entropy source is unavailable; callers treat that as fatal.
    pub fn generate() -> Result<Self, KeyError> {
        let mut secret = [0u8; ed25519_dalek::SECRET_KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| KeyError::IdentityGenerationFailure(e.to_string()))?;

        let keypair = Self::from_secret_bytes(&secret);
        tracing::debug!(pubkey = %keypair.pubkey(), "Generated account keypair");
        Ok(keypair)
    }

    /// Rebuild a keypair from its 32-byte secret seed.
    pub fn from_secret_bytes(secret: &[u8; ed25519_dalek::SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// The public identity derived from the secret.
    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign raw message bytes.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
