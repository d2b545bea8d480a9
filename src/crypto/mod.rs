//! Cryptographic primitives and the key derivations built on them.
//!
//! The primitives themselves (digests, HMAC, ciphers, signatures, key
//! agreement) are consumed through the [`provider`] traits. Everything in this
//! module above those traits is protocol logic: the TLS PRFs, HKDF and the
//! TLS 1.3 key schedule, the transcript, the record MAC and record protection.

pub mod provider;

pub mod rust_crypto;

pub mod cipher;
pub mod dh;
pub mod finished;
pub mod hash;
pub mod hkdf;
pub mod initializer;
pub mod key_schedule;
pub mod mac;
pub mod prf;

pub use cipher::{Protected, RecordCipher};
pub use hash::Transcript;
pub use key_schedule::KeySchedule;
pub use mac::ExchangeMac;

pub use provider::{ActiveKeyExchange, AeadCipher, BlockCipher, CertificateKeys};
pub use provider::{CipherProvider, CryptoProvider, CryptoSafe, HashContext, HashProvider};
pub use provider::{HmacProvider, KeyProvider, SecureRandom, SignatureVerifier, SigningKey};
pub use provider::SupportedKxGroup;

// Re-export shared types for provider implementations
pub use crate::types::{BulkCipher, HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureScheme};
