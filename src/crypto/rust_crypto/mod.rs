//! RustCrypto cryptographic provider implementation for timpl.
//!
//! This module provides a pure Rust cryptographic backend using crates from
//! the [RustCrypto](https://github.com/RustCrypto) organization, plus
//! `x25519-dalek` for X25519 and `num-bigint` for the finite field group.
//!
//! # Usage
//!
//! ```
//! use timpl::crypto::rust_crypto;
//! use timpl::Config;
//!
//! let config = Config::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

mod cipher;
mod hash;
mod hmac;
mod kx_group;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Record Ciphers
///
/// - AES-128/256 in GCM and CBC mode
/// - ChaCha20-Poly1305
/// - DES-CBC (also for the 40-bit export suites)
///
/// # Key Exchange Groups
///
/// - `x25519`
/// - `secp256r1` (P-256, NIST Curve)
/// - `secp384r1` (P-384, NIST Curve)
/// - `ffdhe2048` (RFC 7919)
///
/// # Signatures
///
/// - ECDSA with P-256 and P-384
/// - RSA PKCS#1 v1.5 and RSA-PSS
/// - The TLS 1.0/1.1 MD5||SHA-1 RSA form
///
/// # Key Formats
///
/// The key provider supports loading private keys in:
/// - PKCS#8 DER format (most common)
/// - SEC1 DER format (OpenSSL EC private key format)
/// - PKCS#1 DER format (OpenSSL RSA private key format)
/// - PEM encoded versions of the above
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        certificate_keys: &sign::CERTIFICATE_KEYS,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        cipher_provider: &cipher::CIPHER_PROVIDER,
    }
}
