//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The protocol core never computes a digest, a cipher block or a signature
//! itself. It consumes these through the trait objects bundled in a
//! [`CryptoProvider`], one component per capability:
//!
//! - **Hash Provider** ([`HashProvider`]): running digests (MD5, SHA-1, SHA-2 family)
//! - **HMAC Provider** ([`HmacProvider`]): one-shot HMAC over multiple input parts
//! - **Cipher Provider** ([`CipherProvider`]): AEAD and CBC block transforms
//! - **Key Exchange Groups** ([`SupportedKxGroup`]): ephemeral (EC)DH key pairs
//! - **Signature Verification** ([`SignatureVerifier`]): verify with a certificate key
//! - **Certificate Keys** ([`CertificateKeys`]): encrypt to / agree with a certificate key
//! - **Key Provider** ([`KeyProvider`]): load private keys into [`SigningKey`]
//! - **Secure Random** ([`SecureRandom`]): cryptographically secure RNG
//!
//! A pure Rust implementation is available through
//! [`rust_crypto::default_provider()`](crate::crypto::rust_crypto::default_provider).
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use crate::types::{BulkCipher, HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureScheme};

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize the clone.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self) -> Vec<u8>;

    fn algorithm(&self) -> HashAlgorithm;
}

/// AEAD cipher for in-place encryption/decryption.
pub trait AeadCipher: CryptoSafe {
    /// Encrypt `buf` in place, appending the authentication tag.
    fn seal(&self, nonce: &[u8], aad: &[u8], buf: &mut Vec<u8>) -> Result<(), String>;

    /// Verify and decrypt `buf` in place, removing the authentication tag.
    fn open(&self, nonce: &[u8], aad: &[u8], buf: &mut Vec<u8>) -> Result<(), String>;
}

/// CBC mode block cipher. Chaining state between records is kept by the caller.
pub trait BlockCipher: CryptoSafe {
    fn block_len(&self) -> usize;

    /// Encrypt `data` (a multiple of the block length) in place.
    fn encrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;

    /// Decrypt `data` (a multiple of the block length) in place.
    fn decrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;
}

/// Private key held by the local endpoint.
pub trait SigningKey: CryptoSafe {
    /// Sign `data` with an explicit signature scheme (TLS 1.2, TLS 1.3).
    fn sign(&self, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Sign `data` the TLS 1.0/1.1 way: RSA over MD5||SHA-1 without a
    /// DigestInfo prefix, ECDSA over SHA-1.
    fn sign_legacy(&self, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Signature primitive of this key.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Schemes this key can produce, most preferred first.
    fn schemes(&self) -> &'static [SignatureScheme];

    /// RSA PKCS#1 v1.5 decryption, used by the RSA key exchange.
    fn decrypt_pkcs1(&self, _ciphertext: &[u8]) -> Result<Vec<u8>, String> {
        Err("Key does not support decryption".to_string())
    }

    /// ECDH with the static key, used by the fixed ECDH key exchange.
    fn agree(&self, _peer_public: &[u8]) -> Result<Vec<u8>, String> {
        Err("Key does not support key agreement".to_string())
    }
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Get the public key for this exchange.
    fn pub_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning the shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String>;

    /// Get the named group for this exchange.
    fn group(&self) -> NamedGroup;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// HMAC(key, parts[0] || parts[1] || ...).
    fn hmac(&self, hash: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, String>;
}

/// Record cipher primitives (factory for AEAD and block ciphers).
pub trait CipherProvider: CryptoSafe {
    /// Whether the provider can build this bulk cipher.
    fn supports(&self, cipher: BulkCipher) -> bool;

    fn create_aead(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn AeadCipher>, String>;

    fn create_block(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn BlockCipher>, String>;
}

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a signature made with `scheme` using a DER-encoded X.509 certificate.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        scheme: SignatureScheme,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), String>;

    /// Verify a TLS 1.0/1.1 signature (see [`SigningKey::sign_legacy`]).
    fn verify_legacy(&self, cert_der: &[u8], data: &[u8], signature: &[u8]) -> Result<(), String>;

    /// Signature primitive of the certificate's public key.
    fn key_algorithm(&self, cert_der: &[u8]) -> Result<SignatureAlgorithm, String>;
}

/// Operations with the public key of a peer certificate other than verification.
pub trait CertificateKeys: CryptoSafe {
    /// RSA PKCS#1 v1.5 encryption to the certificate key.
    fn encrypt_pkcs1(&self, cert_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, String>;

    /// RSA PKCS#1 v1.5 encryption to a bare public key, used for the
    /// temporary keys of the export suites.
    fn encrypt_pkcs1_raw(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String>;

    /// Group and encoded point of an EC certificate key.
    fn ec_public_key(&self, cert_der: &[u8]) -> Result<(NamedGroup, Vec<u8>), String>;

    /// ECDH between a fresh ephemeral key and the certificate key.
    /// Returns (ephemeral public key, shared secret).
    fn agree_ephemeral(&self, cert_der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String>;
}

/// Private key parser (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for TLS operations.
///
/// Holds static references to every component. Users can swap any
/// component for their own implementation.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported key exchange groups, in preference order.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for certificates.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Encryption and key agreement with certificate keys.
    pub certificate_keys: &'static dyn CertificateKeys,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for the transcript, the PRF and the SSL 3.0 MAC.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for the PRF, HKDF and the record MAC.
    pub hmac_provider: &'static dyn HmacProvider,

    /// Record cipher primitives.
    pub cipher_provider: &'static dyn CipherProvider,
}

impl CryptoProvider {
    /// Find the key exchange group implementation for `group`.
    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == group)
    }

    /// One-shot digest.
    pub fn digest(&self, hash: HashAlgorithm, parts: &[&[u8]]) -> Result<Vec<u8>, String> {
        let mut ctx = self.hash_provider.create_hash(hash)?;
        for p in parts {
            ctx.update(p);
        }
        Ok(ctx.clone_and_finalize())
    }

    /// Random bytes.
    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, String> {
        let mut v = vec![0; len];
        self.secure_random.fill(&mut v)?;
        Ok(v)
    }
}
