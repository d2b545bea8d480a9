//! Signing, key loading and certificate key operations using RustCrypto.

use std::str;

use der::Decode;
use pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::crypto::provider::{CertificateKeys, KeyProvider, SignatureVerifier, SigningKey};
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureScheme};

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

fn digest(hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, String> {
    Ok(match hash {
        HashAlgorithm::SHA1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::SHA256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::SHA384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::SHA512 => Sha512::digest(data).to_vec(),
        _ => return Err(format!("Unsupported signature hash: {:?}", hash)),
    })
}

/// MD5(data) || SHA-1(data), the TLS 1.0/1.1 RSA signature input.
fn md5_sha1(data: &[u8]) -> Vec<u8> {
    let mut out = md5::Md5::digest(data).to_vec();
    out.extend_from_slice(&Sha1::digest(data));
    out
}

fn pkcs1_padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign, String> {
    Ok(match hash {
        HashAlgorithm::SHA1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::SHA256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::SHA384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::SHA512 => Pkcs1v15Sign::new::<Sha512>(),
        _ => return Err(format!("Unsupported PKCS#1 hash: {:?}", hash)),
    })
}

fn pss_padding(hash: HashAlgorithm) -> Result<Pss, String> {
    Ok(match hash {
        HashAlgorithm::SHA256 => Pss::new::<Sha256>(),
        HashAlgorithm::SHA384 => Pss::new::<Sha384>(),
        HashAlgorithm::SHA512 => Pss::new::<Sha512>(),
        _ => return Err(format!("Unsupported PSS hash: {:?}", hash)),
    })
}

/// Private key implementation.
enum RustCryptoSigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl std::fmt::Debug for RustCryptoSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RustCryptoSigningKey::P256(_) => f.debug_tuple("RustCryptoSigningKey::P256").finish(),
            RustCryptoSigningKey::P384(_) => f.debug_tuple("RustCryptoSigningKey::P384").finish(),
            RustCryptoSigningKey::Rsa(_) => f.debug_tuple("RustCryptoSigningKey::Rsa").finish(),
        }
    }
}

impl RustCryptoSigningKey {
    fn sign_ecdsa_prehash(&self, prehash: &[u8]) -> Result<Vec<u8>, String> {
        use p256::ecdsa::signature::hazmat::PrehashSigner;
        match self {
            RustCryptoSigningKey::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            RustCryptoSigningKey::P384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            RustCryptoSigningKey::Rsa(_) => Err("Not an ECDSA key".to_string()),
        }
    }
}

impl SigningKey for RustCryptoSigningKey {
    fn sign(&self, scheme: SignatureScheme, data: &[u8]) -> Result<Vec<u8>, String> {
        let hash = scheme.hash_algorithm();
        let hashed = digest(hash, data)?;
        match (self, scheme.signature_algorithm()) {
            (RustCryptoSigningKey::P256(_) | RustCryptoSigningKey::P384(_), SignatureAlgorithm::ECDSA) => {
                self.sign_ecdsa_prehash(&hashed)
            }
            (RustCryptoSigningKey::Rsa(key), SignatureAlgorithm::RSA) => key
                .sign(pkcs1_padding(hash)?, &hashed)
                .map_err(|e| format!("RSA signing failed: {e}")),
            (RustCryptoSigningKey::Rsa(key), SignatureAlgorithm::RSA_PSS) => key
                .sign_with_rng(&mut OsRng, pss_padding(hash)?, &hashed)
                .map_err(|e| format!("RSA-PSS signing failed: {e}")),
            _ => Err(format!("Key cannot sign with {:?}", scheme)),
        }
    }

    fn sign_legacy(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            RustCryptoSigningKey::Rsa(key) => key
                .sign(Pkcs1v15Sign::new_unprefixed(), &md5_sha1(data))
                .map_err(|e| format!("RSA signing failed: {e}")),
            _ => self.sign_ecdsa_prehash(&Sha1::digest(data)),
        }
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            RustCryptoSigningKey::Rsa(_) => SignatureAlgorithm::RSA,
            _ => SignatureAlgorithm::ECDSA,
        }
    }

    fn schemes(&self) -> &'static [SignatureScheme] {
        match self {
            RustCryptoSigningKey::P256(_) => &[
                SignatureScheme::ECDSA_SECP256R1_SHA256,
                SignatureScheme::ECDSA_SHA1,
            ],
            RustCryptoSigningKey::P384(_) => &[
                SignatureScheme::ECDSA_SECP384R1_SHA384,
                SignatureScheme::ECDSA_SHA1,
            ],
            RustCryptoSigningKey::Rsa(_) => &[
                SignatureScheme::RSA_PSS_RSAE_SHA256,
                SignatureScheme::RSA_PSS_RSAE_SHA384,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA1,
            ],
        }
    }

    fn decrypt_pkcs1(&self, ciphertext: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            RustCryptoSigningKey::Rsa(key) => key
                .decrypt(Pkcs1v15Encrypt, ciphertext)
                .map_err(|_| "RSA decryption failed".to_string()),
            _ => Err("Not an RSA key".to_string()),
        }
    }

    fn agree(&self, peer_public: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            RustCryptoSigningKey::P256(key) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = p256::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
            RustCryptoSigningKey::P384(key) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = p384::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
            RustCryptoSigningKey::Rsa(_) => Err("Not an EC key".to_string()),
        }
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        // Try PKCS#8 DER format first (most common)
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::P256(key)));
        }
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::P384(key)));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::Rsa(Box::new(key))));
        }

        // SEC1 (OpenSSL EC private key format) and PKCS#1 (OpenSSL RSA format)
        if let Ok(key) = p256::SecretKey::from_sec1_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::P256(key.into())));
        }
        if let Ok(key) = p384::SecretKey::from_sec1_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::P384(key.into())));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(RustCryptoSigningKey::Rsa(Box::new(key))));
        }

        // Check if it's a PEM encoded key
        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// Public key of a certificate.
enum CertKey {
    Rsa(RsaPublicKey),
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

fn cert_key(cert_der: &[u8]) -> Result<CertKey, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {e}"))?;
    let spki = &cert.tbs_certificate.subject_public_key_info;
    let key_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?;

    if spki.algorithm.oid == OID_RSA_ENCRYPTION {
        let key = RsaPublicKey::from_pkcs1_der(key_bytes)
            .map_err(|_| "Invalid RSA public key".to_string())?;
        return Ok(CertKey::Rsa(key));
    }

    if spki.algorithm.oid != OID_EC_PUBLIC_KEY {
        return Err(format!("Unsupported public key algorithm: {}", spki.algorithm.oid));
    }

    let curve_oid: ObjectIdentifier = spki
        .algorithm
        .parameters
        .as_ref()
        .ok_or("Missing EC curve parameter in certificate")?
        .decode_as()
        .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;

    match curve_oid {
        OID_P256 => p256::PublicKey::from_sec1_bytes(key_bytes)
            .map(CertKey::P256)
            .map_err(|_| "Invalid P-256 public key".to_string()),
        OID_P384 => p384::PublicKey::from_sec1_bytes(key_bytes)
            .map(CertKey::P384)
            .map_err(|_| "Invalid P-384 public key".to_string()),
        _ => Err(format!("Unsupported EC curve: {}", curve_oid)),
    }
}

fn verify_ecdsa_prehash(key: &CertKey, prehash: &[u8], signature: &[u8]) -> Result<(), String> {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    match key {
        CertKey::P256(pk) => {
            let sig = p256::ecdsa::Signature::from_der(signature)
                .map_err(|_| "Invalid signature format".to_string())?;
            p256::ecdsa::VerifyingKey::from(pk)
                .verify_prehash(prehash, &sig)
                .map_err(|_| "ECDSA signature verification failed".to_string())
        }
        CertKey::P384(pk) => {
            let sig = p384::ecdsa::Signature::from_der(signature)
                .map_err(|_| "Invalid signature format".to_string())?;
            p384::ecdsa::VerifyingKey::from(pk)
                .verify_prehash(prehash, &sig)
                .map_err(|_| "ECDSA signature verification failed".to_string())
        }
        CertKey::Rsa(_) => Err("Not an ECDSA key".to_string()),
    }
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        scheme: SignatureScheme,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let key = cert_key(cert_der)?;
        let hash = scheme.hash_algorithm();
        let hashed = digest(hash, data)?;

        match (&key, scheme.signature_algorithm()) {
            (CertKey::P256(_), SignatureAlgorithm::ECDSA)
                if scheme != SignatureScheme::ECDSA_SECP384R1_SHA384 =>
            {
                verify_ecdsa_prehash(&key, &hashed, signature)
            }
            (CertKey::P384(_), SignatureAlgorithm::ECDSA)
                if scheme != SignatureScheme::ECDSA_SECP256R1_SHA256 =>
            {
                verify_ecdsa_prehash(&key, &hashed, signature)
            }
            (CertKey::Rsa(pk), SignatureAlgorithm::RSA) => pk
                .verify(pkcs1_padding(hash)?, &hashed, signature)
                .map_err(|_| "RSA signature verification failed".to_string()),
            (CertKey::Rsa(pk), SignatureAlgorithm::RSA_PSS) => pk
                .verify(pss_padding(hash)?, &hashed, signature)
                .map_err(|_| "RSA-PSS signature verification failed".to_string()),
            _ => Err(format!("Scheme {:?} does not match certificate key", scheme)),
        }
    }

    fn verify_legacy(&self, cert_der: &[u8], data: &[u8], signature: &[u8]) -> Result<(), String> {
        let key = cert_key(cert_der)?;
        match &key {
            CertKey::Rsa(pk) => pk
                .verify(Pkcs1v15Sign::new_unprefixed(), &md5_sha1(data), signature)
                .map_err(|_| "RSA signature verification failed".to_string()),
            _ => verify_ecdsa_prehash(&key, &Sha1::digest(data), signature),
        }
    }

    fn key_algorithm(&self, cert_der: &[u8]) -> Result<SignatureAlgorithm, String> {
        Ok(match cert_key(cert_der)? {
            CertKey::Rsa(_) => SignatureAlgorithm::RSA,
            _ => SignatureAlgorithm::ECDSA,
        })
    }
}

/// Certificate key operations implementation.
#[derive(Debug)]
pub(super) struct RustCryptoCertificateKeys;

impl CertificateKeys for RustCryptoCertificateKeys {
    fn encrypt_pkcs1(&self, cert_der: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, String> {
        match cert_key(cert_der)? {
            CertKey::Rsa(pk) => pk
                .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
                .map_err(|e| format!("RSA encryption failed: {e}")),
            _ => Err("Certificate key is not RSA".to_string()),
        }
    }

    fn encrypt_pkcs1_raw(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String> {
        let n = rsa::BigUint::from_bytes_be(modulus);
        let e = rsa::BigUint::from_bytes_be(exponent);
        let pk = RsaPublicKey::new(n, e).map_err(|e| format!("Invalid RSA key: {e}"))?;
        pk.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| format!("RSA encryption failed: {e}"))
    }

    fn ec_public_key(&self, cert_der: &[u8]) -> Result<(NamedGroup, Vec<u8>), String> {
        match cert_key(cert_der)? {
            CertKey::P256(pk) => Ok((NamedGroup::Secp256r1, pk.to_sec1_bytes().to_vec())),
            CertKey::P384(pk) => Ok((NamedGroup::Secp384r1, pk.to_sec1_bytes().to_vec())),
            CertKey::Rsa(_) => Err("Certificate key is not EC".to_string()),
        }
    }

    fn agree_ephemeral(&self, cert_der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
        match cert_key(cert_der)? {
            CertKey::P256(pk) => {
                let secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
                let public = p256::PublicKey::from(&secret).to_sec1_bytes().to_vec();
                let shared = secret.diffie_hellman(&pk);
                Ok((public, shared.raw_secret_bytes().to_vec()))
            }
            CertKey::P384(pk) => {
                let secret = p384::ecdh::EphemeralSecret::random(&mut OsRng);
                let public = p384::PublicKey::from(&secret).to_sec1_bytes().to_vec();
                let shared = secret.diffie_hellman(&pk);
                Ok((public, shared.raw_secret_bytes().to_vec()))
            }
            CertKey::Rsa(_) => Err("Certificate key is not EC".to_string()),
        }
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;

/// Static instance of the certificate key operations.
pub(super) static CERTIFICATE_KEYS: RustCryptoCertificateKeys = RustCryptoCertificateKeys;
