//! Certificate checks and test certificate generation.
//!
//! Chain validation is a seam: the engine hands every received chain to the
//! configured [`CertificateValidator`]. The default [`KeyAlgorithmValidator`]
//! only checks that the leaf parses and carries a key the negotiated suite can
//! use. Path building and trust anchors are left to a validator the user plugs in.

use der::Decode;
use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256, PKCS_RSA_SHA256,
};
use sha2::{Digest, Sha256};
use spki::ObjectIdentifier;
use std::fmt;
use x509_cert::Certificate as X509Certificate;

use crate::context::Source;
use crate::types::{AlertDescription, SignatureAlgorithm};
use crate::Error;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Decides whether a received certificate chain is acceptable.
pub trait CertificateValidator: Send + Sync {
    /// Check `chain` (DER, leaf first) from `source`.
    ///
    /// `expected` is the key algorithm the negotiated suite signs or encrypts
    /// with, when it dictates one. Returns the leaf certificate.
    fn validate_chain(
        &self,
        chain: &[Vec<u8>],
        source: Source,
        expected: Option<SignatureAlgorithm>,
    ) -> Result<Vec<u8>, Error>;
}

/// Accepts any well formed leaf whose key fits the suite.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyAlgorithmValidator;

impl CertificateValidator for KeyAlgorithmValidator {
    fn validate_chain(
        &self,
        chain: &[Vec<u8>],
        source: Source,
        expected: Option<SignatureAlgorithm>,
    ) -> Result<Vec<u8>, Error> {
        let Some(leaf) = chain.first() else {
            return Err(Error::fatal(AlertDescription::BadCertificate));
        };

        let algorithm = leaf_key_algorithm(leaf).ok_or_else(|| {
            debug!("Unparseable {:?} certificate", source);
            Error::fatal(AlertDescription::BadCertificate)
        })?;

        if let Some(expected) = expected {
            if algorithm != expected {
                debug!("Certificate key {:?}, suite needs {:?}", algorithm, expected);
                return Err(Error::fatal(AlertDescription::UnsupportedCertificate));
            }
        }

        trace!("Accepted {:?} certificate, {} in chain", source, chain.len());
        Ok(leaf.clone())
    }
}

/// Key algorithm of a DER certificate, if it is one we know.
pub fn leaf_key_algorithm(cert_der: &[u8]) -> Option<SignatureAlgorithm> {
    let cert = X509Certificate::from_der(cert_der).ok()?;
    let oid = cert.tbs_certificate.subject_public_key_info.algorithm.oid;
    if oid == OID_RSA_ENCRYPTION {
        Some(SignatureAlgorithm::RSA)
    } else if oid == OID_EC_PUBLIC_KEY {
        Some(SignatureAlgorithm::ECDSA)
    } else {
        None
    }
}

/// Certificate generation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailed;

impl fmt::Display for GenerationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Certificate generation failed")
    }
}

impl std::error::Error for GenerationFailed {}

/// Certificate and private key pair
#[derive(Clone)]
pub struct SelfSigned {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// Private key in PKCS#8 DER format
    pub private_key: Vec<u8>,
}

/// Generate a self-signed ECDSA P-256 certificate for "localhost".
pub fn generate_self_signed_certificate() -> Result<SelfSigned, GenerationFailed> {
    generate_self_signed_certificate_for("localhost")
}

/// Generate a self-signed ECDSA P-256 certificate for `name`.
pub fn generate_self_signed_certificate_for(name: &str) -> Result<SelfSigned, GenerationFailed> {
    generate(name, &PKCS_ECDSA_P256_SHA256)
}

/// Generate a self-signed RSA certificate for `name`.
///
/// rcgen cannot create RSA keys, so the caller provides one (PKCS#8 DER).
pub fn generate_self_signed_rsa_certificate(
    name: &str,
    private_key_der: &[u8],
) -> Result<SelfSigned, GenerationFailed> {
    let key_pair = KeyPair::from_der(private_key_der).map_err(|_| GenerationFailed)?;
    build(name, key_pair, &PKCS_RSA_SHA256)
}

fn generate(
    name: &str,
    alg: &'static rcgen::SignatureAlgorithm,
) -> Result<SelfSigned, GenerationFailed> {
    let key_pair = KeyPair::generate(alg).map_err(|_| GenerationFailed)?;
    build(name, key_pair, alg)
}

fn build(
    name: &str,
    key_pair: KeyPair,
    alg: &'static rcgen::SignatureAlgorithm,
) -> Result<SelfSigned, GenerationFailed> {
    let mut params = CertificateParams::new(vec![name.to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, name.to_string());
    params.distinguished_name = distinguished_name;
    params.is_ca = IsCa::NoCa;
    params.alg = alg;
    params.key_pair = Some(key_pair);

    let not_before = time::OffsetDateTime::now_utc();
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(365);

    let cert = RcgenCertificate::from_params(params).map_err(|_| GenerationFailed)?;
    let certificate = cert.serialize_der().map_err(|_| GenerationFailed)?;
    let private_key = cert.serialize_private_key_der();

    Ok(SelfSigned {
        certificate,
        private_key,
    })
}

/// SHA-256 fingerprint of a DER certificate as "AF:12:F6:..."
pub fn fingerprint(cert_der: &[u8]) -> String {
    Sha256::digest(cert_der)
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

impl fmt::Debug for SelfSigned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfSigned")
            .field("certificate", &self.certificate.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_is_ecdsa() {
        let cert = generate_self_signed_certificate().unwrap();
        assert!(!cert.private_key.is_empty());
        assert_eq!(
            leaf_key_algorithm(&cert.certificate),
            Some(SignatureAlgorithm::ECDSA)
        );
    }

    #[test]
    fn validator_checks_key_algorithm() {
        let cert = generate_self_signed_certificate().unwrap();
        let chain = vec![cert.certificate.clone()];
        let v = KeyAlgorithmValidator;

        let leaf = v
            .validate_chain(&chain, Source::Remote, Some(SignatureAlgorithm::ECDSA))
            .unwrap();
        assert_eq!(leaf, cert.certificate);
        assert!(v.validate_chain(&chain, Source::Remote, None).is_ok());

        let err = v
            .validate_chain(&chain, Source::Remote, Some(SignatureAlgorithm::RSA))
            .unwrap_err();
        assert_eq!(
            err.description(),
            Some(AlertDescription::UnsupportedCertificate)
        );
    }

    #[test]
    fn validator_rejects_garbage_and_empty() {
        let v = KeyAlgorithmValidator;
        let err = v.validate_chain(&[], Source::Remote, None).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::BadCertificate));

        let err = v
            .validate_chain(&[vec![0x30, 0x03, 1, 2, 3]], Source::Remote, None)
            .unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::BadCertificate));
    }

    #[test]
    fn fingerprint_format() {
        let f = fingerprint(b"certificate");
        assert_eq!(f.len(), 95);
        for segment in f.split(':') {
            assert!(u8::from_str_radix(segment, 16).is_ok());
        }
    }
}
