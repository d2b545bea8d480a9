use std::sync::Arc;

use crate::certificate::{CertificateValidator, KeyAlgorithmValidator};
use crate::crypto::rust_crypto;
use crate::crypto::CryptoProvider;
use crate::extension::{ConfiguredExtension, ExtensionType, ModelExtension};
use crate::extension::{Extension, MaxFragmentLength};
use crate::key_exchange::{srp, SrpGroup};
use crate::secret::Secret;
use crate::types::{CipherSuite, NamedGroup, SignatureScheme, TlsVersion};
use crate::Error;

/// Largest record plaintext, 2^14.
pub const MAX_FRAGMENT: usize = 16384;

/// Pre-shared key of the PSK key exchange.
#[derive(Debug, Clone)]
pub struct PskCredentials {
    pub identity: Vec<u8>,
    pub key: Arc<Secret>,
    /// Server only. Sent in the ServerKeyExchange.
    pub hint: Option<Vec<u8>>,
}

impl PskCredentials {
    pub fn new(identity: impl Into<Vec<u8>>, key: &[u8]) -> Self {
        PskCredentials {
            identity: identity.into(),
            key: Arc::new(Secret::from_slice(key)),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<Vec<u8>>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Client credentials of the SRP key exchange.
#[derive(Debug, Clone)]
pub struct SrpCredentials {
    pub username: Vec<u8>,
    pub password: Vec<u8>,
}

/// Server side password record of one SRP user.
#[derive(Debug, Clone)]
pub struct SrpVerifier {
    pub username: Vec<u8>,
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
}

impl SrpVerifier {
    /// Compute the verifier `v = g^x % N` for a user in the 1024 bit group.
    pub fn new(
        provider: &CryptoProvider,
        username: &[u8],
        password: &[u8],
        salt: &[u8],
    ) -> Result<Self, Error> {
        let verifier = srp::verifier(
            provider,
            &SrpGroup::rfc5054_1024(),
            salt,
            username,
            password,
        )?;
        Ok(SrpVerifier {
            username: username.to_vec(),
            salt: salt.to_vec(),
            verifier,
        })
    }
}

/// TLS configuration
#[derive(Clone)]
pub struct Config {
    versions: Vec<TlsVersion>,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    extensions: Option<Vec<ConfiguredExtension>>,
    server_name: Option<String>,
    certificate_chain: Vec<Vec<u8>>,
    private_key: Option<Arc<Secret>>,
    require_client_certificate: bool,
    psk: Option<PskCredentials>,
    srp: Option<SrpCredentials>,
    srp_verifiers: Vec<SrpVerifier>,
    alpn_protocols: Vec<Vec<u8>>,
    with_extended_master_secret: bool,
    with_grease: bool,
    padding_target: Option<usize>,
    certificate_validator: Arc<dyn CertificateValidator>,
    crypto_provider: CryptoProvider,
    max_fragment: usize,
    max_fragment_length: Option<MaxFragmentLength>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("versions", &self.versions)
            .field("cipher_suites", &self.cipher_suites)
            .field("groups", &self.groups)
            .field("server_name", &self.server_name)
            .field("certificates", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            versions: vec![TlsVersion::Tls13, TlsVersion::Tls12],
            cipher_suites: vec![
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_AES_256_GCM_SHA384,
                CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::ECDHE_RSA_AES128_GCM_SHA256,
                CipherSuite::ECDHE_ECDSA_AES256_GCM_SHA384,
                CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
                CipherSuite::ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
                CipherSuite::ECDHE_RSA_CHACHA20_POLY1305_SHA256,
            ],
            groups: vec![
                NamedGroup::X25519,
                NamedGroup::Secp256r1,
                NamedGroup::Secp384r1,
            ],
            signature_schemes: SignatureScheme::supported().to_vec(),
            extensions: None,
            server_name: None,
            certificate_chain: Vec::new(),
            private_key: None,
            require_client_certificate: false,
            psk: None,
            srp: None,
            srp_verifiers: Vec::new(),
            alpn_protocols: Vec::new(),
            with_extended_master_secret: true,
            with_grease: false,
            padding_target: None,
            certificate_validator: None,
            crypto_provider: None,
            max_fragment: MAX_FRAGMENT,
            max_fragment_length: None,
        }
    }

    /// Versions in preference order.
    #[inline(always)]
    pub fn versions(&self) -> &[TlsVersion] {
        &self.versions
    }

    /// Highest configured version.
    pub fn max_version(&self) -> TlsVersion {
        self.versions
            .iter()
            .copied()
            .max_by_key(|v| v.id().0)
            .unwrap_or(TlsVersion::Tls12)
    }

    /// Lowest configured version.
    pub fn min_version(&self) -> TlsVersion {
        self.versions
            .iter()
            .copied()
            .min_by_key(|v| v.id().0)
            .unwrap_or(TlsVersion::Tls12)
    }

    /// Cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Key exchange groups in preference order.
    #[inline(always)]
    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    /// Signature schemes we accept and produce.
    #[inline(always)]
    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        &self.signature_schemes
    }

    /// The extensions offered in the ClientHello.
    ///
    /// Either set explicitly, or derived from the other options.
    pub fn extensions(&self) -> Vec<ConfiguredExtension> {
        if let Some(explicit) = &self.extensions {
            return explicit.clone();
        }

        let mut out = Vec::new();
        if self.with_grease {
            out.push(ConfiguredExtension::Concrete(Extension::Grease(
                crate::types::version::grease_u16(),
            )));
        }
        if self.server_name.is_some() {
            out.push(ConfiguredExtension::Model(ModelExtension::ServerName));
        }
        if let Some(m) = self.max_fragment_length {
            out.push(ConfiguredExtension::Concrete(Extension::MaxFragmentLength(m)));
        }
        out.push(ConfiguredExtension::Concrete(Extension::SupportedGroups(
            self.groups.clone(),
        )));
        out.push(ConfiguredExtension::Concrete(Extension::EcPointFormats(vec![0])));
        out.push(ConfiguredExtension::Concrete(Extension::SignatureAlgorithms(
            self.signature_schemes.clone(),
        )));
        if let Some(srp) = &self.srp {
            out.push(ConfiguredExtension::Concrete(Extension::Srp(
                srp.username.clone(),
            )));
        }
        if !self.alpn_protocols.is_empty() {
            out.push(ConfiguredExtension::Concrete(Extension::Alpn(
                self.alpn_protocols.clone(),
            )));
        }
        if self.with_extended_master_secret {
            out.push(ConfiguredExtension::Concrete(Extension::ExtendedMasterSecret));
        }
        out.push(ConfiguredExtension::Concrete(Extension::RenegotiationInfo(
            Vec::new(),
        )));
        out.push(ConfiguredExtension::Model(ModelExtension::ClientSupportedVersions));
        out.push(ConfiguredExtension::Model(ModelExtension::KeyShare));
        if self.padding_target.is_some() {
            out.push(ConfiguredExtension::Model(ModelExtension::Padding));
        }
        out
    }

    /// Host name sent in the server_name extension.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// DER certificates, leaf first.
    #[inline(always)]
    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.certificate_chain
    }

    /// DER private key of the leaf certificate.
    #[inline(always)]
    pub fn private_key(&self) -> Option<&Secret> {
        self.private_key.as_deref()
    }

    /// For a server, require a client certificate.
    ///
    /// This will cause the server to send a CertificateRequest message.
    /// Makes the server fail if the client does not send a certificate.
    #[inline(always)]
    pub fn require_client_certificate(&self) -> bool {
        self.require_client_certificate
    }

    #[inline(always)]
    pub fn psk(&self) -> Option<&PskCredentials> {
        self.psk.as_ref()
    }

    #[inline(always)]
    pub fn srp(&self) -> Option<&SrpCredentials> {
        self.srp.as_ref()
    }

    /// Server password record for `username`.
    pub fn srp_verifier(&self, username: &[u8]) -> Option<&SrpVerifier> {
        self.srp_verifiers.iter().find(|v| v.username == username)
    }

    /// ALPN protocol ids in preference order.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// Whether to enable Extended Master Secret extension (rfc7627).
    #[inline(always)]
    pub fn with_extended_master_secret(&self) -> bool {
        self.with_extended_master_secret
    }

    /// Whether to send GREASE values (rfc8701).
    #[inline(always)]
    pub fn with_grease(&self) -> bool {
        self.with_grease
    }

    /// Length the ClientHello is padded to (rfc7685).
    #[inline(always)]
    pub fn padding_target(&self) -> Option<usize> {
        self.padding_target
    }

    #[inline(always)]
    pub fn certificate_validator(&self) -> &dyn CertificateValidator {
        &*self.certificate_validator
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (ciphers, key exchange, signing, etc.).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Largest plaintext put in one record.
    #[inline(always)]
    pub fn max_fragment(&self) -> usize {
        self.max_fragment
    }

    /// Client only. Smaller records asked of the server.
    #[inline(always)]
    pub fn max_fragment_length(&self) -> Option<MaxFragmentLength> {
        self.max_fragment_length
    }
}

/// Builder for TLS configuration.
pub struct ConfigBuilder {
    versions: Vec<TlsVersion>,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    extensions: Option<Vec<ConfiguredExtension>>,
    server_name: Option<String>,
    certificate_chain: Vec<Vec<u8>>,
    private_key: Option<Arc<Secret>>,
    require_client_certificate: bool,
    psk: Option<PskCredentials>,
    srp: Option<SrpCredentials>,
    srp_verifiers: Vec<SrpVerifier>,
    alpn_protocols: Vec<Vec<u8>>,
    with_extended_master_secret: bool,
    with_grease: bool,
    padding_target: Option<usize>,
    certificate_validator: Option<Arc<dyn CertificateValidator>>,
    crypto_provider: Option<CryptoProvider>,
    max_fragment: usize,
    max_fragment_length: Option<MaxFragmentLength>,
}

impl ConfigBuilder {
    /// Set the protocol versions, most preferred first.
    ///
    /// Defaults to TLS 1.3 and TLS 1.2.
    pub fn versions(mut self, versions: &[TlsVersion]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    /// Set the cipher suites, most preferred first.
    ///
    /// Defaults to the TLS 1.3 suites followed by the ECDHE AEAD suites.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the key exchange groups, most preferred first.
    ///
    /// Defaults to x25519, secp256r1 and secp384r1.
    pub fn groups(mut self, groups: &[NamedGroup]) -> Self {
        self.groups = groups.to_vec();
        self
    }

    /// Set the accepted signature schemes.
    ///
    /// Defaults to every scheme of the crypto provider.
    pub fn signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes = schemes.to_vec();
        self
    }

    /// Replace the derived ClientHello extensions with an explicit list.
    pub fn extensions(mut self, extensions: Vec<ConfiguredExtension>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Set the host name sent as server_name.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the certificate chain (DER, leaf first) and the leaf's private key (DER).
    pub fn certificate(mut self, chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        self.certificate_chain = chain;
        self.private_key = Some(Arc::new(Secret::new(private_key)));
        self
    }

    /// Set whether to require a client certificate (for servers).
    ///
    /// This will cause the server to send a CertificateRequest message.
    /// Makes the server fail if the client does not send a certificate.
    /// Defaults to false.
    pub fn require_client_certificate(mut self, require: bool) -> Self {
        self.require_client_certificate = require;
        self
    }

    pub fn psk(mut self, psk: PskCredentials) -> Self {
        self.psk = Some(psk);
        self
    }

    /// Set the SRP username and password (for clients).
    pub fn srp(mut self, username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        self.srp = Some(SrpCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Add an SRP password record (for servers).
    pub fn srp_verifier(mut self, verifier: SrpVerifier) -> Self {
        self.srp_verifiers.push(verifier);
        self
    }

    /// Set the ALPN protocols, most preferred first.
    pub fn alpn_protocols(mut self, protocols: &[&[u8]]) -> Self {
        self.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    /// Set whether to enable Extended Master Secret extension (rfc7627)
    ///
    /// Defaults to true.
    pub fn with_extended_master_secret(mut self, enabled: bool) -> Self {
        self.with_extended_master_secret = enabled;
        self
    }

    /// Set whether to send GREASE values (rfc8701).
    ///
    /// Defaults to false.
    pub fn with_grease(mut self, enabled: bool) -> Self {
        self.with_grease = enabled;
        self
    }

    /// Pad the ClientHello to `target` bytes.
    pub fn padding_target(mut self, target: usize) -> Self {
        self.padding_target = Some(target);
        self
    }

    /// Set the peer certificate validator.
    ///
    /// Defaults to a validator that only checks the leaf's key algorithm.
    pub fn certificate_validator(mut self, validator: Arc<dyn CertificateValidator>) -> Self {
        self.certificate_validator = Some(validator);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the RustCrypto provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Set the largest plaintext per record.
    ///
    /// Defaults to 16384, which is also the maximum.
    pub fn max_fragment(mut self, max: usize) -> Self {
        self.max_fragment = max;
        self
    }

    /// Ask the server for records of at most `length` plaintext bytes (RFC 6066).
    pub fn max_fragment_length(mut self, length: MaxFragmentLength) -> Self {
        self.max_fragment_length = Some(length);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` for an unusable combination of versions,
    /// suites and extensions.
    pub fn build(self) -> Result<Config, Error> {
        if self.versions.is_empty() {
            return Err(Error::ConfigError("No protocol version".into()));
        }
        if let Some(v) = self.versions.iter().find(|v| v.is_datagram()) {
            return Err(Error::ConfigError(format!(
                "Datagram version {:?} not supported by the stream engine",
                v
            )));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError("No cipher suite".into()));
        }
        for suite in &self.cipher_suites {
            if !self.versions.iter().any(|v| suite.supports(*v)) {
                return Err(Error::ConfigError(format!(
                    "Cipher suite {:?} unusable with {:?}",
                    suite, self.versions
                )));
            }
        }
        if self.max_fragment == 0 || self.max_fragment > MAX_FRAGMENT {
            return Err(Error::ConfigError(format!(
                "Max fragment out of range: {}",
                self.max_fragment
            )));
        }
        if let Some(m) = self.max_fragment_length {
            if m.plaintext_len().is_none() {
                return Err(Error::ConfigError(format!(
                    "Undefined max_fragment_length code {}",
                    m.as_u8()
                )));
            }
        }
        if self.private_key.is_some() && self.certificate_chain.is_empty() {
            return Err(Error::ConfigError("Private key without certificate".into()));
        }

        if let Some(explicit) = &self.extensions {
            let mut seen: Vec<ExtensionType> = Vec::new();
            for ext in explicit {
                let t = ext.extension_type();
                if seen.contains(&t) {
                    return Err(Error::ConfigError(format!("Conflicting extension {:?}", t)));
                }
                seen.push(t);
            }
        }

        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(rust_crypto::default_provider);

        Ok(Config {
            versions: self.versions,
            cipher_suites: self.cipher_suites,
            groups: self.groups,
            signature_schemes: self.signature_schemes,
            extensions: self.extensions,
            server_name: self.server_name,
            certificate_chain: self.certificate_chain,
            private_key: self.private_key,
            require_client_certificate: self.require_client_certificate,
            psk: self.psk,
            srp: self.srp,
            srp_verifiers: self.srp_verifiers,
            alpn_protocols: self.alpn_protocols,
            with_extended_master_secret: self.with_extended_master_secret,
            with_grease: self.with_grease,
            padding_target: self.padding_target,
            certificate_validator: self
                .certificate_validator
                .unwrap_or_else(|| Arc::new(KeyAlgorithmValidator)),
            crypto_provider,
            max_fragment: self.max_fragment,
            max_fragment_length: self.max_fragment_length,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
