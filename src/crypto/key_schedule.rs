//! TLS 1.3 Key Schedule (RFC 8446 Section 7.1)
//!
//! ```text
//!              0
//!              |
//!              v
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic",
//!              |                     ClientHello...ServerHello)
//!              |                     = client_handshake_traffic_secret
//!              |
//!              +-----> Derive-Secret(., "s hs traffic",
//!              |                     ClientHello...ServerHello)
//!              |                     = server_handshake_traffic_secret
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!              v
//!    0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic",
//!              |                     ClientHello...server Finished)
//!              |                     = client_application_traffic_secret_0
//!              |
//!              +-----> Derive-Secret(., "s ap traffic",
//!                                    ClientHello...server Finished)
//!                                    = server_application_traffic_secret_0
//! ```
//!
//! No PSK and no 0-RTT, so the early secret is extracted from zeros and only
//! used to reach the handshake secret.

use crate::crypto::hkdf;
use crate::crypto::provider::CryptoProvider;
use crate::secret::Secret;
use crate::types::HashAlgorithm;
use crate::Error;

/// TLS 1.3 Key Schedule.
///
/// Holds only the secret of the current stage. Each stage replaces (and
/// thereby zeroes) the previous one; traffic secrets are handed to the caller.
#[derive(Debug)]
pub struct KeySchedule {
    provider: CryptoProvider,
    hash: HashAlgorithm,
    datagram: bool,
    /// Derive-Secret(., "derived", "") of the previous stage, or the master secret.
    current_secret: Secret,
}

impl KeySchedule {
    /// Start from the early secret without PSK, derived to the input of the handshake stage.
    pub fn new(
        provider: &CryptoProvider,
        hash: HashAlgorithm,
        datagram: bool,
    ) -> Result<Self, Error> {
        let hash_len = hash.output_len();
        let zeros = vec![0u8; hash_len];

        // Early Secret = HKDF-Extract(0, 0)
        let early_secret = hkdf::extract(provider.hmac_provider, hash, &[], &zeros)?;

        let mut ks = KeySchedule {
            provider: provider.clone(),
            hash,
            datagram,
            current_secret: Secret::new(Vec::new()),
        };
        ks.current_secret = ks.derive_secret(early_secret.as_bytes(), b"derived", None)?;
        early_secret.destroy();
        Ok(ks)
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    fn expand_label(
        &self,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        len: usize,
    ) -> Result<Secret, Error> {
        hkdf::expand_label(
            self.provider.hmac_provider,
            self.hash,
            secret,
            label,
            context,
            len,
            self.datagram,
        )
    }

    /// Derive-Secret(secret, label, messages). `None` hashes the empty string.
    fn derive_secret(
        &self,
        secret: &[u8],
        label: &[u8],
        transcript_hash: Option<&[u8]>,
    ) -> Result<Secret, Error> {
        let empty;
        let context = match transcript_hash {
            Some(h) => h,
            None => {
                empty = self
                    .provider
                    .digest(self.hash, &[])
                    .map_err(Error::crypto)?;
                &empty[..]
            }
        };
        self.expand_label(secret, label, context, self.hash.output_len())
    }

    /// Inject the (EC)DHE shared secret and derive handshake traffic secrets.
    ///
    /// Returns (client_handshake_traffic_secret, server_handshake_traffic_secret).
    pub fn derive_handshake_secrets(
        &mut self,
        shared_secret: &[u8],
        transcript_hash: &[u8],
    ) -> Result<(Secret, Secret), Error> {
        // Handshake Secret = HKDF-Extract(derived, ECDHE)
        let handshake_secret = hkdf::extract(
            self.provider.hmac_provider,
            self.hash,
            self.current_secret.as_bytes(),
            shared_secret,
        )?;

        let client =
            self.derive_secret(handshake_secret.as_bytes(), b"c hs traffic", Some(transcript_hash))?;
        let server =
            self.derive_secret(handshake_secret.as_bytes(), b"s hs traffic", Some(transcript_hash))?;

        self.current_secret = self.derive_secret(handshake_secret.as_bytes(), b"derived", None)?;
        handshake_secret.destroy();

        Ok((client, server))
    }

    /// Derive application traffic secrets after the server Finished.
    ///
    /// Returns (client_application_traffic_secret_0, server_application_traffic_secret_0).
    pub fn derive_application_secrets(
        &mut self,
        transcript_hash: &[u8],
    ) -> Result<(Secret, Secret), Error> {
        let zeros = vec![0u8; self.hash.output_len()];

        // Master Secret = HKDF-Extract(derived, 0)
        let master_secret = hkdf::extract(
            self.provider.hmac_provider,
            self.hash,
            self.current_secret.as_bytes(),
            &zeros,
        )?;

        let client =
            self.derive_secret(master_secret.as_bytes(), b"c ap traffic", Some(transcript_hash))?;
        let server =
            self.derive_secret(master_secret.as_bytes(), b"s ap traffic", Some(transcript_hash))?;

        self.current_secret = master_secret;

        Ok((client, server))
    }

    /// Traffic key and IV from a traffic secret.
    ///
    /// Returns (key, iv).
    pub fn derive_traffic_keys(
        &self,
        traffic_secret: &[u8],
        key_len: usize,
        iv_len: usize,
    ) -> Result<(Secret, Secret), Error> {
        // key = HKDF-Expand-Label(Secret, "key", "", key_length)
        let key = self.expand_label(traffic_secret, b"key", &[], key_len)?;
        // iv = HKDF-Expand-Label(Secret, "iv", "", iv_length)
        let iv = self.expand_label(traffic_secret, b"iv", &[], iv_len)?;
        Ok((key, iv))
    }

    /// Finished verify_data (RFC 8446 Section 4.4.4).
    ///
    /// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
    /// verify_data = HMAC(finished_key, Transcript-Hash(Handshake Context, Certificate*, CertificateVerify*))
    pub fn finished_verify_data(
        &self,
        base_key: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let finished_key =
            self.expand_label(base_key, b"finished", &[], self.hash.output_len())?;
        self.provider
            .hmac_provider
            .hmac(self.hash, finished_key.as_bytes(), &[transcript_hash])
            .map_err(Error::crypto)
    }
}
