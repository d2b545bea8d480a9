//! Running handshake transcript.

use crate::crypto::provider::{CryptoProvider, HashContext};
use crate::types::{HashAlgorithm, TlsVersion};
use crate::Error;

/// Handshake type of the synthetic message standing in for ClientHello1.
const MESSAGE_HASH: u8 = 254;

/// Every handshake message sent or received, in order.
///
/// The raw bytes are kept because pre TLS 1.3 signatures are computed over
/// the whole message sequence. Once the cipher suite is known, running digests
/// are started and the buffered bytes replayed into them.
#[derive(Default)]
pub struct Transcript {
    messages: Vec<u8>,
    hashes: Vec<Box<dyn HashContext>>,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.messages.len())
            .field("hashes", &self.hashes)
            .finish()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, message: &[u8]) {
        self.messages.extend_from_slice(message);
        for h in &mut self.hashes {
            h.update(message);
        }
    }

    /// Start running digests for the negotiated version and transcript hash.
    ///
    /// Pre TLS 1.2 uses MD5 and SHA-1 side by side.
    pub fn start(
        &mut self,
        provider: &CryptoProvider,
        version: TlsVersion,
        hash: Option<HashAlgorithm>,
    ) -> Result<(), Error> {
        let algorithms = match hash {
            Some(h) => vec![h],
            None => vec![HashAlgorithm::MD5, HashAlgorithm::SHA1],
        };
        self.hashes.clear();
        for alg in algorithms {
            let mut ctx = provider.hash_provider.create_hash(alg).map_err(Error::crypto)?;
            ctx.update(&self.messages);
            self.hashes.push(ctx);
        }
        trace!("Transcript started for {:?} with {:?}", version, hash);
        Ok(())
    }

    /// Collapse the messages so far into a synthetic message_hash message
    /// (RFC 8446 Section 4.4.1), as after a HelloRetryRequest.
    pub fn replace_with_message_hash(
        &mut self,
        provider: &CryptoProvider,
        hash: HashAlgorithm,
    ) -> Result<(), Error> {
        let digest = provider
            .digest(hash, &[self.messages.as_slice()])
            .map_err(Error::crypto)?;
        let mut messages = vec![MESSAGE_HASH, 0, 0, digest.len() as u8];
        messages.extend_from_slice(&digest);

        self.messages = messages;
        self.hashes.clear();
        let mut ctx = provider.hash_provider.create_hash(hash).map_err(Error::crypto)?;
        ctx.update(&self.messages);
        self.hashes.push(ctx);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        !self.hashes.is_empty()
    }

    /// All handshake bytes so far.
    #[inline(always)]
    pub fn messages(&self) -> &[u8] {
        &self.messages
    }

    /// Digest of the messages so far with one of the running hashes.
    pub fn current(&self, hash: HashAlgorithm) -> Result<Vec<u8>, Error> {
        self.hashes
            .iter()
            .find(|h| h.algorithm() == hash)
            .map(|h| h.clone_and_finalize())
            .ok_or_else(|| {
                Error::Internal(crate::InternalError::MissingProperty("transcript hash"))
            })
    }

    /// The session hash: MD5||SHA-1 before TLS 1.2, the suite hash after.
    ///
    /// Used by Finished, the extended master secret and the TLS 1.3 key schedule.
    pub fn session_hash(&self) -> Result<Vec<u8>, Error> {
        match self.hashes.as_slice() {
            [single] => Ok(single.clone_and_finalize()),
            [_, _] => {
                let mut out = self.current(HashAlgorithm::MD5)?;
                out.extend_from_slice(&self.current(HashAlgorithm::SHA1)?);
                Ok(out)
            }
            _ => Err(Error::Internal(crate::InternalError::MissingProperty(
                "transcript hash",
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    #[test]
    fn replays_buffered_messages() {
        let provider = default_provider();
        let mut t = Transcript::new();
        t.update(b"client hello");
        t.start(&provider, TlsVersion::Tls12, Some(HashAlgorithm::SHA256))
            .unwrap();
        t.update(b"server hello");

        let expected = provider
            .digest(HashAlgorithm::SHA256, &[b"client hello", b"server hello"])
            .unwrap();
        assert_eq!(t.session_hash().unwrap(), expected);
        assert_eq!(t.messages(), b"client helloserver hello");
    }

    #[test]
    fn legacy_session_hash_is_md5_sha1() {
        let provider = default_provider();
        let mut t = Transcript::new();
        t.start(&provider, TlsVersion::Tls10, None).unwrap();
        t.update(b"abc");
        let h = t.session_hash().unwrap();
        assert_eq!(h.len(), 16 + 20);
        assert_eq!(&h[..16], &provider.digest(HashAlgorithm::MD5, &[b"abc"]).unwrap()[..]);
    }

    #[test]
    fn message_hash_replaces_first_hello() {
        let provider = default_provider();
        let mut t = Transcript::new();
        t.update(b"client hello 1");
        t.start(&provider, TlsVersion::Tls13, Some(HashAlgorithm::SHA256))
            .unwrap();
        t.replace_with_message_hash(&provider, HashAlgorithm::SHA256)
            .unwrap();
        t.update(b"retry");

        let inner = provider
            .digest(HashAlgorithm::SHA256, &[b"client hello 1"])
            .unwrap();
        let mut synthetic = vec![254, 0, 0, 32];
        synthetic.extend_from_slice(&inner);
        assert_eq!(&t.messages()[..36], &synthetic[..]);

        let expected = provider
            .digest(HashAlgorithm::SHA256, &[synthetic.as_slice(), b"retry".as_slice()])
            .unwrap();
        assert_eq!(t.current(HashAlgorithm::SHA256).unwrap(), expected);
    }

    #[test]
    fn not_started() {
        let t = Transcript::new();
        assert!(t.session_hash().is_err());
    }
}
