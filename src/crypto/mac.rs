//! Record sequence numbers and the record MAC.

use crate::crypto::provider::CryptoProvider;
use crate::secret::Secret;
use crate::types::{ContentType, HashAlgorithm, TlsVersion};
use crate::{Error, InternalError};

const SSL3_PAD1: u8 = 0x36;
const SSL3_PAD2: u8 = 0x5c;

/// Per direction sequence counter and MAC key.
///
/// The 8 byte sequence is a plain counter for stream versions. Datagram versions
/// split it into a 2 byte epoch and a 6 byte counter.
pub struct ExchangeMac {
    version: TlsVersion,
    hash: Option<HashAlgorithm>,
    key: Secret,
    epoch: u16,
    sequence: u64,
}

impl std::fmt::Debug for ExchangeMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeMac")
            .field("version", &self.version)
            .field("hash", &self.hash)
            .field("epoch", &self.epoch)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl ExchangeMac {
    /// `hash` is `None` for AEAD ciphers and the null MAC.
    pub fn new(version: TlsVersion, hash: Option<HashAlgorithm>, key: Secret) -> Self {
        ExchangeMac {
            version,
            hash,
            key,
            epoch: 0,
            sequence: 0,
        }
    }

    #[inline(always)]
    pub fn version(&self) -> TlsVersion {
        self.version
    }

    #[inline(always)]
    pub fn hash(&self) -> Option<HashAlgorithm> {
        self.hash
    }

    pub fn mac_len(&self) -> usize {
        self.hash.map(|h| h.output_len()).unwrap_or(0)
    }

    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    /// Start a new datagram epoch. The counter restarts at zero.
    pub fn set_epoch(&mut self, epoch: u16) {
        if self.version.is_datagram() {
            self.epoch = epoch;
            self.sequence = 0;
        }
    }

    /// The 8 byte sequence of the next record.
    pub fn sequence_bytes(&self) -> [u8; 8] {
        if self.version.is_datagram() {
            let mut out = self.sequence.to_be_bytes();
            out[..2].copy_from_slice(&self.epoch.to_be_bytes());
            out
        } else {
            self.sequence.to_be_bytes()
        }
    }

    /// The counter may not get within one increment of the last byte wrapping.
    ///
    /// Stream: bytes 0..7 all 0xFF. Datagram: the epoch bytes are ignored.
    pub fn is_overflow(&self) -> bool {
        if self.version.is_datagram() {
            (self.sequence >> 8) & 0xFF_FFFF_FFFF == 0xFF_FFFF_FFFF
        } else {
            self.sequence >> 8 == 0x00FF_FFFF_FFFF_FFFF
        }
    }

    /// Advance to the next record, failing instead of wrapping.
    pub fn increment(&mut self) -> Result<(), Error> {
        if self.is_overflow() {
            return Err(InternalError::SequenceOverflow.into());
        }
        self.sequence += 1;
        Ok(())
    }

    /// Take the sequence of the current record and advance the counter.
    pub fn next_sequence(&mut self) -> Result<[u8; 8], Error> {
        let seq = self.sequence_bytes();
        self.increment()?;
        Ok(seq)
    }

    /// Additional data authenticated with each record.
    ///
    /// SSL 3.0: `seq(8) type(1) length(2)`.
    /// TLS 1.0 to 1.2, DTLS 1.0 and 1.2: `seq(8) type(1) version(2) length(2)`.
    /// TLS 1.3, DTLS 1.3: `type(1) legacy_version(2) length(2)`.
    pub fn authentication_block(
        &self,
        sequence: &[u8; 8],
        content_type: ContentType,
        length: usize,
    ) -> Vec<u8> {
        let len = (length as u16).to_be_bytes();
        match self.version {
            TlsVersion::Ssl30 => {
                let mut b = Vec::with_capacity(11);
                b.extend_from_slice(sequence);
                b.push(content_type.as_u8());
                b.extend_from_slice(&len);
                b
            }
            v if v.is_tls13() => {
                let mut b = Vec::with_capacity(5);
                b.push(content_type.as_u8());
                b.extend_from_slice(&v.legacy_id().0.to_be_bytes());
                b.extend_from_slice(&len);
                b
            }
            v => {
                let mut b = Vec::with_capacity(13);
                b.extend_from_slice(sequence);
                b.push(content_type.as_u8());
                b.extend_from_slice(&v.id().0.to_be_bytes());
                b.extend_from_slice(&len);
                b
            }
        }
    }

    /// MAC over a record fragment. Empty when there is no MAC.
    pub fn compute(
        &self,
        provider: &CryptoProvider,
        sequence: &[u8; 8],
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let Some(hash) = self.hash else {
            return Ok(Vec::new());
        };
        let block = self.authentication_block(sequence, content_type, fragment.len());

        if self.version == TlsVersion::Ssl30 {
            // hash(key + pad2 + hash(key + pad1 + seq + type + length + content))
            let pad_len = if hash == HashAlgorithm::MD5 { 48 } else { 40 };
            let pad1 = vec![SSL3_PAD1; pad_len];
            let pad2 = vec![SSL3_PAD2; pad_len];
            let inner = provider
                .digest(hash, &[self.key.as_bytes(), &pad1, &block, fragment])
                .map_err(Error::crypto)?;
            return provider
                .digest(hash, &[self.key.as_bytes(), &pad2, &inner])
                .map_err(Error::crypto);
        }

        provider
            .hmac_provider
            .hmac(hash, self.key.as_bytes(), &[&block, fragment])
            .map_err(Error::crypto)
    }

    #[cfg(test)]
    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn mac(version: TlsVersion) -> ExchangeMac {
        ExchangeMac::new(version, Some(HashAlgorithm::SHA1), Secret::new(vec![1; 20]))
    }

    #[test]
    fn block_sizes() {
        let seq = [0; 8];
        let t = ContentType::ApplicationData;
        assert_eq!(mac(TlsVersion::Ssl30).authentication_block(&seq, t, 5).len(), 11);
        assert_eq!(mac(TlsVersion::Tls10).authentication_block(&seq, t, 5).len(), 13);
        assert_eq!(mac(TlsVersion::Dtls12).authentication_block(&seq, t, 5).len(), 13);
        assert_eq!(mac(TlsVersion::Tls13).authentication_block(&seq, t, 5).len(), 5);
    }

    #[test]
    fn tls12_block_layout() {
        let m = mac(TlsVersion::Tls12);
        let b = m.authentication_block(&[0, 0, 0, 0, 0, 0, 0, 7], ContentType::Handshake, 0x0102);
        assert_eq!(b, [0, 0, 0, 0, 0, 0, 0, 7, 22, 3, 3, 1, 2]);

        let m = mac(TlsVersion::Tls13);
        let b = m.authentication_block(&[0; 8], ContentType::ApplicationData, 0x20);
        assert_eq!(b, [23, 3, 3, 0, 0x20]);
    }

    #[test]
    fn sequence_counts_up() {
        let mut m = mac(TlsVersion::Tls12);
        assert_eq!(m.next_sequence().unwrap(), [0; 8]);
        assert_eq!(m.next_sequence().unwrap(), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(m.sequence_bytes(), [0, 0, 0, 0, 0, 0, 0, 2]);
    }

    #[test]
    fn stream_overflow_fails_closed() {
        let mut m = mac(TlsVersion::Tls12);
        m.set_sequence(0xFFFF_FFFF_FFFF_FEFF);
        m.increment().unwrap();
        assert!(m.is_overflow());

        let err = m.increment().unwrap_err();
        assert!(matches!(err, Error::Internal(InternalError::SequenceOverflow)));
        // no wrap happened
        assert_eq!(m.sequence_bytes(), [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn datagram_overflow_ignores_epoch() {
        let mut m = mac(TlsVersion::Dtls12);
        m.set_epoch(1);
        m.set_sequence(0xFFFF_FFFF_FF00);
        assert_eq!(m.sequence_bytes(), [0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
        assert!(m.increment().is_err());
    }

    #[test]
    fn ssl3_and_tls_macs_differ() {
        let p = default_provider();
        let seq = [0; 8];
        let a = mac(TlsVersion::Ssl30)
            .compute(&p, &seq, ContentType::ApplicationData, b"x")
            .unwrap();
        let b = mac(TlsVersion::Tls10)
            .compute(&p, &seq, ContentType::ApplicationData, b"x")
            .unwrap();
        assert_eq!(a.len(), 20);
        assert_eq!(b.len(), 20);
        assert_ne!(a, b);
    }
}
