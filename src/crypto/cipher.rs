//! Per direction record protection.

use subtle::{ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};

use crate::crypto::mac::ExchangeMac;
use crate::crypto::provider::{AeadCipher, BlockCipher, CryptoProvider};
use crate::secret::Secret;
use crate::types::{AlertDescription, BulkCipher, ContentType, TlsVersion};
use crate::{Error, InternalError};

/// Record protection of one direction.
enum Mode {
    /// No encryption. The MAC, if any, is appended to the plaintext.
    Null,
    /// MAC-then-encrypt with CBC. `iv` is the chaining IV for SSL 3.0 and TLS 1.0.
    Block {
        cipher: Box<dyn BlockCipher>,
        iv: Vec<u8>,
    },
    /// AEAD. `iv` is the implicit salt (TLS 1.2 GCM) or the full nonce mask.
    Aead {
        cipher: Box<dyn AeadCipher>,
        iv: Secret,
    },
}

/// A decrypted or encrypted record body.
#[derive(Debug)]
pub struct Protected {
    /// Content type of the record header. TLS 1.3 hides the real type in the payload.
    pub content_type: ContentType,
    /// Sequence the record was protected with.
    pub sequence: [u8; 8],
    pub fragment: Vec<u8>,
}

/// Encrypts or decrypts the records of one direction.
pub struct RecordCipher {
    provider: CryptoProvider,
    bulk: BulkCipher,
    mode: Mode,
    mac: ExchangeMac,
}

impl std::fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCipher")
            .field("bulk", &self.bulk)
            .field("mac", &self.mac)
            .finish_non_exhaustive()
    }
}

fn bad_record_mac() -> Error {
    Error::fatal(AlertDescription::BadRecordMac)
}

impl RecordCipher {
    /// Build a record cipher from key material.
    ///
    /// `iv` is the CBC IV (SSL 3.0, TLS 1.0), the 4 byte GCM salt (TLS 1.2) or
    /// the 12 byte nonce mask (ChaCha20 and TLS 1.3). It is ignored for null ciphers.
    pub fn new(
        provider: &CryptoProvider,
        bulk: BulkCipher,
        key: &[u8],
        iv: &[u8],
        mac: ExchangeMac,
    ) -> Result<Self, Error> {
        let cp = provider.cipher_provider;
        if !cp.supports(bulk) {
            return Err(InternalError::Unsupported("bulk cipher").into());
        }

        let mode = if bulk == BulkCipher::Null {
            Mode::Null
        } else if bulk.is_aead() {
            Mode::Aead {
                cipher: cp.create_aead(bulk, key).map_err(Error::crypto)?,
                iv: Secret::from_slice(iv),
            }
        } else if bulk.is_block() {
            Mode::Block {
                cipher: cp.create_block(bulk, key).map_err(Error::crypto)?,
                iv: iv.to_vec(),
            }
        } else {
            return Err(InternalError::Unsupported("bulk cipher").into());
        };

        Ok(RecordCipher {
            provider: provider.clone(),
            bulk,
            mode,
            mac,
        })
    }

    /// Cipher that passes records through, used before any keys are installed.
    pub fn null(provider: &CryptoProvider, version: TlsVersion) -> Self {
        RecordCipher {
            provider: provider.clone(),
            bulk: BulkCipher::Null,
            mode: Mode::Null,
            mac: ExchangeMac::new(version, None, Secret::new(Vec::new())),
        }
    }

    #[inline(always)]
    pub fn mac(&self) -> &ExchangeMac {
        &self.mac
    }

    pub fn mac_mut(&mut self) -> &mut ExchangeMac {
        &mut self.mac
    }

    pub fn bulk(&self) -> BulkCipher {
        self.bulk
    }

    fn version(&self) -> TlsVersion {
        self.mac.version()
    }

    /// Bytes added to a plaintext of `len` bytes, at most.
    pub fn overhead(&self) -> usize {
        match &self.mode {
            Mode::Null => self.mac.mac_len(),
            Mode::Block { cipher, .. } => {
                let b = cipher.block_len();
                let explicit = if self.version().uses_explicit_iv() { b } else { 0 };
                explicit + self.mac.mac_len() + b
            }
            Mode::Aead { .. } => {
                let inner_type = if self.version().is_tls13() { 1 } else { 0 };
                self.bulk.explicit_nonce_len() + self.bulk.tag_len() + inner_type
            }
        }
    }

    /// Protect one record.
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Protected, Error> {
        let sequence = self.mac.next_sequence()?;
        let version = self.version();

        let (outer_type, fragment) = match &mut self.mode {
            Mode::Null => {
                let mac = self
                    .mac
                    .compute(&self.provider, &sequence, content_type, plaintext)?;
                let mut out = plaintext.to_vec();
                out.extend_from_slice(&mac);
                (content_type, out)
            }

            Mode::Block { cipher, iv } => {
                let block_len = cipher.block_len();
                let mac = self
                    .mac
                    .compute(&self.provider, &sequence, content_type, plaintext)?;

                let mut data = Vec::with_capacity(plaintext.len() + mac.len() + block_len);
                data.extend_from_slice(plaintext);
                data.extend_from_slice(&mac);
                // padding bytes and the padding length byte all hold the padding length
                let pad = block_len - (data.len() + 1) % block_len;
                let pad = if pad == block_len { 0 } else { pad };
                data.extend(std::iter::repeat(pad as u8).take(pad + 1));

                if version.uses_explicit_iv() {
                    let record_iv = self
                        .provider
                        .random_vec(block_len)
                        .map_err(Error::crypto)?;
                    cipher.encrypt_cbc(&record_iv, &mut data).map_err(Error::crypto)?;
                    let mut out = record_iv;
                    out.extend_from_slice(&data);
                    (content_type, out)
                } else {
                    cipher.encrypt_cbc(iv, &mut data).map_err(Error::crypto)?;
                    *iv = data[data.len() - block_len..].to_vec();
                    (content_type, data)
                }
            }

            Mode::Aead { cipher, iv } => {
                let nonce = nonce_for(version, self.bulk, iv.as_bytes(), &sequence);

                if version.is_tls13() {
                    // TLSInnerPlaintext: content || type, no padding
                    let mut buf = Vec::with_capacity(plaintext.len() + 1 + 16);
                    buf.extend_from_slice(plaintext);
                    buf.push(content_type.as_u8());
                    let aad = self.mac.authentication_block(
                        &sequence,
                        ContentType::ApplicationData,
                        buf.len() + self.bulk.tag_len(),
                    );
                    cipher.seal(&nonce, &aad, &mut buf).map_err(Error::crypto)?;
                    (ContentType::ApplicationData, buf)
                } else {
                    let aad =
                        self.mac
                            .authentication_block(&sequence, content_type, plaintext.len());
                    let mut buf = plaintext.to_vec();
                    cipher.seal(&nonce, &aad, &mut buf).map_err(Error::crypto)?;
                    let explicit = self.bulk.explicit_nonce_len();
                    let mut out = Vec::with_capacity(explicit + buf.len());
                    out.extend_from_slice(&sequence[8 - explicit..]);
                    out.extend_from_slice(&buf);
                    (content_type, out)
                }
            }
        };

        Ok(Protected {
            content_type: outer_type,
            sequence,
            fragment,
        })
    }

    /// Verify and decrypt one record.
    ///
    /// Any authentication failure is `bad_record_mac`, whatever the cause.
    pub fn decrypt(
        &mut self,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<Protected, Error> {
        let sequence = self.mac.next_sequence()?;
        let version = self.version();
        let mac_len = self.mac.mac_len();

        let (inner_type, plaintext) = match &mut self.mode {
            Mode::Null => {
                if fragment.len() < mac_len {
                    return Err(bad_record_mac());
                }
                let (data, mac) = fragment.split_at(fragment.len() - mac_len);
                let expected = self
                    .mac
                    .compute(&self.provider, &sequence, content_type, data)?;
                if !bool::from(expected.ct_eq(mac)) {
                    return Err(bad_record_mac());
                }
                (content_type, data.to_vec())
            }

            Mode::Block { cipher, iv } => {
                let block_len = cipher.block_len();
                let (record_iv, body) = if version.uses_explicit_iv() {
                    if fragment.len() < block_len {
                        return Err(bad_record_mac());
                    }
                    let (i, b) = fragment.split_at(block_len);
                    (i.to_vec(), b)
                } else {
                    (iv.clone(), fragment)
                };

                if body.is_empty() || body.len() % block_len != 0 || body.len() < mac_len + 1 {
                    return Err(bad_record_mac());
                }

                let mut data = body.to_vec();
                if !version.uses_explicit_iv() {
                    *iv = body[body.len() - block_len..].to_vec();
                }
                cipher
                    .decrypt_cbc(&record_iv, &mut data)
                    .map_err(|_| bad_record_mac())?;

                let (good, plain_len) = check_padding(version, &data, mac_len, block_len);
                let plain = &data[..plain_len];
                let expected = self
                    .mac
                    .compute(&self.provider, &sequence, content_type, plain)?;
                let mac_ok = expected.ct_eq(&data[plain_len..plain_len + mac_len]);
                if !bool::from(good & mac_ok) {
                    return Err(bad_record_mac());
                }
                (content_type, plain.to_vec())
            }

            Mode::Aead { cipher, iv } => {
                let nonce = nonce_for(version, self.bulk, iv.as_bytes(), &sequence);
                if version.is_tls13() {
                    let aad = self
                        .mac
                        .authentication_block(&sequence, content_type, fragment.len());
                    let mut buf = fragment.to_vec();
                    cipher.open(&nonce, &aad, &mut buf).map_err(|_| bad_record_mac())?;

                    // strip zero padding, the last non-zero byte is the real type
                    let Some(pos) = buf.iter().rposition(|b| *b != 0) else {
                        return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                    };
                    let inner = ContentType::from_u8(buf[pos]);
                    buf.truncate(pos);
                    (inner, buf)
                } else {
                    let explicit = self.bulk.explicit_nonce_len();
                    if fragment.len() < explicit + self.bulk.tag_len() {
                        return Err(bad_record_mac());
                    }
                    let (explicit_nonce, body) = fragment.split_at(explicit);
                    let nonce = if explicit > 0 {
                        let mut n = iv.as_bytes().to_vec();
                        n.extend_from_slice(explicit_nonce);
                        n
                    } else {
                        nonce
                    };
                    let plain_len = body.len() - self.bulk.tag_len();
                    let aad = self
                        .mac
                        .authentication_block(&sequence, content_type, plain_len);
                    let mut buf = body.to_vec();
                    cipher.open(&nonce, &aad, &mut buf).map_err(|_| bad_record_mac())?;
                    (content_type, buf)
                }
            }
        };

        Ok(Protected {
            content_type: inner_type,
            sequence,
            fragment: plaintext,
        })
    }
}

/// Nonce for record `sequence`.
///
/// TLS 1.2 GCM: salt || explicit nonce. Everything else: iv XOR padded sequence.
fn nonce_for(version: TlsVersion, bulk: BulkCipher, iv: &[u8], sequence: &[u8; 8]) -> Vec<u8> {
    if !version.is_tls13() && bulk.explicit_nonce_len() > 0 {
        let mut nonce = iv.to_vec();
        nonce.extend_from_slice(sequence);
        return nonce;
    }
    let mut nonce = iv.to_vec();
    let offset = nonce.len().saturating_sub(8);
    for (n, s) in nonce[offset..].iter_mut().zip(sequence.iter()) {
        *n ^= s;
    }
    nonce
}

/// Check CBC padding without branching on secret data.
///
/// Returns whether the padding is valid and the plaintext length. With bad
/// padding the length assumes no padding so the MAC is still computed.
fn check_padding(
    version: TlsVersion,
    data: &[u8],
    mac_len: usize,
    block_len: usize,
) -> (subtle::Choice, usize) {
    let len = data.len();
    let pad = data[len - 1];
    let max_pad = (len - mac_len - 1) as u32;

    // pad_len + 1 bytes of padding must fit after the MAC
    let fits = !max_pad.ct_lt(&(pad as u32));
    let mut good = fits;

    if version == TlsVersion::Ssl30 {
        // SSL 3.0 padding content is arbitrary, but it is shorter than a block
        good &= (pad as u32).ct_lt(&(block_len as u32));
    } else {
        // every padding byte equals the padding length
        let check_len = len.min(256);
        for i in 1..check_len {
            let in_pad = !(pad as u32).ct_lt(&(i as u32));
            let byte_ok = data[len - 1 - i].ct_eq(&pad);
            good &= !in_pad | byte_ok;
        }
    }

    let pad_total = u32::conditional_select(&0, &(pad as u32 + 1), good);
    let plain_len = len - mac_len - pad_total as usize;
    (good, plain_len)
}
