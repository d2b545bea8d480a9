//! Record cipher primitives using RustCrypto.

use aes::{Aes128, Aes256};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::ChaCha20Poly1305;
use des::Des;

use crate::crypto::provider::{AeadCipher, BlockCipher, CipherProvider};
use crate::types::BulkCipher;

/// AEAD cipher implementation using RustCrypto.
enum RustCryptoAead {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl std::fmt::Debug for RustCryptoAead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RustCryptoAead::Aes128Gcm(_) => f.debug_tuple("RustCryptoAead::Aes128Gcm").finish(),
            RustCryptoAead::Aes256Gcm(_) => f.debug_tuple("RustCryptoAead::Aes256Gcm").finish(),
            RustCryptoAead::ChaCha20Poly1305(_) => {
                f.debug_tuple("RustCryptoAead::ChaCha20Poly1305").finish()
            }
        }
    }
}

impl RustCryptoAead {
    fn new(cipher: BulkCipher, key: &[u8]) -> Result<Self, String> {
        let bad_key = |_| format!("Invalid key size for {:?}: {}", cipher, key.len());
        Ok(match cipher {
            BulkCipher::Aes128Gcm => {
                RustCryptoAead::Aes128Gcm(Box::new(Aes128Gcm::new_from_slice(key).map_err(bad_key)?))
            }
            BulkCipher::Aes256Gcm => {
                RustCryptoAead::Aes256Gcm(Box::new(Aes256Gcm::new_from_slice(key).map_err(bad_key)?))
            }
            BulkCipher::ChaCha20Poly1305 => RustCryptoAead::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new_from_slice(key).map_err(bad_key)?,
            )),
            _ => return Err(format!("Not an AEAD cipher: {:?}", cipher)),
        })
    }
}

impl AeadCipher for RustCryptoAead {
    fn seal(&self, nonce: &[u8], aad: &[u8], buf: &mut Vec<u8>) -> Result<(), String> {
        if nonce.len() != 12 {
            return Err(format!("Invalid nonce length: expected 12, got {}", nonce.len()));
        }
        let nonce = GenericArray::from_slice(nonce);
        let res = match self {
            RustCryptoAead::Aes128Gcm(c) => c.encrypt_in_place(nonce, aad, buf),
            RustCryptoAead::Aes256Gcm(c) => c.encrypt_in_place(nonce, aad, buf),
            RustCryptoAead::ChaCha20Poly1305(c) => c.encrypt_in_place(nonce, aad, buf),
        };
        res.map_err(|_| "AEAD encryption failed".to_string())
    }

    fn open(&self, nonce: &[u8], aad: &[u8], buf: &mut Vec<u8>) -> Result<(), String> {
        if nonce.len() != 12 {
            return Err(format!("Invalid nonce length: expected 12, got {}", nonce.len()));
        }
        if buf.len() < 16 {
            return Err(format!("Ciphertext too short: {}", buf.len()));
        }
        let nonce = GenericArray::from_slice(nonce);
        // decrypt_in_place removes the tag and shortens the buffer
        let res = match self {
            RustCryptoAead::Aes128Gcm(c) => c.decrypt_in_place(nonce, aad, buf),
            RustCryptoAead::Aes256Gcm(c) => c.decrypt_in_place(nonce, aad, buf),
            RustCryptoAead::ChaCha20Poly1305(c) => c.decrypt_in_place(nonce, aad, buf),
        };
        res.map_err(|_| "AEAD decryption failed".to_string())
    }
}

/// CBC block cipher. Keeps the key only; each call chains from the given IV.
enum RustCryptoCbc {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
    Des([u8; 8]),
}

impl std::fmt::Debug for RustCryptoCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RustCryptoCbc::Aes128(_) => f.debug_tuple("RustCryptoCbc::Aes128").finish(),
            RustCryptoCbc::Aes256(_) => f.debug_tuple("RustCryptoCbc::Aes256").finish(),
            RustCryptoCbc::Des(_) => f.debug_tuple("RustCryptoCbc::Des").finish(),
        }
    }
}

impl Drop for RustCryptoCbc {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        match self {
            RustCryptoCbc::Aes128(k) => k.zeroize(),
            RustCryptoCbc::Aes256(k) => k.zeroize(),
            RustCryptoCbc::Des(k) => k.zeroize(),
        }
    }
}

impl RustCryptoCbc {
    fn new(cipher: BulkCipher, key: &[u8]) -> Result<Self, String> {
        let bad_key = |_| format!("Invalid key size for {:?}: {}", cipher, key.len());
        Ok(match cipher {
            BulkCipher::Aes128Cbc => RustCryptoCbc::Aes128(key.try_into().map_err(bad_key)?),
            BulkCipher::Aes256Cbc => RustCryptoCbc::Aes256(key.try_into().map_err(bad_key)?),
            BulkCipher::DesCbc | BulkCipher::Des40Cbc => {
                RustCryptoCbc::Des(key.try_into().map_err(bad_key)?)
            }
            _ => return Err(format!("Not a CBC cipher: {:?}", cipher)),
        })
    }
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), String>
where
    cbc::Encryptor<C>: KeyIvInit + BlockEncryptMut,
    C: cbc::cipher::BlockEncryptMut + cbc::cipher::BlockCipher,
{
    let len = data.len();
    cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| "Invalid CBC key or IV length".to_string())?
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| "CBC input not block aligned".to_string())?;
    Ok(())
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), String>
where
    cbc::Decryptor<C>: KeyIvInit + BlockDecryptMut,
    C: cbc::cipher::BlockDecryptMut + cbc::cipher::BlockCipher,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| "Invalid CBC key or IV length".to_string())?
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| "CBC input not block aligned".to_string())?;
    Ok(())
}

impl BlockCipher for RustCryptoCbc {
    fn block_len(&self) -> usize {
        match self {
            RustCryptoCbc::Des(_) => 8,
            _ => 16,
        }
    }

    fn encrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        match self {
            RustCryptoCbc::Aes128(k) => cbc_encrypt::<Aes128>(k, iv, data),
            RustCryptoCbc::Aes256(k) => cbc_encrypt::<Aes256>(k, iv, data),
            RustCryptoCbc::Des(k) => cbc_encrypt::<Des>(k, iv, data),
        }
    }

    fn decrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        match self {
            RustCryptoCbc::Aes128(k) => cbc_decrypt::<Aes128>(k, iv, data),
            RustCryptoCbc::Aes256(k) => cbc_decrypt::<Aes256>(k, iv, data),
            RustCryptoCbc::Des(k) => cbc_decrypt::<Des>(k, iv, data),
        }
    }
}

/// Cipher provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoCipherProvider;

impl CipherProvider for RustCryptoCipherProvider {
    fn supports(&self, cipher: BulkCipher) -> bool {
        !matches!(cipher, BulkCipher::KuznyechikCtr)
    }

    fn create_aead(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn AeadCipher>, String> {
        Ok(Box::new(RustCryptoAead::new(cipher, key)?))
    }

    fn create_block(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn BlockCipher>, String> {
        Ok(Box::new(RustCryptoCbc::new(cipher, key)?))
    }
}

/// Static instance of the cipher provider.
pub(super) static CIPHER_PROVIDER: RustCryptoCipherProvider = RustCryptoCipherProvider;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cbc_chains_across_calls() {
        let c = CIPHER_PROVIDER
            .create_block(BulkCipher::Aes128Cbc, &[7; 16])
            .unwrap();
        let iv = [1u8; 16];

        let mut whole = [0x42u8; 32];
        c.encrypt_cbc(&iv, &mut whole).unwrap();

        // Encrypting the second block with the first ciphertext block as IV
        // gives the same result as one call over both blocks.
        let mut first = [0x42u8; 16];
        c.encrypt_cbc(&iv, &mut first).unwrap();
        let mut second = [0x42u8; 16];
        c.encrypt_cbc(&first, &mut second).unwrap();
        assert_eq!(&whole[..16], &first);
        assert_eq!(&whole[16..], &second);

        c.decrypt_cbc(&iv, &mut whole).unwrap();
        assert_eq!(whole, [0x42; 32]);
    }

    #[test]
    fn aead_rejects_tampering() {
        let c = CIPHER_PROVIDER
            .create_aead(BulkCipher::ChaCha20Poly1305, &[3; 32])
            .unwrap();
        let mut buf = b"hello".to_vec();
        c.seal(&[0; 12], b"aad", &mut buf).unwrap();
        assert_eq!(buf.len(), 5 + 16);
        buf[0] ^= 1;
        assert!(c.open(&[0; 12], b"aad", &mut buf).is_err());
    }
}
