//! HMAC using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

fn hmac_parts<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, String> {
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|_| "Invalid HMAC key length".to_string())?;
    for p in parts {
        mac.update(p);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(&self, hash: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, String> {
        match hash {
            HashAlgorithm::MD5 => hmac_parts::<Hmac<Md5>>(key, parts),
            HashAlgorithm::SHA1 => hmac_parts::<Hmac<Sha1>>(key, parts),
            HashAlgorithm::SHA224 => hmac_parts::<Hmac<Sha224>>(key, parts),
            HashAlgorithm::SHA256 => hmac_parts::<Hmac<Sha256>>(key, parts),
            HashAlgorithm::SHA384 => hmac_parts::<Hmac<Sha384>>(key, parts),
            HashAlgorithm::SHA512 => hmac_parts::<Hmac<Sha512>>(key, parts),
            _ => Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
        }
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rfc4231_case_2() {
        let out = HMAC_PROVIDER
            .hmac(
                HashAlgorithm::SHA256,
                b"Jefe",
                &[b"what do ya want ", b"for nothing?"],
            )
            .unwrap();
        assert_eq!(
            out,
            [
                0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
                0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
                0x64, 0xec, 0x38, 0x43
            ]
        );
    }
}
