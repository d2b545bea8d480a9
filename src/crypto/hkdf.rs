//! HKDF (RFC 5869) and the TLS 1.3 HKDF-Expand-Label.

use crate::crypto::provider::HmacProvider;
use crate::secret::Secret;
use crate::types::HashAlgorithm;
use crate::Error;

/// HKDF-Extract(salt, IKM). An empty salt means a string of zeros.
pub fn extract(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    salt: &[u8],
    ikm: &[u8],
) -> Result<Secret, Error> {
    let zeros;
    let salt = if salt.is_empty() {
        zeros = vec![0; hash.output_len()];
        &zeros[..]
    } else {
        salt
    };
    hmac.hmac(hash, salt, &[ikm])
        .map(Secret::new)
        .map_err(Error::crypto)
}

/// HKDF-Expand(PRK, info, L).
pub fn expand(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    prk: &[u8],
    info: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    if output_len > 255 * hash.output_len() {
        return Err(Error::crypto("HKDF output too long"));
    }

    let mut out = Vec::with_capacity(output_len + hash.output_len());
    let mut t: Vec<u8> = Vec::new();
    let mut counter = 1_u8;
    while out.len() < output_len {
        // T(i) = HMAC(PRK, T(i-1) | info | i)
        t = hmac
            .hmac(hash, prk, &[&t, info, &[counter]])
            .map_err(Error::crypto)?;
        out.extend_from_slice(&t);
        counter = counter.wrapping_add(1);
    }
    out.truncate(output_len);
    Ok(Secret::new(out))
}

/// HKDF-Expand-Label from RFC 8446 Section 7.1.
///
/// DTLS 1.3 replaces the "tls13 " label prefix by "dtls13" (RFC 9147 Section 5.9).
pub fn expand_label(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    output_len: usize,
    datagram: bool,
) -> Result<Secret, Error> {
    let prefix: &[u8] = if datagram { b"dtls13" } else { b"tls13 " };

    // struct {
    //     uint16 length = Length;
    //     opaque label<7..255> = "tls13 " + Label;
    //     opaque context<0..255> = Context;
    // } HkdfLabel;
    let mut info = Vec::with_capacity(4 + prefix.len() + label.len() + context.len());
    info.extend_from_slice(&(output_len as u16).to_be_bytes());
    info.push((prefix.len() + label.len()) as u8);
    info.extend_from_slice(prefix);
    info.extend_from_slice(label);
    info.push(context.len() as u8);
    info.extend_from_slice(context);

    expand(hmac, hash, secret, &info, output_len)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    #[test]
    fn rfc5869_case_1() {
        let p = default_provider();
        let salt: Vec<u8> = (0..13).collect();
        let info: Vec<u8> = (0xf0..0xfa).collect();
        let prk = extract(p.hmac_provider, HashAlgorithm::SHA256, &salt, &[0x0b; 22]).unwrap();
        assert_eq!(
            prk.as_bytes(),
            [
                0x07, 0x77, 0x09, 0x36, 0x2c, 0x2e, 0x32, 0xdf, 0x0d, 0xdc, 0x3f, 0x0d, 0xc4, 0x7b,
                0xba, 0x63, 0x90, 0xb6, 0xc7, 0x3b, 0xb5, 0x0f, 0x9c, 0x31, 0x22, 0xec, 0x84, 0x4a,
                0xd7, 0xc2, 0xb3, 0xe5
            ]
        );
        let okm = expand(p.hmac_provider, HashAlgorithm::SHA256, prk.as_bytes(), &info, 42)
            .unwrap();
        assert_eq!(
            okm.as_bytes(),
            [
                0x3c, 0xb2, 0x5f, 0x25, 0xfa, 0xac, 0xd5, 0x7a, 0x90, 0x43, 0x4f, 0x64, 0xd0, 0x36,
                0x2f, 0x2a, 0x2d, 0x2d, 0x0a, 0x90, 0xcf, 0x1a, 0x5a, 0x4c, 0x5d, 0xb0, 0x2d, 0x56,
                0xec, 0xc4, 0xc5, 0xbf, 0x34, 0x00, 0x72, 0x08, 0xd5, 0xb8, 0x87, 0x18, 0x58, 0x65
            ]
        );
    }

    #[test]
    fn rejects_overlong_output() {
        let p = default_provider();
        assert!(expand(p.hmac_provider, HashAlgorithm::SHA256, &[1; 32], &[], 255 * 32 + 1).is_err());
    }
}
