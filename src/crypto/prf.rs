//! Pseudo random functions of SSL 3.0 and TLS 1.0 to 1.2.

use crate::crypto::provider::{CryptoProvider, HmacProvider};
use crate::secret::Secret;
use crate::types::{HashAlgorithm, TlsVersion};
use crate::Error;

pub const LABEL_MASTER_SECRET: &[u8] = b"master secret";
pub const LABEL_EXTENDED_MASTER_SECRET: &[u8] = b"extended master secret";
pub const LABEL_KEY_EXPANSION: &[u8] = b"key expansion";
pub const LABEL_CLIENT_FINISHED: &[u8] = b"client finished";
pub const LABEL_SERVER_FINISHED: &[u8] = b"server finished";
pub const LABEL_CLIENT_WRITE_KEY: &[u8] = b"client write key";
pub const LABEL_SERVER_WRITE_KEY: &[u8] = b"server write key";
pub const LABEL_IV_BLOCK: &[u8] = b"IV block";

/// P_hash(secret, seed) from RFC 5246 Section 5.
///
/// `seed` is given in parts so label and randoms need not be concatenated first.
fn p_hash(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    seed: &[&[u8]],
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut result = Vec::with_capacity(output_len + hash.output_len());

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = hmac.hmac(hash, secret, seed).map_err(Error::crypto)?;

    while result.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        let mut parts: Vec<&[u8]> = Vec::with_capacity(seed.len() + 1);
        parts.push(&a);
        parts.extend_from_slice(seed);
        let output = hmac.hmac(hash, secret, &parts).map_err(Error::crypto)?;
        result.extend_from_slice(&output);

        if result.len() < output_len {
            // A(i+1) = HMAC_hash(secret, A(i))
            a = hmac.hmac(hash, secret, &[&a]).map_err(Error::crypto)?;
        }
    }

    result.truncate(output_len);
    Ok(result)
}

/// PRF for TLS 1.2, as specified in RFC 5246 Section 5.
///
/// PRF(secret, label, seed) = P_<hash>(secret, label + seed)
pub fn prf_tls12(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    p_hash(hmac, hash, secret, &[label, seed], output_len).map(Secret::new)
}

/// PRF for TLS 1.0 and 1.1, as specified in RFC 2246 Section 5.
///
/// The secret is split in two halves (sharing the middle byte when its length is odd).
/// PRF = P_MD5(S1, label + seed) XOR P_SHA-1(S2, label + seed)
pub fn prf_tls10(
    hmac: &dyn HmacProvider,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut md5 = p_hash(hmac, HashAlgorithm::MD5, s1, &[label, seed], output_len)?;
    let sha1 = p_hash(hmac, HashAlgorithm::SHA1, s2, &[label, seed], output_len)?;
    for (x, y) in md5.iter_mut().zip(sha1.iter()) {
        *x ^= y;
    }
    Ok(Secret::new(md5))
}

/// The SSL 3.0 key derivation.
///
/// MD5(secret + SHA1("A" + secret + seed)) + MD5(secret + SHA1("BB" + secret + seed)) + ...
pub fn ssl3_expand(
    provider: &CryptoProvider,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    let mut result = Vec::with_capacity(output_len + 16);
    let mut round = 0_u8;
    while result.len() < output_len {
        // The salt is at most 26 letters, which is plenty for any key block.
        if round >= 26 {
            return Err(Error::crypto("SSL 3.0 key block too long"));
        }
        let salt = vec![b'A' + round; round as usize + 1];
        let inner = provider
            .digest(HashAlgorithm::SHA1, &[&salt, secret, seed])
            .map_err(Error::crypto)?;
        let outer = provider
            .digest(HashAlgorithm::MD5, &[secret, &inner])
            .map_err(Error::crypto)?;
        result.extend_from_slice(&outer);
        round += 1;
    }
    result.truncate(output_len);
    Ok(Secret::new(result))
}

/// The PRF in effect for a negotiated version.
///
/// SSL 3.0 has no labelled PRF; callers use [`ssl3_expand`] there.
pub fn prf(
    provider: &CryptoProvider,
    version: TlsVersion,
    prf_hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    match version.stream_equivalent() {
        TlsVersion::Ssl30 => Err(crate::InternalError::Unsupported("SSL 3.0 labelled PRF").into()),
        TlsVersion::Tls10 | TlsVersion::Tls11 => {
            prf_tls10(provider.hmac_provider, secret, label, seed, output_len)
        }
        _ => prf_tls12(provider.hmac_provider, prf_hash, secret, label, seed, output_len),
    }
}

/// Master secret from the premaster secret (RFC 5246 Section 8.1, RFC 7627 and SSL 3.0).
///
/// With `session_hash` the extended master secret is derived instead.
pub fn master_secret(
    provider: &CryptoProvider,
    version: TlsVersion,
    prf_hash: HashAlgorithm,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    session_hash: Option<&[u8]>,
) -> Result<Secret, Error> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    if version == TlsVersion::Ssl30 {
        return ssl3_expand(provider, pre_master_secret, &seed, 48);
    }

    match session_hash {
        Some(hash) => prf(
            provider,
            version,
            prf_hash,
            pre_master_secret,
            LABEL_EXTENDED_MASTER_SECRET,
            hash,
            48,
        ),
        None => prf(
            provider,
            version,
            prf_hash,
            pre_master_secret,
            LABEL_MASTER_SECRET,
            &seed,
            48,
        ),
    }
}

/// Key block, as specified in RFC 5246 Section 6.3.
///
/// key_block = PRF(master_secret, "key expansion", server_random + client_random)
pub fn key_block(
    provider: &CryptoProvider,
    version: TlsVersion,
    prf_hash: HashAlgorithm,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    output_len: usize,
) -> Result<Secret, Error> {
    // For key expansion, the seed is server_random + client_random
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    if version == TlsVersion::Ssl30 {
        return ssl3_expand(provider, master_secret, &seed, output_len);
    }
    prf(
        provider,
        version,
        prf_hash,
        master_secret,
        LABEL_KEY_EXPANSION,
        &seed,
        output_len,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    const SECRET: [u8; 16] = [
        0x9b, 0xbe, 0x43, 0x6b, 0xa9, 0x40, 0xf0, 0x17, 0xb1, 0x76, 0x52, 0x84, 0x9a, 0x71, 0xdb,
        0x35,
    ];
    const SEED: [u8; 16] = [
        0xa0, 0xba, 0x9f, 0x93, 0x6c, 0xda, 0x31, 0x18, 0x27, 0xa6, 0xf7, 0x96, 0xff, 0xd5, 0x19,
        0x8c,
    ];

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn tls12_sha256_vector() {
        let p = default_provider();
        let out = prf_tls12(
            p.hmac_provider,
            HashAlgorithm::SHA256,
            &SECRET,
            b"test label",
            &SEED,
            100,
        )
        .unwrap();
        assert_eq!(
            out.as_bytes(),
            &hex(
                "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
                 6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
                 4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
                 87347b66"
            )[..]
        );
    }

    #[test]
    fn tls10_md5_sha1_vector() {
        let p = default_provider();
        let out = prf_tls10(p.hmac_provider, &SECRET, b"test label", &SEED, 40).unwrap();
        assert_eq!(
            out.as_bytes(),
            &hex(
                "661740e6f98bc901efd2738502a71c03f76dd2f86298549b1148eff06714cf0f\
                 6b7c532cd8c69f15"
            )[..]
        );
    }

    #[test]
    fn tls10_odd_secret_shares_middle_byte() {
        let p = default_provider();
        let secret: Vec<u8> = (1..50).collect();
        let out = prf_tls10(p.hmac_provider, &secret, LABEL_MASTER_SECRET, &[0; 64], 48).unwrap();
        assert_eq!(
            out.as_bytes(),
            &hex(
                "d53190fd84257a4c883b20db30ef50acc8c16abc19368b28d8f7b12f6ca34b76\
                 883f3868729a32ae4e77e081dc79c64f"
            )[..]
        );
    }

    #[test]
    fn ssl3_vector() {
        let p = default_provider();
        let mut seed = vec![1; 32];
        seed.extend_from_slice(&[2; 32]);
        let out = ssl3_expand(&p, &[0x42; 48], &seed, 40).unwrap();
        assert_eq!(
            out.as_bytes(),
            &hex(
                "843752e613889d96bc3575ae792cfb07746da3f9d7c7e192fd9ca4af15331b8d\
                 f274de457e148091"
            )[..]
        );
    }

    #[test]
    fn key_block_is_deterministic() {
        let p = default_provider();
        let a = key_block(&p, TlsVersion::Tls12, HashAlgorithm::SHA256, &[7; 48], &[1; 32], &[2; 32], 72)
            .unwrap();
        let b = key_block(&p, TlsVersion::Tls12, HashAlgorithm::SHA256, &[7; 48], &[1; 32], &[2; 32], 72)
            .unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 72);

        let dtls = key_block(&p, TlsVersion::Dtls12, HashAlgorithm::SHA256, &[7; 48], &[1; 32], &[2; 32], 72)
            .unwrap();
        assert_eq!(a.as_bytes(), dtls.as_bytes());
    }

    #[test]
    fn ssl3_has_no_labelled_prf() {
        let p = default_provider();
        assert!(prf(&p, TlsVersion::Ssl30, HashAlgorithm::SHA256, &[1], b"x", &[], 4).is_err());
    }
}
