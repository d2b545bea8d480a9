//! Turns negotiated secrets into installed record ciphers.
//!
//! Before TLS 1.3 a single key block is expanded from the master secret and
//! sliced into the keys of both directions. TLS 1.3 derives each direction
//! from its own traffic secret.

use crate::context::Role;
use crate::crypto::cipher::RecordCipher;
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::mac::ExchangeMac;
use crate::crypto::prf;
use crate::crypto::provider::CryptoProvider;
use crate::secret::Secret;
use crate::types::{CipherSuiteParams, HashAlgorithm, TlsVersion};
use crate::Error;

/// Export ciphers expand a 40 bit key into a full DES key.
const EXPORT_KEY_LEN: usize = 8;

/// Keys of one direction, sliced from the key block.
pub struct DirectionKeys {
    pub mac_key: Secret,
    pub key: Secret,
    pub iv: Vec<u8>,
}

impl std::fmt::Debug for DirectionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionKeys")
            .field("mac_key", &self.mac_key)
            .field("key", &self.key)
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

/// Length of the implicit IV taken from the key block.
///
/// AEAD ciphers take their salt or nonce mask. Block ciphers only take an IV
/// before TLS 1.1, later versions send it with each record.
pub fn key_block_iv_len(version: TlsVersion, params: &CipherSuiteParams) -> usize {
    let cipher = params.cipher;
    if cipher.is_aead() {
        cipher.fixed_iv_len()
    } else if cipher.is_block() && !version.uses_explicit_iv() {
        cipher.fixed_iv_len()
    } else {
        0
    }
}

/// Bytes of key block needed: `2 * (mac + key + iv)`.
///
/// Export suites derive their IVs separately and take none from the block.
pub fn key_block_len(version: TlsVersion, params: &CipherSuiteParams) -> usize {
    let iv = if params.cipher.is_export() {
        0
    } else {
        key_block_iv_len(version, params)
    };
    2 * (params.mac_len() + params.cipher.key_material_len() + iv)
}

/// Expand and slice the key block.
///
/// The block is consumed in order: client MAC, server MAC, client key,
/// server key, client IV, server IV.
pub fn derive_keys(
    provider: &CryptoProvider,
    version: TlsVersion,
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<(DirectionKeys, DirectionKeys), Error> {
    let len = key_block_len(version, params);
    let block = prf::key_block(
        provider,
        version,
        params.prf_hash,
        master_secret,
        client_random,
        server_random,
        len,
    )?;
    trace!("Key block of {} bytes for {:?}", len, params.suite);

    let mac_len = params.mac_len();
    let key_len = params.cipher.key_material_len();
    let iv_len = if params.cipher.is_export() {
        0
    } else {
        key_block_iv_len(version, params)
    };

    let b = block.as_bytes();
    let mut at = 0;
    let mut next = |n: usize| {
        let start = at;
        at += n;
        start..at
    };

    let client_mac = Secret::from_slice(&b[next(mac_len)]);
    let server_mac = Secret::from_slice(&b[next(mac_len)]);
    let client_key = b[next(key_len)].to_vec();
    let server_key = b[next(key_len)].to_vec();
    let client_iv = b[next(iv_len)].to_vec();
    let server_iv = b[next(iv_len)].to_vec();

    let (client_key, server_key, client_iv, server_iv) = if params.cipher.is_export() {
        export_keys(
            provider,
            version,
            params,
            &client_key,
            &server_key,
            client_random,
            server_random,
        )?
    } else {
        (
            Secret::new(client_key),
            Secret::new(server_key),
            client_iv,
            server_iv,
        )
    };
    block.destroy();

    Ok((
        DirectionKeys {
            mac_key: client_mac,
            key: client_key,
            iv: client_iv,
        },
        DirectionKeys {
            mac_key: server_mac,
            key: server_key,
            iv: server_iv,
        },
    ))
}

/// Final keys and IVs of the exportable suites.
///
/// SSL 3.0 hashes the short keys with the randoms using MD5. TLS 1.0 runs
/// them through the PRF and takes both IVs from one "IV block".
fn export_keys(
    provider: &CryptoProvider,
    version: TlsVersion,
    params: &CipherSuiteParams,
    client_key: &[u8],
    server_key: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<(Secret, Secret, Vec<u8>, Vec<u8>), Error> {
    let iv_len = params.cipher.fixed_iv_len();
    let md5 = |parts: &[&[u8]]| {
        provider
            .digest(HashAlgorithm::MD5, parts)
            .map_err(Error::crypto)
    };

    if version == TlsVersion::Ssl30 {
        let mut ck = md5(&[client_key, client_random, server_random])?;
        let mut sk = md5(&[server_key, server_random, client_random])?;
        ck.truncate(EXPORT_KEY_LEN);
        sk.truncate(EXPORT_KEY_LEN);
        let mut civ = md5(&[client_random, server_random])?;
        let mut siv = md5(&[server_random, client_random])?;
        civ.truncate(iv_len);
        siv.truncate(iv_len);
        return Ok((Secret::new(ck), Secret::new(sk), civ, siv));
    }

    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    let ck = prf::prf(
        provider,
        version,
        params.prf_hash,
        client_key,
        prf::LABEL_CLIENT_WRITE_KEY,
        &seed,
        EXPORT_KEY_LEN,
    )?;
    let sk = prf::prf(
        provider,
        version,
        params.prf_hash,
        server_key,
        prf::LABEL_SERVER_WRITE_KEY,
        &seed,
        EXPORT_KEY_LEN,
    )?;
    let iv_block = prf::prf(
        provider,
        version,
        params.prf_hash,
        &[],
        prf::LABEL_IV_BLOCK,
        &seed,
        2 * iv_len,
    )?;
    let (civ, siv) = iv_block.as_bytes().split_at(iv_len);
    Ok((ck, sk, civ.to_vec(), siv.to_vec()))
}

fn record_cipher(
    provider: &CryptoProvider,
    version: TlsVersion,
    params: &CipherSuiteParams,
    keys: DirectionKeys,
    epoch: u16,
) -> Result<RecordCipher, Error> {
    let mut mac = ExchangeMac::new(version, params.mac, keys.mac_key);
    mac.set_epoch(epoch);
    RecordCipher::new(provider, params.cipher, keys.key.as_bytes(), &keys.iv, mac)
}

/// Record ciphers for both directions from the master secret.
///
/// Returns (local write, remote read). Each direction is bound to its own
/// exchange MAC.
pub fn legacy_ciphers(
    provider: &CryptoProvider,
    version: TlsVersion,
    params: &CipherSuiteParams,
    role: Role,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<(RecordCipher, RecordCipher), Error> {
    let (client, server) = derive_keys(
        provider,
        version,
        params,
        master_secret,
        client_random,
        server_random,
    )?;

    let client = record_cipher(provider, version, params, client, 1)?;
    let server = record_cipher(provider, version, params, server, 1)?;

    Ok(match role {
        Role::Client => (client, server),
        Role::Server => (server, client),
    })
}

/// Record cipher keyed from a TLS 1.3 traffic secret.
pub fn traffic_cipher(
    provider: &CryptoProvider,
    version: TlsVersion,
    params: &CipherSuiteParams,
    schedule: &KeySchedule,
    traffic_secret: &Secret,
    epoch: u16,
) -> Result<RecordCipher, Error> {
    let (key, iv) = schedule.derive_traffic_keys(
        traffic_secret.as_bytes(),
        params.cipher.key_len(),
        params.cipher.nonce_len(),
    )?;
    let mut mac = ExchangeMac::new(version, None, Secret::new(Vec::new()));
    mac.set_epoch(epoch);
    let cipher = RecordCipher::new(provider, params.cipher, key.as_bytes(), iv.as_bytes(), mac)?;
    key.destroy();
    Ok(cipher)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::types::{CipherSuite, ContentType};

    fn params(suite: CipherSuite) -> CipherSuiteParams {
        suite.params().unwrap()
    }

    #[test]
    fn block_lengths() {
        // 2 * (20 mac + 16 key + 16 iv)
        let cbc = params(CipherSuite::RSA_AES128_CBC_SHA);
        assert_eq!(key_block_len(TlsVersion::Tls10, &cbc), 104);
        // explicit IVs from TLS 1.1
        assert_eq!(key_block_len(TlsVersion::Tls11, &cbc), 72);

        // 2 * (16 key + 4 salt)
        let gcm = params(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256);
        assert_eq!(key_block_len(TlsVersion::Tls12, &gcm), 40);

        // 2 * (32 key + 12 nonce)
        let chacha = params(CipherSuite::ECDHE_RSA_CHACHA20_POLY1305_SHA256);
        assert_eq!(key_block_len(TlsVersion::Tls12, &chacha), 88);

        // 2 * (20 mac + 5 key), IVs come from elsewhere
        let export = params(CipherSuite::RSA_EXPORT_DES40_CBC_SHA);
        assert_eq!(key_block_len(TlsVersion::Tls10, &export), 50);
    }

    #[test]
    fn slices_in_order() {
        let p = default_provider();
        let suite = params(CipherSuite::RSA_AES128_CBC_SHA);
        let master = [3u8; 48];
        let (c, s) = derive_keys(&p, TlsVersion::Tls10, &suite, &master, &[1; 32], &[2; 32])
            .unwrap();

        let block = prf::key_block(
            &p,
            TlsVersion::Tls10,
            suite.prf_hash,
            &master,
            &[1; 32],
            &[2; 32],
            104,
        )
        .unwrap();
        let b = block.as_bytes();
        assert_eq!(c.mac_key.as_bytes(), &b[0..20]);
        assert_eq!(s.mac_key.as_bytes(), &b[20..40]);
        assert_eq!(c.key.as_bytes(), &b[40..56]);
        assert_eq!(s.key.as_bytes(), &b[56..72]);
        assert_eq!(c.iv, &b[72..88]);
        assert_eq!(s.iv, &b[88..104]);
    }

    #[test]
    fn export_keys_expand() {
        let p = default_provider();
        let suite = params(CipherSuite::RSA_EXPORT_DES40_CBC_SHA);
        for version in [TlsVersion::Ssl30, TlsVersion::Tls10] {
            let (c, s) =
                derive_keys(&p, version, &suite, &[5; 48], &[1; 32], &[2; 32]).unwrap();
            assert_eq!(c.key.len(), 8);
            assert_eq!(s.key.len(), 8);
            assert_eq!(c.iv.len(), 8);
            assert_eq!(s.iv.len(), 8);
            assert_ne!(c.iv, s.iv);
        }
    }

    #[test]
    fn client_and_server_ciphers_pair_up() {
        let p = default_provider();
        let suite = params(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256);
        let master = [9u8; 48];
        let (cr, sr) = ([1u8; 32], [2u8; 32]);

        let (mut client_write, mut client_read) =
            legacy_ciphers(&p, TlsVersion::Tls12, &suite, Role::Client, &master, &cr, &sr).unwrap();
        let (mut server_write, mut server_read) =
            legacy_ciphers(&p, TlsVersion::Tls12, &suite, Role::Server, &master, &cr, &sr).unwrap();

        let rec = client_write
            .encrypt(ContentType::ApplicationData, b"ping")
            .unwrap();
        let out = server_read
            .decrypt(rec.content_type, &rec.fragment)
            .unwrap();
        assert_eq!(out.fragment, b"ping");

        let rec = server_write
            .encrypt(ContentType::ApplicationData, b"pong")
            .unwrap();
        let out = client_read
            .decrypt(rec.content_type, &rec.fragment)
            .unwrap();
        assert_eq!(out.fragment, b"pong");
    }

    #[test]
    fn tls13_traffic_cipher() {
        let p = default_provider();
        let suite = params(CipherSuite::TLS13_AES_128_GCM_SHA256);
        let mut ks = KeySchedule::new(&p, HashAlgorithm::SHA256, false).unwrap();
        let (c, _s) = ks.derive_handshake_secrets(&[4; 32], &[0; 32]).unwrap();

        let mut w = traffic_cipher(&p, TlsVersion::Tls13, &suite, &ks, &c, 0).unwrap();
        let mut r = traffic_cipher(&p, TlsVersion::Tls13, &suite, &ks, &c, 0).unwrap();
        let rec = w.encrypt(ContentType::Handshake, b"finished").unwrap();
        assert_eq!(rec.content_type, ContentType::ApplicationData);
        let out = r.decrypt(rec.content_type, &rec.fragment).unwrap();
        assert_eq!(out.content_type, ContentType::Handshake);
        assert_eq!(out.fragment, b"finished");
    }
}
