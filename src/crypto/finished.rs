//! Finished verify data for every protocol generation.

use crate::context::Role;
use crate::crypto::hash::Transcript;
use crate::crypto::prf::{self, LABEL_CLIENT_FINISHED, LABEL_SERVER_FINISHED};
use crate::crypto::provider::CryptoProvider;
use crate::crypto::KeySchedule;
use crate::types::{HashAlgorithm, TlsVersion};
use crate::Error;

/// Finished length before TLS 1.3 (SSL 3.0 excepted).
pub const VERIFY_DATA_LEN: usize = 12;

const SSL3_SENDER_CLIENT: &[u8] = b"CLNT";
const SSL3_SENDER_SERVER: &[u8] = b"SRVR";

/// SSL 3.0 Finished: MD5 and SHA-1 keyed hashes over the handshake messages.
///
/// hash(master + pad2 + hash(handshake_messages + sender + master + pad1))
pub fn ssl3_verify_data(
    provider: &CryptoProvider,
    sender: Role,
    master_secret: &[u8],
    handshake_messages: &[u8],
) -> Result<Vec<u8>, Error> {
    let sender = match sender {
        Role::Client => SSL3_SENDER_CLIENT,
        Role::Server => SSL3_SENDER_SERVER,
    };

    let mut out = Vec::with_capacity(36);
    for (hash, pad_len) in [(HashAlgorithm::MD5, 48), (HashAlgorithm::SHA1, 40)] {
        let pad1 = vec![0x36; pad_len];
        let pad2 = vec![0x5c; pad_len];
        let inner = provider
            .digest(hash, &[handshake_messages, sender, master_secret, &pad1])
            .map_err(Error::crypto)?;
        let outer = provider
            .digest(hash, &[master_secret, &pad2, &inner])
            .map_err(Error::crypto)?;
        out.extend_from_slice(&outer);
    }
    Ok(out)
}

/// Verify data of the Finished sent by `sender`, over the transcript so far.
///
/// TLS 1.0 and 1.1 use PRF(master, label, MD5(hs) + SHA1(hs)), TLS 1.2 the
/// suite hash of the transcript in place of the MD5/SHA-1 pair.
pub fn legacy_verify_data(
    provider: &CryptoProvider,
    version: TlsVersion,
    prf_hash: HashAlgorithm,
    sender: Role,
    master_secret: &[u8],
    transcript: &Transcript,
) -> Result<Vec<u8>, Error> {
    if version.stream_equivalent() == TlsVersion::Ssl30 {
        return ssl3_verify_data(provider, sender, master_secret, transcript.messages());
    }

    let label = match sender {
        Role::Client => LABEL_CLIENT_FINISHED,
        Role::Server => LABEL_SERVER_FINISHED,
    };
    let session_hash = transcript.session_hash()?;
    let out = prf::prf(
        provider,
        version,
        prf_hash,
        master_secret,
        label,
        &session_hash,
        VERIFY_DATA_LEN,
    )?;
    Ok(out.as_bytes().to_vec())
}

/// TLS 1.3 Finished keyed with the sender's handshake traffic secret.
pub fn tls13_verify_data(
    schedule: &KeySchedule,
    traffic_secret: &[u8],
    transcript: &Transcript,
) -> Result<Vec<u8>, Error> {
    let hash = transcript.current(schedule.hash())?;
    schedule.finished_verify_data(traffic_secret, &hash)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn transcript(version: TlsVersion, hash: Option<HashAlgorithm>) -> Transcript {
        let p = default_provider();
        let mut t = Transcript::new();
        t.update(&[1, 0, 0, 2, 0xAA, 0xBB]);
        t.start(&p, version, hash).unwrap();
        t.update(&[2, 0, 0, 1, 0xCC]);
        t
    }

    #[test]
    fn ssl3_is_36_bytes_and_sender_bound() {
        let p = default_provider();
        let client = ssl3_verify_data(&p, Role::Client, &[3; 48], b"messages").unwrap();
        let server = ssl3_verify_data(&p, Role::Server, &[3; 48], b"messages").unwrap();
        assert_eq!(client.len(), 36);
        assert_ne!(client, server);
    }

    #[test]
    fn tls12_uses_the_suite_hash() {
        let p = default_provider();
        let t = transcript(TlsVersion::Tls12, Some(HashAlgorithm::SHA256));
        let got = legacy_verify_data(
            &p,
            TlsVersion::Tls12,
            HashAlgorithm::SHA256,
            Role::Server,
            &[9; 48],
            &t,
        )
        .unwrap();

        let hash = p.digest(HashAlgorithm::SHA256, &[t.messages()]).unwrap();
        let expected = prf::prf_tls12(
            p.hmac_provider,
            HashAlgorithm::SHA256,
            &[9; 48],
            LABEL_SERVER_FINISHED,
            &hash,
            12,
        )
        .unwrap();
        assert_eq!(got, expected.as_bytes());
    }

    #[test]
    fn tls10_uses_md5_and_sha1() {
        let p = default_provider();
        let t = transcript(TlsVersion::Tls10, None);
        let got = legacy_verify_data(
            &p,
            TlsVersion::Tls10,
            HashAlgorithm::SHA256,
            Role::Client,
            &[9; 48],
            &t,
        )
        .unwrap();

        let mut seed = p.digest(HashAlgorithm::MD5, &[t.messages()]).unwrap();
        seed.extend(p.digest(HashAlgorithm::SHA1, &[t.messages()]).unwrap());
        let expected =
            prf::prf_tls10(p.hmac_provider, &[9; 48], LABEL_CLIENT_FINISHED, &seed, 12).unwrap();
        assert_eq!(got, expected.as_bytes());
    }

    #[test]
    fn tls13_is_hash_length() {
        let p = default_provider();
        let schedule = KeySchedule::new(&p, HashAlgorithm::SHA384, false).unwrap();
        let t = transcript(TlsVersion::Tls13, Some(HashAlgorithm::SHA384));
        let data = tls13_verify_data(&schedule, &[5; 48], &t).unwrap();
        assert_eq!(data.len(), 48);
    }
}
