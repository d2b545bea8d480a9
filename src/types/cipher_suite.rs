//! Cipher suite registry.
//!
//! A [`CipherSuite`] is the wire id. [`CipherSuite::params`] resolves it to the
//! immutable descriptor holding the key exchange kind, the bulk cipher, the
//! record MAC and the PRF/transcript hash.

use nom::number::complete::be_u16;
use nom::IResult;

use super::{HashAlgorithm, TlsVersion};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    NULL_WITH_NULL_NULL,                  // 0x0000
    RSA_NULL_SHA,                         // 0x0002
    RSA_EXPORT_DES40_CBC_SHA,             // 0x0008
    KRB5_DES_CBC_SHA,                     // 0x001E
    RSA_AES128_CBC_SHA,                   // 0x002F
    DHE_RSA_AES128_CBC_SHA,               // 0x0033
    DH_ANON_AES128_CBC_SHA,               // 0x0034
    RSA_AES256_CBC_SHA,                   // 0x0035
    RSA_AES128_CBC_SHA256,                // 0x003C
    DHE_RSA_AES128_CBC_SHA256,            // 0x0067
    PSK_AES128_CBC_SHA,                   // 0x008C
    DHE_PSK_AES128_CBC_SHA,               // 0x0090
    RSA_AES128_GCM_SHA256,                // 0x009C
    RSA_AES256_GCM_SHA384,                // 0x009D
    DHE_RSA_AES128_GCM_SHA256,            // 0x009E
    PSK_AES128_GCM_SHA256,                // 0x00A8
    DHE_PSK_AES128_GCM_SHA256,            // 0x00AA
    EMPTY_RENEGOTIATION_INFO_SCSV,        // 0x00FF
    ECDH_ECDSA_AES128_CBC_SHA,            // 0xC004
    ECDHE_ECDSA_AES128_CBC_SHA,           // 0xC009
    ECDHE_RSA_AES128_CBC_SHA,             // 0xC013
    ECDH_ANON_AES128_CBC_SHA,             // 0xC018
    SRP_SHA_AES128_CBC_SHA,               // 0xC01D
    SRP_SHA_RSA_AES128_CBC_SHA,           // 0xC01E
    ECDHE_ECDSA_AES128_CBC_SHA256,        // 0xC023
    ECDHE_RSA_AES128_CBC_SHA256,          // 0xC027
    ECDHE_ECDSA_AES128_GCM_SHA256,        // 0xC02B
    ECDHE_ECDSA_AES256_GCM_SHA384,        // 0xC02C
    ECDHE_RSA_AES128_GCM_SHA256,          // 0xC02F
    ECDHE_RSA_AES256_GCM_SHA384,          // 0xC030
    ECDHE_PSK_AES128_CBC_SHA,             // 0xC035
    ECDHE_PSK_AES128_CBC_SHA256,          // 0xC037
    ECCPWD_AES128_GCM_SHA256,             // 0xC0B0
    GOSTR341112_256_KUZNYECHIK_CTR_OMAC,  // 0xC100
    ECDHE_RSA_CHACHA20_POLY1305_SHA256,   // 0xCCA8
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256, // 0xCCA9
    TLS13_AES_128_GCM_SHA256,             // 0x1301
    TLS13_AES_256_GCM_SHA384,             // 0x1302
    TLS13_CHACHA20_POLY1305_SHA256,       // 0x1303
    Unknown(u16),
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        use CipherSuite::*;
        match value {
            0x0000 => NULL_WITH_NULL_NULL,
            0x0002 => RSA_NULL_SHA,
            0x0008 => RSA_EXPORT_DES40_CBC_SHA,
            0x001E => KRB5_DES_CBC_SHA,
            0x002F => RSA_AES128_CBC_SHA,
            0x0033 => DHE_RSA_AES128_CBC_SHA,
            0x0034 => DH_ANON_AES128_CBC_SHA,
            0x0035 => RSA_AES256_CBC_SHA,
            0x003C => RSA_AES128_CBC_SHA256,
            0x0067 => DHE_RSA_AES128_CBC_SHA256,
            0x008C => PSK_AES128_CBC_SHA,
            0x0090 => DHE_PSK_AES128_CBC_SHA,
            0x009C => RSA_AES128_GCM_SHA256,
            0x009D => RSA_AES256_GCM_SHA384,
            0x009E => DHE_RSA_AES128_GCM_SHA256,
            0x00A8 => PSK_AES128_GCM_SHA256,
            0x00AA => DHE_PSK_AES128_GCM_SHA256,
            0x00FF => EMPTY_RENEGOTIATION_INFO_SCSV,
            0xC004 => ECDH_ECDSA_AES128_CBC_SHA,
            0xC009 => ECDHE_ECDSA_AES128_CBC_SHA,
            0xC013 => ECDHE_RSA_AES128_CBC_SHA,
            0xC018 => ECDH_ANON_AES128_CBC_SHA,
            0xC01D => SRP_SHA_AES128_CBC_SHA,
            0xC01E => SRP_SHA_RSA_AES128_CBC_SHA,
            0xC023 => ECDHE_ECDSA_AES128_CBC_SHA256,
            0xC027 => ECDHE_RSA_AES128_CBC_SHA256,
            0xC02B => ECDHE_ECDSA_AES128_GCM_SHA256,
            0xC02C => ECDHE_ECDSA_AES256_GCM_SHA384,
            0xC02F => ECDHE_RSA_AES128_GCM_SHA256,
            0xC030 => ECDHE_RSA_AES256_GCM_SHA384,
            0xC035 => ECDHE_PSK_AES128_CBC_SHA,
            0xC037 => ECDHE_PSK_AES128_CBC_SHA256,
            0xC0B0 => ECCPWD_AES128_GCM_SHA256,
            0xC100 => GOSTR341112_256_KUZNYECHIK_CTR_OMAC,
            0xCCA8 => ECDHE_RSA_CHACHA20_POLY1305_SHA256,
            0xCCA9 => ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            0x1301 => TLS13_AES_128_GCM_SHA256,
            0x1302 => TLS13_AES_256_GCM_SHA384,
            0x1303 => TLS13_CHACHA20_POLY1305_SHA256,
            _ => Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        use CipherSuite::*;
        match self {
            NULL_WITH_NULL_NULL => 0x0000,
            RSA_NULL_SHA => 0x0002,
            RSA_EXPORT_DES40_CBC_SHA => 0x0008,
            KRB5_DES_CBC_SHA => 0x001E,
            RSA_AES128_CBC_SHA => 0x002F,
            DHE_RSA_AES128_CBC_SHA => 0x0033,
            DH_ANON_AES128_CBC_SHA => 0x0034,
            RSA_AES256_CBC_SHA => 0x0035,
            RSA_AES128_CBC_SHA256 => 0x003C,
            DHE_RSA_AES128_CBC_SHA256 => 0x0067,
            PSK_AES128_CBC_SHA => 0x008C,
            DHE_PSK_AES128_CBC_SHA => 0x0090,
            RSA_AES128_GCM_SHA256 => 0x009C,
            RSA_AES256_GCM_SHA384 => 0x009D,
            DHE_RSA_AES128_GCM_SHA256 => 0x009E,
            PSK_AES128_GCM_SHA256 => 0x00A8,
            DHE_PSK_AES128_GCM_SHA256 => 0x00AA,
            EMPTY_RENEGOTIATION_INFO_SCSV => 0x00FF,
            ECDH_ECDSA_AES128_CBC_SHA => 0xC004,
            ECDHE_ECDSA_AES128_CBC_SHA => 0xC009,
            ECDHE_RSA_AES128_CBC_SHA => 0xC013,
            ECDH_ANON_AES128_CBC_SHA => 0xC018,
            SRP_SHA_AES128_CBC_SHA => 0xC01D,
            SRP_SHA_RSA_AES128_CBC_SHA => 0xC01E,
            ECDHE_ECDSA_AES128_CBC_SHA256 => 0xC023,
            ECDHE_RSA_AES128_CBC_SHA256 => 0xC027,
            ECDHE_ECDSA_AES128_GCM_SHA256 => 0xC02B,
            ECDHE_ECDSA_AES256_GCM_SHA384 => 0xC02C,
            ECDHE_RSA_AES128_GCM_SHA256 => 0xC02F,
            ECDHE_RSA_AES256_GCM_SHA384 => 0xC030,
            ECDHE_PSK_AES128_CBC_SHA => 0xC035,
            ECDHE_PSK_AES128_CBC_SHA256 => 0xC037,
            ECCPWD_AES128_GCM_SHA256 => 0xC0B0,
            GOSTR341112_256_KUZNYECHIK_CTR_OMAC => 0xC100,
            ECDHE_RSA_CHACHA20_POLY1305_SHA256 => 0xCCA8,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => 0xCCA9,
            TLS13_AES_128_GCM_SHA256 => 0x1301,
            TLS13_AES_256_GCM_SHA384 => 0x1302,
            TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
            Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    pub fn all() -> &'static [CipherSuite] {
        use CipherSuite::*;
        &[
            TLS13_AES_128_GCM_SHA256,
            TLS13_AES_256_GCM_SHA384,
            TLS13_CHACHA20_POLY1305_SHA256,
            ECDHE_ECDSA_AES128_GCM_SHA256,
            ECDHE_ECDSA_AES256_GCM_SHA384,
            ECDHE_RSA_AES128_GCM_SHA256,
            ECDHE_RSA_AES256_GCM_SHA384,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            ECDHE_RSA_CHACHA20_POLY1305_SHA256,
            ECDHE_ECDSA_AES128_CBC_SHA256,
            ECDHE_RSA_AES128_CBC_SHA256,
            ECDHE_ECDSA_AES128_CBC_SHA,
            ECDHE_RSA_AES128_CBC_SHA,
            ECDH_ECDSA_AES128_CBC_SHA,
            ECDH_ANON_AES128_CBC_SHA,
            DHE_RSA_AES128_GCM_SHA256,
            DHE_RSA_AES128_CBC_SHA256,
            DHE_RSA_AES128_CBC_SHA,
            DH_ANON_AES128_CBC_SHA,
            RSA_AES128_GCM_SHA256,
            RSA_AES256_GCM_SHA384,
            RSA_AES128_CBC_SHA256,
            RSA_AES128_CBC_SHA,
            RSA_AES256_CBC_SHA,
            RSA_NULL_SHA,
            RSA_EXPORT_DES40_CBC_SHA,
            PSK_AES128_GCM_SHA256,
            PSK_AES128_CBC_SHA,
            DHE_PSK_AES128_GCM_SHA256,
            DHE_PSK_AES128_CBC_SHA,
            ECDHE_PSK_AES128_CBC_SHA256,
            ECDHE_PSK_AES128_CBC_SHA,
            SRP_SHA_RSA_AES128_CBC_SHA,
            SRP_SHA_AES128_CBC_SHA,
            KRB5_DES_CBC_SHA,
            ECCPWD_AES128_GCM_SHA256,
            GOSTR341112_256_KUZNYECHIK_CTR_OMAC,
        ]
    }

    /// Signalling suites carry no parameters and are never negotiated.
    pub fn is_signalling(&self) -> bool {
        matches!(self, CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV) || self.is_grease()
    }

    pub fn is_grease(&self) -> bool {
        super::version::is_grease_u16(self.as_u16())
    }

    pub fn params(&self) -> Option<CipherSuiteParams> {
        use BulkCipher as B;
        use CipherSuite::*;
        use HashAlgorithm as H;
        use KeyExchangeKind as K;
        use TlsVersion::*;

        let p = |key_exchange, kx_type, authentication, cipher, mac, prf_hash, min, max| {
            Some(CipherSuiteParams {
                suite: *self,
                key_exchange,
                key_exchange_type: kx_type,
                authentication,
                cipher,
                mac,
                prf_hash,
                min_version: min,
                max_version: max,
            })
        };
        let eph = KeyExchangeType::Ephemeral;
        let stat = KeyExchangeType::Static;

        match self {
            NULL_WITH_NULL_NULL => p(K::None, stat, Auth::None, B::Null, None, H::SHA256, Ssl30, Tls12),
            RSA_NULL_SHA => p(K::Rsa, stat, Auth::Rsa, B::Null, Some(H::SHA1), H::SHA256, Ssl30, Tls12),
            RSA_EXPORT_DES40_CBC_SHA => p(K::Rsa, stat, Auth::Rsa, B::Des40Cbc, Some(H::SHA1), H::SHA256, Ssl30, Tls10),
            KRB5_DES_CBC_SHA => p(K::Krb5, eph, Auth::Krb5, B::DesCbc, Some(H::SHA1), H::SHA256, Ssl30, Tls11),
            RSA_AES128_CBC_SHA => p(K::Rsa, stat, Auth::Rsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Ssl30, Tls12),
            DHE_RSA_AES128_CBC_SHA => p(K::Dh, eph, Auth::Rsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Ssl30, Tls12),
            DH_ANON_AES128_CBC_SHA => p(K::Dh, eph, Auth::None, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Ssl30, Tls12),
            RSA_AES256_CBC_SHA => p(K::Rsa, stat, Auth::Rsa, B::Aes256Cbc, Some(H::SHA1), H::SHA256, Ssl30, Tls12),
            RSA_AES128_CBC_SHA256 => p(K::Rsa, stat, Auth::Rsa, B::Aes128Cbc, Some(H::SHA256), H::SHA256, Tls12, Tls12),
            DHE_RSA_AES128_CBC_SHA256 => p(K::Dh, eph, Auth::Rsa, B::Aes128Cbc, Some(H::SHA256), H::SHA256, Tls12, Tls12),
            PSK_AES128_CBC_SHA => p(K::Psk, eph, Auth::Psk, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            RSA_AES128_GCM_SHA256 => p(K::Rsa, stat, Auth::Rsa, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            RSA_AES256_GCM_SHA384 => p(K::Rsa, stat, Auth::Rsa, B::Aes256Gcm, None, H::SHA384, Tls12, Tls12),
            DHE_RSA_AES128_GCM_SHA256 => p(K::Dh, eph, Auth::Rsa, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            PSK_AES128_GCM_SHA256 => p(K::Psk, eph, Auth::Psk, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            DHE_PSK_AES128_CBC_SHA => p(K::DhePsk, eph, Auth::Psk, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            DHE_PSK_AES128_GCM_SHA256 => p(K::DhePsk, eph, Auth::Psk, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            ECDHE_PSK_AES128_CBC_SHA => p(K::EcdhePsk, eph, Auth::Psk, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            ECDHE_PSK_AES128_CBC_SHA256 => p(K::EcdhePsk, eph, Auth::Psk, B::Aes128Cbc, Some(H::SHA256), H::SHA256, Tls12, Tls12),
            ECDH_ECDSA_AES128_CBC_SHA => p(K::Ecdh, stat, Auth::Ecdsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            ECDHE_ECDSA_AES128_CBC_SHA => p(K::Ecdh, eph, Auth::Ecdsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            ECDHE_RSA_AES128_CBC_SHA => p(K::Ecdh, eph, Auth::Rsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            ECDH_ANON_AES128_CBC_SHA => p(K::Ecdh, eph, Auth::None, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            SRP_SHA_AES128_CBC_SHA => p(K::Srp, eph, Auth::Srp, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            SRP_SHA_RSA_AES128_CBC_SHA => p(K::Srp, eph, Auth::Rsa, B::Aes128Cbc, Some(H::SHA1), H::SHA256, Tls10, Tls12),
            ECDHE_ECDSA_AES128_CBC_SHA256 => p(K::Ecdh, eph, Auth::Ecdsa, B::Aes128Cbc, Some(H::SHA256), H::SHA256, Tls12, Tls12),
            ECDHE_RSA_AES128_CBC_SHA256 => p(K::Ecdh, eph, Auth::Rsa, B::Aes128Cbc, Some(H::SHA256), H::SHA256, Tls12, Tls12),
            ECDHE_ECDSA_AES128_GCM_SHA256 => p(K::Ecdh, eph, Auth::Ecdsa, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            ECDHE_ECDSA_AES256_GCM_SHA384 => p(K::Ecdh, eph, Auth::Ecdsa, B::Aes256Gcm, None, H::SHA384, Tls12, Tls12),
            ECDHE_RSA_AES128_GCM_SHA256 => p(K::Ecdh, eph, Auth::Rsa, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            ECDHE_RSA_AES256_GCM_SHA384 => p(K::Ecdh, eph, Auth::Rsa, B::Aes256Gcm, None, H::SHA384, Tls12, Tls12),
            ECCPWD_AES128_GCM_SHA256 => p(K::EccPwd, eph, Auth::None, B::Aes128Gcm, None, H::SHA256, Tls12, Tls12),
            GOSTR341112_256_KUZNYECHIK_CTR_OMAC => p(K::Gostr, eph, Auth::Gostr, B::KuznyechikCtr, None, H::SHA256, Tls12, Tls12),
            ECDHE_RSA_CHACHA20_POLY1305_SHA256 => p(K::Ecdh, eph, Auth::Rsa, B::ChaCha20Poly1305, None, H::SHA256, Tls12, Tls12),
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256 => p(K::Ecdh, eph, Auth::Ecdsa, B::ChaCha20Poly1305, None, H::SHA256, Tls12, Tls12),
            TLS13_AES_128_GCM_SHA256 => p(K::Contextual, eph, Auth::Contextual, B::Aes128Gcm, None, H::SHA256, Tls13, Tls13),
            TLS13_AES_256_GCM_SHA384 => p(K::Contextual, eph, Auth::Contextual, B::Aes256Gcm, None, H::SHA384, Tls13, Tls13),
            TLS13_CHACHA20_POLY1305_SHA256 => p(K::Contextual, eph, Auth::Contextual, B::ChaCha20Poly1305, None, H::SHA256, Tls13, Tls13),
            EMPTY_RENEGOTIATION_INFO_SCSV | Unknown(_) => None,
        }
    }

    /// Whether this suite may be negotiated at `version`.
    pub fn supports(&self, version: TlsVersion) -> bool {
        let Some(params) = self.params() else {
            return false;
        };
        let v = version.stream_equivalent();
        v.is_at_least(params.min_version) && params.max_version.is_at_least(v)
    }
}

/// Key exchange algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeKind {
    None,
    Dh,
    Ecdh,
    Rsa,
    Psk,
    /// PSK identity in front of a DHE exchange (RFC 4279 Section 3).
    DhePsk,
    /// PSK identity in front of an ECDHE exchange (RFC 5489).
    EcdhePsk,
    Srp,
    Krb5,
    EccPwd,
    Gostr,
    /// TLS 1.3: negotiated through the key_share extension.
    Contextual,
}

impl KeyExchangeKind {
    /// Whether the exchange runs over an elliptic curve group.
    pub fn is_ec(&self) -> bool {
        matches!(self, KeyExchangeKind::Ecdh | KeyExchangeKind::EcdhePsk)
    }
}

/// Whether the exchanged value comes from a certificate or is generated per handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeType {
    Static,
    Ephemeral,
}

/// How the server authenticates itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Auth {
    None,
    Rsa,
    Ecdsa,
    Psk,
    Srp,
    Krb5,
    Gostr,
    /// TLS 1.3: any certificate type allowed by signature_algorithms.
    Contextual,
}

impl Auth {
    /// Whether the server sends a Certificate message.
    pub fn requires_certificate(&self) -> bool {
        matches!(self, Auth::Rsa | Auth::Ecdsa | Auth::Gostr | Auth::Contextual)
    }
}

/// Record protection algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCipher {
    Null,
    Des40Cbc,
    DesCbc,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
    KuznyechikCtr,
}

impl BulkCipher {
    /// Key length as installed in the cipher.
    pub fn key_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Des40Cbc | BulkCipher::DesCbc => 8,
            BulkCipher::Aes128Cbc | BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Cbc
            | BulkCipher::Aes256Gcm
            | BulkCipher::ChaCha20Poly1305
            | BulkCipher::KuznyechikCtr => 32,
        }
    }

    /// Key length drawn from the key block. Exportable ciphers expand a shorter key.
    pub fn key_material_len(&self) -> usize {
        match self {
            BulkCipher::Des40Cbc => 5,
            c => c.key_len(),
        }
    }

    /// Implicit IV length taken from the key block (pre TLS 1.3) or
    /// derived by HKDF (TLS 1.3 uses [`BulkCipher::nonce_len`]).
    pub fn fixed_iv_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Des40Cbc | BulkCipher::DesCbc => 8,
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 16,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
            BulkCipher::ChaCha20Poly1305 => 12,
            BulkCipher::KuznyechikCtr => 8,
        }
    }

    /// Full AEAD nonce length.
    pub fn nonce_len(&self) -> usize {
        12
    }

    /// Explicit nonce bytes carried in each TLS 1.2 record.
    pub fn explicit_nonce_len(&self) -> usize {
        match self {
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 8,
            _ => 0,
        }
    }

    pub fn block_len(&self) -> usize {
        match self {
            BulkCipher::Des40Cbc | BulkCipher::DesCbc => 8,
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 16,
            _ => 0,
        }
    }

    pub fn tag_len(&self) -> usize {
        if self.is_aead() {
            16
        } else {
            0
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(
            self,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm | BulkCipher::ChaCha20Poly1305
        )
    }

    pub fn is_block(&self) -> bool {
        self.block_len() > 0
    }

    pub fn is_export(&self) -> bool {
        matches!(self, BulkCipher::Des40Cbc)
    }
}

/// Immutable descriptor of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub key_exchange: KeyExchangeKind,
    pub key_exchange_type: KeyExchangeType,
    pub authentication: Auth,
    pub cipher: BulkCipher,
    /// Record MAC hash. `None` for AEAD and null ciphers.
    pub mac: Option<HashAlgorithm>,
    /// Hash for the TLS 1.2 PRF, the transcript and the TLS 1.3 key schedule.
    pub prf_hash: HashAlgorithm,
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
}

impl CipherSuiteParams {
    pub fn mac_len(&self) -> usize {
        self.mac.map(|m| m.output_len()).unwrap_or(0)
    }

    /// Hash used by the PRF and the transcript at `version`.
    ///
    /// Before TLS 1.2 the PRF is the fixed MD5/SHA-1 construction.
    pub fn transcript_hash(&self, version: TlsVersion) -> Option<HashAlgorithm> {
        if version.is_at_least(TlsVersion::Tls12) {
            Some(self.prf_hash)
        } else {
            None
        }
    }
}
