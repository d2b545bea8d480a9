use nom::number::complete::be_u8;
use nom::IResult;

use super::client_hello::{parse_optional_extensions, parse_random, parse_session_id};
use crate::codec::WriteExt;
use crate::context::Role;
use crate::extension::{Extension, ExtensionType, SupportedVersions};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion, TlsVersion};

/// SHA-256 of "HelloRetryRequest" (RFC 8446 Section 4.1.3).
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

/// Last 8 server random bytes of a TLS 1.3 capable server negotiating TLS 1.2.
pub const DOWNGRADE_TLS12: [u8; 8] = *b"DOWNGRD\x01";

/// The same, negotiating TLS 1.1 or below.
pub const DOWNGRADE_TLS11: [u8; 8] = *b"DOWNGRD\x00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = parse_random(input)?;
        let (input, session_id) = parse_session_id(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression) = be_u8(input)?;
        let (input, extensions) = parse_optional_extensions(input, Role::Server)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method: CompressionMethod::from_u8(compression),
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        output.extend_from_slice(&self.random);
        output.put_bytes8(&self.session_id);
        self.cipher_suite.serialize(output);
        output.put_u8(self.compression_method.as_u8());
        if !self.extensions.is_empty() {
            Extension::serialize_list(&self.extensions, output);
        }
    }

    pub fn extension(&self, t: ExtensionType) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.extension_type() == t)
    }

    /// The version the server selected: supported_versions when present,
    /// the legacy field otherwise.
    pub fn selected_version(&self) -> ProtocolVersion {
        match self.extension(ExtensionType::SupportedVersions) {
            Some(Extension::SupportedVersions(SupportedVersions::Server(v))) => *v,
            _ => self.server_version,
        }
    }

    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    /// Whether the random carries a downgrade sentinel for `negotiated`.
    pub fn has_downgrade_sentinel(&self, negotiated: TlsVersion) -> bool {
        let tail = &self.random[24..];
        if negotiated.is_tls13() {
            return false;
        }
        if negotiated.stream_equivalent() == TlsVersion::Tls12 {
            tail == DOWNGRADE_TLS12
        } else {
            tail == DOWNGRADE_TLS11
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{KeyShare, KeyShareEntry};
    use crate::types::NamedGroup;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // legacy_version
        // Random
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E,
        0x1F, 0x20, //
        0x00, // SessionId length
        0x13, 0x01, // TLS_AES_128_GCM_SHA256
        0x00, // CompressionMethod::Null
        0x00, 0x12, // Extensions length
        0x00, 0x2B, // supported_versions
        0x00, 0x02, // length
        0x03, 0x04, // TLS 1.3
        0x00, 0x33, // key_share
        0x00, 0x08, // length
        0x00, 0x1D, // x25519
        0x00, 0x04, // key length
        0xAA, 0xBB, 0xCC, 0xDD, // key
    ];

    fn hello() -> ServerHello {
        let mut random = [0; 32];
        random.copy_from_slice(&MESSAGE[2..34]);
        ServerHello {
            server_version: ProtocolVersion(0x0303),
            random,
            session_id: Vec::new(),
            cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            compression_method: CompressionMethod::Null,
            extensions: vec![
                Extension::SupportedVersions(SupportedVersions::Server(ProtocolVersion(0x0304))),
                Extension::KeyShare(KeyShare::Server(KeyShareEntry {
                    group: NamedGroup::X25519,
                    key_exchange: vec![0xAA, 0xBB, 0xCC, 0xDD],
                })),
            ],
        }
    }

    #[test]
    fn roundtrip() {
        let server_hello = hello();

        let mut serialized = Vec::new();
        server_hello.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = ServerHello::parse(&serialized).unwrap();
        assert_eq!(parsed, server_hello);
        assert!(rest.is_empty());
    }

    #[test]
    fn selected_version_prefers_the_extension() {
        let mut server_hello = hello();
        assert_eq!(server_hello.selected_version(), ProtocolVersion(0x0304));

        server_hello.extensions.clear();
        assert_eq!(server_hello.selected_version(), ProtocolVersion(0x0303));
    }

    #[test]
    fn downgrade_sentinel() {
        let mut server_hello = hello();
        assert!(!server_hello.has_downgrade_sentinel(TlsVersion::Tls12));

        server_hello.random[24..].copy_from_slice(&DOWNGRADE_TLS12);
        assert!(server_hello.has_downgrade_sentinel(TlsVersion::Tls12));
        assert!(!server_hello.has_downgrade_sentinel(TlsVersion::Tls11));
        assert!(!server_hello.is_hello_retry_request());
    }
}
