use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::codec::{len16, len8, WriteExt};
use crate::context::Role;
use crate::extension::{Extension, ExtensionType};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};

/// Longest legal session id.
pub const MAX_SESSION_ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: Vec<Extension>,
}

pub(crate) fn parse_random(input: &[u8]) -> IResult<&[u8], [u8; 32]> {
    let (input, bytes) = take(32_usize)(input)?;
    let mut random = [0; 32];
    random.copy_from_slice(bytes);
    Ok((input, random))
}

pub(crate) fn parse_session_id(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (rest, id) = len8(input)?;
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
    }
    Ok((rest, id.to_vec()))
}

/// The extension block is optional: SSL 3.0 hellos end after compression.
pub(crate) fn parse_optional_extensions(
    input: &[u8],
    sender: Role,
) -> IResult<&[u8], Vec<Extension>> {
    if input.is_empty() {
        return Ok((input, Vec::new()));
    }
    Extension::parse_list(input, sender)
}

impl ClientHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = parse_random(input)?;
        let (input, session_id) = parse_session_id(input)?;

        let (input, suites) = len16(input)?;
        if suites.is_empty() || suites.len() % 2 != 0 {
            return Err(Err::Failure(Error::new(suites, ErrorKind::LengthValue)));
        }
        let cipher_suites = suites
            .chunks_exact(2)
            .map(|c| CipherSuite::from_u16(u16::from_be_bytes([c[0], c[1]])))
            .collect();

        let (input, methods) = len8(input)?;
        if methods.is_empty() {
            return Err(Err::Failure(Error::new(methods, ErrorKind::LengthValue)));
        }
        let compression_methods = methods
            .iter()
            .map(|m| CompressionMethod::from_u8(*m))
            .collect();

        let (input, extensions) = parse_optional_extensions(input, Role::Client)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.serialize_without_extensions(output);
        if !self.extensions.is_empty() {
            Extension::serialize_list(&self.extensions, output);
        }
    }

    fn serialize_without_extensions(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        output.extend_from_slice(&self.random);
        output.put_bytes8(&self.session_id);
        output.with_len16(|out| {
            for s in &self.cipher_suites {
                s.serialize(out);
            }
        });
        output.with_len8(|out| {
            for m in &self.compression_methods {
                out.put_u8(m.as_u8());
            }
        });
    }

    /// Encoded size before any extension block, with the handshake header.
    pub fn len_without_extensions(&self) -> usize {
        let mut out = Vec::new();
        self.serialize_without_extensions(&mut out);
        super::handshake::HEADER_LEN + out.len()
    }

    pub fn extension(&self, t: ExtensionType) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.extension_type() == t)
    }

    pub fn offers_suite(&self, suite: CipherSuite) -> bool {
        self.cipher_suites.contains(&suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NamedGroup;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // ProtocolVersion::TLS1_2
        // Random
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E,
        0x1F, 0x20, //
        0x01, // SessionId length
        0xAA, // SessionId
        0x00, 0x04, // CipherSuites length
        0xC0, 0x2B, // ECDHE_ECDSA_AES128_GCM_SHA256
        0x00, 0xFF, // EMPTY_RENEGOTIATION_INFO_SCSV
        0x01, // CompressionMethods length
        0x00, // CompressionMethod::Null
        0x00, 0x0C, // Extensions length
        0x00, 0x0A, // supported_groups
        0x00, 0x04, // length
        0x00, 0x02, // list length
        0x00, 0x1D, // x25519
        0x00, 0x17, // extended_master_secret
        0x00, 0x00, // length
    ];

    fn hello() -> ClientHello {
        let mut random = [0; 32];
        random.copy_from_slice(&MESSAGE[2..34]);
        ClientHello {
            client_version: ProtocolVersion(0x0303),
            random,
            session_id: vec![0xAA],
            cipher_suites: vec![
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV,
            ],
            compression_methods: vec![CompressionMethod::Null],
            extensions: vec![
                Extension::SupportedGroups(vec![NamedGroup::X25519]),
                Extension::ExtendedMasterSecret,
            ],
        }
    }

    #[test]
    fn roundtrip() {
        let client_hello = hello();

        let mut serialized = Vec::new();
        client_hello.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = ClientHello::parse(&serialized).unwrap();
        assert_eq!(parsed, client_hello);
        assert!(rest.is_empty());
    }

    #[test]
    fn ssl3_hello_without_extensions() {
        let mut client_hello = hello();
        client_hello.client_version = ProtocolVersion(0x0300);
        client_hello.extensions.clear();

        let mut serialized = Vec::new();
        client_hello.serialize(&mut serialized);
        assert_eq!(serialized.len(), MESSAGE.len() - 14);
        assert_eq!(client_hello.len_without_extensions(), serialized.len() + 4);

        let (_, parsed) = ClientHello::parse(&serialized).unwrap();
        assert_eq!(parsed, client_hello);
    }

    #[test]
    fn rejects_empty_suites_and_long_session_id() {
        let mut bad = MESSAGE.to_vec();
        bad[34] = 33;
        assert!(ClientHello::parse(&bad).is_err());

        let mut bad = MESSAGE[..36].to_vec();
        bad.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
        assert!(ClientHello::parse(&bad).is_err());
    }
}
