use nom::number::complete::{be_u24, be_u8};
use nom::IResult;

use crate::codec::WriteExt;

/// Handshake header size: type(1) length(3).
pub const HEADER_LEN: usize = 4;

/// Largest handshake body accepted before it is reassembled.
pub const MAX_HANDSHAKE_LEN: usize = 1 << 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    HelloRequest,
    ClientHello,
    ServerHello,
    NewSessionTicket,
    EncryptedExtensions,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    KeyUpdate,
    Unknown(u8),
}

impl HandshakeType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            4 => HandshakeType::NewSessionTicket,
            8 => HandshakeType::EncryptedExtensions,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            24 => HandshakeType::KeyUpdate,
            _ => HandshakeType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HandshakeType::HelloRequest => 0,
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::ServerKeyExchange => 12,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::ServerHelloDone => 14,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::ClientKeyExchange => 16,
            HandshakeType::Finished => 20,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HandshakeType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: HandshakeType,
    pub length: u32,
}

impl Header {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = HandshakeType::parse(input)?;
        let (input, length) = be_u24(input)?;
        Ok((input, Header { msg_type, length }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.put_u8(self.msg_type.as_u8());
        output.put_u24(self.length);
    }

    /// Header and body size, if `buf` holds at least a header.
    pub fn peek(buf: &[u8]) -> Option<(Header, usize)> {
        let (_, header) = Header::parse(buf).ok()?;
        Some((header, HEADER_LEN + header.length as usize))
    }
}

/// Frame a body as a handshake message.
pub fn frame(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    Header {
        msg_type,
        length: body.len() as u32,
    }
    .serialize(&mut out);
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x0E, // ServerHelloDone
        0x00, 0x00, 0x00, // length
    ];

    #[test]
    fn roundtrip() {
        let header = Header {
            msg_type: HandshakeType::ServerHelloDone,
            length: 0,
        };

        let mut serialized = Vec::new();
        header.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = Header::parse(&serialized).unwrap();
        assert_eq!(parsed, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn peek_needs_a_full_header() {
        assert_eq!(Header::peek(&[0x14, 0x00]), None);
        let (header, total) = Header::peek(&[0x14, 0x00, 0x00, 0x0C, 0xAA]).unwrap();
        assert_eq!(header.msg_type, HandshakeType::Finished);
        assert_eq!(total, 16);
    }

    #[test]
    fn frame_prefixes_type_and_length() {
        assert_eq!(
            frame(HandshakeType::Finished, &[1, 2, 3]),
            vec![0x14, 0x00, 0x00, 0x03, 1, 2, 3]
        );
    }
}
