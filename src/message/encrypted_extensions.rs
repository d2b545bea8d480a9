use nom::IResult;

use crate::context::Role;
use crate::extension::Extension;

/// TLS 1.3 EncryptedExtensions: the server extensions that are not needed to
/// derive the handshake keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

impl EncryptedExtensions {
    pub fn parse(input: &[u8]) -> IResult<&[u8], EncryptedExtensions> {
        let (input, extensions) = Extension::parse_list(input, Role::Server)?;
        Ok((input, EncryptedExtensions { extensions }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        Extension::serialize_list(&self.extensions, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x09, // Extensions length
        0x00, 0x10, // application_layer_protocol_negotiation
        0x00, 0x05, // length
        0x00, 0x03, // list length
        0x02, b'h', b'2', // protocol
    ];

    #[test]
    fn roundtrip() {
        let ee = EncryptedExtensions {
            extensions: vec![Extension::Alpn(vec![b"h2".to_vec()])],
        };

        let mut serialized = Vec::new();
        ee.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = EncryptedExtensions::parse(&serialized).unwrap();
        assert_eq!(parsed, ee);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty() {
        let (_, parsed) = EncryptedExtensions::parse(&[0, 0]).unwrap();
        assert!(parsed.extensions.is_empty());
    }
}
