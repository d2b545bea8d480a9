use nom::IResult;

use crate::codec::{len16, WriteExt};
use crate::types::{SignatureScheme, TlsVersion};

/// A signature, with its scheme from TLS 1.2 on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub scheme: Option<SignatureScheme>,
    pub signature: Vec<u8>,
}

/// Whether the scheme is on the wire at `version`.
pub fn carries_scheme(version: TlsVersion) -> bool {
    version.is_at_least(TlsVersion::Tls12)
}

impl DigitallySigned {
    pub fn new(scheme: Option<SignatureScheme>, signature: Vec<u8>) -> Self {
        DigitallySigned { scheme, signature }
    }

    pub fn parse(input: &[u8], version: TlsVersion) -> IResult<&[u8], DigitallySigned> {
        let (input, scheme) = if carries_scheme(version) {
            let (input, scheme) = SignatureScheme::parse(input)?;
            (input, Some(scheme))
        } else {
            (input, None)
        };
        let (input, signature) = len16(input)?;
        Ok((
            input,
            DigitallySigned {
                scheme,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        if let Some(scheme) = self.scheme {
            scheme.serialize(output);
        }
        output.put_bytes16(&self.signature);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x04, 0x01, // SignatureScheme (rsa_pkcs1_sha256)
        0x00, 0x04, // Signature length
        0x01, 0x02, 0x03, 0x04, // Signature data
    ];

    #[test]
    fn roundtrip() {
        let digitally_signed = DigitallySigned::new(
            Some(SignatureScheme::RSA_PKCS1_SHA256),
            MESSAGE[4..8].to_vec(),
        );

        let mut serialized = Vec::new();
        digitally_signed.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = DigitallySigned::parse(&serialized, TlsVersion::Tls12).unwrap();
        assert_eq!(parsed, digitally_signed);
        assert!(rest.is_empty());
    }

    #[test]
    fn legacy_has_no_scheme() {
        let (rest, parsed) = DigitallySigned::parse(&MESSAGE[2..], TlsVersion::Tls11).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.scheme, None);
        assert_eq!(parsed.signature, vec![1, 2, 3, 4]);
    }
}
