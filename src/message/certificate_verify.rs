use nom::IResult;

use super::DigitallySigned;
use crate::context::Role;
use crate::types::TlsVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub signed: DigitallySigned,
}

impl CertificateVerify {
    pub fn new(signed: DigitallySigned) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &[u8], version: TlsVersion) -> IResult<&[u8], CertificateVerify> {
        let (input, signed) = DigitallySigned::parse(input, version)?;
        Ok((input, CertificateVerify { signed }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.signed.serialize(output);
    }
}

/// Data covered by a TLS 1.3 CertificateVerify (RFC 8446 Section 4.4.3).
pub fn tls13_signed_content(signer: Role, transcript_hash: &[u8]) -> Vec<u8> {
    let label: &[u8] = match signer {
        Role::Server => b"TLS 1.3, server CertificateVerify",
        Role::Client => b"TLS 1.3, client CertificateVerify",
    };
    let mut out = Vec::with_capacity(64 + label.len() + 1 + transcript_hash.len());
    out.extend(std::iter::repeat(0x20).take(64));
    out.extend_from_slice(label);
    out.push(0);
    out.extend_from_slice(transcript_hash);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureScheme;

    const MESSAGE: &[u8] = &[
        0x08, 0x04, // rsa_pss_rsae_sha256
        0x00, 0x02, // Signature length
        0xAB, 0xCD, // Signature
    ];

    #[test]
    fn roundtrip() {
        let verify = CertificateVerify::new(DigitallySigned::new(
            Some(SignatureScheme::RSA_PSS_RSAE_SHA256),
            vec![0xAB, 0xCD],
        ));

        let mut serialized = Vec::new();
        verify.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = CertificateVerify::parse(&serialized, TlsVersion::Tls13).unwrap();
        assert_eq!(parsed, verify);
        assert!(rest.is_empty());
    }

    #[test]
    fn signed_content_layout() {
        let content = tls13_signed_content(Role::Server, &[0xEE; 32]);
        assert_eq!(content.len(), 64 + 33 + 1 + 32);
        assert!(content[..64].iter().all(|b| *b == 0x20));
        assert_eq!(&content[64..97], b"TLS 1.3, server CertificateVerify");
        assert_eq!(content[97], 0);
    }
}
