use nom::IResult;

use crate::codec::{len16, len24, len8, WriteExt};
use crate::types::TlsVersion;

/// One certificate of a chain. `extensions` is the raw TLS 1.3 per-entry
/// extension block and stays empty before TLS 1.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    pub certificate: Vec<u8>,
    pub extensions: Vec<u8>,
}

impl CertificateEntry {
    pub fn new(certificate: Vec<u8>) -> Self {
        CertificateEntry {
            certificate,
            extensions: Vec::new(),
        }
    }
}

/// Certificate chain, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    /// TLS 1.3 certificate_request_context.
    pub context: Vec<u8>,
    pub entries: Vec<CertificateEntry>,
}

impl Certificate {
    pub fn new(chain: &[Vec<u8>]) -> Self {
        Certificate {
            context: Vec::new(),
            entries: chain.iter().cloned().map(CertificateEntry::new).collect(),
        }
    }

    pub fn parse(input: &[u8], version: TlsVersion) -> IResult<&[u8], Certificate> {
        let tls13 = version.is_tls13();

        let (input, context) = if tls13 {
            let (input, context) = len8(input)?;
            (input, context.to_vec())
        } else {
            (input, Vec::new())
        };

        let (input, mut list) = len24(input)?;
        let mut entries = Vec::new();
        while !list.is_empty() {
            let (rest, certificate) = len24(list)?;
            let (rest, extensions) = if tls13 {
                let (rest, extensions) = len16(rest)?;
                (rest, extensions.to_vec())
            } else {
                (rest, Vec::new())
            };
            entries.push(CertificateEntry {
                certificate: certificate.to_vec(),
                extensions,
            });
            list = rest;
        }

        Ok((input, Certificate { context, entries }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: TlsVersion) {
        let tls13 = version.is_tls13();
        if tls13 {
            output.put_bytes8(&self.context);
        }
        output.with_len24(|out| {
            for entry in &self.entries {
                out.put_bytes24(&entry.certificate);
                if tls13 {
                    out.put_bytes16(&entry.extensions);
                }
            }
        });
    }

    /// The DER certificates, leaf first.
    pub fn chain(&self) -> Vec<Vec<u8>> {
        self.entries.iter().map(|e| e.certificate.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x00, 0x0C, // Total length
        0x00, 0x00, 0x04, // Certificate 1 length
        0x01, 0x02, 0x03, 0x04, // Certificate 1 data
        0x00, 0x00, 0x02, // Certificate 2 length
        0x05, 0x06, // Certificate 2 data
    ];

    const MESSAGE_TLS13: &[u8] = &[
        0x00, // Context length
        0x00, 0x00, 0x09, // Total length
        0x00, 0x00, 0x04, // Certificate length
        0x01, 0x02, 0x03, 0x04, // Certificate data
        0x00, 0x00, // Extensions length
    ];

    #[test]
    fn roundtrip() {
        let certificate = Certificate::new(&[vec![1, 2, 3, 4], vec![5, 6]]);

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized, TlsVersion::Tls12);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = Certificate::parse(&serialized, TlsVersion::Tls12).unwrap();
        assert_eq!(parsed, certificate);
        assert_eq!(parsed.chain(), vec![vec![1, 2, 3, 4], vec![5, 6]]);
        assert!(rest.is_empty());
    }

    #[test]
    fn roundtrip_tls13() {
        let certificate = Certificate::new(&[vec![1, 2, 3, 4]]);

        let mut serialized = Vec::new();
        certificate.serialize(&mut serialized, TlsVersion::Tls13);
        assert_eq!(serialized, MESSAGE_TLS13);

        let (rest, parsed) = Certificate::parse(&serialized, TlsVersion::Tls13).unwrap();
        assert_eq!(parsed, certificate);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_chain() {
        let (_, parsed) = Certificate::parse(&[0, 0, 0], TlsVersion::Tls10).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn truncated_entry() {
        assert!(Certificate::parse(&[0, 0, 4, 0, 0, 9, 1], TlsVersion::Tls12).is_err());
    }
}
