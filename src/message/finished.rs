use nom::combinator::rest;
use nom::IResult;

use crate::types::{HashAlgorithm, TlsVersion};

/// Verify data length before TLS 1.3. SSL 3.0 sends MD5 and SHA-1 hashes.
pub fn verify_data_len(version: TlsVersion, hash: HashAlgorithm) -> usize {
    match version.stream_equivalent() {
        TlsVersion::Ssl30 => 36,
        v if v.is_tls13() => hash.output_len(),
        _ => 12,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn new(verify_data: Vec<u8>) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, verify_data) = rest(input)?;
        Ok((
            input,
            Finished {
                verify_data: verify_data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.verify_data);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let verify_data = vec![
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
        ];
        let finished = Finished::new(verify_data);

        let mut serialized = Vec::new();
        finished.serialize(&mut serialized);

        let (rest, parsed) = Finished::parse(&serialized).unwrap();
        assert_eq!(parsed, finished);
        assert!(rest.is_empty());
    }

    #[test]
    fn lengths() {
        assert_eq!(verify_data_len(TlsVersion::Ssl30, HashAlgorithm::SHA256), 36);
        assert_eq!(verify_data_len(TlsVersion::Tls10, HashAlgorithm::SHA256), 12);
        assert_eq!(verify_data_len(TlsVersion::Tls12, HashAlgorithm::SHA384), 12);
        assert_eq!(verify_data_len(TlsVersion::Tls13, HashAlgorithm::SHA384), 48);
    }
}
