use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::codec::{be_u48, WriteExt};
use crate::types::{ContentType, ProtocolVersion};

/// type(1) version(2) length(2)
pub const STREAM_HEADER_LEN: usize = 5;

/// type(1) version(2) epoch(2) sequence(6) length(2)
pub const DATAGRAM_HEADER_LEN: usize = 13;

/// Largest protected fragment: 2^14 plus the expansion allowed by RFC 5246.
pub const MAX_CIPHERTEXT_LEN: usize = 16384 + 2048;

/// Datagram epoch and 48 bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramSequence {
    pub epoch: u16,
    pub sequence_number: u64,
}

impl DatagramSequence {
    /// Split an 8 byte epoch||sequence counter.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        let epoch = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut seq = [0; 8];
        seq[2..].copy_from_slice(&bytes[2..]);
        DatagramSequence {
            epoch,
            sequence_number: u64::from_be_bytes(seq),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    /// Present for datagram versions.
    pub sequence: Option<DatagramSequence>,
    pub fragment: Vec<u8>,
}

impl Record {
    pub fn header_len(datagram: bool) -> usize {
        if datagram {
            DATAGRAM_HEADER_LEN
        } else {
            STREAM_HEADER_LEN
        }
    }

    pub fn parse(input: &[u8], datagram: bool) -> IResult<&[u8], Record> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, sequence) = if datagram {
            let (input, epoch) = be_u16(input)?;
            let (input, sequence_number) = be_u48(input)?;
            (
                input,
                Some(DatagramSequence {
                    epoch,
                    sequence_number,
                }),
            )
        } else {
            (input, None)
        };
        let (input, length) = be_u16(input)?;
        let (input, fragment) = take(length as usize)(input)?;

        Ok((
            input,
            Record {
                content_type,
                version,
                sequence,
                fragment: fragment.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.put_u8(self.content_type.as_u8());
        self.version.serialize(output);
        if let Some(seq) = &self.sequence {
            output.put_u16(seq.epoch);
            output.put_u48(seq.sequence_number);
        }
        output.put_bytes16(&self.fragment);
    }

    /// Size of the first record in `buf` with its header, once the header is there.
    pub fn peek_len(buf: &[u8], datagram: bool) -> Option<usize> {
        let header_len = Self::header_len(datagram);
        if buf.len() < header_len {
            return None;
        }
        let length = u16::from_be_bytes([buf[header_len - 2], buf[header_len - 1]]) as usize;
        Some(header_len + length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] = &[
        0x16, // ContentType::Handshake
        0x03, 0x03, // TLS 1.2
        0x00, 0x04, // length
        0x01, 0x02, 0x03, 0x04, // fragment
    ];

    const DATAGRAM_RECORD: &[u8] = &[
        0x17, // ContentType::ApplicationData
        0xFE, 0xFD, // DTLS 1.2
        0x00, 0x01, // epoch
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // sequence_number
        0x00, 0x02, // length
        0x0A, 0x0B, // fragment
    ];

    #[test]
    fn roundtrip() {
        let record = Record {
            content_type: ContentType::Handshake,
            version: ProtocolVersion(0x0303),
            sequence: None,
            fragment: vec![1, 2, 3, 4],
        };

        let mut serialized = Vec::new();
        record.serialize(&mut serialized);
        assert_eq!(serialized, RECORD);

        let (rest, parsed) = Record::parse(&serialized, false).unwrap();
        assert_eq!(parsed, record);
        assert!(rest.is_empty());
        assert_eq!(Record::peek_len(&serialized, false), Some(RECORD.len()));
    }

    #[test]
    fn roundtrip_datagram() {
        let record = Record {
            content_type: ContentType::ApplicationData,
            version: ProtocolVersion(0xFEFD),
            sequence: Some(DatagramSequence::from_bytes([0, 1, 0, 0, 0, 0, 0, 1])),
            fragment: vec![0x0A, 0x0B],
        };

        let mut serialized = Vec::new();
        record.serialize(&mut serialized);
        assert_eq!(serialized, DATAGRAM_RECORD);

        let (rest, parsed) = Record::parse(&serialized, true).unwrap();
        assert_eq!(parsed, record);
        assert!(rest.is_empty());
    }

    #[test]
    fn partial_header() {
        assert_eq!(Record::peek_len(&RECORD[..4], false), None);
        assert!(Record::parse(&RECORD[..7], false).is_err());
    }
}
