use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

/// Record layer content type.
///
/// In TLS 1.3 every protected record carries `ApplicationData` on the outside,
/// the real type travels inside the encrypted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    #[default]
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        use ContentType::*;
        match value {
            20 => ChangeCipherSpec,
            21 => Alert,
            22 => Handshake,
            23 => ApplicationData,
            v => Unknown(v),
        }
    }

    pub fn as_u8(&self) -> u8 {
        use ContentType::*;
        match *self {
            ChangeCipherSpec => 20,
            Alert => 21,
            Handshake => 22,
            ApplicationData => 23,
            Unknown(v) => v,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        be_u8(input).map(|(rest, v)| (rest, Self::from_u8(v)))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::ChangeCipherSpec => f.write_str("change_cipher_spec"),
            ContentType::Alert => f.write_str("alert"),
            ContentType::Handshake => f.write_str("handshake"),
            ContentType::ApplicationData => f.write_str("application_data"),
            ContentType::Unknown(v) => write!(f, "unknown({})", v),
        }
    }
}

/// Hello compression method. Only `Null` is ever negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    #[default]
    Null,
    Deflate,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CompressionMethod::Null,
            1 => CompressionMethod::Deflate,
            v => CompressionMethod::Unknown(v),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match *self {
            CompressionMethod::Null => 0,
            CompressionMethod::Deflate => 1,
            CompressionMethod::Unknown(v) => v,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        be_u8(input).map(|(rest, v)| (rest, Self::from_u8(v)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_type_values() {
        for v in 0..=255u8 {
            assert_eq!(ContentType::from_u8(v).as_u8(), v);
        }
        assert_eq!(ContentType::from_u8(23), ContentType::ApplicationData);
        assert_eq!(ContentType::Unknown(24).to_string(), "unknown(24)");
        assert_eq!(ContentType::ChangeCipherSpec.to_string(), "change_cipher_spec");
    }

    #[test]
    fn compression() {
        let (rest, m) = CompressionMethod::parse(&[0, 9]).unwrap();
        assert_eq!(m, CompressionMethod::Null);
        assert_eq!(rest, &[9]);
        assert_eq!(CompressionMethod::from_u8(64), CompressionMethod::Unknown(64));
    }
}
