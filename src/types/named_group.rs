use nom::number::complete::be_u16;
use nom::IResult;

use super::version::is_grease_u16;

/// Key exchange groups (RFC 8422, RFC 7919, RFC 8446).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    /// secp256r1 / P-256.
    Secp256r1,
    /// secp384r1 / P-384.
    Secp384r1,
    /// secp521r1 / P-521.
    Secp521r1,
    /// X25519.
    X25519,
    /// X448.
    X448,
    /// 2048-bit finite field group.
    Ffdhe2048,
    /// 3072-bit finite field group.
    Ffdhe3072,
    /// Unknown or GREASE group.
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            25 => NamedGroup::Secp521r1,
            29 => NamedGroup::X25519,
            30 => NamedGroup::X448,
            256 => NamedGroup::Ffdhe2048,
            257 => NamedGroup::Ffdhe3072,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::Secp521r1 => 25,
            NamedGroup::X25519 => 29,
            NamedGroup::X448 => 30,
            NamedGroup::Ffdhe2048 => 256,
            NamedGroup::Ffdhe3072 => 257,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Elliptic curve groups, usable with ECDH(E) cipher suites.
    pub fn is_ec(&self) -> bool {
        matches!(
            self,
            NamedGroup::Secp256r1
                | NamedGroup::Secp384r1
                | NamedGroup::Secp521r1
                | NamedGroup::X25519
                | NamedGroup::X448
        )
    }

    pub fn is_ffdhe(&self) -> bool {
        matches!(self, NamedGroup::Ffdhe2048 | NamedGroup::Ffdhe3072)
    }

    pub fn is_grease(&self) -> bool {
        is_grease_u16(self.as_u16())
    }
}
