//! Pre-shared key exchange (RFC 4279).

use nom::IResult;

use crate::codec::{len16, WriteExt};
use crate::context::Role;
use crate::secret::Secret;

/// Wire shape of the PSK key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PskKeyExchange {
    /// `psk_identity (len16)`
    Client { identity: Vec<u8> },
    /// `psk_identity_hint (len16)`
    Server { hint: Vec<u8> },
}

impl PskKeyExchange {
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], PskKeyExchange> {
        let (input, value) = len16(input)?;
        let value = value.to_vec();
        let m = match sender {
            Role::Client => PskKeyExchange::Client { identity: value },
            Role::Server => PskKeyExchange::Server { hint: value },
        };
        Ok((input, m))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            PskKeyExchange::Client { identity } => output.put_bytes16(identity),
            PskKeyExchange::Server { hint } => output.put_bytes16(hint),
        }
    }
}

/// Premaster secret of plain PSK.
///
/// `other_secret` is N zero bytes for a key of N bytes.
pub fn premaster(psk: &[u8]) -> Secret {
    premaster_with(&vec![0; psk.len()], psk)
}

/// `len16 other_secret || len16 psk`, where DHE_PSK and ECDHE_PSK put the
/// agreed secret in `other_secret`.
pub fn premaster_with(other_secret: &[u8], psk: &[u8]) -> Secret {
    let mut out = Vec::with_capacity(4 + other_secret.len() + psk.len());
    out.put_bytes16(other_secret);
    out.put_bytes16(psk);
    Secret::new(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn premaster_layout() {
        let pms = premaster(&[0xAA, 0xBB]);
        assert_eq!(pms.as_bytes(), &[0x00, 0x02, 0, 0, 0x00, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn premaster_with_agreed_secret() {
        let pms = premaster_with(&[1, 2, 3], &[0xAA]);
        assert_eq!(pms.as_bytes(), &[0x00, 0x03, 1, 2, 3, 0x00, 0x01, 0xAA]);
    }

    #[test]
    fn identity_and_hint_share_a_layout() {
        let (_, c) = PskKeyExchange::parse(&[0x00, 0x02, b'i', b'd'], Role::Client).unwrap();
        let (_, s) = PskKeyExchange::parse(&[0x00, 0x02, b'i', b'd'], Role::Server).unwrap();
        assert_eq!(c, PskKeyExchange::Client { identity: b"id".to_vec() });
        assert_eq!(s, PskKeyExchange::Server { hint: b"id".to_vec() });
    }
}
