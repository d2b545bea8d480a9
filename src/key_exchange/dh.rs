//! Finite field Diffie-Hellman key exchange (DH_anon, DHE).

use nom::IResult;

use crate::codec::{len16, WriteExt};
use crate::context::Role;
use crate::crypto::dh::DhParams;

/// Wire shape of the DH key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhKeyExchange {
    /// `dh_Yc (len16)`
    Client { y: Vec<u8> },
    /// `dh_p (len16) dh_g (len16) dh_Ys (len16)`
    Server { p: Vec<u8>, g: Vec<u8>, y: Vec<u8> },
}

impl DhKeyExchange {
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], DhKeyExchange> {
        match sender {
            Role::Client => {
                let (input, y) = len16(input)?;
                Ok((input, DhKeyExchange::Client { y: y.to_vec() }))
            }
            Role::Server => {
                let (input, p) = len16(input)?;
                let (input, g) = len16(input)?;
                let (input, y) = len16(input)?;
                Ok((
                    input,
                    DhKeyExchange::Server {
                        p: p.to_vec(),
                        g: g.to_vec(),
                        y: y.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            DhKeyExchange::Client { y } => output.put_bytes16(y),
            DhKeyExchange::Server { p, g, y } => {
                output.put_bytes16(p);
                output.put_bytes16(g);
                output.put_bytes16(y);
            }
        }
    }

    /// The public value of the sender.
    pub fn public(&self) -> &[u8] {
        match self {
            DhKeyExchange::Client { y } | DhKeyExchange::Server { y, .. } => y,
        }
    }

    /// Group parameters announced by the server.
    pub fn params(&self) -> Option<DhParams> {
        match self {
            DhKeyExchange::Server { p, g, .. } => Some(DhParams::from_bytes(p, g)),
            DhKeyExchange::Client { .. } => None,
        }
    }
}
