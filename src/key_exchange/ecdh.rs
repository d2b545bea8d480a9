//! Elliptic curve Diffie-Hellman key exchange (ECDH, ECDHE, ECDH_anon).

use nom::IResult;

use super::ec_params::EcParams;
use crate::codec::{len8, WriteExt};
use crate::context::Role;

/// Wire shape of the ECDH key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcdhKeyExchange {
    /// `ecdh_Yc (len8)`
    Client { public_key: Vec<u8> },
    /// `ECParameters point (len8)`
    Server {
        params: EcParams,
        public_key: Vec<u8>,
    },
}

impl EcdhKeyExchange {
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], EcdhKeyExchange> {
        match sender {
            Role::Client => {
                let (input, public_key) = len8(input)?;
                Ok((
                    input,
                    EcdhKeyExchange::Client {
                        public_key: public_key.to_vec(),
                    },
                ))
            }
            Role::Server => {
                let (input, params) = EcParams::parse(input)?;
                let (input, public_key) = len8(input)?;
                Ok((
                    input,
                    EcdhKeyExchange::Server {
                        params,
                        public_key: public_key.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            EcdhKeyExchange::Client { public_key } => output.put_bytes8(public_key),
            EcdhKeyExchange::Server { params, public_key } => {
                params.serialize(output);
                output.put_bytes8(public_key);
            }
        }
    }

    pub fn public_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::Client { public_key } | EcdhKeyExchange::Server { public_key, .. } => {
                public_key
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::NamedGroup;

    const SERVER: &[u8] = &[
        0x03, // named_curve
        0x00, 0x1D, // x25519
        0x04, // public key length
        0x01, 0x02, 0x03, 0x04,
    ];

    #[test]
    fn named_curve_server() {
        let (rest, m) = EcdhKeyExchange::parse(SERVER, Role::Server).unwrap();
        assert!(rest.is_empty());
        match &m {
            EcdhKeyExchange::Server { params, public_key } => {
                assert_eq!(params.named_group(), Some(NamedGroup::X25519));
                assert_eq!(public_key, &[1, 2, 3, 4]);
            }
            _ => panic!("expected server shape"),
        }

        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(out, SERVER);
    }

    #[test]
    fn client_point() {
        let m = EcdhKeyExchange::Client {
            public_key: vec![9; 65],
        };
        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(out[0], 65);
        let (_, parsed) = EcdhKeyExchange::parse(&out, Role::Client).unwrap();
        assert_eq!(parsed.public_key(), &[9; 65][..]);
    }
}
