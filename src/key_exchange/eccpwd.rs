//! ECCPWD key exchange (RFC 8492) wire shapes.
//!
//! The password element derivation is not provided, so these messages are
//! decoded and encoded but no secret is computed from them.

use nom::IResult;

use super::ec_params::EcParams;
use crate::codec::{len8, WriteExt};
use crate::context::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EccPwdKeyExchange {
    /// `element (len8) scalar (len8)`
    Client { public_key: Vec<u8>, password: Vec<u8> },
    /// `salt (len8) ECParameters element (len8) scalar (len8)`
    Server {
        salt: Vec<u8>,
        params: EcParams,
        public_key: Vec<u8>,
        password: Vec<u8>,
    },
}

impl EccPwdKeyExchange {
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], EccPwdKeyExchange> {
        match sender {
            Role::Client => {
                let (input, public_key) = len8(input)?;
                let (input, password) = len8(input)?;
                Ok((
                    input,
                    EccPwdKeyExchange::Client {
                        public_key: public_key.to_vec(),
                        password: password.to_vec(),
                    },
                ))
            }
            Role::Server => {
                let (input, salt) = len8(input)?;
                let (input, params) = EcParams::parse(input)?;
                let (input, public_key) = len8(input)?;
                let (input, password) = len8(input)?;
                Ok((
                    input,
                    EccPwdKeyExchange::Server {
                        salt: salt.to_vec(),
                        params,
                        public_key: public_key.to_vec(),
                        password: password.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            EccPwdKeyExchange::Client {
                public_key,
                password,
            } => {
                output.put_bytes8(public_key);
                output.put_bytes8(password);
            }
            EccPwdKeyExchange::Server {
                salt,
                params,
                public_key,
                password,
            } => {
                output.put_bytes8(salt);
                params.serialize(output);
                output.put_bytes8(public_key);
                output.put_bytes8(password);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::NamedGroup;

    #[test]
    fn server_layout() {
        let m = EccPwdKeyExchange::Server {
            salt: vec![1, 2],
            params: EcParams::NamedCurve(NamedGroup::Secp256r1),
            public_key: vec![4, 4],
            password: vec![5],
        };
        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(out, [0x02, 1, 2, 0x03, 0x00, 0x17, 0x02, 4, 4, 0x01, 5]);
        let (rest, parsed) = EccPwdKeyExchange::parse(&out, Role::Server).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, m);
    }
}
