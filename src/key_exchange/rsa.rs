//! RSA key transport.

use nom::combinator::rest;
use nom::IResult;

use crate::codec::{len16, WriteExt};
use crate::context::Role;
use crate::types::TlsVersion;

/// Length of the premaster secret: client version (2) and 46 random bytes.
pub const PREMASTER_LEN: usize = 48;

/// Wire shape of the RSA key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsaKeyExchange {
    /// The PKCS#1 v1.5 encrypted premaster secret. SSL 3.0 sends it without
    /// the length prefix.
    Client { encrypted_premaster: Vec<u8> },
    /// Temporary key of the export suites: `modulus (len16) exponent (len16)`.
    Server { modulus: Vec<u8>, exponent: Vec<u8> },
}

impl RsaKeyExchange {
    pub fn parse(input: &[u8], sender: Role, version: TlsVersion) -> IResult<&[u8], RsaKeyExchange> {
        match sender {
            Role::Client => {
                let (input, encrypted) = if version == TlsVersion::Ssl30 {
                    rest(input)?
                } else {
                    len16(input)?
                };
                Ok((
                    input,
                    RsaKeyExchange::Client {
                        encrypted_premaster: encrypted.to_vec(),
                    },
                ))
            }
            Role::Server => {
                let (input, modulus) = len16(input)?;
                let (input, exponent) = len16(input)?;
                Ok((
                    input,
                    RsaKeyExchange::Server {
                        modulus: modulus.to_vec(),
                        exponent: exponent.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: TlsVersion) {
        match self {
            RsaKeyExchange::Client {
                encrypted_premaster,
            } => {
                if version == TlsVersion::Ssl30 {
                    output.extend_from_slice(encrypted_premaster);
                } else {
                    output.put_bytes16(encrypted_premaster);
                }
            }
            RsaKeyExchange::Server { modulus, exponent } => {
                output.put_bytes16(modulus);
                output.put_bytes16(exponent);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ssl3_has_no_length_prefix() {
        let m = RsaKeyExchange::Client {
            encrypted_premaster: vec![0xAB; 4],
        };

        let mut tls = Vec::new();
        m.serialize(&mut tls, TlsVersion::Tls12);
        assert_eq!(tls, [0x00, 0x04, 0xAB, 0xAB, 0xAB, 0xAB]);

        let mut ssl = Vec::new();
        m.serialize(&mut ssl, TlsVersion::Ssl30);
        assert_eq!(ssl, [0xAB; 4]);

        let (_, a) = RsaKeyExchange::parse(&tls, Role::Client, TlsVersion::Tls12).unwrap();
        let (_, b) = RsaKeyExchange::parse(&ssl, Role::Client, TlsVersion::Ssl30).unwrap();
        assert_eq!(a, m);
        assert_eq!(b, m);
    }

    #[test]
    fn export_temp_key() {
        let bytes = [0x00, 0x02, 0xC1, 0x01, 0x00, 0x03, 0x01, 0x00, 0x01];
        let (rest, m) = RsaKeyExchange::parse(&bytes, Role::Server, TlsVersion::Tls10).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            m,
            RsaKeyExchange::Server {
                modulus: vec![0xC1, 0x01],
                exponent: vec![1, 0, 1],
            }
        );
    }
}
