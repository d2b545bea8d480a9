use nom::IResult;

use crate::context::Role;
use crate::key_exchange::{KeyExchange, KeyExchangeFactory};
use crate::types::TlsVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub exchange: KeyExchange,
}

impl ClientKeyExchange {
    pub fn new(exchange: KeyExchange) -> Self {
        ClientKeyExchange { exchange }
    }

    pub fn parse(
        input: &[u8],
        factory: KeyExchangeFactory,
        version: TlsVersion,
    ) -> IResult<&[u8], ClientKeyExchange> {
        let (input, exchange) = factory.parse(input, Role::Client, version)?;
        Ok((input, ClientKeyExchange { exchange }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: TlsVersion) {
        self.exchange.serialize(output, version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_exchange::{DhKeyExchange, RsaKeyExchange};
    use crate::types::CipherSuite;

    fn factory(suite: CipherSuite) -> KeyExchangeFactory {
        KeyExchangeFactory::for_suite(&suite.params().unwrap())
    }

    #[test]
    fn dh_public_value() {
        const MESSAGE: &[u8] = &[
            0x00, 0x03, // Yc length
            0x01, 0x02, 0x03, // Yc
        ];
        let cke = ClientKeyExchange::new(KeyExchange::Dh(DhKeyExchange::Client {
            y: vec![1, 2, 3],
        }));

        let mut serialized = Vec::new();
        cke.serialize(&mut serialized, TlsVersion::Tls12);
        assert_eq!(serialized, MESSAGE);

        let (rest, parsed) = ClientKeyExchange::parse(
            &serialized,
            factory(CipherSuite::DHE_RSA_AES128_CBC_SHA),
            TlsVersion::Tls12,
        )
        .unwrap();
        assert_eq!(parsed, cke);
        assert!(rest.is_empty());
    }

    #[test]
    fn ssl3_rsa_has_no_length() {
        let cke = ClientKeyExchange::new(KeyExchange::Rsa(RsaKeyExchange::Client {
            encrypted_premaster: vec![9; 4],
        }));

        let mut ssl3 = Vec::new();
        cke.serialize(&mut ssl3, TlsVersion::Ssl30);
        assert_eq!(ssl3, vec![9; 4]);

        let mut tls = Vec::new();
        cke.serialize(&mut tls, TlsVersion::Tls10);
        assert_eq!(tls, vec![0, 4, 9, 9, 9, 9]);
    }
}
