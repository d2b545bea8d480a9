use nom::IResult;

use super::DigitallySigned;
use crate::context::Role;
use crate::key_exchange::{KeyExchange, KeyExchangeFactory};
use crate::types::TlsVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub params: KeyExchange,
    /// The parameters exactly as they were on the wire. They are what gets signed.
    pub params_raw: Vec<u8>,
    pub signature: Option<DigitallySigned>,
}

impl ServerKeyExchange {
    pub fn new(params: KeyExchange, version: TlsVersion) -> Self {
        let mut params_raw = Vec::new();
        params.serialize(&mut params_raw, version);
        ServerKeyExchange {
            params,
            params_raw,
            signature: None,
        }
    }

    pub fn parse(
        input: &[u8],
        factory: KeyExchangeFactory,
        version: TlsVersion,
        signed: bool,
    ) -> IResult<&[u8], ServerKeyExchange> {
        let start = input;
        let (input, params) = factory.parse(input, Role::Server, version)?;
        let params_raw = start[..start.len() - input.len()].to_vec();

        let (input, signature) = if signed {
            let (input, signature) = DigitallySigned::parse(input, version)?;
            (input, Some(signature))
        } else {
            (input, None)
        };

        Ok((
            input,
            ServerKeyExchange {
                params,
                params_raw,
                signature,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.params_raw);
        if let Some(signature) = &self.signature {
            signature.serialize(output);
        }
    }
}

/// client_random || server_random || params, as covered by the signature.
pub fn signed_params(client_random: &[u8], server_random: &[u8], params: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + params.len());
    out.extend_from_slice(client_random);
    out.extend_from_slice(server_random);
    out.extend_from_slice(params);
    out
}
