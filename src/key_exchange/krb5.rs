//! Kerberos key exchange (RFC 2712) client message. Only the wire codec is provided.

use nom::IResult;

use crate::codec::{len16, WriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Krb5KeyExchange {
    pub ticket: Vec<u8>,
    pub authenticator: Vec<u8>,
    pub encrypted_premaster: Vec<u8>,
}

impl Krb5KeyExchange {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Krb5KeyExchange> {
        let (input, ticket) = len16(input)?;
        let (input, authenticator) = len16(input)?;
        let (input, encrypted_premaster) = len16(input)?;
        Ok((
            input,
            Krb5KeyExchange {
                ticket: ticket.to_vec(),
                authenticator: authenticator.to_vec(),
                encrypted_premaster: encrypted_premaster.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.put_bytes16(&self.ticket);
        output.put_bytes16(&self.authenticator);
        output.put_bytes16(&self.encrypted_premaster);
    }
}
