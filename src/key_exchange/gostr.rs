//! GOST R 34.10-2012 key transport (RFC 9189) client message.
//!
//! Only the wire codec is provided.

use nom::IResult;

use crate::codec::{len16, WriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GostrKeyExchange {
    pub public_key: Vec<u8>,
    pub additional_data: Vec<u8>,
}

impl GostrKeyExchange {
    pub fn parse(input: &[u8]) -> IResult<&[u8], GostrKeyExchange> {
        let (input, public_key) = len16(input)?;
        let (input, additional_data) = len16(input)?;
        Ok((
            input,
            GostrKeyExchange {
                public_key: public_key.to_vec(),
                additional_data: additional_data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.put_bytes16(&self.public_key);
        output.put_bytes16(&self.additional_data);
    }
}
