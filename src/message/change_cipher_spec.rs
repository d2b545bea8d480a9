use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ChangeCipherSpec> {
        let (rest, value) = be_u8(input)?;
        if value != 1 {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        Ok((rest, ChangeCipherSpec))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_change_cipher_spec() {
        let (rest, _) = ChangeCipherSpec::parse(&[1]).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn parse_invalid_change_cipher_spec() {
        assert!(ChangeCipherSpec::parse(&[0]).is_err());
        assert!(ChangeCipherSpec::parse(&[]).is_err());
    }
}
