//! Fixed-width integer and length-prefixed byte array readers/writers.
//!
//! Readers are nom parsers over a byte slice cursor. Writers extend a `Vec<u8>`.
//! All integers are big endian on the wire.

use nom::bytes::complete::take;
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::IResult;

use crate::Error;

pub fn len8(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u8)(input)
}

pub fn len16(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u16)(input)
}

pub fn len24(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_data(be_u24)(input)
}

/// 48 bit big endian integer, as used by the DTLS record sequence number.
pub fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, b) = take(6_usize)(input)?;
    let x = [0, 0, b[0], b[1], b[2], b[3], b[4], b[5]];
    Ok((input, u64::from_be_bytes(x)))
}

/// Run a parser over the whole input. Trailing bytes are a decode error.
pub fn parse_all<'a, T, F>(input: &'a [u8], mut parser: F) -> Result<T, Error>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
{
    let (rest, value) = parser(input)?;
    if !rest.is_empty() {
        trace!("{} trailing bytes after message", rest.len());
        return Err(Error::decode());
    }
    Ok(value)
}

/// Writer extensions for building wire messages.
pub trait WriteExt {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u24(&mut self, v: u32);
    fn put_u48(&mut self, v: u64);
    fn put_bytes8(&mut self, bytes: &[u8]);
    fn put_bytes16(&mut self, bytes: &[u8]);
    fn put_bytes24(&mut self, bytes: &[u8]);

    /// Write a 16 bit length followed by whatever `f` writes.
    fn with_len16<F: FnOnce(&mut Self)>(&mut self, f: F);

    /// Write a 24 bit length followed by whatever `f` writes.
    fn with_len24<F: FnOnce(&mut Self)>(&mut self, f: F);

    /// Write an 8 bit length followed by whatever `f` writes.
    fn with_len8<F: FnOnce(&mut Self)>(&mut self, f: F);
}

impl WriteExt for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u24(&mut self, v: u32) {
        debug_assert!(v < (1 << 24));
        self.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    fn put_u48(&mut self, v: u64) {
        debug_assert!(v < (1 << 48));
        self.extend_from_slice(&v.to_be_bytes()[2..]);
    }

    fn put_bytes8(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= u8::MAX as usize);
        self.push(bytes.len() as u8);
        self.extend_from_slice(bytes);
    }

    fn put_bytes16(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= u16::MAX as usize);
        self.put_u16(bytes.len() as u16);
        self.extend_from_slice(bytes);
    }

    fn put_bytes24(&mut self, bytes: &[u8]) {
        self.put_u24(bytes.len() as u32);
        self.extend_from_slice(bytes);
    }

    fn with_len16<F: FnOnce(&mut Self)>(&mut self, f: F) {
        let at = self.len();
        self.put_u16(0);
        f(self);
        let len = self.len() - at - 2;
        debug_assert!(len <= u16::MAX as usize);
        self[at..at + 2].copy_from_slice(&(len as u16).to_be_bytes());
    }

    fn with_len24<F: FnOnce(&mut Self)>(&mut self, f: F) {
        let at = self.len();
        self.put_u24(0);
        f(self);
        let len = self.len() - at - 3;
        self[at..at + 3].copy_from_slice(&(len as u32).to_be_bytes()[1..]);
    }

    fn with_len8<F: FnOnce(&mut Self)>(&mut self, f: F) {
        let at = self.len();
        self.push(0);
        f(self);
        let len = self.len() - at - 1;
        debug_assert!(len <= u8::MAX as usize);
        self[at] = len as u8;
    }
}
