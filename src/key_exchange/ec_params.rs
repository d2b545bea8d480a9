//! ECParameters of the ServerKeyExchange (RFC 4492 Section 5.4).

use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use crate::codec::{len8, WriteExt};
use crate::types::NamedGroup;

const EXPLICIT_PRIME: u8 = 1;
const EXPLICIT_CHAR2: u8 = 2;
const NAMED_CURVE: u8 = 3;

const BASIS_TRINOMIAL: u8 = 1;
const BASIS_PENTANOMIAL: u8 = 2;

/// Reduction polynomial of a characteristic-2 curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Char2Basis {
    Trinomial { k: Vec<u8> },
    Pentanomial { k1: Vec<u8>, k2: Vec<u8>, k3: Vec<u8> },
}

/// Curve coefficients and base point shared by both explicit forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
    /// Encoded base point.
    pub base: Vec<u8>,
    pub order: Vec<u8>,
    pub cofactor: Vec<u8>,
}

impl Curve {
    fn parse(input: &[u8]) -> IResult<&[u8], Curve> {
        let (input, a) = len8(input)?;
        let (input, b) = len8(input)?;
        let (input, base) = len8(input)?;
        let (input, order) = len8(input)?;
        let (input, cofactor) = len8(input)?;
        Ok((
            input,
            Curve {
                a: a.to_vec(),
                b: b.to_vec(),
                base: base.to_vec(),
                order: order.to_vec(),
                cofactor: cofactor.to_vec(),
            },
        ))
    }

    fn serialize(&self, output: &mut Vec<u8>) {
        output.put_bytes8(&self.a);
        output.put_bytes8(&self.b);
        output.put_bytes8(&self.base);
        output.put_bytes8(&self.order);
        output.put_bytes8(&self.cofactor);
    }
}

/// Domain parameters of the server's ECDH key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcParams {
    ExplicitPrime {
        prime: Vec<u8>,
        curve: Curve,
    },
    ExplicitChar2 {
        m: u16,
        basis: Char2Basis,
        curve: Curve,
    },
    NamedCurve(NamedGroup),
}

impl EcParams {
    pub fn named_group(&self) -> Option<NamedGroup> {
        match self {
            EcParams::NamedCurve(g) => Some(*g),
            _ => None,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], EcParams> {
        let (input, curve_type) = be_u8(input)?;
        match curve_type {
            EXPLICIT_PRIME => {
                let (input, prime) = len8(input)?;
                let (input, curve) = Curve::parse(input)?;
                Ok((
                    input,
                    EcParams::ExplicitPrime {
                        prime: prime.to_vec(),
                        curve,
                    },
                ))
            }
            EXPLICIT_CHAR2 => {
                let (input, m) = be_u16(input)?;
                let (input, basis_type) = be_u8(input)?;
                let (input, basis) = match basis_type {
                    BASIS_TRINOMIAL => {
                        let (input, k) = len8(input)?;
                        (input, Char2Basis::Trinomial { k: k.to_vec() })
                    }
                    BASIS_PENTANOMIAL => {
                        let (input, k1) = len8(input)?;
                        let (input, k2) = len8(input)?;
                        let (input, k3) = len8(input)?;
                        (
                            input,
                            Char2Basis::Pentanomial {
                                k1: k1.to_vec(),
                                k2: k2.to_vec(),
                                k3: k3.to_vec(),
                            },
                        )
                    }
                    _ => return Err(Err::Failure(NomError::new(input, ErrorKind::Tag))),
                };
                let (input, curve) = Curve::parse(input)?;
                Ok((input, EcParams::ExplicitChar2 { m, basis, curve }))
            }
            NAMED_CURVE => {
                let (input, group) = NamedGroup::parse(input)?;
                Ok((input, EcParams::NamedCurve(group)))
            }
            _ => Err(Err::Failure(NomError::new(input, ErrorKind::Tag))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            EcParams::ExplicitPrime { prime, curve } => {
                output.put_u8(EXPLICIT_PRIME);
                output.put_bytes8(prime);
                curve.serialize(output);
            }
            EcParams::ExplicitChar2 { m, basis, curve } => {
                output.put_u8(EXPLICIT_CHAR2);
                output.put_u16(*m);
                match basis {
                    Char2Basis::Trinomial { k } => {
                        output.put_u8(BASIS_TRINOMIAL);
                        output.put_bytes8(k);
                    }
                    Char2Basis::Pentanomial { k1, k2, k3 } => {
                        output.put_u8(BASIS_PENTANOMIAL);
                        output.put_bytes8(k1);
                        output.put_bytes8(k2);
                        output.put_bytes8(k3);
                    }
                }
                curve.serialize(output);
            }
            EcParams::NamedCurve(group) => {
                output.put_u8(NAMED_CURVE);
                group.serialize(output);
            }
        }
    }
}
