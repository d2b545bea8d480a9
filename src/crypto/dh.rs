//! Finite field Diffie-Hellman.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;

use crate::secret::Secret;

const FFDHE2048_P: &str = "\
FFFFFFFFFFFFFFFFADF85458A2BB4A9AAFDC5620273D3CF1D8B9C583CE2D3695\
A9E13641146433FBCC939DCE249B3EF97D2FE363630C75D8F681B202AEC4617A\
D3DF1ED5D5FD65612433F51F5F066ED0856365553DED1AF3B557135E7F57C935\
984F0C70E0E68B77E2A689DAF3EFE8721DF158A136ADE73530ACCA4F483A797A\
BC0AB182B324FB61D108A94BB2C8E3FBB96ADAB760D7F4681D4F42A3DE394DF4\
AE56EDE76372BB190B07A7C8EE0A6D709E02FCE1CDF7E2ECC03404CD28342F61\
9172FE9CE98583FF8E4F1232EEF28183C3FE3B1B4C6FAD733BB5FCBC2EC22005\
C58EF1837D1683B2C6F34A26C1B2EFFA886B423861285C97FFFFFFFFFFFFFFFF";

/// Group parameters `p` and `g`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    pub p: BigUint,
    pub g: BigUint,
}

impl DhParams {
    /// The RFC 7919 ffdhe2048 group.
    pub fn ffdhe2048() -> Self {
        DhParams {
            p: BigUint::parse_bytes(FFDHE2048_P.as_bytes(), 16).unwrap_or_default(),
            g: BigUint::from(2u8),
        }
    }

    pub fn from_bytes(p: &[u8], g: &[u8]) -> Self {
        DhParams {
            p: BigUint::from_bytes_be(p),
            g: BigUint::from_bytes_be(g),
        }
    }

    pub fn p_len(&self) -> usize {
        ((self.p.bits() + 7) / 8) as usize
    }

    /// Reject degenerate groups: tiny moduli, even moduli, `g` outside `2..p-1`.
    pub fn is_acceptable(&self) -> bool {
        let one = BigUint::from(1u8);
        self.p.bits() >= 512
            && self.p.bit(0)
            && self.g > one
            && self.g < &self.p - &one
    }

    /// Whether `y` is a valid public value, i.e. in `2..p-1`.
    pub fn is_valid_public(&self, y: &BigUint) -> bool {
        let one = BigUint::from(1u8);
        *y > one && *y < &self.p - &one
    }
}

/// An ephemeral DH key pair.
pub struct DhKeyPair {
    params: DhParams,
    x: BigUint,
    y: BigUint,
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("p_bits", &self.params.p.bits())
            .finish_non_exhaustive()
    }
}

impl DhKeyPair {
    pub fn generate(params: DhParams) -> Self {
        let two = BigUint::from(2u8);
        let upper = &params.p - &two;
        let x = OsRng.gen_biguint_range(&two, &upper);
        let y = params.g.modpow(&x, &params.p);
        DhKeyPair { params, x, y }
    }

    pub fn params(&self) -> &DhParams {
        &self.params
    }

    /// Public value, big endian without leading zeros.
    pub fn public(&self) -> Vec<u8> {
        self.y.to_bytes_be()
    }

    /// Public value left padded to the length of `p`.
    pub fn public_padded(&self) -> Vec<u8> {
        pad(self.y.to_bytes_be(), self.params.p_len())
    }

    /// Shared secret `peer^x mod p`.
    ///
    /// With `padded` the secret keeps the length of `p` (TLS 1.3). Otherwise
    /// leading zero bytes are stripped (TLS 1.2 and earlier).
    pub fn agree(self, peer: &[u8], padded: bool) -> Result<Secret, String> {
        let peer = BigUint::from_bytes_be(peer);
        if !self.params.is_valid_public(&peer) {
            return Err("Invalid DH public value".to_string());
        }
        let z = peer.modpow(&self.x, &self.params.p).to_bytes_be();
        let z = if padded { pad(z, self.params.p_len()) } else { z };
        Ok(Secret::new(z))
    }
}

fn pad(bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes;
    }
    let mut out = vec![0; len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn agreement() {
        let params = DhParams::ffdhe2048();
        assert_eq!(params.p_len(), 256);
        assert!(params.is_acceptable());

        let a = DhKeyPair::generate(params.clone());
        let b = DhKeyPair::generate(params);
        let a_pub = a.public_padded();
        let b_pub = b.public();
        assert_eq!(a_pub.len(), 256);

        let za = a.agree(&b_pub, true).unwrap();
        let zb = b.agree(&a_pub, true).unwrap();
        assert_eq!(za.as_bytes(), zb.as_bytes());
    }

    #[test]
    fn rejects_trivial_public() {
        let a = DhKeyPair::generate(DhParams::ffdhe2048());
        assert!(a.agree(&[1], false).is_err());
    }
}
