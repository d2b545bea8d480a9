//! SRP key exchange (RFC 5054) with SHA-1.

use nom::IResult;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;

use crate::codec::{len16, len8, WriteExt};
use crate::context::Role;
use crate::crypto::provider::CryptoProvider;
use crate::secret::Secret;
use crate::types::HashAlgorithm;
use crate::Error;

/// The 1024 bit group of RFC 5054 Appendix A.
const GROUP_1024_N: &str = "\
EEAF0AB9ADB38DD69C33F80AFA8FC5E86072618775FF3C0B9EA2314C9C256576\
D674DF7496EA81D3383B4813D692C6E0E0D5D8E250B98BE48E495C1D6089DAD1\
5DC7D7B46154D6B6CE8EF4AD69B15D4982559B297BCF1885C529F566660E57EC\
68EDBC3C05726CC02FD4CBF4976EAA9AFD5138FE8376435B9FC61D2FC0EB06E3";

/// Wire shape of the SRP key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrpKeyExchange {
    /// `A (len16)`
    Client { a: Vec<u8> },
    /// `N (len16) g (len16) s (len8) B (len16)`
    Server {
        n: Vec<u8>,
        g: Vec<u8>,
        s: Vec<u8>,
        b: Vec<u8>,
    },
}

impl SrpKeyExchange {
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], SrpKeyExchange> {
        match sender {
            Role::Client => {
                let (input, a) = len16(input)?;
                Ok((input, SrpKeyExchange::Client { a: a.to_vec() }))
            }
            Role::Server => {
                let (input, n) = len16(input)?;
                let (input, g) = len16(input)?;
                let (input, s) = len8(input)?;
                let (input, b) = len16(input)?;
                Ok((
                    input,
                    SrpKeyExchange::Server {
                        n: n.to_vec(),
                        g: g.to_vec(),
                        s: s.to_vec(),
                        b: b.to_vec(),
                    },
                ))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            SrpKeyExchange::Client { a } => output.put_bytes16(a),
            SrpKeyExchange::Server { n, g, s, b } => {
                output.put_bytes16(n);
                output.put_bytes16(g);
                output.put_bytes8(s);
                output.put_bytes16(b);
            }
        }
    }
}

/// Group parameters `N` and `g`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpGroup {
    pub n: BigUint,
    pub g: BigUint,
}

impl SrpGroup {
    pub fn rfc5054_1024() -> Self {
        SrpGroup {
            n: BigUint::parse_bytes(GROUP_1024_N.as_bytes(), 16).unwrap_or_default(),
            g: BigUint::from(2u8),
        }
    }

    pub fn from_bytes(n: &[u8], g: &[u8]) -> Self {
        SrpGroup {
            n: BigUint::from_bytes_be(n),
            g: BigUint::from_bytes_be(g),
        }
    }

    fn n_len(&self) -> usize {
        ((self.n.bits() + 7) / 8) as usize
    }

    /// Left pad to the length of N.
    fn pad(&self, v: &BigUint) -> Vec<u8> {
        let bytes = v.to_bytes_be();
        let len = self.n_len();
        if bytes.len() >= len {
            return bytes;
        }
        let mut out = vec![0; len - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }

    /// Only the groups of RFC 5054 Appendix A are accepted from a server.
    pub fn is_known(&self) -> bool {
        *self == SrpGroup::rfc5054_1024()
    }
}

fn sha1(provider: &CryptoProvider, parts: &[&[u8]]) -> Result<BigUint, Error> {
    let d = provider
        .digest(HashAlgorithm::SHA1, parts)
        .map_err(Error::crypto)?;
    Ok(BigUint::from_bytes_be(&d))
}

/// k = SHA1(N | PAD(g))
fn multiplier(provider: &CryptoProvider, group: &SrpGroup) -> Result<BigUint, Error> {
    sha1(provider, &[&group.n.to_bytes_be(), &group.pad(&group.g)])
}

/// x = SHA1(s | SHA1(I | ":" | P))
fn private_key(
    provider: &CryptoProvider,
    salt: &[u8],
    username: &[u8],
    password: &[u8],
) -> Result<BigUint, Error> {
    let inner = provider
        .digest(HashAlgorithm::SHA1, &[username, b":", password])
        .map_err(Error::crypto)?;
    sha1(provider, &[salt, &inner])
}

/// u = SHA1(PAD(A) | PAD(B))
fn scrambler(
    provider: &CryptoProvider,
    group: &SrpGroup,
    a: &BigUint,
    b: &BigUint,
) -> Result<BigUint, Error> {
    sha1(provider, &[&group.pad(a), &group.pad(b)])
}

/// Password verifier `v = g^x % N`, as stored by the server.
pub fn verifier(
    provider: &CryptoProvider,
    group: &SrpGroup,
    salt: &[u8],
    username: &[u8],
    password: &[u8],
) -> Result<Vec<u8>, Error> {
    let x = private_key(provider, salt, username, password)?;
    Ok(group.g.modpow(&x, &group.n).to_bytes_be())
}

/// Ephemeral SRP state of one side.
pub struct SrpKeyPair {
    group: SrpGroup,
    private: BigUint,
    public: BigUint,
    /// Server side: the verifier of the client's password.
    verifier: Option<BigUint>,
}

impl std::fmt::Debug for SrpKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpKeyPair")
            .field("n_bits", &self.group.n.bits())
            .field("server", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

impl SrpKeyPair {
    fn random_private() -> BigUint {
        OsRng.gen_biguint(256)
    }

    /// Client: `A = g^a % N`.
    pub fn client(group: SrpGroup) -> Self {
        Self::client_with(group, Self::random_private())
    }

    fn client_with(group: SrpGroup, a: BigUint) -> Self {
        let public = group.g.modpow(&a, &group.n);
        SrpKeyPair {
            group,
            private: a,
            public,
            verifier: None,
        }
    }

    /// Server: `B = k*v + g^b % N`.
    pub fn server(
        provider: &CryptoProvider,
        group: SrpGroup,
        verifier: &[u8],
    ) -> Result<Self, Error> {
        Self::server_with(provider, group, verifier, Self::random_private())
    }

    fn server_with(
        provider: &CryptoProvider,
        group: SrpGroup,
        verifier: &[u8],
        b: BigUint,
    ) -> Result<Self, Error> {
        let v = BigUint::from_bytes_be(verifier);
        let k = multiplier(provider, &group)?;
        let public = (&k * &v + group.g.modpow(&b, &group.n)) % &group.n;
        Ok(SrpKeyPair {
            group,
            private: b,
            public,
            verifier: Some(v),
        })
    }

    pub fn group(&self) -> &SrpGroup {
        &self.group
    }

    pub fn public(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Client premaster: `S = (B - k*g^x) ^ (a + u*x) % N`.
    pub fn client_secret(
        self,
        provider: &CryptoProvider,
        server_public: &[u8],
        salt: &[u8],
        username: &[u8],
        password: &[u8],
    ) -> Result<Secret, Error> {
        let n = &self.group.n;
        let b = BigUint::from_bytes_be(server_public);
        if (&b % n) == BigUint::from(0u8) {
            return Err(Error::fatal(crate::types::AlertDescription::IllegalParameter));
        }
        let k = multiplier(provider, &self.group)?;
        let x = private_key(provider, salt, username, password)?;
        let u = scrambler(provider, &self.group, &self.public, &b)?;

        let gx = self.group.g.modpow(&x, n);
        let kgx = (&k * &gx) % n;
        let base = ((&b % n) + n - kgx) % n;
        let exp = &self.private + &u * &x;
        Ok(Secret::new(base.modpow(&exp, n).to_bytes_be()))
    }

    /// Server premaster: `S = (A * v^u) ^ b % N`.
    pub fn server_secret(
        self,
        provider: &CryptoProvider,
        client_public: &[u8],
    ) -> Result<Secret, Error> {
        let n = &self.group.n;
        let a = BigUint::from_bytes_be(client_public);
        if (&a % n) == BigUint::from(0u8) {
            return Err(Error::fatal(crate::types::AlertDescription::IllegalParameter));
        }
        let Some(v) = &self.verifier else {
            return Err(Error::crypto("SRP server state without verifier"));
        };
        let u = scrambler(provider, &self.group, &a, &self.public)?;
        let base = (&a * v.modpow(&u, n)) % n;
        Ok(Secret::new(base.modpow(&self.private, n).to_bytes_be()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // RFC 5054 Appendix B
    const SALT: &str = "BEB25379D1A8581EB5A727673A2441EE";
    const A_PRIV: &str = "60975527035CF2AD1989806F0407210BC81EDC04E2762A56AFD529DDDA2D4393";
    const B_PRIV: &str = "E487CB59D31AC550471E81F00F6928E01DDA08E974A004F49E61F5D105284D20";
    const PREMASTER: &str = "\
        B0DC82BABCF30674AE450C0287745E7990A3381F63B387AAF271A10D233861E3\
        59B48220F7C4693C9AE12B0A6F67809F0876E2D013800D6C41BB59B6D5979B5C\
        00A172B4A2A5903A0BDCAF8A709585EB2AFAFA8F3499B200210DCC1F10EB3394\
        3CD67FC88A2F39A4BE5BEC4EC0A3212DC346D7E474B29EDE8A469FFECA686E5A";

    #[test]
    fn rfc5054_vector() {
        let p = default_provider();
        let group = SrpGroup::rfc5054_1024();
        let salt = hex(SALT);
        let premaster = hex(&PREMASTER.replace(' ', ""));

        let v = verifier(&p, &group, &salt, b"alice", b"password123").unwrap();
        assert_eq!(&v[..4], &[0x7E, 0x27, 0x3D, 0xE8]);

        let client = SrpKeyPair::client_with(group.clone(), BigUint::from_bytes_be(&hex(A_PRIV)));
        let server =
            SrpKeyPair::server_with(&p, group, &v, BigUint::from_bytes_be(&hex(B_PRIV))).unwrap();
        let a_pub = client.public();
        let b_pub = server.public();

        let cs = client
            .client_secret(&p, &b_pub, &salt, b"alice", b"password123")
            .unwrap();
        let ss = server.server_secret(&p, &a_pub).unwrap();
        assert_eq!(cs.as_bytes(), &premaster[..]);
        assert_eq!(ss.as_bytes(), &premaster[..]);
    }

    #[test]
    fn wrong_password_disagrees() {
        let p = default_provider();
        let group = SrpGroup::rfc5054_1024();
        let v = verifier(&p, &group, b"salt", b"bob", b"right").unwrap();
        let client = SrpKeyPair::client(group.clone());
        let server = SrpKeyPair::server(&p, group, &v).unwrap();
        let (a_pub, b_pub) = (client.public(), server.public());
        let cs = client
            .client_secret(&p, &b_pub, b"salt", b"bob", b"wrong")
            .unwrap();
        let ss = server.server_secret(&p, &a_pub).unwrap();
        assert_ne!(cs.as_bytes(), ss.as_bytes());
    }

    #[test]
    fn zero_public_is_rejected() {
        let p = default_provider();
        let group = SrpGroup::rfc5054_1024();
        let n = group.n.to_bytes_be();
        let v = verifier(&p, &group, b"s", b"u", b"p").unwrap();
        let server = SrpKeyPair::server(&p, group, &v).unwrap();
        assert!(server.server_secret(&p, &n).is_err());
    }

    #[test]
    fn server_wire_shape() {
        let m = SrpKeyExchange::Server {
            n: vec![0xAA, 0xBB],
            g: vec![2],
            s: vec![9, 9, 9],
            b: vec![7],
        };
        let mut out = Vec::new();
        m.serialize(&mut out);
        assert_eq!(
            out,
            [0x00, 0x02, 0xAA, 0xBB, 0x00, 0x01, 2, 0x03, 9, 9, 9, 0x00, 0x01, 7]
        );
        let (rest, parsed) = SrpKeyExchange::parse(&out, Role::Server).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, m);
    }
}
