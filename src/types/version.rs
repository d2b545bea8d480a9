use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

/// Protocol version as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub fn major(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        self.0 as u8
    }

    pub fn is_grease(&self) -> bool {
        is_grease_u16(self.0)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, v) = be_u16(input)?;
        Ok((input, ProtocolVersion(v)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.0.to_be_bytes());
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match TlsVersion::from_id(*self) {
            Some(v) => write!(f, "{:?}", v),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

/// GREASE values reserved by RFC 8701: 0x0A0A, 0x1A1A, ... 0xFAFA.
pub fn is_grease_u16(v: u16) -> bool {
    (v & 0x0f0f) == 0x0a0a && (v >> 8) == (v & 0xff)
}

/// Pick a random GREASE value.
pub fn grease_u16() -> u16 {
    use rand::Rng;
    let n: u16 = rand::thread_rng().gen_range(0..16);
    let b = (n << 4) | 0x0a;
    (b << 8) | b
}

/// Underlying transport of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Datagram,
}

/// The protocol versions spoken by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsVersion {
    Ssl30,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Dtls10,
    Dtls12,
    Dtls13,
}

impl TlsVersion {
    pub fn all() -> &'static [TlsVersion] {
        &[
            TlsVersion::Ssl30,
            TlsVersion::Tls10,
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            TlsVersion::Tls13,
            TlsVersion::Dtls10,
            TlsVersion::Dtls12,
            TlsVersion::Dtls13,
        ]
    }

    pub fn id(&self) -> ProtocolVersion {
        ProtocolVersion(match self {
            TlsVersion::Ssl30 => 0x0300,
            TlsVersion::Tls10 => 0x0301,
            TlsVersion::Tls11 => 0x0302,
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
            // DTLS versions are the 1-complement of the TLS ones.
            TlsVersion::Dtls10 => 0xfeff,
            TlsVersion::Dtls12 => 0xfefd,
            TlsVersion::Dtls13 => 0xfefc,
        })
    }

    pub fn from_id(id: ProtocolVersion) -> Option<TlsVersion> {
        TlsVersion::all().iter().copied().find(|v| v.id() == id)
    }

    pub fn transport(&self) -> Transport {
        match self {
            TlsVersion::Dtls10 | TlsVersion::Dtls12 | TlsVersion::Dtls13 => Transport::Datagram,
            _ => Transport::Stream,
        }
    }

    pub fn is_datagram(&self) -> bool {
        self.transport() == Transport::Datagram
    }

    pub fn is_tls13(&self) -> bool {
        matches!(self, TlsVersion::Tls13 | TlsVersion::Dtls13)
    }

    /// The stream version with the same cryptographic behavior.
    ///
    /// DTLS 1.0 is based on TLS 1.1, DTLS 1.2 on TLS 1.2 and DTLS 1.3 on TLS 1.3.
    pub fn stream_equivalent(&self) -> TlsVersion {
        match self {
            TlsVersion::Dtls10 => TlsVersion::Tls11,
            TlsVersion::Dtls12 => TlsVersion::Tls12,
            TlsVersion::Dtls13 => TlsVersion::Tls13,
            v => *v,
        }
    }

    fn rank(&self) -> u8 {
        match self.stream_equivalent() {
            TlsVersion::Ssl30 => 0,
            TlsVersion::Tls10 => 1,
            TlsVersion::Tls11 => 2,
            TlsVersion::Tls12 => 3,
            _ => 4,
        }
    }

    /// Whether this version is at least as new as `other`, comparing stream equivalents.
    #[inline(always)]
    pub fn is_at_least(&self, other: TlsVersion) -> bool {
        self.rank() >= other.rank()
    }

    /// Block ciphers carry a per-record explicit IV from TLS 1.1.
    pub fn uses_explicit_iv(&self) -> bool {
        self.is_at_least(TlsVersion::Tls11)
    }

    /// Version written in the record header and legacy_version fields.
    ///
    /// TLS 1.3 freezes these at TLS 1.2.
    pub fn legacy_id(&self) -> ProtocolVersion {
        match self {
            TlsVersion::Tls13 => TlsVersion::Tls12.id(),
            TlsVersion::Dtls13 => TlsVersion::Dtls12.id(),
            v => v.id(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_ids() {
        for v in TlsVersion::all() {
            assert_eq!(TlsVersion::from_id(v.id()), Some(*v));
        }
        assert_eq!(TlsVersion::Dtls12.id().0, 0xfefd);
        assert_eq!(TlsVersion::Tls13.legacy_id(), TlsVersion::Tls12.id());
    }

    #[test]
    fn ordering_uses_stream_equivalent() {
        assert!(TlsVersion::Dtls12.is_at_least(TlsVersion::Tls11));
        assert!(!TlsVersion::Tls10.is_at_least(TlsVersion::Tls11));
        assert!(!TlsVersion::Ssl30.uses_explicit_iv());
        assert!(TlsVersion::Dtls10.uses_explicit_iv());
    }

    #[test]
    fn grease() {
        for _ in 0..32 {
            assert!(is_grease_u16(grease_u16()));
        }
        assert!(is_grease_u16(0x3a3a));
        assert!(!is_grease_u16(0x3a4a));
        assert!(!is_grease_u16(0x0303));
    }
}
