use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

/// Alert descriptions from the TLS alert registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    NoCertificate,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ExportRestriction,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    MissingExtension,
    UnsupportedExtension,
    CertificateUnobtainable,
    UnrecognizedName,
    BadCertificateStatusResponse,
    BadCertificateHashValue,
    UnknownPskIdentity,
    CertificateRequired,
    NoApplicationProtocol,
    Unknown(u8),
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        use AlertDescription::*;
        match value {
            0 => CloseNotify,
            10 => UnexpectedMessage,
            20 => BadRecordMac,
            21 => DecryptionFailed,
            22 => RecordOverflow,
            30 => DecompressionFailure,
            40 => HandshakeFailure,
            41 => NoCertificate,
            42 => BadCertificate,
            43 => UnsupportedCertificate,
            44 => CertificateRevoked,
            45 => CertificateExpired,
            46 => CertificateUnknown,
            47 => IllegalParameter,
            48 => UnknownCa,
            49 => AccessDenied,
            50 => DecodeError,
            51 => DecryptError,
            60 => ExportRestriction,
            70 => ProtocolVersion,
            71 => InsufficientSecurity,
            80 => InternalError,
            86 => InappropriateFallback,
            90 => UserCanceled,
            100 => NoRenegotiation,
            109 => MissingExtension,
            110 => UnsupportedExtension,
            111 => CertificateUnobtainable,
            112 => UnrecognizedName,
            113 => BadCertificateStatusResponse,
            114 => BadCertificateHashValue,
            115 => UnknownPskIdentity,
            116 => CertificateRequired,
            120 => NoApplicationProtocol,
            _ => Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        use AlertDescription::*;
        match self {
            CloseNotify => 0,
            UnexpectedMessage => 10,
            BadRecordMac => 20,
            DecryptionFailed => 21,
            RecordOverflow => 22,
            DecompressionFailure => 30,
            HandshakeFailure => 40,
            NoCertificate => 41,
            BadCertificate => 42,
            UnsupportedCertificate => 43,
            CertificateRevoked => 44,
            CertificateExpired => 45,
            CertificateUnknown => 46,
            IllegalParameter => 47,
            UnknownCa => 48,
            AccessDenied => 49,
            DecodeError => 50,
            DecryptError => 51,
            ExportRestriction => 60,
            ProtocolVersion => 70,
            InsufficientSecurity => 71,
            InternalError => 80,
            InappropriateFallback => 86,
            UserCanceled => 90,
            NoRenegotiation => 100,
            MissingExtension => 109,
            UnsupportedExtension => 110,
            CertificateUnobtainable => 111,
            UnrecognizedName => 112,
            BadCertificateStatusResponse => 113,
            BadCertificateHashValue => 114,
            UnknownPskIdentity => 115,
            CertificateRequired => 116,
            NoApplicationProtocol => 120,
            Unknown(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    pub fn close_notify() -> Self {
        Alert::new(AlertLevel::Warning, AlertDescription::CloseNotify)
    }

    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:?})", self.description, self.level)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = &[0x02, 0x0A];

    #[test]
    fn roundtrip() {
        let (rest, alert) = Alert::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(alert.level, AlertLevel::Fatal);
        assert_eq!(alert.description, AlertDescription::UnexpectedMessage);

        let mut serialized = Vec::new();
        alert.serialize(&mut serialized);
        assert_eq!(serialized, MESSAGE);
    }

    #[test]
    fn unknown_description_preserved() {
        let (_, alert) = Alert::parse(&[0x01, 0xEE]).unwrap();
        assert_eq!(alert.description, AlertDescription::Unknown(0xEE));
        assert!(!alert.is_fatal());
    }
}
