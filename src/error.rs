use thiserror::Error;

use crate::types::{Alert, AlertDescription, AlertLevel};

/// Errors surfaced by the engine.
///
/// Protocol violations are modelled as TLS alerts. Conditions that mean the engine was
/// driven out of contract, such as decrypting before a cipher is installed, are
/// [`InternalError`] and are never silently recovered from.
#[derive(Debug, Error)]
pub enum Error {
    /// A fatal alert raised locally. It is transmitted to the peer before failing.
    #[error("Fatal alert: {0}")]
    Alert(Alert),

    /// A fatal alert received from the peer.
    #[error("Peer sent fatal alert: {0}")]
    PeerAlert(Alert),

    /// Local programming or contract error.
    #[error("Internal error: {0}")]
    Internal(InternalError),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Transport failure.
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is closed.
    #[error("Connection closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("Sequence number is not allowed to wrap")]
    SequenceOverflow,

    #[error("Property not negotiated yet: {0}")]
    MissingProperty(&'static str),

    #[error("No cipher installed for this direction")]
    CipherNotInstalled,

    #[error("Key exchange decoded before the cipher suite was negotiated")]
    KeyExchangeNotNegotiated,

    #[error("Crypto failure: {0}")]
    Crypto(String),

    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Fatal alert with the given description.
    pub fn fatal(description: AlertDescription) -> Self {
        Error::Alert(Alert::new(AlertLevel::Fatal, description))
    }

    pub(crate) fn decode() -> Self {
        Self::fatal(AlertDescription::DecodeError)
    }

    pub(crate) fn crypto(message: impl Into<String>) -> Self {
        Error::Internal(InternalError::Crypto(message.into()))
    }

    /// The alert to put on the wire before tearing the connection down, if any.
    ///
    /// Internal errors go out as `internal_error`. Peer alerts and transport
    /// failures send nothing.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            Error::Alert(alert) => Some(*alert),
            Error::Internal(_) => Some(Alert::new(
                AlertLevel::Fatal,
                AlertDescription::InternalError,
            )),
            _ => None,
        }
    }

    /// The alert description if this error is a locally raised or received alert.
    pub fn description(&self) -> Option<AlertDescription> {
        match self {
            Error::Alert(a) | Error::PeerAlert(a) => Some(a.description),
            _ => None,
        }
    }
}

impl From<InternalError> for Error {
    fn from(value: InternalError) -> Self {
        Error::Internal(value)
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        trace!("Decode failure: {:?}", value.map_input(|i| i.len()));
        Error::decode()
    }
}
