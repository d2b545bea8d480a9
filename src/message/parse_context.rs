//! Parsing context for version-aware message parsing.
//!
//! Several bodies cannot be decoded on their own: the key exchange messages
//! depend on the negotiated suite, Certificate and CertificateRequest change
//! shape in TLS 1.3, and extensions depend on who sent them.

use crate::context::Role;
use crate::key_exchange::KeyExchangeFactory;
use crate::message::HandshakeType;
use crate::types::{Auth, CipherSuiteParams, TlsVersion};
use crate::{Error, InternalError};

#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    /// The negotiated version, or the highest configured one before ServerHello.
    pub version: TlsVersion,
    /// The negotiated cipher suite (if any).
    pub suite: Option<CipherSuiteParams>,
    /// Who sent the message being parsed.
    pub sender: Role,
}

impl ParseContext {
    pub fn new(version: TlsVersion, sender: Role) -> Self {
        Self {
            version,
            suite: None,
            sender,
        }
    }

    pub fn with_suite(mut self, suite: Option<CipherSuiteParams>) -> Self {
        self.suite = suite;
        self
    }

    /// Key exchange operations of the negotiated suite.
    ///
    /// Asking before the suite is known is a local bug.
    pub fn key_exchange(&self) -> Result<KeyExchangeFactory, Error> {
        self.suite
            .as_ref()
            .map(KeyExchangeFactory::for_suite)
            .ok_or_else(|| InternalError::KeyExchangeNotNegotiated.into())
    }

    /// Whether a ServerKeyExchange carries a signature after the parameters.
    pub fn signed_server_params(&self) -> bool {
        self.suite
            .map(|s| matches!(s.authentication, Auth::Rsa | Auth::Ecdsa))
            .unwrap_or(false)
    }

    /// Check if a handshake message type exists in this version.
    pub fn check_message_type(&self, msg_type: HandshakeType) -> Result<(), &'static str> {
        if self.version.is_tls13() {
            self.check_message_type_tls13(msg_type)
        } else {
            self.check_message_type_legacy(msg_type)
        }
    }

    fn check_message_type_legacy(&self, msg_type: HandshakeType) -> Result<(), &'static str> {
        match msg_type {
            HandshakeType::HelloRequest
            | HandshakeType::ClientHello
            | HandshakeType::ServerHello
            | HandshakeType::Certificate
            | HandshakeType::ServerKeyExchange
            | HandshakeType::CertificateRequest
            | HandshakeType::ServerHelloDone
            | HandshakeType::CertificateVerify
            | HandshakeType::ClientKeyExchange
            | HandshakeType::NewSessionTicket
            | HandshakeType::Finished => Ok(()),

            HandshakeType::EncryptedExtensions => Err("EncryptedExtensions before TLS 1.3"),
            HandshakeType::KeyUpdate => Err("KeyUpdate before TLS 1.3"),
            HandshakeType::Unknown(_) => Err("unknown handshake type"),
        }
    }

    fn check_message_type_tls13(&self, msg_type: HandshakeType) -> Result<(), &'static str> {
        match msg_type {
            HandshakeType::ClientHello
            | HandshakeType::ServerHello
            | HandshakeType::EncryptedExtensions
            | HandshakeType::Certificate
            | HandshakeType::CertificateRequest
            | HandshakeType::CertificateVerify
            | HandshakeType::Finished
            | HandshakeType::NewSessionTicket
            | HandshakeType::KeyUpdate => Ok(()),

            HandshakeType::HelloRequest => Err("HelloRequest in TLS 1.3"),
            HandshakeType::ServerKeyExchange => Err("ServerKeyExchange in TLS 1.3"),
            HandshakeType::ServerHelloDone => Err("ServerHelloDone in TLS 1.3"),
            HandshakeType::ClientKeyExchange => Err("ClientKeyExchange in TLS 1.3"),
            HandshakeType::Unknown(_) => Err("unknown handshake type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CipherSuite;

    #[test]
    fn tls12_rejects_tls13_messages() {
        let ctx = ParseContext::new(TlsVersion::Tls12, Role::Server);

        assert!(ctx
            .check_message_type(HandshakeType::EncryptedExtensions)
            .is_err());
        assert!(ctx.check_message_type(HandshakeType::KeyUpdate).is_err());

        assert!(ctx
            .check_message_type(HandshakeType::ServerKeyExchange)
            .is_ok());
        assert!(ctx.check_message_type(HandshakeType::ServerHelloDone).is_ok());
    }

    #[test]
    fn tls13_rejects_legacy_messages() {
        let ctx = ParseContext::new(TlsVersion::Tls13, Role::Client);

        assert!(ctx
            .check_message_type(HandshakeType::ClientKeyExchange)
            .is_err());
        assert!(ctx
            .check_message_type(HandshakeType::ServerHelloDone)
            .is_err());
        assert!(ctx.check_message_type(HandshakeType::HelloRequest).is_err());

        assert!(ctx
            .check_message_type(HandshakeType::EncryptedExtensions)
            .is_ok());
    }

    #[test]
    fn key_exchange_needs_a_suite() {
        let ctx = ParseContext::new(TlsVersion::Tls12, Role::Server);
        assert!(matches!(
            ctx.key_exchange(),
            Err(Error::Internal(InternalError::KeyExchangeNotNegotiated))
        ));

        let ctx = ctx.with_suite(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256.params());
        assert!(ctx.key_exchange().is_ok());
        assert!(ctx.signed_server_params());

        let ctx = ctx.with_suite(CipherSuite::PSK_AES128_CBC_SHA.params());
        assert!(!ctx.signed_server_params());
    }
}
