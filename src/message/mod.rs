//! Wire codecs for records and handshake messages.
//!
//! Every message owns its data. Bodies whose shape depends on negotiated
//! state are parsed through a [`ParseContext`].

mod certificate;
mod certificate_request;
mod certificate_verify;
mod change_cipher_spec;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod encrypted_extensions;
mod finished;
mod handshake;
mod parse_context;
mod record;
mod server_hello;
mod server_key_exchange;

pub use certificate::{Certificate, CertificateEntry};
pub use certificate_request::{CertificateRequest, ECDSA_SIGN, RSA_SIGN};
pub use certificate_verify::{tls13_signed_content, CertificateVerify};
pub use change_cipher_spec::ChangeCipherSpec;
pub use client_hello::{ClientHello, MAX_SESSION_ID_LEN};
pub use client_key_exchange::ClientKeyExchange;
pub use digitally_signed::{carries_scheme, DigitallySigned};
pub use encrypted_extensions::EncryptedExtensions;
pub use finished::{verify_data_len, Finished};
pub use handshake::{frame, HandshakeType, Header, HEADER_LEN, MAX_HANDSHAKE_LEN};
pub use parse_context::ParseContext;
pub use record::{DatagramSequence, Record, DATAGRAM_HEADER_LEN, MAX_CIPHERTEXT_LEN};
pub use record::STREAM_HEADER_LEN;
pub use server_hello::{ServerHello, DOWNGRADE_TLS11, DOWNGRADE_TLS12};
pub use server_hello::HELLO_RETRY_REQUEST_RANDOM;
pub use server_key_exchange::{signed_params, ServerKeyExchange};

use crate::codec::parse_all;
use crate::context::Source;
use crate::types::{Alert, AlertDescription, ContentType, TlsVersion};
use crate::Error;

/// The kinds of message recorded in the handshake ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ClientHello,
    ServerHello,
    /// A ServerHello carrying the retry random.
    HelloRetryRequest,
    EncryptedExtensions,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    ClientKeyExchange,
    CertificateVerify,
    Finished,
    ChangeCipherSpec,
    Alert,
    ApplicationData,
}

impl MessageKind {
    pub fn handshake_type(&self) -> Option<HandshakeType> {
        Some(match self {
            MessageKind::ClientHello => HandshakeType::ClientHello,
            MessageKind::ServerHello | MessageKind::HelloRetryRequest => {
                HandshakeType::ServerHello
            }
            MessageKind::EncryptedExtensions => HandshakeType::EncryptedExtensions,
            MessageKind::Certificate => HandshakeType::Certificate,
            MessageKind::ServerKeyExchange => HandshakeType::ServerKeyExchange,
            MessageKind::CertificateRequest => HandshakeType::CertificateRequest,
            MessageKind::ServerHelloDone => HandshakeType::ServerHelloDone,
            MessageKind::ClientKeyExchange => HandshakeType::ClientKeyExchange,
            MessageKind::CertificateVerify => HandshakeType::CertificateVerify,
            MessageKind::Finished => HandshakeType::Finished,
            MessageKind::ChangeCipherSpec | MessageKind::Alert | MessageKind::ApplicationData => {
                return None
            }
        })
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            MessageKind::ChangeCipherSpec => ContentType::ChangeCipherSpec,
            MessageKind::Alert => ContentType::Alert,
            MessageKind::ApplicationData => ContentType::ApplicationData,
            _ => ContentType::Handshake,
        }
    }

    pub fn is_handshake(&self) -> bool {
        self.handshake_type().is_some()
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    EncryptedExtensions(EncryptedExtensions),
    Certificate(Certificate),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    ClientKeyExchange(ClientKeyExchange),
    CertificateVerify(CertificateVerify),
    Finished(Finished),
    ChangeCipherSpec,
    Alert(Alert),
    ApplicationData(Vec<u8>),
}

impl TlsMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            TlsMessage::ClientHello(_) => MessageKind::ClientHello,
            TlsMessage::ServerHello(sh) if sh.is_hello_retry_request() => {
                MessageKind::HelloRetryRequest
            }
            TlsMessage::ServerHello(_) => MessageKind::ServerHello,
            TlsMessage::EncryptedExtensions(_) => MessageKind::EncryptedExtensions,
            TlsMessage::Certificate(_) => MessageKind::Certificate,
            TlsMessage::ServerKeyExchange(_) => MessageKind::ServerKeyExchange,
            TlsMessage::CertificateRequest(_) => MessageKind::CertificateRequest,
            TlsMessage::ServerHelloDone => MessageKind::ServerHelloDone,
            TlsMessage::ClientKeyExchange(_) => MessageKind::ClientKeyExchange,
            TlsMessage::CertificateVerify(_) => MessageKind::CertificateVerify,
            TlsMessage::Finished(_) => MessageKind::Finished,
            TlsMessage::ChangeCipherSpec => MessageKind::ChangeCipherSpec,
            TlsMessage::Alert(_) => MessageKind::Alert,
            TlsMessage::ApplicationData(_) => MessageKind::ApplicationData,
        }
    }

    /// Record payload of this message. Handshake messages carry their header.
    pub fn serialize(&self, version: TlsVersion) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            TlsMessage::ClientHello(m) => m.serialize(&mut body),
            TlsMessage::ServerHello(m) => m.serialize(&mut body),
            TlsMessage::EncryptedExtensions(m) => m.serialize(&mut body),
            TlsMessage::Certificate(m) => m.serialize(&mut body, version),
            TlsMessage::ServerKeyExchange(m) => m.serialize(&mut body),
            TlsMessage::CertificateRequest(m) => m.serialize(&mut body, version),
            TlsMessage::ServerHelloDone => {}
            TlsMessage::ClientKeyExchange(m) => m.serialize(&mut body, version),
            TlsMessage::CertificateVerify(m) => m.serialize(&mut body),
            TlsMessage::Finished(m) => m.serialize(&mut body),
            TlsMessage::ChangeCipherSpec => {
                ChangeCipherSpec.serialize(&mut body);
                return body;
            }
            TlsMessage::Alert(a) => {
                a.serialize(&mut body);
                return body;
            }
            TlsMessage::ApplicationData(data) => return data.clone(),
        }
        match self.kind().handshake_type() {
            Some(t) => frame(t, &body),
            None => body,
        }
    }

    /// Decode one complete handshake body.
    ///
    /// Returns `None` for messages that are recognised but not acted on.
    pub fn parse_handshake(
        msg_type: HandshakeType,
        body: &[u8],
        ctx: &ParseContext,
    ) -> Result<Option<TlsMessage>, Error> {
        if let Err(reason) = ctx.check_message_type(msg_type) {
            debug!("Rejecting {:?}: {}", msg_type, reason);
            return Err(Error::fatal(AlertDescription::UnexpectedMessage));
        }

        let version = ctx.version;
        let message = match msg_type {
            HandshakeType::ClientHello => {
                TlsMessage::ClientHello(parse_all(body, ClientHello::parse)?)
            }
            HandshakeType::ServerHello => {
                TlsMessage::ServerHello(parse_all(body, ServerHello::parse)?)
            }
            HandshakeType::EncryptedExtensions => {
                TlsMessage::EncryptedExtensions(parse_all(body, EncryptedExtensions::parse)?)
            }
            HandshakeType::Certificate => {
                TlsMessage::Certificate(parse_all(body, |i| Certificate::parse(i, version))?)
            }
            HandshakeType::ServerKeyExchange => {
                let factory = ctx.key_exchange()?;
                let signed = ctx.signed_server_params();
                TlsMessage::ServerKeyExchange(parse_all(body, |i| {
                    ServerKeyExchange::parse(i, factory, version, signed)
                })?)
            }
            HandshakeType::CertificateRequest => TlsMessage::CertificateRequest(parse_all(
                body,
                |i| CertificateRequest::parse(i, version),
            )?),
            HandshakeType::ServerHelloDone => {
                if !body.is_empty() {
                    return Err(Error::decode());
                }
                TlsMessage::ServerHelloDone
            }
            HandshakeType::ClientKeyExchange => {
                let factory = ctx.key_exchange()?;
                TlsMessage::ClientKeyExchange(parse_all(body, |i| {
                    ClientKeyExchange::parse(i, factory, version)
                })?)
            }
            HandshakeType::CertificateVerify => TlsMessage::CertificateVerify(parse_all(
                body,
                |i| CertificateVerify::parse(i, version),
            )?),
            HandshakeType::Finished => TlsMessage::Finished(parse_all(body, Finished::parse)?),

            HandshakeType::HelloRequest | HandshakeType::NewSessionTicket => return Ok(None),

            HandshakeType::KeyUpdate | HandshakeType::Unknown(_) => {
                return Err(Error::fatal(AlertDescription::UnexpectedMessage))
            }
        };
        Ok(Some(message))
    }
}

/// A message with its direction and its bytes as they enter the transcript.
#[derive(Debug, Clone)]
pub struct Message {
    pub source: Source,
    pub body: TlsMessage,
    raw: Vec<u8>,
}

impl Message {
    /// A message produced locally, encoded for `version`.
    pub fn local(body: TlsMessage, version: TlsVersion) -> Self {
        let raw = body.serialize(version);
        Message {
            source: Source::Local,
            body,
            raw,
        }
    }

    /// A message received from the peer, with the bytes it arrived as.
    pub fn remote(body: TlsMessage, raw: Vec<u8>) -> Self {
        Message {
            source: Source::Remote,
            body,
            raw,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Record payload bytes.
    #[inline(always)]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Role;
    use crate::types::{AlertLevel, CipherSuite};

    #[test]
    fn handshake_messages_are_framed() {
        let raw = TlsMessage::ServerHelloDone.serialize(TlsVersion::Tls12);
        assert_eq!(raw, vec![0x0E, 0, 0, 0]);

        let raw = TlsMessage::Finished(Finished::new(vec![7; 12])).serialize(TlsVersion::Tls12);
        assert_eq!(raw[..4], [0x14, 0, 0, 12]);
    }

    #[test]
    fn non_handshake_messages_are_bare() {
        assert_eq!(TlsMessage::ChangeCipherSpec.serialize(TlsVersion::Tls12), vec![1]);
        let alert = Alert::new(AlertLevel::Fatal, AlertDescription::DecodeError);
        assert_eq!(TlsMessage::Alert(alert).serialize(TlsVersion::Tls12), vec![2, 50]);
    }

    #[test]
    fn server_hello_done_must_be_empty() {
        let ctx = ParseContext::new(TlsVersion::Tls12, Role::Server);
        assert!(TlsMessage::parse_handshake(HandshakeType::ServerHelloDone, &[0], &ctx).is_err());
        assert_eq!(
            TlsMessage::parse_handshake(HandshakeType::ServerHelloDone, &[], &ctx).unwrap(),
            Some(TlsMessage::ServerHelloDone)
        );
    }

    #[test]
    fn client_key_exchange_needs_the_suite() {
        let ctx = ParseContext::new(TlsVersion::Tls12, Role::Client);
        let err =
            TlsMessage::parse_handshake(HandshakeType::ClientKeyExchange, &[0, 1, 5], &ctx)
                .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let ctx = ctx.with_suite(CipherSuite::DHE_RSA_AES128_CBC_SHA.params());
        let msg = TlsMessage::parse_handshake(HandshakeType::ClientKeyExchange, &[0, 1, 5], &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), MessageKind::ClientKeyExchange);
    }

    #[test]
    fn version_gates_message_types() {
        let ctx = ParseContext::new(TlsVersion::Tls13, Role::Server);
        let err = TlsMessage::parse_handshake(HandshakeType::ServerHelloDone, &[], &ctx)
            .unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));

        assert_eq!(
            TlsMessage::parse_handshake(HandshakeType::NewSessionTicket, &[1, 2], &ctx).unwrap(),
            None
        );
    }

    #[test]
    fn local_message_keeps_its_bytes() {
        let m = Message::local(TlsMessage::ServerHelloDone, TlsVersion::Tls12);
        assert_eq!(m.source, Source::Local);
        assert_eq!(m.raw(), &[0x0E, 0, 0, 0]);
    }
}
