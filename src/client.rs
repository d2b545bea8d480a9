// TLS Client Handshake Flow:
//
// 1. Client sends ClientHello (extensions materialized from the config)
// 2. Server answers with ServerHello. The client checks version, downgrade
//    sentinel, cipher suite and the extensions it got back.
//    A TLS 1.3 server may first send a HelloRetryRequest naming a group the
//    client supports but sent no share for. The client then repeats its
//    ClientHello with one share for that group.
// 3. Before TLS 1.3:
//    - Server sends Certificate, ServerKeyExchange, CertificateRequest as
//      the suite needs them, then ServerHelloDone
//    - Client sends Certificate (if requested), ClientKeyExchange,
//      CertificateVerify (if it sent a certificate), ChangeCipherSpec, Finished
//    - Server sends ChangeCipherSpec, Finished
// 4. TLS 1.3:
//    - Server sends EncryptedExtensions, CertificateRequest (optional),
//      Certificate, CertificateVerify, Finished under handshake keys
//    - Client sends Certificate and CertificateVerify (if requested), Finished
// 5. Handshake complete, application data can flow
//
// Message order, transcript and keys are owned by the engine. This file only
// decides what the client says.

use std::sync::Arc;

use crate::config::Config;
use crate::context::Role;
use crate::engine::Engine;
use crate::extension::processor::{client_extensions, observe_server};
use crate::extension::{retry_key_share, Extension, ExtensionType, KeyShare, ModelExtension};
use crate::message::{Certificate, CertificateVerify, ClientHello, ClientKeyExchange};
use crate::message::{Finished, Message, MessageKind, ServerHello, TlsMessage};
use crate::types::{AlertDescription, CipherSuite, CompressionMethod, NamedGroup, TlsVersion};
use crate::{Error, InternalError, Output};

/// TLS client
pub struct Client {
    config: Arc<Config>,

    /// Current client state.
    state: ClientState,

    /// Engine in common between server and client.
    engine: Engine,

    /// TLS 1.3 certificate_request_context to echo.
    certificate_request_context: Vec<u8>,

    /// The first ClientHello, kept while a HelloRetryRequest may follow.
    first_hello: Option<ClientHello>,

    /// Group asked for by a HelloRetryRequest.
    retry_group: Option<NamedGroup>,
}

/// Current state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Send the ClientHello
    SendClientHello,

    /// Await the ServerHello
    AwaitServerHello,

    /// Await the server flight, up to ServerHelloDone or the TLS 1.3 Finished
    AwaitServerFlight,

    /// Send the client flight, up to Finished
    SendClientFlight,

    /// Await ChangeCipherSpec and Finished from the server (before TLS 1.3)
    AwaitServerFinished,

    /// Send and receive encrypted data.
    Running,
}

impl Client {
    /// Create a client. The ClientHello is queued right away.
    pub fn new(config: Arc<Config>) -> Result<Client, Error> {
        let engine = Engine::new(config.clone(), Role::Client)?;
        let mut client = Client {
            config,
            state: ClientState::SendClientHello,
            engine,
            certificate_request_context: Vec::new(),
            first_hello: None,
            retry_group: None,
        };
        client.process_input()?;
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), Error> {
        self.engine.receive(packet);
        self.process_input()
    }

    pub fn poll_output(&mut self) -> Output {
        self.engine.poll_output()
    }

    fn process_input(&mut self) -> Result<(), Error> {
        let result = self.drive();
        if let Err(e) = &result {
            self.engine.fail(e);
        }
        result
    }

    fn drive(&mut self) -> Result<(), Error> {
        loop {
            let prev_state = self.state;
            let progressed = self.do_process_input()?;
            if !progressed && prev_state == self.state {
                break;
            }
        }
        Ok(())
    }

    fn do_process_input(&mut self) -> Result<bool, Error> {
        match self.state {
            ClientState::SendClientHello => {
                self.send_client_hello()?;
                self.state = ClientState::AwaitServerHello;
                Ok(true)
            }
            ClientState::SendClientFlight => {
                self.send_client_flight()?;
                self.state = if self.engine.context().is_tls13() {
                    ClientState::Running
                } else {
                    ClientState::AwaitServerFinished
                };
                Ok(true)
            }
            _ => {
                let Some(message) = self.engine.next_message()? else {
                    return Ok(false);
                };
                self.process_message(message)?;
                Ok(true)
            }
        }
    }

    fn process_message(&mut self, message: Message) -> Result<(), Error> {
        match &message.body {
            TlsMessage::ServerHello(sh) if sh.is_hello_retry_request() => {
                self.check_hello_retry_request(sh)?
            }
            TlsMessage::ServerHello(sh) => self.check_server_hello(sh)?,
            TlsMessage::EncryptedExtensions(ee) => {
                observe_server(self.engine.context_mut(), &ee.extensions)?
            }
            TlsMessage::CertificateRequest(cr) => {
                self.certificate_request_context = cr.context().to_vec();
            }
            _ => {}
        }

        self.engine.handle_message(&message)?;

        match message.kind() {
            MessageKind::HelloRetryRequest => self.state = ClientState::SendClientHello,
            MessageKind::ServerHello => {
                self.first_hello = None;
                self.state = ClientState::AwaitServerFlight
            }
            MessageKind::ServerHelloDone => self.state = ClientState::SendClientFlight,
            MessageKind::Finished if self.engine.context().is_tls13() => {
                self.state = ClientState::SendClientFlight
            }
            MessageKind::Finished => self.state = ClientState::Running,
            _ => {}
        }
        Ok(())
    }

    fn send_client_hello(&mut self) -> Result<(), Error> {
        if let Some(first) = self.first_hello.take() {
            let hello = self.retry_client_hello(first)?;
            debug!("ClientHello again for {:?}", self.retry_group);
            return self.engine.send(TlsMessage::ClientHello(hello));
        }

        let config = self.config.clone();
        let max = config.max_version();
        let legacy = max.legacy_id();

        let context = self.engine.context_mut();
        context.set_client_hello_version(legacy);

        // A TLS 1.3 capable client sends a session id the server echoes.
        let session_id = if max.is_tls13() {
            config
                .crypto_provider()
                .random_vec(32)
                .map_err(Error::crypto)?
        } else {
            Vec::new()
        };
        context.local_mut().set_session_id(session_id.clone());

        let mut cipher_suites = config.cipher_suites().to_vec();
        if max == TlsVersion::Ssl30 {
            // no extensions to carry renegotiation_info
            cipher_suites.push(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);
        }

        let mut hello = ClientHello {
            client_version: legacy,
            random: *context.local().random(),
            session_id,
            cipher_suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions: Vec::new(),
        };
        hello.extensions =
            client_extensions(context, &config.extensions(), hello.len_without_extensions())?;
        if hello.offers_suite(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV) {
            // the server may answer the SCSV with renegotiation_info
            let mut offered = context.offered_extensions().to_vec();
            offered.push(ExtensionType::RenegotiationInfo);
            context.set_offered_extensions(offered);
        }

        debug!(
            "ClientHello {:?}, {} suites, {} extensions",
            legacy,
            hello.cipher_suites.len(),
            hello.extensions.len()
        );
        if max.is_tls13() {
            self.first_hello = Some(hello.clone());
        }
        self.engine.send(TlsMessage::ClientHello(hello))
    }

    /// The first ClientHello with one key share for the retry group.
    fn retry_client_hello(&mut self, mut hello: ClientHello) -> Result<ClientHello, Error> {
        let group = self
            .retry_group
            .ok_or(InternalError::MissingProperty("retry group"))?;
        let context = self.engine.context_mut();
        let entry = retry_key_share(context, group)?;

        hello
            .extensions
            .retain(|e| e.extension_type() != ExtensionType::Padding);
        for ext in &mut hello.extensions {
            if let Extension::KeyShare(share) = ext {
                *share = KeyShare::Client(vec![entry.clone()]);
            }
        }

        let len = hello.len_without_extensions()
            + 2
            + hello.extensions.iter().map(Extension::encoded_len).sum::<usize>();
        if let Some(padding) = ModelExtension::Padding.materialize(context, len)? {
            hello.extensions.push(padding);
        }
        Ok(hello)
    }

    fn check_hello_retry_request(&mut self, sh: &ServerHello) -> Result<(), Error> {
        if self.retry_group.is_some() {
            debug!("Second HelloRetryRequest");
            return Err(Error::fatal(AlertDescription::UnexpectedMessage));
        }

        let config = self.config.clone();
        let tls13 = TlsVersion::from_id(sh.selected_version()) == Some(TlsVersion::Tls13);
        if !tls13 || !config.versions().contains(&TlsVersion::Tls13) {
            debug!("HelloRetryRequest for {:?}", sh.selected_version());
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }
        if !config.cipher_suites().contains(&sh.cipher_suite)
            || !sh.cipher_suite.supports(TlsVersion::Tls13)
            || sh.compression_method != CompressionMethod::Null
        {
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        let context = self.engine.context();
        if sh.session_id != context.local().session_id() {
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }
        for ext in &sh.extensions {
            let t = ext.extension_type();
            if !matches!(t, ExtensionType::SupportedVersions | ExtensionType::KeyShare) {
                debug!("{:?} in HelloRetryRequest", t);
                return Err(Error::fatal(AlertDescription::UnsupportedExtension));
            }
        }

        let Some(Extension::KeyShare(KeyShare::HelloRetryRequest(group))) =
            sh.extension(ExtensionType::KeyShare)
        else {
            // nothing would change in the second ClientHello
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        };
        if !context.groups().contains(group) || context.key_share_groups().contains(group) {
            debug!("HelloRetryRequest asks for {:?}", group);
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        self.retry_group = Some(*group);
        Ok(())
    }

    fn check_server_hello(&mut self, sh: &ServerHello) -> Result<(), Error> {
        let config = self.config.clone();
        let version = TlsVersion::from_id(sh.selected_version())
            .filter(|v| config.versions().contains(v))
            .ok_or_else(|| {
                debug!("Server selected {:?}", sh.selected_version());
                Error::fatal(AlertDescription::ProtocolVersion)
            })?;

        let has_supported_versions = sh.extension(ExtensionType::SupportedVersions).is_some();
        if has_supported_versions != version.is_tls13() {
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        let max = config.max_version();
        if max != version && max.is_at_least(version) && sh.has_downgrade_sentinel(version) {
            debug!("Downgrade sentinel in ServerHello for {:?}", version);
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        if !config.cipher_suites().contains(&sh.cipher_suite) || !sh.cipher_suite.supports(version)
        {
            debug!("Server selected suite {:?}", sh.cipher_suite);
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }
        if sh.compression_method != CompressionMethod::Null {
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        let context = self.engine.context_mut();
        if version.is_tls13() && sh.session_id != context.local().session_id() {
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }
        if self.retry_group.is_some()
            && (!version.is_tls13() || Some(sh.cipher_suite) != context.cipher_suite().ok())
        {
            debug!("ServerHello differs from HelloRetryRequest");
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        observe_server(context, &sh.extensions)
    }

    fn send_client_flight(&mut self) -> Result<(), Error> {
        let tls13 = self.engine.context().is_tls13();
        let version = self.engine.context().version()?;

        let mut sent_certificate = false;
        if self.engine.context().certificate_requested() {
            if version == TlsVersion::Ssl30 {
                return Err(InternalError::Unsupported("SSL 3.0 client authentication").into());
            }
            let chain = if self.engine.context().signing_key().is_some() {
                self.config.certificate_chain().to_vec()
            } else {
                Vec::new()
            };
            sent_certificate = !chain.is_empty();
            let mut certificate = Certificate::new(&chain);
            certificate.context = self.certificate_request_context.clone();
            self.engine.send(TlsMessage::Certificate(certificate))?;
        }

        if !tls13 {
            let context = self.engine.context_mut();
            let factory = context.key_exchange_factory()?;
            let exchange = factory
                .new_local(context)?
                .ok_or(InternalError::MissingProperty("client key exchange"))?;
            self.engine
                .send(TlsMessage::ClientKeyExchange(ClientKeyExchange::new(exchange)))?;
        }

        if sent_certificate {
            let content = self.engine.certificate_verify_content(Role::Client)?;
            let signed = self.engine.sign(&content)?;
            self.engine
                .send(TlsMessage::CertificateVerify(CertificateVerify::new(signed)))?;
        }

        if !tls13 {
            self.engine.send(TlsMessage::ChangeCipherSpec)?;
        }

        let verify_data = self.engine.verify_data(Role::Client)?;
        self.engine.send(TlsMessage::Finished(Finished::new(verify_data)))
    }

    /// Send application data. Only once the handshake is complete.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != ClientState::Running {
            return Err(InternalError::MissingProperty("completed handshake").into());
        }
        let result = self.engine.send_application_data(data);
        if let Err(e) = &result {
            self.engine.fail(e);
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extension::SupportedVersions;
    use crate::message::{ParseContext, Record, HEADER_LEN};
    use crate::codec::parse_all;
    use crate::types::ContentType;

    fn sent_hello(client: &mut Client) -> ClientHello {
        let Output::Packet(packet) = client.poll_output() else {
            panic!("expected ClientHello record");
        };
        let record = parse_all(&packet, |i| Record::parse(i, false)).unwrap();
        assert_eq!(record.content_type, ContentType::Handshake);
        let ctx = ParseContext::new(TlsVersion::Tls13, Role::Client);
        let Some(TlsMessage::ClientHello(ch)) = TlsMessage::parse_handshake(
            crate::message::HandshakeType::ClientHello,
            &record.fragment[HEADER_LEN..],
            &ctx,
        )
        .unwrap() else {
            panic!("expected ClientHello");
        };
        ch
    }

    #[test]
    fn hello_is_queued_on_creation() {
        let mut client = Client::new(Arc::new(Config::default())).unwrap();
        assert_eq!(client.state(), ClientState::AwaitServerHello);

        let ch = sent_hello(&mut client);
        assert_eq!(ch.client_version.0, 0x0303);
        assert_eq!(ch.session_id.len(), 32);
        assert!(ch.extension(ExtensionType::KeyShare).is_some());
        assert!(matches!(
            ch.extension(ExtensionType::SupportedVersions),
            Some(Extension::SupportedVersions(_))
        ));
    }

    #[test]
    fn tls12_only_hello() {
        let config = Config::builder()
            .versions(&[TlsVersion::Tls12])
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256])
            .build()
            .unwrap();
        let mut client = Client::new(Arc::new(config)).unwrap();
        let ch = sent_hello(&mut client);
        assert!(ch.session_id.is_empty());
        assert!(ch.extension(ExtensionType::KeyShare).is_none());
        assert!(ch.offers_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256));
    }

    fn hello_retry_request(ch: &ClientHello, group: NamedGroup) -> Vec<u8> {
        let sh = ServerHello {
            server_version: TlsVersion::Tls12.id(),
            random: crate::message::HELLO_RETRY_REQUEST_RANDOM,
            session_id: ch.session_id.clone(),
            cipher_suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
            compression_method: CompressionMethod::Null,
            extensions: vec![
                Extension::SupportedVersions(SupportedVersions::Server(TlsVersion::Tls13.id())),
                Extension::KeyShare(KeyShare::HelloRetryRequest(group)),
            ],
        };
        let message = Message::local(TlsMessage::ServerHello(sh), TlsVersion::Tls13);
        let record = Record {
            content_type: ContentType::Handshake,
            version: TlsVersion::Tls12.id(),
            sequence: None,
            fragment: message.raw().to_vec(),
        };
        let mut out = Vec::new();
        record.serialize(&mut out);
        out
    }

    #[test]
    fn retry_resends_hello_with_requested_share() {
        let mut client = Client::new(Arc::new(Config::default())).unwrap();
        let first = sent_hello(&mut client);

        let packet = hello_retry_request(&first, NamedGroup::Secp384r1);
        client.handle_packet(&packet).unwrap();
        assert_eq!(client.state(), ClientState::AwaitServerHello);

        let second = sent_hello(&mut client);
        assert_eq!(second.random, first.random);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.cipher_suites, first.cipher_suites);
        let Some(Extension::KeyShare(KeyShare::Client(entries))) =
            second.extension(ExtensionType::KeyShare)
        else {
            panic!("expected key_share");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].group, NamedGroup::Secp384r1);
        assert_eq!(
            client.engine().context().key_share_groups(),
            vec![NamedGroup::Secp384r1]
        );
    }

    #[test]
    fn retry_for_offered_share_is_rejected() {
        let mut client = Client::new(Arc::new(Config::default())).unwrap();
        let first = sent_hello(&mut client);

        // a share for X25519 was already in the first hello
        let packet = hello_retry_request(&first, NamedGroup::X25519);
        let err = client.handle_packet(&packet).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));
    }

    #[test]
    fn retry_for_unsupported_group_is_rejected() {
        let config = Config::builder()
            .groups(&[NamedGroup::X25519])
            .build()
            .unwrap();
        let mut client = Client::new(Arc::new(config)).unwrap();
        let first = sent_hello(&mut client);

        let packet = hello_retry_request(&first, NamedGroup::Secp256r1);
        let err = client.handle_packet(&packet).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));
    }

    #[test]
    fn application_data_needs_handshake() {
        let mut client = Client::new(Arc::new(Config::default())).unwrap();
        assert!(client.send_application_data(b"early").is_err());
    }
}
