// TLS Server Handshake Flow:
//
// 1. Client sends ClientHello
// 2. Server picks version (supported_versions or the legacy field), cipher
//    suite and extension answers, in its own order of preference
// 3. Before TLS 1.3:
//    - Server sends ServerHello, Certificate, ServerKeyExchange,
//      CertificateRequest as the suite needs them, then ServerHelloDone
//    - Client sends Certificate (if requested), ClientKeyExchange,
//      CertificateVerify (if client cert), ChangeCipherSpec, Finished
//    - Server verifies Finished, then sends ChangeCipherSpec, Finished
// 4. TLS 1.3:
//    - When no offered key share is for a group both sides support, the
//      server sends a HelloRetryRequest naming one and awaits a second
//      ClientHello (once only)
//    - Server sends ServerHello with its key share, then EncryptedExtensions,
//      CertificateRequest (optional), Certificate, CertificateVerify, Finished
//    - Client sends Certificate and CertificateVerify (if requested), Finished
// 5. Handshake complete, application data can flow
//
// This implementation mirrors the client structure and ordering.

use std::sync::Arc;

use crate::config::Config;
use crate::context::Role;
use crate::engine::Engine;
use crate::extension::processor::{observe_client, server_extensions};
use crate::extension::{Extension, ExtensionType, KeyShare, KeyShareEntry, SupportedVersions};
use crate::key_exchange::{ContextualKeyExchange, KeyExchange, KeyPair};
use crate::message::{signed_params, Certificate, CertificateRequest, CertificateVerify};
use crate::message::{ClientHello, EncryptedExtensions, Finished, Message};
use crate::message::HELLO_RETRY_REQUEST_RANDOM;
use crate::message::{ServerHello, ServerKeyExchange, TlsMessage, DOWNGRADE_TLS11, DOWNGRADE_TLS12};
use crate::message::{ECDSA_SIGN, RSA_SIGN};
use crate::types::{AlertDescription, Auth, CipherSuite, CompressionMethod, KeyExchangeKind};
use crate::types::{NamedGroup, SignatureAlgorithm, TlsVersion};
use crate::{Error, InternalError, Output};

/// TLS server
pub struct Server {
    config: Arc<Config>,

    /// Current server state.
    state: ServerState,

    /// Engine in common between server and client.
    engine: Engine,

    /// Key shares offered in the ClientHello.
    client_shares: Vec<KeyShareEntry>,

    /// Group and suite of the HelloRetryRequest, once sent.
    retry: Option<(NamedGroup, CipherSuite)>,
}

/// Current state of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Await a ClientHello
    AwaitClientHello,

    /// Ask for another ClientHello with a usable key share (TLS 1.3)
    SendHelloRetryRequest,

    /// Send the ServerHello flight (ServerHello..ServerHelloDone or Finished)
    SendServerFlight,

    /// Await client flight up to Finished
    AwaitClientFlight,

    /// Send ChangeCipherSpec and Finished (before TLS 1.3)
    SendServerFinished,

    /// Send and receive encrypted data.
    Running,
}

impl Server {
    /// Create a new TLS server
    pub fn new(config: Arc<Config>) -> Result<Server, Error> {
        let engine = Engine::new(config.clone(), Role::Server)?;
        Ok(Server {
            config,
            state: ServerState::AwaitClientHello,
            engine,
            client_shares: Vec::new(),
            retry: None,
        })
    }

    pub fn state(&self) -> ServerState {
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
            ServerState::SendHelloRetryRequest => {
                self.send_hello_retry_request()?;
                self.state = ServerState::AwaitClientHello;
                Ok(true)
            }
            ServerState::SendServerFlight => {
                if self.engine.context().is_tls13() {
                    self.send_server_flight_tls13()?;
                } else {
                    self.send_server_flight()?;
                }
                self.state = ServerState::AwaitClientFlight;
                Ok(true)
            }
            ServerState::SendServerFinished => {
                self.engine.send(TlsMessage::ChangeCipherSpec)?;
                let verify_data = self.engine.verify_data(Role::Server)?;
                self.engine
                    .send(TlsMessage::Finished(Finished::new(verify_data)))?;
                self.state = ServerState::Running;
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
        self.engine.handle_message(&message)?;

        match &message.body {
            TlsMessage::ClientHello(ch) => {
                self.negotiate(ch)?;
                self.state = if self.needs_retry()? {
                    ServerState::SendHelloRetryRequest
                } else {
                    ServerState::SendServerFlight
                };
            }
            TlsMessage::Finished(_) if self.engine.context().is_tls13() => {
                self.state = ServerState::Running;
            }
            TlsMessage::Finished(_) => self.state = ServerState::SendServerFinished,
            _ => {}
        }
        Ok(())
    }

    fn negotiate(&mut self, ch: &ClientHello) -> Result<(), Error> {
        if !ch.compression_methods.contains(&CompressionMethod::Null) {
            debug!("Client does not offer null compression");
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }

        let version = self.select_version(ch)?;
        let context = self.engine.context_mut();
        context.set_version(version);

        observe_client(context, &ch.extensions)?;
        if ch.offers_suite(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV) {
            // same meaning as an empty renegotiation_info
            let mut offered = context.offered_extensions().to_vec();
            if !offered.contains(&ExtensionType::RenegotiationInfo) {
                offered.push(ExtensionType::RenegotiationInfo);
                context.set_offered_extensions(offered);
            }
        }

        let suite = self.select_suite(ch, version)?;
        let context = self.engine.context_mut();
        context.set_cipher_suite(suite);
        context.set_compression(CompressionMethod::Null);

        if version.is_tls13() {
            context.local_mut().set_session_id(ch.session_id.clone());
            self.client_shares = match ch.extension(ExtensionType::KeyShare) {
                Some(Extension::KeyShare(KeyShare::Client(entries))) => entries.clone(),
                _ => return Err(Error::fatal(AlertDescription::MissingExtension)),
            };
        }

        let max = self.config.max_version();
        let sentinel = if version == TlsVersion::Tls12 && max.is_tls13() {
            Some(DOWNGRADE_TLS12)
        } else if !version.is_at_least(TlsVersion::Tls12) && max.is_at_least(TlsVersion::Tls12) {
            Some(DOWNGRADE_TLS11)
        } else {
            None
        };
        if let Some(sentinel) = sentinel {
            let local = self.engine.context_mut().local_mut();
            let mut random = *local.random();
            random[24..].copy_from_slice(&sentinel);
            local.set_random(random);
        }

        debug!("Selected {:?} {:?}", version, suite);
        Ok(())
    }

    /// TLS 1.3: whether the offered key shares miss every common group.
    ///
    /// A ClientHello answering a HelloRetryRequest must carry exactly one
    /// share, for the requested group, and lead to the same suite.
    fn needs_retry(&mut self) -> Result<bool, Error> {
        let context = self.engine.context();
        if let Some((group, suite)) = self.retry {
            let shares_ok = matches!(self.client_shares.as_slice(), [e] if e.group == group);
            if !context.is_tls13() || context.cipher_suite()? != suite || !shares_ok {
                debug!("Second ClientHello does not follow HelloRetryRequest");
                return Err(Error::fatal(AlertDescription::IllegalParameter));
            }
            return Ok(false);
        }
        if !context.is_tls13() {
            return Ok(false);
        }

        let groups = context.groups();
        if groups
            .iter()
            .any(|g| self.client_shares.iter().any(|e| e.group == *g))
        {
            return Ok(false);
        }
        let group = groups.first().copied().ok_or_else(|| {
            debug!("No common group");
            Error::fatal(AlertDescription::HandshakeFailure)
        })?;
        self.retry = Some((group, context.cipher_suite()?));
        Ok(true)
    }

    fn send_hello_retry_request(&mut self) -> Result<(), Error> {
        let (group, suite) = self
            .retry
            .ok_or(InternalError::MissingProperty("retry group"))?;
        let hello = ServerHello {
            server_version: TlsVersion::Tls12.id(),
            random: HELLO_RETRY_REQUEST_RANDOM,
            session_id: self.engine.context().local().session_id().to_vec(),
            cipher_suite: suite,
            compression_method: CompressionMethod::Null,
            extensions: vec![
                Extension::SupportedVersions(SupportedVersions::Server(TlsVersion::Tls13.id())),
                Extension::KeyShare(KeyShare::HelloRetryRequest(group)),
            ],
        };
        debug!("HelloRetryRequest for {:?}", group);
        self.engine.send(TlsMessage::ServerHello(hello))
    }

    fn select_version(&self, ch: &ClientHello) -> Result<TlsVersion, Error> {
        let versions = self.config.versions();

        if let Some(Extension::SupportedVersions(SupportedVersions::Client(offered))) =
            ch.extension(ExtensionType::SupportedVersions)
        {
            let offered: Vec<TlsVersion> =
                offered.iter().filter_map(|v| TlsVersion::from_id(*v)).collect();
            return versions
                .iter()
                .copied()
                .find(|v| offered.contains(v))
                .ok_or_else(|| {
                    debug!("No common version in {:?}", offered);
                    Error::fatal(AlertDescription::ProtocolVersion)
                });
        }

        versions
            .iter()
            .copied()
            .filter(|v| !v.is_tls13() && v.id().0 <= ch.client_version.0)
            .max_by_key(|v| v.id().0)
            .ok_or_else(|| {
                debug!("Client version {:?} too low", ch.client_version);
                Error::fatal(AlertDescription::ProtocolVersion)
            })
    }

    fn select_suite(&self, ch: &ClientHello, version: TlsVersion) -> Result<CipherSuite, Error> {
        self.config
            .cipher_suites()
            .iter()
            .copied()
            .find(|s| ch.offers_suite(*s) && s.supports(version) && self.can_serve(*s))
            .ok_or_else(|| {
                debug!("No usable suite among {:?}", ch.cipher_suites);
                Error::fatal(AlertDescription::HandshakeFailure)
            })
    }

    /// Whether we hold what `suite` needs on the server side.
    fn can_serve(&self, suite: CipherSuite) -> bool {
        let Some(params) = suite.params() else {
            return false;
        };
        let context = self.engine.context();
        let key = context.signing_key();
        let key_is = |alg: SignatureAlgorithm| key.map(|k| k.algorithm() == alg).unwrap_or(false);

        let auth = match params.authentication {
            Auth::Rsa => key_is(SignatureAlgorithm::RSA),
            Auth::Ecdsa => key_is(SignatureAlgorithm::ECDSA),
            Auth::Contextual => key.is_some(),
            Auth::Psk => self.config.psk().is_some(),
            Auth::Srp | Auth::None => true,
            Auth::Krb5 | Auth::Gostr => false,
        };

        let kx = match params.key_exchange {
            k if k.is_ec() => context.groups().iter().any(|g| g.is_ec()),
            KeyExchangeKind::Srp => context
                .srp_identity()
                .map(|id| self.config.srp_verifier(id).is_some())
                .unwrap_or(false),
            KeyExchangeKind::Contextual => !context.groups().is_empty(),
            KeyExchangeKind::EccPwd | KeyExchangeKind::Krb5 | KeyExchangeKind::Gostr => false,
            _ => true,
        };

        auth && kx
    }

    fn send_server_flight(&mut self) -> Result<(), Error> {
        let version = self.engine.context().version()?;
        let params = self.engine.context().cipher_suite_params()?;

        let (extensions, _) = server_extensions(self.engine.context_mut(), version)?;
        let context = self.engine.context();
        let hello = ServerHello {
            server_version: version.id(),
            random: *context.local().random(),
            session_id: Vec::new(),
            cipher_suite: context.cipher_suite()?,
            compression_method: CompressionMethod::Null,
            extensions,
        };
        self.engine.send(TlsMessage::ServerHello(hello))?;

        if params.authentication.requires_certificate() {
            let chain = self.config.certificate_chain();
            if chain.is_empty() {
                return Err(InternalError::MissingProperty("certificate chain").into());
            }
            self.engine
                .send(TlsMessage::Certificate(Certificate::new(chain)))?;
        }

        let context = self.engine.context_mut();
        let factory = context.key_exchange_factory()?;
        if let Some(exchange) = factory.new_local(context)? {
            let mut ske = ServerKeyExchange::new(exchange, version);
            if matches!(params.authentication, Auth::Rsa | Auth::Ecdsa) {
                let cr = self.engine.context().client_random()?;
                let sr = self.engine.context().server_random()?;
                let data = signed_params(&cr, &sr, &ske.params_raw);
                ske.signature = Some(self.engine.sign(&data)?);
            }
            self.engine.send(TlsMessage::ServerKeyExchange(ske))?;
        }

        if self.config.require_client_certificate()
            && version != TlsVersion::Ssl30
            && params.authentication.requires_certificate()
        {
            let signature_schemes = if version.is_at_least(TlsVersion::Tls12) {
                self.config.signature_schemes().to_vec()
            } else {
                Vec::new()
            };
            let request = CertificateRequest::Legacy {
                certificate_types: vec![RSA_SIGN, ECDSA_SIGN],
                signature_schemes,
                authorities: Vec::new(),
            };
            self.engine.send(TlsMessage::CertificateRequest(request))?;
        }

        self.engine.send(TlsMessage::ServerHelloDone)
    }

    fn send_server_flight_tls13(&mut self) -> Result<(), Error> {
        let provider = self.config.crypto_provider().clone();

        let context = self.engine.context_mut();
        let (group, client_public) = context
            .groups()
            .iter()
            .find_map(|g| {
                self.client_shares
                    .iter()
                    .find(|e| e.group == *g)
                    .map(|e| (*g, e.key_exchange.clone()))
            })
            .ok_or_else(|| {
                debug!("No key share for a common group");
                Error::fatal(AlertDescription::HandshakeFailure)
            })?;

        let kx = provider
            .find_kx_group(group)
            .ok_or_else(|| Error::fatal(AlertDescription::HandshakeFailure))?
            .start_exchange()
            .map_err(Error::crypto)?;
        let server_public = kx.pub_key().to_vec();
        context.local_mut().set_key_pair(KeyPair::Group(kx));
        context
            .remote_mut()?
            .set_key_exchange(KeyExchange::Contextual(ContextualKeyExchange {
                group,
                public_key: client_public,
            }));

        let (_, encrypted) = server_extensions(context, TlsVersion::Tls13)?;

        let hello = ServerHello {
            server_version: TlsVersion::Tls12.id(),
            random: *context.local().random(),
            session_id: context.local().session_id().to_vec(),
            cipher_suite: context.cipher_suite()?,
            compression_method: CompressionMethod::Null,
            extensions: vec![
                Extension::SupportedVersions(SupportedVersions::Server(TlsVersion::Tls13.id())),
                Extension::KeyShare(KeyShare::Server(KeyShareEntry {
                    group,
                    key_exchange: server_public,
                })),
            ],
        };
        self.engine.send(TlsMessage::ServerHello(hello))?;
        self.engine
            .send(TlsMessage::EncryptedExtensions(EncryptedExtensions {
                extensions: encrypted,
            }))?;

        if self.config.require_client_certificate() {
            let request = CertificateRequest::Tls13 {
                context: Vec::new(),
                extensions: vec![Extension::SignatureAlgorithms(
                    self.config.signature_schemes().to_vec(),
                )],
            };
            self.engine.send(TlsMessage::CertificateRequest(request))?;
        }

        let chain = self.config.certificate_chain();
        if chain.is_empty() {
            return Err(InternalError::MissingProperty("certificate chain").into());
        }
        self.engine
            .send(TlsMessage::Certificate(Certificate::new(chain)))?;

        let content = self.engine.certificate_verify_content(Role::Server)?;
        let signed = self.engine.sign(&content)?;
        self.engine
            .send(TlsMessage::CertificateVerify(CertificateVerify::new(signed)))?;

        let verify_data = self.engine.verify_data(Role::Server)?;
        self.engine.send(TlsMessage::Finished(Finished::new(verify_data)))
    }

    /// Send application data. Only once the handshake is complete.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != ServerState::Running || !self.engine.is_handshake_complete() {
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
    use crate::message::MessageKind;

    fn hello(version: u16, suites: Vec<CipherSuite>, extensions: Vec<Extension>) -> ClientHello {
        ClientHello {
            client_version: crate::types::ProtocolVersion(version),
            random: [7; 32],
            session_id: Vec::new(),
            cipher_suites: suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        }
    }

    fn server(versions: &[TlsVersion], suites: &[CipherSuite]) -> Server {
        let config = Config::builder()
            .versions(versions)
            .cipher_suites(suites)
            .build()
            .unwrap();
        Server::new(Arc::new(config)).unwrap()
    }

    #[test]
    fn legacy_version_is_capped_by_client() {
        let s = server(
            &[TlsVersion::Tls12, TlsVersion::Tls11, TlsVersion::Tls10],
            &[CipherSuite::DH_ANON_AES128_CBC_SHA],
        );
        let ch = hello(0x0302, vec![], vec![]);
        assert_eq!(s.select_version(&ch).unwrap(), TlsVersion::Tls11);

        let ch = hello(0x0305, vec![], vec![]);
        assert_eq!(s.select_version(&ch).unwrap(), TlsVersion::Tls12);
    }

    #[test]
    fn supported_versions_wins_over_legacy_field() {
        let s = server(
            &[TlsVersion::Tls13, TlsVersion::Tls12],
            &[CipherSuite::TLS13_AES_128_GCM_SHA256],
        );
        let sv = Extension::SupportedVersions(SupportedVersions::Client(vec![
            TlsVersion::Tls12.id(),
            TlsVersion::Tls13.id(),
        ]));
        let ch = hello(0x0303, vec![], vec![sv]);
        assert_eq!(s.select_version(&ch).unwrap(), TlsVersion::Tls13);
    }

    #[test]
    fn too_old_client_is_refused() {
        let s = server(&[TlsVersion::Tls12], &[CipherSuite::DH_ANON_AES128_CBC_SHA]);
        let ch = hello(0x0301, vec![], vec![]);
        let err = s.select_version(&ch).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::ProtocolVersion));
    }

    #[test]
    fn suites_need_server_credentials() {
        let s = server(
            &[TlsVersion::Tls12],
            &[
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::PSK_AES128_GCM_SHA256,
                CipherSuite::DH_ANON_AES128_CBC_SHA,
            ],
        );
        assert!(!s.can_serve(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256));
        assert!(!s.can_serve(CipherSuite::PSK_AES128_GCM_SHA256));
        assert!(s.can_serve(CipherSuite::DH_ANON_AES128_CBC_SHA));

        let ch = hello(
            0x0303,
            vec![
                CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                CipherSuite::DH_ANON_AES128_CBC_SHA,
            ],
            vec![],
        );
        assert_eq!(
            s.select_suite(&ch, TlsVersion::Tls12).unwrap(),
            CipherSuite::DH_ANON_AES128_CBC_SHA
        );
    }

    #[test]
    fn tls12_from_tls13_server_carries_sentinel() {
        let config = Config::builder()
            .versions(&[TlsVersion::Tls13, TlsVersion::Tls12])
            .cipher_suites(&[
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::ECDH_ANON_AES128_CBC_SHA,
            ])
            .groups(&[NamedGroup::Secp256r1])
            .build()
            .unwrap();
        let mut s = Server::new(Arc::new(config)).unwrap();

        let ch = hello(0x0303, vec![CipherSuite::ECDH_ANON_AES128_CBC_SHA], vec![]);
        let msg = Message::local(TlsMessage::ClientHello(ch), TlsVersion::Tls12);
        let raw = msg.raw().to_vec();
        let Output::Idle = s.poll_output() else {
            panic!("nothing queued yet");
        };

        let mut record = vec![22, 3, 1];
        record.extend_from_slice(&(raw.len() as u16).to_be_bytes());
        record.extend_from_slice(&raw);
        s.handle_packet(&record).unwrap();

        assert_eq!(s.state(), ServerState::AwaitClientFlight);
        assert!(s.engine().has_seen(Role::Server, MessageKind::ServerHelloDone));
        let random = s.engine().context().server_random().unwrap();
        assert_eq!(random[24..], DOWNGRADE_TLS12);
    }

    #[test]
    fn retry_needs_share_for_requested_group() {
        let cert = crate::certificate::generate_self_signed_certificate().unwrap();
        let config = Config::builder()
            .groups(&[NamedGroup::Secp384r1])
            .certificate(vec![cert.certificate], cert.private_key)
            .build()
            .unwrap();
        let mut s = Server::new(Arc::new(config)).unwrap();

        let suite = CipherSuite::TLS13_AES_128_GCM_SHA256;
        let ch = |group: NamedGroup| {
            let share = KeyShareEntry {
                group,
                key_exchange: vec![4; 32],
            };
            hello(
                0x0303,
                vec![suite],
                vec![
                    Extension::SupportedVersions(SupportedVersions::Client(vec![
                        TlsVersion::Tls13.id(),
                    ])),
                    Extension::SupportedGroups(vec![NamedGroup::X25519, NamedGroup::Secp384r1]),
                    Extension::KeyShare(KeyShare::Client(vec![share])),
                ],
            )
        };

        s.negotiate(&ch(NamedGroup::X25519)).unwrap();
        assert!(s.needs_retry().unwrap());
        assert_eq!(s.retry, Some((NamedGroup::Secp384r1, suite)));

        // the second hello still has no usable share
        s.negotiate(&ch(NamedGroup::X25519)).unwrap();
        let err = s.needs_retry().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));

        s.negotiate(&ch(NamedGroup::Secp384r1)).unwrap();
        assert!(!s.needs_retry().unwrap());
    }

    #[test]
    fn null_compression_is_required() {
        let mut s = server(&[TlsVersion::Tls12], &[CipherSuite::DH_ANON_AES128_CBC_SHA]);
        let mut ch = hello(0x0303, vec![CipherSuite::DH_ANON_AES128_CBC_SHA], vec![]);
        ch.compression_methods = vec![CompressionMethod::Unknown(1)];
        let err = s.negotiate(&ch).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));
    }
}
