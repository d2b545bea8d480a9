//! Record layer and handshake bookkeeping shared by client and server.
//!
//! The engine owns the [`TlsContext`]. Every message, sent or received, passes
//! through [`Engine::handle_message`], which checks it against the ledger of
//! earlier messages, feeds the transcript and moves the key schedule along.
//! Client and server only decide *what* to send.

use std::collections::VecDeque;
use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::codec::parse_all;
use crate::config::Config;
use crate::context::{Role, Source, TlsConnection, TlsContext};
use crate::crypto::finished;
use crate::crypto::initializer::{legacy_ciphers, traffic_cipher};
use crate::crypto::{prf, KeySchedule};
use crate::extension::{Extension, KeyShare};
use crate::key_exchange::{ContextualKeyExchange, KeyExchange, KeyPair};
use crate::message::{tls13_signed_content, ChangeCipherSpec, DigitallySigned, Header};
use crate::message::HEADER_LEN;
use crate::message::{Message, MessageKind, ParseContext, Record, TlsMessage};
use crate::message::{MAX_CIPHERTEXT_LEN, MAX_HANDSHAKE_LEN, STREAM_HEADER_LEN};
use crate::secret::Secret;
use crate::types::{Alert, AlertDescription, Auth, ContentType, ProtocolVersion};
use crate::types::{SignatureAlgorithm, SignatureScheme, TlsVersion};
use crate::{Error, InternalError, Output};

/// Largest plaintext fragment accepted from the peer, 2^14.
const MAX_PLAINTEXT_LEN: usize = 16384;

/// Epoch of the TLS 1.3 handshake traffic keys.
const EPOCH_HANDSHAKE: u16 = 2;

/// Epoch of the first TLS 1.3 application traffic keys.
const EPOCH_APPLICATION: u16 = 3;

fn unexpected_message() -> Error {
    Error::fatal(AlertDescription::UnexpectedMessage)
}

pub struct Engine {
    context: TlsContext,

    /// Every message handled so far, with its sender.
    ledger: Vec<(Role, MessageKind)>,

    /// Received bytes not yet split into records.
    buffer_rx: Vec<u8>,

    /// Handshake bytes waiting for the rest of their message.
    handshake_rx: Vec<u8>,

    /// Queue of outgoing records.
    queue_tx: VecDeque<Vec<u8>>,

    /// Queue of Output events
    queue_events: VecDeque<Output>,

    /// TLS 1.3 client application secret, taken into use by the client Finished.
    client_application_secret: Option<Secret>,

    /// close_notify sent or received.
    closed: bool,

    /// A fatal alert went either way.
    failed: bool,

    /// Last warning alert the peer sent.
    last_warning: Option<Alert>,
}

impl Engine {
    pub fn new(config: Arc<Config>, role: Role) -> Result<Self, Error> {
        Ok(Engine {
            context: TlsContext::new(config, role)?,
            ledger: Vec::new(),
            buffer_rx: Vec::new(),
            handshake_rx: Vec::new(),
            queue_tx: VecDeque::new(),
            queue_events: VecDeque::new(),
            client_application_secret: None,
            closed: false,
            failed: false,
            last_warning: None,
        })
    }

    #[inline(always)]
    pub fn context(&self) -> &TlsContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TlsContext {
        &mut self.context
    }

    #[inline(always)]
    pub fn role(&self) -> Role {
        self.context.local_role()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The most recent warning alert received from the peer.
    pub fn last_warning(&self) -> Option<Alert> {
        self.last_warning
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Both Finished messages have been handled.
    pub fn is_handshake_complete(&self) -> bool {
        self.has_seen(Role::Client, MessageKind::Finished)
            && self.has_seen(Role::Server, MessageKind::Finished)
    }

    pub fn is_local_cipher_enabled(&self) -> bool {
        self.context.local().is_cipher_enabled()
    }

    pub fn is_remote_cipher_enabled(&self) -> bool {
        self.context
            .remote()
            .map(TlsConnection::is_cipher_enabled)
            .unwrap_or(false)
    }

    /// Whether `kind` from `sender` was handled already.
    pub fn has_seen(&self, sender: Role, kind: MessageKind) -> bool {
        self.ledger.iter().any(|e| *e == (sender, kind))
    }

    /// The version used to encode outgoing messages.
    fn wire_version(&self) -> TlsVersion {
        self.context
            .version_opt()
            .unwrap_or_else(|| self.context.config().max_version())
    }

    /// Version of the record header.
    ///
    /// Before the version is agreed records go out as TLS 1.0, or SSL 3.0 when
    /// that is the lowest version configured.
    fn record_version(&self) -> ProtocolVersion {
        match self.context.version_opt() {
            Some(v) => v.legacy_id(),
            None if self.context.config().min_version() == TlsVersion::Ssl30 => {
                TlsVersion::Ssl30.id()
            }
            None => TlsVersion::Tls10.id(),
        }
    }

    fn sender(&self, source: Source) -> Role {
        match source {
            Source::Local => self.role(),
            Source::Remote => self.role().peer(),
        }
    }

    fn connection_mut(&mut self, role: Role) -> Result<&mut TlsConnection, Error> {
        if role == self.role() {
            Ok(self.context.local_mut())
        } else {
            self.context.remote_mut()
        }
    }

    /// The last handshake or ChangeCipherSpec message handled.
    fn last(&self) -> Option<(Role, MessageKind)> {
        self.ledger
            .iter()
            .rev()
            .find(|(_, k)| !matches!(k, MessageKind::Alert | MessageKind::ApplicationData))
            .copied()
    }

    fn client_certificates_empty(&self) -> bool {
        self.context
            .connection(Role::Client)
            .map(|c| c.certificates().is_empty())
            .unwrap_or(true)
    }

    /// Whether `kind` from `sender` may come next.
    fn is_legal(&self, sender: Role, kind: MessageKind) -> bool {
        use MessageKind as K;
        use Role::{Client as C, Server as S};

        match kind {
            K::Alert => return true,
            K::ApplicationData => {
                return self.is_handshake_complete() && !(self.closed && sender == self.role())
            }
            _ => {}
        }

        let last = self.last();
        let is = |r: Role, k: MessageKind| last == Some((r, k));

        match (sender, kind) {
            (C, K::ClientHello) => return last.is_none() || is(S, K::HelloRetryRequest),
            (S, K::ServerHello) => return is(C, K::ClientHello),
            (S, K::HelloRetryRequest) => {
                return is(C, K::ClientHello) && !self.has_seen(S, K::HelloRetryRequest)
            }
            _ => {}
        }

        // Past the hellos, the version and suite are known.
        let Ok(params) = self.context.cipher_suite_params() else {
            return false;
        };
        let requested = self.has_seen(S, K::CertificateRequest);

        if self.context.is_tls13() {
            return match (sender, kind) {
                (S, K::EncryptedExtensions) => is(S, K::ServerHello),
                (S, K::CertificateRequest) => is(S, K::EncryptedExtensions),
                (S, K::Certificate) => {
                    is(S, K::EncryptedExtensions) || is(S, K::CertificateRequest)
                }
                (S, K::CertificateVerify) => is(S, K::Certificate),
                (S, K::Finished) => is(S, K::CertificateVerify),
                (C, K::Certificate) => is(S, K::Finished) && requested,
                (C, K::CertificateVerify) => {
                    is(C, K::Certificate) && !self.client_certificates_empty()
                }
                (C, K::Finished) => {
                    (is(S, K::Finished) && !requested)
                        || (is(C, K::Certificate) && self.client_certificates_empty())
                        || is(C, K::CertificateVerify)
                }
                _ => false,
            };
        }

        let needs_certificate = params.authentication.requires_certificate();
        let factory = crate::key_exchange::KeyExchangeFactory::for_suite(&params);
        let needs_params = factory.requires_server_params();

        match (sender, kind) {
            (S, K::Certificate) => is(S, K::ServerHello) && needs_certificate,
            (S, K::ServerKeyExchange) => {
                factory.allows_server_params()
                    && (is(S, K::Certificate) || (is(S, K::ServerHello) && !needs_certificate))
            }
            (S, K::CertificateRequest) => {
                needs_certificate && (is(S, K::Certificate) || is(S, K::ServerKeyExchange))
            }
            (S, K::ServerHelloDone) => {
                is(S, K::ServerKeyExchange)
                    || is(S, K::CertificateRequest)
                    || (is(S, K::Certificate) && !needs_params)
                    || (is(S, K::ServerHello) && !needs_certificate && !needs_params)
            }
            (C, K::Certificate) => is(S, K::ServerHelloDone) && requested,
            (C, K::ClientKeyExchange) => {
                is(C, K::Certificate) || (is(S, K::ServerHelloDone) && !requested)
            }
            (C, K::CertificateVerify) => {
                is(C, K::ClientKeyExchange) && !self.client_certificates_empty()
            }
            (C, K::ChangeCipherSpec) => {
                is(C, K::CertificateVerify)
                    || (is(C, K::ClientKeyExchange) && self.client_certificates_empty())
            }
            (C, K::Finished) => is(C, K::ChangeCipherSpec),
            (S, K::ChangeCipherSpec) => is(C, K::Finished),
            (S, K::Finished) => is(S, K::ChangeCipherSpec),
            _ => false,
        }
    }

    fn check_legal(&self, sender: Role, kind: MessageKind) -> Result<(), Error> {
        if self.is_legal(sender, kind) {
            Ok(())
        } else {
            debug!(
                "Illegal {:?} from {:?} after {:?}",
                kind,
                sender,
                self.last()
            );
            Err(unexpected_message())
        }
    }

    /// Send a locally built message.
    ///
    /// The record is written with the keys in effect before the message is
    /// handled, so a ChangeCipherSpec or TLS 1.3 ServerHello still goes out
    /// under the old keys.
    pub fn send(&mut self, body: TlsMessage) -> Result<(), Error> {
        if self.failed {
            return Err(Error::Closed);
        }
        let kind = body.kind();
        self.check_legal(self.role(), kind)?;

        let message = Message::local(body, self.wire_version());
        trace!("Send {:?} ({} bytes)", kind, message.raw().len());
        self.write_records(kind.content_type(), message.raw())?;
        self.process(&message)
    }

    /// Protect `payload` into one or more records and queue them.
    fn write_records(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), Error> {
        let max = self.fragment_limit();
        let version = self.record_version();

        for chunk in payload.chunks(max) {
            let (content_type, fragment) = match self.context.local_mut().cipher_mut() {
                Some(cipher) => {
                    let p = cipher.encrypt(content_type, chunk)?;
                    (p.content_type, p.fragment)
                }
                None => (content_type, chunk.to_vec()),
            };
            let record = Record {
                content_type,
                version,
                sequence: None,
                fragment,
            };
            let mut out = Vec::with_capacity(STREAM_HEADER_LEN + record.fragment.len());
            record.serialize(&mut out);
            self.queue_tx.push_back(out);
        }
        Ok(())
    }

    /// Largest plaintext per outgoing record.
    fn fragment_limit(&self) -> usize {
        let configured = self.context.config().max_fragment();
        match self.context.negotiated_fragment_limit() {
            Some(limit) => configured.min(limit),
            None => configured,
        }
    }

    /// Queue the alert for a local failure, once.
    pub fn fail(&mut self, error: &Error) {
        if self.failed {
            return;
        }
        self.failed = true;
        if let Some(alert) = error.alert() {
            debug!("Sending {} after: {}", alert, error);
            let payload = TlsMessage::Alert(alert).serialize(self.wire_version());
            if let Err(e) = self.write_records(ContentType::Alert, &payload) {
                warn!("Failed to write alert: {}", e);
            }
        }
    }

    /// Append bytes received from the transport.
    pub fn receive(&mut self, data: &[u8]) {
        self.buffer_rx.extend_from_slice(data);
    }

    fn has_pending_application_data(&self) -> bool {
        self.queue_events
            .iter()
            .any(|e| matches!(e, Output::ApplicationData(_)))
    }

    /// Received input that is complete enough to be processed: a whole record,
    /// or a whole handshake message left over from one.
    pub fn has_buffered_input(&self) -> bool {
        let record = Record::peek_len(&self.buffer_rx, false)
            .map(|len| self.buffer_rx.len() >= len)
            .unwrap_or(false);
        let handshake = Header::peek(&self.handshake_rx)
            .map(|(_, total)| self.handshake_rx.len() >= total)
            .unwrap_or(false);
        record || handshake
    }

    /// Next complete and legal message from the peer, not yet handled.
    pub fn next_message(&mut self) -> Result<Option<Message>, Error> {
        if self.failed {
            return Err(Error::Closed);
        }
        if self.has_pending_application_data() {
            // One decrypted message at a time, the rest stays as records.
            return Ok(None);
        }
        let Some(message) = self.next_unchecked()? else {
            return Ok(None);
        };
        self.check_legal(self.role().peer(), message.kind())?;
        Ok(Some(message))
    }

    fn next_unchecked(&mut self) -> Result<Option<Message>, Error> {
        loop {
            if let Some(message) = self.next_handshake()? {
                return Ok(Some(message));
            }

            let Some(len) = Record::peek_len(&self.buffer_rx, false) else {
                return Ok(None);
            };
            if len - STREAM_HEADER_LEN > MAX_CIPHERTEXT_LEN {
                return Err(Error::fatal(AlertDescription::RecordOverflow));
            }
            if self.buffer_rx.len() < len {
                return Ok(None);
            }
            let raw: Vec<u8> = self.buffer_rx.drain(..len).collect();
            let record = parse_all(&raw, |i| Record::parse(i, false))?;
            if record.version.major() != 3 {
                debug!("Record version {:?}", record.version);
                return Err(Error::fatal(AlertDescription::ProtocolVersion));
            }

            let (content_type, fragment) = self.unprotect(record)?;
            let limit = self
                .context
                .negotiated_fragment_limit()
                .unwrap_or(MAX_PLAINTEXT_LEN);
            if fragment.len() > limit {
                debug!("Record of {} bytes over the limit of {}", fragment.len(), limit);
                return Err(Error::fatal(AlertDescription::RecordOverflow));
            }

            match content_type {
                ContentType::Handshake => {
                    if fragment.is_empty() {
                        return Err(unexpected_message());
                    }
                    self.handshake_rx.extend_from_slice(&fragment);
                }
                ContentType::ChangeCipherSpec => {
                    self.ensure_record_boundary()?;
                    parse_all(&fragment, ChangeCipherSpec::parse)?;
                    if self.context.is_tls13() {
                        // middlebox compatibility, never acted on
                        trace!("Ignoring ChangeCipherSpec");
                        continue;
                    }
                    let body = TlsMessage::ChangeCipherSpec;
                    return Ok(Some(Message::remote(body, fragment)));
                }
                ContentType::Alert => {
                    self.ensure_record_boundary()?;
                    let alert = parse_all(&fragment, Alert::parse)?;
                    return Ok(Some(Message::remote(TlsMessage::Alert(alert), fragment)));
                }
                ContentType::ApplicationData => {
                    self.ensure_record_boundary()?;
                    let body = TlsMessage::ApplicationData(fragment.clone());
                    return Ok(Some(Message::remote(body, fragment)));
                }
                ContentType::Unknown(v) => {
                    debug!("Unknown record content type {}", v);
                    return Err(unexpected_message());
                }
            }
        }
    }

    /// Split the next handshake message off the reassembly buffer.
    fn next_handshake(&mut self) -> Result<Option<Message>, Error> {
        loop {
            let Some((header, total)) = Header::peek(&self.handshake_rx) else {
                return Ok(None);
            };
            if header.length as usize > MAX_HANDSHAKE_LEN {
                return Err(Error::fatal(AlertDescription::HandshakeFailure));
            }
            if self.handshake_rx.len() < total {
                return Ok(None);
            }
            let raw: Vec<u8> = self.handshake_rx.drain(..total).collect();

            let parse_context = ParseContext::new(self.wire_version(), self.role().peer())
                .with_suite(self.context.cipher_suite_params().ok());
            let body = &raw[HEADER_LEN..];
            match TlsMessage::parse_handshake(header.msg_type, body, &parse_context)? {
                Some(body) => return Ok(Some(Message::remote(body, raw))),
                None => trace!("Skipping {:?}", header.msg_type),
            }
        }
    }

    /// Plaintext of a record under the current remote keys.
    fn unprotect(&mut self, record: Record) -> Result<(ContentType, Vec<u8>), Error> {
        let tls13 = self.context.is_tls13();
        let Ok(remote) = self.context.remote_mut() else {
            return Ok((record.content_type, record.fragment));
        };
        if tls13 && record.content_type == ContentType::ChangeCipherSpec {
            return Ok((record.content_type, record.fragment));
        }
        match remote.cipher_mut() {
            Some(cipher) => {
                let p = cipher.decrypt(record.content_type, &record.fragment)?;
                Ok((p.content_type, p.fragment))
            }
            None => Ok((record.content_type, record.fragment)),
        }
    }

    /// Keys may only change between records.
    fn ensure_record_boundary(&self) -> Result<(), Error> {
        if self.handshake_rx.is_empty() {
            Ok(())
        } else {
            debug!("{} handshake bytes pending", self.handshake_rx.len());
            Err(unexpected_message())
        }
    }

    /// Apply a received message that passed [`Engine::next_message`].
    pub fn handle_message(&mut self, message: &Message) -> Result<(), Error> {
        if message.source == Source::Local {
            return Err(InternalError::Unsupported("local message outside send").into());
        }
        let result = self.process(message);
        if let Err(Error::PeerAlert(_)) = &result {
            self.failed = true;
        }
        result
    }

    fn process(&mut self, message: &Message) -> Result<(), Error> {
        let sender = self.sender(message.source);
        let kind = message.kind();

        // Steps that must see the transcript without this message.
        match &message.body {
            TlsMessage::ClientHello(ch) if message.source == Source::Remote => {
                let mut remote = TlsConnection::new(Role::Client, ch.random);
                remote.set_session_id(ch.session_id.clone());
                self.context.set_remote(remote);
                self.context.set_client_hello_version(ch.client_version);
            }
            TlsMessage::ServerHello(sh) if sh.is_hello_retry_request() => {
                if TlsVersion::from_id(sh.selected_version()) != Some(TlsVersion::Tls13) {
                    return Err(Error::fatal(AlertDescription::IllegalParameter));
                }
                self.context.set_version(TlsVersion::Tls13);
                self.context.set_cipher_suite(sh.cipher_suite);
                let hash = self.context.cipher_suite_params()?.prf_hash;
                let provider = self.context.config().crypto_provider().clone();
                let transcript = self.context.transcript_mut();
                transcript.start(&provider, TlsVersion::Tls13, Some(hash))?;
                transcript.replace_with_message_hash(&provider, hash)?;
                debug!("HelloRetryRequest with {:?}", sh.cipher_suite);
            }
            TlsMessage::ServerHello(sh) => {
                if message.source == Source::Remote {
                    let mut remote = TlsConnection::new(Role::Server, sh.random);
                    remote.set_session_id(sh.session_id.clone());
                    self.context.set_remote(remote);
                }
                let version = TlsVersion::from_id(sh.selected_version())
                    .ok_or_else(|| Error::fatal(AlertDescription::ProtocolVersion))?;
                self.context.set_version(version);
                self.context.set_cipher_suite(sh.cipher_suite);
                self.context.set_compression(sh.compression_method);
                let params = self.context.cipher_suite_params()?;
                let provider = self.context.config().crypto_provider().clone();
                self.context
                    .transcript_mut()
                    .start(&provider, version, params.transcript_hash(version))?;
                debug!("Negotiated {:?} {:?}", version, sh.cipher_suite);
            }
            TlsMessage::Finished(f) if message.source == Source::Remote => {
                let expected = self.verify_data(sender)?;
                if !bool::from(expected.ct_eq(&f.verify_data)) {
                    debug!("Finished from {:?} does not verify", sender);
                    return Err(Error::fatal(AlertDescription::DecryptError));
                }
            }
            TlsMessage::CertificateVerify(cv) if message.source == Source::Remote => {
                let content = self.certificate_verify_content(sender)?;
                let leaf = self
                    .context
                    .connection(sender)?
                    .certificates()
                    .first()
                    .cloned()
                    .ok_or_else(unexpected_message)?;
                self.verify_signed(&leaf, &cv.signed, &content)?;
            }
            _ => {}
        }

        if kind.is_handshake() {
            self.context.transcript_mut().update(message.raw());
        }
        if !matches!(kind, MessageKind::Alert) {
            self.ledger.push((sender, kind));
        }

        match &message.body {
            TlsMessage::ServerHello(sh)
                if self.context.is_tls13() && !sh.is_hello_retry_request() =>
            {
                if message.source == Source::Remote {
                    self.accept_key_share(&sh.extensions)?;
                }
                self.start_handshake_keys()?;
            }

            TlsMessage::Certificate(c) => {
                let chain = c.chain();
                match message.source {
                    Source::Local => self.context.local_mut().set_certificates(chain),
                    Source::Remote => self.accept_certificates(sender, chain)?,
                }
            }

            TlsMessage::ServerKeyExchange(ske) if message.source == Source::Remote => {
                if let Some(signed) = &ske.signature {
                    let cr = self.context.client_random()?;
                    let sr = self.context.server_random()?;
                    let data = crate::message::signed_params(&cr, &sr, &ske.params_raw);
                    let leaf = self
                        .context
                        .remote()?
                        .certificates()
                        .first()
                        .cloned()
                        .ok_or_else(unexpected_message)?;
                    self.verify_signed(&leaf, signed, &data)?;
                }
                self.context.remote_mut()?.set_key_exchange(ske.params.clone());
            }

            TlsMessage::CertificateRequest(cr) => {
                self.context.set_certificate_requested(true);
                if message.source == Source::Remote {
                    self.context.set_peer_signature_schemes(cr.signature_schemes());
                }
            }

            TlsMessage::ClientKeyExchange(cke) => {
                if message.source == Source::Remote {
                    self.context.remote_mut()?.set_key_exchange(cke.exchange.clone());
                }
                self.install_legacy_keys()?;
            }

            TlsMessage::ChangeCipherSpec => {
                self.connection_mut(sender)?.enable_cipher()?;
            }

            TlsMessage::Finished(_) => {
                if self.context.is_tls13() {
                    self.advance_application_keys(sender, message.source)?;
                }
                if self.is_handshake_complete() {
                    debug!("Handshake complete: {:?}", self.context.version_opt());
                    self.queue_events.push_back(Output::Connected);
                }
            }

            TlsMessage::Alert(alert) => self.handle_alert(*alert, message.source)?,

            TlsMessage::ApplicationData(data) if message.source == Source::Remote => {
                self.queue_events.push_back(Output::ApplicationData(data.clone()));
            }

            _ => {}
        }

        Ok(())
    }

    fn handle_alert(&mut self, alert: Alert, source: Source) -> Result<(), Error> {
        if alert.description == AlertDescription::CloseNotify {
            debug!("close_notify ({:?})", source);
            if !self.closed && source == Source::Remote {
                self.queue_events.push_back(Output::Closed);
            }
            self.closed = true;
            return Ok(());
        }
        if source == Source::Local {
            if alert.is_fatal() {
                self.failed = true;
            }
            return Ok(());
        }
        if alert.is_fatal() || self.context.is_tls13() {
            return Err(Error::PeerAlert(alert));
        }
        warn!("Warning alert: {}", alert);
        self.last_warning = Some(alert);
        Ok(())
    }

    /// Client: pair the server's key share with the one we offered.
    fn accept_key_share(&mut self, extensions: &[Extension]) -> Result<(), Error> {
        let entry = extensions
            .iter()
            .find_map(|e| match e {
                Extension::KeyShare(KeyShare::Server(entry)) => Some(entry.clone()),
                _ => None,
            })
            .ok_or_else(|| Error::fatal(AlertDescription::MissingExtension))?;

        let kx = self
            .context
            .take_key_share(entry.group)
            .ok_or_else(|| Error::fatal(AlertDescription::IllegalParameter))?;
        self.context.local_mut().set_key_pair(KeyPair::Group(kx));
        self.context
            .remote_mut()?
            .set_key_exchange(KeyExchange::Contextual(ContextualKeyExchange {
                group: entry.group,
                public_key: entry.key_exchange,
            }));
        Ok(())
    }

    /// TLS 1.3: handshake traffic keys from the shared secret, right after ServerHello.
    fn start_handshake_keys(&mut self) -> Result<(), Error> {
        let params = self.context.cipher_suite_params()?;
        let version = self.context.version()?;
        let provider = self.context.config().crypto_provider().clone();
        let hash = params.prf_hash;

        let factory = self.context.key_exchange_factory()?;
        let shared = factory.premaster_secret(&mut self.context)?;

        let mut schedule = KeySchedule::new(&provider, hash, version.is_datagram())?;
        let th = self.context.transcript().current(hash)?;
        let (client, server) = schedule.derive_handshake_secrets(shared.as_bytes(), &th)?;
        shared.destroy();

        let client_cipher =
            traffic_cipher(&provider, version, &params, &schedule, &client, EPOCH_HANDSHAKE)?;
        let server_cipher =
            traffic_cipher(&provider, version, &params, &schedule, &server, EPOCH_HANDSHAKE)?;
        self.context.set_key_schedule(schedule);

        self.ensure_record_boundary()?;
        let c = self.connection_mut(Role::Client)?;
        c.set_cipher(client_cipher);
        c.set_traffic_secret(client);
        let s = self.connection_mut(Role::Server)?;
        s.set_cipher(server_cipher);
        s.set_traffic_secret(server);
        Ok(())
    }

    /// TLS 1.3: application keys after the server Finished, client side
    /// switched after the client Finished.
    fn advance_application_keys(&mut self, sender: Role, source: Source) -> Result<(), Error> {
        let params = self.context.cipher_suite_params()?;
        let version = self.context.version()?;
        let provider = self.context.config().crypto_provider().clone();

        match sender {
            Role::Server => {
                let th = self.context.transcript().current(params.prf_hash)?;
                let schedule = self.context.key_schedule_mut()?;
                let (client, server) = schedule.derive_application_secrets(&th)?;
                let schedule = self.context.key_schedule()?;
                let epoch = EPOCH_APPLICATION;
                let server_cipher =
                    traffic_cipher(&provider, version, &params, schedule, &server, epoch)?;
                let client_cipher =
                    traffic_cipher(&provider, version, &params, schedule, &client, epoch)?;

                if source == Source::Remote {
                    self.ensure_record_boundary()?;
                }
                let s = self.connection_mut(Role::Server)?;
                s.set_cipher(server_cipher);
                s.set_traffic_secret(server);
                self.connection_mut(Role::Client)?.install_cipher(client_cipher);
                self.client_application_secret = Some(client);
            }
            Role::Client => {
                if source == Source::Remote {
                    self.ensure_record_boundary()?;
                }
                let secret = self
                    .client_application_secret
                    .take()
                    .ok_or(InternalError::MissingProperty("client application secret"))?;
                let c = self.connection_mut(Role::Client)?;
                c.enable_cipher()?;
                c.set_traffic_secret(secret);
            }
        }
        Ok(())
    }

    /// Before TLS 1.3: master secret and pending record keys after ClientKeyExchange.
    fn install_legacy_keys(&mut self) -> Result<(), Error> {
        let params = self.context.cipher_suite_params()?;
        let version = self.context.version()?;
        let provider = self.context.config().crypto_provider().clone();
        let cr = self.context.client_random()?;
        let sr = self.context.server_random()?;

        let factory = self.context.key_exchange_factory()?;
        let premaster = factory.premaster_secret(&mut self.context)?;

        let session_hash = if self.context.extended_master_secret() {
            Some(self.context.transcript().session_hash()?)
        } else {
            None
        };
        let master = prf::master_secret(
            &provider,
            version,
            params.prf_hash,
            premaster.as_bytes(),
            &cr,
            &sr,
            session_hash.as_deref(),
        )?;
        premaster.destroy();

        let (write, read) = legacy_ciphers(
            &provider,
            version,
            &params,
            self.role(),
            master.as_bytes(),
            &cr,
            &sr,
        )?;
        self.context.set_master_secret(master);

        let (local, remote) = self.context.connections_mut()?;
        local.install_cipher(write);
        remote.install_cipher(read);
        Ok(())
    }

    /// Validate and store the peer's certificate chain.
    fn accept_certificates(&mut self, sender: Role, chain: Vec<Vec<u8>>) -> Result<(), Error> {
        let tls13 = self.context.is_tls13();

        if chain.is_empty() {
            if sender == Role::Server {
                return Err(Error::fatal(AlertDescription::DecodeError));
            }
            if self.context.config().require_client_certificate() {
                return Err(Error::fatal(if tls13 {
                    AlertDescription::CertificateRequired
                } else {
                    AlertDescription::HandshakeFailure
                }));
            }
            debug!("Client sent no certificate");
            return Ok(());
        }

        let expected = if sender == Role::Server && !tls13 {
            match self.context.cipher_suite_params()?.authentication {
                Auth::Rsa => Some(SignatureAlgorithm::RSA),
                Auth::Ecdsa => Some(SignatureAlgorithm::ECDSA),
                _ => None,
            }
        } else {
            None
        };

        let leaf = self
            .context
            .config()
            .certificate_validator()
            .validate_chain(&chain, Source::Remote, expected)?;
        self.queue_events.push_back(Output::PeerCert(leaf));
        self.context.remote_mut()?.set_certificates(chain);
        Ok(())
    }

    /// Check a signature made by the peer's certificate key.
    fn verify_signed(
        &self,
        leaf: &[u8],
        signed: &DigitallySigned,
        data: &[u8],
    ) -> Result<(), Error> {
        let verifier = self.context.config().crypto_provider().signature_verification;
        let result = match signed.scheme {
            Some(scheme) => {
                if !self.context.config().signature_schemes().contains(&scheme)
                    || (self.context.is_tls13() && !scheme.is_tls13_compatible())
                {
                    debug!("Peer signed with {:?}, not offered", scheme);
                    return Err(Error::fatal(AlertDescription::IllegalParameter));
                }
                verifier.verify_signature(leaf, scheme, data, &signed.signature)
            }
            None => verifier.verify_legacy(leaf, data, &signed.signature),
        };
        result.map_err(|e| {
            debug!("Signature check failed: {}", e);
            Error::fatal(AlertDescription::DecryptError)
        })
    }

    /// The data a CertificateVerify from `signer` covers at this point.
    pub fn certificate_verify_content(&self, signer: Role) -> Result<Vec<u8>, Error> {
        let transcript = self.context.transcript();
        if self.context.is_tls13() {
            let hash = self.context.cipher_suite_params()?.prf_hash;
            Ok(tls13_signed_content(signer, &transcript.current(hash)?))
        } else {
            Ok(transcript.messages().to_vec())
        }
    }

    /// Sign with the local certificate key, in a scheme the peer accepts.
    ///
    /// A peer that listed no schemes before TLS 1.3 accepts SHA-1.
    pub fn sign(&self, data: &[u8]) -> Result<DigitallySigned, Error> {
        let key = self.context.signing_key().ok_or_else(|| {
            debug!("No certificate key to sign with");
            Error::fatal(AlertDescription::HandshakeFailure)
        })?;

        let version = self.context.version()?;
        if !version.is_at_least(TlsVersion::Tls12) {
            let signature = key.sign_legacy(data).map_err(Error::crypto)?;
            return Ok(DigitallySigned::new(None, signature));
        }

        let tls13 = version.is_tls13();
        let peer = self.context.peer_signature_schemes();
        let default = [SignatureScheme::RSA_PKCS1_SHA1, SignatureScheme::ECDSA_SHA1];
        let acceptable = if peer.is_empty() && !tls13 {
            &default[..]
        } else {
            peer
        };

        let scheme = key
            .schemes()
            .iter()
            .copied()
            .find(|s| acceptable.contains(s) && (!tls13 || s.is_tls13_compatible()))
            .ok_or_else(|| {
                debug!("No common signature scheme in {:?}", acceptable);
                Error::fatal(AlertDescription::HandshakeFailure)
            })?;

        let signature = key.sign(scheme, data).map_err(Error::crypto)?;
        Ok(DigitallySigned::new(Some(scheme), signature))
    }

    /// The Finished verify data `sender` must produce at this point.
    pub fn verify_data(&self, sender: Role) -> Result<Vec<u8>, Error> {
        let transcript = self.context.transcript();
        if self.context.is_tls13() {
            let secret = self
                .context
                .connection(sender)?
                .traffic_secret()
                .ok_or(InternalError::MissingProperty("handshake traffic secret"))?;
            return finished::tls13_verify_data(
                self.context.key_schedule()?,
                secret.as_bytes(),
                transcript,
            );
        }
        let params = self.context.cipher_suite_params()?;
        finished::legacy_verify_data(
            self.context.config().crypto_provider(),
            self.context.version()?,
            params.prf_hash,
            sender,
            self.context.master_secret()?.as_bytes(),
            transcript,
        )
    }

    /// Queue application data. Split into records of at most `max_fragment` bytes.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        self.send(TlsMessage::ApplicationData(data.to_vec()))
    }

    /// Send close_notify, once.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed || self.failed {
            return Ok(());
        }
        self.send(TlsMessage::Alert(Alert::close_notify()))
    }

    pub fn poll_output(&mut self) -> Output {
        if let Some(event) = self.queue_events.pop_front() {
            return event;
        }
        if let Some(packet) = self.queue_tx.pop_front() {
            return Output::Packet(packet);
        }
        Output::Idle
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extension::{ExtensionType, MaxFragmentLength, SupportedVersions};
    use crate::message::{ClientHello, HandshakeType, ServerHello, HELLO_RETRY_REQUEST_RANDOM};
    use crate::types::{AlertLevel, CipherSuite, CompressionMethod, NamedGroup};

    fn engine(role: Role) -> Engine {
        let config = Config::builder()
            .versions(&[TlsVersion::Tls12])
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256])
            .build()
            .unwrap();
        Engine::new(Arc::new(config), role).unwrap()
    }

    fn record(content_type: ContentType, fragment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        Record {
            content_type,
            version: ProtocolVersion(0x0303),
            sequence: None,
            fragment: fragment.to_vec(),
        }
        .serialize(&mut out);
        out
    }

    fn client_hello() -> ClientHello {
        ClientHello {
            client_version: ProtocolVersion(0x0303),
            random: [7; 32],
            session_id: Vec::new(),
            cipher_suites: vec![CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256],
            compression_methods: vec![CompressionMethod::Null],
            extensions: Vec::new(),
        }
    }

    fn handshake(body: TlsMessage) -> Vec<u8> {
        record(ContentType::Handshake, &body.serialize(TlsVersion::Tls12))
    }

    #[test]
    fn client_hello_first() {
        let mut server = engine(Role::Server);
        server.receive(&handshake(TlsMessage::ClientHello(client_hello())));
        let m = server.next_message().unwrap().unwrap();
        assert_eq!(m.kind(), MessageKind::ClientHello);
        server.handle_message(&m).unwrap();
        assert!(server.context().has_remote());
        assert_eq!(server.context().transcript().messages(), m.raw());
    }

    #[test]
    fn second_client_hello_is_unexpected() {
        let mut server = engine(Role::Server);
        let hello = handshake(TlsMessage::ClientHello(client_hello()));
        server.receive(&hello);
        server.receive(&hello);
        let m = server.next_message().unwrap().unwrap();
        server.handle_message(&m).unwrap();

        let err = server.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn one_hello_retry_request() {
        let suite = CipherSuite::TLS13_AES_128_GCM_SHA256;
        let config = Config::builder()
            .versions(&[TlsVersion::Tls13])
            .cipher_suites(&[suite])
            .build()
            .unwrap();
        let mut client = Engine::new(Arc::new(config), Role::Client).unwrap();
        let hello = ClientHello {
            cipher_suites: vec![suite],
            ..client_hello()
        };
        client.send(TlsMessage::ClientHello(hello.clone())).unwrap();

        let retry = handshake(TlsMessage::ServerHello(ServerHello {
            server_version: ProtocolVersion(0x0303),
            random: HELLO_RETRY_REQUEST_RANDOM,
            session_id: Vec::new(),
            cipher_suite: suite,
            compression_method: CompressionMethod::Null,
            extensions: vec![
                Extension::SupportedVersions(SupportedVersions::Server(TlsVersion::Tls13.id())),
                Extension::KeyShare(KeyShare::HelloRetryRequest(NamedGroup::Secp256r1)),
            ],
        }));
        client.receive(&retry);
        let m = client.next_message().unwrap().unwrap();
        assert_eq!(m.kind(), MessageKind::HelloRetryRequest);
        client.handle_message(&m).unwrap();
        assert!(client.context().is_tls13());
        // message_hash, then the retry itself
        let messages = client.context().transcript().messages();
        assert_eq!(&messages[..4], &[254, 0, 0, 32]);
        assert_eq!(&messages[36..], m.raw());

        client.send(TlsMessage::ClientHello(hello)).unwrap();
        client.receive(&retry);
        let err = client.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn key_exchange_before_hello_done_is_unexpected() {
        let mut server = engine(Role::Server);
        server.receive(&handshake(TlsMessage::ClientHello(client_hello())));
        let m = server.next_message().unwrap().unwrap();
        server.handle_message(&m).unwrap();

        // The server has not answered, a ClientKeyExchange cannot follow.
        server.context_mut().set_version(TlsVersion::Tls12);
        server
            .context_mut()
            .set_cipher_suite(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256);
        server.receive(&record(
            ContentType::Handshake,
            &crate::message::frame(HandshakeType::ClientKeyExchange, &[1, 4]),
        ));
        let err = server.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn handshake_split_over_records() {
        let mut server = engine(Role::Server);
        let raw = TlsMessage::ClientHello(client_hello()).serialize(TlsVersion::Tls12);
        let (a, b) = raw.split_at(10);
        server.receive(&record(ContentType::Handshake, a));
        assert!(server.next_message().unwrap().is_none());
        server.receive(&record(ContentType::Handshake, b));
        let m = server.next_message().unwrap().unwrap();
        assert_eq!(m.raw(), &raw[..]);
    }

    #[test]
    fn alert_inside_handshake_message_is_unexpected() {
        let mut server = engine(Role::Server);
        let raw = TlsMessage::ClientHello(client_hello()).serialize(TlsVersion::Tls12);
        server.receive(&record(ContentType::Handshake, &raw[..10]));
        server.receive(&record(ContentType::Alert, &[1, 0]));
        let err = server.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn fatal_peer_alert() {
        let mut client = engine(Role::Client);
        client.receive(&record(ContentType::Alert, &[2, 40]));
        let m = client.next_message().unwrap().unwrap();
        let err = client.handle_message(&m).unwrap_err();
        assert!(matches!(
            err,
            Error::PeerAlert(Alert {
                level: AlertLevel::Fatal,
                description: AlertDescription::HandshakeFailure
            })
        ));
        assert!(client.is_failed());
    }

    #[test]
    fn close_notify_closes() {
        let mut client = engine(Role::Client);
        client.receive(&record(ContentType::Alert, &[1, 0]));
        let m = client.next_message().unwrap().unwrap();
        client.handle_message(&m).unwrap();
        assert!(client.is_closed());
        assert_eq!(client.poll_output(), Output::Closed);
    }

    #[test]
    fn warning_alert_is_kept() {
        let mut client = engine(Role::Client);
        client.receive(&record(ContentType::Alert, &[1, 90]));
        let m = client.next_message().unwrap().unwrap();
        client.handle_message(&m).unwrap();
        assert!(!client.is_failed());
        assert_eq!(
            client.last_warning(),
            Some(Alert {
                level: AlertLevel::Warning,
                description: AlertDescription::UserCanceled
            })
        );
    }

    #[test]
    fn oversized_record() {
        let mut client = engine(Role::Client);
        client.receive(&[0x17, 0x03, 0x03, 0x48, 0x01]);
        let err = client.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::RecordOverflow));
    }

    #[test]
    fn application_data_before_handshake() {
        let mut client = engine(Role::Client);
        client.receive(&record(ContentType::ApplicationData, b"hi"));
        let err = client.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnexpectedMessage));
    }

    #[test]
    fn failure_queues_one_alert() {
        let mut client = engine(Role::Client);
        let err = Error::fatal(AlertDescription::DecodeError);
        client.fail(&err);
        client.fail(&err);
        assert_eq!(
            client.poll_output(),
            Output::Packet(vec![0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 50])
        );
        assert_eq!(client.poll_output(), Output::Idle);
    }

    #[test]
    fn negotiated_fragment_length_limits_records() {
        let mut client = engine(Role::Client);
        let ctx = client.context_mut();
        ctx.set_max_fragment_length(MaxFragmentLength::Len512);
        ctx.add_extension(ExtensionType::MaxFragmentLength);

        client.write_records(ContentType::Handshake, &[1; 1200]).unwrap();
        let mut lens = Vec::new();
        while let Output::Packet(p) = client.poll_output() {
            lens.push(p.len() - STREAM_HEADER_LEN);
        }
        assert_eq!(lens, vec![512, 512, 176]);

        client.receive(&record(ContentType::Handshake, &[0; 513]));
        let err = client.next_message().unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::RecordOverflow));
    }

    #[test]
    fn plaintext_is_fragmented() {
        let config = Config::builder()
            .versions(&[TlsVersion::Tls12])
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256])
            .max_fragment(4)
            .build()
            .unwrap();
        let mut client = Engine::new(Arc::new(config), Role::Client).unwrap();
        client.write_records(ContentType::Handshake, &[1; 10]).unwrap();
        let mut lens = Vec::new();
        while let Output::Packet(p) = client.poll_output() {
            lens.push(p.len() - STREAM_HEADER_LEN);
        }
        assert_eq!(lens, vec![4, 4, 2]);
    }
}
