//! Per connection state: the two endpoints and the negotiated properties.

use std::sync::Arc;

use crate::config::Config;
use crate::crypto::provider::{ActiveKeyExchange, SigningKey};
use crate::crypto::{KeySchedule, RecordCipher, Transcript};
use crate::extension::{ExtensionType, MaxFragmentLength};
use crate::key_exchange::{KeyExchange, KeyExchangeFactory, KeyPair};
use crate::secret::Secret;
use crate::types::{CipherSuite, CipherSuiteParams, CompressionMethod, NamedGroup};
use crate::types::{ProtocolVersion, SignatureScheme, TlsVersion};
use crate::{Error, InternalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// Which side of the engine a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Local,
    Remote,
}

/// One endpoint of the connection.
#[derive(Debug)]
pub struct TlsConnection {
    role: Role,
    random: [u8; 32],
    session_id: Vec<u8>,
    certificates: Vec<Vec<u8>>,
    key_exchange: Option<KeyExchange>,
    key_pair: Option<KeyPair>,
    /// Keys of the next epoch, waiting for ChangeCipherSpec or the client Finished.
    pending_cipher: Option<RecordCipher>,
    cipher: Option<RecordCipher>,
    traffic_secret: Option<Secret>,
}

impl TlsConnection {
    pub fn new(role: Role, random: [u8; 32]) -> Self {
        TlsConnection {
            role,
            random,
            session_id: Vec::new(),
            certificates: Vec::new(),
            key_exchange: None,
            key_pair: None,
            pending_cipher: None,
            cipher: None,
            traffic_secret: None,
        }
    }

    #[inline(always)]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline(always)]
    pub fn random(&self) -> &[u8; 32] {
        &self.random
    }

    /// Overwrite the random before the hello is sent (downgrade sentinel).
    pub fn set_random(&mut self, random: [u8; 32]) {
        self.random = random;
    }

    #[inline(always)]
    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn set_session_id(&mut self, id: Vec<u8>) {
        self.session_id = id;
    }

    /// DER certificates, leaf first.
    #[inline(always)]
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    pub fn set_certificates(&mut self, certificates: Vec<Vec<u8>>) {
        self.certificates = certificates;
    }

    pub fn key_exchange(&self) -> Option<&KeyExchange> {
        self.key_exchange.as_ref()
    }

    pub fn set_key_exchange(&mut self, key_exchange: KeyExchange) {
        self.key_exchange = Some(key_exchange);
    }

    pub fn key_pair(&self) -> Option<&KeyPair> {
        self.key_pair.as_ref()
    }

    pub fn set_key_pair(&mut self, pair: KeyPair) {
        self.key_pair = Some(pair);
    }

    pub fn take_key_pair(&mut self) -> Option<KeyPair> {
        self.key_pair.take()
    }

    /// Stage keys that become active with [`TlsConnection::enable_cipher`].
    pub fn install_cipher(&mut self, cipher: RecordCipher) {
        self.pending_cipher = Some(cipher);
    }

    /// Switch to the staged keys.
    pub fn enable_cipher(&mut self) -> Result<(), Error> {
        let cipher = self
            .pending_cipher
            .take()
            .ok_or(InternalError::CipherNotInstalled)?;
        debug!("{:?} cipher enabled: {:?}", self.role, cipher.bulk());
        self.cipher = Some(cipher);
        Ok(())
    }

    /// Replace the active keys directly (TLS 1.3 key changes).
    pub fn set_cipher(&mut self, cipher: RecordCipher) {
        debug!("{:?} cipher set: {:?}", self.role, cipher.bulk());
        self.cipher = Some(cipher);
    }

    pub fn has_pending_cipher(&self) -> bool {
        self.pending_cipher.is_some()
    }

    #[inline(always)]
    pub fn is_cipher_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn cipher_mut(&mut self) -> Option<&mut RecordCipher> {
        self.cipher.as_mut()
    }

    pub fn traffic_secret(&self) -> Option<&Secret> {
        self.traffic_secret.as_ref()
    }

    /// Replace the traffic secret, destroying the previous one.
    pub fn set_traffic_secret(&mut self, secret: Secret) {
        if let Some(old) = self.traffic_secret.replace(secret) {
            old.destroy();
        }
    }
}

/// Everything one connection has negotiated so far.
pub struct TlsContext {
    config: Arc<Config>,
    signing_key: Option<Box<dyn SigningKey>>,

    local: TlsConnection,
    remote: Option<TlsConnection>,

    version: Option<TlsVersion>,
    client_hello_version: ProtocolVersion,
    cipher_suite: Option<CipherSuite>,
    compression: Option<CompressionMethod>,

    /// Acceptable groups, narrowed by supported_groups.
    groups: Vec<NamedGroup>,
    peer_signature_schemes: Vec<SignatureScheme>,
    /// Extension types the client offered.
    offered_extensions: Vec<ExtensionType>,
    /// Extension types in effect for this connection.
    extensions: Vec<ExtensionType>,
    /// Client key shares waiting for the ServerHello.
    key_shares: Vec<Box<dyn ActiveKeyExchange>>,

    extended_master_secret: bool,
    grease: bool,
    alpn: Option<Vec<u8>>,
    /// Requested by the client. Only in effect once the extension is.
    max_fragment_length: Option<MaxFragmentLength>,
    server_name: Option<String>,
    srp_identity: Option<Vec<u8>>,
    certificate_requested: bool,

    transcript: Transcript,
    master_secret: Option<Secret>,
    key_schedule: Option<KeySchedule>,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("role", &self.local.role)
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

fn missing(name: &'static str) -> Error {
    InternalError::MissingProperty(name).into()
}

impl TlsContext {
    /// Context for a new connection. Loads the private key, if configured.
    pub fn new(config: Arc<Config>, role: Role) -> Result<Self, Error> {
        let provider = config.crypto_provider();

        let signing_key = match config.private_key() {
            Some(der) => Some(
                provider
                    .key_provider
                    .load_private_key(der.as_bytes())
                    .map_err(|e| Error::ConfigError(format!("Bad private key: {}", e)))?,
            ),
            None => None,
        };

        let mut random = [0u8; 32];
        provider
            .secure_random
            .fill(&mut random)
            .map_err(Error::crypto)?;

        let groups = config
            .groups()
            .iter()
            .copied()
            .filter(|g| provider.find_kx_group(*g).is_some())
            .collect();

        Ok(TlsContext {
            signing_key,
            local: TlsConnection::new(role, random),
            remote: None,
            version: None,
            client_hello_version: config.max_version().legacy_id(),
            cipher_suite: None,
            compression: None,
            groups,
            peer_signature_schemes: Vec::new(),
            offered_extensions: Vec::new(),
            extensions: Vec::new(),
            key_shares: Vec::new(),
            extended_master_secret: false,
            grease: false,
            alpn: None,
            max_fragment_length: None,
            server_name: None,
            srp_identity: None,
            certificate_requested: false,
            transcript: Transcript::new(),
            master_secret: None,
            key_schedule: None,
            config,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn signing_key(&self) -> Option<&dyn SigningKey> {
        self.signing_key.as_deref()
    }

    #[inline(always)]
    pub fn local_role(&self) -> Role {
        self.local.role
    }

    #[inline(always)]
    pub fn local(&self) -> &TlsConnection {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut TlsConnection {
        &mut self.local
    }

    /// The peer, known once its hello was parsed.
    pub fn remote(&self) -> Result<&TlsConnection, Error> {
        self.remote.as_ref().ok_or_else(|| missing("remote connection"))
    }

    pub fn remote_mut(&mut self) -> Result<&mut TlsConnection, Error> {
        self.remote.as_mut().ok_or_else(|| missing("remote connection"))
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn set_remote(&mut self, remote: TlsConnection) {
        self.remote = Some(remote);
    }

    /// Local and remote connections at once.
    pub fn connections_mut(&mut self) -> Result<(&mut TlsConnection, &mut TlsConnection), Error> {
        let remote = self.remote.as_mut().ok_or_else(|| missing("remote connection"))?;
        Ok((&mut self.local, remote))
    }

    /// The connection of `role`, local or remote.
    pub fn connection(&self, role: Role) -> Result<&TlsConnection, Error> {
        if role == self.local.role {
            Ok(&self.local)
        } else {
            self.remote()
        }
    }

    pub fn client_random(&self) -> Result<[u8; 32], Error> {
        Ok(*self.connection(Role::Client)?.random())
    }

    pub fn server_random(&self) -> Result<[u8; 32], Error> {
        Ok(*self.connection(Role::Server)?.random())
    }

    pub fn version(&self) -> Result<TlsVersion, Error> {
        self.version.ok_or_else(|| missing("version"))
    }

    pub fn version_opt(&self) -> Option<TlsVersion> {
        self.version
    }

    pub fn set_version(&mut self, version: TlsVersion) {
        debug!("Negotiated version {:?}", version);
        self.version = Some(version);
    }

    pub fn is_tls13(&self) -> bool {
        self.version.map(|v| v.is_tls13()).unwrap_or(false)
    }

    /// The legacy_version field of the ClientHello.
    #[inline(always)]
    pub fn client_hello_version(&self) -> ProtocolVersion {
        self.client_hello_version
    }

    pub fn set_client_hello_version(&mut self, version: ProtocolVersion) {
        self.client_hello_version = version;
    }

    pub fn cipher_suite(&self) -> Result<CipherSuite, Error> {
        self.cipher_suite.ok_or_else(|| missing("cipher suite"))
    }

    pub fn cipher_suite_opt(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    pub fn cipher_suite_params(&self) -> Result<CipherSuiteParams, Error> {
        self.cipher_suite()?
            .params()
            .ok_or_else(|| missing("cipher suite parameters"))
    }

    pub fn set_cipher_suite(&mut self, suite: CipherSuite) {
        debug!("Negotiated cipher suite {:?}", suite);
        self.cipher_suite = Some(suite);
    }

    /// The key exchange of the negotiated suite.
    ///
    /// Decoding a key exchange before a suite is negotiated is a local bug.
    pub fn key_exchange_factory(&self) -> Result<KeyExchangeFactory, Error> {
        let params = self
            .cipher_suite
            .and_then(|s| s.params())
            .ok_or(InternalError::KeyExchangeNotNegotiated)?;
        Ok(KeyExchangeFactory::for_suite(&params))
    }

    pub fn compression(&self) -> Result<CompressionMethod, Error> {
        self.compression.ok_or_else(|| missing("compression"))
    }

    pub fn set_compression(&mut self, compression: CompressionMethod) {
        self.compression = Some(compression);
    }

    #[inline(always)]
    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    /// Keep only groups in `supported`, in our preference order.
    pub fn narrow_groups(&mut self, supported: &[NamedGroup]) {
        self.groups.retain(|g| supported.contains(g));
        trace!("Groups narrowed to {:?}", self.groups);
    }

    pub fn peer_signature_schemes(&self) -> &[SignatureScheme] {
        &self.peer_signature_schemes
    }

    pub fn set_peer_signature_schemes(&mut self, schemes: Vec<SignatureScheme>) {
        self.peer_signature_schemes = schemes;
    }

    pub fn offered_extensions(&self) -> &[ExtensionType] {
        &self.offered_extensions
    }

    pub fn set_offered_extensions(&mut self, types: Vec<ExtensionType>) {
        self.offered_extensions = types;
    }

    pub fn extensions(&self) -> &[ExtensionType] {
        &self.extensions
    }

    pub fn has_extension(&self, t: ExtensionType) -> bool {
        self.extensions.contains(&t)
    }

    pub fn add_extension(&mut self, t: ExtensionType) {
        if !self.extensions.contains(&t) {
            self.extensions.push(t);
        }
    }

    pub fn push_key_share(&mut self, kx: Box<dyn ActiveKeyExchange>) {
        self.key_shares.push(kx);
    }

    pub fn clear_key_shares(&mut self) {
        self.key_shares.clear();
    }

    pub fn key_share_groups(&self) -> Vec<NamedGroup> {
        self.key_shares.iter().map(|k| k.group()).collect()
    }

    pub fn key_share_public(&self, group: NamedGroup) -> Option<&[u8]> {
        self.key_shares
            .iter()
            .find(|k| k.group() == group)
            .map(|k| k.pub_key())
    }

    /// Take the share of `group`, dropping the others.
    pub fn take_key_share(&mut self, group: NamedGroup) -> Option<Box<dyn ActiveKeyExchange>> {
        let pos = self.key_shares.iter().position(|k| k.group() == group)?;
        let kx = self.key_shares.swap_remove(pos);
        self.key_shares.clear();
        Some(kx)
    }

    #[inline(always)]
    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn set_extended_master_secret(&mut self, enabled: bool) {
        self.extended_master_secret = enabled;
    }

    #[inline(always)]
    pub fn grease(&self) -> bool {
        self.grease
    }

    pub fn set_grease(&mut self, enabled: bool) {
        self.grease = enabled;
    }

    pub fn alpn(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    pub fn set_alpn(&mut self, protocol: Vec<u8>) {
        debug!("Negotiated ALPN {:?}", String::from_utf8_lossy(&protocol));
        self.alpn = Some(protocol);
    }

    pub fn max_fragment_length(&self) -> Option<MaxFragmentLength> {
        self.max_fragment_length
    }

    pub fn set_max_fragment_length(&mut self, length: MaxFragmentLength) {
        self.max_fragment_length = Some(length);
    }

    /// Plaintext limit per record agreed through max_fragment_length.
    pub fn negotiated_fragment_limit(&self) -> Option<usize> {
        if !self.has_extension(ExtensionType::MaxFragmentLength) {
            return None;
        }
        self.max_fragment_length.and_then(|m| m.plaintext_len())
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn set_server_name(&mut self, name: String) {
        self.server_name = Some(name);
    }

    pub fn srp_identity(&self) -> Option<&[u8]> {
        self.srp_identity.as_deref()
    }

    pub fn set_srp_identity(&mut self, identity: Vec<u8>) {
        self.srp_identity = Some(identity);
    }

    #[inline(always)]
    pub fn certificate_requested(&self) -> bool {
        self.certificate_requested
    }

    pub fn set_certificate_requested(&mut self, requested: bool) {
        self.certificate_requested = requested;
    }

    #[inline(always)]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn master_secret(&self) -> Result<&Secret, Error> {
        self.master_secret.as_ref().ok_or_else(|| missing("master secret"))
    }

    pub fn set_master_secret(&mut self, secret: Secret) {
        if let Some(old) = self.master_secret.replace(secret) {
            old.destroy();
        }
    }

    pub fn key_schedule(&self) -> Result<&KeySchedule, Error> {
        self.key_schedule.as_ref().ok_or_else(|| missing("key schedule"))
    }

    pub fn key_schedule_mut(&mut self) -> Result<&mut KeySchedule, Error> {
        self.key_schedule.as_mut().ok_or_else(|| missing("key schedule"))
    }

    pub fn set_key_schedule(&mut self, schedule: KeySchedule) {
        self.key_schedule = Some(schedule);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::CipherSuite;

    fn context(role: Role) -> TlsContext {
        TlsContext::new(Arc::new(Config::default()), role).unwrap()
    }

    #[test]
    fn properties_are_missing_until_negotiated() {
        let ctx = context(Role::Client);
        assert!(matches!(
            ctx.version(),
            Err(Error::Internal(InternalError::MissingProperty("version")))
        ));
        assert!(matches!(
            ctx.remote(),
            Err(Error::Internal(InternalError::MissingProperty(_)))
        ));
        assert!(ctx.master_secret().is_err());
    }

    #[test]
    fn key_exchange_needs_a_suite() {
        let mut ctx = context(Role::Server);
        assert!(matches!(
            ctx.key_exchange_factory(),
            Err(Error::Internal(InternalError::KeyExchangeNotNegotiated))
        ));
        ctx.set_cipher_suite(CipherSuite::ECDHE_RSA_AES128_GCM_SHA256);
        let f = ctx.key_exchange_factory().unwrap();
        assert_eq!(f.kind(), crate::types::KeyExchangeKind::Ecdh);
    }

    #[test]
    fn decode_before_negotiation_is_internal() {
        let mut ctx = context(Role::Server);
        ctx.set_remote(TlsConnection::new(Role::Client, [0; 32]));
        ctx.set_version(TlsVersion::Tls12);
        let err = ctx
            .key_exchange_factory()
            .and_then(|f| f.decode_remote(&ctx, &[1, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::Internal(InternalError::KeyExchangeNotNegotiated)));
        assert_eq!(err.alert().map(|a| a.description), Some(crate::types::AlertDescription::InternalError));
    }

    #[test]
    fn enabling_without_keys_fails() {
        let mut c = TlsConnection::new(Role::Client, [1; 32]);
        assert!(!c.is_cipher_enabled());
        assert!(matches!(
            c.enable_cipher(),
            Err(Error::Internal(InternalError::CipherNotInstalled))
        ));
    }

    #[test]
    fn narrowing_keeps_local_preference() {
        let mut ctx = context(Role::Server);
        ctx.narrow_groups(&[NamedGroup::Secp384r1, NamedGroup::X25519]);
        assert_eq!(ctx.groups(), &[NamedGroup::X25519, NamedGroup::Secp384r1]);
    }
}
