//! Key exchange algorithms.
//!
//! Each algorithm has a client and a server wire shape and its own way of
//! arriving at the premaster secret. [`KeyExchangeFactory`] is the stateless
//! entry point chosen by the negotiated cipher suite; everything that lives for
//! one handshake is kept on the [`TlsContext`].
//!
//! ```text
//!  kind        server sends                      client sends
//!  ---------   -------------------------------   --------------------------
//!  DH(E)       p, g, Ys                          Yc
//!  ECDH(E)     ECParameters, point               point
//!  RSA         (export: temporary RSA key)       encrypted premaster
//!  PSK         identity hint (optional)          identity
//!  DHE_PSK     identity hint, p, g, Ys           identity, Yc
//!  ECDHE_PSK   identity hint, ECParameters, pt.  identity, point
//!  SRP         N, g, s, B                        A
//!  ECCPWD      salt, ECParameters, element, sc.  element, scalar
//!  GOSTR       -                                 public key, additional data
//!  KRB5        -                                 ticket, authenticator, premaster
//!  TLS 1.3     (key_share extension)             (key_share extension)
//! ```

use nom::error::{Error as NomError, ErrorKind};
use nom::{Err, IResult};

use crate::codec::parse_all;
use crate::context::{Role, TlsContext};
use crate::crypto::dh::{DhKeyPair, DhParams};
use crate::crypto::provider::ActiveKeyExchange;
use crate::secret::Secret;
use crate::types::{AlertDescription, CipherSuiteParams, KeyExchangeKind, KeyExchangeType};
use crate::types::{NamedGroup, TlsVersion};
use crate::{Error, InternalError};

pub mod dh;
pub mod ec_params;
pub mod eccpwd;
pub mod ecdh;
pub mod gostr;
pub mod krb5;
pub mod psk;
pub mod rsa;
pub mod srp;

pub use dh::DhKeyExchange;
pub use ec_params::{Char2Basis, Curve, EcParams};
pub use eccpwd::EccPwdKeyExchange;
pub use ecdh::EcdhKeyExchange;
pub use gostr::GostrKeyExchange;
pub use krb5::Krb5KeyExchange;
pub use psk::PskKeyExchange;
pub use rsa::RsaKeyExchange;
pub use srp::{SrpGroup, SrpKeyExchange, SrpKeyPair};

/// TLS 1.3 key share of one side. Travels in the key_share extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualKeyExchange {
    pub group: NamedGroup,
    pub public_key: Vec<u8>,
}

/// The key exchange values of one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExchange {
    None,
    Dh(DhKeyExchange),
    Ecdh(EcdhKeyExchange),
    Rsa(RsaKeyExchange),
    Psk(PskKeyExchange),
    DhePsk(PskKeyExchange, DhKeyExchange),
    EcdhePsk(PskKeyExchange, EcdhKeyExchange),
    Srp(SrpKeyExchange),
    EccPwd(EccPwdKeyExchange),
    Gostr(GostrKeyExchange),
    Krb5(Krb5KeyExchange),
    Contextual(ContextualKeyExchange),
}

fn tag_error(input: &[u8]) -> Err<NomError<&[u8]>> {
    Err::Failure(NomError::new(input, ErrorKind::Tag))
}

impl KeyExchange {
    pub fn kind(&self) -> KeyExchangeKind {
        match self {
            KeyExchange::None => KeyExchangeKind::None,
            KeyExchange::Dh(_) => KeyExchangeKind::Dh,
            KeyExchange::Ecdh(_) => KeyExchangeKind::Ecdh,
            KeyExchange::Rsa(_) => KeyExchangeKind::Rsa,
            KeyExchange::Psk(_) => KeyExchangeKind::Psk,
            KeyExchange::DhePsk(..) => KeyExchangeKind::DhePsk,
            KeyExchange::EcdhePsk(..) => KeyExchangeKind::EcdhePsk,
            KeyExchange::Srp(_) => KeyExchangeKind::Srp,
            KeyExchange::EccPwd(_) => KeyExchangeKind::EccPwd,
            KeyExchange::Gostr(_) => KeyExchangeKind::Gostr,
            KeyExchange::Krb5(_) => KeyExchangeKind::Krb5,
            KeyExchange::Contextual(_) => KeyExchangeKind::Contextual,
        }
    }

    /// Parse the values `sender` puts on the wire for `kind`.
    pub fn parse(
        input: &[u8],
        kind: KeyExchangeKind,
        sender: Role,
        version: TlsVersion,
    ) -> IResult<&[u8], KeyExchange> {
        use KeyExchangeKind as K;
        match (kind, sender) {
            (K::None, _) => Ok((input, KeyExchange::None)),
            (K::Dh, _) => {
                let (input, v) = DhKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::Dh(v)))
            }
            (K::Ecdh, _) => {
                let (input, v) = EcdhKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::Ecdh(v)))
            }
            (K::Rsa, _) => {
                let (input, v) = RsaKeyExchange::parse(input, sender, version)?;
                Ok((input, KeyExchange::Rsa(v)))
            }
            (K::Psk, _) => {
                let (input, v) = PskKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::Psk(v)))
            }
            (K::DhePsk, _) => {
                let (input, psk) = PskKeyExchange::parse(input, sender)?;
                let (input, dh) = DhKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::DhePsk(psk, dh)))
            }
            (K::EcdhePsk, _) => {
                let (input, psk) = PskKeyExchange::parse(input, sender)?;
                let (input, ecdh) = EcdhKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::EcdhePsk(psk, ecdh)))
            }
            (K::Srp, _) => {
                let (input, v) = SrpKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::Srp(v)))
            }
            (K::EccPwd, _) => {
                let (input, v) = EccPwdKeyExchange::parse(input, sender)?;
                Ok((input, KeyExchange::EccPwd(v)))
            }
            (K::Gostr, Role::Client) => {
                let (input, v) = GostrKeyExchange::parse(input)?;
                Ok((input, KeyExchange::Gostr(v)))
            }
            (K::Krb5, Role::Client) => {
                let (input, v) = Krb5KeyExchange::parse(input)?;
                Ok((input, KeyExchange::Krb5(v)))
            }
            // no server message, and TLS 1.3 has no message at all
            (K::Gostr, Role::Server) | (K::Krb5, Role::Server) | (K::Contextual, _) => {
                Err(tag_error(input))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: TlsVersion) {
        match self {
            KeyExchange::None | KeyExchange::Contextual(_) => {}
            KeyExchange::Dh(v) => v.serialize(output),
            KeyExchange::Ecdh(v) => v.serialize(output),
            KeyExchange::Rsa(v) => v.serialize(output, version),
            KeyExchange::Psk(v) => v.serialize(output),
            KeyExchange::DhePsk(psk, dh) => {
                psk.serialize(output);
                dh.serialize(output);
            }
            KeyExchange::EcdhePsk(psk, ecdh) => {
                psk.serialize(output);
                ecdh.serialize(output);
            }
            KeyExchange::Srp(v) => v.serialize(output),
            KeyExchange::EccPwd(v) => v.serialize(output),
            KeyExchange::Gostr(v) => v.serialize(output),
            KeyExchange::Krb5(v) => v.serialize(output),
        }
    }

    /// The sender's public value, where the algorithm has one.
    fn public_value(&self) -> Option<&[u8]> {
        match self {
            KeyExchange::Dh(v) | KeyExchange::DhePsk(_, v) => Some(v.public()),
            KeyExchange::Ecdh(v) | KeyExchange::EcdhePsk(_, v) => Some(v.public_key()),
            KeyExchange::Srp(SrpKeyExchange::Client { a }) => Some(a),
            KeyExchange::Srp(SrpKeyExchange::Server { b, .. }) => Some(b),
            KeyExchange::Contextual(v) => Some(&v.public_key),
            _ => None,
        }
    }

    /// The PSK identity or hint in front of the values.
    fn psk(&self) -> Option<&PskKeyExchange> {
        match self {
            KeyExchange::Psk(v) | KeyExchange::DhePsk(v, _) | KeyExchange::EcdhePsk(v, _) => {
                Some(v)
            }
            _ => None,
        }
    }
}

/// Private half of the local key exchange.
pub enum KeyPair {
    Dh(DhKeyPair),
    Group(Box<dyn ActiveKeyExchange>),
    Srp(SrpKeyPair),
    /// The premaster is already known, e.g. an RSA client picked it.
    Premaster(Secret),
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPair::Dh(p) => f.debug_tuple("Dh").field(p).finish(),
            KeyPair::Group(g) => f.debug_tuple("Group").field(&g.group()).finish(),
            KeyPair::Srp(p) => f.debug_tuple("Srp").field(p).finish(),
            KeyPair::Premaster(s) => f.debug_tuple("Premaster").field(s).finish(),
        }
    }
}

fn handshake_failure() -> Error {
    Error::fatal(AlertDescription::HandshakeFailure)
}

fn illegal_parameter() -> Error {
    Error::fatal(AlertDescription::IllegalParameter)
}

/// Stateless key exchange operations of one cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExchangeFactory {
    kind: KeyExchangeKind,
    kx_type: KeyExchangeType,
}

impl KeyExchangeFactory {
    pub fn for_suite(params: &CipherSuiteParams) -> Self {
        KeyExchangeFactory {
            kind: params.key_exchange,
            kx_type: params.key_exchange_type,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> KeyExchangeKind {
        self.kind
    }

    /// STATIC reads the exchanged value from a certificate. EPHEMERAL generates
    /// a fresh key pair per handshake.
    #[inline(always)]
    pub fn kx_type(&self) -> KeyExchangeType {
        self.kx_type
    }

    /// Whether the server must send a ServerKeyExchange.
    pub fn requires_server_params(&self) -> bool {
        use KeyExchangeKind as K;
        match self.kind {
            K::Dh | K::DhePsk | K::EcdhePsk | K::Srp | K::EccPwd => true,
            K::Ecdh => self.kx_type == KeyExchangeType::Ephemeral,
            _ => false,
        }
    }

    /// Whether the server may send a ServerKeyExchange at all.
    pub fn allows_server_params(&self) -> bool {
        self.requires_server_params()
            || matches!(self.kind, KeyExchangeKind::Psk | KeyExchangeKind::Rsa)
    }

    /// Parse the values of `sender`, leaving any trailing bytes (a signature) to the caller.
    pub fn parse<'a>(
        &self,
        input: &'a [u8],
        sender: Role,
        version: TlsVersion,
    ) -> IResult<&'a [u8], KeyExchange> {
        KeyExchange::parse(input, self.kind, sender, version)
    }

    /// Decode a complete key exchange body sent by the local side.
    pub fn decode_local(&self, context: &TlsContext, input: &[u8]) -> Result<KeyExchange, Error> {
        let version = context.version()?;
        let sender = context.local_role();
        parse_all(input, |i| self.parse(i, sender, version))
    }

    /// Decode a complete key exchange body sent by the peer.
    pub fn decode_remote(&self, context: &TlsContext, input: &[u8]) -> Result<KeyExchange, Error> {
        let version = context.version()?;
        let sender = context.local_role().peer();
        parse_all(input, |i| self.parse(i, sender, version))
    }

    /// Generate the local key exchange values.
    ///
    /// The private half is stored on the local connection. Returns `None` when
    /// the local side sends nothing, e.g. an RSA server.
    pub fn new_local(&self, context: &mut TlsContext) -> Result<Option<KeyExchange>, Error> {
        let (values, pair) = match context.local_role() {
            Role::Server => self.new_server(context)?,
            Role::Client => self.new_client(context)?,
        };
        if let Some(pair) = pair {
            context.local_mut().set_key_pair(pair);
        }
        if let Some(v) = &values {
            debug!("New local {:?} key exchange ({:?})", v.kind(), self.kx_type);
        }
        Ok(values)
    }

    fn new_server(
        &self,
        context: &TlsContext,
    ) -> Result<(Option<KeyExchange>, Option<KeyPair>), Error> {
        let provider = context.config().crypto_provider();
        Ok(match self.kind {
            KeyExchangeKind::Dh => {
                let (values, pair) = dhe_server();
                (Some(KeyExchange::Dh(values)), Some(pair))
            }

            KeyExchangeKind::Ecdh if self.kx_type == KeyExchangeType::Ephemeral => {
                let (values, pair) = ecdhe_server(context)?;
                (Some(KeyExchange::Ecdh(values)), Some(pair))
            }

            KeyExchangeKind::DhePsk => {
                let (values, pair) = dhe_server();
                let hint = PskKeyExchange::Server {
                    hint: psk_hint(context).unwrap_or_default(),
                };
                (Some(KeyExchange::DhePsk(hint, values)), Some(pair))
            }

            KeyExchangeKind::EcdhePsk => {
                let (values, pair) = ecdhe_server(context)?;
                let hint = PskKeyExchange::Server {
                    hint: psk_hint(context).unwrap_or_default(),
                };
                (Some(KeyExchange::EcdhePsk(hint, values)), Some(pair))
            }

            KeyExchangeKind::Psk => {
                let hint = psk_hint(context)
                    .map(|hint| KeyExchange::Psk(PskKeyExchange::Server { hint }));
                (hint, None)
            }

            KeyExchangeKind::Srp => {
                let identity = context.srp_identity().ok_or_else(|| {
                    Error::fatal(AlertDescription::UnknownPskIdentity)
                })?;
                let record = context
                    .config()
                    .srp_verifier(identity)
                    .ok_or_else(|| Error::fatal(AlertDescription::UnknownPskIdentity))?;
                let group = SrpGroup::rfc5054_1024();
                let pair = SrpKeyPair::server(provider, group.clone(), &record.verifier)?;
                let values = SrpKeyExchange::Server {
                    n: group.n.to_bytes_be(),
                    g: group.g.to_bytes_be(),
                    s: record.salt.clone(),
                    b: pair.public(),
                };
                (Some(KeyExchange::Srp(values)), Some(KeyPair::Srp(pair)))
            }

            KeyExchangeKind::EccPwd => return Err(handshake_failure()),

            // static ECDH, RSA, KRB5 and GOSTR servers send no parameters
            _ => (None, None),
        })
    }

    fn new_client(
        &self,
        context: &TlsContext,
    ) -> Result<(Option<KeyExchange>, Option<KeyPair>), Error> {
        let provider = context.config().crypto_provider();
        let remote = context.remote()?;
        let server_values = remote.key_exchange();

        Ok(match self.kind {
            KeyExchangeKind::None => (Some(KeyExchange::None), None),

            KeyExchangeKind::Dh => {
                let Some(KeyExchange::Dh(server)) = server_values else {
                    return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                };
                let (values, pair) = dhe_client(server)?;
                (Some(KeyExchange::Dh(values)), Some(pair))
            }

            KeyExchangeKind::DhePsk => {
                let Some(KeyExchange::DhePsk(_, server)) = server_values else {
                    return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                };
                let (values, pair) = dhe_client(server)?;
                let identity = psk_identity(context)?;
                (Some(KeyExchange::DhePsk(identity, values)), Some(pair))
            }

            KeyExchangeKind::EcdhePsk => {
                let Some(KeyExchange::EcdhePsk(_, EcdhKeyExchange::Server { params, .. })) =
                    server_values
                else {
                    return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                };
                let (values, pair) = ecdhe_client(context, params)?;
                let identity = psk_identity(context)?;
                (Some(KeyExchange::EcdhePsk(identity, values)), Some(pair))
            }

            KeyExchangeKind::Ecdh if self.kx_type == KeyExchangeType::Static => {
                let cert = remote
                    .certificates()
                    .first()
                    .ok_or_else(|| Error::fatal(AlertDescription::CertificateUnobtainable))?;
                let (public, shared) = provider
                    .certificate_keys
                    .agree_ephemeral(cert)
                    .map_err(|_| handshake_failure())?;
                let values = EcdhKeyExchange::Client { public_key: public };
                (
                    Some(KeyExchange::Ecdh(values)),
                    Some(KeyPair::Premaster(Secret::new(shared))),
                )
            }

            KeyExchangeKind::Ecdh => {
                let Some(KeyExchange::Ecdh(EcdhKeyExchange::Server { params, .. })) =
                    server_values
                else {
                    return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                };
                let (values, pair) = ecdhe_client(context, params)?;
                (Some(KeyExchange::Ecdh(values)), Some(pair))
            }

            KeyExchangeKind::Rsa => {
                // client_version || 46 random bytes
                let mut premaster = context.client_hello_version().0.to_be_bytes().to_vec();
                premaster.extend(
                    provider
                        .random_vec(rsa::PREMASTER_LEN - 2)
                        .map_err(Error::crypto)?,
                );
                let encrypted = match server_values {
                    Some(KeyExchange::Rsa(RsaKeyExchange::Server { modulus, exponent })) => {
                        provider
                            .certificate_keys
                            .encrypt_pkcs1_raw(modulus, exponent, &premaster)
                    }
                    _ => {
                        let cert = remote.certificates().first().ok_or_else(|| {
                            Error::fatal(AlertDescription::CertificateUnobtainable)
                        })?;
                        provider.certificate_keys.encrypt_pkcs1(cert, &premaster)
                    }
                }
                .map_err(|_| handshake_failure())?;
                let values = RsaKeyExchange::Client {
                    encrypted_premaster: encrypted,
                };
                (
                    Some(KeyExchange::Rsa(values)),
                    Some(KeyPair::Premaster(Secret::new(premaster))),
                )
            }

            KeyExchangeKind::Psk => (Some(KeyExchange::Psk(psk_identity(context)?)), None),

            KeyExchangeKind::Srp => {
                let Some(KeyExchange::Srp(SrpKeyExchange::Server { n, g, .. })) = server_values
                else {
                    return Err(Error::fatal(AlertDescription::UnexpectedMessage));
                };
                let group = SrpGroup::from_bytes(n, g);
                if !group.is_known() {
                    return Err(Error::fatal(AlertDescription::InsufficientSecurity));
                }
                let pair = SrpKeyPair::client(group);
                let values = SrpKeyExchange::Client { a: pair.public() };
                (Some(KeyExchange::Srp(values)), Some(KeyPair::Srp(pair)))
            }

            KeyExchangeKind::EccPwd | KeyExchangeKind::Gostr | KeyExchangeKind::Krb5 => {
                return Err(handshake_failure())
            }

            // carried by the key_share extension
            KeyExchangeKind::Contextual => (None, None),
        })
    }

    /// Combine the local key pair with the peer's values into the premaster
    /// secret (the shared secret in TLS 1.3).
    ///
    /// The local key pair is consumed.
    pub fn premaster_secret(&self, context: &mut TlsContext) -> Result<Secret, Error> {
        let role = context.local_role();
        let pair = context.local_mut().take_key_pair();
        let provider = context.config().crypto_provider().clone();
        let remote = context.remote()?;
        let peer = remote.key_exchange();
        let peer_public = peer.and_then(|p| p.public_value());

        let secret = match (self.kind, pair) {
            (KeyExchangeKind::Dh, Some(KeyPair::Dh(pair))) => {
                let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                pair.agree(peer_public, false).map_err(|_| illegal_parameter())?
            }

            (KeyExchangeKind::Ecdh, Some(KeyPair::Group(kx)))
            | (KeyExchangeKind::Contextual, Some(KeyPair::Group(kx))) => {
                let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                Secret::new(kx.complete(peer_public).map_err(|_| illegal_parameter())?)
            }

            // static ECDH server: agree with the certificate key
            (KeyExchangeKind::Ecdh, None) if role == Role::Server => {
                let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                let key = context.signing_key().ok_or_else(handshake_failure)?;
                Secret::new(key.agree(peer_public).map_err(|_| illegal_parameter())?)
            }

            (KeyExchangeKind::Rsa, None) if role == Role::Server => {
                let Some(KeyExchange::Rsa(RsaKeyExchange::Client {
                    encrypted_premaster,
                })) = peer
                else {
                    return Err(illegal_parameter());
                };
                let key = context.signing_key().ok_or_else(handshake_failure)?;
                rsa_server_premaster(
                    &provider,
                    key.decrypt_pkcs1(encrypted_premaster).ok(),
                    context.client_hello_version().0,
                )?
            }

            (KeyExchangeKind::Psk, None) => psk_premaster(context, peer, None)?,

            (KeyExchangeKind::DhePsk, Some(KeyPair::Dh(pair))) => {
                let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                let z = pair.agree(peer_public, false).map_err(|_| illegal_parameter())?;
                psk_premaster(context, peer, Some(z.as_bytes()))?
            }

            (KeyExchangeKind::EcdhePsk, Some(KeyPair::Group(kx))) => {
                let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                let z = kx.complete(peer_public).map_err(|_| illegal_parameter())?;
                psk_premaster(context, peer, Some(&z))?
            }

            (KeyExchangeKind::Srp, Some(KeyPair::Srp(pair))) => match role {
                Role::Client => {
                    let Some(KeyExchange::Srp(SrpKeyExchange::Server { s, b, .. })) = peer else {
                        return Err(illegal_parameter());
                    };
                    let creds = context
                        .config()
                        .srp()
                        .ok_or_else(|| Error::fatal(AlertDescription::UnknownPskIdentity))?;
                    pair.client_secret(&provider, b, s, &creds.username, &creds.password)?
                }
                Role::Server => {
                    let peer_public = peer_public.ok_or_else(illegal_parameter)?;
                    pair.server_secret(&provider, peer_public)?
                }
            },

            (_, Some(KeyPair::Premaster(secret))) => secret,

            (KeyExchangeKind::EccPwd, _)
            | (KeyExchangeKind::Gostr, _)
            | (KeyExchangeKind::Krb5, _)
            | (KeyExchangeKind::None, _) => return Err(handshake_failure()),

            (kind, pair) => {
                warn!("No premaster for {:?} with key pair {:?}", kind, pair);
                return Err(InternalError::MissingProperty("local key pair").into());
            }
        };

        trace!("Premaster secret of {} bytes", secret.len());
        Ok(secret)
    }
}

fn dhe_server() -> (DhKeyExchange, KeyPair) {
    let pair = DhKeyPair::generate(DhParams::ffdhe2048());
    let values = DhKeyExchange::Server {
        p: pair.params().p.to_bytes_be(),
        g: pair.params().g.to_bytes_be(),
        y: pair.public(),
    };
    (values, KeyPair::Dh(pair))
}

fn dhe_client(server: &DhKeyExchange) -> Result<(DhKeyExchange, KeyPair), Error> {
    let params = server.params().ok_or_else(illegal_parameter)?;
    if !params.is_acceptable() {
        return Err(Error::fatal(AlertDescription::InsufficientSecurity));
    }
    let pair = DhKeyPair::generate(params);
    let values = DhKeyExchange::Client { y: pair.public() };
    Ok((values, KeyPair::Dh(pair)))
}

/// The first EC group both sides support.
fn ecdhe_server(context: &TlsContext) -> Result<(EcdhKeyExchange, KeyPair), Error> {
    let group = context
        .groups()
        .iter()
        .copied()
        .find(|g| g.is_ec())
        .ok_or_else(handshake_failure)?;
    let kx = context
        .config()
        .crypto_provider()
        .find_kx_group(group)
        .ok_or_else(handshake_failure)?
        .start_exchange()
        .map_err(Error::crypto)?;
    let values = EcdhKeyExchange::Server {
        params: EcParams::NamedCurve(group),
        public_key: kx.pub_key().to_vec(),
    };
    Ok((values, KeyPair::Group(kx)))
}

fn ecdhe_client(
    context: &TlsContext,
    params: &EcParams,
) -> Result<(EcdhKeyExchange, KeyPair), Error> {
    // explicit curves are decoded but not supported for agreement
    let group = params.named_group().ok_or_else(handshake_failure)?;
    if !context.groups().contains(&group) {
        return Err(illegal_parameter());
    }
    let kx = context
        .config()
        .crypto_provider()
        .find_kx_group(group)
        .ok_or_else(illegal_parameter)?
        .start_exchange()
        .map_err(Error::crypto)?;
    let values = EcdhKeyExchange::Client {
        public_key: kx.pub_key().to_vec(),
    };
    Ok((values, KeyPair::Group(kx)))
}

fn psk_hint(context: &TlsContext) -> Option<Vec<u8>> {
    context.config().psk().and_then(|p| p.hint.clone())
}

fn psk_identity(context: &TlsContext) -> Result<PskKeyExchange, Error> {
    let psk = context
        .config()
        .psk()
        .ok_or_else(|| Error::fatal(AlertDescription::UnknownPskIdentity))?;
    Ok(PskKeyExchange::Client {
        identity: psk.identity.clone(),
    })
}

/// PSK premaster around `other_secret`, zeros for plain PSK.
///
/// A server only accepts the configured identity.
fn psk_premaster(
    context: &TlsContext,
    peer: Option<&KeyExchange>,
    other_secret: Option<&[u8]>,
) -> Result<Secret, Error> {
    let psk = context
        .config()
        .psk()
        .ok_or_else(|| Error::fatal(AlertDescription::UnknownPskIdentity))?;
    if context.local_role() == Role::Server {
        match peer.and_then(|p| p.psk()) {
            Some(PskKeyExchange::Client { identity }) if *identity == psk.identity => {}
            _ => return Err(Error::fatal(AlertDescription::UnknownPskIdentity)),
        }
    }
    Ok(match other_secret {
        Some(other) => psk::premaster_with(other, psk.key.as_bytes()),
        None => psk::premaster(psk.key.as_bytes()),
    })
}

/// RSA premaster on the server (RFC 5246 Section 7.4.7.1).
///
/// A decryption failure or a bad length or version silently continues with a
/// random premaster, so the handshake only fails at Finished.
fn rsa_server_premaster(
    provider: &crate::crypto::CryptoProvider,
    decrypted: Option<Vec<u8>>,
    client_version: u16,
) -> Result<Secret, Error> {
    let mut fallback = client_version.to_be_bytes().to_vec();
    fallback.extend(
        provider
            .random_vec(rsa::PREMASTER_LEN - 2)
            .map_err(Error::crypto)?,
    );

    match decrypted {
        Some(pms)
            if pms.len() == rsa::PREMASTER_LEN && pms[..2] == client_version.to_be_bytes() =>
        {
            Ok(Secret::new(pms))
        }
        _ => {
            debug!("RSA premaster rejected, continuing with a random one");
            Ok(Secret::new(fallback))
        }
    }
}
