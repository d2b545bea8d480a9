//! Hello extensions.
//!
//! [`Extension`] is the concrete, self contained wire form. A [`ModelExtension`]
//! needs the connection to become concrete, e.g. a key share needs a fresh key
//! pair. The [`processor`] schedules both kinds into rounds and applies what
//! each extension means for the negotiation.

use nom::number::complete::be_u16;
use nom::IResult;

use crate::codec::{len16, len8, WriteExt};
use crate::context::Role;
use crate::types::version::is_grease_u16;
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme, TlsVersion};

mod model;
pub mod processor;

pub use model::{retry_key_share, Dependency, ModelExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    MaxFragmentLength,
    SupportedGroups,
    EcPointFormats,
    Srp,
    SignatureAlgorithms,
    ApplicationLayerProtocolNegotiation,
    Padding,
    ExtendedMasterSecret,
    SupportedVersions,
    KeyShare,
    RenegotiationInfo,
    Grease(u16),
    Unknown(u16),
}

const PRE_TLS13: &[TlsVersion] = &[
    TlsVersion::Tls10,
    TlsVersion::Tls11,
    TlsVersion::Tls12,
    TlsVersion::Dtls10,
    TlsVersion::Dtls12,
];

const TLS13: &[TlsVersion] = &[TlsVersion::Tls13, TlsVersion::Dtls13];

const ALL: &[TlsVersion] = &[
    TlsVersion::Tls10,
    TlsVersion::Tls11,
    TlsVersion::Tls12,
    TlsVersion::Tls13,
    TlsVersion::Dtls10,
    TlsVersion::Dtls12,
    TlsVersion::Dtls13,
];

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x0001 => ExtensionType::MaxFragmentLength,
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000C => ExtensionType::Srp,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0015 => ExtensionType::Padding,
            0x0017 => ExtensionType::ExtendedMasterSecret,
            0x002B => ExtensionType::SupportedVersions,
            0x0033 => ExtensionType::KeyShare,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ if is_grease_u16(value) => ExtensionType::Grease(value),
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::MaxFragmentLength => 0x0001,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::Srp => 0x000C,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::Padding => 0x0015,
            ExtensionType::ExtendedMasterSecret => 0x0017,
            ExtensionType::SupportedVersions => 0x002B,
            ExtensionType::KeyShare => 0x0033,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Grease(v) | ExtensionType::Unknown(v) => *v,
        }
    }

    /// Versions this extension is defined for.
    pub fn versions(&self) -> &'static [TlsVersion] {
        match self {
            ExtensionType::EcPointFormats
            | ExtensionType::Srp
            | ExtensionType::ExtendedMasterSecret
            | ExtensionType::RenegotiationInfo => PRE_TLS13,
            ExtensionType::SupportedVersions | ExtensionType::KeyShare => TLS13,
            _ => ALL,
        }
    }

    pub fn applies_to(&self, version: TlsVersion) -> bool {
        self.versions().contains(&version)
    }

    /// Reserved 0x?A?A value.
    pub fn is_grease(&self) -> bool {
        matches!(self, ExtensionType::Grease(_))
    }
}

/// max_fragment_length code (RFC 6066 Section 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFragmentLength {
    Len512,
    Len1024,
    Len2048,
    Len4096,
    Unknown(u8),
}

impl MaxFragmentLength {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MaxFragmentLength::Len512,
            2 => MaxFragmentLength::Len1024,
            3 => MaxFragmentLength::Len2048,
            4 => MaxFragmentLength::Len4096,
            _ => MaxFragmentLength::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MaxFragmentLength::Len512 => 1,
            MaxFragmentLength::Len1024 => 2,
            MaxFragmentLength::Len2048 => 3,
            MaxFragmentLength::Len4096 => 4,
            MaxFragmentLength::Unknown(v) => *v,
        }
    }

    /// Plaintext bytes per record, `None` for an undefined code.
    pub fn plaintext_len(&self) -> Option<usize> {
        match self {
            MaxFragmentLength::Unknown(_) => None,
            m => Some(1 << (8 + m.as_u8())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    fn parse(input: &[u8]) -> IResult<&[u8], KeyShareEntry> {
        let (input, group) = NamedGroup::parse(input)?;
        let (input, key_exchange) = len16(input)?;
        Ok((
            input,
            KeyShareEntry {
                group,
                key_exchange: key_exchange.to_vec(),
            },
        ))
    }

    fn serialize(&self, output: &mut Vec<u8>) {
        self.group.serialize(output);
        output.put_bytes16(&self.key_exchange);
    }
}

/// key_share (RFC 8446 Section 4.2.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShare {
    Client(Vec<KeyShareEntry>),
    Server(KeyShareEntry),
    /// The group a HelloRetryRequest asks the client to use.
    HelloRetryRequest(NamedGroup),
}

/// supported_versions (RFC 8446 Section 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportedVersions {
    Client(Vec<ProtocolVersion>),
    Server(ProtocolVersion),
}

/// A concrete extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// Host name. The server acknowledges with an empty body.
    ServerName(Option<String>),
    /// Requested by the client, echoed unchanged by the server.
    MaxFragmentLength(MaxFragmentLength),
    SupportedGroups(Vec<NamedGroup>),
    EcPointFormats(Vec<u8>),
    /// SRP username (RFC 5054).
    Srp(Vec<u8>),
    SignatureAlgorithms(Vec<SignatureScheme>),
    Alpn(Vec<Vec<u8>>),
    /// Number of zero bytes.
    Padding(usize),
    ExtendedMasterSecret,
    SupportedVersions(SupportedVersions),
    KeyShare(KeyShare),
    RenegotiationInfo(Vec<u8>),
    Grease(u16),
    Unknown { extension_type: u16, data: Vec<u8> },
}

/// Apply `f` until `input` is used up.
fn list<'a, T, F>(mut input: &'a [u8], mut f: F) -> IResult<&'a [u8], Vec<T>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
{
    let mut out = Vec::new();
    while !input.is_empty() {
        let (rest, item) = f(input)?;
        input = rest;
        out.push(item);
    }
    Ok((input, out))
}

fn failure(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

fn whole(rest: &[u8]) -> Result<(), nom::Err<nom::error::Error<&[u8]>>> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(failure(rest))
    }
}

impl Extension {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::ServerName(_) => ExtensionType::ServerName,
            Extension::MaxFragmentLength(_) => ExtensionType::MaxFragmentLength,
            Extension::SupportedGroups(_) => ExtensionType::SupportedGroups,
            Extension::EcPointFormats(_) => ExtensionType::EcPointFormats,
            Extension::Srp(_) => ExtensionType::Srp,
            Extension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Extension::Alpn(_) => ExtensionType::ApplicationLayerProtocolNegotiation,
            Extension::Padding(_) => ExtensionType::Padding,
            Extension::ExtendedMasterSecret => ExtensionType::ExtendedMasterSecret,
            Extension::SupportedVersions(_) => ExtensionType::SupportedVersions,
            Extension::KeyShare(_) => ExtensionType::KeyShare,
            Extension::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            Extension::Grease(v) => ExtensionType::Grease(*v),
            Extension::Unknown { extension_type, .. } => ExtensionType::from_u16(*extension_type),
        }
    }

    /// Parse one extension sent by `sender`.
    pub fn parse(input: &[u8], sender: Role) -> IResult<&[u8], Extension> {
        let (input, raw_type) = be_u16(input)?;
        let (input, data) = len16(input)?;
        let ext = Self::parse_body(ExtensionType::from_u16(raw_type), raw_type, data, sender)?;
        Ok((input, ext))
    }

    fn parse_body(
        t: ExtensionType,
        raw_type: u16,
        data: &[u8],
        sender: Role,
    ) -> Result<Extension, nom::Err<nom::error::Error<&[u8]>>> {
        let ext = match t {
            ExtensionType::ServerName if data.is_empty() => Extension::ServerName(None),
            ExtensionType::ServerName => {
                let (rest, names) = len16(data)?;
                whole(rest)?;
                let (_, entries) = list(names, |i| {
                    let (i, name_type) = nom::number::complete::be_u8(i)?;
                    let (i, name) = len16(i)?;
                    Ok((i, (name_type, name)))
                })?;
                // host_name(0) is the only defined type
                let host = entries
                    .into_iter()
                    .find(|(t, _)| *t == 0)
                    .map(|(_, n)| String::from_utf8(n.to_vec()))
                    .transpose()
                    .map_err(|_| failure(data))?;
                Extension::ServerName(host)
            }
            ExtensionType::MaxFragmentLength => {
                let (rest, code) = nom::number::complete::be_u8(data)?;
                whole(rest)?;
                Extension::MaxFragmentLength(MaxFragmentLength::from_u8(code))
            }
            ExtensionType::SupportedGroups => {
                let (rest, groups) = len16(data)?;
                whole(rest)?;
                let (_, groups) = list(groups, NamedGroup::parse)?;
                Extension::SupportedGroups(groups)
            }
            ExtensionType::EcPointFormats => {
                let (rest, formats) = len8(data)?;
                whole(rest)?;
                Extension::EcPointFormats(formats.to_vec())
            }
            ExtensionType::Srp => {
                let (rest, identity) = len8(data)?;
                whole(rest)?;
                Extension::Srp(identity.to_vec())
            }
            ExtensionType::SignatureAlgorithms => {
                let (rest, schemes) = len16(data)?;
                whole(rest)?;
                let (_, schemes) = list(schemes, SignatureScheme::parse)?;
                Extension::SignatureAlgorithms(schemes)
            }
            ExtensionType::ApplicationLayerProtocolNegotiation => {
                let (rest, names) = len16(data)?;
                whole(rest)?;
                let (_, names) = list(names, |i| {
                    let (i, n) = len8(i)?;
                    Ok((i, n.to_vec()))
                })?;
                Extension::Alpn(names)
            }
            ExtensionType::Padding => {
                if data.iter().any(|b| *b != 0) {
                    return Err(failure(data));
                }
                Extension::Padding(data.len())
            }
            ExtensionType::ExtendedMasterSecret => {
                whole(data)?;
                Extension::ExtendedMasterSecret
            }
            ExtensionType::SupportedVersions => match sender {
                Role::Client => {
                    let (rest, versions) = len8(data)?;
                    whole(rest)?;
                    let (_, versions) = list(versions, ProtocolVersion::parse)?;
                    Extension::SupportedVersions(SupportedVersions::Client(versions))
                }
                Role::Server => {
                    let (rest, version) = ProtocolVersion::parse(data)?;
                    whole(rest)?;
                    Extension::SupportedVersions(SupportedVersions::Server(version))
                }
            },
            ExtensionType::KeyShare => match sender {
                Role::Client => {
                    let (rest, entries) = len16(data)?;
                    whole(rest)?;
                    let (_, entries) = list(entries, KeyShareEntry::parse)?;
                    Extension::KeyShare(KeyShare::Client(entries))
                }
                Role::Server if data.len() == 2 => {
                    let (rest, group) = NamedGroup::parse(data)?;
                    whole(rest)?;
                    Extension::KeyShare(KeyShare::HelloRetryRequest(group))
                }
                Role::Server => {
                    let (rest, entry) = KeyShareEntry::parse(data)?;
                    whole(rest)?;
                    Extension::KeyShare(KeyShare::Server(entry))
                }
            },
            ExtensionType::RenegotiationInfo => {
                let (rest, info) = len8(data)?;
                whole(rest)?;
                Extension::RenegotiationInfo(info.to_vec())
            }
            ExtensionType::Grease(v) => Extension::Grease(v),
            ExtensionType::Unknown(_) => Extension::Unknown {
                extension_type: raw_type,
                data: data.to_vec(),
            },
        };
        Ok(ext)
    }

    /// A len16 prefixed extension block.
    pub fn parse_list(input: &[u8], sender: Role) -> IResult<&[u8], Vec<Extension>> {
        let (input, block) = len16(input)?;
        let (_, exts) = list(block, |i| Extension::parse(i, sender))?;
        Ok((input, exts))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.put_u16(self.extension_type().as_u16());
        output.with_len16(|out| self.serialize_body(out));
    }

    fn serialize_body(&self, out: &mut Vec<u8>) {
        match self {
            Extension::ServerName(None) => {}
            Extension::ServerName(Some(host)) => out.with_len16(|out| {
                out.put_u8(0);
                out.put_bytes16(host.as_bytes());
            }),
            Extension::MaxFragmentLength(m) => out.put_u8(m.as_u8()),
            Extension::SupportedGroups(groups) => out.with_len16(|out| {
                for g in groups {
                    g.serialize(out);
                }
            }),
            Extension::EcPointFormats(formats) => out.put_bytes8(formats),
            Extension::Srp(identity) => out.put_bytes8(identity),
            Extension::SignatureAlgorithms(schemes) => out.with_len16(|out| {
                for s in schemes {
                    s.serialize(out);
                }
            }),
            Extension::Alpn(names) => out.with_len16(|out| {
                for n in names {
                    out.put_bytes8(n);
                }
            }),
            Extension::Padding(n) => out.extend(std::iter::repeat(0).take(*n)),
            Extension::ExtendedMasterSecret | Extension::Grease(_) => {}
            Extension::SupportedVersions(SupportedVersions::Client(versions)) => {
                out.with_len8(|out| {
                    for v in versions {
                        v.serialize(out);
                    }
                })
            }
            Extension::SupportedVersions(SupportedVersions::Server(v)) => v.serialize(out),
            Extension::KeyShare(KeyShare::Client(entries)) => out.with_len16(|out| {
                for e in entries {
                    e.serialize(out);
                }
            }),
            Extension::KeyShare(KeyShare::Server(entry)) => entry.serialize(out),
            Extension::KeyShare(KeyShare::HelloRetryRequest(group)) => group.serialize(out),
            Extension::RenegotiationInfo(info) => out.put_bytes8(info),
            Extension::Unknown { data, .. } => out.extend_from_slice(data),
        }
    }

    /// Encoded size including the type and length header.
    pub fn encoded_len(&self) -> usize {
        let mut out = Vec::new();
        self.serialize(&mut out);
        out.len()
    }

    pub fn serialize_list(extensions: &[Extension], output: &mut Vec<u8>) {
        output.with_len16(|out| {
            for e in extensions {
                e.serialize(out);
            }
        });
    }
}

/// An extension as configured: concrete, or materialized per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfiguredExtension {
    Concrete(Extension),
    Model(ModelExtension),
}

impl ConfiguredExtension {
    /// The concrete type this resolves to.
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            ConfiguredExtension::Concrete(e) => e.extension_type(),
            ConfiguredExtension::Model(m) => m.extension_type(),
        }
    }

    pub fn dependency(&self) -> Dependency {
        match self {
            ConfiguredExtension::Concrete(_) => Dependency::None,
            ConfiguredExtension::Model(m) => m.dependency(),
        }
    }
}
