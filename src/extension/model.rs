use crate::context::TlsContext;
use crate::extension::{Extension, ExtensionType, KeyShare, KeyShareEntry, SupportedVersions};
use crate::types::version::grease_u16;
use crate::types::{AlertDescription, NamedGroup, TlsVersion};
use crate::Error;

/// Most key shares offered in one ClientHello.
const MAX_KEY_SHARES: usize = 2;

/// What a model extension must see materialized before it can be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    None,
    Some(Vec<ExtensionType>),
    All,
}

impl Dependency {
    /// Whether an extension of type `t` satisfies `wanted`. Any GREASE value
    /// satisfies a GREASE dependency.
    pub fn matches(wanted: ExtensionType, t: ExtensionType) -> bool {
        match (wanted, t) {
            (ExtensionType::Grease(_), ExtensionType::Grease(_)) => true,
            _ => wanted == t,
        }
    }
}

/// Extension built per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelExtension {
    /// server_name from the configured host name.
    ServerName,
    /// Every configured version, behind a GREASE value when GREASE is on.
    ClientSupportedVersions,
    /// One fresh key pair per preferred group.
    KeyShare,
    /// Pads the ClientHello to the configured target.
    Padding,
}

impl ModelExtension {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            ModelExtension::ServerName => ExtensionType::ServerName,
            ModelExtension::ClientSupportedVersions => ExtensionType::SupportedVersions,
            ModelExtension::KeyShare => ExtensionType::KeyShare,
            ModelExtension::Padding => ExtensionType::Padding,
        }
    }

    pub fn dependency(&self) -> Dependency {
        match self {
            ModelExtension::ServerName => Dependency::None,
            ModelExtension::ClientSupportedVersions => {
                Dependency::Some(vec![ExtensionType::Grease(0)])
            }
            ModelExtension::KeyShare => Dependency::Some(vec![ExtensionType::SupportedGroups]),
            ModelExtension::Padding => Dependency::All,
        }
    }

    /// Build the concrete extension, `None` when there is nothing to send.
    ///
    /// `hello_len` is the ClientHello length with everything materialized so far.
    pub fn materialize(
        &self,
        context: &mut TlsContext,
        hello_len: usize,
    ) -> Result<Option<Extension>, Error> {
        Ok(match self {
            ModelExtension::ServerName => context
                .config()
                .server_name()
                .map(|host| Extension::ServerName(Some(host.to_string()))),

            ModelExtension::ClientSupportedVersions => {
                let mut versions = Vec::new();
                if context.grease() {
                    versions.push(crate::types::ProtocolVersion(grease_u16()));
                }
                versions.extend(context.config().versions().iter().map(TlsVersion::id));
                Some(Extension::SupportedVersions(SupportedVersions::Client(
                    versions,
                )))
            }

            ModelExtension::KeyShare => {
                let provider = context.config().crypto_provider().clone();
                let groups: Vec<_> = context
                    .groups()
                    .iter()
                    .copied()
                    .take(MAX_KEY_SHARES)
                    .collect();

                let mut entries = Vec::with_capacity(groups.len());
                for group in groups {
                    if provider.find_kx_group(group).is_none() {
                        continue;
                    }
                    entries.push(start_key_share(context, group)?);
                }
                trace!("Key shares for {:?}", context.key_share_groups());
                Some(Extension::KeyShare(KeyShare::Client(entries)))
            }

            ModelExtension::Padding => {
                let Some(target) = context.config().padding_target() else {
                    return Ok(None);
                };
                // 4 bytes of extension header
                if hello_len + 4 > target {
                    None
                } else {
                    Some(Extension::Padding(target - hello_len - 4))
                }
            }
        })
    }
}

fn start_key_share(context: &mut TlsContext, group: NamedGroup) -> Result<KeyShareEntry, Error> {
    let kx = context
        .config()
        .crypto_provider()
        .find_kx_group(group)
        .ok_or_else(|| Error::fatal(AlertDescription::IllegalParameter))?
        .start_exchange()
        .map_err(Error::crypto)?;
    let entry = KeyShareEntry {
        group,
        key_exchange: kx.pub_key().to_vec(),
    };
    context.push_key_share(kx);
    Ok(entry)
}

/// The single share of a retried ClientHello, replacing those offered before.
pub fn retry_key_share(
    context: &mut TlsContext,
    group: NamedGroup,
) -> Result<KeyShareEntry, Error> {
    context.clear_key_shares();
    let entry = start_key_share(context, group)?;
    trace!("Key share retried for {:?}", group);
    Ok(entry)
}
