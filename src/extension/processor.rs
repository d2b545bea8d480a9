//! Extension negotiation.
//!
//! Extensions are materialized in rounds. Concrete extensions and models
//! without dependencies go in round 0. A model depending on some types goes
//! one round after the latest of them. A model depending on everything goes
//! in the last round, in front of what was placed there before it.

use crate::context::TlsContext;
use crate::extension::{ConfiguredExtension, Dependency, Extension, ExtensionType};
use crate::extension::MaxFragmentLength;
use crate::types::{AlertDescription, TlsVersion};
use crate::Error;

/// Anything that can be scheduled into rounds.
pub trait Schedulable {
    fn extension_type(&self) -> ExtensionType;
    fn dependency(&self) -> Dependency;
}

impl Schedulable for ConfiguredExtension {
    fn extension_type(&self) -> ExtensionType {
        ConfiguredExtension::extension_type(self)
    }

    fn dependency(&self) -> Dependency {
        ConfiguredExtension::dependency(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    Visiting,
    At(usize),
    Last,
}

fn round_of<T: Schedulable>(
    items: &[T],
    i: usize,
    rounds: &mut Vec<Option<Round>>,
) -> Result<Round, Error> {
    match rounds[i] {
        Some(Round::Visiting) => {
            return Err(Error::ConfigError(format!(
                "Cyclic extension dependency at {:?}",
                items[i].extension_type()
            )))
        }
        Some(r) => return Ok(r),
        None => {}
    }
    rounds[i] = Some(Round::Visiting);

    let round = match items[i].dependency() {
        Dependency::None => Round::At(0),
        Dependency::All => Round::Last,
        Dependency::Some(wanted) => {
            let mut max = None;
            let mut last = false;
            for w in wanted {
                for (j, item) in items.iter().enumerate() {
                    if j == i || !Dependency::matches(w, item.extension_type()) {
                        continue;
                    }
                    match round_of(items, j, rounds)? {
                        Round::Last => last = true,
                        Round::At(r) => max = Some(max.map_or(r, |m: usize| m.max(r))),
                        Round::Visiting => {}
                    }
                }
            }
            if last {
                Round::Last
            } else {
                Round::At(max.map_or(0, |m| m + 1))
            }
        }
    };

    rounds[i] = Some(round);
    Ok(round)
}

/// Order `items` into rounds of indexes.
///
/// Two items resolving to the same type conflict.
pub fn schedule<T: Schedulable>(items: &[T]) -> Result<Vec<Vec<usize>>, Error> {
    for (i, a) in items.iter().enumerate() {
        if items[..i]
            .iter()
            .any(|b| b.extension_type() == a.extension_type())
        {
            return Err(Error::ConfigError(format!(
                "Conflicting extension {:?}",
                a.extension_type()
            )));
        }
    }

    let mut rounds = vec![None; items.len()];
    let mut placed = Vec::with_capacity(items.len());
    for i in 0..items.len() {
        placed.push(round_of(items, i, &mut rounds)?);
    }

    let count = placed
        .iter()
        .filter_map(|r| match r {
            Round::At(n) => Some(*n + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    let mut out: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut last: Vec<usize> = Vec::new();
    for (i, r) in placed.iter().enumerate() {
        match r {
            Round::At(n) => out[*n].push(i),
            Round::Last if items[i].dependency() == Dependency::All => last.insert(0, i),
            _ => last.push(i),
        }
    }
    if !last.is_empty() {
        out.push(last);
    }
    Ok(out)
}

/// Side effect of a local extension on the negotiation.
fn apply_local(context: &mut TlsContext, ext: &Extension) {
    match ext {
        Extension::Grease(_) => context.set_grease(true),
        Extension::SupportedGroups(groups) => context.narrow_groups(groups),
        Extension::MaxFragmentLength(m) => context.set_max_fragment_length(*m),
        _ => {}
    }
}

/// Materialize the ClientHello extensions.
///
/// `hello_len` is the ClientHello length without its extension block.
pub fn client_extensions(
    context: &mut TlsContext,
    configured: &[ConfiguredExtension],
    hello_len: usize,
) -> Result<Vec<Extension>, Error> {
    let versions = context.config().versions().to_vec();
    let applicable: Vec<ConfiguredExtension> = configured
        .iter()
        .filter(|e| versions.iter().any(|v| e.extension_type().applies_to(*v)))
        .cloned()
        .collect();

    let rounds = schedule(&applicable)?;

    let mut out: Vec<Extension> = Vec::with_capacity(applicable.len());
    for (n, round) in rounds.iter().enumerate() {
        trace!(
            "Extension round {}: {:?}",
            n,
            round
                .iter()
                .map(|i| applicable[*i].extension_type())
                .collect::<Vec<_>>()
        );
        for i in round {
            let ext = match &applicable[*i] {
                ConfiguredExtension::Concrete(e) => Some(e.clone()),
                ConfiguredExtension::Model(m) => {
                    // len16 block header plus what is there already
                    let len = hello_len + 2 + out.iter().map(Extension::encoded_len).sum::<usize>();
                    m.materialize(context, len)?
                }
            };
            if let Some(ext) = ext {
                apply_local(context, &ext);
                out.push(ext);
            }
        }
    }

    context.set_offered_extensions(out.iter().map(Extension::extension_type).collect());
    Ok(out)
}

fn check_fragment_length(m: MaxFragmentLength) -> Result<(), Error> {
    if m.plaintext_len().is_none() {
        debug!("Undefined max_fragment_length {}", m.as_u8());
        return Err(Error::fatal(AlertDescription::IllegalParameter));
    }
    Ok(())
}

fn check_duplicates(extensions: &[Extension]) -> Result<(), Error> {
    for (i, a) in extensions.iter().enumerate() {
        if extensions[..i]
            .iter()
            .any(|b| b.extension_type() == a.extension_type())
        {
            debug!("Duplicate extension {:?}", a.extension_type());
            return Err(Error::fatal(AlertDescription::IllegalParameter));
        }
    }
    Ok(())
}

/// Server: take in the ClientHello extensions.
pub fn observe_client(context: &mut TlsContext, offered: &[Extension]) -> Result<(), Error> {
    check_duplicates(offered)?;

    for ext in offered {
        match ext {
            Extension::SupportedGroups(groups) => context.narrow_groups(groups),
            Extension::SignatureAlgorithms(schemes) => {
                context.set_peer_signature_schemes(schemes.clone())
            }
            Extension::ServerName(Some(host)) => context.set_server_name(host.clone()),
            Extension::Srp(identity) => context.set_srp_identity(identity.clone()),
            Extension::MaxFragmentLength(m) => {
                check_fragment_length(*m)?;
                context.set_max_fragment_length(*m);
            }
            Extension::Alpn(protocols) => {
                let ours = context.config().alpn_protocols();
                if ours.is_empty() {
                    continue;
                }
                let Some(chosen) = protocols.iter().find(|p| ours.contains(p)) else {
                    return Err(Error::fatal(AlertDescription::NoApplicationProtocol));
                };
                let chosen = chosen.clone();
                context.set_alpn(chosen);
            }
            Extension::Grease(_) => context.set_grease(true),
            _ => {}
        }
    }

    context.set_offered_extensions(offered.iter().map(Extension::extension_type).collect());
    Ok(())
}

/// Server: the extensions answering the client, for the negotiated version.
///
/// Returns (ServerHello extensions, EncryptedExtensions). The supported_versions
/// and key_share of a TLS 1.3 ServerHello are added by the caller.
pub fn server_extensions(
    context: &mut TlsContext,
    version: TlsVersion,
) -> Result<(Vec<Extension>, Vec<Extension>), Error> {
    let offered = context.offered_extensions().to_vec();
    let is_offered = |t: ExtensionType| offered.contains(&t);

    let mut answers = Vec::new();
    if is_offered(ExtensionType::ServerName) && context.server_name().is_some() {
        answers.push(Extension::ServerName(None));
    }
    if let Some(alpn) = context.alpn() {
        answers.push(Extension::Alpn(vec![alpn.to_vec()]));
    }
    if let Some(m) = context.max_fragment_length() {
        answers.push(Extension::MaxFragmentLength(m));
    }

    if version.is_tls13() {
        for a in &answers {
            context.add_extension(a.extension_type());
        }
        return Ok((Vec::new(), answers));
    }

    let suite = context.cipher_suite_params()?;
    if is_offered(ExtensionType::EcPointFormats)
        && suite.key_exchange.is_ec()
    {
        // uncompressed only
        answers.push(Extension::EcPointFormats(vec![0]));
    }
    if is_offered(ExtensionType::ExtendedMasterSecret)
        && context.config().with_extended_master_secret()
    {
        context.set_extended_master_secret(true);
        answers.push(Extension::ExtendedMasterSecret);
    }
    if is_offered(ExtensionType::RenegotiationInfo) {
        answers.push(Extension::RenegotiationInfo(Vec::new()));
    }

    for a in &answers {
        context.add_extension(a.extension_type());
    }
    Ok((answers, Vec::new()))
}

/// Client: take in the ServerHello or EncryptedExtensions extensions.
///
/// The server may only answer what was offered.
pub fn observe_server(context: &mut TlsContext, received: &[Extension]) -> Result<(), Error> {
    check_duplicates(received)?;

    for ext in received {
        let t = ext.extension_type();
        if !context.offered_extensions().contains(&t) {
            debug!("Server sent unsolicited extension {:?}", t);
            return Err(Error::fatal(AlertDescription::UnsupportedExtension));
        }
        match ext {
            Extension::ExtendedMasterSecret => context.set_extended_master_secret(true),
            Extension::MaxFragmentLength(m) => {
                check_fragment_length(*m)?;
                if context.max_fragment_length() != Some(*m) {
                    debug!("Server changed max_fragment_length to {}", m.as_u8());
                    return Err(Error::fatal(AlertDescription::IllegalParameter));
                }
            }
            Extension::Alpn(protocols) => {
                let [chosen] = protocols.as_slice() else {
                    return Err(Error::fatal(AlertDescription::IllegalParameter));
                };
                if !context.config().alpn_protocols().contains(chosen) {
                    return Err(Error::fatal(AlertDescription::IllegalParameter));
                }
                context.set_alpn(chosen.clone());
            }
            Extension::RenegotiationInfo(info) if !info.is_empty() => {
                return Err(Error::fatal(AlertDescription::HandshakeFailure));
            }
            _ => {}
        }
        context.add_extension(t);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::context::Role;
    use crate::extension::ModelExtension;
    use crate::types::NamedGroup;

    struct Synthetic(ExtensionType, Dependency);

    impl Schedulable for Synthetic {
        fn extension_type(&self) -> ExtensionType {
            self.0
        }

        fn dependency(&self) -> Dependency {
            self.1.clone()
        }
    }

    fn a() -> Synthetic {
        Synthetic(ExtensionType::Unknown(0xA), Dependency::None)
    }

    fn b() -> Synthetic {
        Synthetic(
            ExtensionType::Unknown(0xB),
            Dependency::Some(vec![ExtensionType::Unknown(0xA)]),
        )
    }

    fn c() -> Synthetic {
        Synthetic(ExtensionType::Unknown(0xC), Dependency::All)
    }

    fn flatten(items: &[Synthetic]) -> Vec<u16> {
        schedule(items)
            .unwrap()
            .into_iter()
            .flatten()
            .map(|i| items[i].0.as_u16())
            .collect()
    }

    #[test]
    fn three_level_chain_any_input_order() {
        let orders = [
            vec![a(), b(), c()],
            vec![c(), b(), a()],
            vec![b(), c(), a()],
            vec![c(), a(), b()],
        ];
        for items in orders {
            assert_eq!(flatten(&items), vec![0xA, 0xB, 0xC]);
        }
    }

    #[test]
    fn rounds_are_layered() {
        let items = vec![c(), b(), a()];
        let rounds = schedule(&items).unwrap();
        assert_eq!(rounds, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn depending_on_all_goes_last_and_first_in_it() {
        let d = Synthetic(
            ExtensionType::Unknown(0xD),
            Dependency::Some(vec![ExtensionType::Unknown(0xC)]),
        );
        let items = vec![d, a(), c()];
        assert_eq!(flatten(&items), vec![0xA, 0xC, 0xD]);
    }

    #[test]
    fn conflicts_are_config_errors() {
        let items = vec![a(), a()];
        assert!(matches!(schedule(&items), Err(Error::ConfigError(_))));
    }

    #[test]
    fn cycles_are_config_errors() {
        let x = Synthetic(
            ExtensionType::Unknown(1),
            Dependency::Some(vec![ExtensionType::Unknown(2)]),
        );
        let y = Synthetic(
            ExtensionType::Unknown(2),
            Dependency::Some(vec![ExtensionType::Unknown(1)]),
        );
        assert!(matches!(schedule(&[x, y]), Err(Error::ConfigError(_))));
    }

    #[test]
    fn client_hello_extensions_follow_dependencies() {
        let config = Config::builder()
            .with_grease(true)
            .padding_target(512)
            .groups(&[NamedGroup::Secp256r1, NamedGroup::X25519])
            .extensions(vec![
                ConfiguredExtension::Model(ModelExtension::Padding),
                ConfiguredExtension::Model(ModelExtension::ClientSupportedVersions),
                ConfiguredExtension::Model(ModelExtension::KeyShare),
                ConfiguredExtension::Concrete(Extension::SupportedGroups(vec![
                    NamedGroup::X25519,
                ])),
                ConfiguredExtension::Concrete(Extension::Grease(0x1A1A)),
            ])
            .build()
            .unwrap();
        let mut ctx = TlsContext::new(Arc::new(config), Role::Client).unwrap();

        let configured = ctx.config().extensions();
        let exts = client_extensions(&mut ctx, &configured, 100).unwrap();
        let types: Vec<_> = exts.iter().map(Extension::extension_type).collect();
        assert_eq!(
            types,
            vec![
                ExtensionType::SupportedGroups,
                ExtensionType::Grease(0x1A1A),
                ExtensionType::SupportedVersions,
                ExtensionType::KeyShare,
                ExtensionType::Padding,
            ]
        );

        // supported_groups narrowed the key shares to x25519
        assert_eq!(ctx.key_share_groups(), vec![NamedGroup::X25519]);
        // grease was seen before supported_versions
        let Extension::SupportedVersions(crate::extension::SupportedVersions::Client(v)) = &exts[2]
        else {
            panic!("expected supported_versions");
        };
        assert!(v[0].is_grease());

        let total = 100 + 2 + exts.iter().map(Extension::encoded_len).sum::<usize>();
        assert_eq!(total, 512);
    }

    #[test]
    fn unsolicited_server_extension() {
        let mut ctx = TlsContext::new(Arc::new(Config::default()), Role::Client).unwrap();
        ctx.set_offered_extensions(vec![ExtensionType::ExtendedMasterSecret]);

        observe_server(&mut ctx, &[Extension::ExtendedMasterSecret]).unwrap();
        assert!(ctx.extended_master_secret());

        let err = observe_server(&mut ctx, &[Extension::Alpn(vec![b"h2".to_vec()])]).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::UnsupportedExtension));
    }

    #[test]
    fn max_fragment_length_is_echoed() {
        let config = Config::builder()
            .versions(&[TlsVersion::Tls12])
            .cipher_suites(&[crate::types::CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256])
            .build()
            .unwrap();
        let mut server = TlsContext::new(Arc::new(config), Role::Server).unwrap();
        observe_client(
            &mut server,
            &[Extension::MaxFragmentLength(MaxFragmentLength::Len1024)],
        )
        .unwrap();
        server.set_cipher_suite(crate::types::CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256);
        let (answers, _) = server_extensions(&mut server, TlsVersion::Tls12).unwrap();
        assert!(answers.contains(&Extension::MaxFragmentLength(MaxFragmentLength::Len1024)));
        assert_eq!(server.negotiated_fragment_limit(), Some(1024));

        let err = observe_client(
            &mut server,
            &[Extension::MaxFragmentLength(MaxFragmentLength::Unknown(0))],
        )
        .unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));
    }

    #[test]
    fn max_fragment_length_must_match_offer() {
        let mut ctx = TlsContext::new(Arc::new(Config::default()), Role::Client).unwrap();
        ctx.set_offered_extensions(vec![ExtensionType::MaxFragmentLength]);
        ctx.set_max_fragment_length(MaxFragmentLength::Len512);
        assert_eq!(ctx.negotiated_fragment_limit(), None);

        let err = observe_server(
            &mut ctx,
            &[Extension::MaxFragmentLength(MaxFragmentLength::Len2048)],
        )
        .unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::IllegalParameter));

        observe_server(&mut ctx, &[Extension::MaxFragmentLength(MaxFragmentLength::Len512)])
            .unwrap();
        assert_eq!(ctx.negotiated_fragment_limit(), Some(512));
    }

    #[test]
    fn server_picks_alpn() {
        let config = Config::builder()
            .alpn_protocols(&[b"http/1.1", b"h2"])
            .build()
            .unwrap();
        let mut ctx = TlsContext::new(Arc::new(config), Role::Server).unwrap();
        observe_client(
            &mut ctx,
            &[Extension::Alpn(vec![b"h2".to_vec(), b"http/1.1".to_vec()])],
        )
        .unwrap();
        assert_eq!(ctx.alpn(), Some(&b"h2"[..]));

        let err = observe_client(&mut ctx, &[Extension::Alpn(vec![b"spdy".to_vec()])]).unwrap_err();
        assert_eq!(err.description(), Some(AlertDescription::NoApplicationProtocol));
    }
}
