//! Every registered cipher suite at every version it is legal for: the hello
//! messages and the key exchange messages decode to what was encoded.

use timpl::extension::{Extension, SupportedVersions};
use timpl::key_exchange::*;
use timpl::message::{carries_scheme, ClientHello, ClientKeyExchange, DigitallySigned};
use timpl::message::{ParseContext, ServerHello, ServerKeyExchange};
use timpl::types::{CipherSuite, CompressionMethod, KeyExchangeKind, NamedGroup};
use timpl::types::{SignatureScheme, TlsVersion};
use timpl::Role;

fn legal_pairs() -> Vec<(CipherSuite, TlsVersion)> {
    let mut out = Vec::new();
    for suite in CipherSuite::all() {
        for version in TlsVersion::all() {
            if suite.supports(*version) {
                out.push((*suite, *version));
            }
        }
    }
    out
}

fn named_curve() -> EcParams {
    EcParams::NamedCurve(NamedGroup::Secp256r1)
}

fn server_values(kind: KeyExchangeKind) -> Option<KeyExchange> {
    let hint = || PskKeyExchange::Server {
        hint: b"hint".to_vec(),
    };
    let dh = || DhKeyExchange::Server {
        p: vec![0xF7; 64],
        g: vec![2],
        y: vec![0x31; 64],
    };
    let ecdh = || EcdhKeyExchange::Server {
        params: named_curve(),
        public_key: vec![4; 65],
    };
    Some(match kind {
        KeyExchangeKind::Dh => KeyExchange::Dh(dh()),
        KeyExchangeKind::Ecdh => KeyExchange::Ecdh(ecdh()),
        KeyExchangeKind::Rsa => KeyExchange::Rsa(RsaKeyExchange::Server {
            modulus: vec![0xC1; 64],
            exponent: vec![1, 0, 1],
        }),
        KeyExchangeKind::Psk => KeyExchange::Psk(hint()),
        KeyExchangeKind::DhePsk => KeyExchange::DhePsk(hint(), dh()),
        KeyExchangeKind::EcdhePsk => KeyExchange::EcdhePsk(hint(), ecdh()),
        KeyExchangeKind::Srp => KeyExchange::Srp(SrpKeyExchange::Server {
            n: vec![0xEE; 128],
            g: vec![2],
            s: vec![7; 16],
            b: vec![0x42; 128],
        }),
        KeyExchangeKind::EccPwd => KeyExchange::EccPwd(EccPwdKeyExchange::Server {
            salt: vec![9; 32],
            params: named_curve(),
            public_key: vec![4; 65],
            password: vec![0x55; 32],
        }),
        // no ServerKeyExchange
        KeyExchangeKind::None
        | KeyExchangeKind::Gostr
        | KeyExchangeKind::Krb5
        | KeyExchangeKind::Contextual => return None,
    })
}

fn client_values(kind: KeyExchangeKind) -> Option<KeyExchange> {
    let identity = || PskKeyExchange::Client {
        identity: b"client1".to_vec(),
    };
    let dh = || DhKeyExchange::Client { y: vec![0x13; 64] };
    let ecdh = || EcdhKeyExchange::Client {
        public_key: vec![4; 65],
    };
    Some(match kind {
        KeyExchangeKind::Dh => KeyExchange::Dh(dh()),
        KeyExchangeKind::Ecdh => KeyExchange::Ecdh(ecdh()),
        KeyExchangeKind::Rsa => KeyExchange::Rsa(RsaKeyExchange::Client {
            encrypted_premaster: vec![0x99; 128],
        }),
        KeyExchangeKind::Psk => KeyExchange::Psk(identity()),
        KeyExchangeKind::DhePsk => KeyExchange::DhePsk(identity(), dh()),
        KeyExchangeKind::EcdhePsk => KeyExchange::EcdhePsk(identity(), ecdh()),
        KeyExchangeKind::Srp => KeyExchange::Srp(SrpKeyExchange::Client { a: vec![0x24; 128] }),
        KeyExchangeKind::EccPwd => KeyExchange::EccPwd(EccPwdKeyExchange::Client {
            public_key: vec![4; 65],
            password: vec![0x66; 32],
        }),
        KeyExchangeKind::Gostr => KeyExchange::Gostr(GostrKeyExchange {
            public_key: vec![0x30; 70],
            additional_data: vec![1, 2],
        }),
        KeyExchangeKind::Krb5 => KeyExchange::Krb5(Krb5KeyExchange {
            ticket: vec![0x61; 40],
            authenticator: vec![0x62; 20],
            encrypted_premaster: vec![0x63; 48],
        }),
        KeyExchangeKind::None | KeyExchangeKind::Contextual => return None,
    })
}

#[test]
fn hellos_for_every_suite() {
    for (suite, version) in legal_pairs() {
        let extensions = if version == TlsVersion::Ssl30 {
            vec![]
        } else {
            vec![
                Extension::SupportedGroups(vec![NamedGroup::X25519, NamedGroup::Secp256r1]),
                Extension::SignatureAlgorithms(vec![SignatureScheme::RSA_PKCS1_SHA256]),
            ]
        };

        let ch = ClientHello {
            client_version: version.id(),
            random: [0x11; 32],
            session_id: vec![0x22; 32],
            cipher_suites: vec![suite, CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV],
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        };
        let mut out = Vec::new();
        ch.serialize(&mut out);
        let (rest, parsed) = ClientHello::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, ch, "{:?} at {:?}", suite, version);

        let extensions = if version.is_tls13() {
            vec![Extension::SupportedVersions(SupportedVersions::Server(
                version.id(),
            ))]
        } else {
            vec![]
        };
        let sh = ServerHello {
            server_version: version.id(),
            random: [0x33; 32],
            session_id: vec![0x22; 32],
            cipher_suite: suite,
            compression_method: CompressionMethod::Null,
            extensions,
        };
        let mut out = Vec::new();
        sh.serialize(&mut out);
        let (rest, parsed) = ServerHello::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, sh, "{:?} at {:?}", suite, version);
    }
}

#[test]
fn server_key_exchange_for_every_suite() {
    let mut seen = Vec::new();
    for (suite, version) in legal_pairs() {
        let params = suite.params().unwrap();
        let Some(values) = server_values(params.key_exchange) else {
            continue;
        };
        let factory = KeyExchangeFactory::for_suite(&params);
        let signed = ParseContext::new(version, Role::Server)
            .with_suite(Some(params))
            .signed_server_params();

        let mut ske = ServerKeyExchange::new(values, version);
        if signed {
            let scheme = carries_scheme(version).then_some(SignatureScheme::RSA_PKCS1_SHA256);
            ske.signature = Some(DigitallySigned::new(scheme, vec![0xAB; 64]));
        }
        let mut out = Vec::new();
        ske.serialize(&mut out);

        let (rest, parsed) = ServerKeyExchange::parse(&out, factory, version, signed).unwrap();
        assert!(rest.is_empty(), "{:?} at {:?}", suite, version);
        assert_eq!(parsed, ske, "{:?} at {:?}", suite, version);
        seen.push((params.key_exchange, signed));
    }

    for kind in [
        KeyExchangeKind::Dh,
        KeyExchangeKind::Srp,
        KeyExchangeKind::Psk,
        KeyExchangeKind::DhePsk,
        KeyExchangeKind::EcdhePsk,
    ] {
        assert!(seen.iter().any(|(k, _)| *k == kind), "{:?}", kind);
    }
    assert!(seen.contains(&(KeyExchangeKind::Dh, true)));
    assert!(seen.contains(&(KeyExchangeKind::Ecdh, true)));
    assert!(seen.contains(&(KeyExchangeKind::Psk, false)));
    assert!(seen.contains(&(KeyExchangeKind::Srp, true)));
    assert!(seen.contains(&(KeyExchangeKind::Srp, false)));
}

#[test]
fn client_key_exchange_for_every_suite() {
    let mut seen = Vec::new();
    for (suite, version) in legal_pairs() {
        let params = suite.params().unwrap();
        let Some(values) = client_values(params.key_exchange) else {
            continue;
        };
        let factory = KeyExchangeFactory::for_suite(&params);

        let cke = ClientKeyExchange::new(values);
        let mut out = Vec::new();
        cke.serialize(&mut out, version);

        let (rest, parsed) = ClientKeyExchange::parse(&out, factory, version).unwrap();
        assert!(rest.is_empty(), "{:?} at {:?}", suite, version);
        assert_eq!(parsed, cke, "{:?} at {:?}", suite, version);
        seen.push(params.key_exchange);
    }

    for kind in [
        KeyExchangeKind::Rsa,
        KeyExchangeKind::Dh,
        KeyExchangeKind::Ecdh,
        KeyExchangeKind::Psk,
        KeyExchangeKind::Srp,
        KeyExchangeKind::EccPwd,
        KeyExchangeKind::Gostr,
    ] {
        assert!(seen.contains(&kind), "{:?}", kind);
    }
}

#[test]
fn ssl3_rsa_premaster_has_no_length() {
    let params = CipherSuite::RSA_AES128_CBC_SHA.params().unwrap();
    let factory = KeyExchangeFactory::for_suite(&params);
    let cke = ClientKeyExchange::new(KeyExchange::Rsa(RsaKeyExchange::Client {
        encrypted_premaster: vec![0x99; 128],
    }));

    let mut ssl3 = Vec::new();
    cke.serialize(&mut ssl3, TlsVersion::Ssl30);
    assert_eq!(ssl3, vec![0x99; 128]);

    let mut tls = Vec::new();
    cke.serialize(&mut tls, TlsVersion::Tls10);
    assert_eq!(&tls[..2], &[0x00, 0x80]);
    assert_eq!(&tls[2..], &ssl3[..]);

    let (_, parsed) = ClientKeyExchange::parse(&ssl3, factory, TlsVersion::Ssl30).unwrap();
    assert_eq!(parsed, cke);
}
