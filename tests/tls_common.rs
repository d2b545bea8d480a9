//! Shared helpers for TLS integration tests.
//!
//! This file has no `#[test]` functions; Cargo compiles it as a no-op binary.
//! Import it from other test files via `mod tls_common;`.

#![allow(unused)]

use std::sync::{Arc, OnceLock};

use timpl::certificate::{
    generate_self_signed_certificate, generate_self_signed_rsa_certificate, SelfSigned,
};
use timpl::types::{CipherSuite, TlsVersion};
use timpl::{Config, ConfigBuilder, Error, Output, Tls};

/// Handshake record content type.
pub const HANDSHAKE: u8 = 22;
pub const ALERT: u8 = 21;
pub const APPLICATION_DATA: u8 = 23;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// ECDSA P-256 certificate, fresh per call.
pub fn ecdsa_cert() -> SelfSigned {
    generate_self_signed_certificate().expect("gen ecdsa cert")
}

/// RSA certificate. Key generation is slow, so one key is shared.
pub fn rsa_cert() -> SelfSigned {
    static CERT: OnceLock<SelfSigned> = OnceLock::new();
    CERT.get_or_init(|| {
        use rsa::pkcs8::EncodePrivateKey;
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("rsa key");
        let der = key.to_pkcs8_der().expect("pkcs8");
        generate_self_signed_rsa_certificate("localhost", der.as_bytes()).expect("gen rsa cert")
    })
    .clone()
}

/// Builder limited to one version and one suite.
pub fn builder(version: TlsVersion, suite: CipherSuite) -> ConfigBuilder {
    Config::builder().versions(&[version]).cipher_suites(&[suite])
}

pub fn with_cert(builder: ConfigBuilder, cert: &SelfSigned) -> ConfigBuilder {
    builder.certificate(vec![cert.certificate.clone()], cert.private_key.clone())
}

/// Everything one endpoint produced in one poll round.
#[derive(Debug, Default)]
pub struct Drained {
    pub packets: Vec<Vec<u8>>,
    pub connected: bool,
    pub peer_certs: Vec<Vec<u8>>,
    pub app_data: Vec<Vec<u8>>,
    pub closed: bool,
}

/// Poll until `Idle`.
pub fn drain(endpoint: &mut Tls) -> Drained {
    let mut out = Drained::default();
    loop {
        match endpoint.poll_output() {
            Output::Packet(p) => out.packets.push(p),
            Output::Connected => out.connected = true,
            Output::PeerCert(c) => out.peer_certs.push(c),
            Output::ApplicationData(d) => out.app_data.push(d),
            Output::Closed => out.closed = true,
            Output::Idle => break,
        }
    }
    out
}

/// Deliver packets, stopping at the first error.
pub fn deliver(to: &mut Tls, packets: &[Vec<u8>]) -> Result<(), Error> {
    for p in packets {
        to.handle_packet(p)?;
    }
    Ok(())
}

/// Outcome of pumping two endpoints against each other.
#[derive(Debug, Default)]
pub struct Pumped {
    pub client: Drained,
    pub server: Drained,
}

impl Drained {
    fn merge(&mut self, other: Drained) {
        self.packets.extend(other.packets);
        self.connected |= other.connected;
        self.peer_certs.extend(other.peer_certs);
        self.app_data.extend(other.app_data);
        self.closed |= other.closed;
    }
}

/// Move packets back and forth until both sides are idle.
///
/// Errors from either side are returned with the side that raised them.
pub fn pump(client: &mut Tls, server: &mut Tls) -> Result<Pumped, (&'static str, Error)> {
    let mut pumped = Pumped::default();
    for _ in 0..32 {
        let c = drain(client);
        let c_packets = c.packets.clone();
        pumped.client.merge(c);
        deliver(server, &c_packets).map_err(|e| ("server", e))?;

        let s = drain(server);
        let s_packets = s.packets.clone();
        pumped.server.merge(s);
        deliver(client, &s_packets).map_err(|e| ("client", e))?;

        if c_packets.is_empty() && s_packets.is_empty() {
            let c = drain(client);
            pumped.client.merge(c);
            return Ok(pumped);
        }
    }
    panic!("endpoints did not settle");
}

/// Run a handshake to completion and check both sides agree.
pub fn connect(client_config: Config, server_config: Config) -> (Tls, Tls, Pumped) {
    init_log();
    let mut client = Tls::new_client(Arc::new(client_config)).expect("client");
    let mut server = Tls::new_server(Arc::new(server_config)).expect("server");

    let pumped = match pump(&mut client, &mut server) {
        Ok(p) => p,
        Err((side, e)) => panic!("{} failed: {}", side, e),
    };

    assert!(client.is_connected(), "client not connected");
    assert!(server.is_connected(), "server not connected");
    assert!(pumped.client.connected);
    assert!(pumped.server.connected);
    assert_eq!(client.version(), server.version());
    assert_eq!(client.cipher_suite(), server.cipher_suite());
    (client, server, pumped)
}

/// Send `data` from `from` and return what `to` decrypted.
pub fn transfer(from: &mut Tls, to: &mut Tls, data: &[u8]) -> Vec<u8> {
    from.send_application_data(data).expect("send");
    let d = drain(from);
    deliver(to, &d.packets).expect("deliver");
    drain(to).app_data.concat()
}

/// Content types of the records in `packets`.
pub fn record_types(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for p in packets {
        let mut i = 0;
        while i + 5 <= p.len() {
            out.push(p[i]);
            let len = u16::from_be_bytes([p[i + 3], p[i + 4]]) as usize;
            i += 5 + len;
        }
    }
    out
}

/// Handshake message types of the plaintext handshake records in `packets`.
pub fn handshake_types(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for p in packets {
        let mut i = 0;
        while i + 5 <= p.len() {
            let len = u16::from_be_bytes([p[i + 3], p[i + 4]]) as usize;
            if p[i] == HANDSHAKE {
                let body = &p[i + 5..(i + 5 + len).min(p.len())];
                let mut j = 0;
                while j + 4 <= body.len() {
                    out.push(body[j]);
                    let hl = u32::from_be_bytes([0, body[j + 1], body[j + 2], body[j + 3]]);
                    j += 4 + hl as usize;
                }
            }
            i += 5 + len;
        }
    }
    out
}
