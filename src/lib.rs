//! timpl is a sans-IO TLS/SSL stream engine.
//!
//! Records go in through [`Tls::handle_packet`] and everything the engine wants
//! to say comes out of [`Tls::poll_output`]: records for the peer, and events
//! such as [`Output::Connected`] or received application data. The engine owns
//! no socket and spawns no task. [`TlsStream`] drives it over any tokio
//! `AsyncRead + AsyncWrite`.
//!
//! SSL 3.0 through TLS 1.3 are spoken. Which versions, cipher suites, groups and
//! hello extensions are offered is set with [`Config::builder`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use timpl::{Config, Output, Tls};
//!
//! let config = Arc::new(Config::default());
//! let mut client = Tls::new_client(config).unwrap();
//!
//! loop {
//!     match client.poll_output() {
//!         Output::Packet(p) => { /* write to the transport */ }
//!         Output::Idle => break,
//!         _ => {}
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

pub mod certificate;
mod client;
mod codec;
mod config;
mod context;
pub mod crypto;
mod engine;
mod error;
pub mod extension;
pub mod key_exchange;
pub mod message;
mod secret;
mod server;
mod stream;
pub mod types;

pub use client::{Client, ClientState};
pub use config::{Config, ConfigBuilder, PskCredentials, SrpCredentials, SrpVerifier};
pub use context::{Role, Source, TlsConnection, TlsContext};
pub use engine::Engine;
pub use error::{Error, InternalError};
pub use secret::Secret;
pub use server::{Server, ServerState};
pub use stream::TlsStream;

use std::sync::Arc;

use types::{CipherSuite, TlsVersion};

/// What the engine has for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A record to send to the peer.
    Packet(Vec<u8>),
    /// Both Finished messages are verified.
    Connected,
    /// The peer's leaf certificate (DER), accepted by the validator.
    PeerCert(Vec<u8>),
    /// Decrypted application data.
    ApplicationData(Vec<u8>),
    /// The peer sent close_notify.
    Closed,
    /// Nothing more right now.
    Idle,
}

/// A TLS connection, client or server.
pub struct Tls {
    inner: Inner,
}

enum Inner {
    Client(Client),
    Server(Server),
}

impl Tls {
    /// Client that queues its ClientHello right away.
    pub fn new_client(config: Arc<Config>) -> Result<Tls, Error> {
        Ok(Tls {
            inner: Inner::Client(Client::new(config)?),
        })
    }

    pub fn new_server(config: Arc<Config>) -> Result<Tls, Error> {
        Ok(Tls {
            inner: Inner::Server(Server::new(config)?),
        })
    }

    pub fn is_client(&self) -> bool {
        matches!(self.inner, Inner::Client(_))
    }

    fn engine(&self) -> &Engine {
        match &self.inner {
            Inner::Client(c) => c.engine(),
            Inner::Server(s) => s.engine(),
        }
    }

    fn engine_mut(&mut self) -> &mut Engine {
        match &mut self.inner {
            Inner::Client(c) => c.engine_mut(),
            Inner::Server(s) => s.engine_mut(),
        }
    }

    /// Feed bytes received from the peer. Need not be record aligned.
    ///
    /// On error the alert for the peer, if any, is already queued.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), Error> {
        if self.engine().is_failed() {
            return Err(Error::Closed);
        }
        match &mut self.inner {
            Inner::Client(c) => c.handle_packet(packet),
            Inner::Server(s) => s.handle_packet(packet),
        }
    }

    /// Next output. Records held back while application data was waiting are
    /// processed once everything queued has been taken.
    ///
    /// A failure while doing so queues the alert and fails the connection.
    pub fn poll_output(&mut self) -> Output {
        let output = self.poll_queued();
        if output != Output::Idle || !self.has_buffered_input() {
            return output;
        }
        if let Err(e) = self.resume() {
            debug!("Buffered record failed: {}", e);
        }
        self.poll_queued()
    }

    /// Output already queued, without touching buffered records.
    pub(crate) fn poll_queued(&mut self) -> Output {
        match &mut self.inner {
            Inner::Client(c) => c.poll_output(),
            Inner::Server(s) => s.poll_output(),
        }
    }

    /// Whole records are waiting that were not processed yet. Application data
    /// is decrypted one message at a time, so later records wait here until
    /// the pending message is taken with [`Tls::poll_output`].
    pub fn has_buffered_input(&self) -> bool {
        !self.engine().is_failed() && self.engine().has_buffered_input()
    }

    /// Process records held back while application data was pending.
    pub(crate) fn resume(&mut self) -> Result<(), Error> {
        self.handle_packet(&[])
    }

    /// Encrypt and queue application data.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.engine().is_failed() || self.engine().is_closed() {
            return Err(Error::Closed);
        }
        match &mut self.inner {
            Inner::Client(c) => c.send_application_data(data),
            Inner::Server(s) => s.send_application_data(data),
        }
    }

    /// Queue close_notify.
    pub fn close(&mut self) -> Result<(), Error> {
        self.engine_mut().close()
    }

    pub fn is_connected(&self) -> bool {
        self.engine().is_handshake_complete()
    }

    pub fn is_closed(&self) -> bool {
        self.engine().is_closed()
    }

    pub fn is_failed(&self) -> bool {
        self.engine().is_failed()
    }

    /// The last warning alert received, if any. Warnings never end the connection.
    pub fn last_warning(&self) -> Option<types::Alert> {
        self.engine().last_warning()
    }

    /// The negotiated version, once ServerHello is through.
    pub fn version(&self) -> Option<TlsVersion> {
        self.engine().context().version_opt()
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.engine().context().cipher_suite_opt()
    }

    /// The ALPN protocol agreed on, if any.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.engine().context().alpn()
    }

    /// The peer's certificate chain, leaf first. Empty until received.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        self.engine()
            .context()
            .remote()
            .map(|r| r.certificates())
            .unwrap_or(&[])
    }
}
