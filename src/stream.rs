//! Drive a [`Tls`] over a tokio transport.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::{CipherSuite, TlsVersion};
use crate::{Config, Error, Output, Tls};

const READ_CHUNK: usize = 16 * 1024 + 2048;

/// A TLS connection over an `AsyncRead + AsyncWrite` transport.
///
/// Every flight is written out before the next read, so the handshake is
/// strictly sequential. After it completes, reads and writes are independent.
pub struct TlsStream<T> {
    io: T,
    tls: Tls,

    /// Decrypted application message not yet handed out. Further records
    /// stay undecrypted in the engine until this is taken.
    received: Option<Vec<u8>>,

    /// close_notify received.
    peer_closed: bool,

    read_buf: Vec<u8>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> TlsStream<T> {
    pub fn client(io: T, config: Arc<Config>) -> Result<Self, Error> {
        Ok(Self::new(io, Tls::new_client(config)?))
    }

    pub fn server(io: T, config: Arc<Config>) -> Result<Self, Error> {
        Ok(Self::new(io, Tls::new_server(config)?))
    }

    fn new(io: T, tls: Tls) -> Self {
        TlsStream {
            io,
            tls,
            received: None,
            peer_closed: false,
            read_buf: vec![0; READ_CHUNK],
        }
    }

    /// Run the handshake to completion.
    pub async fn handshake(&mut self) -> Result<(), Error> {
        loop {
            self.flush().await?;
            if self.tls.is_connected() {
                debug!(
                    "Secure: {:?} {:?}",
                    self.tls.version(),
                    self.tls.cipher_suite()
                );
                return Ok(());
            }
            self.read_more().await?;
        }
    }

    /// Encrypt and send `data`.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.tls.is_connected() {
            self.handshake().await?;
        }
        self.tls.send_application_data(data)?;
        self.flush().await
    }

    /// Append one decrypted application message to `out`.
    ///
    /// Returns the number of bytes appended, 0 once the peer has closed. With
    /// `last` set, close_notify is sent after the read.
    pub async fn read(&mut self, out: &mut Vec<u8>, last: bool) -> Result<usize, Error> {
        if !self.tls.is_connected() {
            self.handshake().await?;
        }
        loop {
            if let Some(data) = self.received.take() {
                out.extend_from_slice(&data);
                if last {
                    self.close().await?;
                }
                return Ok(data.len());
            }
            if self.peer_closed {
                return Ok(0);
            }
            if self.tls.has_buffered_input() {
                let result = self.tls.resume();
                self.fail_on(result).await?;
            } else {
                self.read_more().await?;
            }
            self.flush().await?;
        }
    }

    /// Send close_notify and shut the transport down for writing.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.tls.close()?;
        self.flush().await?;
        self.io.shutdown().await?;
        Ok(())
    }

    /// The handshake is complete and neither side has failed.
    pub fn is_secure(&self) -> bool {
        self.tls.is_connected() && !self.tls.is_failed()
    }

    pub fn version(&self) -> Option<TlsVersion> {
        self.tls.version()
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.tls.cipher_suite()
    }

    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        self.tls.peer_certificates()
    }

    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.tls.alpn_protocol()
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Write every queued record and collect queued events.
    async fn flush(&mut self) -> Result<(), Error> {
        let mut wrote = false;
        loop {
            match self.tls.poll_queued() {
                Output::Packet(p) => {
                    trace!("Write record, {} bytes", p.len());
                    self.io.write_all(&p).await?;
                    wrote = true;
                }
                Output::ApplicationData(data) => match &mut self.received {
                    // the engine holds back records while a message is pending
                    Some(pending) => pending.extend_from_slice(&data),
                    None => self.received = Some(data),
                },
                Output::Closed => self.peer_closed = true,
                Output::Connected | Output::PeerCert(_) => {}
                Output::Idle => break,
            }
        }
        if wrote {
            self.io.flush().await?;
        }
        Ok(())
    }

    /// Read from the transport and feed the engine.
    ///
    /// On failure the alert the engine queued is written before returning.
    async fn read_more(&mut self) -> Result<(), Error> {
        let n = self.io.read(&mut self.read_buf).await?;
        if n == 0 {
            debug!("Transport closed");
            return Err(Error::Closed);
        }
        trace!("Read {} bytes", n);
        let result = self.tls.handle_packet(&self.read_buf[..n]);
        self.fail_on(result).await
    }

    /// Write the alert the engine queued for a failure, then return it.
    async fn fail_on(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        if let Err(e) = result {
            if let Err(flush_error) = self.flush().await {
                debug!("Failed to send alert: {}", flush_error);
            }
            return Err(e);
        }
        Ok(())
    }
}
