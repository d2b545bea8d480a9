//! TlsStream over an in-memory tokio duplex pipe.

mod tls_common;

use std::sync::Arc;

use timpl::types::TlsVersion;
use timpl::{Config, Error, TlsStream};
use tls_common::*;

fn configs() -> (Arc<Config>, Arc<Config>) {
    let cert = ecdsa_cert();
    let client = Config::builder().server_name("localhost").build().unwrap();
    let server = with_cert(Config::builder(), &cert).build().unwrap();
    (Arc::new(client), Arc::new(server))
}

#[tokio::test]
async fn handshake_and_echo() {
    init_log();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_config, server_config) = configs();

    let server = tokio::spawn(async move {
        let mut stream = TlsStream::server(server_io, server_config)?;
        stream.handshake().await?;
        let mut buf = Vec::new();
        stream.read(&mut buf, false).await?;
        stream.write(&buf).await?;
        Ok::<_, Error>(stream.version())
    });

    let mut client = TlsStream::client(client_io, client_config).unwrap();
    client.handshake().await.unwrap();
    assert!(client.is_secure());
    assert_eq!(client.peer_certificates().len(), 1);

    client.write(b"echo me").await.unwrap();
    let mut buf = Vec::new();
    let n = client.read(&mut buf, false).await.unwrap();
    assert_eq!(n, 7);
    assert_eq!(buf, b"echo me");

    let server_version = server.await.unwrap().unwrap();
    assert_eq!(server_version, Some(TlsVersion::Tls13));
    assert_eq!(client.version(), server_version);
}

#[tokio::test]
async fn read_with_last_sends_close_notify() {
    init_log();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_config, server_config) = configs();

    let server = tokio::spawn(async move {
        let mut stream = TlsStream::server(server_io, server_config)?;
        stream.write(b"bye").await?;
        let mut buf = Vec::new();
        // close_notify from the client ends the stream
        let n = stream.read(&mut buf, false).await?;
        Ok::<_, Error>(n)
    });

    let mut client = TlsStream::client(client_io, client_config).unwrap();
    let mut buf = Vec::new();
    client.read(&mut buf, true).await.unwrap();
    assert_eq!(buf, b"bye");

    assert_eq!(server.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn transport_eof_during_handshake() {
    init_log();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_config, _) = configs();
    drop(server_io);

    let mut client = TlsStream::client(client_io, client_config).unwrap();
    assert!(client.handshake().await.is_err());
    assert!(!client.is_secure());
}

#[tokio::test]
async fn large_transfer_in_small_chunks() {
    init_log();
    // a tiny pipe forces records to arrive split across reads
    let (client_io, server_io) = tokio::io::duplex(512);
    let (client_config, server_config) = configs();
    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    let expected = data.clone();

    let server = tokio::spawn(async move {
        let mut stream = TlsStream::server(server_io, server_config)?;
        let mut got = Vec::new();
        while got.len() < expected.len() {
            stream.read(&mut got, false).await?;
        }
        Ok::<_, Error>(got)
    });

    let mut client = TlsStream::client(client_io, client_config).unwrap();
    client.write(&data).await.unwrap();

    assert_eq!(server.await.unwrap().unwrap(), data);
}
