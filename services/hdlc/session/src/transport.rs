//! Byte-stream transports for the link.
//!
//! A [`Transport`] moves opaque bytes and knows nothing about frames. Reads
//! may return any slice of the stream: part of a frame, several frames, or
//! both. Framing is recovered one layer up in [`crate::Link`].

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace};

/// Read granularity for stream transports
const READ_CHUNK: usize = 4 * 1024;

/// Ordered, reliable-or-not byte pipe between two link endpoints.
///
/// `recv` must be cancel safe: when its future is dropped before completion
/// no bytes may be lost. The sender relies on this to race reads against its
/// acknowledgment deadline.
#[async_trait]
pub trait Transport: Send {
    /// Write all of `bytes`
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Next run of bytes from the peer, `None` at end of stream
    async fn recv(&mut self) -> io::Result<Option<Bytes>>;

    /// Shut down the sending direction; the peer observes end of stream
    async fn close(&mut self) -> io::Result<()>;
}

/// Transport over any tokio byte stream (TCP socket, in-memory duplex, ...)
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    read_buf: BytesMut,
    closed: bool,
}

impl<S> StreamTransport<S> {
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            closed: false,
        }
    }

    /// Underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamTransport<TcpStream> {
    /// Address of the remote end
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        trace!("wrote {} bytes", bytes.len());
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        self.read_buf.reserve(READ_CHUNK);
        // read_buf is cancel safe: nothing is consumed unless it completes
        let n = self.stream.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            trace!("end of stream");
            return Ok(None);
        }
        trace!("read {} bytes", n);
        Ok(Some(self.read_buf.split().freeze()))
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Create a TCP listener bound to the given address
pub async fn listen_tcp(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Accept one connection and wrap it
pub async fn accept_tcp(
    listener: &TcpListener,
) -> io::Result<(StreamTransport<TcpStream>, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    debug!("accepted connection from {}", peer);
    Ok((StreamTransport::new(stream), peer))
}

/// Connect to a TCP address
pub async fn connect_tcp(addr: SocketAddr) -> io::Result<StreamTransport<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    debug!("connected to {}", addr);
    Ok(StreamTransport::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_tcp_listen_connect() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let listener = listen_tcp(addr).await.unwrap();
        let bound_addr = listener.local_addr().unwrap();

        let (client, accepted) = tokio::join!(connect_tcp(bound_addr), accept_tcp(&listener));
        let mut client = client.unwrap();
        let (mut server, _peer) = accepted.unwrap();
        assert_eq!(client.peer_addr().unwrap(), bound_addr);

        client.send(b"hello").await.unwrap();
        let mut got = Vec::new();
        while got.len() < 5 {
            got.extend_from_slice(&server.recv().await.unwrap().unwrap());
        }
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn test_close_signals_end_of_stream() {
        let (a, b) = tokio::io::duplex(64);
        let mut a = StreamTransport::new(a);
        let mut b = StreamTransport::new(b);

        a.send(b"xy").await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), Bytes::from_static(b"xy"));
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = tokio::io::duplex(64);
        let mut a = StreamTransport::new(a);
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert_eq!(
            a.send(b"late").await.unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }
}
