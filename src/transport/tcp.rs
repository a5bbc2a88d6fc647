//! TCP transport carrying framed envelopes.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Transport, TransportFuture};
use crate::codec::{FrameDecoder, WireCodec};
use crate::error::{MocapError, Result};
use crate::protocol::Envelope;

const READ_CHUNK: usize = 8 * 1024;

/// Envelope transport over a TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    codec: WireCodec,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl TcpTransport {
    /// Wrap an accepted stream
    pub fn new(stream: TcpStream, codec: WireCodec) -> Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            codec,
            decoder: FrameDecoder::new(codec),
            read_buf: vec![0; READ_CHUNK],
        })
    }

    /// Connect to a server (client side)
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| MocapError::Network(format!("Failed to connect to {addr}: {e}")))?;
        Self::new(stream, WireCodec::new())
    }

    async fn read_envelope(&mut self) -> Result<Option<Envelope>> {
        loop {
            if let Some(envelope) = self.decoder.next_envelope()? {
                return Ok(Some(envelope));
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                if self.decoder.buffered() > 0 {
                    return Err(MocapError::Network(format!(
                        "connection closed with {} bytes of partial frame",
                        self.decoder.buffered()
                    )));
                }
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    async fn write_envelope(&mut self, envelope: Envelope) -> Result<()> {
        let frame = self.codec.encode(&envelope)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn next_envelope(&mut self) -> TransportFuture<'_, Option<Envelope>> {
        Box::pin(self.read_envelope())
    }

    fn send(&mut self, envelope: Envelope) -> TransportFuture<'_, ()> {
        Box::pin(self.write_envelope(envelope))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Payload;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_envelope_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = TcpTransport::new(stream, WireCodec::new()).unwrap();
            let request = transport.next_envelope().await.unwrap().unwrap();
            transport
                .send(Envelope::reply(request.id(), Payload::Acknowledge {}))
                .await
                .unwrap();
            request
        });

        let mut client = TcpTransport::connect(addr).await.unwrap();
        let request = Envelope::new(Payload::MotionGetMode {});
        client.send(request.clone()).await.unwrap();

        let reply = client.next_envelope().await.unwrap().unwrap();
        assert_eq!(reply.response_id(), Some(request.id()));
        assert_eq!(server.await.unwrap(), request);
        assert_eq!(client.name(), "TCP");
    }

    #[tokio::test]
    async fn test_tcp_clean_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = TcpTransport::new(stream, WireCodec::new()).unwrap();
            transport.next_envelope().await.unwrap()
        });

        let client = TcpTransport::connect(addr).await.unwrap();
        drop(client);
        assert!(server.await.unwrap().is_none());
    }
}
