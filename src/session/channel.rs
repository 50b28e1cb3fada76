use std::net::SocketAddr;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tracing::trace;
use crate::session::framing::Framing;
use crate::session::MAX_MESSAGE_LEN;

/// One message per call in both directions, regardless of the underlying transport. This is the
///  seam between the session logic and the sockets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageChannel: Send {
    /// Returns the number of bytes the transport accepted, which may be less than the message's
    ///  length
    async fn send_message(&mut self, message: &[u8]) -> anyhow::Result<usize>;

    /// `None` means end of stream (TCP only - a datagram channel never ends)
    async fn recv_message(&mut self) -> anyhow::Result<Option<Bytes>>;
}

/// One datagram is one message
pub struct DatagramChannel {
    socket: UdpSocket,
    /// destination for sending; `None` for a receive-only channel
    peer: Option<SocketAddr>,
    recv_buf: Vec<u8>,
}

impl DatagramChannel {
    pub fn new(socket: UdpSocket, peer: Option<SocketAddr>) -> DatagramChannel {
        DatagramChannel {
            socket,
            peer,
            recv_buf: vec![0u8; MAX_MESSAGE_LEN],
        }
    }
}

#[async_trait]
impl MessageChannel for DatagramChannel {
    async fn send_message(&mut self, message: &[u8]) -> anyhow::Result<usize> {
        let n = match self.peer {
            Some(peer) => self.socket.send_to(message, peer).await,
            None => self.socket.send(message).await,
        }.context("send")?;
        trace!("sent datagram of {} bytes", n);
        Ok(n)
    }

    async fn recv_message(&mut self) -> anyhow::Result<Option<Bytes>> {
        let (n, from) = self.socket.recv_from(&mut self.recv_buf).await
            .context("recv")?;
        trace!("received datagram of {} bytes from {:?}", n, from);
        Ok(Some(Bytes::copy_from_slice(&self.recv_buf[..n])))
    }
}

/// Messages on a byte stream, delimited by a [Framing] strategy
pub struct StreamChannel<S> {
    stream: S,
    framing: Framing,
    recv_buf: Vec<u8>,
}

impl<S> StreamChannel<S> {
    pub fn new(stream: S, framing: Framing) -> StreamChannel<S> {
        StreamChannel {
            stream,
            framing,
            recv_buf: Vec::with_capacity(MAX_MESSAGE_LEN),
        }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> MessageChannel for StreamChannel<S> {
    async fn send_message(&mut self, message: &[u8]) -> anyhow::Result<usize> {
        self.framing.write_frame(&mut self.stream, message).await
    }

    async fn recv_message(&mut self) -> anyhow::Result<Option<Bytes>> {
        let result = self.framing.read_frame(&mut self.stream, &mut self.recv_buf).await?;
        if let Some(msg) = &result {
            trace!("received {} bytes from stream", msg.len());
        }
        Ok(result)
    }
}
