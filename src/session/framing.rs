use std::fmt::{Display, Formatter};
use std::str::FromStr;
use anyhow::{bail, Context};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use crate::session::MAX_MESSAGE_LEN;

/// How messages are delimited on a byte stream (TCP). Datagram transports need no framing.
///
/// `SingleRead` treats whatever a single read returns as one message. This is what existing
///  deployments do, and it is *not* robust: the network stack is free to split or coalesce
///  writes. It is kept as the default for interop testing. `LengthPrefixed` prefixes each
///  message with its length (u32 BE) and is exact, but both sides must agree on it.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Framing {
    #[default]
    SingleRead,
    LengthPrefixed,
}

impl Framing {
    /// Reads the next message, `None` signalling a clean end of stream
    pub async fn read_frame<R: AsyncRead + Unpin>(&self, reader: &mut R, buf: &mut Vec<u8>) -> anyhow::Result<Option<Bytes>> {
        match self {
            Framing::SingleRead => {
                buf.resize(MAX_MESSAGE_LEN, 0);
                let n = reader.read(buf.as_mut_slice()).await
                    .context("recv")?;
                if n == 0 {
                    return Ok(None);
                }
                Ok(Some(Bytes::copy_from_slice(&buf[..n])))
            }
            Framing::LengthPrefixed => {
                let mut header = [0u8; 4];
                let mut filled = 0;
                while filled < header.len() {
                    let n = reader.read(&mut header[filled..]).await
                        .context("recv")?;
                    if n == 0 {
                        if filled == 0 {
                            return Ok(None);
                        }
                        bail!("stream ended inside a frame header");
                    }
                    filled += n;
                }

                let len = u32::from_be_bytes(header) as usize;
                if len > MAX_MESSAGE_LEN {
                    bail!("frame length {} exceeds the maximum message length of {}", len, MAX_MESSAGE_LEN);
                }

                buf.resize(len, 0);
                reader.read_exact(buf.as_mut_slice()).await
                    .context("stream ended inside a frame")?;
                Ok(Some(Bytes::copy_from_slice(buf)))
            }
        }
    }

    /// Returns the number of message bytes written, excluding any framing overhead
    pub async fn write_frame<W: AsyncWrite + Unpin>(&self, writer: &mut W, message: &[u8]) -> anyhow::Result<usize> {
        if let Framing::LengthPrefixed = self {
            if message.len() > MAX_MESSAGE_LEN {
                bail!("message length {} exceeds the maximum message length of {}", message.len(), MAX_MESSAGE_LEN);
            }
            writer.write_u32(message.len() as u32).await
                .context("send")?;
        }
        writer.write_all(message).await
            .context("send")?;
        writer.flush().await
            .context("send")?;
        Ok(message.len())
    }
}

impl FromStr for Framing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-read" => Ok(Framing::SingleRead),
            "length-prefixed" => Ok(Framing::LengthPrefixed),
            _ => bail!("unknown framing {:?}, expected 'single-read' or 'length-prefixed'", s),
        }
    }
}

impl Display for Framing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::SingleRead => write!(f, "single-read"),
            Framing::LengthPrefixed => write!(f, "length-prefixed"),
        }
    }
}
