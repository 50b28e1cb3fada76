use anyhow::bail;
use crate::session::MAX_MESSAGE_LEN;

/// What goes into a data message
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MessageContent {
    /// `"Message <ordinal>"`, the ordinal in hex unless `decimal` is set
    Sequenced { decimal: bool },
    /// exactly these bytes in every message, no ordinal
    Payload(Vec<u8>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Sequenced { decimal: false }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum MessageLength {
    /// length of the text (or payload) in each message
    #[default]
    FromContent,
    /// Every message has exactly this length. The send buffer is reused between messages and
    ///  never cleared, so bytes beyond the current text's terminating NUL are whatever earlier
    ///  (longer) messages left there.
    Fixed(usize),
}

/// Fills a persistent send buffer with the next message. The buffer is deliberately not cleared
///  between messages: receivers of fixed-length messages see stale trailing bytes, which is
///  observable on the wire and kept as is.
pub struct MessageComposer {
    buf: Vec<u8>,
    content: MessageContent,
    length: MessageLength,
}

impl MessageComposer {
    pub fn new(content: MessageContent, length: MessageLength) -> MessageComposer {
        MessageComposer {
            buf: vec![0u8; MAX_MESSAGE_LEN],
            content,
            length,
        }
    }

    pub fn compose(&mut self, ordinal: u64) -> &[u8] {
        let content_len = match &self.content {
            MessageContent::Payload(payload) => {
                let len = payload.len().min(MAX_MESSAGE_LEN);
                self.buf[..len].copy_from_slice(&payload[..len]);
                len
            }
            MessageContent::Sequenced { decimal } => {
                let text = if *decimal {
                    format!("Message {}", ordinal)
                }
                else {
                    format!("Message {:x}", ordinal)
                };
                let text = text.as_bytes();
                self.buf[..text.len()].copy_from_slice(text);
                self.buf[text.len()] = 0;
                text.len()
            }
        };

        let len = match self.length {
            MessageLength::FromContent => content_len,
            MessageLength::Fixed(len) => len.min(MAX_MESSAGE_LEN),
        };
        &self.buf[..len]
    }
}

/// Parses a payload given as hex digits, two per byte
pub fn parse_hex_payload(s: &str) -> anyhow::Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("payload must be an even number of hex digits");
    }
    if s.len() / 2 > MAX_MESSAGE_LEN {
        bail!("payload too big: {} bytes, maximum is {}", s.len() / 2, MAX_MESSAGE_LEN);
    }

    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            match (hex_digit(pair[0]), hex_digit(pair[1])) {
                (Some(hi), Some(lo)) => Ok(hi * 16 + lo),
                _ => bail!("invalid hex digit in payload: {:?}", String::from_utf8_lossy(pair)),
            }
        })
        .collect()
}

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}
