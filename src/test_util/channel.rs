use std::collections::VecDeque;
use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use crate::session::channel::MessageChannel;

/// Handle for inspecting what was sent through a [ScriptedChannel], valid after the channel
///  itself was moved into the code under test
#[derive(Debug, Clone, Default)]
pub struct SentMessages(Arc<RwLock<Vec<Vec<u8>>>>);

impl SentMessages {
    /// returns sent messages, clearing the internal buffer
    pub async fn take(&self) -> Vec<Vec<u8>> {
        let mut lock = self.0.write().await;
        std::mem::take(&mut *lock)
    }

    pub async fn len(&self) -> usize {
        self.0.read().await.len()
    }
}

/// Plays back a scripted sequence of incoming messages and records everything that is sent.
///  Running out of script is end of stream.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    incoming: VecDeque<Option<Bytes>>,
    sent: SentMessages,
    /// if set, every send reports that only this many bytes were accepted
    accepted_len: Option<usize>,
}

impl ScriptedChannel {
    pub fn new() -> ScriptedChannel {
        Default::default()
    }

    pub fn with_incoming<M: AsRef<[u8]>>(messages: impl IntoIterator<Item = M>) -> ScriptedChannel {
        let mut channel = ScriptedChannel::new();
        for msg in messages {
            channel.push_incoming(msg.as_ref());
        }
        channel
    }

    pub fn push_incoming(&mut self, message: &[u8]) {
        self.incoming.push_back(Some(Bytes::copy_from_slice(message)));
    }

    pub fn push_eof(&mut self) {
        self.incoming.push_back(None);
    }

    pub fn accepting_only(mut self, len: usize) -> ScriptedChannel {
        self.accepted_len = Some(len);
        self
    }

    pub fn sent(&self) -> SentMessages {
        self.sent.clone()
    }
}

#[async_trait]
impl MessageChannel for ScriptedChannel {
    async fn send_message(&mut self, message: &[u8]) -> anyhow::Result<usize> {
        self.sent.0.write().await.push(message.to_vec());
        Ok(self.accepted_len.unwrap_or(message.len()))
    }

    async fn recv_message(&mut self) -> anyhow::Result<Option<Bytes>> {
        Ok(self.incoming.pop_front().flatten())
    }
}
