use std::borrow::Cow;
use anyhow::Context;
use chrono::{DateTime, Local};
use tokio::time::sleep;
use tracing::{debug, trace};
use crate::endpoint::TransportEndpoint;
use crate::output::binary_dump::BinaryDump;
use crate::output::hex_dump::hex_dump_lines;
use crate::output::Reporter;
use crate::receiver::receiver_config::{QuietLevel, ReceiverConfig};
use crate::session::channel::MessageChannel;
use crate::session::loss::LossReport;
use crate::session::sequence::{SequenceCheck, SequenceVerifier};
use crate::session::session_message::SessionMessage;

/// What a single received message means for the session
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveEvent<'a> {
    /// a new test run was announced, counters were reset
    Echo(Cow<'a, str>),
    /// the sender's summary arrived, counters were reset
    Loss(LossReport),
    /// a summary claiming zero messages were sent, so there is nothing to compute loss against
    ZeroSent { received: u64 },
    Data {
        /// number of data messages received before this one in the current run
        index: u64,
        /// `None` unless sequence verification is enabled
        sequence: Option<SequenceCheck>,
    },
}

/// Counters of a receiving session, independent of any I/O
#[derive(Debug)]
pub struct ReceiverState {
    verify_sequence: bool,
    received: u64,
    sequence: SequenceVerifier,
}

impl ReceiverState {
    pub fn new(verify_sequence: bool) -> ReceiverState {
        ReceiverState {
            verify_sequence,
            received: 0,
            sequence: SequenceVerifier::new(),
        }
    }

    /// data messages since the last echo or stat
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn on_message<'a>(&mut self, message: &'a [u8]) -> ReceiveEvent<'a> {
        match SessionMessage::classify(message) {
            SessionMessage::Echo(text) => {
                self.reset();
                ReceiveEvent::Echo(text)
            }
            SessionMessage::Stat { sent } => {
                let received = self.received;
                self.reset();
                match LossReport::compute(sent, received) {
                    Ok(report) => ReceiveEvent::Loss(report),
                    Err(e) => {
                        debug!("{}", e);
                        ReceiveEvent::ZeroSent { received }
                    }
                }
            }
            SessionMessage::Data(payload) => {
                let index = self.received;
                self.received += 1;
                let sequence = self.verify_sequence
                    .then(|| self.sequence.check(payload));
                ReceiveEvent::Data { index, sequence }
            }
        }
    }

    fn reset(&mut self) {
        self.received = 0;
        self.sequence.reset();
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StopReason {
    EndOfStream,
    /// stop-on-stat was configured and a stat message arrived
    StatReceived,
}

/// The receiver's main loop: receives one message at a time, renders it according to the
///  quiet level, and acts on echo and stat messages.
pub struct VerificationLoop<'a> {
    config: &'a ReceiverConfig,
    reporter: &'a dyn Reporter,
    dump: Option<BinaryDump>,
    state: ReceiverState,
}

impl<'a> VerificationLoop<'a> {
    pub fn new(config: &'a ReceiverConfig, reporter: &'a dyn Reporter) -> anyhow::Result<VerificationLoop<'a>> {
        let dump = match &config.dump_file {
            Some(path) => Some(BinaryDump::create(path)?),
            None => None,
        };

        Ok(VerificationLoop {
            config,
            reporter,
            dump,
            state: ReceiverState::new(config.verify_sequence),
        })
    }

    pub fn state(&self) -> &ReceiverState {
        &self.state
    }

    pub async fn run(&mut self, channel: &mut dyn MessageChannel) -> anyhow::Result<StopReason> {
        loop {
            let message = match channel.recv_message().await.context("recv")? {
                Some(message) => message,
                None => {
                    self.reporter.report("EOF");
                    return Ok(StopReason::EndOfStream);
                }
            };

            if let Some(reason) = self.on_message(&message).await? {
                return Ok(reason);
            }
        }
    }

    async fn on_message(&mut self, message: &[u8]) -> anyhow::Result<Option<StopReason>> {
        trace!("received {} bytes", message.len());
        self.render(message);
        if let Some(dump) = &mut self.dump {
            dump.append(message)?;
        }

        match self.state.on_message(message) {
            ReceiveEvent::Echo(text) => {
                self.reporter.report(&text);
            }
            ReceiveEvent::Loss(report) => {
                for line in report.report_lines() {
                    self.reporter.report(&line);
                }
                if self.config.stop_on_stat {
                    return Ok(Some(StopReason::StatReceived));
                }
            }
            ReceiveEvent::ZeroSent { received } => {
                self.reporter.report(&format!("0 msgs sent, {} received (not including 'stat')", received));
                self.reporter.report("WARNING: 'stat' reports no messages sent, loss is undefined");
                if self.config.stop_on_stat {
                    return Ok(Some(StopReason::StatReceived));
                }
            }
            ReceiveEvent::Data { index, sequence } => {
                if self.config.pacing.should_pause(index) {
                    sleep(self.config.pacing.pause).await;
                }
                if let Some(SequenceCheck::Resynchronized { expected, received_text, .. }) = sequence {
                    self.reporter.report(&format!("Expected seq {:x} (hex), got {}", expected, received_text));
                }
            }
        }
        Ok(None)
    }

    fn render(&self, message: &[u8]) {
        match self.config.quiet {
            QuietLevel::FullDump => {
                self.reporter.report(&message_header(&Local::now(), &self.config.endpoint, message.len(), true));
                for line in hex_dump_lines(message) {
                    self.reporter.report(&line);
                }
            }
            QuietLevel::Summary => {
                self.reporter.report(&message_header(&Local::now(), &self.config.endpoint, message.len(), false));
            }
            QuietLevel::Silent => {}
        }
    }
}

/// `HH:MM:SS.uuuuuu <group>.<port> <n> bytes`, with a trailing colon if a dump follows
fn message_header(now: &DateTime<Local>, endpoint: &TransportEndpoint, len: usize, with_dump: bool) -> String {
    format!("{} {} {} bytes{}",
        now.format("%H:%M:%S%.6f"),
        endpoint,
        len,
        if with_dump { ":" } else { "" },
    )
}
