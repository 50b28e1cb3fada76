use std::fmt::{Display, Formatter};
use std::time::Duration;
use anyhow::bail;
use crate::endpoint::{TransportEndpoint, TransportKind, DEFAULT_MULTICAST_TTL};
use crate::sender::message_composer::{MessageContent, MessageLength};
use crate::session::framing::Framing;
use crate::session::MAX_MESSAGE_LEN;

/// The send buffer size requested unless configured otherwise. A smaller OS default is noted
///  at startup.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 65536;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Unbounded runs (num_bursts == 0) are refused above this burst size ...
const MAX_UNBOUNDED_BURST_COUNT: u32 = 50;
/// ... or below this pause between bursts
const MIN_UNBOUNDED_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum SenderQuiet {
    /// one line per burst
    #[default]
    Verbose,
    /// a '.' per burst
    Progress,
    Silent,
}

impl SenderQuiet {
    pub fn from_level(level: u8) -> SenderQuiet {
        match level {
            0 => SenderQuiet::Verbose,
            1 => SenderQuiet::Progress,
            _ => SenderQuiet::Silent,
        }
    }
}

/// Canned test configurations, numbered 1 to 5 on the command line
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TestPreset {
    /// one short message per second for 10 minutes
    BasicConnectivity,
    /// 5 messages of 5000 bytes, exercising IP fragmentation
    Fragmentation,
    /// 50 bursts of 100 8K messages, 10 bursts per second
    ModerateLoad,
    /// one burst of 5000 short messages
    BurstLoad,
    /// one burst of 50000 800 byte messages with the OS default send buffer
    HeavyBurstLoad,
}

impl TestPreset {
    pub fn from_number(number: u8) -> anyhow::Result<TestPreset> {
        match number {
            1 => Ok(TestPreset::BasicConnectivity),
            2 => Ok(TestPreset::Fragmentation),
            3 => Ok(TestPreset::ModerateLoad),
            4 => Ok(TestPreset::BurstLoad),
            5 => Ok(TestPreset::HeavyBurstLoad),
            _ => bail!("test preset must be between 1 and 5, was {}", number),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            TestPreset::BasicConnectivity => 1,
            TestPreset::Fragmentation => 2,
            TestPreset::ModerateLoad => 3,
            TestPreset::BurstLoad => 4,
            TestPreset::HeavyBurstLoad => 5,
        }
    }

    /// Overwrites the preset's parameters in the config, leaving everything else alone.
    ///  Explicitly configured values are applied afterwards to override the preset.
    pub fn apply(&self, config: &mut SenderConfig) {
        let (burst_count, msg_len, num_bursts, pause_millis) = match self {
            TestPreset::BasicConnectivity => (1, 20, 600, 1000),
            TestPreset::Fragmentation => (1, 5000, 5, 1000),
            TestPreset::ModerateLoad => (100, 8 * 1024, 50, 100),
            TestPreset::BurstLoad => (5000, 20, 1, 1000),
            TestPreset::HeavyBurstLoad => (50000, 800, 1, 1000),
        };

        config.preset = Some(*self);
        config.burst_count = burst_count;
        config.length = MessageLength::Fixed(msg_len);
        config.num_bursts = num_bursts;
        config.pause = Duration::from_millis(pause_millis);
        config.stat_pause = Duration::from_millis(2000);
        config.loops = 1;
        config.quiet = SenderQuiet::Progress;

        match self {
            TestPreset::HeavyBurstLoad => {
                config.send_buffer_size = 0;
                config.send_buffer_explicit = false;
            }
            _ => {
                config.send_buffer_size = DEFAULT_SEND_BUFFER_SIZE;
                config.send_buffer_explicit = true;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub endpoint: TransportEndpoint,
    pub burst_count: u32,
    /// 0 for 'until interrupted'
    pub num_bursts: u32,
    /// between bursts
    pub pause: Duration,
    /// delay before the 'stat' message, zero for no 'stat' message
    pub stat_pause: Duration,
    /// number of complete test runs, each with its own echo and stat
    pub loops: u32,
    pub content: MessageContent,
    pub length: MessageLength,
    /// 0 for the OS default
    pub send_buffer_size: usize,
    /// whether the send buffer size was chosen by the user (or a preset)
    pub send_buffer_explicit: bool,
    pub quiet: SenderQuiet,
    pub preset: Option<TestPreset>,
    /// pause after the initial echo, giving network hardware time to establish the flow
    pub settle_delay: Duration,
    pub framing: Framing,
}

impl SenderConfig {
    pub fn new(endpoint: TransportEndpoint) -> SenderConfig {
        SenderConfig {
            endpoint,
            burst_count: 1,
            num_bursts: 0,
            pause: Duration::from_millis(1000),
            stat_pause: Duration::ZERO,
            loops: 1,
            content: MessageContent::default(),
            length: MessageLength::FromContent,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            send_buffer_explicit: false,
            quiet: SenderQuiet::default(),
            preset: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            framing: Framing::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.endpoint.validate_for_send()?;

        if self.num_bursts == 0 && (self.burst_count > MAX_UNBOUNDED_BURST_COUNT || self.pause < MIN_UNBOUNDED_PAUSE) {
            bail!("danger - heavy traffic chosen with infinite number of bursts (burst count {}, pause {:?}). Limit the number of bursts.",
                self.burst_count, self.pause);
        }
        if self.loops == 0 {
            bail!("number of loops must be at least 1");
        }
        if let MessageLength::Fixed(len) = self.length {
            if len > MAX_MESSAGE_LEN {
                bail!("message length {} exceeds the maximum of {}", len, MAX_MESSAGE_LEN);
            }
        }
        if let MessageContent::Payload(payload) = &self.content {
            if payload.len() > MAX_MESSAGE_LEN {
                bail!("payload too big: {} bytes, maximum is {}", payload.len(), MAX_MESSAGE_LEN);
            }
        }
        Ok(())
    }

    /// The length of every data message, `None` if it depends on the ordinal
    pub fn message_len(&self) -> Option<usize> {
        match (&self.length, &self.content) {
            (MessageLength::Fixed(len), _) => Some(*len),
            (MessageLength::FromContent, MessageContent::Payload(payload)) => Some(payload.len()),
            (MessageLength::FromContent, MessageContent::Sequenced { .. }) => None,
        }
    }

    /// The text of the echo message announcing each test run
    pub fn announcement(&self) -> String {
        match self.preset {
            Some(preset) => format!("test {}, sender equiv cmd {}", preset.number(), self),
            None => format!("sender equiv cmd: {}", self),
        }
    }
}

/// renders the equivalent command line
impl Display for SenderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "msend -b{}", self.burst_count)?;
        if matches!(self.content, MessageContent::Sequenced { decimal: true }) {
            write!(f, " -d")?;
        }
        if self.loops != 1 {
            write!(f, " -l{}", self.loops)?;
        }
        write!(f, " -m{} -n{} -p{}", self.message_len().unwrap_or(0), self.num_bursts, self.pause.as_millis())?;
        match self.quiet {
            SenderQuiet::Verbose => {}
            SenderQuiet::Progress => write!(f, " -q")?,
            SenderQuiet::Silent => write!(f, " -qq")?,
        }
        write!(f, " -s{} -S{}", self.stat_pause.as_millis(), self.send_buffer_size)?;
        match self.endpoint.kind {
            TransportKind::Tcp => write!(f, " -t")?,
            TransportKind::UnicastUdp => write!(f, " -u")?,
            TransportKind::MulticastUdp => {}
        }
        if self.framing != Framing::default() {
            write!(f, " --framing {}", self.framing)?;
        }
        write!(f, " {} {}", self.endpoint.addr, self.endpoint.port)?;
        if self.endpoint.ttl != DEFAULT_MULTICAST_TTL || self.endpoint.interface.is_some() {
            write!(f, " {}", self.endpoint.ttl)?;
        }
        if let Some(interface) = self.endpoint.interface {
            write!(f, " {}", interface)?;
        }
        Ok(())
    }
}
