use std::net::Ipv4Addr;
use std::time::Duration;
use clap::Parser;
use clap_derive::Parser;
use mtools::endpoint::{TransportEndpoint, DEFAULT_MULTICAST_TTL};
use mtools::membership::socket_session::open_sender_session;
use mtools::output::{ConsoleReporter, Reporter};
use mtools::sender::message_composer::{parse_hex_payload, MessageContent, MessageLength};
use mtools::sender::sender_config::{SenderConfig, SenderQuiet, TestPreset};
use mtools::sender::traffic_generator::{nominal_duration, run_traffic_generator};
use mtools::session::MAX_MESSAGE_LEN;
use tracing::{info, Level};

/// Sends bursts of numbered messages to a multicast group (or unicast / TCP destination), to
///  be received by mdump
#[derive(Parser)]
#[clap(name = "msend")]
struct Args {
    group: Ipv4Addr,
    port: u16,
    /// multicast TTL
    ttl: Option<u8>,
    /// local interface for outgoing multicast
    interface: Option<Ipv4Addr>,

    /// predefined test 1 to 5, explicit options override its values
    #[clap(long)]
    preset: Option<u8>,

    /// messages per burst [1]
    #[clap(short = 'b')]
    burst_count: Option<u32>,

    /// decimal numbers in messages [hex]
    #[clap(short = 'd', default_value_t = false)]
    decimal: bool,

    /// repeat the whole test this many times [1]
    #[clap(short = 'l')]
    loops: Option<u32>,

    /// fixed message length, 0 for the length of the text [0]
    #[clap(short = 'm')]
    msg_len: Option<usize>,

    /// number of bursts, 0 for infinite [0]
    #[clap(short = 'n')]
    num_bursts: Option<u32>,

    /// hex digits for the exact message content
    #[clap(short = 'P')]
    payload: Option<String>,

    /// milliseconds between bursts [1000]
    #[clap(short = 'p')]
    pause: Option<u64>,

    /// '-q' for progress dots only, '-qq' for silence
    #[clap(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,

    /// SO_SNDBUF size, 0 for the OS default [65536]
    #[clap(short = 'S')]
    send_buffer_size: Option<usize>,

    /// milliseconds to wait before sending 'stat', 0 for no 'stat' [0]
    #[clap(short = 's')]
    stat_pause: Option<u64>,

    /// TCP instead of multicast
    #[clap(short = 't', default_value_t = false)]
    tcp: bool,

    /// unicast UDP instead of multicast
    #[clap(short = 'u', default_value_t = false)]
    unicast_udp: bool,

    /// message framing on TCP: single-read or length-prefixed
    #[clap(long, default_value = "single-read")]
    framing: String,

    /// milliseconds to wait after the initial 'echo'
    #[clap(long, default_value_t = 1000)]
    settle_delay: u64,

    #[clap(long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

impl Args {
    fn to_config(&self, reporter: &dyn Reporter) -> anyhow::Result<SenderConfig> {
        let endpoint = TransportEndpoint::for_sender(self.group, self.port, self.tcp, self.unicast_udp)?
            .with_ttl(self.ttl.unwrap_or(DEFAULT_MULTICAST_TTL))
            .with_interface(self.interface);

        let mut config = SenderConfig::new(endpoint);
        if let Some(preset) = self.preset {
            TestPreset::from_number(preset)?.apply(&mut config);
        }

        if let Some(burst_count) = self.burst_count {
            config.burst_count = burst_count;
        }
        if self.decimal {
            config.content = MessageContent::Sequenced { decimal: true };
        }
        if let Some(loops) = self.loops {
            config.loops = loops;
        }
        if let Some(payload) = &self.payload {
            config.content = MessageContent::Payload(parse_hex_payload(payload)?);
            config.length = MessageLength::FromContent;
        }
        match self.msg_len {
            None => {}
            Some(0) => config.length = MessageLength::FromContent,
            Some(len) if len > MAX_MESSAGE_LEN => {
                reporter.report(&format!("warning, msg_len lowered to {}", MAX_MESSAGE_LEN));
                config.length = MessageLength::Fixed(MAX_MESSAGE_LEN);
            }
            Some(len) => config.length = MessageLength::Fixed(len),
        }
        if let Some(num_bursts) = self.num_bursts {
            config.num_bursts = num_bursts;
        }
        if let Some(pause) = self.pause {
            config.pause = Duration::from_millis(pause);
        }
        if self.quiet > 0 {
            config.quiet = SenderQuiet::from_level(self.quiet);
        }
        if let Some(send_buffer_size) = self.send_buffer_size {
            config.send_buffer_size = send_buffer_size;
            config.send_buffer_explicit = true;
        }
        if let Some(stat_pause) = self.stat_pause {
            config.stat_pause = Duration::from_millis(stat_pause);
        }
        config.framing = self.framing.parse()?;
        config.settle_delay = Duration::from_millis(self.settle_delay);

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let reporter = ConsoleReporter::new();
    let config = args.to_config(&reporter)?;
    reporter.report(&format!("Equiv cmd line: {}", config));
    if let Some(duration) = nominal_duration(&config) {
        info!("each test loop takes at least {:?}", duration);
    }

    let mut session = open_sender_session(&config, &reporter).await?;
    let summary = run_traffic_generator(&config, session.channel.as_mut(), &reporter).await?;
    info!("sent {} messages in {} test loop(s)", summary.messages_sent, summary.loops);
    Ok(())
}
