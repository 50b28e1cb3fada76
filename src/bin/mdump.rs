use std::net::Ipv4Addr;
use std::path::PathBuf;
use clap::Parser;
use clap_derive::Parser;
use mtools::endpoint::TransportEndpoint;
use mtools::membership::socket_session::open_receiver_session;
use mtools::membership::source_filter::SourceFilter;
use mtools::output::{ConsoleReporter, Reporter};
use mtools::receiver::receiver_config::{QuietLevel, ReceiverConfig};
use mtools::receiver::verification_loop::VerificationLoop;
use tracing::{debug, Level};

/// Receives messages on a multicast group (or unicast / TCP port), dumps them, and reports
///  loss when msend's 'stat' message arrives
#[derive(Parser)]
#[clap(name = "mdump")]
struct Args {
    group: Ipv4Addr,
    port: u16,
    /// local interface for joining the group
    interface: Option<Ipv4Addr>,
    /// IGMPv3 source filter: '+' (include) or '-' (exclude), then comma separated addresses
    #[clap(allow_hyphen_values = true)]
    sources: Option<String>,

    /// mirror output to this file
    #[clap(short = 'o')]
    output: Option<PathBuf>,

    /// append raw received payloads to this file
    #[clap(short = 'O')]
    dump: Option<PathBuf>,

    /// milliseconds to pause after each message, optionally '/num' for the first num messages only [0]
    #[clap(short = 'p')]
    pause: Option<String>,

    /// 0 for a full dump, 1 for one line per message, 2 for silence [0]
    #[clap(short = 'Q')]
    quiet_level: Option<u8>,

    /// same as -Q2
    #[clap(short = 'q', default_value_t = false)]
    quiet: bool,

    /// SO_RCVBUF size, 0 for the OS default [4194304]
    #[clap(short = 'r')]
    receive_buffer_size: Option<usize>,

    /// stop when a 'stat' message is received
    #[clap(short = 's', default_value_t = false)]
    stop_on_stat: bool,

    /// TCP (group must be 0.0.0.0)
    #[clap(short = 't', default_value_t = false)]
    tcp: bool,

    /// unicast UDP
    #[clap(short = 'u', default_value_t = false)]
    unicast_udp: bool,

    /// verify message sequence numbers
    #[clap(short = 'v', default_value_t = false)]
    verify: bool,

    /// message framing on TCP: single-read or length-prefixed
    #[clap(long, default_value = "single-read")]
    framing: String,

    #[clap(long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<ReceiverConfig> {
        let endpoint = TransportEndpoint::for_receiver(self.group, self.port, self.tcp, self.unicast_udp)?
            .with_interface(self.interface);

        let mut config = ReceiverConfig::new(endpoint);
        if let Some(sources) = &self.sources {
            config.source_filter = SourceFilter::parse(sources)?;
        }
        if let Some(pause) = &self.pause {
            config.pacing = pause.parse()?;
        }
        if let Some(level) = self.quiet_level {
            config.quiet = QuietLevel::from_level(level);
        }
        if self.quiet {
            config.quiet = QuietLevel::Silent;
        }
        if let Some(size) = self.receive_buffer_size {
            config.receive_buffer_size = size;
        }
        config.stop_on_stat = self.stop_on_stat;
        config.verify_sequence = self.verify;
        config.framing = self.framing.parse()?;
        config.output_file = self.output.clone();
        config.dump_file = self.dump.clone();

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

    let config = args.to_config()?;
    let reporter = match &config.output_file {
        Some(path) => ConsoleReporter::with_mirror(path)?,
        None => ConsoleReporter::new(),
    };
    reporter.report(&format!("Equiv cmd line: {}", config));

    let mut session = open_receiver_session(&config, &reporter).await?;
    debug!("receive buffer: {:?}", session.buffer);

    let mut verification = VerificationLoop::new(&config, &reporter)?;
    let reason = verification.run(session.channel.as_mut()).await?;
    debug!("receiver stopped: {:?}", reason);
    Ok(())
}
