use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::Context;
use crate::endpoint::TransportEndpoint;
use crate::membership::join_plan::JoinPlan;
use crate::membership::source_filter::SourceFilter;
use crate::session::framing::Framing;

pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// How much is reported per received message
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum QuietLevel {
    /// header line plus a hex dump of the payload
    #[default]
    FullDump,
    /// one summary line per message
    Summary,
    Silent,
}

impl QuietLevel {
    pub fn from_level(level: u8) -> QuietLevel {
        match level {
            0 => QuietLevel::FullDump,
            1 => QuietLevel::Summary,
            _ => QuietLevel::Silent,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            QuietLevel::FullDump => 0,
            QuietLevel::Summary => 1,
            QuietLevel::Silent => 2,
        }
    }
}

/// Artificial slowness after data messages, to simulate a slow consumer
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PacingPolicy {
    pub pause: Duration,
    /// pause only for the first N data messages, 0 for all of them
    pub first_n: u64,
}

impl PacingPolicy {
    pub fn should_pause(&self, num_received: u64) -> bool {
        if self.pause.is_zero() {
            return false;
        }
        self.first_n == 0 || num_received < self.first_n
    }
}

/// `pause_ms[/num]`
impl FromStr for PacingPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pause, first_n) = match s.split_once('/') {
            Some((pause, first_n)) => (pause, Some(first_n)),
            None => (s, None),
        };

        let pause_ms: u64 = pause.trim().parse()
            .with_context(|| format!("invalid pause {:?}", pause))?;
        let first_n = match first_n {
            Some(n) => n.trim().parse()
                .with_context(|| format!("invalid number of paused messages {:?}", n))?,
            None => 0,
        };

        Ok(PacingPolicy {
            pause: Duration::from_millis(pause_ms),
            first_n,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub endpoint: TransportEndpoint,
    /// applied only for multicast, tolerated and ignored otherwise
    pub source_filter: Option<SourceFilter>,
    /// 0 for the OS default
    pub receive_buffer_size: usize,
    pub pacing: PacingPolicy,
    pub quiet: QuietLevel,
    pub verify_sequence: bool,
    pub stop_on_stat: bool,
    pub framing: Framing,
    pub output_file: Option<PathBuf>,
    pub dump_file: Option<PathBuf>,
}

impl ReceiverConfig {
    pub fn new(endpoint: TransportEndpoint) -> ReceiverConfig {
        ReceiverConfig {
            endpoint,
            source_filter: None,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            pacing: PacingPolicy::default(),
            quiet: QuietLevel::default(),
            verify_sequence: false,
            stop_on_stat: false,
            framing: Framing::default(),
            output_file: None,
            dump_file: None,
        }
    }

    /// Semantic checks that must pass before any socket is created
    pub fn validate(&self) -> anyhow::Result<()> {
        self.endpoint.validate_for_receive()?;
        if self.endpoint.kind.is_multicast() {
            JoinPlan::for_filter(self.source_filter.as_ref())?;
        }
        Ok(())
    }

    /// The source filter if it is applicable to the transport
    pub fn effective_source_filter(&self) -> Option<&SourceFilter> {
        if self.endpoint.kind.is_multicast() {
            self.source_filter.as_ref()
        }
        else {
            None
        }
    }
}

/// renders the equivalent command line
impl Display for ReceiverConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "mdump")?;
        if let Some(output_file) = &self.output_file {
            write!(f, " -o {}", output_file.display())?;
        }
        if let Some(dump_file) = &self.dump_file {
            write!(f, " -O {}", dump_file.display())?;
        }
        write!(f, " -p{}", self.pacing.pause.as_millis())?;
        if self.pacing.first_n > 0 {
            write!(f, "/{}", self.pacing.first_n)?;
        }
        write!(f, " -Q{} -r{}", self.quiet.level(), self.receive_buffer_size)?;
        if self.stop_on_stat {
            write!(f, " -s")?;
        }
        match self.endpoint.kind {
            crate::endpoint::TransportKind::Tcp => write!(f, " -t")?,
            crate::endpoint::TransportKind::UnicastUdp if self.endpoint.addr.is_multicast() => write!(f, " -u")?,
            _ => {}
        }
        if self.verify_sequence {
            write!(f, " -v")?;
        }
        if self.framing != Framing::default() {
            write!(f, " --framing {}", self.framing)?;
        }
        write!(f, " {} {}", self.endpoint.addr, self.endpoint.port)?;
        if let Some(interface) = self.endpoint.interface {
            write!(f, " {}", interface)?;
        }
        if let Some(filter) = &self.source_filter {
            if self.endpoint.interface.is_none() {
                write!(f, " 0.0.0.0")?;
            }
            write!(f, " {}", filter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::TransportKind;
    use rstest::rstest;
    use std::net::Ipv4Addr;

    fn multicast_config() -> ReceiverConfig {
        ReceiverConfig::new(TransportEndpoint::new(Ipv4Addr::new(239, 1, 2, 3), 12000, TransportKind::MulticastUdp))
    }

    #[rstest]
    #[case::pause_only("10", Duration::from_millis(10), 0)]
    #[case::pause_and_count("250/5", Duration::from_millis(250), 5)]
    #[case::zero("0", Duration::ZERO, 0)]
    fn test_parse_pacing(#[case] s: &str, #[case] expected_pause: Duration, #[case] expected_first_n: u64) {
        let pacing = s.parse::<PacingPolicy>().unwrap();
        assert_eq!(pacing.pause, expected_pause);
        assert_eq!(pacing.first_n, expected_first_n);
    }

    #[rstest]
    #[case::not_a_number("abc")]
    #[case::bad_count("10/x")]
    #[case::negative("-5")]
    fn test_parse_pacing_invalid(#[case] s: &str) {
        assert!(s.parse::<PacingPolicy>().is_err());
    }

    #[rstest]
    #[case::no_pause(0, 0, 0, false)]
    #[case::always(10, 0, 1_000_000, true)]
    #[case::first_n_inside(10, 3, 2, true)]
    #[case::first_n_boundary(10, 3, 3, false)]
    fn test_should_pause(#[case] pause_ms: u64, #[case] first_n: u64, #[case] num_received: u64, #[case] expected: bool) {
        let pacing = PacingPolicy { pause: Duration::from_millis(pause_ms), first_n };
        assert_eq!(pacing.should_pause(num_received), expected);
    }

    #[rstest]
    #[case::full(0, QuietLevel::FullDump)]
    #[case::summary(1, QuietLevel::Summary)]
    #[case::silent(2, QuietLevel::Silent)]
    #[case::beyond(7, QuietLevel::Silent)]
    fn test_quiet_level(#[case] level: u8, #[case] expected: QuietLevel) {
        assert_eq!(QuietLevel::from_level(level), expected);
    }

    #[test]
    fn test_validate_include_without_sources() {
        let mut config = multicast_config();
        config.source_filter = Some(SourceFilter::include(vec![]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_exclude_without_sources() {
        let mut config = multicast_config();
        config.source_filter = Some(SourceFilter::exclude(vec![]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_filter_ignored_for_tcp() {
        let mut config = ReceiverConfig::new(TransportEndpoint::new(Ipv4Addr::UNSPECIFIED, 12000, TransportKind::Tcp));
        config.source_filter = Some(SourceFilter::include(vec![]));
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_source_filter(), None);
    }

    #[test]
    fn test_validate_tcp_with_group() {
        let config = ReceiverConfig::new(TransportEndpoint::new(Ipv4Addr::new(239, 1, 2, 3), 12000, TransportKind::Tcp));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equivalent_command_line() {
        let mut config = multicast_config();
        config.verify_sequence = true;
        config.stop_on_stat = true;
        config.pacing = PacingPolicy { pause: Duration::from_millis(5), first_n: 10 };
        config.source_filter = Some(SourceFilter::include(vec![Ipv4Addr::new(10, 0, 0, 1)]));

        assert_eq!(config.to_string(), "mdump -p5/10 -Q0 -r4194304 -s -v 239.1.2.3 12000 0.0.0.0 +10.0.0.1");
    }
}
