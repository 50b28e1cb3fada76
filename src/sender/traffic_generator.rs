use std::time::Duration;
use anyhow::Context;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use crate::output::Reporter;
use crate::sender::message_composer::MessageComposer;
use crate::sender::sender_config::{SenderConfig, SenderQuiet};
use crate::session::channel::MessageChannel;
use crate::session::session_message::{encode_echo, encode_stat};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SendSummary {
    pub loops: u32,
    /// data messages over all loops, not including echo and stat messages
    pub messages_sent: u64,
}

/// Runs the configured number of test loops. Each loop announces itself with an echo message,
///  sends the configured bursts of data messages and optionally finishes with a stat message
///  so that the receiver can compute loss.
///
/// Any send failure ends the test with an error.
pub async fn run_traffic_generator(config: &SenderConfig, channel: &mut dyn MessageChannel, reporter: &dyn Reporter) -> anyhow::Result<SendSummary> {
    let mut composer = MessageComposer::new(config.content.clone(), config.length);

    let mut summary = SendSummary::default();
    for loop_num in 0..config.loops {
        debug!("starting test loop {} of {}", loop_num + 1, config.loops);
        summary.messages_sent += run_test(config, &mut composer, channel, reporter).await?;
        summary.loops += 1;
    }
    Ok(summary)
}

async fn run_test(config: &SenderConfig, composer: &mut MessageComposer, channel: &mut dyn MessageChannel, reporter: &dyn Reporter) -> anyhow::Result<u64> {
    let verbose = config.quiet != SenderQuiet::Silent;

    if verbose && config.num_bursts != 0 {
        match config.message_len() {
            None => reporter.report(&format!("Sending {} bursts of {} variable-length messages", config.num_bursts, config.burst_count)),
            Some(len) => reporter.report(&format!("Sending {} bursts of {} {}-byte messages", config.num_bursts, config.burst_count, len)),
        }
    }

    let announcement = config.announcement();
    info!("announcing test run: {}", announcement);
    let echo = encode_echo(&announcement);
    let sent = channel.send_message(&echo).await
        .context("send echo")?;
    check_send_len(reporter, sent, echo.len());
    sleep(config.settle_delay).await;

    let mut msg_num: u64 = 0;
    let mut burst_num: u32 = 0;
    while config.num_bursts == 0 || burst_num < config.num_bursts {
        if !config.pause.is_zero() && msg_num > 0 {
            sleep(config.pause).await;
        }

        for i in 0..config.burst_count {
            let message = composer.compose(msg_num);
            if i == 0 {
                report_burst_start(config, reporter, message.len());
            }

            let sent = channel.send_message(message).await
                .context("send")?;
            check_send_len(reporter, sent, message.len());

            msg_num += 1;
        }
        burst_num += 1;
    }

    if config.stat_pause.is_zero() {
        if verbose {
            reporter.report(&format!("{} messages sent", msg_num));
        }
        return Ok(msg_num);
    }

    if verbose {
        reporter.report("Pausing before sending 'stat'");
    }
    sleep(config.stat_pause).await;
    if verbose {
        reporter.report("Sending stat");
    }

    let stat = encode_stat(msg_num);
    let sent = channel.send_message(&stat).await
        .context("send stat")?;
    check_send_len(reporter, sent, stat.len());

    if verbose {
        reporter.report(&format!("{} messages sent (not including 'stat')", msg_num));
    }
    Ok(msg_num)
}

fn report_burst_start(config: &SenderConfig, reporter: &dyn Reporter, message_len: usize) {
    match config.quiet {
        SenderQuiet::Verbose if config.burst_count == 1 => reporter.report(&format!("Sending {} bytes", message_len)),
        SenderQuiet::Verbose => reporter.report(&format!("Sending burst of {} msgs", config.burst_count)),
        SenderQuiet::Progress => reporter.progress("."),
        SenderQuiet::Silent => {}
    }
}

/// A datagram socket either sends everything or fails, so a short send is unexpected - but it
///  does not invalidate the test run
fn check_send_len(reporter: &dyn Reporter, sent: usize, expected: usize) {
    if sent != expected {
        warn!("send returned {}, expected {}", sent, expected);
        reporter.report(&format!("WARNING: send returned {}, expected {}", sent, expected));
    }
}

/// Total virtual duration of one test loop without any send time, for diagnostics
pub fn nominal_duration(config: &SenderConfig) -> Option<Duration> {
    if config.num_bursts == 0 {
        return None;
    }
    let pauses = config.pause * (config.num_bursts - 1);
    Some(config.settle_delay + pauses + config.stat_pause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::time::Instant;
    use crate::endpoint::{TransportEndpoint, TransportKind};
    use crate::sender::message_composer::{MessageContent, MessageLength};
    use crate::session::channel::MockMessageChannel;
    use crate::test_util::channel::ScriptedChannel;
    use crate::test_util::reporter::RecordingReporter;

    fn config(burst_count: u32, num_bursts: u32) -> SenderConfig {
        let mut config = SenderConfig::new(TransportEndpoint::new(Ipv4Addr::new(239, 1, 2, 3), 12000, TransportKind::MulticastUdp));
        config.burst_count = burst_count;
        config.num_bursts = num_bursts;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_bursts_with_stat() {
        let mut config = config(3, 2);
        config.stat_pause = Duration::from_millis(2000);

        let mut channel = ScriptedChannel::new();
        let sent = channel.sent();
        let reporter = RecordingReporter::new();

        let summary = run_traffic_generator(&config, &mut channel, &reporter).await.unwrap();
        assert_eq!(summary, SendSummary { loops: 1, messages_sent: 6 });

        let sent = sent.take().await;
        assert_eq!(sent.len(), 8);
        assert_eq!(sent[0], encode_echo(&config.announcement()));
        for ordinal in 0..6 {
            assert_eq!(sent[ordinal + 1], format!("Message {:x}", ordinal).into_bytes());
        }
        assert_eq!(sent[7], b"stat 6".to_vec());

        assert_eq!(reporter.lines(), vec![
            "Sending 2 bursts of 3 variable-length messages".to_string(),
            "Sending burst of 3 msgs".to_string(),
            "Sending burst of 3 msgs".to_string(),
            "Pausing before sending 'stat'".to_string(),
            "Sending stat".to_string(),
            "6 messages sent (not including 'stat')".to_string(),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses() {
        let mut config = config(1, 3);
        config.pause = Duration::from_millis(500);
        config.stat_pause = Duration::from_millis(2000);

        let mut channel = ScriptedChannel::new();
        let reporter = RecordingReporter::new();

        let start = Instant::now();
        run_traffic_generator(&config, &mut channel, &reporter).await.unwrap();
        let elapsed = start.elapsed();

        // settle delay, two pauses between three bursts, stat pause
        let expected = Duration::from_millis(1000 + 2 * 500 + 2000);
        assert_eq!(nominal_duration(&config), Some(expected));
        assert!(elapsed >= expected, "{:?}", elapsed);
        assert!(elapsed < expected + Duration::from_millis(100), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_stat() {
        let mut config = config(1, 2);
        config.length = MessageLength::Fixed(20);

        let mut channel = ScriptedChannel::new();
        let sent = channel.sent();
        let reporter = RecordingReporter::new();

        run_traffic_generator(&config, &mut channel, &reporter).await.unwrap();

        let sent = sent.take().await;
        assert_eq!(sent.len(), 3);
        assert!(sent[1..].iter().all(|m| m.len() == 20));
        assert_eq!(reporter.lines(), vec![
            "Sending 2 bursts of 1 20-byte messages".to_string(),
            "Sending 20 bytes".to_string(),
            "Sending 20 bytes".to_string(),
            "2 messages sent".to_string(),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_and_silent() {
        let mut config = config(5, 4);
        config.quiet = SenderQuiet::Progress;
        let reporter = RecordingReporter::new();
        run_traffic_generator(&config, &mut ScriptedChannel::new(), &reporter).await.unwrap();
        assert_eq!(reporter.progress_marks(), "....");
        assert_eq!(reporter.lines().len(), 2);

        config.quiet = SenderQuiet::Silent;
        let reporter = RecordingReporter::new();
        run_traffic_generator(&config, &mut ScriptedChannel::new(), &reporter).await.unwrap();
        assert_eq!(reporter.progress_marks(), "");
        assert!(reporter.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_restart_the_sequence() {
        let mut config = config(1, 2);
        config.loops = 2;
        config.stat_pause = Duration::from_millis(10);
        config.content = MessageContent::Sequenced { decimal: true };

        let mut channel = ScriptedChannel::new();
        let sent = channel.sent();
        let reporter = RecordingReporter::new();

        let summary = run_traffic_generator(&config, &mut channel, &reporter).await.unwrap();
        assert_eq!(summary, SendSummary { loops: 2, messages_sent: 4 });

        let sent = sent.take().await;
        let single_run = vec![
            encode_echo(&config.announcement()),
            b"Message 0".to_vec(),
            b"Message 1".to_vec(),
            b"stat 2".to_vec(),
        ];
        assert_eq!(sent[..4], single_run[..]);
        assert_eq!(sent[4..], single_run[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_send_is_a_warning() {
        let config = config(1, 2);

        let mut channel = ScriptedChannel::new().accepting_only(3);
        let sent = channel.sent();
        let reporter = RecordingReporter::new();

        run_traffic_generator(&config, &mut channel, &reporter).await.unwrap();
        assert_eq!(sent.len().await, 3);

        let echo_len = encode_echo(&config.announcement()).len();
        assert!(reporter.has_line(&format!("WARNING: send returned 3, expected {}", echo_len)));
        assert_eq!(reporter.lines().iter().filter(|l| *l == "WARNING: send returned 3, expected 9").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_error_is_fatal() {
        let config = config(1, 5);

        let mut channel = MockMessageChannel::new();
        let mut num_calls = 0;
        channel.expect_send_message()
            .times(2)
            .returning(move |_| {
                num_calls += 1;
                if num_calls == 1 {
                    Ok(10)
                }
                else {
                    Err(anyhow::anyhow!("network unreachable"))
                }
            });

        let reporter = RecordingReporter::new();
        assert!(run_traffic_generator(&config, &mut channel, &reporter).await.is_err());
    }

    #[test]
    fn test_nominal_duration_unbounded() {
        assert_eq!(nominal_duration(&config(1, 0)), None);
    }
}
