use std::net::Ipv4Addr;
use std::time::Duration;
use mtools::endpoint::{TransportEndpoint, TransportKind};
use mtools::membership::join_plan::JoinPlan;
use mtools::membership::source_filter::SourceFilter;
use mtools::membership::socket_session::{open_receiver_session, open_sender_session};
use mtools::receiver::receiver_config::{QuietLevel, ReceiverConfig};
use mtools::receiver::verification_loop::{StopReason, VerificationLoop};
use mtools::sender::sender_config::{SenderConfig, SenderQuiet};
use mtools::sender::traffic_generator::run_traffic_generator;
use mtools::session::framing::Framing;
use mtools::test_util::free_local_port;
use mtools::test_util::reporter::RecordingReporter;

fn sender_config(endpoint: TransportEndpoint) -> SenderConfig {
    let mut config = SenderConfig::new(endpoint);
    config.burst_count = 3;
    config.num_bursts = 2;
    config.pause = Duration::from_millis(10);
    config.stat_pause = Duration::from_millis(50);
    config.settle_delay = Duration::from_millis(20);
    config.quiet = SenderQuiet::Silent;
    config
}

fn receiver_config(endpoint: TransportEndpoint) -> ReceiverConfig {
    let mut config = ReceiverConfig::new(endpoint);
    config.quiet = QuietLevel::Silent;
    config.verify_sequence = true;
    config.stop_on_stat = true;
    config.receive_buffer_size = 0;
    config
}

#[tokio::test]
async fn test_unicast_udp_session() {
    let port = free_local_port();

    let receiver_config = receiver_config(TransportEndpoint::for_receiver(Ipv4Addr::LOCALHOST, port, false, false).unwrap());
    assert_eq!(receiver_config.endpoint.kind, TransportKind::UnicastUdp);
    let sender_config = sender_config(TransportEndpoint::for_sender(Ipv4Addr::LOCALHOST, port, false, true).unwrap());

    let receiver_reporter = RecordingReporter::new();
    let sender_reporter = RecordingReporter::new();

    let mut receiver_session = open_receiver_session(&receiver_config, &receiver_reporter).await.unwrap();
    assert!(receiver_session.membership.is_none());
    let mut sender_session = open_sender_session(&sender_config, &sender_reporter).await.unwrap();

    let mut verification = VerificationLoop::new(&receiver_config, &receiver_reporter).unwrap();
    let (sent, received) = tokio::join!(
        run_traffic_generator(&sender_config, sender_session.channel.as_mut(), &sender_reporter),
        verification.run(receiver_session.channel.as_mut()),
    );

    assert_eq!(sent.unwrap().messages_sent, 6);
    assert_eq!(received.unwrap(), StopReason::StatReceived);

    let lines = receiver_reporter.lines();
    assert!(lines[0].starts_with("echo sender equiv cmd: msend -b3 -m0 -n2 -p10 -qq -s50"), "{:?}", lines);
    assert!(receiver_reporter.has_line("6 msgs sent, 6 received (not including 'stat')"), "{:?}", lines);
    assert!(receiver_reporter.has_line("0.000000% loss"));
    assert!(!receiver_reporter.has_line_starting_with("Expected seq"));
}

/// Multicast over the loopback interface, restricted by the given source filter. Returns the
///  receiver's report lines, or `None` if nothing arrived before the sender was done.
async fn loopback_multicast_session(group: Ipv4Addr, source_filter: &str) -> (Option<JoinPlan>, Option<Vec<String>>) {
    let port = free_local_port();

    let mut receiver_config = receiver_config(TransportEndpoint::for_receiver(group, port, false, false).unwrap()
        .with_interface(Some(Ipv4Addr::LOCALHOST)));
    receiver_config.source_filter = SourceFilter::parse(source_filter).unwrap();
    let sender_config = sender_config(TransportEndpoint::for_sender(group, port, false, false).unwrap()
        .with_interface(Some(Ipv4Addr::LOCALHOST)));

    let receiver_reporter = RecordingReporter::new();
    let sender_reporter = RecordingReporter::new();

    let mut receiver_session = open_receiver_session(&receiver_config, &receiver_reporter).await.unwrap();
    let mut sender_session = open_sender_session(&sender_config, &sender_reporter).await.unwrap();

    let mut verification = VerificationLoop::new(&receiver_config, &receiver_reporter).unwrap();
    let (sent, received) = tokio::join!(
        run_traffic_generator(&sender_config, sender_session.channel.as_mut(), &sender_reporter),
        tokio::time::timeout(Duration::from_millis(1000), verification.run(receiver_session.channel.as_mut())),
    );
    assert_eq!(sent.unwrap().messages_sent, 6);

    match received {
        Ok(reason) => {
            assert_eq!(reason.unwrap(), StopReason::StatReceived);
            (receiver_session.membership, Some(receiver_reporter.lines()))
        }
        Err(_) => {
            assert_eq!(verification.state().received(), 0);
            assert!(receiver_reporter.lines().is_empty(), "{:?}", receiver_reporter.lines());
            (receiver_session.membership, None)
        }
    }
}

#[tokio::test]
async fn test_loopback_multicast_include_source() {
    let (membership, lines) = loopback_multicast_session(Ipv4Addr::new(239, 255, 77, 1), "+127.0.0.1").await;
    assert_eq!(membership, Some(JoinPlan::SourceSpecific { sources: vec![Ipv4Addr::LOCALHOST] }));

    let lines = lines.unwrap();
    assert!(lines.contains(&"6 msgs sent, 6 received (not including 'stat')".to_string()), "{:?}", lines);
    assert!(lines.contains(&"0.000000% loss".to_string()), "{:?}", lines);
}

#[tokio::test]
async fn test_loopback_multicast_exclude_source() {
    let (membership, lines) = loopback_multicast_session(Ipv4Addr::new(239, 255, 77, 2), "-127.0.0.1").await;
    assert_eq!(membership, Some(JoinPlan::AnySource { excluded: vec![Ipv4Addr::LOCALHOST] }));
    assert_eq!(lines, None);
}

#[tokio::test]
async fn test_loopback_multicast_exclude_other_source() {
    let (_, lines) = loopback_multicast_session(Ipv4Addr::new(239, 255, 77, 3), "-10.9.9.9").await;
    assert!(lines.unwrap().contains(&"0.000000% loss".to_string()));
}

#[tokio::test]
async fn test_tcp_session() {
    let port = free_local_port();

    let mut receiver_config = receiver_config(TransportEndpoint::for_receiver(Ipv4Addr::UNSPECIFIED, port, true, false).unwrap());
    receiver_config.framing = Framing::LengthPrefixed;
    let mut sender_config = sender_config(TransportEndpoint::new(Ipv4Addr::LOCALHOST, port, TransportKind::Tcp));
    sender_config.framing = Framing::LengthPrefixed;

    let receiver_reporter = RecordingReporter::new();
    let sender_reporter = RecordingReporter::new();

    let (receiver_session, sender_session) = tokio::join!(
        open_receiver_session(&receiver_config, &receiver_reporter),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            open_sender_session(&sender_config, &sender_reporter).await
        },
    );
    let mut receiver_session = receiver_session.unwrap();
    let mut sender_session = sender_session.unwrap();

    let mut verification = VerificationLoop::new(&receiver_config, &receiver_reporter).unwrap();
    let (sent, received) = tokio::join!(
        run_traffic_generator(&sender_config, sender_session.channel.as_mut(), &sender_reporter),
        verification.run(receiver_session.channel.as_mut()),
    );

    assert_eq!(sent.unwrap().messages_sent, 6);
    assert_eq!(received.unwrap(), StopReason::StatReceived);
    assert!(receiver_reporter.has_line("6 msgs sent, 6 received (not including 'stat')"), "{:?}", receiver_reporter.lines());
}

#[tokio::test]
async fn test_tcp_receiver_rejects_group_address() {
    let config = receiver_config(TransportEndpoint::new(Ipv4Addr::new(239, 1, 2, 3), 12000, TransportKind::Tcp));
    let reporter = RecordingReporter::new();
    assert!(open_receiver_session(&config, &reporter).await.is_err());
}
