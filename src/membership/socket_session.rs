use std::net::{Ipv4Addr, SocketAddr};
use anyhow::Context;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::{TcpListener, TcpSocket, UdpSocket};
use tracing::{debug, info};
use crate::endpoint::{TransportEndpoint, TransportKind};
use crate::membership::buffer_size::{negotiate_buffer_size, BufferDirection, BufferNegotiation};
use crate::membership::join_plan::JoinPlan;
use crate::output::Reporter;
use crate::receiver::receiver_config::ReceiverConfig;
use crate::sender::sender_config::{SenderConfig, DEFAULT_SEND_BUFFER_SIZE};
use crate::session::channel::{DatagramChannel, MessageChannel, StreamChannel};

/// A fully configured socket, ready for exchanging messages. It is owned by exactly one
///  session loop.
pub struct SocketSession {
    pub channel: Box<dyn MessageChannel>,
    pub local_addr: SocketAddr,
    pub buffer: BufferNegotiation,
    /// the group join that was performed, if any
    pub membership: Option<JoinPlan>,
}

/// Creates the receive side socket: UDP bound to the group (or unicast address) with the
///  source filter applied, or a TCP listener that returns once the first connection is
///  accepted.
pub async fn open_receiver_session(config: &ReceiverConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    config.validate()?;

    if config.source_filter.is_some() && config.effective_source_filter().is_none() {
        reporter.report("NOTE: source filter is ignored for non-multicast transports");
    }

    match config.endpoint.kind {
        TransportKind::Tcp => open_tcp_receiver(config, reporter).await,
        TransportKind::MulticastUdp | TransportKind::UnicastUdp => open_udp_receiver(config, reporter),
    }
}

fn open_udp_receiver(config: &ReceiverConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    let endpoint = &config.endpoint;

    let join_plan = if endpoint.kind.is_multicast() {
        Some(JoinPlan::for_filter(config.effective_source_filter())?)
    }
    else {
        None
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("socket")?;
    let buffer = negotiate_buffer_size(&socket, BufferDirection::Receive, config.receive_buffer_size, reporter)?;
    socket.set_reuse_address(true)
        .context("setsockopt SO_REUSEADDR")?;

    let local_addr = bind_udp(&socket, endpoint)?;

    if let Some(join_plan) = &join_plan {
        join_plan.apply(&socket, endpoint.addr, endpoint.join_interface())?;
    }

    socket.set_nonblocking(true)
        .context("set non-blocking")?;
    let socket = UdpSocket::from_std(socket.into())
        .context("register socket with runtime")?;

    info!("receiving on {} ({:?})", local_addr, endpoint.kind);
    Ok(SocketSession {
        channel: Box::new(DatagramChannel::new(socket, None)),
        local_addr,
        buffer,
        membership: join_plan,
    })
}

/// Binding to the group address filters out unrelated traffic to the same port, but not every
///  platform supports it. Fall back to the wildcard address then.
fn bind_udp(socket: &Socket, endpoint: &TransportEndpoint) -> anyhow::Result<SocketAddr> {
    let addr = endpoint.socket_addr();
    match socket.bind(&addr.into()) {
        Ok(()) => Ok(addr),
        Err(e) if endpoint.kind.is_multicast() => {
            debug!("binding to {} failed ({}), binding to the wildcard address", addr, e);
            let wildcard = SocketAddr::from((Ipv4Addr::UNSPECIFIED, endpoint.port));
            socket.bind(&wildcard.into())
                .context("bind")?;
            Ok(wildcard)
        }
        Err(e) => Err(e).context("bind"),
    }
}

async fn open_tcp_receiver(config: &ReceiverConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    let endpoint = &config.endpoint;

    let listen_socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .context("socket")?;
    listen_socket.set_reuse_address(true)
        .context("setsockopt SO_REUSEADDR")?;
    listen_socket.bind(&endpoint.socket_addr().into())
        .context("bind")?;
    listen_socket.listen(1)
        .context("listen")?;
    listen_socket.set_nonblocking(true)
        .context("set non-blocking")?;
    let listener = TcpListener::from_std(listen_socket.into())
        .context("register socket with runtime")?;

    info!("waiting for a connection on {}", endpoint.socket_addr());
    let (stream, peer) = listener.accept().await
        .context("accept")?;
    info!("accepted connection from {}", peer);

    let local_addr = stream.local_addr()?;
    let buffer = negotiate_buffer_size(&*SockRef::from(&stream), BufferDirection::Receive, config.receive_buffer_size, reporter)?;

    Ok(SocketSession {
        channel: Box::new(StreamChannel::new(stream, config.framing)),
        local_addr,
        buffer,
        membership: None,
    })
}

/// Creates the send side socket: UDP with TTL and outgoing interface for multicast, or a TCP
///  connection to the receiver.
pub async fn open_sender_session(config: &SenderConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    config.validate()?;

    let session = match config.endpoint.kind {
        TransportKind::Tcp => open_tcp_sender(config, reporter).await?,
        TransportKind::MulticastUdp | TransportKind::UnicastUdp => open_udp_sender(config, reporter)?,
    };

    if !config.send_buffer_explicit && session.buffer.os_default < DEFAULT_SEND_BUFFER_SIZE {
        reporter.report(&format!("NOTE: system default SO_SNDBUF only {} ({} preferred)", session.buffer.os_default, DEFAULT_SEND_BUFFER_SIZE));
    }
    Ok(session)
}

fn open_udp_sender(config: &SenderConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    let endpoint = &config.endpoint;

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("socket")?;
    let buffer = negotiate_buffer_size(&socket, BufferDirection::Send, config.send_buffer_size, reporter)?;

    if endpoint.kind.is_multicast() {
        socket.set_multicast_ttl_v4(endpoint.ttl as u32)
            .context("setsockopt - TTL")?;
    }
    if let Some(interface) = endpoint.interface {
        socket.set_multicast_if_v4(&interface)
            .context("setsockopt - IP_MULTICAST_IF")?;
    }

    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())
        .context("bind")?;
    let local_addr = socket.local_addr()
        .context("getsockname")?
        .as_socket()
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    socket.set_nonblocking(true)
        .context("set non-blocking")?;
    let socket = UdpSocket::from_std(socket.into())
        .context("register socket with runtime")?;

    info!("sending to {} ({:?}) from {}", endpoint.socket_addr(), endpoint.kind, local_addr);
    Ok(SocketSession {
        channel: Box::new(DatagramChannel::new(socket, Some(endpoint.socket_addr()))),
        local_addr,
        buffer,
        membership: None,
    })
}

async fn open_tcp_sender(config: &SenderConfig, reporter: &dyn Reporter) -> anyhow::Result<SocketSession> {
    let endpoint = &config.endpoint;

    let socket = TcpSocket::new_v4()
        .context("socket")?;
    let buffer = negotiate_buffer_size(&*SockRef::from(&socket), BufferDirection::Send, config.send_buffer_size, reporter)?;

    let stream = socket.connect(endpoint.socket_addr()).await
        .context("connect")?;
    let local_addr = stream.local_addr()?;
    info!("connected to {} from {}", endpoint.socket_addr(), local_addr);

    Ok(SocketSession {
        channel: Box::new(StreamChannel::new(stream, config.framing)),
        local_addr,
        buffer,
        membership: None,
    })
}
