use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use anyhow::bail;

pub const DEFAULT_MULTICAST_TTL: u8 = 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransportKind {
    MulticastUdp,
    UnicastUdp,
    Tcp,
}

impl TransportKind {
    pub fn is_multicast(&self) -> bool {
        matches!(self, TransportKind::MulticastUdp)
    }
}

/// The address a session sends to or listens on. This is constructed once from startup
///  parameters and never changes afterwards.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TransportEndpoint {
    pub addr: Ipv4Addr,
    pub port: u16,
    pub kind: TransportKind,
    /// only relevant for multicast
    pub ttl: u8,
    /// local interface for multicast traffic on multi-homed hosts
    pub interface: Option<Ipv4Addr>,
}

impl TransportEndpoint {
    pub fn new(addr: Ipv4Addr, port: u16, kind: TransportKind) -> TransportEndpoint {
        TransportEndpoint {
            addr,
            port,
            kind,
            ttl: DEFAULT_MULTICAST_TTL,
            interface: None,
        }
    }

    /// The receiver derives the transport kind from its flags and the group address: a TCP
    ///  flag wins, and any address that is not a multicast group is received as plain UDP.
    pub fn for_receiver(addr: Ipv4Addr, port: u16, tcp: bool, unicast_udp: bool) -> anyhow::Result<TransportEndpoint> {
        if tcp && unicast_udp {
            bail!("TCP and unicast UDP are mutually exclusive");
        }

        let kind = if tcp {
            TransportKind::Tcp
        }
        else if unicast_udp || !addr.is_multicast() {
            TransportKind::UnicastUdp
        }
        else {
            TransportKind::MulticastUdp
        };

        Ok(TransportEndpoint::new(addr, port, kind))
    }

    pub fn for_sender(addr: Ipv4Addr, port: u16, tcp: bool, unicast_udp: bool) -> anyhow::Result<TransportEndpoint> {
        let kind = match (tcp, unicast_udp) {
            (true, true) => bail!("TCP and unicast UDP are mutually exclusive"),
            (true, false) => TransportKind::Tcp,
            (false, true) => TransportKind::UnicastUdp,
            (false, false) => TransportKind::MulticastUdp,
        };
        Ok(TransportEndpoint::new(addr, port, kind))
    }

    pub fn with_ttl(mut self, ttl: u8) -> TransportEndpoint {
        self.ttl = ttl;
        self
    }

    pub fn with_interface(mut self, interface: Option<Ipv4Addr>) -> TransportEndpoint {
        self.interface = interface;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.addr, self.port))
    }

    /// Interface for joining multicast groups, the unspecified address letting the OS choose
    pub fn join_interface(&self) -> Ipv4Addr {
        self.interface.unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// A TCP receiver listens on all interfaces, it never joins a group
    pub fn validate_for_receive(&self) -> anyhow::Result<()> {
        if self.kind == TransportKind::Tcp && !self.addr.is_unspecified() {
            bail!("TCP is incompatible with a non-zero group address (use 0.0.0.0), was {}", self.addr);
        }
        if self.port == 0 {
            bail!("receive port must not be 0");
        }
        Ok(())
    }

    pub fn validate_for_send(&self) -> anyhow::Result<()> {
        if self.addr.is_unspecified() {
            bail!("destination address must not be 0.0.0.0");
        }
        if self.port == 0 {
            bail!("destination port must not be 0");
        }
        Ok(())
    }
}

impl Display for TransportEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.addr, self.port)
    }
}
