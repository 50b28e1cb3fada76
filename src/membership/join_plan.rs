use std::io;
use std::net::Ipv4Addr;
use anyhow::{bail, Context};
#[cfg(test)] use mockall::automock;
use socket2::Socket;
use tracing::debug;
use crate::membership::source_filter::{FilterMode, SourceFilter};

/// This is an abstraction for the membership related socket options, introduced to facilitate
///  mocking the OS part away for testing
#[cfg_attr(test, automock)]
pub trait MembershipSocket {
    /// plain (any-source) join, IP_ADD_MEMBERSHIP
    fn join_any_source(&self, group: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()>;

    /// source specific join, IP_ADD_SOURCE_MEMBERSHIP
    fn join_source_specific(&self, group: Ipv4Addr, source: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()>;

    /// refinement of an existing any-source join, IP_BLOCK_SOURCE
    fn block_source(&self, group: Ipv4Addr, source: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()>;
}

impl MembershipSocket for Socket {
    fn join_any_source(&self, group: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()> {
        self.join_multicast_v4(&group, &interface)
    }

    fn join_source_specific(&self, group: Ipv4Addr, source: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()> {
        self.join_ssm_v4(&source, &group, &interface)
    }

    #[cfg(target_os = "linux")]
    fn block_source(&self, group: Ipv4Addr, source: Ipv4Addr, interface: Ipv4Addr) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        fn in_addr(addr: Ipv4Addr) -> libc::in_addr {
            libc::in_addr { s_addr: u32::from_ne_bytes(addr.octets()) }
        }

        let mreq = libc::ip_mreq_source {
            imr_multiaddr: in_addr(group),
            imr_interface: in_addr(interface),
            imr_sourceaddr: in_addr(source),
        };

        // SAFETY: setsockopt FFI with a valid fd and an optval of the size the option expects
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_BLOCK_SOURCE,
                &mreq as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::ip_mreq_source>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn block_source(&self, _group: Ipv4Addr, _source: Ipv4Addr, _interface: Ipv4Addr) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "excluding multicast sources is not supported on this platform"))
    }
}

/// The group join to perform for a (possibly absent) source filter. One join carries exactly
///  one filter mode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum JoinPlan {
    /// Plain join, followed by blocking each excluded source. An empty exclusion list is a
    ///  plain join without refinement.
    AnySource { excluded: Vec<Ipv4Addr> },
    /// Join restricted to exactly these sources, no plain join
    SourceSpecific { sources: Vec<Ipv4Addr> },
}

impl JoinPlan {
    /// Evaluated strictly in this order:
    /// * no filter or EXCLUDE (with or without sources) -> any-source join
    /// * INCLUDE with sources -> source specific join
    /// * INCLUDE without sources -> configuration error
    ///
    /// This performs no socket operation, so an unusable filter is rejected before a socket
    ///  exists.
    pub fn for_filter(filter: Option<&SourceFilter>) -> anyhow::Result<JoinPlan> {
        match filter {
            None => Ok(JoinPlan::AnySource { excluded: Vec::new() }),
            Some(SourceFilter { mode: FilterMode::Exclude, sources }) => Ok(JoinPlan::AnySource { excluded: sources.clone() }),
            Some(SourceFilter { mode: FilterMode::Include, sources }) if !sources.is_empty() => Ok(JoinPlan::SourceSpecific { sources: sources.clone() }),
            Some(SourceFilter { mode: FilterMode::Include, .. }) => bail!("invalid multicast settings: inclusive source filter but no sources given"),
        }
    }

    pub fn apply(&self, socket: &impl MembershipSocket, group: Ipv4Addr, interface: Ipv4Addr) -> anyhow::Result<()> {
        match self {
            JoinPlan::AnySource { excluded } => {
                debug!("joining multicast group {} on interface {}", group, interface);
                socket.join_any_source(group, interface)
                    .with_context(|| format!("join multicast group {}", group))?;

                for &source in excluded {
                    debug!("excluding source {} for group {}", source, group);
                    socket.block_source(group, source, interface)
                        .with_context(|| format!("exclude source {} for multicast group {}", source, group))?;
                }
            }
            JoinPlan::SourceSpecific { sources } => {
                for &source in sources {
                    debug!("joining multicast group {} for source {} on interface {}", group, source, interface);
                    socket.join_source_specific(group, source, interface)
                        .with_context(|| format!("join multicast group {} for source {}", group, source))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 2, 3);
    const IFACE: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
    const SRC_1: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const SRC_2: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn test_plan_without_filter() {
        assert_eq!(JoinPlan::for_filter(None).unwrap(), JoinPlan::AnySource { excluded: vec![] });
    }

    #[test]
    fn test_plan_exclude_without_sources_is_plain_join() {
        let filter = SourceFilter::exclude(vec![]);
        assert_eq!(JoinPlan::for_filter(Some(&filter)).unwrap(), JoinPlan::AnySource { excluded: vec![] });
    }

    #[test]
    fn test_plan_exclude_with_sources() {
        let filter = SourceFilter::exclude(vec![SRC_2, SRC_1]);
        assert_eq!(JoinPlan::for_filter(Some(&filter)).unwrap(), JoinPlan::AnySource { excluded: vec![SRC_2, SRC_1] });
    }

    #[test]
    fn test_plan_include_with_sources() {
        let filter = SourceFilter::include(vec![SRC_1, SRC_2]);
        assert_eq!(JoinPlan::for_filter(Some(&filter)).unwrap(), JoinPlan::SourceSpecific { sources: vec![SRC_1, SRC_2] });
    }

    #[test]
    fn test_plan_include_without_sources_fails() {
        let filter = SourceFilter::include(vec![]);
        assert!(JoinPlan::for_filter(Some(&filter)).is_err());
    }

    #[test]
    fn test_apply_plain_join() {
        let mut socket = MockMembershipSocket::new();
        socket.expect_join_any_source()
            .once()
            .with(eq(GROUP), eq(IFACE))
            .returning(|_, _| Ok(()));
        socket.expect_block_source().never();
        socket.expect_join_source_specific().never();

        JoinPlan::AnySource { excluded: vec![] }.apply(&socket, GROUP, IFACE).unwrap();
    }

    #[test]
    fn test_apply_exclusion_after_plain_join() {
        let mut seq = Sequence::new();
        let mut socket = MockMembershipSocket::new();
        socket.expect_join_any_source()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        socket.expect_block_source()
            .once()
            .with(eq(GROUP), eq(SRC_1), eq(IFACE))
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        socket.expect_block_source()
            .once()
            .with(eq(GROUP), eq(SRC_2), eq(IFACE))
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        socket.expect_join_source_specific().never();

        JoinPlan::AnySource { excluded: vec![SRC_1, SRC_2] }.apply(&socket, GROUP, IFACE).unwrap();
    }

    #[test]
    fn test_apply_source_specific_join() {
        let mut socket = MockMembershipSocket::new();
        socket.expect_join_any_source().never();
        socket.expect_block_source().never();
        socket.expect_join_source_specific()
            .times(2)
            .withf(|group, source, _| group == &GROUP && (source == &SRC_1 || source == &SRC_2))
            .returning(|_, _, _| Ok(()));

        JoinPlan::SourceSpecific { sources: vec![SRC_1, SRC_2] }.apply(&socket, GROUP, IFACE).unwrap();
    }

    #[test]
    fn test_apply_join_failure_is_fatal() {
        let mut socket = MockMembershipSocket::new();
        socket.expect_join_any_source()
            .once()
            .returning(|_, _| Err(io::Error::from(io::ErrorKind::AddrNotAvailable)));
        socket.expect_block_source().never();

        let result = JoinPlan::AnySource { excluded: vec![SRC_1] }.apply(&socket, GROUP, IFACE);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_exclusion_failure_is_fatal() {
        let mut socket = MockMembershipSocket::new();
        socket.expect_join_any_source()
            .once()
            .returning(|_, _| Ok(()));
        socket.expect_block_source()
            .once()
            .returning(|_, _, _| Err(io::Error::from(io::ErrorKind::Unsupported)));

        let result = JoinPlan::AnySource { excluded: vec![SRC_1, SRC_2] }.apply(&socket, GROUP, IFACE);
        assert!(result.is_err());
    }
}
