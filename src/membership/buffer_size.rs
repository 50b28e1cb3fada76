use std::fmt::{Display, Formatter};
use std::io;
use anyhow::Context;
#[cfg(test)] use mockall::automock;
use socket2::Socket;
use tracing::{debug, warn};
use crate::output::Reporter;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BufferDirection {
    Receive,
    Send,
}

impl Display for BufferDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferDirection::Receive => write!(f, "SO_RCVBUF"),
            BufferDirection::Send => write!(f, "SO_SNDBUF"),
        }
    }
}

/// This is an abstraction for reading and writing socket buffer sizes, introduced to facilitate
///  mocking the OS part away for testing
#[cfg_attr(test, automock)]
pub trait BufferSocket {
    fn buffer_size(&self, direction: BufferDirection) -> io::Result<usize>;

    fn set_buffer_size(&self, direction: BufferDirection, size: usize) -> io::Result<()>;
}

impl BufferSocket for Socket {
    fn buffer_size(&self, direction: BufferDirection) -> io::Result<usize> {
        match direction {
            BufferDirection::Receive => self.recv_buffer_size(),
            BufferDirection::Send => self.send_buffer_size(),
        }
    }

    fn set_buffer_size(&self, direction: BufferDirection, size: usize) -> io::Result<()> {
        match direction {
            BufferDirection::Receive => self.set_recv_buffer_size(size),
            BufferDirection::Send => self.set_send_buffer_size(size),
        }
    }
}

/// Outcome of a buffer size request: what the OS had initially, what we asked for, and what
///  the OS actually granted
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BufferNegotiation {
    pub direction: BufferDirection,
    pub os_default: usize,
    /// 0 for 'use the OS default'
    pub requested: usize,
    pub granted: usize,
}

impl BufferNegotiation {
    pub fn is_short(&self) -> bool {
        self.granted < self.requested
    }
}

/// Sets the requested size and reads back what the OS granted. A smaller grant is reported as a
///  warning, but it does not fail the negotiation. Failing to *set* the size is a warning as
///  well, failing to *read* it is not.
pub fn negotiate_buffer_size(
    socket: &impl BufferSocket,
    direction: BufferDirection,
    requested: usize,
    reporter: &dyn Reporter,
) -> anyhow::Result<BufferNegotiation> {
    let os_default = socket.buffer_size(direction)
        .with_context(|| format!("getsockopt - {}", direction))?;

    if requested == 0 {
        debug!("{}: using OS default of {}", direction, os_default);
        return Ok(BufferNegotiation {
            direction,
            os_default,
            requested,
            granted: os_default,
        });
    }

    if let Err(e) = socket.set_buffer_size(direction, requested) {
        warn!("setsockopt - {} failed: {}", direction, e);
        reporter.report(&format!("WARNING: setsockopt - {}: {}", direction, e));
    }

    let granted = socket.buffer_size(direction)
        .with_context(|| format!("getsockopt - {}", direction))?;

    let negotiation = BufferNegotiation {
        direction,
        os_default,
        requested,
        granted,
    };

    if negotiation.is_short() {
        warn!("tried to set {} to {}, only got {}", direction, requested, granted);
        reporter.report(&format!("WARNING: tried to set {} to {}, only got {}", direction, requested, granted));
    }
    else {
        debug!("{}: requested {}, granted {}", direction, requested, granted);
    }

    Ok(negotiation)
}
