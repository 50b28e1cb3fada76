//! In-memory stand-ins for the socket and console seams, so that session logic can be tested
//!  without network access. They are part of the regular (non-#[cfg(test)]) code so that
//!  integration tests under `tests/` can use them as well.

pub mod channel;
pub mod reporter;

/// A port that was free on the loopback interface a moment ago
pub fn free_local_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .map(|addr| addr.port())
        .unwrap_or(17_000)
}
