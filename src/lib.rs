//! Multicast / unicast network test tools: a traffic generator (`msend`) and a receiver that
//!  verifies continuity and reports loss (`mdump`).
//!
//! Both sides share a tiny in-band session protocol. Every message is exactly one datagram
//!  (or one stream read, see [session::framing]), and control messages are distinguished from
//!  data purely by a 5 byte textual prefix:
//!
//! ```ascii
//! "echo <text>"   announce a test run, both sides reset their counters
//! "stat <count>"  the sender's total number of data messages, receiver computes loss
//! anything else   data - "Message <ordinal>" with the ordinal at byte offset 8 unless an
//!                  explicit payload is configured
//! ```

pub mod endpoint;
pub mod membership;
pub mod output;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod test_util;
