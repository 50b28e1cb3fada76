//! The in-band session protocol shared by sender and receiver: message classification,
//!  framing, sequence verification and loss computation.

pub mod channel;
pub mod framing;
pub mod loss;
pub mod sequence;
pub mod session_message;

/// Upper bound for a single message, both for sending and for receive buffers
pub const MAX_MESSAGE_LEN: usize = 65536;
