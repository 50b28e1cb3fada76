use crate::session::session_message::until_nul;

/// Byte offset of the hex ordinal in data messages: `"Message "` is 8 bytes long
pub const ORDINAL_OFFSET: usize = 8;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SequenceCheck {
    InSequence,
    /// The embedded ordinal did not match. The counter was resynchronized to the embedded value,
    ///  so the message is still accepted.
    Resynchronized {
        expected: u64,
        received: u64,
        /// the message text from the ordinal offset on, for diagnostics
        received_text: String,
    },
}

/// Receiver side sequence counter. It expects the ordinal to advance by exactly one per data
///  message, and adopts the embedded value as the new baseline on mismatch rather than
///  rejecting anything - the point is to observe loss and reordering, not to stop on it.
#[derive(Debug, Default)]
pub struct SequenceVerifier {
    expected: u64,
}

impl SequenceVerifier {
    pub fn new() -> SequenceVerifier {
        SequenceVerifier { expected: 0 }
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn reset(&mut self) {
        self.expected = 0;
    }

    /// Compares the ordinal embedded in a data message to the expected value, and advances
    ///  the counter past it
    pub fn check(&mut self, payload: &[u8]) -> SequenceCheck {
        let received = parse_embedded_ordinal(payload);

        let result = if received == self.expected {
            SequenceCheck::InSequence
        }
        else {
            let check = SequenceCheck::Resynchronized {
                expected: self.expected,
                received,
                received_text: embedded_text(payload),
            };
            self.expected = received;
            check
        };

        self.expected = self.expected.wrapping_add(1);
        result
    }
}

/// Reads the ordinal the way `strtol(&buf[8], NULL, 16)` does for unsigned text: leading
///  whitespace, an optional `0x` prefix, then hex digits up to the first non-hex byte. No
///  digits (including a message too short to have an ordinal) yields 0, overflow saturates.
pub fn parse_embedded_ordinal(payload: &[u8]) -> u64 {
    let text = ordinal_bytes(payload);
    let mut text = match text.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(idx) => &text[idx..],
        None => return 0,
    };

    if (text.starts_with(b"0x") || text.starts_with(b"0X")) && text.get(2).is_some_and(|b| b.is_ascii_hexdigit()) {
        text = &text[2..];
    }

    let mut value: u64 = 0;
    for &b in text.iter().take_while(|b| b.is_ascii_hexdigit()) {
        let digit = (b as char).to_digit(16).unwrap_or(0) as u64;
        value = value.checked_mul(16)
            .and_then(|v| v.checked_add(digit))
            .unwrap_or(u64::MAX);
    }
    value
}

fn ordinal_bytes(payload: &[u8]) -> &[u8] {
    if payload.len() <= ORDINAL_OFFSET {
        return &[];
    }
    until_nul(&payload[ORDINAL_OFFSET..])
}

fn embedded_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(ordinal_bytes(payload)).into_owned()
}
