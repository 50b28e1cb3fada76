use std::borrow::Cow;

pub const ECHO_PREFIX: &[u8; 5] = b"echo ";
pub const STAT_PREFIX: &[u8; 5] = b"stat ";

/// Classification of a single received message. Control messages are recognized by raw byte
///  comparison of their 5 byte prefix; everything else is data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionMessage<'a> {
    /// announce / reset: the full message text (including the prefix) up to the first NUL, a
    ///  single trailing newline stripped
    Echo(Cow<'a, str>),
    /// the sender's total number of data messages
    Stat { sent: i64 },
    Data(&'a [u8]),
}

impl<'a> SessionMessage<'a> {
    /// A message must be strictly longer than its prefix to count as a control message -
    ///  a bare `"echo "` is data.
    pub fn classify(buf: &'a [u8]) -> SessionMessage<'a> {
        if buf.len() > ECHO_PREFIX.len() && buf.starts_with(ECHO_PREFIX) {
            return SessionMessage::Echo(Self::echo_text(buf));
        }
        if buf.len() > STAT_PREFIX.len() && buf.starts_with(STAT_PREFIX) {
            return SessionMessage::Stat { sent: parse_leading_decimal(&buf[STAT_PREFIX.len()..]) };
        }
        SessionMessage::Data(buf)
    }

    fn echo_text(buf: &[u8]) -> Cow<'_, str> {
        let mut text = until_nul(buf);
        if let Some(stripped) = text.strip_suffix(b"\n") {
            text = stripped;
        }
        String::from_utf8_lossy(text)
    }
}

/// The echo message sent at the start of each test run. The text is followed by a NUL byte for
///  compatibility with receivers that treat the payload as a C string.
pub fn encode_echo(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ECHO_PREFIX.len() + text.len() + 1);
    buf.extend_from_slice(ECHO_PREFIX);
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    buf
}

/// `"stat <count>"`, decimal, no terminator
pub fn encode_stat(num_sent: u64) -> Vec<u8> {
    format!("stat {}", num_sent).into_bytes()
}

pub(crate) fn until_nul(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(idx) => &buf[..idx],
        None => buf,
    }
}

/// Reads a number the way C's `atoi` does: leading whitespace, an optional sign, then decimal
///  digits up to the first non-digit. No digits at all yields 0.
fn parse_leading_decimal(buf: &[u8]) -> i64 {
    let buf = until_nul(buf);
    let mut iter = buf.iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();

    let negative = match iter.peek() {
        Some(b'-') => { iter.next(); true }
        Some(b'+') => { iter.next(); false }
        _ => false,
    };

    let mut value: i64 = 0;
    for &b in iter.take_while(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
    }

    if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sender_echo(b"echo sender equiv cmd: msend 239.1.2.3 12000\0", "echo sender equiv cmd: msend 239.1.2.3 12000")]
    #[case::trailing_newline(b"echo hello\n", "echo hello")]
    #[case::only_one_newline_stripped(b"echo hello\n\n", "echo hello\n")]
    #[case::newline_before_nul(b"echo hello\n\0garbage", "echo hello")]
    #[case::plain(b"echo x", "echo x")]
    fn test_classify_echo(#[case] buf: &[u8], #[case] expected_text: &str) {
        assert_eq!(SessionMessage::classify(buf), SessionMessage::Echo(Cow::Borrowed(expected_text)));
    }

    #[rstest]
    #[case::simple(b"stat 6", 6)]
    #[case::zero(b"stat 0", 0)]
    #[case::big(b"stat 50000", 50000)]
    #[case::trailing_garbage(b"stat 12abc", 12)]
    #[case::leading_whitespace(b"stat   7", 7)]
    #[case::no_digits(b"stat abc", 0)]
    #[case::negative(b"stat -3", -3)]
    #[case::nul_terminated(b"stat 42\0", 42)]
    fn test_classify_stat(#[case] buf: &[u8], #[case] expected_sent: i64) {
        assert_eq!(SessionMessage::classify(buf), SessionMessage::Stat { sent: expected_sent });
    }

    #[rstest]
    #[case::message(b"Message 1f")]
    #[case::bare_echo_prefix(b"echo ")]
    #[case::bare_stat_prefix(b"stat ")]
    #[case::no_space(b"echo\0xyz")]
    #[case::upper_case(b"ECHO hello")]
    #[case::empty(b"")]
    #[case::binary(&[0xff, 0x00, 0x65, 0x63, 0x68, 0x6f, 0x20])]
    fn test_classify_data(#[case] buf: &[u8]) {
        assert_eq!(SessionMessage::classify(buf), SessionMessage::Data(buf));
    }

    #[test]
    fn test_encode_echo() {
        assert_eq!(encode_echo("hi"), b"echo hi\0".to_vec());
        assert_eq!(SessionMessage::classify(&encode_echo("test 1")), SessionMessage::Echo(Cow::Borrowed("echo test 1")));
    }

    #[test]
    fn test_encode_stat() {
        assert_eq!(encode_stat(6), b"stat 6".to_vec());
        assert_eq!(encode_stat(0), b"stat 0".to_vec());
    }
}
