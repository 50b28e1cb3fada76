//! Renders a payload as 16 bytes per line, hex followed by the printable ASCII rendition
//!  (anything outside 0x20..=0x7e is shown as '.').

const BYTES_PER_LINE: usize = 16;

pub fn hex_dump_lines(buf: &[u8]) -> Vec<String> {
    if buf.is_empty() {
        return vec![format_line(&[])];
    }

    buf.chunks(BYTES_PER_LINE)
        .map(format_line)
        .collect()
}

fn format_line(chunk: &[u8]) -> String {
    let mut hex = String::with_capacity(3 * BYTES_PER_LINE);
    let mut text = String::with_capacity(BYTES_PER_LINE);

    for &b in chunk {
        hex.push_str(&format!("{:02x} ", b));
        text.push(printable(b));
    }
    for _ in chunk.len()..BYTES_PER_LINE {
        hex.push_str("   ");
        text.push(' ');
    }

    format!("{}\t{}", hex, text)
}

fn printable(b: u8) -> char {
    if (0x20..=0x7e).contains(&b) {
        b as char
    }
    else {
        '.'
    }
}
