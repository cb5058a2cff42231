//! Hex dump of raw payloads.

const WORD: usize = 8;
const LINE: usize = 2 * WORD;

/// Format `data` as lines of 16 bytes: offset, two groups of 8 hex bytes and
/// the printable ASCII rendering. A short last line is padded with `__`.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(LINE).enumerate() {
        out.push_str(&format!("${:04x}: ", line * LINE));
        for i in 0..LINE {
            if i == WORD {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(b) => out.push_str(&format!("{:02x} ", b)),
                None => out.push_str("__ "),
            }
        }
        out.push('|');
        for i in 0..LINE {
            out.push(match chunk.get(i) {
                Some(&b) if b == b' ' || b.is_ascii_graphic() => char::from(b),
                _ => '.',
            });
        }
        out.push_str("|\n");
    }
    out
}
