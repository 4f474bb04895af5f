//! A hex-dump pretty printer: sixteen octets per line, hex on the left,
//! the printable-ASCII rendering on the right. A thin ambient
//! collaborator (`spec.md` §6); the codec engine never calls it.

/// Renders `bytes` as a classic `hexdump -C`-style listing.
pub fn dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (line_no, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", line_no * 16));
        for (i, b) in chunk.iter().enumerate() {
            out.push_str(&format!("{b:02x} "));
            if i == 7 {
                out.push(' ');
            }
        }
        let pad = 16usize.saturating_sub(chunk.len());
        for i in 0..pad {
            out.push_str("   ");
            if chunk.len() + i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for &b in chunk {
            if (0x20..0x7f).contains(&b) {
                out.push(b as char);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line() {
        let out = dump(b"abc");
        assert!(out.starts_with("00000000  61 62 63"));
        assert!(out.ends_with("|abc|"));
    }

    #[test]
    fn empty_is_empty() {
        assert_eq!(dump(&[]), "");
    }
}
