use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Format `buf` as a hex block, one line per 16 bytes. Addresses start from
/// `start`.
///
/// ```text
/// 0x00000000    00 01 02 03  04 05 06 07  08 09 0A 0B  0C 0D 0E 0F  |................|
/// ```
pub fn hex_block(buf: &[u8], start: usize) -> String {
    // 10 address + 4 gap + 50 hex + 2 gap + 18 ascii + newline.
    let lines = (buf.len() + BYTES_PER_LINE - 1) / BYTES_PER_LINE;
    let mut out = String::with_capacity(lines * 85);

    for (n, line) in buf.chunks(BYTES_PER_LINE).enumerate() {
        if n != 0 {
            out.push('\n');
        }
        write!(out, "{:#010X}  ", start + n * BYTES_PER_LINE).unwrap();
        for column in 0..BYTES_PER_LINE {
            if column % 4 == 0 {
                out.push(' ');
            }
            match line.get(column) {
                Some(byte) => write!(out, " {:02X}", byte).unwrap(),
                None => out.push_str("   "),
            }
        }
        out.push_str("  |");
        out.extend(line.iter().map(|&b| printable(b)));
        out.push('|');
    }

    out
}

/// Format a run of `sector_size`-byte sectors, with a header line before each
/// one giving its LBA. Addresses within each block are relative to the sector.
pub fn sector_dump(buf: &[u8], sector_size: usize, first_lba: u32) -> String {
    assert!(sector_size > 0);
    let mut out = String::new();
    for (n, sector) in buf.chunks(sector_size).enumerate() {
        if n != 0 {
            out.push_str("\n\n");
        }
        writeln!(out, "Sector {}:", first_lba as u64 + n as u64).unwrap();
        out.push_str(&hex_block(sector, 0));
    }
    out
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte.into()
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let buf: Vec<u8> = (0x40..0x50).collect();
        assert_eq!(hex_block(&buf, 0),
                   "0x00000000    40 41 42 43  44 45 46 47  48 49 4A 4B  4C 4D 4E 4F  |@ABCDEFGHIJKLMNO|");
    }

    #[test]
    fn test_partial_line_is_padded() {
        let full = hex_block(&[0; 16], 0x200);
        let partial = hex_block(&[0x0A, 0x41, 0x20], 0x200);
        assert!(partial.starts_with("0x00000200    0A 41 20"));
        assert!(partial.ends_with("  |.A |"));
        // The ASCII column lines up with a full line.
        assert_eq!(full.find('|'), partial.find('|'));
    }

    #[test]
    fn test_empty() {
        assert_eq!(hex_block(&[], 0), "");
    }

    #[test]
    fn test_sector_headers() {
        let buf = vec![0xAA; 512 * 2];
        let dump = sector_dump(&buf, 512, 41);
        assert!(dump.starts_with("Sector 41:\n0x00000000 "));
        assert!(dump.contains("\n\nSector 42:\n0x00000000 "));
        // Two headers plus 32 lines per sector.
        assert_eq!(dump.lines().filter(|l| !l.is_empty()).count(), 2 + 64);
    }

    #[test]
    fn test_sector_size_sets_split() {
        let buf = vec![0x11; 64];
        let dump = sector_dump(&buf, 32, 7);
        assert!(dump.starts_with("Sector 7:\n"));
        assert!(dump.contains("\n\nSector 8:\n"));
        assert!(!dump.contains("Sector 9:"));
        // Two headers plus two lines per sector.
        assert_eq!(dump.lines().filter(|l| !l.is_empty()).count(), 2 + 4);
    }
}
