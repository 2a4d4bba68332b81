//! Classic offset/hex/ASCII dump rendering.

use std::fmt;

use crate::error::{Error, Result};

/// Bytes per line when no width is given.
pub const DEFAULT_WIDTH: usize = 16;

/// Widest line accepted, in bytes.
pub const MAX_WIDTH: usize = 64;

/// A lazily formatted hexdump of a byte slice.
///
/// Each line reads `0x{offset:08X} | {hex bytes} | {ascii}`; the hex column is
/// padded to `width * 3` characters so the ASCII column stays aligned on a
/// short final line.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    data: &'a [u8],
    start: u64,
    width: usize,
}

impl<'a> HexDump<'a> {
    /// Create a dump of `data` whose first byte sits at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWidth`] if `width` is zero or above
    /// [`MAX_WIDTH`].
    pub fn new(data: &'a [u8], start: u64, width: usize) -> Result<Self> {
        let width = check_width(width)?;
        Ok(Self { data, start, width })
    }
}

/// Accept `width` if it lies in `1..=MAX_WIDTH`.
///
/// # Errors
///
/// Returns [`Error::InvalidWidth`] otherwise.
pub fn check_width(width: usize) -> Result<usize> {
    if (1..=MAX_WIDTH).contains(&width) {
        Ok(width)
    } else {
        Err(Error::InvalidWidth(width))
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pad = self.width * 3;
        for (i, chunk) in self.data.chunks(self.width).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let offset = self.start + (i * self.width) as u64;
            let hex = chunk
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            let ascii: String = chunk.iter().map(|&b| printable(b)).collect();
            write!(f, "0x{offset:08X} | {hex:<pad$} | {ascii}")?;
        }
        Ok(())
    }
}

fn printable(byte: u8) -> char {
    if (32..=126).contains(&byte) {
        char::from(byte)
    } else {
        '.'
    }
}

/// Render a hexdump to a string.
///
/// # Errors
///
/// Returns [`Error::InvalidWidth`] if `width` is out of range.
pub fn hexdump(data: &[u8], start: u64, width: usize) -> Result<String> {
    Ok(HexDump::new(data, start, width)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_full_line() {
        let data: Vec<u8> = (0x41..0x51).collect();
        let out = hexdump(&data, 0, 16).unwrap();
        assert_eq!(
            out,
            "0x00000000 | 41 42 43 44 45 46 47 48 49 4A 4B 4C 4D 4E 4F 50  | ABCDEFGHIJKLMNOP"
        );
    }

    #[test]
    fn test_short_line_is_padded() {
        let out = hexdump(b"\x00AB", 0x10, 4).unwrap();
        assert_eq!(out, "0x00000010 | 00 41 42     | .AB");
    }

    #[test]
    fn test_multiple_lines_offsets() {
        let data = [0xFFu8; 20];
        let out = hexdump(&data, 0x100, 8).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0x00000100 | "));
        assert!(lines[1].starts_with("0x00000108 | "));
        assert!(lines[2].starts_with("0x00000110 | FF FF FF FF"));
        assert!(lines[2].ends_with("| ...."));
    }

    #[test]
    fn test_non_printable_bytes() {
        let out = hexdump(&[0x1F, 0x20, 0x7E, 0x7F], 0, 4).unwrap();
        assert!(out.ends_with("| . ~."));
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(hexdump(&[], 0, 16).unwrap(), "");
    }

    #[test]
    fn test_zero_width_rejected() {
        assert!(matches!(
            hexdump(b"abc", 0, 0),
            Err(Error::InvalidWidth(0))
        ));
    }

    #[test]
    fn test_huge_width_rejected() {
        assert!(matches!(
            hexdump(b"abcd", 0, usize::MAX / 2),
            Err(Error::InvalidWidth(_))
        ));
        assert!(matches!(
            hexdump(b"abcd", 0, MAX_WIDTH + 1),
            Err(Error::InvalidWidth(65))
        ));
        assert!(hexdump(b"abcd", 0, MAX_WIDTH).is_ok());
    }
}
