//! Capture files: raw bus traffic as hex text, one chunk per line.
//!
//! Lines starting with `#` are annotations (direction and timestamp); data
//! lines hold the bytes of one receive or send chunk as uppercase hex pairs
//! separated by single spaces. Replay feeds data lines back through the same
//! frame scanner the live bus uses.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::Local;
use log::warn;

use crate::error::Result;

pub struct CaptureWriter {
    file: File,
}

impl CaptureWriter {
    /// Open a capture file for appending, creating it if needed.
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Record one raw chunk under a direction + timestamp annotation.
    ///
    /// Flushed immediately; a crash loses at most the record being written.
    pub fn record(&mut self, direction: &str, data: &[u8]) -> Result<()> {
        writeln!(
            self.file,
            "#{direction} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
        )?;
        writeln!(self.file, "{}", hex_line(data))?;
        self.file.flush()?;
        Ok(())
    }
}

/// Uppercase hex bytes separated by single spaces.
pub fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line of a capture file.
#[derive(Debug, PartialEq, Eq)]
pub enum Record {
    Comment(String),
    Bytes(Vec<u8>),
}

/// Parse one capture line. Blank and unparseable lines yield `None`.
pub fn parse_line(line: &str) -> Option<Record> {
    let line = line.trim_end();
    if line.is_empty() {
        return None;
    }
    if let Some(comment) = line.strip_prefix('#') {
        return Some(Record::Comment(comment.trim().to_string()));
    }
    let compact: String = line.split_whitespace().collect();
    match hex::decode(&compact) {
        Ok(bytes) => Some(Record::Bytes(bytes)),
        Err(_) => {
            warn!("unparseable capture line: {line:?}");
            None
        }
    }
}

/// Walk a capture file, handing every record to `handle` in file order.
pub fn replay(path: &Path, mut handle: impl FnMut(Record)) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        if let Some(record) = parse_line(&line?) {
            handle(record);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_line() {
        assert_eq!(hex_line(&[0x02, 0xAB, 0x03, 0xFF]), "02 AB 03 FF");
        assert_eq!(hex_line(&[]), "");
    }

    #[test]
    fn test_parse_comment() {
        assert_eq!(
            parse_line("#received 2024-06-01 12:00:00"),
            Some(Record::Comment("received 2024-06-01 12:00:00".to_string()))
        );
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(
            parse_line("02 38 30 03 FF"),
            Some(Record::Bytes(vec![0x02, 0x38, 0x30, 0x03, 0xFF]))
        );
    }

    #[test]
    fn test_parse_skips_junk() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("02 G0"), None);
        assert_eq!(parse_line("0 2"), Some(Record::Bytes(vec![0x02])));
    }
}
