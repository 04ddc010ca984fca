//! Record extraction from raw instrument logs.
//!
//! A log line carries a record when it contains a displacement token
//! followed by a counter token, e.g. `... D:-12.5  N:40213 ...`. Anything else
//! on the line, and every line without such a pair, is ignored.
//!
//! Lines end at `\n`, `\r\n` or a lone `\r`, so logs saved by older
//! acquisition software with CR-only endings split the same way.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors that can occur while extracting records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// A line matched the record pattern but a token did not parse.
    #[error("malformed record on line {line}: '{token}' ({reason})")]
    Malformed {
        line: usize,
        token: String,
        reason: String,
    },
}

/// Result type for extraction.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// One raw reading as written in the log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    /// Raw displacement in instrument units.
    pub displacement: f64,
    /// Sample counter.
    pub counter: u64,
    /// 1-based line number in the source text.
    pub line: usize,
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"D:(-?[0-9]+(?:\.[0-9]+)?)\s+N:([0-9]+)").expect("record pattern is valid")
    })
}

/// Lazy iterator over the records of one text buffer.
///
/// Cloning the iterator, or calling [`extract_records`] again, restarts the
/// scan from the current position or the beginning respectively.
#[derive(Clone)]
pub struct Records<'a> {
    lines: std::iter::Enumerate<LogLines<'a>>,
}

/// Line splitter accepting `\n`, `\r\n` and bare `\r` terminators.
#[derive(Clone)]
struct LogLines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for LogLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.find(|c: char| c == '\r' || c == '\n') {
            Some(end) => {
                let line = &self.rest[..end];
                let terminator = if self.rest[end..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = &self.rest[end + terminator..];
                Some(line)
            }
            None => Some(std::mem::take(&mut self.rest)),
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, line) in self.lines.by_ref() {
            if let Some(captures) = record_pattern().captures(line) {
                return Some(parse_captures(idx + 1, &captures[1], &captures[2]));
            }
        }
        None
    }
}

fn parse_captures(line: usize, displacement: &str, counter: &str) -> Result<RawRecord> {
    let displacement: f64 = displacement.parse().map_err(|e: std::num::ParseFloatError| {
        ExtractError::Malformed {
            line,
            token: displacement.to_string(),
            reason: e.to_string(),
        }
    })?;
    let counter: u64 = counter.parse().map_err(|e: std::num::ParseIntError| {
        ExtractError::Malformed {
            line,
            token: counter.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(RawRecord {
        displacement,
        counter,
        line,
    })
}

/// Scan `text` for records in file order.
pub fn extract_records(text: &str) -> Records<'_> {
    Records {
        lines: LogLines { rest: text }.enumerate(),
    }
}
