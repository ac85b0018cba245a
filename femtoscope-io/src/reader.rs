//! JSON-lines event reader.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use femtoscope_core::Event;

use crate::error::{Error, Result};

/// Streaming reader over a JSON-lines event file.
///
/// One event per line; blank lines are skipped. Parsing failures carry the
/// 1-based line number of the offending record.
pub struct EventFileReader<R: Read> {
    lines: Lines<BufReader<R>>,
    line_no: usize,
}

impl EventFileReader<File> {
    /// Opens an event file for streaming.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> EventFileReader<R> {
    /// Wraps any reader producing JSON lines.
    pub fn new(source: R) -> Self {
        Self {
            lines: BufReader::new(source).lines(),
            line_no: 0,
        }
    }
}

impl<R: Read> Iterator for EventFileReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|source| Error::MalformedRecord {
                line: self.line_no,
                source,
            }));
        }
    }
}

/// Reads a whole event file into memory.
///
/// # Errors
/// Fails on the first unreadable or malformed record.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    EventFileReader::open(path)?.collect()
}
