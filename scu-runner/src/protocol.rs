// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of the line-oriented event protocol spoken by test modules.
//!
//! Module output arrives in arbitrary chunks. [`LineDecoder`] buffers those chunks and turns every
//! complete line into a [`ModuleEvent`].

use bytes::BytesMut;
use scu_metadata::ModuleEvent;
use tracing::debug;

/// Splits a byte stream into lines and parses each line as a [`ModuleEvent`].
///
/// * Blank lines are skipped.
/// * A line that fails to parse becomes [`ModuleEvent::parse_error`], so that a misbehaving
///   module is reported as a failed test rather than silently ignored.
/// * A trailing partial line is held back until [`finish`](Self::finish) is called.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
    // Number of bytes at the start of `buf` already known not to contain a newline.
    scanned: usize,
}

impl LineDecoder {
    /// Creates a new, empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of output to the decoder, returning the events for every line completed by
    /// this chunk.
    pub fn feed(&mut self, data: &[u8]) -> Vec<ModuleEvent> {
        self.buf.extend_from_slice(data);

        let mut events = Vec::new();
        while let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            events.extend(parse_line(&line[..line.len() - 1]));
        }
        self.scanned = self.buf.len();
        events
    }

    /// Signals the end of output, returning the event for a trailing line that wasn't terminated
    /// by a newline.
    pub fn finish(&mut self) -> Option<ModuleEvent> {
        let line = self.buf.split();
        self.scanned = 0;
        parse_line(&line)
    }

    /// Returns the number of bytes buffered but not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

fn parse_line(line: &[u8]) -> Option<ModuleEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    match ModuleEvent::from_line(line) {
        Ok(event) => Some(event),
        Err(error) => {
            debug!(
                line = %String::from_utf8_lossy(line),
                "failed to parse module output: {error}",
            );
            Some(ModuleEvent::parse_error())
        }
    }
}
