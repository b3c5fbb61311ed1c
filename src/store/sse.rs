//! Incremental decoder for `text/event-stream` bodies.

use std::fmt;

/// One dispatched server-sent event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`message` when the server sent no `event:` field)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
}

/// Longest line accepted before the stream is considered broken
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// A line grew past the decoder's limit without a terminating newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTooLong {
    pub limit: usize,
}

impl fmt::Display for LineTooLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event stream line exceeds {} bytes", self.limit)
    }
}

impl std::error::Error for LineTooLong {}

/// Decodes server-sent events from arbitrarily split body chunks.
///
/// Bytes are buffered until a full line is available, so frames and UTF-8
/// sequences may straddle chunk boundaries. Bytes already searched for a
/// newline are not scanned again.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` known to hold no newline
    scanned: usize,
    max_line_bytes: usize,
    event: Option<String>,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            event: None,
            data: Vec::new(),
        }
    }

    /// Feed one body chunk, returning every frame it completes.
    ///
    /// Fails once the pending unterminated line is longer than the limit; the
    /// decoder is reset and the connection should be dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, LineTooLong> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let newline = search_from + offset;
            let mut end = newline;
            if end > consumed && self.buffer[end - 1] == b'\r' {
                end -= 1;
            }

            let line = String::from_utf8_lossy(&self.buffer[consumed..end]).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }

            consumed = newline + 1;
            search_from = consumed;
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            self.buffer.clear();
            self.scanned = 0;
            self.event = None;
            self.data.clear();
            return Err(LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry carry nothing the store uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
