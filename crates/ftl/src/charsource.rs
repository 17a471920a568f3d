//! Character source/sink stack.
//!
//! Concrete backends (files, sockets, readline) are explicitly out of
//! scope; only the stream contract and the stacking behavior live here.
//! Two in-crate backends (`StringSource`/`StringSink`) are provided
//! because the REPL and `code`-body re-evaluation need *something* concrete,
//! and string buffers are the one backend every embedder needs regardless of
//! host I/O choices.

use std::io::Read;

/// `getc`/`getavail`/`readline`/`close` contract for a single input level.
pub trait CharSource {
    /// Reads one byte, or `None` at end-of-file.
    fn getc(&mut self) -> Option<u8>;
    /// `(at_eof, bytes_available)` without consuming.
    fn getavail(&mut self) -> (bool, usize);
    /// Reads a full line (without the trailing newline) into `buf`, returning
    /// `false` at end-of-file with nothing read.
    fn readline(&mut self, buf: &mut String) -> bool;
    fn close(&mut self) {}
}

pub trait CharSink {
    fn putc(&mut self, b: u8);
    fn write_str(&mut self, s: &str) {
        for b in s.as_bytes() {
            self.putc(*b);
        }
    }
    fn close(&mut self) {}
}

/// One level of the char-source stack: the source itself plus diagnostic
/// origin (name + current line).
struct Level {
    source: Box<dyn CharSource>,
    origin: String,
    line: u32,
}

/// LIFO stack of character sources. `getc` reads from the top; on EOF it
/// pops and retries until the stack is empty.
#[derive(Default)]
pub struct SourceStack {
    levels: Vec<Level>,
}

impl SourceStack {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }

    pub fn push(&mut self, source: Box<dyn CharSource>, origin: impl Into<String>) {
        self.levels.push(Level { source, origin: origin.into(), line: 1 });
    }

    pub fn pop(&mut self) -> bool {
        if let Some(mut level) = self.levels.pop() {
            level.source.close();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Current origin name and line, for error prefixing.
    pub fn current_origin(&self) -> (&str, u32) {
        match self.levels.last() {
            Some(l) => (&l.origin, l.line),
            None => ("<none>", 0),
        }
    }

    pub fn bump_line(&mut self) {
        if let Some(l) = self.levels.last_mut() {
            l.line += 1;
        }
    }

    /// Reads a byte from the top source, popping exhausted levels.
    pub fn getc(&mut self) -> Option<u8> {
        loop {
            let Some(level) = self.levels.last_mut() else { return None };
            if let Some(b) = level.source.getc() {
                return Some(b);
            }
            self.pop();
        }
    }

    /// Reads a full logical line from whatever is currently on top,
    /// descending through exhausted levels as `getc` does.
    pub fn readline(&mut self, buf: &mut String) -> bool {
        loop {
            let Some(level) = self.levels.last_mut() else { return false };
            if level.source.readline(buf) {
                level.line += 1;
                return true;
            }
            self.pop();
        }
    }
}

/// An in-memory string as a char source, for `code`-body re-evaluation and
/// `-c CMDS` style one-shot execution.
pub struct StringSource {
    bytes: Vec<u8>,
    pos: usize,
}

impl StringSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { bytes: text.into().into_bytes(), pos: 0 }
    }
}

impl CharSource for StringSource {
    fn getc(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn getavail(&mut self) -> (bool, usize) {
        (self.pos >= self.bytes.len(), self.bytes.len().saturating_sub(self.pos))
    }

    fn readline(&mut self, buf: &mut String) -> bool {
        if self.pos >= self.bytes.len() {
            return false;
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        let line = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        buf.push_str(&line);
        if self.pos < self.bytes.len() {
            self.pos += 1; // consume the newline
        }
        true
    }
}

/// An in-memory string sink for `string`-backed output streams.
#[derive(Default)]
pub struct StringSink {
    pub data: Vec<u8>,
}

impl CharSink for StringSink {
    fn putc(&mut self, b: u8) {
        self.data.push(b);
    }
}

/// A fixed-capacity buffer sink: writes past capacity are silently dropped.
pub struct FixedBufSink {
    pub data: Vec<u8>,
    pub capacity: usize,
}

impl CharSink for FixedBufSink {
    fn putc(&mut self, b: u8) {
        if self.data.len() < self.capacity {
            self.data.push(b);
        }
    }
}

/// Wraps any `std::io::Read` as a `CharSource` (host file handles, stdin).
pub struct ReadSource<R: Read> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> CharSource for ReadSource<R> {
    fn getc(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn getavail(&mut self) -> (bool, usize) {
        (false, 0)
    }

    fn readline(&mut self, buf: &mut String) -> bool {
        let mut byte = [0u8; 1];
        let mut any = false;
        loop {
            match self.inner.read(&mut byte) {
                Ok(1) => {
                    any = true;
                    if byte[0] == b'\n' {
                        break;
                    }
                    buf.push(byte[0] as char);
                }
                _ => break,
            }
        }
        any
    }
}
