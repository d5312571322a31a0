//! Message kinds and payload codec.
//!
//! A message is a kind plus an opaque body. Bodies are sequences of
//! big-endian ints (`i32`), doubles (`f64`) and strings (`u32` byte length
//! followed by UTF-8), laid out per kind. [`PayloadWriter`] and
//! [`PayloadReader`] are the only code that touches body bytes.

use std::fmt;

use crate::error::ProtocolError;

/// Maximum body size accepted or produced (16 MiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Kind tag carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageKind {
    Hello = 0,
    Bye = 1,
    Error = 2,
    Exit = 3,
    Configure = 4,
    Reset = 5,
    Sensor = 6,
    Order = 7,
    Step = 8,
    Result = 9,
    Inverse = 10,
    Display = 11,
}

impl MessageKind {
    pub const ALL: [Self; 12] = [
        Self::Hello,
        Self::Bye,
        Self::Error,
        Self::Exit,
        Self::Configure,
        Self::Reset,
        Self::Sensor,
        Self::Order,
        Self::Step,
        Self::Result,
        Self::Inverse,
        Self::Display,
    ];

    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self, ProtocolError> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ProtocolError::UnknownKind(code))
    }

    /// Kind of the response the simulator sends for a request of this kind.
    ///
    /// Reset is acknowledged with the pre-trial sensor payload.
    pub const fn expected_response(self) -> Self {
        match self {
            Self::Reset => Self::Sensor,
            other => other,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Bye => "bye",
            Self::Error => "error",
            Self::Exit => "exit",
            Self::Configure => "configure",
            Self::Reset => "reset",
            Self::Sensor => "sensor",
            Self::Order => "order",
            Self::Step => "step",
            Self::Result => "result",
            Self::Inverse => "inverse",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One element of a positional numeric payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
}

impl Value {
    pub const fn as_int(self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(v),
            Self::Double(_) => None,
        }
    }

    pub const fn as_double(self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(v),
            Self::Int(_) => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub body: Vec<u8>,
}

impl Message {
    pub const fn new(kind: MessageKind, body: Vec<u8>) -> Self {
        Self { kind, body }
    }

    pub const fn empty(kind: MessageKind) -> Self {
        Self {
            kind,
            body: Vec::new(),
        }
    }

    /// Message whose body is a single string.
    pub fn text(kind: MessageKind, text: &str) -> Self {
        let mut w = PayloadWriter::new();
        w.put_string(text);
        w.finish(kind)
    }

    /// Message whose body is a positional sequence of ints and doubles.
    pub fn values(kind: MessageKind, values: &[Value]) -> Self {
        let mut w = PayloadWriter::new();
        w.put_values(values);
        w.finish(kind)
    }

    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader::new(&self.body)
    }

    /// Decode a single-string body.
    pub fn read_text(&self) -> Result<String, ProtocolError> {
        let mut r = self.reader();
        let text = r.read_string()?;
        r.finish()?;
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// PayloadWriter
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_int(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_double(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn put_doubles(&mut self, vs: &[f64]) -> &mut Self {
        for v in vs {
            self.put_double(*v);
        }
        self
    }

    pub fn put_value(&mut self, v: Value) -> &mut Self {
        match v {
            Value::Int(i) => self.put_int(i),
            Value::Double(d) => self.put_double(d),
        }
    }

    pub fn put_values(&mut self, vs: &[Value]) -> &mut Self {
        for v in vs {
            self.put_value(*v);
        }
        self
    }

    /// Length-prefixed UTF-8 string. Strings longer than `u32::MAX` bytes
    /// never fit in a frame, so the length saturates and the frame is
    /// rejected when written.
    pub fn put_string(&mut self, s: &str) -> &mut Self {
        let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write a collection length as an `i32` count.
    pub fn put_count(&mut self, n: usize) -> Result<&mut Self, ProtocolError> {
        let n = i32::try_from(n)
            .map_err(|_| ProtocolError::malformed(format!("count {n} does not fit in an int")))?;
        Ok(self.put_int(n))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn finish(&mut self, kind: MessageKind) -> Message {
        Message::new(kind, std::mem::take(&mut self.buf))
    }
}

// ---------------------------------------------------------------------------
// PayloadReader
// ---------------------------------------------------------------------------

/// Cursor over a message body. Every read is bounds-checked.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        let bytes = self.buf.get(self.pos..end).ok_or_else(|| {
            ProtocolError::malformed(format!(
                "truncated {what} at offset {} ({} bytes left)",
                self.pos,
                self.remaining()
            ))
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_int(&mut self) -> Result<i32, ProtocolError> {
        self.take::<4>("int").map(i32::from_be_bytes)
    }

    pub fn read_double(&mut self) -> Result<f64, ProtocolError> {
        self.take::<8>("double").map(f64::from_be_bytes)
    }

    pub fn read_doubles(&mut self, n: usize) -> Result<Vec<f64>, ProtocolError> {
        (0..n).map(|_| self.read_double()).collect()
    }

    /// Read a non-negative `i32` count.
    pub fn read_count(&mut self) -> Result<usize, ProtocolError> {
        let n = self.read_int()?;
        usize::try_from(n).map_err(|_| ProtocolError::malformed(format!("negative count {n}")))
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.take::<4>("string length").map(u32::from_be_bytes)? as usize;
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or_else(|| {
            ProtocolError::malformed(format!(
                "string of {len} bytes overruns payload at offset {}",
                self.pos
            ))
        })?;
        self.pos = end;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ProtocolError::malformed(format!("invalid UTF-8 string: {e}")))
    }

    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail if any bytes were left unread.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(ProtocolError::malformed(format!(
                "{} trailing bytes",
                self.remaining()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
