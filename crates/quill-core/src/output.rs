//! Render destinations.
//!
//! An [`Output`] receives template text and scalar values. Two sinks are
//! provided: [`CharOutput`] for any [`fmt::Write`] destination and
//! [`ByteOutput`] for any [`io::Write`] destination. Both stage writes in an
//! internal buffer and forward it in chunks.

use std::{
    fmt::{self, Write as _},
    io,
};

use crate::value::fmt_float;

const BUFFER_CAPACITY: usize = 8 * 1024;

/// A destination for rendered text.
pub trait Output {
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    fn write_int(&mut self, value: i64) -> io::Result<()> {
        self.write_display(&value)
    }

    fn write_float(&mut self, value: f64) -> io::Result<()> {
        let mut text = String::new();
        fmt_float(&mut text, value).map_err(fmt_error)?;
        self.write_str(&text)
    }

    fn write_display(&mut self, value: &dyn fmt::Display) -> io::Result<()> {
        self.write_str(&value.to_string())
    }

    /// Push buffered output to the destination.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn fmt_error(_: fmt::Error) -> io::Error {
    io::Error::other("formatter error")
}

/// A character-oriented sink.
#[derive(Debug)]
pub struct CharOutput<W: fmt::Write> {
    buffer: String,
    inner: W,
}

impl<W: fmt::Write> CharOutput<W> {
    pub fn new(inner: W) -> Self {
        Self {
            buffer: String::with_capacity(BUFFER_CAPACITY),
            inner,
        }
    }

    /// Flush and return the destination.
    pub fn into_inner(mut self) -> io::Result<W> {
        Output::flush(&mut self)?;
        Ok(self.inner)
    }

    fn spill(&mut self) -> io::Result<()> {
        if self.buffer.len() >= BUFFER_CAPACITY {
            Output::flush(self)?;
        }
        Ok(())
    }
}

impl<W: fmt::Write> Output for CharOutput<W> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.buffer.push_str(s);
        self.spill()
    }

    fn write_display(&mut self, value: &dyn fmt::Display) -> io::Result<()> {
        write!(self.buffer, "{value}").map_err(fmt_error)?;
        self.spill()
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_str(&self.buffer).map_err(fmt_error)?;
            self.buffer.clear();
        }
        Ok(())
    }
}

/// A byte-oriented sink writing UTF-8.
#[derive(Debug)]
pub struct ByteOutput<W: io::Write> {
    buffer: Vec<u8>,
    inner: W,
}

impl<W: io::Write> ByteOutput<W> {
    pub fn new(inner: W) -> Self {
        Self {
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            inner,
        }
    }

    /// Flush and return the destination.
    pub fn into_inner(mut self) -> io::Result<W> {
        Output::flush(&mut self)?;
        Ok(self.inner)
    }

    fn spill(&mut self) -> io::Result<()> {
        if self.buffer.len() >= BUFFER_CAPACITY {
            Output::flush(self)?;
        }
        Ok(())
    }
}

impl<W: io::Write> Output for ByteOutput<W> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.buffer.extend_from_slice(s.as_bytes());
        self.spill()
    }

    fn write_display(&mut self, value: &dyn fmt::Display) -> io::Result<()> {
        io::Write::write_fmt(&mut self.buffer, format_args!("{value}"))?;
        self.spill()
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_output_collects_string() {
        let mut out = CharOutput::new(String::new());
        out.write_str("n=").unwrap();
        out.write_int(42).unwrap();
        out.write_str(", f=").unwrap();
        out.write_float(1.5).unwrap();
        out.write_str(", g=").unwrap();
        out.write_float(2.0).unwrap();
        assert_eq!(out.into_inner().unwrap(), "n=42, f=1.5, g=2.0");
    }

    #[test]
    fn test_byte_output_spills_large_writes() {
        let chunk = "x".repeat(BUFFER_CAPACITY + 10);
        let mut out = ByteOutput::new(Vec::new());
        out.write_str(&chunk).unwrap();
        out.write_str("!").unwrap();
        let bytes = out.into_inner().unwrap();
        assert_eq!(bytes.len(), chunk.len() + 1);
        assert_eq!(bytes.last(), Some(&b'!'));
    }

    #[test]
    fn test_byte_output_utf8() {
        let mut out = ByteOutput::new(Vec::new());
        out.write_str("héllo ").unwrap();
        out.write_display(&'✓').unwrap();
        let bytes = out.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "héllo ✓");
    }
}
