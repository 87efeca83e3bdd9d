//! Byte sink shared by the AMF and chunk encoders
//!
//! All multi-byte integers go out big-endian; the single little-endian
//! variant exists for the RTMP message stream id ("reverse int").
//!
//! A sink is fixed to one of two modes for its lifetime:
//! - **direct**: every write goes straight to an underlying `io::Write`
//! - **buffered**: writes append to an in-memory scratch; the caller takes
//!   the scratch and hands it to the transport as a single write
//!
//! The buffered mode is how message bodies and chunk batches are composed
//! before the one `write_all` on the async transport. Calling an operation
//! from the wrong mode's family fails with [`Error::InvalidMode`].

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

enum SinkInner {
    Direct(Box<dyn Write + Send>),
    Buffered(BytesMut),
}

/// Byte-level output sink with a fixed sync-or-buffered mode
pub struct ByteSink {
    inner: SinkInner,
}

impl ByteSink {
    /// Create a sink that writes through to an underlying stream
    pub fn direct(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: SinkInner::Direct(Box::new(writer)),
        }
    }

    /// Create a sink that accumulates into an in-memory scratch buffer
    pub fn buffered() -> Self {
        Self {
            inner: SinkInner::Buffered(BytesMut::with_capacity(256)),
        }
    }

    /// Create a buffered sink with a known capacity
    pub fn buffered_with_capacity(capacity: usize) -> Self {
        Self {
            inner: SinkInner::Buffered(BytesMut::with_capacity(capacity)),
        }
    }

    /// Whether this sink is in buffered mode
    pub fn is_buffered(&self) -> bool {
        matches!(self.inner, SinkInner::Buffered(_))
    }

    /// Number of bytes accumulated in the scratch (0 for direct sinks)
    pub fn scratch_len(&self) -> usize {
        match &self.inner {
            SinkInner::Buffered(buf) => buf.len(),
            SinkInner::Direct(_) => 0,
        }
    }

    /// Take the accumulated scratch as one buffer (buffered mode only)
    ///
    /// The sink is left empty and can be reused for the next composition.
    pub fn take(&mut self) -> Result<Bytes> {
        match &mut self.inner {
            SinkInner::Buffered(buf) => Ok(buf.split().freeze()),
            SinkInner::Direct(_) => Err(Error::InvalidMode { operation: "take" }),
        }
    }

    /// Flush the underlying stream (direct mode only)
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.inner {
            SinkInner::Direct(w) => Ok(w.flush()?),
            SinkInner::Buffered(_) => Err(Error::InvalidMode { operation: "flush" }),
        }
    }

    /// Write a raw byte slice
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.inner {
            SinkInner::Direct(w) => Ok(w.write_all(data)?),
            SinkInner::Buffered(buf) => {
                buf.put_slice(data);
                Ok(())
            }
        }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u16_be(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write the low 24 bits of a value, big-endian
    pub fn write_u24_be(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes()[1..])
    }

    pub fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_i32_be(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write a 32-bit value little-endian (the RTMP message-stream-id form)
    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32_le(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f64_be(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_f32_be(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }
}

impl std::fmt::Debug for ByteSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SinkInner::Direct(_) => f.debug_struct("ByteSink").field("mode", &"direct").finish(),
            SinkInner::Buffered(buf) => f
                .debug_struct("ByteSink")
                .field("mode", &"buffered")
                .field("scratch_len", &buf.len())
                .finish(),
        }
    }
}
