//! RTMP chunk stream writer
//!
//! RTMP messages are split into chunks for multiplexing. Each chunk has a
//! header identifying the chunk stream and the message being sent.
//!
//! ```text
//! Chunk Format:
//! +-------------+-----------------+-------------------+
//! | Basic Header| Message Header  | Chunk Data        |
//! | (1-3 bytes) | (0,3,7,11 bytes)| (variable)        |
//! +-------------+-----------------+-------------------+
//!
//! Basic Header formats:
//! - 1 byte:  fmt(2) + csid(6)        for csid 2-63
//! - 2 bytes: fmt(2) + 0 + csid(8)    for csid 64-319
//! - 3 bytes: fmt(2) + 1 + csid(16)   for csid 320-65599
//!
//! Message Header formats (based on fmt):
//! - Type 0 (11 bytes): timestamp(3) + length(3) + type(1) + stream_id(4, LE)
//! - Type 1 (7 bytes):  timestamp_delta(3) + length(3) + type(1)
//! - Type 2 (3 bytes):  timestamp_delta(3)
//! - Type 3 (0 bytes):  (use previous chunk's values)
//!
//! Extended timestamp (4 bytes) is appended when the field saturates at
//! 0xFFFFFF.
//! ```
//!
//! The header format is chosen by diffing against the previous header
//! seen on the same chunk stream, so repeated similar packets compress
//! down to bare Type 3 continuations.
//!
//! Reference: RTMP Specification Section 5.3

use std::collections::HashMap;

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;
use crate::sink::ByteSink;

/// Full header of an outgoing RTMP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpHeader {
    /// Chunk stream id (multiplexing channel)
    pub chunk_stream_id: u32,
    /// Message stream id (little-endian on the wire)
    pub message_stream_id: u32,
    /// Message type id
    pub message_type: u8,
    /// Timestamp: absolute, or a delta when `is_timer_relative`
    pub timestamp: u32,
    /// Body length in bytes
    pub packet_length: u32,
    /// Whether `timestamp` is relative to the previous header on this
    /// chunk stream; absolute timestamps force a Type 0 header
    pub is_timer_relative: bool,
}

/// Chunk message header formats, by how much of the previous header the
/// receiver reuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkFormat {
    /// Type 0: full header, new message stream or absolute timestamp
    New = 0,
    /// Type 1: same stream, new length or type
    SameSource = 1,
    /// Type 2: only the timestamp delta changed
    TimestampAdjustment = 2,
    /// Type 3: identical header, body continuation
    Continuation = 3,
}

/// Writes messages as chunk sequences
///
/// Due to the header compression, the same writer must be used for all
/// messages sent to one peer; it keeps the previous header per chunk
/// stream and the current outgoing chunk size.
#[derive(Debug)]
pub struct ChunkWriter {
    previous_headers: HashMap<u32, RtmpHeader>,
    write_chunk_size: u32,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self {
            previous_headers: HashMap::new(),
            write_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Current outgoing chunk size
    pub fn chunk_size(&self) -> u32 {
        self.write_chunk_size
    }

    /// Adopt a new outgoing chunk size.
    ///
    /// Callers apply this *after* emitting the `SetChunkSize` message, so
    /// the announcement itself is fragmented with the old size.
    pub fn set_chunk_size(&mut self, size: u32) {
        tracing::debug!(size = size, "outgoing chunk size changed");
        self.write_chunk_size = size;
    }

    /// Write one message as a chunk sequence: compressed message header,
    /// then the body split at the chunk size with Type 3 continuation
    /// headers between fragments.
    pub fn write_message(
        &mut self,
        sink: &mut ByteSink,
        header: &RtmpHeader,
        payload: &[u8],
    ) -> Result<()> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            }
            .into());
        }

        let csid = header.chunk_stream_id;
        let format = select_format(header, self.previous_headers.get(&csid));

        // body is already composed; cache before header emission
        self.previous_headers.insert(csid, header.clone());

        write_basic_header(sink, format, csid)?;
        write_message_header(sink, format, header)?;

        let chunk_size = self.write_chunk_size as usize;
        let mut offset = 0;
        while offset < payload.len() {
            if offset > 0 {
                write_basic_header(sink, ChunkFormat::Continuation, csid)?;
            }
            let fragment = chunk_size.min(payload.len() - offset);
            sink.write_bytes(&payload[offset..offset + fragment])?;
            offset += fragment;
        }

        Ok(())
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the most compressed header format the previous header allows
fn select_format(header: &RtmpHeader, previous: Option<&RtmpHeader>) -> ChunkFormat {
    let previous = match previous {
        Some(previous) => previous,
        None => return ChunkFormat::New,
    };

    if header.message_stream_id != previous.message_stream_id || !header.is_timer_relative {
        ChunkFormat::New
    } else if header.packet_length != previous.packet_length
        || header.message_type != previous.message_type
    {
        ChunkFormat::SameSource
    } else if header.timestamp != previous.timestamp {
        ChunkFormat::TimestampAdjustment
    } else {
        ChunkFormat::Continuation
    }
}

fn write_basic_header(sink: &mut ByteSink, format: ChunkFormat, csid: u32) -> Result<()> {
    if csid > MAX_CHUNK_STREAM_ID {
        return Err(ProtocolError::InvalidChunkStreamId(csid).into());
    }

    let format_bits = (format as u8) << 6;
    if csid <= 63 {
        sink.write_u8(format_bits | csid as u8)
    } else if csid <= 319 {
        sink.write_u8(format_bits)?;
        sink.write_u8((csid - 64) as u8)
    } else {
        sink.write_u8(format_bits | 1)?;
        let rest = csid - 64;
        sink.write_u8((rest & 0xFF) as u8)?;
        sink.write_u8((rest >> 8) as u8)
    }
}

fn write_message_header(sink: &mut ByteSink, format: ChunkFormat, header: &RtmpHeader) -> Result<()> {
    let timestamp_field = header.timestamp.min(EXTENDED_TIMESTAMP_THRESHOLD);

    match format {
        ChunkFormat::New => {
            sink.write_u24_be(timestamp_field)?;
            sink.write_u24_be(header.packet_length)?;
            sink.write_u8(header.message_type)?;
            sink.write_i32_le(header.message_stream_id as i32)?;
        }
        ChunkFormat::SameSource => {
            sink.write_u24_be(timestamp_field)?;
            sink.write_u24_be(header.packet_length)?;
            sink.write_u8(header.message_type)?;
        }
        ChunkFormat::TimestampAdjustment => {
            sink.write_u24_be(timestamp_field)?;
        }
        ChunkFormat::Continuation => {}
    }

    // saturated field escapes to a 32-bit trailer
    if format != ChunkFormat::Continuation && header.timestamp >= EXTENDED_TIMESTAMP_THRESHOLD {
        sink.write_u32_be(header.timestamp)?;
    }

    Ok(())
}
