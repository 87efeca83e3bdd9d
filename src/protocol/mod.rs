//! RTMP wire protocol serialization
//!
//! This module handles the low-level outgoing protocol details:
//! - Message body layout (control, command, data, media)
//! - Chunk stream multiplexing with header compression

pub mod chunk;
pub mod constants;
pub mod message;

pub use chunk::{ChunkWriter, RtmpHeader};
pub use message::{CallStatus, Command, MediaData, RtmpMessage, UserControlEvent};
