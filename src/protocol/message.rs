//! RTMP message types and body serialization
//!
//! RTMP messages are classified into:
//! - Protocol Control Messages (types 1-6): Chunk/flow control
//! - Command Messages (types 17, 20): AMF-encoded invocations
//! - Data Messages (types 15, 18): Metadata notifications
//! - Audio/Video Messages (types 8, 9): Media data
//!
//! Each variant fixes its payload layout. Bodies are composed into a
//! scratch sink with a freshly initialized reference context, so AMF
//! back-reference indices never cross message boundaries.
//!
//! Reference: RTMP Specification Section 5.4

use std::sync::Arc;

use bytes::Bytes;

use crate::amf::{Amf0Encoder, AmfValue, EncodingContext, ObjectEncoding};
use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;
use crate::registry::TypeRegistry;
use crate::sink::ByteSink;

/// Outcome of the call a command message describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStatus {
    /// An outgoing request; the method name goes on the wire
    #[default]
    Request,
    /// A succeeded invocation; `_result` goes on the wire
    Success,
    /// A failed invocation; `_error` goes on the wire
    Failure,
}

/// An RTMP command or data notification
///
/// Commands with a transaction id are invocations that expect a response;
/// data messages (onMetaData, @setDataFrame) carry none.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Method name (connect, publish, onMetaData, ...)
    pub method: String,
    /// Invocation id; `None` for notifications
    pub transaction_id: Option<f64>,
    /// Connection parameters / command object (often Null)
    pub parameters: AmfValue,
    /// Positional arguments
    pub arguments: Vec<AmfValue>,
    /// Request, or the outcome when responding
    pub status: CallStatus,
}

impl Command {
    /// Create an outgoing request invocation
    pub fn request(method: impl Into<String>, transaction_id: f64) -> Self {
        Command {
            method: method.into(),
            transaction_id: Some(transaction_id),
            parameters: AmfValue::Null,
            arguments: Vec::new(),
            status: CallStatus::Request,
        }
    }

    /// Create a `_result` response to an invocation
    pub fn result(method: impl Into<String>, transaction_id: f64, info: AmfValue) -> Self {
        Command {
            method: method.into(),
            transaction_id: Some(transaction_id),
            parameters: AmfValue::Null,
            arguments: vec![info],
            status: CallStatus::Success,
        }
    }

    /// Create an `_error` response to an invocation
    pub fn error(method: impl Into<String>, transaction_id: f64) -> Self {
        Command {
            method: method.into(),
            transaction_id: Some(transaction_id),
            parameters: AmfValue::Null,
            arguments: Vec::new(),
            status: CallStatus::Failure,
        }
    }

    /// Create an onStatus notification
    pub fn on_status(level: &str, code: &str, description: &str) -> Self {
        Command {
            method: CMD_ON_STATUS.to_string(),
            transaction_id: Some(0.0),
            parameters: AmfValue::Null,
            arguments: vec![status_object(level, code, description)],
            status: CallStatus::Request,
        }
    }
}

/// Payload of an audio or video message: raw codec bytes, or an AMF0
/// notification riding on the media type
#[derive(Debug, Clone, PartialEq)]
pub enum MediaData {
    Raw(Bytes),
    Notify(Command),
}

/// User Control Event (message type 4)
#[derive(Debug, Clone, PartialEq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
}

/// An RTMP message awaiting serialization
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpMessage {
    /// Set Chunk Size (type 1)
    SetChunkSize(u32),

    /// Abort Message (type 2)
    Abort { chunk_stream_id: u32 },

    /// Acknowledgement (type 3)
    Acknowledgement { sequence: u32 },

    /// User Control Message (type 4)
    UserControl(UserControlEvent),

    /// Window Acknowledgement Size (type 5)
    WindowAckSize(u32),

    /// Set Peer Bandwidth (type 6)
    SetPeerBandwidth { window: u32, limit_type: u8 },

    /// Audio data (type 8)
    Audio(MediaData),

    /// Video data (type 9)
    Video(MediaData),

    /// AMF0 Command (type 20)
    Command(Command),

    /// AMF3 Command (type 17)
    CommandAmf3(Command),

    /// AMF0 Data message (type 18) - metadata, etc.
    Data(Command),

    /// AMF3 Data message (type 15)
    DataAmf3(Command),

    /// AMF0 Shared Object (type 19) - reserved, empty body
    SharedObject,

    /// AMF3 Shared Object (type 16) - reserved, empty body
    SharedObjectAmf3,

    /// Aggregate message (type 22) - stub, empty body
    Aggregate,

    /// A type the serializer cannot handle; encoding fails
    Unknown { type_id: u8 },
}

impl RtmpMessage {
    /// Message type id as it appears in the chunk header
    pub fn message_type(&self) -> u8 {
        match self {
            RtmpMessage::SetChunkSize(_) => MSG_SET_CHUNK_SIZE,
            RtmpMessage::Abort { .. } => MSG_ABORT,
            RtmpMessage::Acknowledgement { .. } => MSG_ACKNOWLEDGEMENT,
            RtmpMessage::UserControl(_) => MSG_USER_CONTROL,
            RtmpMessage::WindowAckSize(_) => MSG_WINDOW_ACK_SIZE,
            RtmpMessage::SetPeerBandwidth { .. } => MSG_SET_PEER_BANDWIDTH,
            RtmpMessage::Audio(_) => MSG_AUDIO,
            RtmpMessage::Video(_) => MSG_VIDEO,
            RtmpMessage::Command(_) => MSG_COMMAND_AMF0,
            RtmpMessage::CommandAmf3(_) => MSG_COMMAND_AMF3,
            RtmpMessage::Data(_) => MSG_DATA_AMF0,
            RtmpMessage::DataAmf3(_) => MSG_DATA_AMF3,
            RtmpMessage::SharedObject => MSG_SHARED_OBJECT_AMF0,
            RtmpMessage::SharedObjectAmf3 => MSG_SHARED_OBJECT_AMF3,
            RtmpMessage::Aggregate => MSG_AGGREGATE,
            RtmpMessage::Unknown { type_id } => *type_id,
        }
    }

    /// Compose the message body on a scratch sink and return it with the
    /// message type id
    pub fn encode(&self, registry: &Arc<TypeRegistry>) -> Result<(u8, Bytes)> {
        let mut sink = ByteSink::buffered();

        match self {
            RtmpMessage::SetChunkSize(size) => sink.write_i32_be(*size as i32)?,

            RtmpMessage::Abort { chunk_stream_id } => {
                sink.write_i32_be(*chunk_stream_id as i32)?
            }

            RtmpMessage::Acknowledgement { sequence } => sink.write_i32_be(*sequence as i32)?,

            RtmpMessage::UserControl(event) => write_user_control(&mut sink, event)?,

            RtmpMessage::WindowAckSize(window) => sink.write_i32_be(*window as i32)?,

            RtmpMessage::SetPeerBandwidth { window, limit_type } => {
                sink.write_i32_be(*window as i32)?;
                sink.write_u8(*limit_type)?;
            }

            RtmpMessage::Audio(data) | RtmpMessage::Video(data) => match data {
                MediaData::Raw(bytes) => sink.write_bytes(bytes)?,
                MediaData::Notify(cmd) => {
                    write_command_or_data(&mut sink, ObjectEncoding::Amf0, registry, cmd)?
                }
            },

            RtmpMessage::Command(cmd) | RtmpMessage::Data(cmd) => {
                write_command_or_data(&mut sink, ObjectEncoding::Amf0, registry, cmd)?
            }

            RtmpMessage::CommandAmf3(cmd) => {
                // one pad byte before the AMF3 items
                sink.write_u8(0x00)?;
                write_command_or_data(&mut sink, ObjectEncoding::Amf3, registry, cmd)?
            }

            RtmpMessage::DataAmf3(cmd) => {
                write_command_or_data(&mut sink, ObjectEncoding::Amf3, registry, cmd)?
            }

            // reserved until a decoder exists
            RtmpMessage::SharedObject | RtmpMessage::SharedObjectAmf3 | RtmpMessage::Aggregate => {}

            RtmpMessage::Unknown { type_id } => {
                return Err(ProtocolError::UnknownMessageType(*type_id).into());
            }
        }

        Ok((self.message_type(), sink.take()?))
    }
}

fn write_user_control(sink: &mut ByteSink, event: &UserControlEvent) -> Result<()> {
    match event {
        UserControlEvent::StreamBegin(id) => {
            sink.write_u16_be(UC_STREAM_BEGIN)?;
            sink.write_i32_be(*id as i32)
        }
        UserControlEvent::StreamEof(id) => {
            sink.write_u16_be(UC_STREAM_EOF)?;
            sink.write_i32_be(*id as i32)
        }
        UserControlEvent::StreamDry(id) => {
            sink.write_u16_be(UC_STREAM_DRY)?;
            sink.write_i32_be(*id as i32)
        }
        UserControlEvent::SetBufferLength { stream_id, buffer_ms } => {
            sink.write_u16_be(UC_SET_BUFFER_LENGTH)?;
            sink.write_i32_be(*stream_id as i32)?;
            sink.write_i32_be(*buffer_ms as i32)
        }
        UserControlEvent::StreamIsRecorded(id) => {
            sink.write_u16_be(UC_STREAM_IS_RECORDED)?;
            sink.write_i32_be(*id as i32)
        }
        UserControlEvent::PingRequest(ts) => {
            sink.write_u16_be(UC_PING_REQUEST)?;
            sink.write_i32_be(*ts as i32)
        }
        UserControlEvent::PingResponse(ts) => {
            sink.write_u16_be(UC_PING_RESPONSE)?;
            sink.write_i32_be(*ts as i32)
        }
    }
}

/// The command-or-data layout shared by command, data, and notify bodies:
/// method name (or `_result`/`_error`), optional @setDataFrame parameters,
/// invocation id + parameters for invokes, then the arguments. A failed
/// invoke goes out with a single call-failed status object instead of its
/// arguments.
fn write_command_or_data(
    sink: &mut ByteSink,
    encoding: ObjectEncoding,
    registry: &Arc<TypeRegistry>,
    cmd: &Command,
) -> Result<()> {
    let mut ctx = EncodingContext::new(encoding, registry.clone());
    let mut encoder = Amf0Encoder::new(&mut ctx, sink);

    let name = match cmd.status {
        CallStatus::Request => cmd.method.as_str(),
        CallStatus::Success => CMD_RESULT,
        CallStatus::Failure => CMD_ERROR,
    };
    encoder.write_item(&AmfValue::String(name.to_string()))?;

    if cmd.method == CMD_SET_DATA_FRAME {
        encoder.write_item(&cmd.parameters)?;
    }

    if let Some(transaction_id) = cmd.transaction_id {
        encoder.write_item(&AmfValue::Number(transaction_id))?;
        encoder.write_item(&cmd.parameters)?;
    }

    if cmd.transaction_id.is_some() && cmd.status == CallStatus::Failure {
        encoder.write_item(&status_object("error", NC_CALL_FAILED, "Call failed."))?;
    } else {
        for argument in &cmd.arguments {
            encoder.write_item(argument)?;
        }
    }

    Ok(())
}

fn status_object(level: &str, code: &str, description: &str) -> AmfValue {
    AmfValue::object(vec![
        ("level".to_string(), level.into()),
        ("code".to_string(), code.into()),
        ("description".to_string(), description.into()),
    ])
}
