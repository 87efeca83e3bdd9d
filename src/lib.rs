//! rtmp-wire: RTMP serialization core
//!
//! This library is the encoder half of an RTMP stack: it turns in-memory
//! message objects into the bit-exact byte stream Flash-era media servers
//! and clients consume.
//!
//! - AMF0 and AMF3 value encoding with the formats' back-reference tables
//!   (objects, strings, class definitions)
//! - RTMP message body layout for control, command, data, and media
//!   messages
//! - Chunk multiplexing with per-stream header compression, extended
//!   timestamps, and dynamic chunk sizes
//! - An outgoing packet queue with a single writer task per connection
//!
//! Transport, handshake, and session state machines are out of scope; the
//! writer only needs something implementing `AsyncWrite`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtmp_wire::amf::AmfValue;
//! use rtmp_wire::protocol::{Command, RtmpMessage};
//! use rtmp_wire::queue::{outgoing_queue, OutgoingPacket};
//! use rtmp_wire::registry::TypeRegistry;
//! use rtmp_wire::writer::PacketWriter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:1935").await?;
//!     let (queue, receiver) = outgoing_queue();
//!     let writer = PacketWriter::new(stream, receiver, Arc::new(TypeRegistry::default()));
//!     let shutdown = writer.shutdown_handle();
//!     let task = tokio::spawn(writer.run());
//!
//!     let mut connect = Command::request("connect", 1.0);
//!     connect.parameters = AmfValue::object(vec![
//!         ("app".to_string(), "live".into()),
//!         ("tcUrl".to_string(), "rtmp://127.0.0.1/live".into()),
//!     ]);
//!     queue.enqueue(OutgoingPacket::new(3, 0, RtmpMessage::Command(connect)))?;
//!
//!     shutdown.shutdown();
//!     task.await??;
//!     Ok(())
//! }
//! ```

pub mod amf;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod writer;

// Re-export main types for convenience
pub use amf::{AmfValue, EncodingContext, ObjectEncoding};
pub use error::{Error, Result};
pub use protocol::{ChunkWriter, Command, RtmpHeader, RtmpMessage};
pub use queue::{outgoing_queue, OutgoingPacket, OutgoingQueue};
pub use registry::{ClassDescription, MissingTypeStrategy, TypeRegistry};
pub use sink::ByteSink;
pub use writer::{Disconnected, PacketWriter, ShutdownHandle};
