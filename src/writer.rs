//! Writer drain loop
//!
//! Exactly one writer task per connection drains the outgoing queue and
//! owns the chunk writer state. Per packet it composes the message body
//! on a scratch sink with a fresh reference context, emits the chunk
//! sequence into a second scratch, and hands the result to the async
//! transport as a single write, the loop's sole suspension point.
//!
//! A transport failure broadcasts [`Disconnected`] to subscribers and
//! ends the loop; the writer is not restartable. Cancellation is observed
//! at iteration boundaries only. A cancelled connection must be torn down
//! rather than resumed, since a partially written packet leaves the
//! stream unusable.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, Notify};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::chunk::{ChunkWriter, RtmpHeader};
use crate::protocol::RtmpMessage;
use crate::queue::{OutgoingPacket, QueueReceiver};
use crate::registry::TypeRegistry;
use crate::sink::ByteSink;

/// Notification that the transport failed and the writer stopped
#[derive(Debug, Clone)]
pub struct Disconnected {
    pub reason: String,
}

/// Handle to stop a running writer loop at its next iteration boundary
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// The per-connection writer: queue consumer, chunk state, transport
pub struct PacketWriter<W> {
    transport: W,
    receiver: QueueReceiver,
    chunk_writer: ChunkWriter,
    registry: Arc<TypeRegistry>,
    scratch: ByteSink,
    disconnect_tx: broadcast::Sender<Disconnected>,
    shutdown: Arc<Notify>,
}

impl<W: AsyncWrite + Unpin + Send> PacketWriter<W> {
    pub fn new(transport: W, receiver: QueueReceiver, registry: Arc<TypeRegistry>) -> Self {
        let (disconnect_tx, _) = broadcast::channel(16);
        Self {
            transport,
            receiver,
            chunk_writer: ChunkWriter::new(),
            registry,
            scratch: ByteSink::buffered_with_capacity(4096),
            disconnect_tx,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to the disconnect notification
    pub fn subscribe_disconnect(&self) -> broadcast::Receiver<Disconnected> {
        self.disconnect_tx.subscribe()
    }

    /// Handle that cancels the drain loop
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Drain packets until cancelled or the transport fails
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    tracing::debug!("writer loop cancelled");
                    return Ok(());
                }

                _ = self.receiver.available() => {}
            }

            while let Some(packet) = self.receiver.try_dequeue() {
                if let Err(e) = self.write_packet(&packet).await {
                    match &e {
                        Error::Io(_) => {
                            tracing::warn!(error = %e, "transport write failed, stopping writer");
                            let _ = self.disconnect_tx.send(Disconnected {
                                reason: e.to_string(),
                            });
                            return Err(e);
                        }
                        Error::Protocol(ProtocolError::UnknownMessageType(type_id)) => {
                            tracing::error!(
                                type_id = type_id,
                                "unserializable message type, stopping writer"
                            );
                            return Err(e);
                        }
                        _ => {
                            // fatal to this packet only
                            tracing::error!(error = %e, "packet serialization failed, dropped");
                        }
                    }
                }
            }
        }
    }

    /// Serialize and send one packet
    pub async fn write_packet(&mut self, packet: &OutgoingPacket) -> Result<()> {
        let (message_type, payload) = packet.message.encode(&self.registry)?;

        let header = RtmpHeader {
            chunk_stream_id: packet.chunk_stream_id,
            message_stream_id: packet.message_stream_id,
            message_type,
            timestamp: packet.timestamp,
            packet_length: payload.len() as u32,
            is_timer_relative: packet.is_timer_relative,
        };

        if let Err(e) = self
            .chunk_writer
            .write_message(&mut self.scratch, &header, &payload)
        {
            // drop any partial composition so the next packet starts clean
            let _ = self.scratch.take();
            return Err(e);
        }

        let bytes = self.scratch.take()?;
        self.transport.write_all(&bytes).await?;
        self.transport.flush().await?;

        // the announcement goes out under the old size; later packets use
        // the new one
        if let RtmpMessage::SetChunkSize(size) = &packet.message {
            self.chunk_writer.set_chunk_size(*size);
        }

        tracing::trace!(
            csid = packet.chunk_stream_id,
            message_type = message_type,
            len = header.packet_length,
            "packet written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::*;
    use crate::protocol::message::MediaData;
    use crate::queue::outgoing_queue;
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::default())
    }

    #[tokio::test]
    async fn test_single_packet_write() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let (queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let shutdown = writer.shutdown_handle();
        let task = tokio::spawn(writer.run());

        queue
            .enqueue(OutgoingPacket::new(
                CSID_PROTOCOL_CONTROL,
                0,
                RtmpMessage::WindowAckSize(2_500_000),
            ))
            .unwrap();

        let mut buf = [0u8; 12 + 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], 0x02); // fmt 0, csid 2
        assert_eq!(buf[7], MSG_WINDOW_ACK_SIZE);
        assert_eq!(&buf[12..], &2_500_000i32.to_be_bytes());

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_chunk_size_deferral_through_loop() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let (queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let shutdown = writer.shutdown_handle();
        let task = tokio::spawn(writer.run());

        queue
            .enqueue(OutgoingPacket::new(
                CSID_PROTOCOL_CONTROL,
                0,
                RtmpMessage::SetChunkSize(4096),
            ))
            .unwrap();
        queue
            .enqueue(OutgoingPacket::new(
                CSID_VIDEO,
                1,
                RtmpMessage::Video(MediaData::Raw(Bytes::from(vec![0xAB; 256]))),
            ))
            .unwrap();

        // announcement: 12-byte header + 4-byte body, old size irrelevant
        let mut announcement = [0u8; 16];
        server.read_exact(&mut announcement).await.unwrap();
        assert_eq!(announcement[7], MSG_SET_CHUNK_SIZE);

        // video: single fragment under the new 4096 size, no 0xC6
        // continuation header after byte 128
        let mut video = [0u8; 12 + 256];
        server.read_exact(&mut video).await.unwrap();
        assert_eq!(video[0], 0x06); // fmt 0, csid 6
        assert!(video[12..].iter().all(|b| *b == 0xAB));

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_same_stream_packets_in_order() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let (queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let shutdown = writer.shutdown_handle();
        let task = tokio::spawn(writer.run());

        for sequence in 1..=3u32 {
            let packet = OutgoingPacket::new(
                CSID_PROTOCOL_CONTROL,
                0,
                RtmpMessage::Acknowledgement { sequence },
            );
            // relative timestamps allow the repeats to compress
            let packet = if sequence == 1 { packet } else { packet.at_delta(0) };
            queue.enqueue(packet).unwrap();
        }

        // first: full 12-byte header; the two repeats compress to Type 3
        let mut first = [0u8; 16];
        server.read_exact(&mut first).await.unwrap();
        assert_eq!(&first[12..], &[0, 0, 0, 1]);

        for expected in 2..=3u32 {
            let mut repeat = [0u8; 5];
            server.read_exact(&mut repeat).await.unwrap();
            assert_eq!(repeat[0], 0xC2); // fmt 3, csid 2
            assert_eq!(&repeat[1..], &expected.to_be_bytes());
        }

        shutdown.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_broadcasts_disconnect() {
        let (client, server) = tokio::io::duplex(64);
        let (queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let mut disconnects = writer.subscribe_disconnect();
        let task = tokio::spawn(writer.run());

        drop(server);
        queue
            .enqueue(OutgoingPacket::new(
                CSID_PROTOCOL_CONTROL,
                0,
                RtmpMessage::WindowAckSize(1),
            ))
            .unwrap();

        let disconnected = disconnects.recv().await.unwrap();
        assert!(disconnected.reason.contains("I/O error"));
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_unknown_message_type_stops_loop() {
        let (client, _server) = tokio::io::duplex(64 * 1024);
        let (queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let task = tokio::spawn(writer.run());

        queue
            .enqueue(OutgoingPacket::new(
                CSID_PROTOCOL_CONTROL,
                0,
                RtmpMessage::Unknown { type_id: 99 },
            ))
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::UnknownMessageType(99)))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        let (client, _server) = tokio::io::duplex(64);
        let (_queue, receiver) = outgoing_queue();
        let writer = PacketWriter::new(client, receiver, registry());
        let shutdown = writer.shutdown_handle();
        let task = tokio::spawn(writer.run());

        shutdown.shutdown();
        assert!(task.await.unwrap().is_ok());
    }
}
