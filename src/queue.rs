//! Outgoing packet queue
//!
//! A multi-producer, single-consumer FIFO of packets awaiting
//! serialization, plus a single-bit "packet available" signal. Producers
//! enqueue from any task; the writer loop test-and-clears the signal, and
//! on observed-available drains the queue until empty before parking
//! again.
//!
//! `tokio::sync::mpsc` provides the lock-free FIFO and
//! `tokio::sync::Notify` the signal bit (a `notify_one` while the
//! consumer is mid-drain is retained as a permit, so no wakeup is lost).
//!
//! Ordering: packets on the same chunk stream drain in enqueue order;
//! interleaving between chunk streams happens at whole-packet granularity
//! only, because the writer emits each packet's chunks back to back.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::protocol::RtmpMessage;

/// A message with its routing information, queued for the writer
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingPacket {
    /// Chunk stream to multiplex onto
    pub chunk_stream_id: u32,
    /// Message stream the message belongs to
    pub message_stream_id: u32,
    /// Timestamp; absolute, or a delta when `is_timer_relative`
    pub timestamp: u32,
    /// Whether the timestamp is relative to the previous packet on this
    /// chunk stream
    pub is_timer_relative: bool,
    /// The message to serialize
    pub message: RtmpMessage,
}

impl OutgoingPacket {
    /// Create a packet with an absolute zero timestamp
    pub fn new(chunk_stream_id: u32, message_stream_id: u32, message: RtmpMessage) -> Self {
        Self {
            chunk_stream_id,
            message_stream_id,
            timestamp: 0,
            is_timer_relative: false,
            message,
        }
    }

    /// Set an absolute timestamp
    pub fn at(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self.is_timer_relative = false;
        self
    }

    /// Set a timestamp relative to the previous packet on the chunk
    /// stream, enabling header compression
    pub fn at_delta(mut self, delta: u32) -> Self {
        self.timestamp = delta;
        self.is_timer_relative = true;
        self
    }
}

/// Create a connected queue handle and receiver pair
pub fn outgoing_queue() -> (OutgoingQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let signal = Arc::new(Notify::new());
    (
        OutgoingQueue {
            tx,
            signal: signal.clone(),
        },
        QueueReceiver { rx, signal },
    )
}

/// Producer handle; clone freely across tasks
#[derive(Debug, Clone)]
pub struct OutgoingQueue {
    tx: mpsc::UnboundedSender<OutgoingPacket>,
    signal: Arc<Notify>,
}

impl OutgoingQueue {
    /// Enqueue a packet and raise the available signal
    pub fn enqueue(&self, packet: OutgoingPacket) -> Result<()> {
        self.tx.send(packet).map_err(|_| Error::ConnectionClosed)?;
        self.signal.notify_one();
        Ok(())
    }
}

/// Consumer side, owned by the single writer loop
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<OutgoingPacket>,
    signal: Arc<Notify>,
}

impl QueueReceiver {
    /// Park until the available signal is raised, clearing it
    pub async fn available(&self) {
        self.signal.notified().await;
    }

    /// Dequeue the next packet without waiting
    pub fn try_dequeue(&mut self) -> Option<OutgoingPacket> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(sequence: u32) -> OutgoingPacket {
        OutgoingPacket::new(3, 0, RtmpMessage::Acknowledgement { sequence })
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut receiver) = outgoing_queue();
        for i in 0..10 {
            queue.enqueue(packet(i)).unwrap();
        }

        receiver.available().await;
        for i in 0..10 {
            let got = receiver.try_dequeue().unwrap();
            assert_eq!(got.message, RtmpMessage::Acknowledgement { sequence: i });
        }
        assert!(receiver.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn test_signal_wakes_parked_consumer() {
        let (queue, mut receiver) = outgoing_queue();

        let producer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            queue.enqueue(packet(1)).unwrap();
        });

        receiver.available().await;
        assert!(receiver.try_dequeue().is_some());
        producer.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_per_producer_order() {
        let (queue, mut receiver) = outgoing_queue();

        let mut producers = Vec::new();
        for producer_id in 0..4u32 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..100u32 {
                    queue
                        .enqueue(packet(producer_id * 1000 + i))
                        .unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut last_seen = [None::<u32>; 4];
        let mut total = 0;
        while let Some(got) = receiver.try_dequeue() {
            if let RtmpMessage::Acknowledgement { sequence } = got.message {
                let producer_id = (sequence / 1000) as usize;
                let i = sequence % 1000;
                if let Some(previous) = last_seen[producer_id] {
                    assert!(i > previous, "producer {} reordered", producer_id);
                }
                last_seen[producer_id] = Some(i);
                total += 1;
            }
        }
        assert_eq!(total, 400);
    }

    #[tokio::test]
    async fn test_enqueue_after_consumer_drop() {
        let (queue, receiver) = outgoing_queue();
        drop(receiver);
        assert!(matches!(
            queue.enqueue(packet(1)),
            Err(Error::ConnectionClosed)
        ));
    }
}
