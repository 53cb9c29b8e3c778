// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred work crossing from the Event thread to the Update thread.
//!
//! Mutations are encoded into a [`MessageBuffer`] as plain words. Each slot
//! starts with a record-kind word:
//!
//! - **message**: the rest of the slot is a [`Message`] encoding, decoded and
//!   handed to [`MessageHandler::handle_message`] on the Update thread.
//! - **deferred**: the slot holds an index into a side table of boxed
//!   closures, for work that cannot be flattened into words (constraints,
//!   uniform mappings, frame callbacks).
//!
//! A [`MessageBatch`] pairs one buffer with its side table. With the `std`
//! feature, [`MessageQueue`] hands whole batches between threads.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::buffer::BufferIndex;

mod buffer;
#[cfg(feature = "std")]
mod queue;

pub use buffer::{MessageBuffer, MessageBufferConfig, MessageIter, WORD_SIZE, read_pod, write_pod};
#[cfg(feature = "std")]
pub use queue::MessageQueue;

/// A value that can be flattened into message-buffer words.
pub trait Message: Sized {
    /// Encoded size in bytes. Must be non-zero.
    fn encoded_size(&self) -> usize;

    /// Writes the encoding into `payload`, which holds at least
    /// [`encoded_size`](Self::encoded_size) bytes, zeroed.
    fn encode(&self, payload: &mut [usize]);

    /// Reads a message written by [`encode`](Self::encode).
    fn decode(payload: &[usize]) -> Option<Self>;
}

/// The Update-thread state that messages are applied to.
pub trait MessageHandler {
    /// Message type carried in buffer words.
    type Message: Message;

    /// Applies one message against the buffer slot being updated.
    fn handle_message(&mut self, message: Self::Message, buffer_index: BufferIndex);
}

/// A closure run on the Update thread in message order.
pub type DeferredFn<C> = Box<dyn FnOnce(&mut C, BufferIndex) + Send>;

const RECORD_MESSAGE: usize = 1;
const RECORD_DEFERRED: usize = 2;

/// One buffer of messages plus the closures it refers to.
pub struct MessageBatch<C> {
    buffer: MessageBuffer,
    deferred: Vec<DeferredFn<C>>,
}

impl<C> fmt::Debug for MessageBatch<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBatch")
            .field("buffer", &self.buffer)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl<C> MessageBatch<C> {
    /// Number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Backing buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl<C: MessageHandler> MessageBatch<C> {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(config: MessageBufferConfig) -> Self {
        Self {
            buffer: MessageBuffer::new(config),
            deferred: Vec::new(),
        }
    }

    /// Encodes `message` into the next slot.
    pub fn push(&mut self, message: &C::Message) {
        let size = message.encoded_size();
        debug_assert!(size > 0, "messages must encode to at least one byte");
        let slot = self.buffer.reserve_message_slot(WORD_SIZE + size);
        slot[0] = RECORD_MESSAGE;
        message.encode(&mut slot[1..]);
    }

    /// Appends a closure, ordered with the surrounding messages.
    pub fn push_deferred(&mut self, work: DeferredFn<C>) {
        let index = self.deferred.len();
        self.deferred.push(work);
        let slot = self.buffer.reserve_message_slot(2 * WORD_SIZE);
        slot[0] = RECORD_DEFERRED;
        slot[1] = index;
    }

    /// Applies every record in insertion order, then resets the batch.
    ///
    /// Returns the number of records processed.
    pub fn process(&mut self, ctx: &mut C, buffer_index: BufferIndex) -> usize {
        let Self { buffer, deferred } = self;
        let mut closures = deferred.drain(..);
        let mut next_deferred = 0;
        let mut processed = 0;
        for slot in buffer.begin() {
            match slot.first().copied() {
                Some(RECORD_MESSAGE) => match C::Message::decode(&slot[1..]) {
                    Some(message) => ctx.handle_message(message, buffer_index),
                    None => log::warn!("dropping undecodable message of {} words", slot.len()),
                },
                Some(RECORD_DEFERRED) => {
                    debug_assert_eq!(
                        slot.get(1).copied(),
                        Some(next_deferred),
                        "deferred records out of order"
                    );
                    next_deferred += 1;
                    match closures.next() {
                        Some(work) => work(ctx, buffer_index),
                        None => unreachable!("deferred record without a closure"),
                    }
                }
                other => unreachable!("corrupt message record kind {other:?}"),
            }
            processed += 1;
        }
        drop(closures);
        buffer.reset();
        processed
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Add(u32);

    impl Message for Add {
        fn encoded_size(&self) -> usize {
            size_of::<u32>()
        }

        fn encode(&self, payload: &mut [usize]) {
            write_pod(payload, 0, &self.0);
        }

        fn decode(payload: &[usize]) -> Option<Self> {
            read_pod(payload, 0).map(Add)
        }
    }

    #[derive(Default)]
    struct Log {
        seen: Vec<(u32, BufferIndex)>,
    }

    impl MessageHandler for Log {
        type Message = Add;

        fn handle_message(&mut self, message: Add, buffer_index: BufferIndex) {
            self.seen.push((message.0, buffer_index));
        }
    }

    #[test]
    fn messages_and_closures_interleave_in_order() {
        let mut batch = MessageBatch::<Log>::new(MessageBufferConfig::new());
        batch.push(&Add(1));
        batch.push_deferred(Box::new(|log: &mut Log, bi| log.seen.push((100, bi))));
        batch.push(&Add(2));
        batch.push_deferred(Box::new(|log: &mut Log, bi| log.seen.push((200, bi))));
        assert_eq!(batch.len(), 4);

        let mut log = Log::default();
        assert_eq!(batch.process(&mut log, BufferIndex::ONE), 4);
        let values: Vec<u32> = log.seen.iter().map(|&(v, _)| v).collect();
        assert_eq!(values, [1, 100, 2, 200]);
        assert!(log.seen.iter().all(|&(_, bi)| bi == BufferIndex::ONE));
        assert!(batch.is_empty());
    }

    #[test]
    fn processing_keeps_capacity() {
        let mut batch = MessageBatch::<Log>::new(MessageBufferConfig::new().with_initial_capacity_words(4));
        for i in 0..32 {
            batch.push(&Add(i));
        }
        let capacity = batch.capacity();
        batch.process(&mut Log::default(), BufferIndex::ZERO);
        assert_eq!(batch.capacity(), capacity);
        assert_eq!(batch.process(&mut Log::default(), BufferIndex::ZERO), 0);
    }
}
