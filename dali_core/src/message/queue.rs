// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread message queue.
//!
//! The Event thread fills one [`MessageBatch`] under the queue lock.
//! [`flush`](MessageQueue::flush) moves it to the processing list and swaps in
//! a recycled batch, so in steady state two batches alternate between the
//! threads. [`process`](MessageQueue::process) takes the flushed batches,
//! releases the lock, and drains them on the Update thread.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{DeferredFn, MessageBatch, MessageBufferConfig, MessageHandler};
use crate::buffer::BufferIndex;

struct QueueState<C> {
    filling: MessageBatch<C>,
    flushed: Vec<MessageBatch<C>>,
    spare: Vec<MessageBatch<C>>,
    config: MessageBufferConfig,
}

struct Shared<C> {
    state: Mutex<QueueState<C>>,
    ready: Condvar,
}

/// Double-buffered message queue shared by the Event and Update threads.
///
/// Cloning yields another handle to the same queue.
pub struct MessageQueue<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for MessageQueue<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for MessageQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MessageQueue")
            .field("pending", &state.filling.len())
            .field("flushed_batches", &state.flushed.len())
            .field("spare_batches", &state.spare.len())
            .finish()
    }
}

impl<C: MessageHandler> MessageQueue<C> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(config: MessageBufferConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    filling: MessageBatch::new(config),
                    flushed: Vec::new(),
                    spare: Vec::new(),
                    config,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Encodes `message` into the batch being filled.
    pub fn push(&self, message: &C::Message) {
        self.shared.state.lock().filling.push(message);
    }

    /// Appends a closure to the batch being filled.
    pub fn push_deferred<F>(&self, work: F)
    where
        F: FnOnce(&mut C, BufferIndex) + Send + 'static,
    {
        let work: DeferredFn<C> = alloc::boxed::Box::new(work);
        self.shared.state.lock().filling.push_deferred(work);
    }

    /// Number of records pushed since the last flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().filling.len()
    }

    /// Publishes the batch being filled and wakes a waiting Update thread.
    ///
    /// Returns `false` if there was nothing to publish.
    pub fn flush(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.filling.is_empty() {
            return false;
        }
        let config = state.config;
        let next = state.spare.pop().unwrap_or_else(|| MessageBatch::new(config));
        let full = core::mem::replace(&mut state.filling, next);
        log::trace!("flushing {} messages", full.len());
        state.flushed.push(full);
        drop(state);
        self.shared.ready.notify_all();
        true
    }

    /// Whether a flushed batch is waiting to be processed.
    #[must_use]
    pub fn has_flushed(&self) -> bool {
        !self.shared.state.lock().flushed.is_empty()
    }

    /// Drains every flushed batch in flush order.
    ///
    /// The queue lock is only held to take and return batches, so the Event
    /// thread can keep pushing while messages are applied. Returns the number
    /// of records processed.
    pub fn process(&self, ctx: &mut C, buffer_index: BufferIndex) -> usize {
        let mut batches = core::mem::take(&mut self.shared.state.lock().flushed);
        let mut processed = 0;
        for batch in &mut batches {
            processed += batch.process(ctx, buffer_index);
        }
        if !batches.is_empty() {
            self.shared.state.lock().spare.append(&mut batches);
        }
        processed
    }

    /// Blocks until a batch is flushed or `timeout` elapses.
    ///
    /// Returns `true` if a flushed batch is available.
    pub fn wait_for_messages(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.flushed.is_empty() {
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                return !state.flushed.is_empty();
            }
        }
        true
    }
}
