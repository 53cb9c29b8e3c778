// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Append-only buffer of variable-length, word-aligned message slots.
//!
//! Layout of the backing store:
//!
//! ```text
//!   [size₀][payload₀ …][size₁][payload₁ …] … [0]
//! ```
//!
//! Each slot is prefixed by its payload length in *words*. A zero word marks
//! the end of the buffer. [`MessageBuffer::reset`] only rewinds the write
//! cursor, so a buffer reused every frame stops allocating once it has grown
//! to its steady-state size.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use bytemuck::Pod;

/// Size of one buffer word in bytes.
pub const WORD_SIZE: usize = size_of::<usize>();

/// Tuning for a [`MessageBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageBufferConfig {
    /// Capacity of a fresh buffer, in words.
    pub initial_capacity_words: usize,
}

impl MessageBufferConfig {
    /// Default sizing for per-frame update messages.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_capacity_words: 1024,
        }
    }

    /// Returns a copy with a different initial capacity.
    #[must_use]
    pub const fn with_initial_capacity_words(mut self, words: usize) -> Self {
        self.initial_capacity_words = words;
        self
    }
}

impl Default for MessageBufferConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A resizable buffer of size-prefixed message slots.
///
/// Not internally synchronized: the thread filling a buffer and the thread
/// draining it must never overlap. [`MessageQueue`](super::MessageQueue)
/// achieves this by handing whole buffers between threads.
pub struct MessageBuffer {
    data: Vec<usize>,
    /// Index of the next size word to write. `data[next_slot]` is always the
    /// end marker.
    next_slot: usize,
    count: usize,
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("capacity_words", &self.data.len())
            .field("used_words", &self.next_slot)
            .field("count", &self.count)
            .finish()
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(MessageBufferConfig::default())
    }
}

impl MessageBuffer {
    /// Creates an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if the configured capacity cannot hold the end marker.
    #[must_use]
    pub fn new(config: MessageBufferConfig) -> Self {
        assert!(
            config.initial_capacity_words >= 1,
            "message buffer needs room for the end marker"
        );
        Self {
            data: vec![0; config.initial_capacity_words],
            next_slot: 0,
            count: 0,
        }
    }

    /// Reserves a slot for a payload of `size` bytes and returns the payload
    /// words, zeroed.
    ///
    /// The payload is rounded up to whole words. The buffer grows by 3/2
    /// (repeatedly, within a single reallocation) when the slot plus its size
    /// word and the end marker would not fit.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn reserve_message_slot(&mut self, size: usize) -> &mut [usize] {
        assert!(size > 0, "message slots must not be empty");
        let size_in_words = size.div_ceil(WORD_SIZE);
        let required = self.next_slot + size_in_words + 2;
        if required > self.data.len() {
            self.grow(required);
        }

        let header = self.next_slot;
        let payload = header + 1;
        let end = payload + size_in_words;
        self.data[header] = size_in_words;
        self.data[payload..end].fill(0);
        self.data[end] = 0;
        self.next_slot = end;
        self.count += 1;
        &mut self.data[payload..end]
    }

    /// Reserves a slot and copies a [`Pod`] value into it.
    pub fn push_pod<T: Pod>(&mut self, value: &T) -> &mut [usize] {
        let payload = self.reserve_message_slot(size_of::<T>());
        write_pod(payload, 0, value);
        payload
    }

    /// Returns an iterator over payloads in insertion order.
    #[must_use]
    pub fn begin(&self) -> MessageIter<'_> {
        MessageIter {
            data: &self.data,
            cursor: 0,
        }
    }

    /// Rewinds the write cursor, keeping the allocation.
    pub fn reset(&mut self) {
        if let Some(first) = self.data.first_mut() {
            *first = 0;
        }
        self.next_slot = 0;
        self.count = 0;
    }

    /// Backing-store size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len() * WORD_SIZE
    }

    /// Backing-store size in words.
    #[must_use]
    pub fn capacity_words(&self) -> usize {
        self.data.len()
    }

    /// Number of messages reserved since the last reset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no message has been reserved since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn grow(&mut self, required: usize) {
        let mut capacity = self.data.len().max(1);
        while capacity < required {
            capacity += capacity.div_ceil(2);
        }
        log::debug!(
            "message buffer growing from {} to {capacity} words",
            self.data.len()
        );
        self.data.resize(capacity, 0);
    }
}

impl<'a> IntoIterator for &'a MessageBuffer {
    type Item = &'a [usize];
    type IntoIter = MessageIter<'a>;

    fn into_iter(self) -> MessageIter<'a> {
        self.begin()
    }
}

/// Forward iterator over the payloads of a [`MessageBuffer`].
#[derive(Clone, Debug)]
pub struct MessageIter<'a> {
    data: &'a [usize],
    cursor: usize,
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = &'a [usize];

    fn next(&mut self) -> Option<&'a [usize]> {
        let size = *self.data.get(self.cursor)?;
        if size == 0 {
            return None;
        }
        let payload = self.cursor + 1;
        self.cursor = payload + size;
        Some(&self.data[payload..payload + size])
    }
}

/// Copies `value` into `payload` starting at byte `offset`.
///
/// # Panics
///
/// Panics if the value does not fit.
pub fn write_pod<T: Pod>(payload: &mut [usize], offset: usize, value: &T) {
    let bytes = bytemuck::cast_slice_mut::<usize, u8>(payload);
    bytes[offset..offset + size_of::<T>()].copy_from_slice(bytemuck::bytes_of(value));
}

/// Reads a `T` from `payload` starting at byte `offset`.
///
/// Returns `None` if the payload is too short.
#[must_use]
pub fn read_pod<T: Pod>(payload: &[usize], offset: usize) -> Option<T> {
    let bytes = bytemuck::cast_slice::<usize, u8>(payload);
    let end = offset.checked_add(size_of::<T>())?;
    bytes.get(offset..end).map(bytemuck::pod_read_unaligned)
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use proptest::prelude::*;

    use super::*;

    fn words(bytes: usize) -> usize {
        bytes.div_ceil(WORD_SIZE)
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let buffer = MessageBuffer::default();
        assert_eq!(buffer.begin().count(), 0);
    }

    #[test]
    fn sizes_are_in_words() {
        let mut buffer = MessageBuffer::default();
        buffer.reserve_message_slot(1);
        buffer.reserve_message_slot(WORD_SIZE);
        buffer.reserve_message_slot(WORD_SIZE + 1);
        let sizes: Vec<_> = buffer.begin().map(<[usize]>::len).collect();
        assert_eq!(sizes, [1, 1, 2]);
    }

    #[test]
    fn growth_trigger_from_sixteen_words() {
        let mut buffer =
            MessageBuffer::new(MessageBufferConfig::new().with_initial_capacity_words(16));
        assert_eq!(buffer.capacity(), 16 * WORD_SIZE);
        buffer.reserve_message_slot(20 * WORD_SIZE);
        assert_eq!(buffer.capacity_words(), 24);
        assert!(buffer.capacity_words() >= 20 + 2);
    }

    #[test]
    fn growth_repeats_multiplier_when_needed() {
        let mut buffer =
            MessageBuffer::new(MessageBufferConfig::new().with_initial_capacity_words(4));
        buffer.reserve_message_slot(10 * WORD_SIZE);
        // 4 -> 6 -> 9 -> 14
        assert_eq!(buffer.capacity_words(), 14);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut buffer =
            MessageBuffer::new(MessageBufferConfig::new().with_initial_capacity_words(4));
        for _ in 0..10 {
            buffer.reserve_message_slot(3 * WORD_SIZE);
        }
        let capacity = buffer.capacity();
        buffer.reset();
        assert_eq!(buffer.begin().count(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn pod_payload_round_trips() {
        let mut buffer = MessageBuffer::default();
        buffer.push_pod(&[1.5_f32, -2.0, 3.25]);
        buffer.push_pod(&7_u16);
        let mut it = buffer.begin();
        let first = it.next().expect("first message");
        assert_eq!(read_pod::<[f32; 3]>(first, 0), Some([1.5, -2.0, 3.25]));
        let second = it.next().expect("second message");
        assert_eq!(read_pod::<u16>(second, 0), Some(7));
        assert_eq!(read_pod::<[u64; 4]>(second, 0), None);
        assert!(it.next().is_none());
    }

    #[test]
    #[should_panic(expected = "message slots must not be empty")]
    fn zero_size_slot_panics() {
        MessageBuffer::default().reserve_message_slot(0);
    }

    proptest! {
        #[test]
        fn reservations_iterate_in_order(sizes in proptest::collection::vec(1_usize..200, 0..64)) {
            let mut buffer =
                MessageBuffer::new(MessageBufferConfig::new().with_initial_capacity_words(16));
            for (i, &size) in sizes.iter().enumerate() {
                let payload = buffer.reserve_message_slot(size);
                payload[0] = i;
            }
            let seen: Vec<(usize, usize)> = buffer.begin().map(|p| (p[0], p.len())).collect();
            let expected: Vec<(usize, usize)> =
                sizes.iter().enumerate().map(|(i, &s)| (i, words(s))).collect();
            prop_assert_eq!(seen, expected);

            let capacity = buffer.capacity();
            buffer.reset();
            prop_assert_eq!(buffer.begin().count(), 0);
            prop_assert_eq!(buffer.capacity(), capacity);
        }
    }
}
