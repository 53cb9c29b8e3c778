// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer indices and double-buffered storage.
//!
//! Every animatable value in the scene graph lives in two slots. During a
//! frame the Update thread writes the slot selected by the *update* index
//! while the Render thread reads the slot selected by the *render* index.
//! The two indices swap exactly once per processed frame, in
//! [`SceneGraphBuffers::swap`].

use core::fmt;
use core::ops::{Index, IndexMut};

/// Number of slots in every double-buffered value.
pub const NUM_SCENE_GRAPH_BUFFERS: usize = 2;

/// Selects one of the two slots of a [`DoubleBuffered`] value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BufferIndex(u8);

impl BufferIndex {
    /// The first slot.
    pub const ZERO: Self = Self(0);
    /// The second slot.
    pub const ONE: Self = Self(1);

    /// Creates a buffer index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= NUM_SCENE_GRAPH_BUFFERS`.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        assert!(
            index < NUM_SCENE_GRAPH_BUFFERS,
            "buffer index out of range"
        );
        #[expect(
            clippy::cast_possible_truncation,
            reason = "index is checked against NUM_SCENE_GRAPH_BUFFERS"
        )]
        let index = index as u8;
        Self(index)
    }

    /// Returns the index as a `usize`.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Returns the opposite slot.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        Self(1 - self.0)
    }
}

impl fmt::Debug for BufferIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferIndex({})", self.0)
    }
}

/// The pair of indices currently in use by the Update and Render threads.
///
/// Only the owner of the frame loop may call [`swap`](Self::swap); every
/// other component receives the index it needs as a parameter and must not
/// cache it across calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneGraphBuffers {
    update: BufferIndex,
}

impl Default for SceneGraphBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraphBuffers {
    /// Starts with the Update thread writing slot 0 and Render reading slot 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            update: BufferIndex::ZERO,
        }
    }

    /// The slot the Update thread writes this frame.
    #[inline]
    #[must_use]
    pub const fn update_index(&self) -> BufferIndex {
        self.update
    }

    /// The slot the Render thread reads this frame.
    #[inline]
    #[must_use]
    pub const fn render_index(&self) -> BufferIndex {
        self.update.other()
    }

    /// Hands the freshly written slot to the Render thread.
    pub fn swap(&mut self) {
        self.update = self.update.other();
    }
}

/// Two contiguous instances of `T`, indexed by [`BufferIndex`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DoubleBuffered<T> {
    values: [T; NUM_SCENE_GRAPH_BUFFERS],
}

impl<T: Clone> DoubleBuffered<T> {
    /// Creates a value with both slots set to `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            values: [value.clone(), value],
        }
    }
}

impl<T> DoubleBuffered<T> {
    /// Returns the value in slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> &T {
        &self.values[index.get()]
    }

    /// Returns the value in slot `index` mutably.
    #[inline]
    pub fn get_mut(&mut self, index: BufferIndex) -> &mut T {
        &mut self.values[index.get()]
    }

    /// Overwrites slot `index`, leaving the other slot untouched.
    #[inline]
    pub fn set(&mut self, index: BufferIndex, value: T) {
        self.values[index.get()] = value;
    }

    /// Returns both slots at once, `index` first.
    pub fn both_mut(&mut self, index: BufferIndex) -> (&mut T, &mut T) {
        let [a, b] = &mut self.values;
        if index == BufferIndex::ZERO {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl<T> Index<BufferIndex> for DoubleBuffered<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: BufferIndex) -> &T {
        self.get(index)
    }
}

impl<T> IndexMut<BufferIndex> for DoubleBuffered<T> {
    #[inline]
    fn index_mut(&mut self, index: BufferIndex) -> &mut T {
        self.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_one_slot_leaves_other_untouched() {
        for i in [BufferIndex::ZERO, BufferIndex::ONE] {
            let mut buf = DoubleBuffered::new(0_u32);
            buf[i] = 7;
            assert_eq!(buf[i], 7);
            assert_eq!(buf[i.other()], 0);
        }
    }

    #[test]
    fn swap_flips_both_indices() {
        let mut buffers = SceneGraphBuffers::new();
        assert_eq!(buffers.update_index(), BufferIndex::ZERO);
        assert_eq!(buffers.render_index(), BufferIndex::ONE);
        buffers.swap();
        assert_eq!(buffers.update_index(), BufferIndex::ONE);
        assert_eq!(buffers.render_index(), BufferIndex::ZERO);
    }

    #[test]
    fn both_mut_orders_requested_slot_first() {
        let mut buf = DoubleBuffered { values: [1, 2] };
        let (current, previous) = buf.both_mut(BufferIndex::ONE);
        assert_eq!((*current, *previous), (2, 1));
    }

    #[test]
    #[should_panic(expected = "buffer index out of range")]
    fn out_of_range_index_panics() {
        let _ = BufferIndex::new(2);
    }
}
