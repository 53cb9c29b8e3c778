// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size block pool with generation-checked keys.
//!
//! Scene-graph objects live in a [`MemoryPool`] and are referred to by
//! [`MemoryPoolKey`]s: a slot index plus a generation counter. Storage grows
//! in blocks that never move once allocated, so references handed out for the
//! duration of a borrow stay put while the pool grows, and keys remain valid
//! across growth. Freeing a slot bumps its generation, so a key that outlives
//! its object fails every lookup instead of resolving to whatever reuses the
//! slot.
//!
//! Block capacities start at [`MemoryPoolConfig::initial_capacity`] and double
//! for every new block up to [`MemoryPoolConfig::maximum_block_capacity`].
//!
//! [`SyncMemoryPool`] (requires `std`) adds the thread-safe entry points used
//! when the Event thread allocates objects the Update thread later reads.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Key index value meaning "no object".
pub const INVALID_KEY_INDEX: u32 = 0xffff_ffff;

/// Tuning for a [`MemoryPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryPoolConfig {
    /// Number of slots in the first block.
    pub initial_capacity: u32,
    /// Upper bound on the number of slots in any one block.
    pub maximum_block_capacity: u32,
    /// Upper bound on the number of blocks. Exceeding it is fatal.
    pub maximum_block_count: u32,
}

impl MemoryPoolConfig {
    /// Defaults suitable for node and renderer pools.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_capacity: 32,
            maximum_block_capacity: 1_048_576,
            maximum_block_count: u32::MAX,
        }
    }

    /// Returns a copy with a different first-block capacity.
    #[must_use]
    pub const fn with_initial_capacity(mut self, initial_capacity: u32) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Returns a copy with a different block count limit.
    #[must_use]
    pub const fn with_maximum_block_count(mut self, maximum_block_count: u32) -> Self {
        self.maximum_block_count = maximum_block_count;
        self
    }
}

impl Default for MemoryPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed, generation-checked handle to an object in a [`MemoryPool`].
///
/// The pool owns the object; the key is a weak reference plus the capability
/// to look it up. A default-constructed key is [`INVALID`](Self::INVALID).
pub struct MemoryPoolKey<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemoryPoolKey<T> {
    /// The "no object" key.
    pub const INVALID: Self = Self::from_raw(INVALID_KEY_INDEX, 0);

    /// Rebuilds a key from its parts, e.g. after crossing a message boundary.
    #[inline]
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Whether this key is not the [`INVALID`](Self::INVALID) sentinel.
    ///
    /// A valid key may still be stale; only the pool can tell.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_KEY_INDEX
    }

    /// Erases the object type, keeping index and generation.
    #[inline]
    #[must_use]
    pub const fn cast<U>(self) -> MemoryPoolKey<U> {
        MemoryPoolKey::from_raw(self.index, self.generation)
    }
}

impl<T> Clone for MemoryPoolKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemoryPoolKey<T> {}

impl<T> PartialEq for MemoryPoolKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for MemoryPoolKey<T> {}

impl<T> Hash for MemoryPoolKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for MemoryPoolKey<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> fmt::Debug for MemoryPoolKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Key({}@gen{})", self.index, self.generation)
        } else {
            f.write_str("Key(INVALID)")
        }
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: u32 },
}

#[derive(Debug)]
struct Block<T> {
    /// Global index of the first slot in this block.
    offset: u32,
    slots: Box<[Slot<T>]>,
}

/// A block allocator handing out [`MemoryPoolKey`]s.
///
/// Plain methods take `&mut self` and are meant for single-threaded use by
/// the owning thread. See [`SyncMemoryPool`] for shared use.
pub struct MemoryPool<T> {
    config: MemoryPoolConfig,
    blocks: Vec<Block<T>>,
    /// Global index of the first slot of the newest block.
    current_block_offset: u32,
    /// Slots handed out from the newest block so far.
    current_block_used: u32,
    /// Capacity of the newest block.
    current_block_capacity: u32,
    /// Head of the intrusive free list threaded through vacant slots.
    free_head: u32,
    /// Generation given to slots of freshly allocated blocks.
    generation_floor: u32,
    len: u32,
}

impl<T> fmt::Debug for MemoryPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("config", &self.config)
            .field("blocks", &self.blocks.len())
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<T> Default for MemoryPool<T> {
    fn default() -> Self {
        Self::new(MemoryPoolConfig::default())
    }
}

impl<T> MemoryPool<T> {
    /// Creates a pool and reserves its first block.
    ///
    /// # Panics
    ///
    /// Panics if `config.initial_capacity` is zero.
    #[must_use]
    pub fn new(config: MemoryPoolConfig) -> Self {
        assert!(config.initial_capacity > 0, "memory pool needs a non-empty first block");
        let mut pool = Self {
            config,
            blocks: Vec::new(),
            current_block_offset: 0,
            current_block_used: 0,
            current_block_capacity: 0,
            free_head: INVALID_KEY_INDEX,
            generation_floor: 0,
            len: 0,
        };
        pool.allocate_new_block();
        pool
    }

    /// Moves `value` into the pool and returns its key.
    ///
    /// # Panics
    ///
    /// Panics if the pool would exceed its configured block count or the
    /// `u32` key space. Running out of scene-graph storage is not recoverable.
    pub fn allocate(&mut self, value: T) -> MemoryPoolKey<T> {
        let index = if self.free_head != INVALID_KEY_INDEX {
            let index = self.free_head;
            let slot = self.slot_mut(index);
            let Slot::Vacant { next_free, .. } = *slot else {
                unreachable!("free list points at an occupied slot");
            };
            self.free_head = next_free;
            index
        } else {
            if self.current_block_used == self.current_block_capacity {
                self.allocate_new_block();
            }
            let index = self.current_block_offset + self.current_block_used;
            self.current_block_used += 1;
            index
        };

        let slot = self.slot_mut(index);
        let generation = match *slot {
            Slot::Vacant { generation, .. } => generation,
            Slot::Occupied { .. } => unreachable!("allocating over a live slot"),
        };
        *slot = Slot::Occupied { generation, value };
        self.len += 1;
        MemoryPoolKey::from_raw(index, generation)
    }

    /// Removes the object behind `key` and returns it.
    ///
    /// Returns `None` if the key is invalid or stale. Destructors are the
    /// caller's business: the value is handed back, not dropped.
    pub fn free(&mut self, key: MemoryPoolKey<T>) -> Option<T> {
        let free_head = self.free_head;
        let slot = self.locate_mut(key.index)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {}
            _ => {
                log::warn!("freeing stale or unknown key {key:?}");
                return None;
            }
        }
        let next_generation = key.generation.wrapping_add(1);
        let old = core::mem::replace(
            slot,
            Slot::Vacant {
                generation: next_generation,
                next_free: free_head,
            },
        );
        self.free_head = key.index;
        self.len -= 1;
        self.generation_floor = self.generation_floor.max(next_generation);
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Returns the object behind `key`, if it is still live.
    #[must_use]
    pub fn get(&self, key: MemoryPoolKey<T>) -> Option<&T> {
        match self.locate(key.index)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns the object behind `key` mutably, if it is still live.
    pub fn get_mut(&mut self, key: MemoryPoolKey<T>) -> Option<&mut T> {
        match self.locate_mut(key.index)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns mutable references to two distinct live objects.
    ///
    /// Returns `None` if either key is stale or both name the same object.
    pub fn get2_mut(
        &mut self,
        a: MemoryPoolKey<T>,
        b: MemoryPoolKey<T>,
    ) -> Option<(&mut T, &mut T)> {
        if a.index == b.index {
            return None;
        }
        let (block_a, local_a) = self.block_of(a.index)?;
        let (block_b, local_b) = self.block_of(b.index)?;
        let (slot_a, slot_b) = if block_a == block_b {
            let slots = &mut self.blocks[block_a].slots;
            if local_a < local_b {
                let (lo, hi) = slots.split_at_mut(local_b);
                (&mut lo[local_a], &mut hi[0])
            } else {
                let (lo, hi) = slots.split_at_mut(local_a);
                (&mut hi[0], &mut lo[local_b])
            }
        } else if block_a < block_b {
            let (lo, hi) = self.blocks.split_at_mut(block_b);
            (&mut lo[block_a].slots[local_a], &mut hi[0].slots[local_b])
        } else {
            let (lo, hi) = self.blocks.split_at_mut(block_a);
            (&mut hi[0].slots[local_a], &mut lo[block_b].slots[local_b])
        };
        match (slot_a, slot_b) {
            (
                Slot::Occupied {
                    generation: ga,
                    value: va,
                },
                Slot::Occupied {
                    generation: gb,
                    value: vb,
                },
            ) if *ga == a.generation && *gb == b.generation => Some((va, vb)),
            _ => None,
        }
    }

    /// Whether `key` refers to a live object.
    #[must_use]
    pub fn contains(&self, key: MemoryPoolKey<T>) -> bool {
        self.get(key).is_some()
    }

    /// Returns the address of the object behind `key`, if live.
    #[must_use]
    pub fn get_ptr_from_key(&self, key: MemoryPoolKey<T>) -> Option<*const T> {
        self.get(key).map(|value| value as *const T)
    }

    /// Maps an address inside the pool back to its key.
    ///
    /// Returns [`MemoryPoolKey::INVALID`] if `ptr` does not point at a live
    /// object of this pool. The pointer is only compared, never dereferenced.
    #[must_use]
    pub fn get_key_from_ptr(&self, ptr: *const T) -> MemoryPoolKey<T> {
        let slot_size = size_of::<Slot<T>>();
        if slot_size == 0 {
            return MemoryPoolKey::INVALID;
        }
        let addr = ptr as usize;
        for block in &self.blocks {
            let base = block.slots.as_ptr() as usize;
            let end = base + block.slots.len() * slot_size;
            if addr < base || addr >= end {
                continue;
            }
            let local = (addr - base) / slot_size;
            return match &block.slots[local] {
                Slot::Occupied { generation, value } if core::ptr::eq(value, ptr) => {
                    #[expect(
                        clippy::cast_possible_truncation,
                        reason = "block-local indices fit in a block capacity (u32)"
                    )]
                    let local = local as u32;
                    MemoryPoolKey::from_raw(block.offset + local, *generation)
                }
                _ => MemoryPoolKey::INVALID,
            };
        }
        MemoryPoolKey::INVALID
    }

    /// Number of slots currently reserved across all blocks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|b| b.slots.len()).sum()
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the pool holds no live objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every object and releases every block.
    ///
    /// Every key handed out before the reset becomes stale, including keys
    /// whose slot index is reused afterwards.
    pub fn reset_memory_pool(&mut self) {
        let floor = self
            .blocks
            .iter()
            .flat_map(|b| b.slots.iter())
            .map(|slot| match slot {
                Slot::Occupied { generation, .. } | Slot::Vacant { generation, .. } => *generation,
            })
            .fold(self.generation_floor, u32::max);
        log::debug!(
            "resetting memory pool: {} live objects, {} blocks",
            self.len,
            self.blocks.len()
        );
        self.blocks.clear();
        self.current_block_offset = 0;
        self.current_block_used = 0;
        self.current_block_capacity = 0;
        self.free_head = INVALID_KEY_INDEX;
        self.generation_floor = floor.wrapping_add(1);
        self.len = 0;
    }

    /// Iterates live objects with their keys, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (MemoryPoolKey<T>, &T)> + '_ {
        self.blocks.iter().flat_map(|block| {
            block.slots.iter().zip(block.offset..).filter_map(|(slot, index)| match slot {
                Slot::Occupied { generation, value } => {
                    Some((MemoryPoolKey::from_raw(index, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
        })
    }

    /// Iterates live objects mutably with their keys, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MemoryPoolKey<T>, &mut T)> + '_ {
        self.blocks.iter_mut().flat_map(|block| {
            block
                .slots
                .iter_mut()
                .zip(block.offset..)
                .filter_map(|(slot, index)| match slot {
                    Slot::Occupied { generation, value } => {
                        Some((MemoryPoolKey::from_raw(index, *generation), value))
                    }
                    Slot::Vacant { .. } => None,
                })
        })
    }

    // -- Internal helpers --

    fn allocate_new_block(&mut self) {
        let capacity = if self.blocks.is_empty() {
            self.config.initial_capacity
        } else {
            self.current_block_capacity
                .saturating_mul(2)
                .min(self.config.maximum_block_capacity)
        };
        assert!(
            (self.blocks.len() as u64) < u64::from(self.config.maximum_block_count),
            "memory pool exhausted: {} blocks in use",
            self.blocks.len()
        );
        let offset = if self.blocks.is_empty() {
            0
        } else {
            self.current_block_offset + self.current_block_capacity
        };
        assert!(
            u64::from(offset) + u64::from(capacity) < u64::from(INVALID_KEY_INDEX),
            "memory pool key space exhausted"
        );

        let generation = self.generation_floor;
        let slots: Box<[Slot<T>]> = (0..capacity)
            .map(|_| Slot::Vacant {
                generation,
                next_free: INVALID_KEY_INDEX,
            })
            .collect();
        log::debug!("memory pool growing by a block of {capacity} slots at offset {offset}");
        self.blocks.push(Block { offset, slots });
        self.current_block_offset = offset;
        self.current_block_capacity = capacity;
        self.current_block_used = 0;
    }

    fn block_of(&self, index: u32) -> Option<(usize, usize)> {
        if index == INVALID_KEY_INDEX {
            return None;
        }
        let block = self.blocks.partition_point(|b| b.offset <= index).checked_sub(1)?;
        let local = (index - self.blocks[block].offset) as usize;
        (local < self.blocks[block].slots.len()).then_some((block, local))
    }

    fn locate(&self, index: u32) -> Option<&Slot<T>> {
        let (block, local) = self.block_of(index)?;
        Some(&self.blocks[block].slots[local])
    }

    fn locate_mut(&mut self, index: u32) -> Option<&mut Slot<T>> {
        let (block, local) = self.block_of(index)?;
        Some(&mut self.blocks[block].slots[local])
    }

    fn slot_mut(&mut self, index: u32) -> &mut Slot<T> {
        match self.locate_mut(index) {
            Some(slot) => slot,
            None => unreachable!("slot index {index} outside the pool"),
        }
    }
}

/// A [`MemoryPool`] behind a lock, for allocation from several threads.
///
/// The Event thread creates objects with
/// [`allocate_thread_safe`](Self::allocate_thread_safe) while the Update
/// thread takes the lock once per frame with [`lock`](Self::lock) and works
/// on the guard.
#[cfg(feature = "std")]
pub struct SyncMemoryPool<T> {
    inner: parking_lot::Mutex<MemoryPool<T>>,
}

#[cfg(feature = "std")]
impl<T> fmt::Debug for SyncMemoryPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMemoryPool").finish_non_exhaustive()
    }
}

#[cfg(feature = "std")]
impl<T> SyncMemoryPool<T> {
    /// Creates a shared pool.
    #[must_use]
    pub fn new(config: MemoryPoolConfig) -> Self {
        Self {
            inner: parking_lot::Mutex::new(MemoryPool::new(config)),
        }
    }

    /// Allocates while another thread may be growing or reading the pool.
    pub fn allocate_thread_safe(&self, value: T) -> MemoryPoolKey<T> {
        self.inner.lock().allocate(value)
    }

    /// Frees while another thread may be using the pool.
    pub fn free_thread_safe(&self, key: MemoryPoolKey<T>) -> Option<T> {
        self.inner.lock().free(key)
    }

    /// Whether `key` refers to a live object.
    #[must_use]
    pub fn contains(&self, key: MemoryPoolKey<T>) -> bool {
        self.inner.lock().contains(key)
    }

    /// Locks the pool for a batch of single-threaded operations.
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, MemoryPool<T>> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    fn small_pool() -> MemoryPool<u64> {
        MemoryPool::new(MemoryPoolConfig::new().with_initial_capacity(2))
    }

    #[test]
    fn default_key_is_invalid() {
        let key = MemoryPoolKey::<u64>::default();
        assert_eq!(key, MemoryPoolKey::INVALID);
        assert!(!key.is_valid());
        assert_eq!(key.index(), 0xffff_ffff);
    }

    #[test]
    fn allocate_and_get() {
        let mut pool = small_pool();
        let a = pool.allocate(10);
        let b = pool.allocate(20);
        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool.get(b), Some(&20));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn key_and_pointer_round_trip() {
        let mut pool = small_pool();
        let keys: Vec<_> = (0..9).map(|i| pool.allocate(i)).collect();
        for key in keys {
            let ptr = pool.get_ptr_from_key(key).expect("live key");
            assert_eq!(pool.get_key_from_ptr(ptr), key);
        }
    }

    #[test]
    fn growth_does_not_move_objects() {
        let mut pool = small_pool();
        let first = pool.allocate(1);
        let before = pool.get_ptr_from_key(first);
        for i in 0..100 {
            pool.allocate(i);
        }
        assert_eq!(pool.get_ptr_from_key(first), before);
    }

    #[test]
    fn blocks_double_up_to_limit() {
        let mut pool = MemoryPool::new(MemoryPoolConfig {
            initial_capacity: 2,
            maximum_block_capacity: 4,
            maximum_block_count: u32::MAX,
        });
        assert_eq!(pool.capacity(), 2);
        for i in 0..3 {
            pool.allocate(i);
        }
        assert_eq!(pool.capacity(), 2 + 4);
        for i in 0..4 {
            pool.allocate(i);
        }
        assert_eq!(pool.capacity(), 2 + 4 + 4);
    }

    #[test]
    fn freed_key_is_stale_after_reuse() {
        let mut pool = small_pool();
        let a = pool.allocate(1);
        let ptr = pool.get_ptr_from_key(a).expect("live key");
        assert_eq!(pool.free(a), Some(1));
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.get_ptr_from_key(a), None);
        assert_eq!(pool.get_key_from_ptr(ptr), MemoryPoolKey::INVALID);

        let b = pool.allocate(2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.get(b), Some(&2));
    }

    #[test]
    fn double_free_returns_none() {
        let mut pool = small_pool();
        let a = pool.allocate(1);
        assert!(pool.free(a).is_some());
        assert!(pool.free(a).is_none());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn foreign_pointer_maps_to_invalid() {
        let pool = small_pool();
        let outside = 5_u64;
        assert_eq!(pool.get_key_from_ptr(&outside), MemoryPoolKey::INVALID);
    }

    #[test]
    fn reset_invalidates_every_key() {
        let mut pool = small_pool();
        let keys: Vec<_> = (0..5).map(|i| pool.allocate(i)).collect();
        pool.reset_memory_pool();
        assert_eq!(pool.capacity(), 0);
        assert!(pool.is_empty());
        let fresh = pool.allocate(99);
        assert_eq!(fresh.index(), 0);
        for key in keys {
            assert_eq!(pool.get(key), None);
        }
        assert_eq!(pool.get(fresh), Some(&99));
    }

    #[test]
    fn get2_mut_rejects_aliasing() {
        let mut pool = small_pool();
        let a = pool.allocate(1);
        let b = pool.allocate(2);
        let c = pool.allocate(3);
        assert!(pool.get2_mut(a, a).is_none());
        let (x, z) = pool.get2_mut(c, a).expect("distinct live keys");
        core::mem::swap(x, z);
        assert_eq!(pool.get(a), Some(&3));
        assert_eq!(pool.get(c), Some(&1));
        assert_eq!(pool.get(b), Some(&2));
    }

    #[test]
    fn iter_visits_live_objects_only() {
        let mut pool = small_pool();
        let keys: Vec<_> = (0..4).map(|i| pool.allocate(i)).collect();
        pool.free(keys[1]);
        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 2, 3]);
        for (key, value) in pool.iter_mut() {
            *value += u64::from(key.index());
        }
        assert_eq!(pool.get(keys[3]), Some(&6));
    }

    #[test]
    #[should_panic(expected = "memory pool exhausted")]
    fn exceeding_block_count_is_fatal() {
        let mut pool = MemoryPool::new(
            MemoryPoolConfig::new()
                .with_initial_capacity(1)
                .with_maximum_block_count(2),
        );
        for i in 0..4 {
            pool.allocate(i);
        }
    }

    #[cfg(feature = "std")]
    #[test]
    fn sync_pool_allocates_from_many_threads() {
        use std::sync::Arc;

        let pool = Arc::new(SyncMemoryPool::new(MemoryPoolConfig::new().with_initial_capacity(4)));
        let handles: Vec<_> = (0..4_u64)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    (0..50).map(|i| pool.allocate_thread_safe(t * 100 + i)).collect::<Vec<_>>()
                })
            })
            .collect();
        let keys: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("allocator thread"))
            .collect();
        let guard = pool.lock();
        assert_eq!(guard.len(), 200);
        assert!(keys.iter().all(|k| guard.contains(*k)));
    }
}
