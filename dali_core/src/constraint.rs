// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constraint storage split into active and deactivated lists.
//!
//! Continuous constraints run every frame. An [`ApplyRate::ApplyOnce`]
//! constraint runs until its applied count becomes non-zero, then moves to
//! the deactivated list where it stays until its rate changes.
//!
//! ```text
//!   push_back ──► active ──(apply-once, applied)──► deactivated
//!                   ▲                                   │
//!                   └──────── apply_rate_changed ───────┘
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;

use crate::buffer::BufferIndex;

/// How often a constraint is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ApplyRate {
    /// Every frame.
    #[default]
    Continuous,
    /// Until applied once.
    ApplyOnce,
}

/// Caller-chosen label used to remove a group of constraints at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintTag(pub u32);

impl ConstraintTag {
    /// The tag of untagged constraints.
    pub const NONE: Self = Self(0);
}

/// Hands out unique [`ConstraintTag`]s and recycles released ones.
///
/// One allocator is created with the update manager and shared by every
/// producer of tagged constraints.
#[derive(Clone, Debug)]
pub struct TagAllocator {
    next: u32,
    free: Vec<u32>,
}

impl TagAllocator {
    /// Creates an allocator whose first tag is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: 1,
            free: Vec::new(),
        }
    }

    /// Returns an unused tag.
    ///
    /// # Panics
    ///
    /// Panics if every `u32` tag is in use.
    pub fn allocate(&mut self) -> ConstraintTag {
        if let Some(tag) = self.free.pop() {
            return ConstraintTag(tag);
        }
        let tag = self.next;
        assert!(tag != u32::MAX, "constraint tags exhausted");
        self.next = tag + 1;
        ConstraintTag(tag)
    }

    /// Returns `tag` for reuse.
    pub fn release(&mut self, tag: ConstraintTag) {
        debug_assert!(tag != ConstraintTag::NONE, "releasing the untagged tag");
        debug_assert!(!self.free.contains(&tag.0), "tag released twice");
        self.free.push(tag.0);
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A function computing one property from others, run on the Update thread.
pub trait Constraint<C> {
    /// Writes the constrained value into slot `buffer_index`.
    ///
    /// Implementations bump their applied count.
    fn apply(&mut self, buffer_index: BufferIndex, ctx: &mut C);

    /// Current apply rate.
    fn apply_rate(&self) -> ApplyRate;

    /// Changes the apply rate. Call
    /// [`ConstraintContainer::apply_rate_changed`] afterwards.
    fn set_apply_rate(&mut self, rate: ApplyRate);

    /// Number of times [`apply`](Self::apply) has run.
    fn applied_count(&self) -> u32;

    /// Label used by [`ConstraintContainer::remove_by_tag`].
    fn tag(&self) -> ConstraintTag {
        ConstraintTag::NONE
    }

    /// Whether this constraint belongs in the deactivated list.
    fn is_spent(&self) -> bool {
        self.apply_rate() == ApplyRate::ApplyOnce && self.applied_count() > 0
    }
}

/// Identifies a constraint within its container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u32);

/// Owned constraint object.
pub type BoxedConstraint<C> = Box<dyn Constraint<C> + Send>;

struct Entry<C> {
    id: ConstraintId,
    constraint: BoxedConstraint<C>,
}

/// Owns the constraints of one object.
pub struct ConstraintContainer<C> {
    active: Vec<Entry<C>>,
    deactivated: Vec<Entry<C>>,
    next_id: u32,
}

impl<C> fmt::Debug for ConstraintContainer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintContainer")
            .field("active", &self.active.len())
            .field("deactivated", &self.deactivated.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<C> Default for ConstraintContainer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ConstraintContainer<C> {
    /// Creates an empty container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: Vec::new(),
            deactivated: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a constraint, classifying it by its current applied count.
    pub fn push_back(&mut self, constraint: BoxedConstraint<C>) -> ConstraintId {
        let id = ConstraintId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let entry = Entry { id, constraint };
        if entry.constraint.is_spent() {
            self.deactivated.push(entry);
        } else {
            self.active.push(entry);
        }
        id
    }

    /// Applies active constraints in insertion order, then moves the spent
    /// ones to the deactivated list.
    ///
    /// Returns the ids deactivated by this pass.
    pub fn apply(
        &mut self,
        buffer_index: BufferIndex,
        ctx: &mut C,
    ) -> SmallVec<[ConstraintId; 4]> {
        let mut spent: SmallVec<[usize; 8]> = SmallVec::new();
        for (index, entry) in self.active.iter_mut().enumerate() {
            entry.constraint.apply(buffer_index, ctx);
            if entry.constraint.is_spent() {
                spent.push(index);
            }
        }
        let mut deactivated = SmallVec::new();
        for &index in spent.iter().rev() {
            let entry = self.active.remove(index);
            deactivated.push(entry.id);
            self.deactivated.push(entry);
        }
        deactivated
    }

    /// Whether `id` is in the active list.
    #[must_use]
    pub fn is_active(&self, id: ConstraintId) -> bool {
        find(&self.active, id).is_some()
    }

    /// Re-files a constraint after its apply rate changed.
    ///
    /// Returns `false` if the constraint is not in this container.
    pub fn apply_rate_changed(&mut self, id: ConstraintId) -> bool {
        if let Some(index) = find(&self.deactivated, id) {
            if !self.deactivated[index].constraint.is_spent() {
                let entry = self.deactivated.remove(index);
                self.active.push(entry);
            }
            return true;
        }
        if let Some(index) = find(&self.active, id) {
            if self.active[index].constraint.is_spent() {
                let entry = self.active.remove(index);
                self.deactivated.push(entry);
            }
            return true;
        }
        false
    }

    /// Removes a constraint from whichever list holds it.
    pub fn erase_object(&mut self, id: ConstraintId) -> Option<BoxedConstraint<C>> {
        let removed = if let Some(index) = find(&self.active, id) {
            Some(self.active.remove(index))
        } else {
            find(&self.deactivated, id).map(|index| self.deactivated.remove(index))
        };
        debug_assert!(
            removed.is_some(),
            "erasing a constraint not held by this container"
        );
        removed.map(|entry| entry.constraint)
    }

    /// Removes every constraint carrying `tag`, returning how many were
    /// removed.
    pub fn remove_by_tag(&mut self, tag: ConstraintTag) -> usize {
        let before = self.len();
        self.active.retain(|e| e.constraint.tag() != tag);
        self.deactivated.retain(|e| e.constraint.tag() != tag);
        before - self.len()
    }

    /// Mutable access to a constraint, e.g. to change its rate.
    pub fn get_mut(&mut self, id: ConstraintId) -> Option<&mut (dyn Constraint<C> + Send)> {
        let entry = self
            .active
            .iter_mut()
            .chain(self.deactivated.iter_mut())
            .find(|e| e.id == id)?;
        Some(entry.constraint.as_mut())
    }

    /// Drops every constraint.
    pub fn clear(&mut self) {
        self.active.clear();
        self.deactivated.clear();
    }

    /// Ids of active constraints in application order.
    pub fn active(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.active.iter().map(|e| e.id)
    }

    /// Ids of deactivated constraints.
    pub fn deactivated(&self) -> impl Iterator<Item = ConstraintId> + '_ {
        self.deactivated.iter().map(|e| e.id)
    }

    /// Total number of constraints held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len() + self.deactivated.len()
    }

    /// Whether the container holds no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.deactivated.is_empty()
    }
}

fn find<C>(entries: &[Entry<C>], id: ConstraintId) -> Option<usize> {
    entries.iter().position(|e| e.id == id)
}
