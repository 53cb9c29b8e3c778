// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame restoration of base values.
//!
//! Animations and constraints write only the slot being updated. Before they
//! run each frame, a [`Resetter`] copies base values back into that slot.
//! Because the two slots are written on alternate frames, a resetter must run
//! on two consecutive frames after any change before both slots agree:
//!
//! ```text
//!   Active(2) ──reset──► Aging(1) ──reset──► Stopped(0) ──► pruned
//!      ▲                                         │
//!      └──────────────── Connected ──────────────┘ (while still held)
//! ```
//!
//! Resetters live in an arena owned by a [`ResetterContainer`]. Targets hold
//! [`ObserverId`]s of their resetters, and the container resolves those ids
//! when a [`PropertyOwnerEvent`] is delivered. A destroyed target is never
//! dereferenced again: its resetters drop their key and stop.

use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::memory_pool::{MemoryPool, MemoryPoolKey};
use crate::property::{PropertyBase, PropertyIndex};
use crate::property_owner::{ObserverId, PropertyOwner, PropertyOwnerEvent};
use crate::scene::{Node, NodeProperty, Renderer, RendererProperty};

/// Aging state of a resetter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResetterState {
    /// Finished; the container prunes it.
    Stopped = 0,
    /// One more reset to go.
    Aging = 1,
    /// Two more resets to go.
    Active = 2,
}

impl ResetterState {
    const fn decremented(self) -> Self {
        match self {
            Self::Active => Self::Aging,
            Self::Aging | Self::Stopped => Self::Stopped,
        }
    }
}

/// A scene-graph object whose properties a [`Resetter`] can restore.
pub trait ResetTarget {
    /// Lifecycle state.
    fn property_owner(&self) -> &PropertyOwner;

    /// Mutable lifecycle state, for observer registration.
    fn property_owner_mut(&mut self) -> &mut PropertyOwner;

    /// Restores every animatable property in slot `index`.
    fn reset_to_base_values(&mut self, index: BufferIndex);

    /// Forces every animatable property through two more resets.
    fn mark_properties_dirty(&mut self);

    /// One property as a reset target.
    fn property_base_mut(&mut self, property: PropertyIndex) -> Option<&mut dyn PropertyBase>;
}

impl ResetTarget for Node {
    fn property_owner(&self) -> &PropertyOwner {
        self.owner()
    }

    fn property_owner_mut(&mut self) -> &mut PropertyOwner {
        self.owner_mut()
    }

    fn reset_to_base_values(&mut self, index: BufferIndex) {
        Self::reset_to_base_values(self, index);
    }

    fn mark_properties_dirty(&mut self) {
        Self::mark_properties_dirty(self);
    }

    fn property_base_mut(&mut self, property: PropertyIndex) -> Option<&mut dyn PropertyBase> {
        let property = NodeProperty::from_index(property)?;
        Some(self.property_mut(property).into_base())
    }
}

impl ResetTarget for Renderer {
    fn property_owner(&self) -> &PropertyOwner {
        self.owner()
    }

    fn property_owner_mut(&mut self) -> &mut PropertyOwner {
        self.owner_mut()
    }

    fn reset_to_base_values(&mut self, index: BufferIndex) {
        Self::reset_to_base_values(self, index);
    }

    fn mark_properties_dirty(&mut self) {
        Self::mark_properties_dirty(self);
    }

    fn property_base_mut(&mut self, property: PropertyIndex) -> Option<&mut dyn PropertyBase> {
        let property = RendererProperty::from_index(property)?;
        Some(self.property_mut(property).into_base())
    }
}

/// Restores the base values of one object, or one of its properties.
pub struct Resetter<T> {
    target: MemoryPoolKey<T>,
    property: Option<PropertyIndex>,
    state: ResetterState,
    disconnected: bool,
    held: bool,
}

/// Resets every property of a node.
pub type NodeResetter = Resetter<Node>;
/// Resets every property of a renderer.
pub type RendererResetter = Resetter<Renderer>;

impl<T> fmt::Debug for Resetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resetter")
            .field("target", &self.target)
            .field("property", &self.property)
            .field("state", &self.state)
            .field("disconnected", &self.disconnected)
            .field("held", &self.held)
            .finish()
    }
}

impl<T: ResetTarget> Resetter<T> {
    /// Resets every property of `target`, e.g. while it is animated.
    #[must_use]
    pub fn for_object(target: MemoryPoolKey<T>) -> Self {
        Self {
            target,
            property: None,
            state: ResetterState::Active,
            disconnected: false,
            held: false,
        }
    }

    /// Resets one property of `target` for as long as it is held.
    ///
    /// Used by constraints: the resetter stays active while the constraint
    /// lives, then ages out once [`release`](Self::release)d.
    #[must_use]
    pub fn for_property(target: MemoryPoolKey<T>, property: PropertyIndex) -> Self {
        Self {
            target,
            property: Some(property),
            state: ResetterState::Active,
            disconnected: false,
            held: true,
        }
    }

    /// The object being reset, or [`MemoryPoolKey::INVALID`] once destroyed.
    #[must_use]
    pub fn target(&self) -> MemoryPoolKey<T> {
        self.target
    }

    /// Current aging state.
    #[must_use]
    pub fn state(&self) -> ResetterState {
        self.state
    }

    /// Whether the target was disconnected since its last connect.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Whether the container should drop this resetter.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == ResetterState::Stopped
    }

    /// Lets a held resetter age out.
    pub fn release(&mut self) {
        self.held = false;
    }

    /// Restarts aging, e.g. after the target was written again.
    ///
    /// Has no effect once the target is destroyed.
    pub fn rearm(&mut self) {
        if self.target.is_valid() {
            self.state = ResetterState::Active;
        }
    }

    /// Writes base values into slot `index` and ages one step.
    pub fn reset_to_base_value(&mut self, index: BufferIndex, targets: &mut MemoryPool<T>) {
        if self.state == ResetterState::Stopped {
            return;
        }
        let Some(target) = targets.get_mut(self.target) else {
            self.stop();
            return;
        };
        match self.property {
            None => target.reset_to_base_values(index),
            Some(property) => {
                if let Some(base) = target.property_base_mut(property) {
                    base.reset_to_base_value(index);
                }
            }
        }
        if !self.held {
            self.state = self.state.decremented();
        }
    }

    /// Reacts to a lifecycle event of the target.
    ///
    /// Disconnecting only marks the resetter. Node and renderer resetters
    /// both stay registered with their target and keep aging, so the two
    /// slots still converge while the target is off the scene; a later
    /// [`Connected`](PropertyOwnerEvent::Connected) rearms them. A renderer
    /// is disconnected when it is detached from its last node, which makes
    /// reconnecting common, and its resetter must still be observing then.
    pub fn on_event(&mut self, event: PropertyOwnerEvent, target: Option<&mut T>) {
        match event {
            PropertyOwnerEvent::Connected => {
                self.state = ResetterState::Active;
                self.disconnected = false;
                if let Some(target) = target {
                    match self.property {
                        None => target.mark_properties_dirty(),
                        Some(property) => {
                            if let Some(base) = target.property_base_mut(property) {
                                base.mark_as_dirty();
                            }
                        }
                    }
                }
            }
            PropertyOwnerEvent::Disconnected { .. } => {
                self.disconnected = true;
            }
            PropertyOwnerEvent::Destroyed => self.stop(),
        }
    }

    fn stop(&mut self) {
        self.target = MemoryPoolKey::INVALID;
        self.state = ResetterState::Stopped;
    }
}

/// Handle to a resetter inside a [`ResetterContainer`].
pub type ResetterKey<T> = MemoryPoolKey<Resetter<T>>;

/// Ordered, arena-backed resetters for one target type.
pub struct ResetterContainer<T> {
    pool: MemoryPool<Resetter<T>>,
    order: Vec<ResetterKey<T>>,
}

impl<T> fmt::Debug for ResetterContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetterContainer")
            .field("len", &self.order.len())
            .finish_non_exhaustive()
    }
}

impl<T: ResetTarget> Default for ResetterContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResetTarget> ResetterContainer<T> {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: MemoryPool::default(),
            order: Vec::new(),
        }
    }

    /// Takes ownership of `resetter` and registers it with its target.
    pub fn add(&mut self, resetter: Resetter<T>, targets: &mut MemoryPool<T>) -> ResetterKey<T> {
        let target = resetter.target;
        let key = self.pool.allocate(resetter);
        self.order.push(key);
        match targets.get_mut(target) {
            Some(t) => t.property_owner_mut().add_observer(ObserverId::new(key)),
            None => {
                log::warn!("resetter added for missing target {target:?}");
                if let Some(r) = self.pool.get_mut(key) {
                    r.stop();
                }
            }
        }
        key
    }

    /// Runs every resetter once and drops the finished ones, in one pass.
    ///
    /// Returns the number of resetters pruned.
    pub fn reset_to_base_values(&mut self, index: BufferIndex, targets: &mut MemoryPool<T>) -> usize {
        let Self { pool, order } = self;
        let before = order.len();
        order.retain(|&key| {
            let Some(resetter) = pool.get_mut(key) else {
                return false;
            };
            resetter.reset_to_base_value(index, targets);
            if !resetter.is_finished() {
                return true;
            }
            let target = resetter.target;
            pool.free(key);
            if let Some(t) = targets.get_mut(target) {
                t.property_owner_mut().remove_observer(ObserverId::new(key));
            }
            false
        });
        let pruned = before - order.len();
        if pruned > 0 {
            log::trace!("pruned {pruned} finished resetters");
        }
        pruned
    }

    /// Delivers `event` to every resetter among `observers`.
    ///
    /// `target` is the object the event is about, when it still exists.
    pub fn notify(
        &mut self,
        observers: &[ObserverId],
        event: PropertyOwnerEvent,
        mut target: Option<&mut T>,
    ) {
        for &observer in observers {
            if let Some(resetter) = self.pool.get_mut(observer.key()) {
                resetter.on_event(event, target.as_deref_mut());
            }
        }
    }

    /// Delivers `event` to the resetters observing `target`.
    pub fn notify_target(
        &mut self,
        target: MemoryPoolKey<T>,
        event: PropertyOwnerEvent,
        targets: &mut MemoryPool<T>,
    ) {
        let Some(object) = targets.get_mut(target) else {
            return;
        };
        let observers: SmallVec<[ObserverId; 4]> =
            object.property_owner().observers().iter().copied().collect();
        self.notify(&observers, event, Some(object));
    }

    /// Lets a held resetter age out.
    pub fn release(&mut self, key: ResetterKey<T>) {
        if let Some(resetter) = self.pool.get_mut(key) {
            resetter.release();
        }
    }

    /// Restarts aging of a live resetter, returning `false` if it is gone
    /// or its target was destroyed.
    pub fn rearm(&mut self, key: ResetterKey<T>) -> bool {
        match self.pool.get_mut(key) {
            Some(resetter) if resetter.target.is_valid() => {
                resetter.rearm();
                true
            }
            _ => false,
        }
    }

    /// Removes a resetter immediately.
    pub fn erase_object(&mut self, key: ResetterKey<T>, targets: &mut MemoryPool<T>) {
        let removed = self.pool.free(key);
        debug_assert!(
            removed.is_some(),
            "erasing a resetter not held by this container"
        );
        let Some(resetter) = removed else {
            return;
        };
        self.order.retain(|&k| k != key);
        if let Some(t) = targets.get_mut(resetter.target) {
            t.property_owner_mut().remove_observer(ObserverId::new(key));
        }
    }

    /// Looks up a resetter.
    #[must_use]
    pub fn get(&self, key: ResetterKey<T>) -> Option<&Resetter<T>> {
        self.pool.get(key)
    }

    /// Number of live resetters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no resetter is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use crate::property::PropertyValue;

    const B0: BufferIndex = BufferIndex::ZERO;
    const B1: BufferIndex = BufferIndex::ONE;

    fn setup() -> (MemoryPool<Node>, MemoryPoolKey<Node>) {
        let mut nodes = MemoryPool::default();
        let key = nodes.allocate(Node::new());
        (nodes, key)
    }

    #[test]
    fn fresh_resetter_finishes_after_two_resets() {
        let (mut nodes, key) = setup();
        let mut resetter = NodeResetter::for_object(key);
        assert_eq!(resetter.state(), ResetterState::Active);
        resetter.reset_to_base_value(B0, &mut nodes);
        assert_eq!(resetter.state(), ResetterState::Aging);
        resetter.reset_to_base_value(B1, &mut nodes);
        assert!(resetter.is_finished());
    }

    #[test]
    fn connect_rearms_aging() {
        let (mut nodes, key) = setup();
        let mut resetter = NodeResetter::for_object(key);
        resetter.reset_to_base_value(B0, &mut nodes);
        resetter.on_event(PropertyOwnerEvent::Connected, nodes.get_mut(key));
        assert_eq!(resetter.state(), ResetterState::Active);
        resetter.reset_to_base_value(B1, &mut nodes);
        assert!(!resetter.is_finished());
        resetter.reset_to_base_value(B0, &mut nodes);
        assert!(resetter.is_finished());
    }

    #[test]
    fn disconnect_does_not_stop() {
        let (_, key) = setup();
        let mut resetter = NodeResetter::for_object(key);
        resetter.on_event(
            PropertyOwnerEvent::Disconnected { buffer_index: B0 },
            None,
        );
        assert!(resetter.is_disconnected());
        assert_eq!(resetter.state(), ResetterState::Active);
    }

    #[test]
    fn renderer_resetter_keeps_observing_across_disconnect() {
        let mut renderers = MemoryPool::default();
        let key = renderers.allocate(Renderer::new(1));
        let mut container = ResetterContainer::new();
        let r = container.add(RendererResetter::for_object(key), &mut renderers);
        let opacity = |pool: &MemoryPool<Renderer>, index| {
            pool.get(key)
                .expect("renderer")
                .property(RendererProperty::Opacity, index)
        };

        renderers
            .get_mut(key)
            .expect("renderer")
            .property_mut(RendererProperty::Opacity)
            .set(B0, PropertyValue::Float(0.25))
            .expect("typed set");
        assert_eq!(container.reset_to_base_values(B0, &mut renderers), 0);
        assert_eq!(opacity(&renderers, B0), PropertyValue::Float(1.0));
        assert_eq!(container.get(r).map(Resetter::state), Some(ResetterState::Aging));

        let event = renderers
            .get_mut(key)
            .expect("renderer")
            .owner_mut()
            .disconnect(B1);
        container.notify_target(key, event, &mut renderers);
        let resetter = container.get(r).expect("still observing");
        assert!(resetter.is_disconnected());
        assert_eq!(resetter.state(), ResetterState::Aging);
        assert_eq!(
            renderers.get(key).expect("renderer").owner().observers().len(),
            1
        );

        let event = renderers.get_mut(key).expect("renderer").owner_mut().connect();
        container.notify_target(key, event, &mut renderers);
        let resetter = container.get(r).expect("still observing");
        assert!(!resetter.is_disconnected());
        assert_eq!(resetter.state(), ResetterState::Active);

        assert_eq!(container.reset_to_base_values(B1, &mut renderers), 0);
        assert_eq!(container.reset_to_base_values(B0, &mut renderers), 1);
        assert!(container.get(r).is_none());
        assert!(renderers.get(key).expect("renderer").owner().observers().is_empty());
        assert_eq!(opacity(&renderers, B1), PropertyValue::Float(1.0));
    }

    #[test]
    fn disconnected_renderer_resetter_still_stops() {
        let mut renderers = MemoryPool::default();
        let key = renderers.allocate(Renderer::new(2));
        let mut container = ResetterContainer::new();
        container.add(RendererResetter::for_object(key), &mut renderers);
        let event = renderers
            .get_mut(key)
            .expect("renderer")
            .owner_mut()
            .disconnect(B0);
        container.notify_target(key, event, &mut renderers);
        assert_eq!(container.reset_to_base_values(B0, &mut renderers), 0);
        assert_eq!(container.reset_to_base_values(B1, &mut renderers), 1);
        assert!(container.is_empty());
    }

    #[test]
    fn destroy_stops_and_forgets_target() {
        let (_, key) = setup();
        let mut resetter = NodeResetter::for_object(key);
        resetter.on_event(PropertyOwnerEvent::Destroyed, None);
        assert!(resetter.is_finished());
        assert!(!resetter.target().is_valid());
    }

    #[test]
    fn resetter_restores_animated_value() {
        let (mut nodes, key) = setup();
        let node = nodes.get_mut(key).expect("node");
        node.set_property(
            NodeProperty::Position,
            PropertyValue::Vector3(Vector3::new(5.0, 0.0, 0.0)),
            B0,
        )
        .expect("typed set");
        let mut resetter = NodeResetter::for_object(key);
        resetter.reset_to_base_value(B0, &mut nodes);
        assert_eq!(nodes.get(key).expect("node").position(B0), Vector3::ZERO);
    }

    #[test]
    fn container_prunes_in_the_same_pass() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        container.add(NodeResetter::for_object(key), &mut nodes);
        assert_eq!(nodes.get(key).expect("node").owner().observers().len(), 1);

        assert_eq!(container.reset_to_base_values(B0, &mut nodes), 0);
        assert_eq!(container.reset_to_base_values(B1, &mut nodes), 1);
        assert!(container.is_empty());
        assert!(nodes.get(key).expect("node").owner().observers().is_empty());
    }

    #[test]
    fn held_property_resetter_waits_for_release() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        let r = container.add(
            NodeResetter::for_property(key, NodeProperty::Color.index()),
            &mut nodes,
        );
        for frame in 0..6 {
            let index = BufferIndex::new(frame % 2);
            assert_eq!(container.reset_to_base_values(index, &mut nodes), 0);
        }
        container.release(r);
        container.reset_to_base_values(B0, &mut nodes);
        assert_eq!(container.reset_to_base_values(B1, &mut nodes), 1);
    }

    #[test]
    fn notify_reaches_observers_of_target() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        let r = container.add(NodeResetter::for_object(key), &mut nodes);
        container.reset_to_base_values(B0, &mut nodes);
        assert_eq!(container.get(r).map(Resetter::state), Some(ResetterState::Aging));
        container.notify_target(key, PropertyOwnerEvent::Connected, &mut nodes);
        assert_eq!(container.get(r).map(Resetter::state), Some(ResetterState::Active));
    }

    #[test]
    fn destroyed_target_is_pruned_without_access() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        container.add(NodeResetter::for_object(key), &mut nodes);
        let (event, observers) = nodes.get_mut(key).expect("node").owner_mut().destroy();
        nodes.free(key);
        container.notify(&observers, event, None);
        assert_eq!(container.reset_to_base_values(B0, &mut nodes), 1);
    }

    #[test]
    fn rearm_extends_aging() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        let r = container.add(NodeResetter::for_object(key), &mut nodes);
        container.reset_to_base_values(B0, &mut nodes);
        assert!(container.rearm(r));
        assert_eq!(container.reset_to_base_values(B1, &mut nodes), 0);
        assert_eq!(container.reset_to_base_values(B0, &mut nodes), 1);
        assert!(!container.rearm(r));
    }

    #[test]
    fn erase_object_unregisters() {
        let (mut nodes, key) = setup();
        let mut container = ResetterContainer::new();
        let r = container.add(NodeResetter::for_object(key), &mut nodes);
        container.erase_object(r, &mut nodes);
        assert!(container.is_empty());
        assert!(nodes.get(key).expect("node").owner().observers().is_empty());
    }
}
