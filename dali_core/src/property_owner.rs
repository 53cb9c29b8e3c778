// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle state shared by every scene-graph object that owns properties.
//!
//! Observers are not called back directly. A [`PropertyOwner`] records the
//! ids of its observers, and the lifecycle methods return the
//! [`PropertyOwnerEvent`] that the caller then delivers to the containers
//! holding those observers. Observer storage is arena-backed, so an id whose
//! observer has already been pruned simply fails to resolve.

use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::memory_pool::MemoryPoolKey;
use crate::scene::{NodeKey, RendererKey};
use crate::uniform_map::{UniformMap, UniformPropertyMapping};

/// Identifies the object owning a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OwnerId {
    /// A scene-graph node.
    Node(NodeKey),
    /// A renderer.
    Renderer(RendererKey),
}

/// A lifecycle notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyOwnerEvent {
    /// The owner was (re)connected to the scene.
    Connected,
    /// The owner was removed from the scene during the frame writing
    /// `buffer_index`.
    Disconnected {
        /// Buffer being updated when the disconnect happened.
        buffer_index: BufferIndex,
    },
    /// The owner is about to be freed.
    Destroyed,
}

/// Type-erased handle to an observer living in some container's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(MemoryPoolKey<()>);

impl ObserverId {
    /// Wraps an arena key.
    #[must_use]
    pub const fn new<T>(key: MemoryPoolKey<T>) -> Self {
        Self(key.cast())
    }

    /// Recovers the typed key.
    #[must_use]
    pub const fn key<T>(self) -> MemoryPoolKey<T> {
        self.0.cast()
    }
}

/// Uniform bindings, observers and connection state of one object.
#[derive(Clone, Debug, Default)]
pub struct PropertyOwner {
    uniform_map: UniformMap,
    observers: SmallVec<[ObserverId; 4]>,
    connected: bool,
}

impl PropertyOwner {
    /// Creates a disconnected owner with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Observers --

    /// Registers an observer. Adding the same id twice is a caller bug.
    pub fn add_observer(&mut self, observer: ObserverId) {
        debug_assert!(
            !self.observers.contains(&observer),
            "observer registered twice"
        );
        self.observers.push(observer);
    }

    /// Unregisters an observer, returning whether it was registered.
    pub fn remove_observer(&mut self, observer: ObserverId) -> bool {
        match self.observers.iter().position(|&o| o == observer) {
            Some(index) => {
                self.observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Registered observers in registration order.
    #[must_use]
    pub fn observers(&self) -> &[ObserverId] {
        &self.observers
    }

    // -- Lifecycle --

    /// Whether the owner is part of the scene.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Marks the owner connected.
    pub fn connect(&mut self) -> PropertyOwnerEvent {
        self.connected = true;
        PropertyOwnerEvent::Connected
    }

    /// Marks the owner disconnected.
    pub fn disconnect(&mut self, buffer_index: BufferIndex) -> PropertyOwnerEvent {
        self.connected = false;
        PropertyOwnerEvent::Disconnected { buffer_index }
    }

    /// Prepares the owner for destruction. Observers are forgotten; the
    /// returned event must still be delivered to them.
    pub fn destroy(&mut self) -> (PropertyOwnerEvent, SmallVec<[ObserverId; 4]>) {
        self.connected = false;
        (PropertyOwnerEvent::Destroyed, core::mem::take(&mut self.observers))
    }

    // -- Uniforms --

    /// The owner's uniform bindings.
    #[must_use]
    pub fn uniform_map(&self) -> &UniformMap {
        &self.uniform_map
    }

    /// Adds a uniform binding.
    pub fn add_uniform_mapping(&mut self, mapping: UniformPropertyMapping) {
        self.uniform_map.add(mapping);
    }

    /// Removes the first binding named `uniform_name`.
    pub fn remove_uniform_mapping(&mut self, uniform_name: &str) -> bool {
        self.uniform_map.remove(uniform_name).is_some()
    }
}
