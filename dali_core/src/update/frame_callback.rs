// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame hooks run on the Update thread after constraints.

use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::error::Error;
use crate::math::Vector4;
use crate::memory_pool::MemoryPool;
use crate::property::PropertyValue;
use crate::scene::{Node, NodeKey, NodeProperty};
use crate::transform::Matrix;

/// Identifies a registered [`FrameCallback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameCallbackId(pub u32);

/// Code run once per update, with access to node properties.
///
/// Implemented for any `FnMut(&mut UpdateProxy<'_>, f32) -> bool`.
pub trait FrameCallback {
    /// Runs for one frame. `elapsed_seconds` is the time since the last
    /// update.
    ///
    /// Returns whether the callback needs another update even if nothing
    /// else changes.
    fn update(&mut self, proxy: &mut UpdateProxy<'_>, elapsed_seconds: f32) -> bool;
}

impl<F> FrameCallback for F
where
    F: FnMut(&mut UpdateProxy<'_>, f32) -> bool,
{
    fn update(&mut self, proxy: &mut UpdateProxy<'_>, elapsed_seconds: f32) -> bool {
        self(proxy, elapsed_seconds)
    }
}

/// Node access handed to frame callbacks.
///
/// Writes made through [`set_property`](Self::set_property) last one frame:
/// the update manager arms a resetter for every node touched.
#[derive(Debug)]
pub struct UpdateProxy<'a> {
    nodes: &'a mut MemoryPool<Node>,
    buffer_index: BufferIndex,
    touched: SmallVec<[NodeKey; 8]>,
}

impl<'a> UpdateProxy<'a> {
    pub(crate) fn new(nodes: &'a mut MemoryPool<Node>, buffer_index: BufferIndex) -> Self {
        Self {
            nodes,
            buffer_index,
            touched: SmallVec::new(),
        }
    }

    /// Slot being written this frame.
    #[must_use]
    pub fn buffer_index(&self) -> BufferIndex {
        self.buffer_index
    }

    /// Current value of a node property.
    #[must_use]
    pub fn property(&self, node: NodeKey, property: NodeProperty) -> Option<PropertyValue> {
        self.nodes
            .get(node)
            .map(|n| n.property(property, self.buffer_index))
    }

    /// Last frame's world matrix; this frame's is computed after callbacks.
    #[must_use]
    pub fn world_matrix(&self, node: NodeKey) -> Option<Matrix> {
        self.nodes
            .get(node)
            .map(|n| n.world_matrix(self.buffer_index.other()))
    }

    /// Last frame's world color.
    #[must_use]
    pub fn world_color(&self, node: NodeKey) -> Option<Vector4> {
        self.nodes
            .get(node)
            .map(|n| n.world_color(self.buffer_index.other()))
    }

    /// Writes a property for this frame only.
    pub fn set_property(
        &mut self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        let target = self.nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        target.set_property(property, value, self.buffer_index)?;
        if !self.touched.contains(&node) {
            self.touched.push(node);
        }
        Ok(())
    }

    /// Writes a property's base value.
    pub fn bake_property(
        &mut self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        self.nodes
            .get_mut(node)
            .ok_or(Error::StaleNode(node))?
            .bake_property(property, value, self.buffer_index)
    }

    pub(crate) fn into_touched(self) -> SmallVec<[NodeKey; 8]> {
        self.touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn closures_are_callbacks() {
        let mut nodes = MemoryPool::default();
        let key = nodes.allocate(Node::new());
        let mut callback = |proxy: &mut UpdateProxy<'_>, dt: f32| {
            proxy
                .set_property(
                    key,
                    NodeProperty::Position,
                    PropertyValue::Vector3(Vector3::new(dt, 0.0, 0.0)),
                )
                .is_ok()
        };
        let mut proxy = UpdateProxy::new(&mut nodes, BufferIndex::ZERO);
        assert!(FrameCallback::update(&mut callback, &mut proxy, 0.5));
        assert_eq!(
            proxy.property(key, NodeProperty::Position),
            Some(PropertyValue::Vector3(Vector3::new(0.5, 0.0, 0.0)))
        );
        assert_eq!(proxy.into_touched().as_slice(), [key]);
    }

    #[test]
    fn stale_node_is_an_error() {
        let mut nodes = MemoryPool::default();
        let key = nodes.allocate(Node::new());
        nodes.free(key);
        let mut proxy = UpdateProxy::new(&mut nodes, BufferIndex::ZERO);
        assert_eq!(
            proxy.bake_property(key, NodeProperty::Visible, PropertyValue::Boolean(false)),
            Err(Error::StaleNode(key))
        );
        assert_eq!(proxy.property(key, NodeProperty::Visible), None);
    }
}
