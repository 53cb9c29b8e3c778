// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-graph nodes.

use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::error::Error;
use crate::math::{Vector3, Vector4};
use crate::memory_pool::MemoryPoolKey;
use crate::partial_render::PartialRenderingNodeData;
use crate::property::{
    AnimatableProperty, AnimatablePropertyMut, InheritedProperty, PropertyBase, PropertyIndex,
    PropertyType, PropertyValue,
};
use crate::property_owner::PropertyOwner;
use crate::transform::Matrix;

use super::renderer::RendererKey;

/// Handle to a [`Node`] in the node pool.
pub type NodeKey = MemoryPoolKey<Node>;

/// Animatable properties of a [`Node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NodeProperty {
    /// Translation relative to the parent.
    Position = 0,
    /// Size of the node's content.
    Size = 1,
    /// Scale relative to the parent.
    Scale = 2,
    /// Rotation about Z, in radians.
    Orientation = 3,
    /// Color multiplied down the tree.
    Color = 4,
    /// Whether the node and its subtree are drawn.
    Visible = 5,
}

impl NodeProperty {
    /// Every node property, in index order.
    pub const ALL: [Self; 6] = [
        Self::Position,
        Self::Size,
        Self::Scale,
        Self::Orientation,
        Self::Color,
        Self::Visible,
    ];

    /// Looks a property up by index.
    #[must_use]
    pub const fn from_index(index: PropertyIndex) -> Option<Self> {
        Some(match index.0 {
            0 => Self::Position,
            1 => Self::Size,
            2 => Self::Scale,
            3 => Self::Orientation,
            4 => Self::Color,
            5 => Self::Visible,
            _ => return None,
        })
    }

    /// The property's index.
    #[must_use]
    pub const fn index(self) -> PropertyIndex {
        PropertyIndex(self as u32)
    }

    /// Value type stored by the property.
    #[must_use]
    pub const fn property_type(self) -> PropertyType {
        match self {
            Self::Position | Self::Size | Self::Scale => PropertyType::Vector3,
            Self::Orientation => PropertyType::Float,
            Self::Color => PropertyType::Vector4,
            Self::Visible => PropertyType::Boolean,
        }
    }
}

/// A renderer attached to a node, with the pair's partial-rendering state.
#[derive(Clone, Copy, Debug)]
pub struct RendererAttachment {
    /// The attached renderer.
    pub renderer: RendererKey,
    /// Snapshots for skipping unchanged draws.
    pub partial_rendering: PartialRenderingNodeData,
}

/// A node of the scene graph.
#[derive(Clone, Debug)]
pub struct Node {
    owner: PropertyOwner,
    position: AnimatableProperty<Vector3>,
    size: AnimatableProperty<Vector3>,
    scale: AnimatableProperty<Vector3>,
    orientation: AnimatableProperty<f32>,
    color: AnimatableProperty<Vector4>,
    visible: AnimatableProperty<bool>,
    world_matrix: InheritedProperty<Matrix>,
    world_color: InheritedProperty<Vector4>,
    parent: Option<NodeKey>,
    children: SmallVec<[NodeKey; 4]>,
    renderers: SmallVec<[RendererAttachment; 2]>,
    is_root: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Creates a detached node with default property values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owner: PropertyOwner::new(),
            position: AnimatableProperty::new(Vector3::ZERO),
            size: AnimatableProperty::new(Vector3::ZERO),
            scale: AnimatableProperty::new(Vector3::ONE),
            orientation: AnimatableProperty::new(0.0),
            color: AnimatableProperty::new(Vector4::WHITE),
            visible: AnimatableProperty::new(true),
            world_matrix: InheritedProperty::new(Matrix::IDENTITY),
            world_color: InheritedProperty::new(Vector4::WHITE),
            parent: None,
            children: SmallVec::new(),
            renderers: SmallVec::new(),
            is_root: false,
        }
    }

    /// Creates the root of a scene. Roots are always connected.
    #[must_use]
    pub fn new_root() -> Self {
        let mut node = Self::new();
        node.is_root = true;
        node.owner.connect();
        node
    }

    /// Whether this node is a scene root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Lifecycle and uniform state.
    #[must_use]
    pub fn owner(&self) -> &PropertyOwner {
        &self.owner
    }

    /// Lifecycle and uniform state.
    pub fn owner_mut(&mut self) -> &mut PropertyOwner {
        &mut self.owner
    }

    // -- Properties --

    /// Value of `property` in slot `index`.
    #[must_use]
    pub fn property(&self, property: NodeProperty, index: BufferIndex) -> PropertyValue {
        match property {
            NodeProperty::Position => PropertyValue::Vector3(self.position.get(index)),
            NodeProperty::Size => PropertyValue::Vector3(self.size.get(index)),
            NodeProperty::Scale => PropertyValue::Vector3(self.scale.get(index)),
            NodeProperty::Orientation => PropertyValue::Float(self.orientation.get(index)),
            NodeProperty::Color => PropertyValue::Vector4(self.color.get(index)),
            NodeProperty::Visible => PropertyValue::Boolean(self.visible.get(index)),
        }
    }

    /// Dynamically typed mutable view of `property`.
    pub fn property_mut(&mut self, property: NodeProperty) -> AnimatablePropertyMut<'_> {
        match property {
            NodeProperty::Position => (&mut self.position).into(),
            NodeProperty::Size => (&mut self.size).into(),
            NodeProperty::Scale => (&mut self.scale).into(),
            NodeProperty::Orientation => (&mut self.orientation).into(),
            NodeProperty::Color => (&mut self.color).into(),
            NodeProperty::Visible => (&mut self.visible).into(),
        }
    }

    /// Writes the current slot of `property`.
    pub fn set_property(
        &mut self,
        property: NodeProperty,
        value: PropertyValue,
        index: BufferIndex,
    ) -> Result<(), Error> {
        self.property_mut(property).set(index, value)
    }

    /// Writes the base value and both slots of `property`.
    pub fn bake_property(
        &mut self,
        property: NodeProperty,
        value: PropertyValue,
        index: BufferIndex,
    ) -> Result<(), Error> {
        self.property_mut(property).bake(index, value)
    }

    /// Adds `delta` to `property` and bakes the result.
    pub fn bake_relative_property(
        &mut self,
        property: NodeProperty,
        delta: PropertyValue,
        index: BufferIndex,
    ) -> Result<(), Error> {
        self.property_mut(property).bake_relative(index, delta)
    }

    /// Position in slot `index`.
    #[must_use]
    pub fn position(&self, index: BufferIndex) -> Vector3 {
        self.position.get(index)
    }

    /// Size in slot `index`.
    #[must_use]
    pub fn size(&self, index: BufferIndex) -> Vector3 {
        self.size.get(index)
    }

    /// Color in slot `index`.
    #[must_use]
    pub fn color(&self, index: BufferIndex) -> Vector4 {
        self.color.get(index)
    }

    /// Visibility in slot `index`.
    #[must_use]
    pub fn is_visible(&self, index: BufferIndex) -> bool {
        self.visible.get(index)
    }

    /// World matrix computed for slot `index`.
    #[must_use]
    pub fn world_matrix(&self, index: BufferIndex) -> Matrix {
        self.world_matrix.get(index)
    }

    /// World color computed for slot `index`.
    #[must_use]
    pub fn world_color(&self, index: BufferIndex) -> Vector4 {
        self.world_color.get(index)
    }

    /// Copies every property's base value into slot `index`.
    pub fn reset_to_base_values(&mut self, index: BufferIndex) {
        for property in NodeProperty::ALL {
            self.property_mut(property).as_base().reset_to_base_value(index);
        }
    }

    /// Forces every property through two more resets.
    pub fn mark_properties_dirty(&mut self) {
        for property in NodeProperty::ALL {
            self.property_mut(property).as_base().mark_as_dirty();
        }
    }

    /// Whether every property is clean.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.position.is_clean()
            && self.size.is_clean()
            && self.scale.is_clean()
            && self.orientation.is_clean()
            && self.color.is_clean()
            && self.visible.is_clean()
    }

    /// Local transform from the properties in slot `index`.
    #[must_use]
    pub fn local_matrix(&self, index: BufferIndex) -> Matrix {
        Matrix::from_components(
            self.scale.get(index),
            self.orientation.get(index),
            self.position.get(index),
        )
    }

    /// Recomputes world matrix and world color from the parent's values.
    pub fn update_world(&mut self, index: BufferIndex, parent: Option<(Matrix, Vector4)>) {
        let local = self.local_matrix(index);
        let color = self.color.get(index);
        let (world, world_color) = match parent {
            Some((matrix, parent_color)) => (matrix * local, parent_color * color),
            None => (local, color),
        };
        self.world_matrix.set(index, world);
        self.world_color.set(index, world_color);
    }

    // -- Hierarchy --

    /// Parent node, if connected under one.
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Children in draw order.
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeKey>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: NodeKey) {
        debug_assert!(!self.children.contains(&child), "child added twice");
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: NodeKey) -> bool {
        match self.children.iter().position(|&c| c == child) {
            Some(index) => {
                self.children.remove(index);
                true
            }
            None => false,
        }
    }

    // -- Renderers --

    /// Attached renderers in draw order.
    #[must_use]
    pub fn renderers(&self) -> &[RendererAttachment] {
        &self.renderers
    }

    /// Attached renderers in draw order.
    pub fn renderers_mut(&mut self) -> &mut [RendererAttachment] {
        &mut self.renderers
    }

    /// Attaches a renderer. Returns `false` if it was already attached.
    pub fn add_renderer(&mut self, renderer: RendererKey) -> bool {
        if self.renderers.iter().any(|a| a.renderer == renderer) {
            return false;
        }
        self.renderers.push(RendererAttachment {
            renderer,
            partial_rendering: PartialRenderingNodeData::new(),
        });
        true
    }

    /// Detaches a renderer. Returns `false` if it was not attached.
    pub fn remove_renderer(&mut self, renderer: RendererKey) -> bool {
        match self.renderers.iter().position(|a| a.renderer == renderer) {
            Some(index) => {
                self.renderers.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B0: BufferIndex = BufferIndex::ZERO;
    const B1: BufferIndex = BufferIndex::ONE;

    #[test]
    fn property_indices_round_trip() {
        for property in NodeProperty::ALL {
            assert_eq!(NodeProperty::from_index(property.index()), Some(property));
        }
        assert_eq!(NodeProperty::from_index(PropertyIndex(6)), None);
    }

    #[test]
    fn bake_rejects_wrong_type() {
        let mut node = Node::new();
        let err = node
            .bake_property(NodeProperty::Position, PropertyValue::Float(1.0), B0)
            .unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: PropertyType::Vector3,
                actual: PropertyType::Float,
            }
        );
    }

    #[test]
    fn world_values_compose_with_parent() {
        let mut parent = Node::new();
        parent
            .bake_property(
                NodeProperty::Position,
                PropertyValue::Vector3(Vector3::new(10.0, 0.0, 0.0)),
                B0,
            )
            .expect("typed bake");
        parent
            .bake_property(
                NodeProperty::Color,
                PropertyValue::Vector4(Vector4::new(1.0, 1.0, 1.0, 0.5)),
                B0,
            )
            .expect("typed bake");
        parent.update_world(B0, None);

        let mut child = Node::new();
        child
            .bake_property(
                NodeProperty::Position,
                PropertyValue::Vector3(Vector3::new(0.0, 5.0, 0.0)),
                B0,
            )
            .expect("typed bake");
        child.update_world(
            B0,
            Some((parent.world_matrix(B0), parent.world_color(B0))),
        );
        assert_eq!(child.world_matrix(B0).translation(), Vector3::new(10.0, 5.0, 0.0));
        assert_eq!(child.world_color(B0).w, 0.5);
    }

    #[test]
    fn reset_restores_all_properties() {
        let mut node = Node::new();
        node.reset_to_base_values(B0);
        node.reset_to_base_values(B1);
        assert!(node.is_clean());

        node.set_property(NodeProperty::Orientation, PropertyValue::Float(1.0), B1)
            .expect("typed set");
        assert!(!node.is_clean());
        node.reset_to_base_values(B1);
        assert_eq!(node.property(NodeProperty::Orientation, B1), PropertyValue::Float(0.0));
    }

    #[test]
    fn renderers_attach_once() {
        let mut node = Node::new();
        let key = RendererKey::from_raw(0, 0);
        assert!(node.add_renderer(key));
        assert!(!node.add_renderer(key));
        assert!(node.remove_renderer(key));
        assert!(!node.remove_renderer(key));
    }
}
