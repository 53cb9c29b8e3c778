// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderers: the drawable part of a node.

use crate::buffer::BufferIndex;
use crate::error::Error;
use crate::math::Vector4;
use crate::memory_pool::MemoryPoolKey;
use crate::property::{
    AnimatableProperty, AnimatablePropertyMut, PropertyIndex, PropertyType, PropertyValue,
};
use crate::property_owner::PropertyOwner;

/// Handle to a [`Renderer`] in the renderer pool.
pub type RendererKey = MemoryPoolKey<Renderer>;

/// Animatable properties of a [`Renderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RendererProperty {
    /// Multiplies the final alpha.
    Opacity = 0,
    /// Multiplies the node's world color.
    MixColor = 1,
}

impl RendererProperty {
    /// Every renderer property, in index order.
    pub const ALL: [Self; 2] = [Self::Opacity, Self::MixColor];

    /// Looks a property up by index.
    #[must_use]
    pub const fn from_index(index: PropertyIndex) -> Option<Self> {
        match index.0 {
            0 => Some(Self::Opacity),
            1 => Some(Self::MixColor),
            _ => None,
        }
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
            Self::Opacity => PropertyType::Float,
            Self::MixColor => PropertyType::Vector4,
        }
    }
}

/// Draw state shared by the nodes a renderer is attached to.
#[derive(Clone, Debug)]
pub struct Renderer {
    owner: PropertyOwner,
    opacity: AnimatableProperty<f32>,
    mix_color: AnimatableProperty<Vector4>,
    depth_index: i32,
    texture_set: u32,
}

impl Renderer {
    /// Creates a renderer drawing `texture_set`.
    #[must_use]
    pub fn new(texture_set: u32) -> Self {
        Self {
            owner: PropertyOwner::new(),
            opacity: AnimatableProperty::new(1.0),
            mix_color: AnimatableProperty::new(Vector4::WHITE),
            depth_index: 0,
            texture_set,
        }
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

    /// Value of `property` in slot `index`.
    #[must_use]
    pub fn property(&self, property: RendererProperty, index: BufferIndex) -> PropertyValue {
        match property {
            RendererProperty::Opacity => PropertyValue::Float(self.opacity.get(index)),
            RendererProperty::MixColor => PropertyValue::Vector4(self.mix_color.get(index)),
        }
    }

    /// Dynamically typed mutable view of `property`.
    pub fn property_mut(&mut self, property: RendererProperty) -> AnimatablePropertyMut<'_> {
        match property {
            RendererProperty::Opacity => (&mut self.opacity).into(),
            RendererProperty::MixColor => (&mut self.mix_color).into(),
        }
    }

    /// Writes the base value and both slots of `property`.
    pub fn bake_property(
        &mut self,
        property: RendererProperty,
        value: PropertyValue,
        index: BufferIndex,
    ) -> Result<(), Error> {
        self.property_mut(property).bake(index, value)
    }

    /// Copies every property's base value into slot `index`.
    pub fn reset_to_base_values(&mut self, index: BufferIndex) {
        for property in RendererProperty::ALL {
            self.property_mut(property).as_base().reset_to_base_value(index);
        }
    }

    /// Forces every property through two more resets.
    pub fn mark_properties_dirty(&mut self) {
        for property in RendererProperty::ALL {
            self.property_mut(property).as_base().mark_as_dirty();
        }
    }

    /// Sort key among items of the same layer.
    #[must_use]
    pub fn depth_index(&self) -> i32 {
        self.depth_index
    }

    /// Changes the sort key.
    pub fn set_depth_index(&mut self, depth_index: i32) {
        self.depth_index = depth_index;
    }

    /// Texture set bound when drawing.
    #[must_use]
    pub fn texture_set(&self) -> u32 {
        self.texture_set
    }

    /// Final color for a node with `world_color`, in slot `index`.
    #[must_use]
    pub fn final_color(&self, world_color: Vector4, index: BufferIndex) -> Vector4 {
        let mut color = world_color * self.mix_color.get(index);
        color.w *= self.opacity.get(index);
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_color_applies_mix_and_opacity() {
        let mut renderer = Renderer::new(0);
        let b = BufferIndex::ZERO;
        renderer
            .bake_property(RendererProperty::Opacity, PropertyValue::Float(0.5), b)
            .expect("typed bake");
        renderer
            .bake_property(
                RendererProperty::MixColor,
                PropertyValue::Vector4(Vector4::new(1.0, 0.0, 1.0, 1.0)),
                b,
            )
            .expect("typed bake");
        let color = renderer.final_color(Vector4::new(0.5, 0.5, 0.5, 1.0), b);
        assert_eq!(color, Vector4::new(0.5, 0.0, 0.5, 0.5));
    }

    #[test]
    fn property_indices_round_trip() {
        for property in RendererProperty::ALL {
            assert_eq!(RendererProperty::from_index(property.index()), Some(property));
        }
    }
}
