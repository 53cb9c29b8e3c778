// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What the Update thread hands to the Render thread each frame.
//!
//! A [`RenderList`] is a flat snapshot: every value is copied out of the
//! scene graph while the update index is still owned by the Update thread,
//! so the Render thread never dereferences scene-graph keys.

use alloc::vec::Vec;

use kurbo::{Point, Rect};
use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::math::{Vector3, Vector4};
use crate::property::PropertyValue;
use crate::scene::{NodeKey, RendererKey};
use crate::transform::Matrix;

/// A uniform's name hash and its value this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformValue {
    /// Hash of the full uniform name.
    pub name_hash: u64,
    /// Hash of the name without a trailing `[N]`.
    pub name_hash_without_array: u64,
    /// Array element, when the name ends in `[N]`.
    pub array_index: Option<u32>,
    /// Current value of the source property.
    pub value: PropertyValue,
}

/// One node/renderer pair to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    /// The node being drawn.
    pub node: NodeKey,
    /// The renderer drawing it.
    pub renderer: RendererKey,
    /// Node world matrix.
    pub world_matrix: Matrix,
    /// Final color: world color times the renderer's mix color and opacity.
    pub color: Vector4,
    /// Node size.
    pub size: Vector3,
    /// Sort key.
    pub depth_index: i32,
    /// Texture set to bind.
    pub texture_set: u32,
    /// Whether the final alpha is one.
    pub is_opaque: bool,
    /// Whether render-affecting state changed since the last frame.
    pub updated: bool,
    /// Screen-space bounds, unioned with last frame's bounds when updated.
    pub updated_area: Rect,
    /// Change counters of the node and renderer uniform maps.
    pub uniform_counters: (u64, u64),
    /// Node uniforms followed by renderer uniforms, in map order.
    pub uniforms: SmallVec<[UniformValue; 4]>,
}

/// Items of one frame in depth-first scene order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderList {
    /// Frame that produced the list.
    pub frame_index: u64,
    /// Buffer slot the values were read from.
    pub buffer_index: BufferIndex,
    /// The items.
    pub items: Vec<RenderItem>,
}

impl RenderList {
    /// Creates an empty list.
    #[must_use]
    pub fn new(frame_index: u64, buffer_index: BufferIndex) -> Self {
        Self {
            frame_index,
            buffer_index,
            items: Vec::new(),
        }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there is nothing to draw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items whose state changed.
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.items.iter().filter(|item| item.updated).count()
    }

    /// Whether any item changed.
    #[must_use]
    pub fn has_updates(&self) -> bool {
        self.items.iter().any(|item| item.updated)
    }

    /// Iterates over the items.
    pub fn iter(&self) -> core::slice::Iter<'_, RenderItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a RenderList {
    type Item = &'a RenderItem;
    type IntoIter = core::slice::Iter<'a, RenderItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Screen-space bounds of a `size`-sized quad centred on `world`'s origin.
#[must_use]
pub fn item_bounds(world: &Matrix, size: Vector3) -> Rect {
    let hx = size.x * 0.5;
    let hy = size.y * 0.5;
    let corners = [
        world.transform_point(Vector3::new(-hx, -hy, 0.0)),
        world.transform_point(Vector3::new(hx, -hy, 0.0)),
        world.transform_point(Vector3::new(-hx, hy, 0.0)),
        world.transform_point(Vector3::new(hx, hy, 0.0)),
    ];
    let mut rect = Rect::new(
        f64::from(corners[0].x),
        f64::from(corners[0].y),
        f64::from(corners[0].x),
        f64::from(corners[0].y),
    );
    for corner in &corners[1..] {
        rect = rect.union_pt(Point::new(f64::from(corner.x), f64::from(corner.y)));
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_translated_quad() {
        let world = Matrix::from_translation(Vector3::new(100.0, 50.0, 0.0));
        let rect = item_bounds(&world, Vector3::new(20.0, 10.0, 0.0));
        assert_eq!(rect, Rect::new(90.0, 45.0, 110.0, 55.0));
    }

    #[test]
    fn bounds_follow_scale() {
        let world = Matrix::from_scale(Vector3::new(2.0, 2.0, 1.0));
        let rect = item_bounds(&world, Vector3::new(10.0, 10.0, 0.0));
        assert_eq!(rect, Rect::new(-10.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn updated_count_counts_only_updated() {
        let mut list = RenderList::new(3, BufferIndex::ONE);
        let item = RenderItem {
            node: NodeKey::INVALID,
            renderer: RendererKey::INVALID,
            world_matrix: Matrix::IDENTITY,
            color: Vector4::WHITE,
            size: Vector3::ZERO,
            depth_index: 0,
            texture_set: 0,
            is_opaque: true,
            updated: false,
            updated_area: Rect::ZERO,
            uniform_counters: (0, 0),
            uniforms: SmallVec::new(),
        };
        list.items.push(item.clone());
        list.items.push(RenderItem {
            updated: true,
            ..item
        });
        assert_eq!(list.len(), 2);
        assert_eq!(list.updated_count(), 1);
        assert!(list.has_updates());
    }
}
