// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! "Did anything render-affecting change?" detection.
//!
//! Each node/renderer pair keeps two snapshots of its render state: last
//! frame's and this frame's. The update pass fills the current snapshot,
//! asks [`is_updated`](PartialRenderingNodeData::is_updated), and swaps once
//! the render decision has been made.
//!
//! The comparison is byte-wise over the whole [`Pod`] snapshot, so every
//! field takes part without a hand-written comparator.

use bytemuck::{Pod, Zeroable};
use kurbo::Rect;

use crate::math::{Vector3, Vector4};
use crate::transform::Matrix;

/// Render-affecting state of one node/renderer pair.
///
/// Every field is four bytes wide or a multiple of four, so the struct has no
/// padding and byte equality is exact.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PartialRenderingCacheInfo {
    /// Node slot index.
    pub node_index: u32,
    /// Node slot generation.
    pub node_generation: u32,
    /// Renderer slot index.
    pub renderer_index: u32,
    /// Renderer slot generation.
    pub renderer_generation: u32,
    /// Texture set bound by the renderer.
    pub texture_set: u32,
    /// Depth index used for sorting.
    pub depth_index: i32,
    /// Non-zero if the item is fully opaque.
    pub is_opaque: u32,
    /// Model-view matrix.
    pub matrix: Matrix,
    /// Final color.
    pub color: Vector4,
    /// Node size.
    pub size: Vector3,
    /// Screen-space area touched by the item: `[x0, y0, x1, y1]`.
    pub updated_area: [f32; 4],
}

impl PartialRenderingCacheInfo {
    /// Stores a screen-space rectangle.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "screen coordinates fit comfortably in f32"
    )]
    pub fn set_updated_area(&mut self, rect: Rect) {
        self.updated_area = [rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32];
    }

    /// Returns the stored screen-space rectangle.
    #[must_use]
    pub fn updated_area(&self) -> Rect {
        let [x0, y0, x1, y1] = self.updated_area;
        Rect::new(f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1))
    }
}

/// Last-frame and this-frame snapshots for one node/renderer pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartialRenderingNodeData {
    data: [PartialRenderingCacheInfo; 2],
    current_index: usize,
    rendered: bool,
}

impl PartialRenderingNodeData {
    /// Creates data that has never been rendered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot being filled this frame.
    pub fn current_cache_info_mut(&mut self) -> &mut PartialRenderingCacheInfo {
        &mut self.data[self.current_index]
    }

    /// The snapshot being filled this frame.
    #[must_use]
    pub fn current_cache_info(&self) -> &PartialRenderingCacheInfo {
        &self.data[self.current_index]
    }

    /// Last frame's snapshot.
    #[must_use]
    pub fn previous_cache_info(&self) -> &PartialRenderingCacheInfo {
        &self.data[1 - self.current_index]
    }

    /// Whether the two snapshots differ, or the pair was never rendered.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        !self.rendered || bytemuck::bytes_of(&self.data[0]) != bytemuck::bytes_of(&self.data[1])
    }

    /// Makes this frame's snapshot last frame's. Call once per frame, after
    /// the render decision.
    pub fn swap_buffers(&mut self) {
        self.current_index = 1 - self.current_index;
    }

    /// Records that the pair has been rendered at least once.
    pub fn set_rendered(&mut self) {
        self.rendered = true;
    }

    /// Whether the pair has been rendered at least once.
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PartialRenderingCacheInfo {
        PartialRenderingCacheInfo {
            node_index: 3,
            renderer_index: 1,
            texture_set: 9,
            depth_index: 2,
            is_opaque: 1,
            matrix: Matrix::from_translation(Vector3::new(10.0, 20.0, 0.0)),
            color: Vector4::WHITE,
            size: Vector3::new(100.0, 50.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn never_rendered_is_always_updated() {
        let data = PartialRenderingNodeData::new();
        assert!(data.is_updated());
    }

    #[test]
    fn identical_snapshots_are_not_updated() {
        let mut data = PartialRenderingNodeData::new();
        data.set_rendered();
        *data.current_cache_info_mut() = sample();
        data.swap_buffers();
        *data.current_cache_info_mut() = sample();
        assert!(!data.is_updated());

        data.current_cache_info_mut().color = Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(data.is_updated());
    }

    #[test]
    fn swap_alternates_slots() {
        let mut data = PartialRenderingNodeData::new();
        data.current_cache_info_mut().depth_index = 5;
        data.swap_buffers();
        assert_eq!(data.previous_cache_info().depth_index, 5);
        assert_eq!(data.current_cache_info().depth_index, 0);
    }

    #[test]
    fn updated_area_round_trips_through_kurbo() {
        let mut info = sample();
        info.set_updated_area(Rect::new(1.0, 2.0, 30.0, 40.0));
        assert_eq!(info.updated_area(), Rect::new(1.0, 2.0, 30.0, 40.0));
    }
}
