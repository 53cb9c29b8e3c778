// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render instructions: one frame's items in draw order.

use alloc::vec::Vec;

use dali_core::buffer::BufferIndex;
use dali_core::render_list::{RenderItem, RenderList};

use crate::damage::DamageRegion;

/// Draw commands for a single frame.
///
/// Items keep the scene's depth-first order within each depth index, then
/// are sorted by depth index, lowest first.
#[derive(Clone, Debug, Default)]
pub struct RenderInstruction {
    /// Frame that produced the items.
    pub frame_index: u64,
    /// Buffer slot the values were read from.
    pub buffer_index: BufferIndex,
    /// Items in draw order.
    pub items: Vec<RenderItem>,
}

impl RenderInstruction {
    /// Takes ownership of a render list and sorts it into draw order.
    #[must_use]
    pub fn from_render_list(list: RenderList) -> Self {
        let RenderList {
            frame_index,
            buffer_index,
            mut items,
        } = list;
        // Stable, so scene order is kept among equal depth indices.
        items.sort_by_key(|item| item.depth_index);
        Self {
            frame_index,
            buffer_index,
            items,
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

    /// Items whose state changed since the last frame.
    pub fn updated(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.items.iter().filter(|item| item.updated)
    }

    /// Damage covered by the updated items.
    #[must_use]
    pub fn damage(&self) -> DamageRegion {
        let mut damage = DamageRegion::None;
        for item in self.updated() {
            if item.updated_area.area() > 0.0 {
                damage.add_rect(item.updated_area);
            }
        }
        damage
    }

    /// Clears the instruction for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
