// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform block packing.
//!
//! Every uniform occupies one 16-byte slot (four `f32` lanes), array
//! elements sit in consecutive slots after their array's base. A layout is
//! derived from an item's uniform list the first time the item is drawn and
//! reused until either uniform map's change counter moves.

use alloc::vec::Vec;

use dali_core::render_list::{RenderItem, UniformValue};
use dali_core::scene::{NodeKey, RendererKey};
use hashbrown::HashMap;

use crate::RenderError;

/// Bytes per uniform slot.
pub const UNIFORM_SLOT_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    name_hash: u64,
    offset: usize,
}

/// Byte offsets of the uniforms of one node/renderer pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformBlockLayout {
    entries: Vec<Entry>,
    size: usize,
}

impl UniformBlockLayout {
    /// Derives a layout from uniforms in map order.
    #[must_use]
    pub fn from_uniforms(uniforms: &[UniformValue]) -> Self {
        // Element count of each array, keyed by the bare name.
        let mut extents: HashMap<u64, u32> = HashMap::new();
        for uniform in uniforms {
            if let Some(index) = uniform.array_index {
                let extent = extents.entry(uniform.name_hash_without_array).or_insert(0);
                *extent = (*extent).max(index + 1);
            }
        }

        let mut entries: Vec<Entry> = Vec::with_capacity(uniforms.len());
        let mut bases: HashMap<u64, usize> = HashMap::new();
        let mut size = 0;
        for uniform in uniforms {
            if entries.iter().any(|e| e.name_hash == uniform.name_hash) {
                continue;
            }
            let offset = match uniform.array_index {
                None => {
                    size += UNIFORM_SLOT_SIZE;
                    size - UNIFORM_SLOT_SIZE
                }
                Some(index) => {
                    let bare = uniform.name_hash_without_array;
                    let base = *bases.entry(bare).or_insert_with(|| {
                        let base = size;
                        let count = extents.get(&bare).copied().unwrap_or(1);
                        size += count as usize * UNIFORM_SLOT_SIZE;
                        base
                    });
                    base + index as usize * UNIFORM_SLOT_SIZE
                }
            };
            entries.push(Entry {
                name_hash: uniform.name_hash,
                offset,
            });
        }
        Self { entries, size }
    }

    /// Bytes needed for the whole block.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of uniforms laid out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layout holds no uniforms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte offset of the uniform with `name_hash`.
    #[must_use]
    pub fn offset_of(&self, name_hash: u64) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.name_hash == name_hash)
            .map(|e| e.offset)
    }
}

#[derive(Clone, Debug)]
struct CachedLayout {
    counters: (u64, u64),
    layout: UniformBlockLayout,
}

/// Writes item uniforms into byte blocks, caching one layout per
/// node/renderer pair.
#[derive(Clone, Debug, Default)]
pub struct UniformBlockWriter {
    layouts: HashMap<(NodeKey, RendererKey), CachedLayout>,
    rebuilds: u64,
}

impl UniformBlockWriter {
    /// Creates a writer with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout for `item`, re-derived if its uniform maps changed.
    pub fn layout(&mut self, item: &RenderItem) -> &UniformBlockLayout {
        let key = (item.node, item.renderer);
        let rebuilds = &mut self.rebuilds;
        let cached = self
            .layouts
            .entry(key)
            .and_modify(|cached| {
                if cached.counters != item.uniform_counters {
                    *cached = CachedLayout {
                        counters: item.uniform_counters,
                        layout: UniformBlockLayout::from_uniforms(&item.uniforms),
                    };
                    *rebuilds += 1;
                }
            })
            .or_insert_with(|| {
                *rebuilds += 1;
                CachedLayout {
                    counters: item.uniform_counters,
                    layout: UniformBlockLayout::from_uniforms(&item.uniforms),
                }
            });
        &cached.layout
    }

    /// Writes `item`'s uniforms into `block`, returning the bytes used.
    pub fn write(&mut self, item: &RenderItem, block: &mut [u8]) -> Result<usize, RenderError> {
        let layout = self.layout(item);
        let needed = layout.size();
        if block.len() < needed {
            return Err(RenderError::UniformBlockTooSmall {
                needed,
                available: block.len(),
            });
        }
        for uniform in &item.uniforms {
            let Some(offset) = layout.offset_of(uniform.name_hash) else {
                log::trace!("uniform {:#x} not in layout", uniform.name_hash);
                continue;
            };
            let lanes = uniform.value.to_lanes();
            block[offset..offset + UNIFORM_SLOT_SIZE].copy_from_slice(bytemuck::bytes_of(&lanes));
        }
        Ok(needed)
    }

    /// Drops cached layouts of pairs not in `live`.
    pub fn retain(&mut self, mut live: impl FnMut(NodeKey, RendererKey) -> bool) {
        self.layouts.retain(|&(node, renderer), _| live(node, renderer));
    }

    /// Number of layouts derived so far.
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Number of cached layouts.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.layouts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dali_core::math::{Vector3, Vector4};
    use dali_core::memory_pool::MemoryPoolKey;
    use dali_core::property::PropertyValue;
    use dali_core::transform::Matrix;
    use dali_core::uniform_map::calculate_hash;
    use kurbo::Rect;
    use smallvec::SmallVec;

    fn uniform(name: &str, base: &str, array_index: Option<u32>, value: PropertyValue) -> UniformValue {
        UniformValue {
            name_hash: calculate_hash(name),
            name_hash_without_array: calculate_hash(base),
            array_index,
            value,
        }
    }

    fn item(counters: (u64, u64), uniforms: &[UniformValue]) -> RenderItem {
        RenderItem {
            node: MemoryPoolKey::from_raw(1, 0),
            renderer: MemoryPoolKey::from_raw(2, 0),
            world_matrix: Matrix::IDENTITY,
            color: Vector4::WHITE,
            size: Vector3::ONE,
            depth_index: 0,
            texture_set: 0,
            is_opaque: true,
            updated: true,
            updated_area: Rect::ZERO,
            uniform_counters: counters,
            uniforms: uniforms.iter().copied().collect::<SmallVec<_>>(),
        }
    }

    #[test]
    fn arrays_are_contiguous() {
        let layout = UniformBlockLayout::from_uniforms(&[
            uniform("uColor", "uColor", None, PropertyValue::Float(0.0)),
            uniform("uOffsets[1]", "uOffsets", Some(1), PropertyValue::Float(0.0)),
            uniform("uOffsets[0]", "uOffsets", Some(0), PropertyValue::Float(0.0)),
            uniform("uSize", "uSize", None, PropertyValue::Float(0.0)),
        ]);
        assert_eq!(layout.offset_of(calculate_hash("uColor")), Some(0));
        assert_eq!(layout.offset_of(calculate_hash("uOffsets[0]")), Some(16));
        assert_eq!(layout.offset_of(calculate_hash("uOffsets[1]")), Some(32));
        assert_eq!(layout.offset_of(calculate_hash("uSize")), Some(48));
        assert_eq!(layout.size(), 64);
        assert_eq!(layout.len(), 4);
    }

    #[test]
    fn layout_is_rebuilt_only_when_counters_move() {
        let mut writer = UniformBlockWriter::new();
        let first = [uniform("uA", "uA", None, PropertyValue::Float(1.0))];
        writer.layout(&item((1, 1), &first));
        writer.layout(&item((1, 1), &first));
        assert_eq!(writer.rebuild_count(), 1);

        let second = [
            uniform("uA", "uA", None, PropertyValue::Float(1.0)),
            uniform("uB", "uB", None, PropertyValue::Float(2.0)),
        ];
        // Same counters: the cached layout wins even though the list grew.
        assert_eq!(writer.layout(&item((1, 1), &second)).len(), 1);
        assert_eq!(writer.layout(&item((1, 2), &second)).len(), 2);
        assert_eq!(writer.rebuild_count(), 2);
    }

    #[test]
    fn write_packs_lanes() {
        let mut writer = UniformBlockWriter::new();
        let color = Vector4::new(0.25, 0.5, 0.75, 1.0);
        let item = item(
            (0, 0),
            &[
                uniform("uOpacity", "uOpacity", None, PropertyValue::Float(0.5)),
                uniform("uColor", "uColor", None, PropertyValue::Vector4(color)),
            ],
        );
        let mut block = [0_u8; 64];
        assert_eq!(writer.write(&item, &mut block), Ok(32));
        let lanes: [f32; 8] = bytemuck::pod_read_unaligned(&block[..32]);
        assert_eq!(lanes, [0.5, 0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0]);

        let mut small = [0_u8; 16];
        assert_eq!(
            writer.write(&item, &mut small),
            Err(RenderError::UniformBlockTooSmall {
                needed: 32,
                available: 16
            })
        );
    }

    #[test]
    fn retain_drops_dead_pairs() {
        let mut writer = UniformBlockWriter::new();
        writer.layout(&item((0, 0), &[]));
        assert_eq!(writer.cached(), 1);
        writer.retain(|_, _| false);
        assert_eq!(writer.cached(), 0);
    }
}
