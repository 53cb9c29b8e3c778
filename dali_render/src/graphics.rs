// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Render thread's side of a frame.
//!
//! [`RenderManager`] turns each [`RenderList`] into a [`RenderInstruction`],
//! packs uniforms and hands the result to a [`GraphicsController`], the
//! seam behind which a real graphics API lives.

use alloc::vec::Vec;

use dali_core::render_list::{RenderItem, RenderList};
use kurbo::Rect;

use crate::damage::DamageRegion;
use crate::instruction::RenderInstruction;
use crate::uniform_block::UniformBlockWriter;
use crate::RenderError;

/// Backend that receives packed uniforms and draw submissions.
pub trait GraphicsController {
    /// Uploads the uniform block of one item.
    fn upload_uniforms(&mut self, item: &RenderItem, block: &[u8]) -> Result<(), RenderError>;

    /// Draws `items` in order, limited to `damage`.
    fn submit(&mut self, items: &[&RenderItem], damage: &DamageRegion) -> Result<(), RenderError>;
}

/// Render-thread settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderConfig {
    /// Surface bounds in pixels.
    pub surface: Rect,
    /// Redraw only items whose state changed.
    pub partial_rendering: bool,
    /// Bytes reserved per uniform block.
    pub uniform_block_size: usize,
}

impl RenderConfig {
    /// Full redraws of a `width` by `height` surface.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            surface: Rect::new(0.0, 0.0, width, height),
            partial_rendering: false,
            uniform_block_size: 1024,
        }
    }

    /// Returns a copy with partial rendering switched on or off.
    #[must_use]
    pub const fn with_partial_rendering(mut self, enabled: bool) -> Self {
        self.partial_rendering = enabled;
        self
    }
}

/// What one [`RenderManager::render`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frame rendered.
    pub frame_index: u64,
    /// Items in the instruction.
    pub items: usize,
    /// Items submitted to the controller.
    pub submitted: usize,
    /// Uniform blocks uploaded.
    pub uniform_uploads: usize,
    /// Whether the frame was skipped because nothing changed.
    pub skipped: bool,
}

/// Drives a [`GraphicsController`] from render lists.
#[derive(Debug)]
pub struct RenderManager<G> {
    controller: G,
    config: RenderConfig,
    writer: UniformBlockWriter,
    block: Vec<u8>,
}

impl<G: GraphicsController> RenderManager<G> {
    /// Creates a manager rendering through `controller`.
    pub fn new(controller: G, config: RenderConfig) -> Self {
        Self {
            controller,
            config,
            writer: UniformBlockWriter::new(),
            block: alloc::vec![0; config.uniform_block_size],
        }
    }

    /// The controller.
    pub fn controller(&self) -> &G {
        &self.controller
    }

    /// The uniform writer, e.g. to inspect its layout cache.
    pub fn uniform_writer(&self) -> &UniformBlockWriter {
        &self.writer
    }

    /// Renders one frame.
    ///
    /// With partial rendering on, a frame without updated items is skipped
    /// entirely and only updated items get fresh uniforms.
    pub fn render(&mut self, list: RenderList) -> Result<RenderStats, RenderError> {
        let instruction = RenderInstruction::from_render_list(list);
        let mut stats = RenderStats {
            frame_index: instruction.frame_index,
            items: instruction.len(),
            ..RenderStats::default()
        };

        let damage = if self.config.partial_rendering {
            let mut damage = instruction.damage();
            if let DamageRegion::Rects(_) = damage {
                match damage.bounds(self.config.surface) {
                    Some(bounds) => damage = DamageRegion::Rects(alloc::vec![bounds]),
                    None => damage = DamageRegion::None,
                }
            }
            damage
        } else {
            DamageRegion::Full
        };
        if damage.is_empty() {
            log::trace!("frame {}: nothing to redraw", stats.frame_index);
            stats.skipped = true;
            return Ok(stats);
        }

        for item in &instruction.items {
            if self.config.partial_rendering && !item.updated {
                continue;
            }
            let used = self.writer.write(item, &mut self.block)?;
            self.controller.upload_uniforms(item, &self.block[..used])?;
            stats.uniform_uploads += 1;
        }

        let visible: Vec<&RenderItem> = instruction
            .items
            .iter()
            .filter(|item| {
                let area = item.updated_area.intersect(self.config.surface);
                area.area() > 0.0 || item.updated_area.area() == 0.0
            })
            .collect();
        self.controller.submit(&visible, &damage)?;
        stats.submitted = visible.len();

        self.writer.retain(|node, renderer| {
            instruction
                .items
                .iter()
                .any(|item| item.node == node && item.renderer == renderer)
        });
        log::debug!(
            "frame {}: submitted {} of {} items, {} uniform uploads",
            stats.frame_index,
            stats.submitted,
            stats.items,
            stats.uniform_uploads,
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use dali_core::buffer::BufferIndex;
    use dali_core::math::{Vector3, Vector4};
    use dali_core::memory_pool::MemoryPoolKey;
    use dali_core::transform::Matrix;
    use smallvec::SmallVec;

    #[derive(Debug, Default)]
    struct Recording {
        uploads: Vec<u32>,
        submits: Vec<(Vec<u32>, DamageRegion)>,
        fail_submit: bool,
    }

    impl GraphicsController for Recording {
        fn upload_uniforms(&mut self, item: &RenderItem, _: &[u8]) -> Result<(), RenderError> {
            self.uploads.push(item.node.index());
            Ok(())
        }

        fn submit(
            &mut self,
            items: &[&RenderItem],
            damage: &DamageRegion,
        ) -> Result<(), RenderError> {
            if self.fail_submit {
                return Err(RenderError::Controller(String::from("device lost")));
            }
            self.submits
                .push((items.iter().map(|i| i.node.index()).collect(), damage.clone()));
            Ok(())
        }
    }

    fn list(frame_index: u64, updated: &[bool]) -> RenderList {
        let items = (0_u32..)
            .zip(updated)
            .map(|(i, &updated)| {
                let x = f64::from(i) * 10.0;
                RenderItem {
                    node: MemoryPoolKey::from_raw(i, 0),
                    renderer: MemoryPoolKey::from_raw(0, 0),
                    world_matrix: Matrix::IDENTITY,
                    color: Vector4::WHITE,
                    size: Vector3::ONE,
                    depth_index: 0,
                    texture_set: 0,
                    is_opaque: true,
                    updated,
                    updated_area: Rect::new(x, 0.0, x + 5.0, 5.0),
                    uniform_counters: (0, 0),
                    uniforms: SmallVec::new(),
                }
            })
            .collect();
        RenderList {
            frame_index,
            buffer_index: BufferIndex::ZERO,
            items,
        }
    }

    #[test]
    fn full_rendering_uploads_everything() {
        let mut manager = RenderManager::new(Recording::default(), RenderConfig::new(100.0, 100.0));
        let stats = manager.render(list(1, &[false, true])).unwrap();
        assert_eq!(stats.uniform_uploads, 2);
        assert_eq!(stats.submitted, 2);
        assert_eq!(manager.controller().submits[0].1, DamageRegion::Full);
    }

    #[test]
    fn partial_rendering_skips_unchanged_frames() {
        let config = RenderConfig::new(100.0, 100.0).with_partial_rendering(true);
        let mut manager = RenderManager::new(Recording::default(), config);
        let stats = manager.render(list(1, &[false, false])).unwrap();
        assert!(stats.skipped, "nothing updated");
        assert!(manager.controller().submits.is_empty());

        let stats = manager.render(list(2, &[false, true])).unwrap();
        assert!(!stats.skipped, "one item moved");
        assert_eq!(manager.controller().uploads, [1]);
        assert_eq!(
            manager.controller().submits[0].1,
            DamageRegion::Rects(alloc::vec![Rect::new(10.0, 0.0, 15.0, 5.0)])
        );
    }

    #[test]
    fn off_surface_items_are_culled() {
        let mut manager = RenderManager::new(Recording::default(), RenderConfig::new(12.0, 12.0));
        let stats = manager.render(list(1, &[true, true, true])).unwrap();
        assert_eq!(stats.items, 3);
        assert_eq!(stats.submitted, 2);
    }

    #[test]
    fn controller_errors_propagate() {
        let controller = Recording {
            fail_submit: true,
            ..Recording::default()
        };
        let mut manager = RenderManager::new(controller, RenderConfig::new(10.0, 10.0));
        assert_eq!(
            manager.render(list(1, &[true])),
            Err(RenderError::Controller(String::from("device lost")))
        );
    }
}
