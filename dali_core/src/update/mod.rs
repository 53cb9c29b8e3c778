// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update loop.
//!
//! [`UpdateManager`] lives on the Update thread. Each call to
//! [`update`](UpdateManager::update) runs one frame:
//!
//! ```text
//!   drain queue ─► reset properties ─► constraints ─► frame callbacks
//!        ─► world transforms ─► prepare render ─► swap buffers
//! ```
//!
//! The Event thread talks to it only through [`EventThreadServices`], which
//! shares the node and renderer pools and the message queue.

mod event;
mod frame_callback;
mod messages;
mod scene_graph;

pub use event::EventThreadServices;
pub use frame_callback::{FrameCallback, FrameCallbackId, UpdateProxy};
pub use messages::UpdateMessage;
pub use scene_graph::{BoxedFrameCallback, ResetStats, SceneGraph};

use alloc::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::{BufferIndex, SceneGraphBuffers};
use crate::memory_pool::{MemoryPoolConfig, SyncMemoryPool};
use crate::message::{MessageBufferConfig, MessageQueue};
use crate::render_list::RenderList;
use crate::scene::NodeKey;
use crate::trace::{
    FrameSummary, FrameSummaryBuilder, MessagesEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    Tracer, UpdateBeginEvent, UpdateEndEvent,
};

/// Sizing and pacing for an [`UpdateManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Node pool sizing.
    pub node_pool: MemoryPoolConfig,
    /// Renderer pool sizing.
    pub renderer_pool: MemoryPoolConfig,
    /// Message buffer sizing.
    pub message_buffer: MessageBufferConfig,
    /// Frames to keep updating after the last change, so both buffer slots
    /// settle.
    pub keep_rendering_frames: u32,
}

impl UpdateConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            node_pool: MemoryPoolConfig::new(),
            renderer_pool: MemoryPoolConfig::new(),
            message_buffer: MessageBufferConfig::new(),
            keep_rendering_frames: 2,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of one [`UpdateManager::update`].
#[derive(Clone, Debug)]
pub struct UpdateResult {
    /// Items to draw, read from the slot just written.
    pub render_list: RenderList,
    /// Phase timings and counters.
    pub summary: FrameSummary,
    /// Whether another update is needed even if no messages arrive.
    pub keep_updating: bool,
}

/// Drives the scene graph one frame at a time.
#[derive(Debug)]
pub struct UpdateManager {
    config: UpdateConfig,
    buffers: SceneGraphBuffers,
    scene: SceneGraph,
    queue: MessageQueue<SceneGraph>,
    services: EventThreadServices,
    frame_index: u64,
    keep_rendering: u32,
    epoch: Instant,
}

impl UpdateManager {
    /// Creates a manager with an empty scene.
    #[must_use]
    pub fn new(config: UpdateConfig) -> Self {
        let nodes = Arc::new(SyncMemoryPool::new(config.node_pool));
        let renderers = Arc::new(SyncMemoryPool::new(config.renderer_pool));
        let queue = MessageQueue::new(config.message_buffer);
        let scene = SceneGraph::new(Arc::clone(&nodes), Arc::clone(&renderers));
        let services = EventThreadServices::new(nodes, renderers, queue.clone(), scene.root());
        Self {
            config,
            buffers: SceneGraphBuffers::new(),
            scene,
            queue,
            services,
            frame_index: 0,
            keep_rendering: config.keep_rendering_frames,
            epoch: Instant::now(),
        }
    }

    /// A handle for the Event thread.
    #[must_use]
    pub fn event_thread_services(&self) -> EventThreadServices {
        self.services.clone()
    }

    /// The scene root.
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.scene.root()
    }

    /// The scene state.
    #[must_use]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Current buffer indices.
    #[must_use]
    pub fn buffers(&self) -> &SceneGraphBuffers {
        &self.buffers
    }

    /// Number of updates run so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Blocks until the Event thread flushes or `timeout` elapses.
    pub fn wait_for_messages(&self, timeout: Duration) -> bool {
        self.queue.wait_for_messages(timeout)
    }

    /// Runs one frame.
    pub fn update(&mut self, elapsed_seconds: f32, tracer: &mut Tracer<'_>) -> UpdateResult {
        self.frame_index += 1;
        let buffer_index = self.buffers.update_index();
        let mut timer = FrameTimer::new(self.epoch, self.frame_index, buffer_index);
        tracer.update_begin(&UpdateBeginEvent {
            frame_index: self.frame_index,
            buffer_index: slot_byte(buffer_index),
            timestamp: timer.now(),
        });

        timer.begin(tracer, PhaseKind::ProcessMessages);
        let processed = self.queue.process(&mut self.scene, buffer_index);
        timer.end(tracer, PhaseKind::ProcessMessages);
        let processed = u32::try_from(processed).unwrap_or(u32::MAX);
        tracer.messages(&MessagesEvent {
            frame_index: self.frame_index,
            processed,
        });

        timer.begin(tracer, PhaseKind::ResetProperties);
        let resets = self.scene.reset_properties(buffer_index);
        timer.end(tracer, PhaseKind::ResetProperties);

        timer.begin(tracer, PhaseKind::ApplyConstraints);
        self.scene.refresh_traversal();
        let constraints_active = self.scene.apply_constraints(buffer_index);
        timer.end(tracer, PhaseKind::ApplyConstraints);

        timer.begin(tracer, PhaseKind::FrameCallbacks);
        let callbacks_active = self
            .scene
            .run_frame_callbacks(buffer_index, elapsed_seconds);
        timer.end(tracer, PhaseKind::FrameCallbacks);

        timer.begin(tracer, PhaseKind::UpdateTransforms);
        let nodes = self.scene.update_transforms(buffer_index);
        timer.end(tracer, PhaseKind::UpdateTransforms);

        timer.begin(tracer, PhaseKind::PrepareRender);
        let mut render_list = RenderList::new(self.frame_index, buffer_index);
        self.scene.prepare_render(&mut render_list);
        timer.end(tracer, PhaseKind::PrepareRender);

        #[cfg(feature = "trace-rich")]
        if tracer.is_enabled() {
            trace_updates(tracer, &render_list);
        }

        let updated = render_list.updated_count();
        if processed > 0 || updated > 0 {
            self.keep_rendering = self.config.keep_rendering_frames;
        } else {
            self.keep_rendering = self.keep_rendering.saturating_sub(1);
        }
        let keep_updating = resets.alive > 0
            || constraints_active
            || callbacks_active
            || self.keep_rendering > 0
            || self.queue.has_flushed();

        self.buffers.swap();

        let counters = timer.builder.counters_mut();
        counters.messages = processed;
        counters.resetters = saturate(resets.alive);
        counters.resetters_pruned = saturate(resets.pruned);
        counters.nodes = saturate(nodes);
        counters.render_items = saturate(render_list.len());
        counters.updated_items = saturate(updated);
        let end = timer.now();
        let summary = timer.builder.finish();
        tracer.update_end(&UpdateEndEvent {
            frame_index: self.frame_index,
            timestamp: end,
            keep_updating,
        });
        tracer.frame_summary(&summary);
        log::debug!(
            "frame {}: {} messages, {} items ({} updated), {} resetters",
            self.frame_index,
            processed,
            render_list.len(),
            updated,
            resets.alive,
        );

        UpdateResult {
            render_list,
            summary,
            keep_updating,
        }
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "buffer indices are 0 or 1"
)]
fn slot_byte(index: BufferIndex) -> u8 {
    index.get() as u8
}

struct FrameTimer {
    epoch: Instant,
    frame_index: u64,
    builder: FrameSummaryBuilder,
}

impl FrameTimer {
    fn new(epoch: Instant, frame_index: u64, buffer_index: BufferIndex) -> Self {
        Self {
            epoch,
            frame_index,
            builder: FrameSummaryBuilder::new(frame_index, slot_byte(buffer_index)),
        }
    }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn begin(&mut self, tracer: &mut Tracer<'_>, phase: PhaseKind) {
        let timestamp = self.now();
        self.builder.phase_begin(phase, timestamp);
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index: self.frame_index,
            phase,
            timestamp,
        });
    }

    fn end(&mut self, tracer: &mut Tracer<'_>, phase: PhaseKind) {
        let timestamp = self.now();
        self.builder.phase_end(phase, timestamp);
        tracer.phase_end(&PhaseEndEvent {
            frame_index: self.frame_index,
            phase,
            timestamp,
        });
    }
}

#[cfg(feature = "trace-rich")]
#[expect(
    clippy::cast_possible_truncation,
    reason = "areas are clamped to whole screen pixels"
)]
fn trace_updates(tracer: &mut Tracer<'_>, list: &RenderList) {
    use alloc::vec::Vec;

    use crate::trace::{AreaRect, UpdatedItem};

    let updated = list.iter().filter(|item| item.updated);
    let items: Vec<UpdatedItem> = updated
        .clone()
        .map(|item| UpdatedItem {
            node_index: item.node.index(),
            node_generation: item.node.generation(),
            renderer_index: item.renderer.index(),
        })
        .collect();
    let areas: Vec<AreaRect> = updated
        .map(|item| {
            let rect = item.updated_area.expand();
            AreaRect {
                x: rect.x0 as i32,
                y: rect.y0 as i32,
                width: rect.width() as u32,
                height: rect.height() as u32,
            }
        })
        .collect();
    tracer.updated_items(list.frame_index, &items);
    tracer.updated_areas(list.frame_index, &areas);
}
