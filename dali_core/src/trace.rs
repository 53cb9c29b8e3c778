// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the update loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! update loop calls at each stage. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps and counters during a
//! frame and produces a [`FrameSummary`] at the end.
//!
//! Timestamps are nanoseconds on a monotonic clock chosen by the caller.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) gates [`UpdatedItem`] and [`AreaRect`]
//!   events plus the corresponding `TraceSink` methods.

/// Which phase of the update loop is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Draining the message queue.
    ProcessMessages,
    /// Running resetters.
    ResetProperties,
    /// Applying constraints.
    ApplyConstraints,
    /// Running frame callbacks.
    FrameCallbacks,
    /// Computing world matrices and colors.
    UpdateTransforms,
    /// Building the render list and comparing partial-rendering snapshots.
    PrepareRender,
}

impl PhaseKind {
    /// Every phase, in execution order.
    pub const ALL: [Self; 6] = [
        Self::ProcessMessages,
        Self::ResetProperties,
        Self::ApplyConstraints,
        Self::FrameCallbacks,
        Self::UpdateTransforms,
        Self::PrepareRender,
    ];

    /// Position in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::ProcessMessages => 0,
            Self::ResetProperties => 1,
            Self::ApplyConstraints => 2,
            Self::FrameCallbacks => 3,
            Self::UpdateTransforms => 4,
            Self::PrepareRender => 5,
        }
    }

    /// Inverse of [`index`](Self::index).
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::ALL.len() {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ProcessMessages => "process_messages",
            Self::ResetProperties => "reset_properties",
            Self::ApplyConstraints => "apply_constraints",
            Self::FrameCallbacks => "frame_callbacks",
            Self::UpdateTransforms => "update_transforms",
            Self::PrepareRender => "prepare_render",
        }
    }
}

/// Emitted when an update starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateBeginEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Buffer slot being written.
    pub buffer_index: u8,
    /// Start of the update.
    pub timestamp: u64,
}

/// Marks the beginning of a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Start of the phase.
    pub timestamp: u64,
}

/// Marks the end of a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// End of the phase.
    pub timestamp: u64,
}

/// Emitted once the message queue has been drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessagesEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Records processed, messages and deferred closures together.
    pub processed: u32,
}

/// Emitted when an update finishes and the buffers are swapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// End of the update.
    pub timestamp: u64,
    /// Whether another update is needed even without new messages.
    pub keep_updating: bool,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Buffer slot written.
    pub buffer_index: u8,
    /// Phase durations in nanoseconds, indexed by [`PhaseKind::index`]
    /// (0 if not measured).
    pub phase_nanos: [u64; 6],
    /// Records drained from the queue.
    pub messages: u32,
    /// Resetters still alive after the reset pass.
    pub resetters: u32,
    /// Resetters pruned this frame.
    pub resetters_pruned: u32,
    /// Nodes visited by the transform pass.
    pub nodes: u32,
    /// Items in the render list.
    pub render_items: u32,
    /// Items whose state changed.
    pub updated_items: u32,
}

impl FrameSummary {
    /// Duration of `phase` in nanoseconds.
    #[must_use]
    pub fn phase(&self, phase: PhaseKind) -> u64 {
        self.phase_nanos[phase.index()]
    }

    /// Sum of every measured phase.
    #[must_use]
    pub fn total_nanos(&self) -> u64 {
        self.phase_nanos.iter().sum()
    }
}

/// A render item whose state changed.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdatedItem {
    /// Node slot index.
    pub node_index: u32,
    /// Node slot generation.
    pub node_generation: u32,
    /// Renderer slot index.
    pub renderer_index: u32,
}

/// An axis-aligned screen rectangle in whole pixels.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Receives trace events from the update loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when an update starts.
    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after the message queue has been drained.
    fn on_messages(&mut self, e: &MessagesEvent) {
        _ = e;
    }

    /// Called when an update finishes.
    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with the render items that changed (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_updated_items(&mut self, frame_index: u64, items: &[UpdatedItem]) {
        _ = (frame_index, items);
    }

    /// Called with the screen areas those items touched (requires
    /// `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_updated_areas(&mut self, frame_index: u64, rects: &[AreaRect]) {
        _ = (frame_index, rects);
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $($arg:expr),+) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($($arg),+);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = ($($arg),+);
        }
    }};
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Whether events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits an [`UpdateBeginEvent`].
    #[inline]
    pub fn update_begin(&mut self, e: &UpdateBeginEvent) {
        dispatch!(self, on_update_begin, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        dispatch!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        dispatch!(self, on_phase_end, e);
    }

    /// Emits a [`MessagesEvent`].
    #[inline]
    pub fn messages(&mut self, e: &MessagesEvent) {
        dispatch!(self, on_messages, e);
    }

    /// Emits an [`UpdateEndEvent`].
    #[inline]
    pub fn update_end(&mut self, e: &UpdateEndEvent) {
        dispatch!(self, on_update_end, e);
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        dispatch!(self, on_frame_summary, s);
    }

    /// Emits changed render items (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn updated_items(&mut self, frame_index: u64, items: &[UpdatedItem]) {
        if let Some(s) = &mut self.sink {
            s.on_updated_items(frame_index, items);
        }
    }

    /// Emits updated screen areas (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn updated_areas(&mut self, frame_index: u64, rects: &[AreaRect]) {
        if let Some(s) = &mut self.sink {
            s.on_updated_areas(frame_index, rects);
        }
    }
}

/// Collects phase timestamps and counters during a frame.
#[derive(Clone, Debug)]
pub struct FrameSummaryBuilder {
    summary: FrameSummary,
    phase_starts: [Option<u64>; 6],
    phase_ends: [Option<u64>; 6],
}

impl FrameSummaryBuilder {
    /// Starts a summary for `frame_index`.
    #[must_use]
    pub fn new(frame_index: u64, buffer_index: u8) -> Self {
        Self {
            summary: FrameSummary {
                frame_index,
                buffer_index,
                ..FrameSummary::default()
            },
            phase_starts: [None; 6],
            phase_ends: [None; 6],
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: u64) {
        self.phase_starts[phase.index()] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: u64) {
        self.phase_ends[phase.index()] = Some(t);
    }

    /// Counters filled in by the update loop.
    pub fn counters_mut(&mut self) -> &mut FrameSummary {
        &mut self.summary
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        let mut summary = self.summary;
        for (i, nanos) in summary.phase_nanos.iter_mut().enumerate() {
            *nanos = match (self.phase_starts[i], self.phase_ends[i]) {
                (Some(start), Some(end)) => end.saturating_sub(start),
                _ => 0,
            };
        }
        summary
    }
}
