// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Nanosecond
//! timestamps are shown in microseconds.

use std::io::Write;

use dali_core::trace::{
    AreaRect, FrameSummary, MessagesEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceSink,
    UpdateBeginEvent, UpdateEndEvent, UpdatedItem,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[update:begin] frame={} buffer={} at {:.1}µs",
            e.frame_index,
            e.buffer_index,
            us(e.timestamp),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_messages(&mut self, e: &MessagesEvent) {
        let _ = writeln!(
            self.writer,
            "[messages] frame={} processed={}",
            e.frame_index, e.processed,
        );
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        let next = if e.keep_updating { "keep" } else { "idle" };
        let _ = writeln!(
            self.writer,
            "[update:end] frame={} at {:.1}µs next={next}",
            e.frame_index,
            us(e.timestamp),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = write!(self.writer, "[summary] frame={}", s.frame_index);
        for phase in PhaseKind::ALL {
            let _ = write!(self.writer, " {}={:.1}µs", phase.name(), us(s.phase(phase)));
        }
        let _ = writeln!(
            self.writer,
            " messages={} resetters={}(-{}) nodes={} items={} updated={}",
            s.messages,
            s.resetters,
            s.resetters_pruned,
            s.nodes,
            s.render_items,
            s.updated_items,
        );
    }

    fn on_updated_items(&mut self, frame_index: u64, items: &[UpdatedItem]) {
        let _ = writeln!(
            self.writer,
            "[items] frame={frame_index} updated={}",
            items.len(),
        );
    }

    fn on_updated_areas(&mut self, frame_index: u64, rects: &[AreaRect]) {
        let _ = write!(self.writer, "[areas] frame={frame_index}");
        for r in rects {
            let _ = write!(self.writer, " {}x{}@{},{}", r.width, r.height, r.x, r.y);
        }
        let _ = writeln!(self.writer);
    }
}
