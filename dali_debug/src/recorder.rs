// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update-loop trace capture in a flat byte log.
//!
//! Each event [`RecorderSink`] receives is appended as one tag byte plus
//! little-endian fields. [`decode`] walks the log and yields
//! [`RecordedEvent`]s in the order they were emitted.
//!
//! Rich events ([`on_updated_items`](TraceSink::on_updated_items),
//! [`on_updated_areas`](TraceSink::on_updated_areas)) are stored as a `u32`
//! count followed by that many fixed-size entries.

use dali_core::trace::{
    AreaRect, FrameSummary, MessagesEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, TraceSink,
    UpdateBeginEvent, UpdateEndEvent, UpdatedItem,
};

// Record tags. Zero is never written.
const TAG_UPDATE_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_MESSAGES: u8 = 4;
const TAG_UPDATE_END: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_UPDATED_ITEMS: u8 = 7;
const TAG_UPDATED_AREAS: u8 = 8;

/// Appends every update-loop event to an in-memory byte log.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Starts with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The log so far, for [`decode`] or the Chrome exporter.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Takes the log out of the recorder.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- Fields --

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "phase indices are below PhaseKind::ALL.len()"
    )]
    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(p.index() as u8);
    }

    /// Writes a count capped at `u32::MAX` and returns how many entries
    /// should follow.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "entry count capped at u32::MAX for recording"
    )]
    fn write_count(&mut self, len: usize) -> usize {
        let count = len.min(u32::MAX as usize) as u32;
        self.write_u32(count);
        count as usize
    }
}

impl TraceSink for RecorderSink {
    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        self.write_u8(TAG_UPDATE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_u8(e.buffer_index);
        self.write_u64(e.timestamp);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp);
    }

    fn on_messages(&mut self, e: &MessagesEvent) {
        self.write_u8(TAG_MESSAGES);
        self.write_u64(e.frame_index);
        self.write_u32(e.processed);
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        self.write_u8(TAG_UPDATE_END);
        self.write_u64(e.frame_index);
        self.write_u64(e.timestamp);
        self.write_u8(u8::from(e.keep_updating));
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u8(s.buffer_index);
        for nanos in s.phase_nanos {
            self.write_u64(nanos);
        }
        self.write_u32(s.messages);
        self.write_u32(s.resetters);
        self.write_u32(s.resetters_pruned);
        self.write_u32(s.nodes);
        self.write_u32(s.render_items);
        self.write_u32(s.updated_items);
    }

    fn on_updated_items(&mut self, frame_index: u64, items: &[UpdatedItem]) {
        self.write_u8(TAG_UPDATED_ITEMS);
        self.write_u64(frame_index);
        let count = self.write_count(items.len());
        for item in &items[..count] {
            self.write_u32(item.node_index);
            self.write_u32(item.node_generation);
            self.write_u32(item.renderer_index);
        }
    }

    fn on_updated_areas(&mut self, frame_index: u64, rects: &[AreaRect]) {
        self.write_u8(TAG_UPDATED_AREAS);
        self.write_u64(frame_index);
        let count = self.write_count(rects.len());
        for rect in &rects[..count] {
            self.write_i32(rect.x);
            self.write_i32(rect.y);
            self.write_u32(rect.width);
            self.write_u32(rect.height);
        }
    }
}

// -- Decoding --

/// One event read back from a [`RecorderSink`] log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// An [`UpdateBeginEvent`].
    UpdateBegin(UpdateBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`MessagesEvent`].
    Messages(MessagesEvent),
    /// An [`UpdateEndEvent`].
    UpdateEnd(UpdateEndEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Render items that changed in a frame.
    UpdatedItems {
        /// Frame counter.
        frame_index: u64,
        /// The changed items.
        items: Vec<UpdatedItem>,
    },
    /// Screen areas touched in a frame.
    UpdatedAreas {
        /// Frame counter.
        frame_index: u64,
        /// The touched areas.
        rects: Vec<AreaRect>,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Yields the events of a log, stopping at the end or at a bad record.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        PhaseKind::from_index(usize::from(self.read_u8()?))
    }

    fn decode_update_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateBegin(UpdateBeginEvent {
            frame_index: self.read_u64()?,
            buffer_index: self.read_u8()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_messages(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Messages(MessagesEvent {
            frame_index: self.read_u64()?,
            processed: self.read_u32()?,
        }))
    }

    fn decode_update_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateEnd(UpdateEndEvent {
            frame_index: self.read_u64()?,
            timestamp: self.read_u64()?,
            keep_updating: self.read_u8()? != 0,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let buffer_index = self.read_u8()?;
        let mut phase_nanos = [0; 6];
        for nanos in &mut phase_nanos {
            *nanos = self.read_u64()?;
        }
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index,
            buffer_index,
            phase_nanos,
            messages: self.read_u32()?,
            resetters: self.read_u32()?,
            resetters_pruned: self.read_u32()?,
            nodes: self.read_u32()?,
            render_items: self.read_u32()?,
            updated_items: self.read_u32()?,
        }))
    }

    fn decode_updated_items(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        let items = (0..count)
            .map(|_| {
                Some(UpdatedItem {
                    node_index: self.read_u32()?,
                    node_generation: self.read_u32()?,
                    renderer_index: self.read_u32()?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(RecordedEvent::UpdatedItems { frame_index, items })
    }

    fn decode_updated_areas(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        let rects = (0..count)
            .map(|_| {
                Some(AreaRect {
                    x: self.read_i32()?,
                    y: self.read_i32()?,
                    width: self.read_u32()?,
                    height: self.read_u32()?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(RecordedEvent::UpdatedAreas { frame_index, rects })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_UPDATE_BEGIN => self.decode_update_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_MESSAGES => self.decode_messages(),
            TAG_UPDATE_END => self.decode_update_end(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_UPDATED_ITEMS => self.decode_updated_items(),
            TAG_UPDATED_AREAS => self.decode_updated_areas(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> FrameSummary {
        FrameSummary {
            frame_index: 7,
            buffer_index: 1,
            phase_nanos: [100, 50, 0, 0, 400, 1_500],
            messages: 12,
            resetters: 4,
            resetters_pruned: 1,
            nodes: 30,
            render_items: 9,
            updated_items: 2,
        }
    }

    #[test]
    fn one_frame_decodes_in_order() {
        let mut rec = RecorderSink::new();
        let begin = UpdateBeginEvent {
            frame_index: 7,
            buffer_index: 1,
            timestamp: 1_000,
        };
        let phase = PhaseBeginEvent {
            frame_index: 7,
            phase: PhaseKind::PrepareRender,
            timestamp: 1_200,
        };
        let messages = MessagesEvent {
            frame_index: 7,
            processed: 12,
        };
        let end = UpdateEndEvent {
            frame_index: 7,
            timestamp: 3_000,
            keep_updating: true,
        };
        rec.on_update_begin(&begin);
        rec.on_messages(&messages);
        rec.on_phase_begin(&phase);
        rec.on_update_end(&end);
        rec.on_frame_summary(&sample_summary());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(
            events,
            [
                RecordedEvent::UpdateBegin(begin),
                RecordedEvent::Messages(messages),
                RecordedEvent::PhaseBegin(phase),
                RecordedEvent::UpdateEnd(end),
                RecordedEvent::FrameSummary(sample_summary()),
            ]
        );
    }

    #[test]
    fn rich_events_keep_their_entries() {
        let mut rec = RecorderSink::new();
        let items = [
            UpdatedItem {
                node_index: 3,
                node_generation: 1,
                renderer_index: 0,
            },
            UpdatedItem {
                node_index: 5,
                node_generation: 0,
                renderer_index: 2,
            },
        ];
        let rects = [AreaRect {
            x: -5,
            y: -5,
            width: 30,
            height: 10,
        }];
        rec.on_updated_items(42, &items);
        rec.on_updated_areas(42, &rects);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::UpdatedItems { frame_index, items: decoded } => {
                assert_eq!(*frame_index, 42);
                assert_eq!(decoded.as_slice(), items);
            }
            other => panic!("expected UpdatedItems, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::UpdatedAreas { rects: decoded, .. } => {
                assert_eq!(decoded.as_slice(), rects);
            }
            other => panic!("expected UpdatedAreas, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_messages(&MessagesEvent {
            frame_index: 1,
            processed: 2,
        });
        rec.on_frame_summary(&sample_summary());
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RecordedEvent::Messages(_)));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_tag_stops_iteration() {
        assert_eq!(decode(&[0xff, 1, 2, 3]).count(), 0);
    }
}
