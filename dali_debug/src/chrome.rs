// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion of recorded update traces to JSON for trace viewers.
//!
//! [`export`] turns the log of a [`RecorderSink`](super::recorder::RecorderSink)
//! into a [Chrome Trace Event Format][format] array.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use dali_core::trace::PhaseKind;

use crate::recorder::{RecordedEvent, decode};

/// Writes a recorded log as one JSON array of trace events.
///
/// Open the result in [Perfetto](https://ui.perfetto.dev/) or
/// `chrome://tracing`.
/// Updates and phases become duration events on the Update thread track.
/// Events without a timestamp of their own are placed at the start of the
/// update they belong to.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut update_start = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::UpdateBegin(e) => {
                update_start = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "B",
                    "name": "Update",
                    "cat": "Update",
                    "ts": update_start,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                        "buffer_index": e.buffer_index,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Phase",
                    "ts": nanos_to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Phase",
                    "ts": nanos_to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Messages(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "Messages",
                    "cat": "Queue",
                    "ts": update_start,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "processed": e.processed,
                    }
                }));
            }
            RecordedEvent::UpdateEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Update",
                    "cat": "Update",
                    "ts": nanos_to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                        "keep_updating": e.keep_updating,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                let phases: serde_json::Map<String, Value> = PhaseKind::ALL
                    .iter()
                    .map(|&phase| {
                        (
                            format!("{}_us", phase.name()),
                            json!(nanos_to_us(s.phase(phase))),
                        )
                    })
                    .collect();
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": update_start,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": s.frame_index,
                        "phases": phases,
                        "messages": s.messages,
                        "resetters": s.resetters,
                        "resetters_pruned": s.resetters_pruned,
                        "nodes": s.nodes,
                        "render_items": s.render_items,
                        "updated_items": s.updated_items,
                    }
                }));
            }
            RecordedEvent::UpdatedItems { frame_index, items } => {
                let nodes: Vec<u32> = items.iter().map(|item| item.node_index).collect();
                events.push(json!({
                    "ph": "i",
                    "name": "UpdatedItems",
                    "cat": "Rich",
                    "ts": update_start,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "count": items.len(),
                        "nodes": nodes,
                    }
                }));
            }
            RecordedEvent::UpdatedAreas { frame_index, rects } => {
                let rects: Vec<Value> = rects
                    .iter()
                    .map(|r| json!([r.x, r.y, r.width, r.height]))
                    .collect();
                events.push(json!({
                    "ph": "i",
                    "name": "UpdatedAreas",
                    "cat": "Rich",
                    "ts": update_start,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "rects": rects,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use dali_core::trace::{
        AreaRect, FrameSummary, PhaseBeginEvent, PhaseEndEvent, TraceSink, UpdateBeginEvent,
        UpdateEndEvent,
    };

    #[test]
    fn export_produces_balanced_durations() {
        let mut rec = RecorderSink::new();
        rec.on_update_begin(&UpdateBeginEvent {
            frame_index: 0,
            buffer_index: 0,
            timestamp: 1_000_000,
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::ResetProperties,
            timestamp: 1_000_000,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 0,
            phase: PhaseKind::ResetProperties,
            timestamp: 1_000_100,
        });
        rec.on_update_end(&UpdateEndEvent {
            frame_index: 0,
            timestamp: 1_002_000,
            keep_updating: false,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Update");
        assert_eq!(parsed[0]["ts"], 1000.0);

        assert_eq!(parsed[1]["ph"], "B");
        assert_eq!(parsed[1]["name"], "reset_properties");
        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 1000.1);

        assert_eq!(parsed[3]["ph"], "E");
        assert_eq!(parsed[3]["args"]["keep_updating"], false);
    }

    #[test]
    fn summary_and_areas_are_anchored_to_update_start() {
        let mut rec = RecorderSink::new();
        rec.on_update_begin(&UpdateBeginEvent {
            frame_index: 3,
            buffer_index: 1,
            timestamp: 5_000,
        });
        rec.on_frame_summary(&FrameSummary {
            frame_index: 3,
            render_items: 2,
            ..FrameSummary::default()
        });
        rec.on_updated_areas(
            3,
            &[AreaRect {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
            }],
        );

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1]["ts"], 5.0);
        assert_eq!(parsed[1]["args"]["render_items"], 2);
        assert_eq!(parsed[1]["args"]["phases"]["prepare_render_us"], 0.0);
        assert_eq!(parsed[2]["args"]["rects"], json!([[1, 2, 3, 4]]));
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }
}
