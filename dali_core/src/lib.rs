// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered scene-graph update core.
//!
//! `dali_core` holds the state shared between the Event thread, which runs
//! application logic, and the Update thread, which evaluates the scene graph
//! once per frame. It is `no_std` compatible (with `alloc`); the cross-thread
//! pieces need the `std` feature.
//!
//! # Architecture
//!
//! ```text
//!   Event thread                          Update thread
//!   ────────────                          ─────────────
//!   EventThreadServices ──► MessageQueue ──► UpdateManager::update()
//!        │  (allocate in                      │ drain ► reset ► constrain
//!        │   SyncMemoryPool)                  │ ► callbacks ► transforms
//!        ▼                                    ▼ ► prepare render ► swap
//!   NodeKey / RendererKey                RenderList ──► render thread
//! ```
//!
//! **[`buffer`]**: [`BufferIndex`](buffer::BufferIndex) and the two-slot
//! storage every per-frame value lives in. The Update thread writes one slot
//! while the Render thread reads the other.
//!
//! **[`property`]**: animatable properties with a base value and a dirty
//! flag, so [`resetter`]s can restore one-frame writes.
//!
//! **[`memory_pool`]**: block allocator handing out generation-checked keys.
//!
//! **[`message`]**: word-encoded messages plus deferred closures, batched
//! and swapped between threads.
//!
//! **[`constraint`]**, **[`uniform_map`]**, **[`property_owner`]**,
//! **[`partial_render`]**: the per-object machinery the update loop drives.
//!
//! **[`scene`]**: nodes and renderers, the objects the machinery acts on.
//!
//! **`update`** (`std`): the update loop and the Event-thread handle.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and the zero-overhead
//! [`Tracer`](trace::Tracer) wrapper for update-loop instrumentation.
//!
//! # Crate features
//!
//! - `std` (enabled by default): the thread-safe pool, message queue and
//!   update loop.
//! - `trace` (disabled by default): enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): per-item update and
//!   area events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod buffer;
pub mod constraint;
mod error;
pub mod math;
pub mod memory_pool;
pub mod message;
pub mod partial_render;
pub mod property;
pub mod property_owner;
pub mod render_list;
pub mod resetter;
pub mod scene;
pub mod trace;
pub mod transform;
pub mod uniform_map;
#[cfg(feature = "std")]
pub mod update;

pub use error::Error;
