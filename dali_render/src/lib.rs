// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-thread consumer of [`dali_core`] render lists.
//!
//! The Update thread produces a [`RenderList`](dali_core::render_list::RenderList)
//! per frame. This crate turns it into draw work:
//!
//! - [`RenderInstruction`]: items sorted into draw order by depth index
//! - [`DamageRegion`]: the surface area touched by updated items
//! - [`UniformBlockWriter`]: uniform packing with layouts cached per
//!   node/renderer pair and re-derived when a uniform map changes
//! - [`GraphicsController`] and [`RenderManager`]: the backend seam and the
//!   loop driving it, with optional partial rendering

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod damage;
mod error;
mod graphics;
mod instruction;
mod uniform_block;

pub use damage::DamageRegion;
pub use error::RenderError;
pub use graphics::{GraphicsController, RenderConfig, RenderManager, RenderStats};
pub use instruction::RenderInstruction;
pub use uniform_block::{UNIFORM_SLOT_SIZE, UniformBlockLayout, UniformBlockWriter};
