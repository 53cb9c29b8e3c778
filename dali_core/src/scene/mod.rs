// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update-thread scene-graph objects.

mod node;
mod node_constraint;
mod renderer;

pub use node::{Node, NodeKey, NodeProperty, RendererAttachment};
pub use node_constraint::{ConstraintFn, NodeConstraint};
pub use renderer::{Renderer, RendererKey, RendererProperty};
