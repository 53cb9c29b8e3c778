// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable errors reported to Event-thread callers.

use crate::property::PropertyType;
use crate::scene::{NodeKey, RendererKey};

/// Errors returned by scene-graph operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The node key does not refer to a live node.
    #[error("node {0:?} does not exist")]
    StaleNode(NodeKey),
    /// The renderer key does not refer to a live renderer.
    #[error("renderer {0:?} does not exist")]
    StaleRenderer(RendererKey),
    /// Connecting the node would make it its own ancestor.
    #[error("connecting {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// The requested parent.
        parent: NodeKey,
        /// The node being connected.
        child: NodeKey,
    },
    /// The value's type does not match the property.
    #[error("property expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        /// Type the property stores.
        expected: PropertyType,
        /// Type of the supplied value.
        actual: PropertyType,
    },
}
