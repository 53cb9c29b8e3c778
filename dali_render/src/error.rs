// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;

/// Errors raised while rendering a frame.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// An item's uniforms do not fit the reserved block.
    #[error("uniform block needs {needed} bytes, {available} available")]
    UniformBlockTooSmall {
        /// Bytes the layout needs.
        needed: usize,
        /// Bytes reserved.
        available: usize,
    },
    /// The graphics controller failed.
    #[error("graphics controller: {0}")]
    Controller(String),
}
