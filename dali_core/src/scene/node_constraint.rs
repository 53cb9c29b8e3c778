// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constraints that compute a node property from other node properties.

use alloc::boxed::Box;
use core::fmt;

use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::constraint::{ApplyRate, Constraint, ConstraintTag};
use crate::memory_pool::MemoryPool;
use crate::property::PropertyValue;

use super::node::{Node, NodeKey, NodeProperty};

/// The function a [`NodeConstraint`] evaluates.
///
/// Receives the target's current value and the source values, in the order
/// the sources were added, and returns the new target value.
pub type ConstraintFn = Box<dyn FnMut(PropertyValue, &[PropertyValue]) -> PropertyValue + Send>;

/// Drives `target.property` from a list of source properties.
///
/// Continuous constraints write the current slot only, so the property's
/// resetter restores the base value every frame. An apply-once constraint
/// bakes its result.
pub struct NodeConstraint {
    target: NodeKey,
    property: NodeProperty,
    sources: SmallVec<[(NodeKey, NodeProperty); 4]>,
    func: ConstraintFn,
    rate: ApplyRate,
    applied_count: u32,
    tag: ConstraintTag,
}

impl fmt::Debug for NodeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConstraint")
            .field("target", &self.target)
            .field("property", &self.property)
            .field("sources", &self.sources)
            .field("rate", &self.rate)
            .field("applied_count", &self.applied_count)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

impl NodeConstraint {
    /// Creates a continuous, untagged constraint with no sources.
    #[must_use]
    pub fn new(
        target: NodeKey,
        property: NodeProperty,
        func: impl FnMut(PropertyValue, &[PropertyValue]) -> PropertyValue + Send + 'static,
    ) -> Self {
        Self {
            target,
            property,
            sources: SmallVec::new(),
            func: Box::new(func),
            rate: ApplyRate::Continuous,
            applied_count: 0,
            tag: ConstraintTag::NONE,
        }
    }

    /// Adds an input.
    #[must_use]
    pub fn with_source(mut self, node: NodeKey, property: NodeProperty) -> Self {
        self.sources.push((node, property));
        self
    }

    /// Sets the apply rate.
    #[must_use]
    pub fn with_apply_rate(mut self, rate: ApplyRate) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: ConstraintTag) -> Self {
        self.tag = tag;
        self
    }

    /// The constrained node.
    #[must_use]
    pub fn target(&self) -> NodeKey {
        self.target
    }

    /// The constrained property.
    #[must_use]
    pub fn property(&self) -> NodeProperty {
        self.property
    }
}

impl Constraint<MemoryPool<Node>> for NodeConstraint {
    fn apply(&mut self, buffer_index: BufferIndex, nodes: &mut MemoryPool<Node>) {
        let mut inputs: SmallVec<[PropertyValue; 4]> = SmallVec::new();
        for &(node, property) in &self.sources {
            let Some(source) = nodes.get(node) else {
                log::warn!("constraint source {node:?} is gone; skipping");
                return;
            };
            inputs.push(source.property(property, buffer_index));
        }
        let Some(target) = nodes.get_mut(self.target) else {
            log::warn!("constraint target {:?} is gone; skipping", self.target);
            return;
        };
        let current = target.property(self.property, buffer_index);
        let value = (self.func)(current, &inputs);
        let written = match self.rate {
            ApplyRate::Continuous => target.set_property(self.property, value, buffer_index),
            ApplyRate::ApplyOnce => target.bake_property(self.property, value, buffer_index),
        };
        if let Err(err) = written {
            log::warn!("constraint on {:?}: {err}", self.property);
            return;
        }
        self.applied_count = self.applied_count.saturating_add(1);
    }

    fn apply_rate(&self) -> ApplyRate {
        self.rate
    }

    fn set_apply_rate(&mut self, rate: ApplyRate) {
        self.rate = rate;
        self.applied_count = 0;
    }

    fn applied_count(&self) -> u32 {
        self.applied_count
    }

    fn tag(&self) -> ConstraintTag {
        self.tag
    }
}
