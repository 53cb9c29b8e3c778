// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Update thread's view of the scene.
//!
//! [`SceneGraph`] owns everything messages act on: the node and renderer
//! pools (shared with the Event thread for allocation only), the resetter
//! containers, per-node constraints, frame callbacks and the cached
//! depth-first traversal. Its `pub` methods are what message handling and
//! deferred closures call; the frame phases are driven by
//! [`UpdateManager`](super::UpdateManager).

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use parking_lot::MutexGuard;
use smallvec::SmallVec;

use crate::buffer::BufferIndex;
use crate::constraint::{ApplyRate, Constraint, ConstraintContainer, ConstraintId, ConstraintTag};
use crate::error::Error;
use crate::memory_pool::{MemoryPool, MemoryPoolKey, SyncMemoryPool};
use crate::partial_render::PartialRenderingCacheInfo;
use crate::property::PropertyValue;
use crate::property_owner::OwnerId;
use crate::render_list::{RenderItem, RenderList, UniformValue, item_bounds};
use crate::resetter::{ResetTarget, Resetter, ResetterContainer, ResetterKey};
use crate::scene::{
    Node, NodeConstraint, NodeKey, NodeProperty, Renderer, RendererKey, RendererProperty,
};
use crate::uniform_map::{UniformMap, UniformPropertyMapping};

use super::frame_callback::{FrameCallback, FrameCallbackId, UpdateProxy};

/// Boxed frame callback.
pub type BoxedFrameCallback = Box<dyn FrameCallback + Send>;

struct ConstraintEntry {
    id: ConstraintId,
    tag: ConstraintTag,
    property: NodeProperty,
    /// Holds the property resetter while the constraint is active.
    holds_resetter: bool,
}

#[derive(Default)]
struct NodeConstraints {
    container: ConstraintContainer<MemoryPool<Node>>,
    entries: Vec<ConstraintEntry>,
}

struct PropertyResetterRef {
    key: ResetterKey<Node>,
    users: u32,
}

/// Counters from one reset pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetStats {
    /// Resetters still alive.
    pub alive: usize,
    /// Resetters pruned.
    pub pruned: usize,
}

/// Scene state owned by the Update thread.
pub struct SceneGraph {
    nodes: Arc<SyncMemoryPool<Node>>,
    renderers: Arc<SyncMemoryPool<Renderer>>,
    root: NodeKey,
    node_resetters: ResetterContainer<Node>,
    renderer_resetters: ResetterContainer<Renderer>,
    node_object_resetters: HashMap<NodeKey, ResetterKey<Node>>,
    renderer_object_resetters: HashMap<RendererKey, ResetterKey<Renderer>>,
    property_resetters: HashMap<(NodeKey, NodeProperty), PropertyResetterRef>,
    constraints: HashMap<NodeKey, NodeConstraints>,
    frame_callbacks: Vec<(FrameCallbackId, BoxedFrameCallback)>,
    pending_sets: Vec<(NodeKey, NodeProperty, PropertyValue)>,
    traversal: Vec<NodeKey>,
    traversal_dirty: bool,
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneGraph")
            .field("root", &self.root)
            .field("node_resetters", &self.node_resetters)
            .field("renderer_resetters", &self.renderer_resetters)
            .field("constraints", &self.constraints.len())
            .field("frame_callbacks", &self.frame_callbacks.len())
            .field("traversal", &self.traversal.len())
            .finish_non_exhaustive()
    }
}

impl SceneGraph {
    /// Creates a scene holding only the root node.
    pub(crate) fn new(
        nodes: Arc<SyncMemoryPool<Node>>,
        renderers: Arc<SyncMemoryPool<Renderer>>,
    ) -> Self {
        let root = nodes.allocate_thread_safe(Node::new_root());
        let mut scene = Self {
            nodes,
            renderers,
            root,
            node_resetters: ResetterContainer::new(),
            renderer_resetters: ResetterContainer::new(),
            node_object_resetters: HashMap::new(),
            renderer_object_resetters: HashMap::new(),
            property_resetters: HashMap::new(),
            constraints: HashMap::new(),
            frame_callbacks: Vec::new(),
            pending_sets: Vec::new(),
            traversal: Vec::new(),
            traversal_dirty: true,
        };
        let mut nodes = scene.nodes.lock();
        ensure_object_resetter(
            &mut scene.node_resetters,
            &mut scene.node_object_resetters,
            &mut nodes,
            root,
        );
        drop(nodes);
        scene
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Locks the node pool, e.g. to read world values between updates.
    pub fn lock_nodes(&self) -> MutexGuard<'_, MemoryPool<Node>> {
        self.nodes.lock()
    }

    /// Locks the renderer pool.
    pub fn lock_renderers(&self) -> MutexGuard<'_, MemoryPool<Renderer>> {
        self.renderers.lock()
    }

    /// Live node resetters, including those held by constraints.
    #[must_use]
    pub fn node_resetter_count(&self) -> usize {
        self.node_resetters.len()
    }

    /// Live renderer resetters.
    #[must_use]
    pub fn renderer_resetter_count(&self) -> usize {
        self.renderer_resetters.len()
    }

    /// Constraints attached to `node`, active and deactivated.
    #[must_use]
    pub fn constraint_count(&self, node: NodeKey) -> usize {
        self.constraints.get(&node).map_or(0, |c| c.container.len())
    }

    /// Connected nodes in depth-first order, as of the last update.
    #[must_use]
    pub fn traversal(&self) -> &[NodeKey] {
        &self.traversal
    }

    // -- Nodes --

    /// Starts tracking a node allocated by the Event thread.
    pub fn add_node(&mut self, node: NodeKey) -> Result<(), Error> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        ensure_object_resetter(
            &mut self.node_resetters,
            &mut self.node_object_resetters,
            &mut nodes,
            node,
        );
        Ok(())
    }

    /// Makes `child` the last child of `parent`, moving it from any previous
    /// parent.
    pub fn connect_node(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        buffer_index: BufferIndex,
    ) -> Result<(), Error> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains(parent) {
            return Err(Error::StaleNode(parent));
        }
        let Some(child_node) = nodes.get(child) else {
            return Err(Error::StaleNode(child));
        };
        if child == self.root {
            return Err(Error::Cycle { parent, child });
        }
        let old_parent = child_node.parent();
        let was_connected = child_node.owner().is_connected();
        if old_parent == Some(parent) {
            return Ok(());
        }
        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                return Err(Error::Cycle { parent, child });
            }
            cursor = nodes.get(key).and_then(Node::parent);
        }

        if let Some(old) = old_parent
            && let Some(old) = nodes.get_mut(old)
        {
            old.remove_child(child);
        }
        let parent_connected = match nodes.get_mut(parent) {
            Some(p) => {
                p.add_child(child);
                p.owner().is_connected()
            }
            None => false,
        };
        if let Some(c) = nodes.get_mut(child) {
            c.set_parent(Some(parent));
        }

        if parent_connected != was_connected {
            let mut subtree = Vec::new();
            collect_subtree(&nodes, child, &mut subtree);
            for &key in &subtree {
                let Some(node) = nodes.get_mut(key) else {
                    continue;
                };
                let event = if parent_connected {
                    node.owner_mut().connect()
                } else {
                    node.owner_mut().disconnect(buffer_index)
                };
                self.node_resetters.notify_target(key, event, &mut nodes);
                if parent_connected {
                    ensure_object_resetter(
                        &mut self.node_resetters,
                        &mut self.node_object_resetters,
                        &mut nodes,
                        key,
                    );
                }
            }
        }
        self.traversal_dirty = true;
        Ok(())
    }

    /// Removes `node` from its parent, disconnecting its subtree.
    pub fn disconnect_node(&mut self, node: NodeKey, buffer_index: BufferIndex) -> Result<(), Error> {
        let nodes_arc = Arc::clone(&self.nodes);
        let mut nodes = nodes_arc.lock();
        let Some(target) = nodes.get_mut(node) else {
            return Err(Error::StaleNode(node));
        };
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        target.set_parent(None);
        if let Some(p) = nodes.get_mut(parent) {
            p.remove_child(node);
        }
        self.disconnect_subtree(&mut nodes, node, buffer_index);
        self.traversal_dirty = true;
        Ok(())
    }

    fn disconnect_subtree(
        &mut self,
        nodes: &mut MemoryPool<Node>,
        top: NodeKey,
        buffer_index: BufferIndex,
    ) {
        // Caller holds the node lock.
        let mut subtree = Vec::new();
        collect_subtree(nodes, top, &mut subtree);
        for key in subtree {
            let Some(node) = nodes.get_mut(key) else {
                continue;
            };
            if !node.owner().is_connected() {
                continue;
            }
            let event = node.owner_mut().disconnect(buffer_index);
            self.node_resetters.notify_target(key, event, nodes);
        }
    }

    /// Disconnects and frees a node. Its children are orphaned.
    pub fn destroy_node(&mut self, node: NodeKey, buffer_index: BufferIndex) -> Result<(), Error> {
        if node == self.root {
            log::warn!("ignoring request to destroy the root node");
            return Ok(());
        }
        let nodes_arc = Arc::clone(&self.nodes);
        let mut nodes = nodes_arc.lock();
        let Some(target) = nodes.get(node) else {
            return Err(Error::StaleNode(node));
        };
        let parent = target.parent();
        let children: SmallVec<[NodeKey; 8]> = target.children().iter().copied().collect();

        self.disconnect_subtree(&mut nodes, node, buffer_index);
        if let Some(p) = parent.and_then(|p| nodes.get_mut(p)) {
            p.remove_child(node);
        }
        for child in children {
            if let Some(c) = nodes.get_mut(child) {
                c.set_parent(None);
            }
        }

        if let Some(target) = nodes.get_mut(node) {
            let (event, observers) = target.owner_mut().destroy();
            self.node_resetters.notify(&observers, event, None);
        }
        self.constraints.remove(&node);
        self.property_resetters.retain(|&(key, _), _| key != node);
        self.node_object_resetters.remove(&node);
        self.pending_sets.retain(|&(key, _, _)| key != node);
        nodes.free(node);
        self.traversal_dirty = true;
        log::debug!("destroyed node {node:?}");
        Ok(())
    }

    /// Writes the base value and both slots of a node property.
    pub fn bake_node_property(
        &mut self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
        buffer_index: BufferIndex,
    ) -> Result<(), Error> {
        let mut nodes = self.nodes.lock();
        nodes
            .get_mut(node)
            .ok_or(Error::StaleNode(node))?
            .bake_property(property, value, buffer_index)?;
        ensure_object_resetter(
            &mut self.node_resetters,
            &mut self.node_object_resetters,
            &mut nodes,
            node,
        );
        Ok(())
    }

    /// Adds `delta` to a node property's current value and bakes the result.
    pub fn bake_relative_node_property(
        &mut self,
        node: NodeKey,
        property: NodeProperty,
        delta: PropertyValue,
        buffer_index: BufferIndex,
    ) -> Result<(), Error> {
        let mut nodes = self.nodes.lock();
        nodes
            .get_mut(node)
            .ok_or(Error::StaleNode(node))?
            .bake_relative_property(property, delta, buffer_index)?;
        ensure_object_resetter(
            &mut self.node_resetters,
            &mut self.node_object_resetters,
            &mut nodes,
            node,
        );
        Ok(())
    }

    /// Queues a one-frame write, applied after this frame's resetters.
    pub fn set_node_property(
        &mut self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let expected = property.property_type();
        if value.property_type() != expected {
            return Err(Error::TypeMismatch {
                expected,
                actual: value.property_type(),
            });
        }
        self.pending_sets.push((node, property, value));
        Ok(())
    }

    // -- Renderers --

    /// Starts tracking a renderer allocated by the Event thread.
    pub fn add_renderer(&mut self, renderer: RendererKey) -> Result<(), Error> {
        let mut renderers = self.renderers.lock();
        let target = renderers
            .get_mut(renderer)
            .ok_or(Error::StaleRenderer(renderer))?;
        let event = target.owner_mut().connect();
        self.renderer_resetters
            .notify_target(renderer, event, &mut renderers);
        ensure_object_resetter(
            &mut self.renderer_resetters,
            &mut self.renderer_object_resetters,
            &mut renderers,
            renderer,
        );
        Ok(())
    }

    /// Draws `node` with `renderer`, reconnecting the renderer if it was
    /// detached from every node.
    pub fn attach_renderer(&mut self, node: NodeKey, renderer: RendererKey) -> Result<(), Error> {
        if !self.renderers.contains(renderer) {
            return Err(Error::StaleRenderer(renderer));
        }
        let mut nodes = self.nodes.lock();
        let target = nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        if !target.add_renderer(renderer) {
            log::debug!("renderer {renderer:?} already attached to {node:?}");
            return Ok(());
        }
        drop(nodes);

        let mut renderers = self.renderers.lock();
        let Some(target) = renderers.get_mut(renderer) else {
            return Err(Error::StaleRenderer(renderer));
        };
        if target.owner().is_connected() {
            return Ok(());
        }
        let event = target.owner_mut().connect();
        self.renderer_resetters
            .notify_target(renderer, event, &mut renderers);
        ensure_object_resetter(
            &mut self.renderer_resetters,
            &mut self.renderer_object_resetters,
            &mut renderers,
            renderer,
        );
        Ok(())
    }

    /// Stops drawing `node` with `renderer`. A renderer left without nodes
    /// is disconnected; its resetters keep observing it.
    pub fn detach_renderer(
        &mut self,
        node: NodeKey,
        renderer: RendererKey,
        buffer_index: BufferIndex,
    ) -> Result<(), Error> {
        let mut nodes = self.nodes.lock();
        let target = nodes.get_mut(node).ok_or(Error::StaleNode(node))?;
        if !target.remove_renderer(renderer) {
            log::debug!("renderer {renderer:?} was not attached to {node:?}");
            return Ok(());
        }
        let still_used = nodes
            .iter()
            .any(|(_, n)| n.renderers().iter().any(|a| a.renderer == renderer));
        drop(nodes);
        if still_used {
            return Ok(());
        }

        let mut renderers = self.renderers.lock();
        let Some(target) = renderers.get_mut(renderer) else {
            return Ok(());
        };
        let event = target.owner_mut().disconnect(buffer_index);
        self.renderer_resetters
            .notify_target(renderer, event, &mut renderers);
        log::trace!("renderer {renderer:?} disconnected");
        Ok(())
    }

    /// Detaches a renderer from every node and frees it.
    pub fn destroy_renderer(&mut self, renderer: RendererKey) -> Result<(), Error> {
        let renderers_arc = Arc::clone(&self.renderers);
        let mut renderers = renderers_arc.lock();
        let target = renderers
            .get_mut(renderer)
            .ok_or(Error::StaleRenderer(renderer))?;
        let (event, observers) = target.owner_mut().destroy();
        self.renderer_resetters.notify(&observers, event, None);
        renderers.free(renderer);
        drop(renderers);
        self.renderer_object_resetters.remove(&renderer);

        let mut nodes = self.nodes.lock();
        for (_, node) in nodes.iter_mut() {
            node.remove_renderer(renderer);
        }
        log::debug!("destroyed renderer {renderer:?}");
        Ok(())
    }

    /// Writes the base value and both slots of a renderer property.
    pub fn bake_renderer_property(
        &mut self,
        renderer: RendererKey,
        property: RendererProperty,
        value: PropertyValue,
        buffer_index: BufferIndex,
    ) -> Result<(), Error> {
        let mut renderers = self.renderers.lock();
        renderers
            .get_mut(renderer)
            .ok_or(Error::StaleRenderer(renderer))?
            .bake_property(property, value, buffer_index)?;
        ensure_object_resetter(
            &mut self.renderer_resetters,
            &mut self.renderer_object_resetters,
            &mut renderers,
            renderer,
        );
        Ok(())
    }

    /// Changes a renderer's sort key.
    pub fn set_depth_index(&mut self, renderer: RendererKey, depth_index: i32) -> Result<(), Error> {
        self.renderers
            .lock()
            .get_mut(renderer)
            .ok_or(Error::StaleRenderer(renderer))?
            .set_depth_index(depth_index);
        Ok(())
    }

    // -- Uniforms --

    /// Binds a uniform on a node or renderer.
    pub fn add_uniform_mapping(
        &mut self,
        owner: OwnerId,
        mapping: UniformPropertyMapping,
    ) -> Result<(), Error> {
        match owner {
            OwnerId::Node(key) => self
                .nodes
                .lock()
                .get_mut(key)
                .ok_or(Error::StaleNode(key))?
                .owner_mut()
                .add_uniform_mapping(mapping),
            OwnerId::Renderer(key) => self
                .renderers
                .lock()
                .get_mut(key)
                .ok_or(Error::StaleRenderer(key))?
                .owner_mut()
                .add_uniform_mapping(mapping),
        }
        Ok(())
    }

    /// Unbinds a uniform, returning whether it was bound.
    pub fn remove_uniform_mapping(
        &mut self,
        owner: OwnerId,
        uniform_name: &str,
    ) -> Result<bool, Error> {
        Ok(match owner {
            OwnerId::Node(key) => self
                .nodes
                .lock()
                .get_mut(key)
                .ok_or(Error::StaleNode(key))?
                .owner_mut()
                .remove_uniform_mapping(uniform_name),
            OwnerId::Renderer(key) => self
                .renderers
                .lock()
                .get_mut(key)
                .ok_or(Error::StaleRenderer(key))?
                .owner_mut()
                .remove_uniform_mapping(uniform_name),
        })
    }

    // -- Constraints --

    /// Attaches a constraint to its target node.
    ///
    /// While the constraint is active its target property gets a held
    /// resetter, so the constrained value is recomputed from the base value
    /// every frame.
    pub fn add_constraint(&mut self, constraint: NodeConstraint) -> Result<ConstraintId, Error> {
        let node = constraint.target();
        let property = constraint.property();
        let tag = Constraint::tag(&constraint);
        let nodes_arc = Arc::clone(&self.nodes);
        let mut nodes = nodes_arc.lock();
        if !nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let entry = self.constraints.entry(node).or_default();
        let id = entry.container.push_back(Box::new(constraint));
        let holds_resetter = entry.container.is_active(id);
        entry.entries.push(ConstraintEntry {
            id,
            tag,
            property,
            holds_resetter,
        });
        if holds_resetter {
            self.hold_property_resetter(&mut nodes, node, property);
        }
        log::debug!("constraint {id:?} added to {node:?}.{property:?}");
        Ok(id)
    }

    /// Removes every constraint on `node` carrying `tag`, returning how many
    /// were removed.
    pub fn remove_constraints(&mut self, node: NodeKey, tag: ConstraintTag) -> usize {
        let Some(attached) = self.constraints.get_mut(&node) else {
            return 0;
        };
        let removed = attached.container.remove_by_tag(tag);
        let mut released: SmallVec<[NodeProperty; 4]> = SmallVec::new();
        let before = attached.entries.len();
        attached.entries.retain(|e| {
            if e.tag != tag {
                return true;
            }
            if e.holds_resetter {
                released.push(e.property);
            }
            false
        });
        debug_assert_eq!(
            removed,
            before - attached.entries.len(),
            "constraint side table out of sync"
        );
        if attached.container.is_empty() {
            self.constraints.remove(&node);
        }
        for property in released {
            self.release_property_resetter(node, property);
        }
        removed
    }

    /// Removes one constraint by id.
    pub fn remove_constraint(&mut self, node: NodeKey, id: ConstraintId) -> bool {
        let Some(attached) = self.constraints.get_mut(&node) else {
            return false;
        };
        let Some(position) = attached.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let entry = attached.entries.remove(position);
        attached.container.erase_object(id);
        if attached.container.is_empty() {
            self.constraints.remove(&node);
        }
        if entry.holds_resetter {
            self.release_property_resetter(node, entry.property);
        }
        true
    }

    /// Changes how often a constraint runs, moving it between the active and
    /// deactivated lists. Returns `false` if `node` has no such constraint.
    pub fn set_constraint_apply_rate(
        &mut self,
        node: NodeKey,
        id: ConstraintId,
        rate: ApplyRate,
    ) -> bool {
        let Some(attached) = self.constraints.get_mut(&node) else {
            return false;
        };
        let Some(constraint) = attached.container.get_mut(id) else {
            return false;
        };
        constraint.set_apply_rate(rate);
        attached.container.apply_rate_changed(id);
        let active = attached.container.is_active(id);
        let Some(entry) = attached.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if entry.holds_resetter == active {
            return true;
        }
        entry.holds_resetter = active;
        let property = entry.property;
        if active {
            let nodes_arc = Arc::clone(&self.nodes);
            let mut nodes = nodes_arc.lock();
            self.hold_property_resetter(&mut nodes, node, property);
            log::trace!("constraint {id:?} on {node:?} reactivated");
        } else {
            self.release_property_resetter(node, property);
        }
        true
    }

    /// Changes the rate of every constraint on `node` carrying `tag`,
    /// returning how many were changed.
    pub fn set_tagged_apply_rate(
        &mut self,
        node: NodeKey,
        tag: ConstraintTag,
        rate: ApplyRate,
    ) -> usize {
        let ids: SmallVec<[ConstraintId; 4]> = match self.constraints.get(&node) {
            Some(attached) => attached
                .entries
                .iter()
                .filter(|e| e.tag == tag)
                .map(|e| e.id)
                .collect(),
            None => return 0,
        };
        ids.into_iter()
            .filter(|&id| self.set_constraint_apply_rate(node, id, rate))
            .count()
    }

    fn hold_property_resetter(
        &mut self,
        nodes: &mut MemoryPool<Node>,
        node: NodeKey,
        property: NodeProperty,
    ) {
        match self.property_resetters.get_mut(&(node, property)) {
            Some(held) => held.users += 1,
            None => {
                let key = self
                    .node_resetters
                    .add(Resetter::for_property(node, property.index()), nodes);
                self.property_resetters
                    .insert((node, property), PropertyResetterRef { key, users: 1 });
            }
        }
    }

    fn release_property_resetter(&mut self, node: NodeKey, property: NodeProperty) {
        let Some(held) = self.property_resetters.get_mut(&(node, property)) else {
            return;
        };
        held.users -= 1;
        if held.users == 0 {
            self.node_resetters.release(held.key);
            self.property_resetters.remove(&(node, property));
        }
    }

    // -- Frame callbacks --

    /// Registers a frame callback under `id`.
    pub fn add_frame_callback(&mut self, id: FrameCallbackId, callback: BoxedFrameCallback) {
        debug_assert!(
            self.frame_callbacks.iter().all(|(existing, _)| *existing != id),
            "frame callback id reused"
        );
        self.frame_callbacks.push((id, callback));
    }

    /// Unregisters a frame callback, returning whether it was registered.
    pub fn remove_frame_callback(&mut self, id: FrameCallbackId) -> bool {
        let before = self.frame_callbacks.len();
        self.frame_callbacks.retain(|(existing, _)| *existing != id);
        self.frame_callbacks.len() != before
    }

    // -- Frame phases --

    /// Runs every resetter, then applies queued one-frame writes.
    pub(crate) fn reset_properties(&mut self, buffer_index: BufferIndex) -> ResetStats {
        let mut nodes = self.nodes.lock();
        let mut pruned = self.node_resetters.reset_to_base_values(buffer_index, &mut nodes);
        {
            let mut renderers = self.renderers.lock();
            pruned += self
                .renderer_resetters
                .reset_to_base_values(buffer_index, &mut renderers);
        }
        for (node, property, value) in self.pending_sets.drain(..) {
            let Some(target) = nodes.get_mut(node) else {
                log::warn!("one-frame write to {node:?} dropped: node is gone");
                continue;
            };
            if let Err(err) = target.set_property(property, value, buffer_index) {
                log::warn!("one-frame write to {node:?}: {err}");
                continue;
            }
            ensure_object_resetter(
                &mut self.node_resetters,
                &mut self.node_object_resetters,
                &mut nodes,
                node,
            );
        }
        ResetStats {
            alive: self.node_resetters.len() + self.renderer_resetters.len(),
            pruned,
        }
    }

    /// Rebuilds the depth-first traversal if the hierarchy changed.
    pub(crate) fn refresh_traversal(&mut self) {
        if !self.traversal_dirty {
            return;
        }
        self.traversal.clear();
        let nodes = self.nodes.lock();
        collect_subtree(&nodes, self.root, &mut self.traversal);
        drop(nodes);
        self.traversal_dirty = false;
        log::trace!("traversal rebuilt: {} nodes", self.traversal.len());
    }

    /// Applies constraints in traversal order. Returns whether any constraint
    /// is still active.
    pub(crate) fn apply_constraints(&mut self, buffer_index: BufferIndex) -> bool {
        let mut nodes = self.nodes.lock();
        let mut active = false;
        let mut spent: SmallVec<[(NodeKey, NodeProperty); 4]> = SmallVec::new();
        for &key in &self.traversal {
            let Some(attached) = self.constraints.get_mut(&key) else {
                continue;
            };
            for id in attached.container.apply(buffer_index, &mut nodes) {
                if let Some(entry) = attached.entries.iter_mut().find(|e| e.id == id)
                    && entry.holds_resetter
                {
                    entry.holds_resetter = false;
                    spent.push((key, entry.property));
                }
            }
            active |= attached.container.active().next().is_some();
        }
        drop(nodes);
        // Spent constraints baked their result; their resetters can age out.
        for (node, property) in spent {
            self.release_property_resetter(node, property);
        }
        active
    }

    /// Runs frame callbacks. Returns whether any asked for another update.
    pub(crate) fn run_frame_callbacks(
        &mut self,
        buffer_index: BufferIndex,
        elapsed_seconds: f32,
    ) -> bool {
        if self.frame_callbacks.is_empty() {
            return false;
        }
        let mut nodes = self.nodes.lock();
        let mut proxy = UpdateProxy::new(&mut nodes, buffer_index);
        let mut keep_updating = false;
        for (_, callback) in &mut self.frame_callbacks {
            keep_updating |= callback.update(&mut proxy, elapsed_seconds);
        }
        let touched = proxy.into_touched();
        for node in touched {
            ensure_object_resetter(
                &mut self.node_resetters,
                &mut self.node_object_resetters,
                &mut nodes,
                node,
            );
        }
        keep_updating
    }

    /// Computes world matrices and colors, parents first. Returns the number
    /// of nodes visited.
    pub(crate) fn update_transforms(&mut self, buffer_index: BufferIndex) -> usize {
        let mut nodes = self.nodes.lock();
        for &key in &self.traversal {
            let parent = nodes
                .get(key)
                .and_then(Node::parent)
                .and_then(|p| nodes.get(p))
                .map(|p| (p.world_matrix(buffer_index), p.world_color(buffer_index)));
            if let Some(node) = nodes.get_mut(key) {
                node.update_world(buffer_index, parent);
            }
        }
        self.traversal.len()
    }

    /// Builds the render list and runs the partial-rendering comparison.
    pub(crate) fn prepare_render(&mut self, list: &mut RenderList) {
        let buffer_index = list.buffer_index;
        let mut nodes = self.nodes.lock();
        let renderers = self.renderers.lock();
        let mut visible: HashMap<NodeKey, bool> = HashMap::with_capacity(self.traversal.len());
        let mut pending: SmallVec<[(usize, PartialRenderingCacheInfo, RenderItem); 2]> =
            SmallVec::new();

        for &key in &self.traversal {
            pending.clear();
            let Some(node) = nodes.get(key) else {
                continue;
            };
            let parent_visible = node
                .parent()
                .is_none_or(|p| visible.get(&p).copied().unwrap_or(false));
            let is_visible = parent_visible && node.is_visible(buffer_index);
            visible.insert(key, is_visible);
            if !is_visible || node.renderers().is_empty() {
                continue;
            }

            let world_matrix = node.world_matrix(buffer_index);
            let world_color = node.world_color(buffer_index);
            let size = node.size(buffer_index);
            let area = item_bounds(&world_matrix, size);
            let mut node_uniforms: SmallVec<[UniformValue; 4]> = SmallVec::new();
            resolve_uniforms(
                node.owner().uniform_map(),
                &nodes,
                &renderers,
                buffer_index,
                &mut node_uniforms,
            );

            for (slot, attachment) in node.renderers().iter().enumerate() {
                let Some(renderer) = renderers.get(attachment.renderer) else {
                    log::warn!("node {key:?} draws with freed renderer {:?}", attachment.renderer);
                    continue;
                };
                let color = renderer.final_color(world_color, buffer_index);
                let is_opaque = color.w >= 1.0;
                let mut info = PartialRenderingCacheInfo {
                    node_index: key.index(),
                    node_generation: key.generation(),
                    renderer_index: attachment.renderer.index(),
                    renderer_generation: attachment.renderer.generation(),
                    texture_set: renderer.texture_set(),
                    depth_index: renderer.depth_index(),
                    is_opaque: u32::from(is_opaque),
                    matrix: world_matrix,
                    color,
                    size,
                    ..PartialRenderingCacheInfo::default()
                };
                info.set_updated_area(area);

                let mut uniforms = node_uniforms.clone();
                resolve_uniforms(
                    renderer.owner().uniform_map(),
                    &nodes,
                    &renderers,
                    buffer_index,
                    &mut uniforms,
                );
                let item = RenderItem {
                    node: key,
                    renderer: attachment.renderer,
                    world_matrix,
                    color,
                    size,
                    depth_index: renderer.depth_index(),
                    texture_set: renderer.texture_set(),
                    is_opaque,
                    updated: true,
                    updated_area: area,
                    uniform_counters: (
                        node.owner().uniform_map().change_counter(),
                        renderer.owner().uniform_map().change_counter(),
                    ),
                    uniforms,
                };
                pending.push((slot, info, item));
            }

            let Some(node) = nodes.get_mut(key) else {
                continue;
            };
            for (slot, info, mut item) in pending.drain(..) {
                let data = &mut node.renderers_mut()[slot].partial_rendering;
                *data.current_cache_info_mut() = info;
                item.updated = data.is_updated();
                if item.updated && data.is_rendered() {
                    item.updated_area = item
                        .updated_area
                        .union(data.previous_cache_info().updated_area());
                }
                data.set_rendered();
                data.swap_buffers();
                list.items.push(item);
            }
        }
    }
}

/// Reuses a live whole-object resetter for `key`, or adds a fresh one.
fn ensure_object_resetter<T: ResetTarget>(
    resetters: &mut ResetterContainer<T>,
    index: &mut HashMap<MemoryPoolKey<T>, ResetterKey<T>>,
    targets: &mut MemoryPool<T>,
    key: MemoryPoolKey<T>,
) {
    if let Some(&existing) = index.get(&key)
        && resetters.rearm(existing)
    {
        return;
    }
    let resetter = resetters.add(Resetter::for_object(key), targets);
    index.insert(key, resetter);
}

/// Appends `top` and its descendants in depth-first pre-order.
fn collect_subtree(nodes: &MemoryPool<Node>, top: NodeKey, out: &mut Vec<NodeKey>) {
    let mut stack: SmallVec<[NodeKey; 16]> = SmallVec::new();
    stack.push(top);
    while let Some(key) = stack.pop() {
        let Some(node) = nodes.get(key) else {
            continue;
        };
        out.push(key);
        stack.extend(node.children().iter().rev().copied());
    }
}

fn resolve_uniforms(
    map: &UniformMap,
    nodes: &MemoryPool<Node>,
    renderers: &MemoryPool<Renderer>,
    buffer_index: BufferIndex,
    out: &mut SmallVec<[UniformValue; 4]>,
) {
    for mapping in map {
        let source = mapping.source();
        let value = match source.owner {
            OwnerId::Node(key) => NodeProperty::from_index(source.property)
                .and_then(|p| Some(nodes.get(key)?.property(p, buffer_index))),
            OwnerId::Renderer(key) => RendererProperty::from_index(source.property)
                .and_then(|p| Some(renderers.get(key)?.property(p, buffer_index))),
        };
        match value {
            Some(value) => out.push(UniformValue {
                name_hash: mapping.name_hash(),
                name_hash_without_array: mapping.name_hash_without_array(),
                array_index: mapping.array_index(),
                value,
            }),
            None => log::trace!("uniform {} has no live source", mapping.uniform_name()),
        }
    }
}
