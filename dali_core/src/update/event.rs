// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Event thread's handle on the update core.
//!
//! [`EventThreadServices`] allocates scene objects directly in the shared
//! pools, so keys are usable immediately, and turns every other mutation
//! into a queued message. Nothing reaches the Update thread until
//! [`flush`](EventThreadServices::flush).

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::constraint::{ApplyRate, ConstraintTag, TagAllocator};
use crate::error::Error;
use crate::memory_pool::SyncMemoryPool;
use crate::message::MessageQueue;
use crate::property::{PropertyType, PropertyValue};
use crate::property_owner::OwnerId;
use crate::scene::{
    Node, NodeConstraint, NodeKey, NodeProperty, Renderer, RendererKey, RendererProperty,
};
use crate::uniform_map::UniformPropertyMapping;

use super::frame_callback::{FrameCallback, FrameCallbackId};
use super::messages::UpdateMessage;
use super::scene_graph::SceneGraph;

/// Event-thread API of an [`UpdateManager`](super::UpdateManager).
///
/// Cheap to clone; clones share the queue and pools.
#[derive(Clone, Debug)]
pub struct EventThreadServices {
    nodes: Arc<SyncMemoryPool<Node>>,
    renderers: Arc<SyncMemoryPool<Renderer>>,
    queue: MessageQueue<SceneGraph>,
    tags: Arc<Mutex<TagAllocator>>,
    next_callback: Arc<AtomicU32>,
    root: NodeKey,
}

fn check_type(expected: PropertyType, value: &PropertyValue) -> Result<(), Error> {
    let actual = value.property_type();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch { expected, actual })
    }
}

impl EventThreadServices {
    pub(crate) fn new(
        nodes: Arc<SyncMemoryPool<Node>>,
        renderers: Arc<SyncMemoryPool<Renderer>>,
        queue: MessageQueue<SceneGraph>,
        root: NodeKey,
    ) -> Self {
        Self {
            nodes,
            renderers,
            queue,
            tags: Arc::new(Mutex::new(TagAllocator::new())),
            next_callback: Arc::new(AtomicU32::new(1)),
            root,
        }
    }

    /// The scene root.
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    fn live_node(&self, node: NodeKey) -> Result<(), Error> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(Error::StaleNode(node))
        }
    }

    fn live_renderer(&self, renderer: RendererKey) -> Result<(), Error> {
        if self.renderers.contains(renderer) {
            Ok(())
        } else {
            Err(Error::StaleRenderer(renderer))
        }
    }

    // -- Nodes --

    /// Creates a disconnected node.
    pub fn create_node(&self) -> NodeKey {
        let node = self.nodes.allocate_thread_safe(Node::new());
        self.queue.push(&UpdateMessage::AddNode(node));
        node
    }

    /// Queues destruction of a node.
    pub fn destroy_node(&self, node: NodeKey) -> Result<(), Error> {
        self.live_node(node)?;
        self.queue.push(&UpdateMessage::DestroyNode(node));
        Ok(())
    }

    /// Queues `child` being parented under `parent`.
    ///
    /// Cycles are detected on the Update thread, which logs and drops the
    /// message.
    pub fn connect(&self, parent: NodeKey, child: NodeKey) -> Result<(), Error> {
        self.live_node(parent)?;
        self.live_node(child)?;
        if parent == child || child == self.root {
            return Err(Error::Cycle { parent, child });
        }
        self.queue
            .push(&UpdateMessage::ConnectNode { parent, child });
        Ok(())
    }

    /// Queues removal of `node` from its parent.
    pub fn disconnect(&self, node: NodeKey) -> Result<(), Error> {
        self.live_node(node)?;
        self.queue.push(&UpdateMessage::DisconnectNode(node));
        Ok(())
    }

    /// Queues a write of a property's base value.
    pub fn bake_node_property(
        &self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        self.live_node(node)?;
        check_type(property.property_type(), &value)?;
        self.queue.push(&UpdateMessage::BakeNodeProperty {
            node,
            property,
            value,
        });
        Ok(())
    }

    /// Queues an increment of a property's base value.
    pub fn bake_relative_node_property(
        &self,
        node: NodeKey,
        property: NodeProperty,
        delta: PropertyValue,
    ) -> Result<(), Error> {
        self.live_node(node)?;
        check_type(property.property_type(), &delta)?;
        if property.property_type() == PropertyType::Boolean {
            log::debug!("relative bake of boolean {property:?} ors with the current value");
        }
        self.queue.push(&UpdateMessage::BakeRelativeNodeProperty {
            node,
            property,
            delta,
        });
        Ok(())
    }

    /// Queues a write that lasts for the next frame only.
    pub fn set_node_property(
        &self,
        node: NodeKey,
        property: NodeProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        self.live_node(node)?;
        check_type(property.property_type(), &value)?;
        self.queue.push(&UpdateMessage::SetNodeProperty {
            node,
            property,
            value,
        });
        Ok(())
    }

    // -- Renderers --

    /// Creates a renderer drawing `texture_set`.
    pub fn create_renderer(&self, texture_set: u32) -> RendererKey {
        let renderer = self.renderers.allocate_thread_safe(Renderer::new(texture_set));
        self.queue.push(&UpdateMessage::AddRenderer(renderer));
        renderer
    }

    /// Queues drawing `node` with `renderer`.
    pub fn attach_renderer(&self, node: NodeKey, renderer: RendererKey) -> Result<(), Error> {
        self.live_node(node)?;
        self.live_renderer(renderer)?;
        self.queue
            .push(&UpdateMessage::AttachRenderer { node, renderer });
        Ok(())
    }

    /// Queues detaching `renderer` from `node`.
    pub fn detach_renderer(&self, node: NodeKey, renderer: RendererKey) -> Result<(), Error> {
        self.live_node(node)?;
        self.queue
            .push(&UpdateMessage::DetachRenderer { node, renderer });
        Ok(())
    }

    /// Queues destruction of a renderer.
    pub fn destroy_renderer(&self, renderer: RendererKey) -> Result<(), Error> {
        self.live_renderer(renderer)?;
        self.queue.push(&UpdateMessage::DestroyRenderer(renderer));
        Ok(())
    }

    /// Queues a write of a renderer property's base value.
    pub fn bake_renderer_property(
        &self,
        renderer: RendererKey,
        property: RendererProperty,
        value: PropertyValue,
    ) -> Result<(), Error> {
        self.live_renderer(renderer)?;
        check_type(property.property_type(), &value)?;
        self.queue.push(&UpdateMessage::BakeRendererProperty {
            renderer,
            property,
            value,
        });
        Ok(())
    }

    /// Queues a new sort key for `renderer`.
    pub fn set_depth_index(&self, renderer: RendererKey, depth_index: i32) -> Result<(), Error> {
        self.live_renderer(renderer)?;
        self.queue.push(&UpdateMessage::SetDepthIndex {
            renderer,
            depth_index,
        });
        Ok(())
    }

    // -- Uniforms --

    /// Queues binding a uniform on `owner`.
    pub fn add_uniform_mapping(
        &self,
        owner: OwnerId,
        mapping: UniformPropertyMapping,
    ) -> Result<(), Error> {
        self.live_owner(owner)?;
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            if let Err(err) = scene.add_uniform_mapping(owner, mapping) {
                log::warn!("uniform mapping dropped: {err}");
            }
        });
        Ok(())
    }

    /// Queues unbinding a uniform from `owner`.
    pub fn remove_uniform_mapping(
        &self,
        owner: OwnerId,
        uniform_name: impl Into<alloc::string::String>,
    ) -> Result<(), Error> {
        self.live_owner(owner)?;
        let uniform_name = uniform_name.into();
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            match scene.remove_uniform_mapping(owner, &uniform_name) {
                Ok(true) => {}
                Ok(false) => log::debug!("uniform {uniform_name} was not mapped"),
                Err(err) => log::warn!("uniform unmapping dropped: {err}"),
            }
        });
        Ok(())
    }

    fn live_owner(&self, owner: OwnerId) -> Result<(), Error> {
        match owner {
            OwnerId::Node(key) => self.live_node(key),
            OwnerId::Renderer(key) => self.live_renderer(key),
        }
    }

    // -- Constraints --

    /// Reserves a tag for grouping constraints.
    pub fn allocate_tag(&self) -> ConstraintTag {
        self.tags.lock().allocate()
    }

    /// Queues a constraint on its target node.
    pub fn add_constraint(&self, constraint: NodeConstraint) -> Result<(), Error> {
        self.live_node(constraint.target())?;
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            if let Err(err) = scene.add_constraint(constraint) {
                log::warn!("constraint dropped: {err}");
            }
        });
        Ok(())
    }

    /// Queues removal of every constraint on `node` tagged `tag`, and frees
    /// the tag.
    pub fn remove_constraints(&self, node: NodeKey, tag: ConstraintTag) {
        self.tags.lock().release(tag);
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            let removed = scene.remove_constraints(node, tag);
            log::trace!("removed {removed} constraints tagged {tag:?} from {node:?}");
        });
    }

    /// Queues a rate change for every constraint on `node` tagged `tag`.
    ///
    /// A spent apply-once constraint switched to
    /// [`ApplyRate::Continuous`] starts running again.
    pub fn set_constraint_apply_rate(
        &self,
        node: NodeKey,
        tag: ConstraintTag,
        rate: ApplyRate,
    ) -> Result<(), Error> {
        self.live_node(node)?;
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            let changed = scene.set_tagged_apply_rate(node, tag, rate);
            log::trace!("{changed} constraints on {node:?} now {rate:?}");
        });
        Ok(())
    }

    // -- Frame callbacks --

    /// Queues registration of a frame callback.
    pub fn add_frame_callback(
        &self,
        callback: impl FrameCallback + Send + 'static,
    ) -> FrameCallbackId {
        let id = FrameCallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
        let callback = Box::new(callback);
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            scene.add_frame_callback(id, callback);
        });
        id
    }

    /// Queues removal of a frame callback.
    pub fn remove_frame_callback(&self, id: FrameCallbackId) {
        self.queue.push_deferred(move |scene: &mut SceneGraph, _| {
            if !scene.remove_frame_callback(id) {
                log::debug!("frame callback {id:?} was not registered");
            }
        });
    }

    // -- Queue --

    /// Publishes queued messages to the Update thread. Returns `false` if
    /// nothing was queued.
    pub fn flush(&self) -> bool {
        self.queue.flush()
    }

    /// Records queued since the last flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_pool::MemoryPoolConfig;
    use crate::update::UpdateProxy;
    use crate::message::MessageBufferConfig;

    fn services() -> EventThreadServices {
        let nodes = Arc::new(SyncMemoryPool::new(MemoryPoolConfig::default()));
        let root = nodes.allocate_thread_safe(Node::new_root());
        EventThreadServices::new(
            nodes,
            Arc::new(SyncMemoryPool::new(MemoryPoolConfig::default())),
            MessageQueue::new(MessageBufferConfig::default()),
            root,
        )
    }

    #[test]
    fn creation_queues_one_message_each() {
        let services = services();
        let node = services.create_node();
        let renderer = services.create_renderer(3);
        services.attach_renderer(node, renderer).unwrap();
        assert_eq!(services.pending(), 3);
        assert!(services.flush());
        assert_eq!(services.pending(), 0);
        assert!(!services.flush(), "nothing left to flush");
    }

    #[test]
    fn type_errors_are_reported_eagerly() {
        let services = services();
        let node = services.create_node();
        let before = services.pending();
        assert_eq!(
            services.bake_node_property(node, NodeProperty::Color, PropertyValue::Float(1.0)),
            Err(Error::TypeMismatch {
                expected: PropertyType::Vector4,
                actual: PropertyType::Float,
            })
        );
        assert_eq!(services.pending(), before);
    }

    #[test]
    fn stale_keys_are_rejected() {
        let services = services();
        let node = services.create_node();
        services.nodes.free_thread_safe(node);
        assert_eq!(services.disconnect(node), Err(Error::StaleNode(node)));
        assert_eq!(
            services.set_constraint_apply_rate(node, ConstraintTag(1), ApplyRate::Continuous),
            Err(Error::StaleNode(node))
        );
        let root = services.root();
        assert_eq!(
            services.connect(root, root),
            Err(Error::Cycle {
                parent: root,
                child: root
            })
        );
    }

    #[test]
    fn tags_and_callback_ids_are_unique() {
        let services = services();
        let a = services.allocate_tag();
        let b = services.clone().allocate_tag();
        assert_ne!(a, b);
        let idle = |_: &mut UpdateProxy<'_>, _: f32| false;
        let first = services.add_frame_callback(idle);
        let second = services.add_frame_callback(idle);
        assert_ne!(first, second);
    }
}
