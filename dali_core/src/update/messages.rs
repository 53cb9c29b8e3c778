// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-graph mutations as message-buffer words.
//!
//! Every message flattens into one of three [`Pod`] records, distinguished by
//! the leading kind word:
//!
//! | record           | size | messages                                          |
//! |------------------|------|---------------------------------------------------|
//! | `KeyRecord`      | 16 B | add/destroy/disconnect node, add/destroy renderer, depth index |
//! | `PairRecord`     | 24 B | connect node, attach/detach renderer              |
//! | `PropertyRecord` | 40 B | bake, bake relative and set of a property          |

use bytemuck::{Pod, Zeroable};

use crate::buffer::BufferIndex;
use crate::memory_pool::MemoryPoolKey;
use crate::message::{Message, MessageHandler, read_pod, write_pod};
use crate::property::{PropertyIndex, PropertyType, PropertyValue};
use crate::scene::{NodeKey, NodeProperty, RendererKey, RendererProperty};

use super::scene_graph::SceneGraph;

/// A scene-graph mutation sent from the Event thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpdateMessage {
    /// Takes ownership of a node allocated by the Event thread.
    AddNode(NodeKey),
    /// Disconnects and frees a node.
    DestroyNode(NodeKey),
    /// Makes `child` a child of `parent`.
    ConnectNode {
        /// New parent.
        parent: NodeKey,
        /// Node being moved.
        child: NodeKey,
    },
    /// Removes a node, and its subtree, from its parent.
    DisconnectNode(NodeKey),
    /// Writes a property's base value.
    BakeNodeProperty {
        /// Target node.
        node: NodeKey,
        /// Target property.
        property: NodeProperty,
        /// New base value.
        value: PropertyValue,
    },
    /// Adds to a property's base value.
    BakeRelativeNodeProperty {
        /// Target node.
        node: NodeKey,
        /// Target property.
        property: NodeProperty,
        /// Amount added.
        delta: PropertyValue,
    },
    /// Writes a property for the current frame only.
    SetNodeProperty {
        /// Target node.
        node: NodeKey,
        /// Target property.
        property: NodeProperty,
        /// Value for this frame.
        value: PropertyValue,
    },
    /// Takes ownership of a renderer allocated by the Event thread.
    AddRenderer(RendererKey),
    /// Draws `node` with `renderer`.
    AttachRenderer {
        /// Node to draw.
        node: NodeKey,
        /// Renderer to use.
        renderer: RendererKey,
    },
    /// Stops drawing `node` with `renderer`.
    DetachRenderer {
        /// Node drawn.
        node: NodeKey,
        /// Renderer to remove.
        renderer: RendererKey,
    },
    /// Detaches and frees a renderer.
    DestroyRenderer(RendererKey),
    /// Writes a renderer property's base value.
    BakeRendererProperty {
        /// Target renderer.
        renderer: RendererKey,
        /// Target property.
        property: RendererProperty,
        /// New base value.
        value: PropertyValue,
    },
    /// Changes a renderer's sort key.
    SetDepthIndex {
        /// Target renderer.
        renderer: RendererKey,
        /// New depth index.
        depth_index: i32,
    },
}

mod kind {
    pub(super) const ADD_NODE: u32 = 1;
    pub(super) const DESTROY_NODE: u32 = 2;
    pub(super) const CONNECT_NODE: u32 = 3;
    pub(super) const DISCONNECT_NODE: u32 = 4;
    pub(super) const BAKE_NODE_PROPERTY: u32 = 5;
    pub(super) const BAKE_RELATIVE_NODE_PROPERTY: u32 = 6;
    pub(super) const SET_NODE_PROPERTY: u32 = 7;
    pub(super) const ADD_RENDERER: u32 = 8;
    pub(super) const ATTACH_RENDERER: u32 = 9;
    pub(super) const DETACH_RENDERER: u32 = 10;
    pub(super) const DESTROY_RENDERER: u32 = 11;
    pub(super) const BAKE_RENDERER_PROPERTY: u32 = 12;
    pub(super) const SET_DEPTH_INDEX: u32 = 13;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct KeyRecord {
    kind: u32,
    index: u32,
    generation: u32,
    value: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PairRecord {
    kind: u32,
    a_index: u32,
    a_generation: u32,
    b_index: u32,
    b_generation: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PropertyRecord {
    kind: u32,
    index: u32,
    generation: u32,
    property: u32,
    value_type: u32,
    _pad: u32,
    lanes: [f32; 4],
}

enum Record {
    Key(KeyRecord),
    Pair(PairRecord),
    Property(PropertyRecord),
}

fn key_record<T>(kind: u32, key: MemoryPoolKey<T>, value: i32) -> Record {
    Record::Key(KeyRecord {
        kind,
        index: key.index(),
        generation: key.generation(),
        value,
    })
}

fn pair_record<A, B>(kind: u32, a: MemoryPoolKey<A>, b: MemoryPoolKey<B>) -> Record {
    Record::Pair(PairRecord {
        kind,
        a_index: a.index(),
        a_generation: a.generation(),
        b_index: b.index(),
        b_generation: b.generation(),
        _pad: 0,
    })
}

fn property_record<T>(
    kind: u32,
    key: MemoryPoolKey<T>,
    property: PropertyIndex,
    value: PropertyValue,
) -> Record {
    Record::Property(PropertyRecord {
        kind,
        index: key.index(),
        generation: key.generation(),
        property: property.0,
        value_type: value.property_type() as u32,
        _pad: 0,
        lanes: value.to_lanes(),
    })
}

impl UpdateMessage {
    fn record(&self) -> Record {
        match *self {
            Self::AddNode(node) => key_record(kind::ADD_NODE, node, 0),
            Self::DestroyNode(node) => key_record(kind::DESTROY_NODE, node, 0),
            Self::ConnectNode { parent, child } => pair_record(kind::CONNECT_NODE, parent, child),
            Self::DisconnectNode(node) => key_record(kind::DISCONNECT_NODE, node, 0),
            Self::BakeNodeProperty {
                node,
                property,
                value,
            } => property_record(kind::BAKE_NODE_PROPERTY, node, property.index(), value),
            Self::BakeRelativeNodeProperty {
                node,
                property,
                delta,
            } => property_record(
                kind::BAKE_RELATIVE_NODE_PROPERTY,
                node,
                property.index(),
                delta,
            ),
            Self::SetNodeProperty {
                node,
                property,
                value,
            } => property_record(kind::SET_NODE_PROPERTY, node, property.index(), value),
            Self::AddRenderer(renderer) => key_record(kind::ADD_RENDERER, renderer, 0),
            Self::AttachRenderer { node, renderer } => {
                pair_record(kind::ATTACH_RENDERER, node, renderer)
            }
            Self::DetachRenderer { node, renderer } => {
                pair_record(kind::DETACH_RENDERER, node, renderer)
            }
            Self::DestroyRenderer(renderer) => key_record(kind::DESTROY_RENDERER, renderer, 0),
            Self::BakeRendererProperty {
                renderer,
                property,
                value,
            } => property_record(
                kind::BAKE_RENDERER_PROPERTY,
                renderer,
                property.index(),
                value,
            ),
            Self::SetDepthIndex {
                renderer,
                depth_index,
            } => key_record(kind::SET_DEPTH_INDEX, renderer, depth_index),
        }
    }
}

fn decode_key(payload: &[usize], tag: u32) -> Option<(KeyRecord, MemoryPoolKey<()>)> {
    let r: KeyRecord = read_pod(payload, 0)?;
    debug_assert_eq!(r.kind, tag, "record kind changed while decoding");
    Some((r, MemoryPoolKey::from_raw(r.index, r.generation)))
}

fn decode_pair(payload: &[usize], tag: u32) -> Option<(MemoryPoolKey<()>, MemoryPoolKey<()>)> {
    let r: PairRecord = read_pod(payload, 0)?;
    debug_assert_eq!(r.kind, tag, "record kind changed while decoding");
    Some((
        MemoryPoolKey::from_raw(r.a_index, r.a_generation),
        MemoryPoolKey::from_raw(r.b_index, r.b_generation),
    ))
}

fn decode_property(
    payload: &[usize],
    tag: u32,
) -> Option<(MemoryPoolKey<()>, PropertyIndex, PropertyValue)> {
    let r: PropertyRecord = read_pod(payload, 0)?;
    debug_assert_eq!(r.kind, tag, "record kind changed while decoding");
    let ty = PropertyType::from_u32(r.value_type)?;
    Some((
        MemoryPoolKey::from_raw(r.index, r.generation),
        PropertyIndex(r.property),
        PropertyValue::from_lanes(ty, r.lanes),
    ))
}

impl Message for UpdateMessage {
    fn encoded_size(&self) -> usize {
        match self.record() {
            Record::Key(_) => size_of::<KeyRecord>(),
            Record::Pair(_) => size_of::<PairRecord>(),
            Record::Property(_) => size_of::<PropertyRecord>(),
        }
    }

    fn encode(&self, payload: &mut [usize]) {
        match self.record() {
            Record::Key(r) => write_pod(payload, 0, &r),
            Record::Pair(r) => write_pod(payload, 0, &r),
            Record::Property(r) => write_pod(payload, 0, &r),
        }
    }

    fn decode(payload: &[usize]) -> Option<Self> {
        let tag: u32 = read_pod(payload, 0)?;
        Some(match tag {
            kind::ADD_NODE => Self::AddNode(decode_key(payload, tag)?.1.cast()),
            kind::DESTROY_NODE => Self::DestroyNode(decode_key(payload, tag)?.1.cast()),
            kind::DISCONNECT_NODE => Self::DisconnectNode(decode_key(payload, tag)?.1.cast()),
            kind::ADD_RENDERER => Self::AddRenderer(decode_key(payload, tag)?.1.cast()),
            kind::DESTROY_RENDERER => Self::DestroyRenderer(decode_key(payload, tag)?.1.cast()),
            kind::SET_DEPTH_INDEX => {
                let (r, key) = decode_key(payload, tag)?;
                Self::SetDepthIndex {
                    renderer: key.cast(),
                    depth_index: r.value,
                }
            }
            kind::CONNECT_NODE => {
                let (a, b) = decode_pair(payload, tag)?;
                Self::ConnectNode {
                    parent: a.cast(),
                    child: b.cast(),
                }
            }
            kind::ATTACH_RENDERER | kind::DETACH_RENDERER => {
                let (a, b) = decode_pair(payload, tag)?;
                let (node, renderer) = (a.cast(), b.cast());
                if tag == kind::ATTACH_RENDERER {
                    Self::AttachRenderer { node, renderer }
                } else {
                    Self::DetachRenderer { node, renderer }
                }
            }
            kind::BAKE_NODE_PROPERTY | kind::BAKE_RELATIVE_NODE_PROPERTY | kind::SET_NODE_PROPERTY => {
                let (key, index, value) = decode_property(payload, tag)?;
                let node = key.cast();
                let property = NodeProperty::from_index(index)?;
                match tag {
                    kind::BAKE_NODE_PROPERTY => Self::BakeNodeProperty {
                        node,
                        property,
                        value,
                    },
                    kind::BAKE_RELATIVE_NODE_PROPERTY => Self::BakeRelativeNodeProperty {
                        node,
                        property,
                        delta: value,
                    },
                    _ => Self::SetNodeProperty {
                        node,
                        property,
                        value,
                    },
                }
            }
            kind::BAKE_RENDERER_PROPERTY => {
                let (key, index, value) = decode_property(payload, tag)?;
                Self::BakeRendererProperty {
                    renderer: key.cast(),
                    property: RendererProperty::from_index(index)?,
                    value,
                }
            }
            _ => return None,
        })
    }
}

impl MessageHandler for SceneGraph {
    type Message = UpdateMessage;

    fn handle_message(&mut self, message: UpdateMessage, buffer_index: BufferIndex) {
        log::trace!("applying {message:?}");
        let result = match message {
            UpdateMessage::AddNode(node) => self.add_node(node),
            UpdateMessage::DestroyNode(node) => self.destroy_node(node, buffer_index),
            UpdateMessage::ConnectNode { parent, child } => {
                self.connect_node(parent, child, buffer_index)
            }
            UpdateMessage::DisconnectNode(node) => self.disconnect_node(node, buffer_index),
            UpdateMessage::BakeNodeProperty {
                node,
                property,
                value,
            } => self.bake_node_property(node, property, value, buffer_index),
            UpdateMessage::BakeRelativeNodeProperty {
                node,
                property,
                delta,
            } => self.bake_relative_node_property(node, property, delta, buffer_index),
            UpdateMessage::SetNodeProperty {
                node,
                property,
                value,
            } => self.set_node_property(node, property, value),
            UpdateMessage::AddRenderer(renderer) => self.add_renderer(renderer),
            UpdateMessage::AttachRenderer { node, renderer } => {
                self.attach_renderer(node, renderer)
            }
            UpdateMessage::DetachRenderer { node, renderer } => {
                self.detach_renderer(node, renderer, buffer_index)
            }
            UpdateMessage::DestroyRenderer(renderer) => self.destroy_renderer(renderer),
            UpdateMessage::BakeRendererProperty {
                renderer,
                property,
                value,
            } => self.bake_renderer_property(renderer, property, value, buffer_index),
            UpdateMessage::SetDepthIndex {
                renderer,
                depth_index,
            } => self.set_depth_index(renderer, depth_index),
        };
        if let Err(err) = result {
            log::warn!("skipping {message:?}: {err}");
        }
    }
}
