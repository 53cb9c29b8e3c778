// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event thread producing, Update thread draining.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use dali_core::math::{Vector3, Vector4};
use dali_core::property::PropertyValue;
use dali_core::scene::{NodeProperty, RendererProperty};
use dali_core::trace::Tracer;
use dali_core::update::{UpdateConfig, UpdateManager};

const FRAMES: u32 = 20;

#[test]
fn event_thread_moves_node_every_frame() {
    let mut manager = UpdateManager::new(UpdateConfig::default());
    let services = manager.event_thread_services();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let (node, renderer) = {
        let node = services.create_node();
        let renderer = services.create_renderer(1);
        services.connect(services.root(), node).unwrap();
        services.attach_renderer(node, renderer).unwrap();
        services
            .bake_node_property(
                node,
                NodeProperty::Size,
                PropertyValue::Vector3(Vector3::new(4.0, 4.0, 0.0)),
            )
            .unwrap();
        services.flush();
        (node, renderer)
    };

    let producer = {
        let services = services.clone();
        thread::spawn(move || {
            for frame in 1..=FRAMES {
                services
                    .bake_node_property(
                        node,
                        NodeProperty::Position,
                        PropertyValue::Vector3(Vector3::new(frame as f32, 0.0, 0.0)),
                    )
                    .unwrap();
                services.flush();
                thread::sleep(Duration::from_millis(1));
            }
            services
                .bake_renderer_property(
                    renderer,
                    RendererProperty::MixColor,
                    PropertyValue::Vector4(Vector4::new(1.0, 0.0, 0.0, 0.5)),
                )
                .unwrap();
            services.flush();
            done_tx.send(()).unwrap();
        })
    };

    let mut last_x = 0.0;
    let mut producer_done = false;
    let mut idle_after_done = 0;
    while idle_after_done < 3 {
        manager.wait_for_messages(Duration::from_millis(20));
        let result = manager.update(0.016, &mut Tracer::none());
        if let Some(item) = result.render_list.iter().find(|item| item.node == node) {
            let x = item.world_matrix.transform_point(Vector3::ZERO).x;
            assert!(x >= last_x, "positions arrive in push order");
            last_x = x;
        }
        producer_done |= done_rx.try_recv().is_ok();
        if producer_done && result.summary.messages == 0 {
            idle_after_done += 1;
        }
    }
    producer.join().unwrap();

    assert_eq!(last_x, FRAMES as f32);
    let result = manager.update(0.016, &mut Tracer::none());
    let item = &result.render_list.items[0];
    assert_eq!(item.color, Vector4::new(1.0, 0.0, 0.0, 0.5));
    assert!(!item.is_opaque, "half transparent");
}

#[test]
fn clones_share_one_queue() {
    let mut manager = UpdateManager::new(UpdateConfig::default());
    let services = manager.event_thread_services();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let services = services.clone();
            thread::spawn(move || {
                for _ in 0..8 {
                    let node = services.create_node();
                    services.connect(services.root(), node).unwrap();
                }
                services.flush();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    services.flush();
    let result = manager.update(0.0, &mut Tracer::none());
    assert_eq!(result.summary.messages, 64);
    assert_eq!(manager.scene().traversal().len(), 33);
}
