//! Drop a small stack of boxes onto a floor and print how they settle
//!
//! Run with: cargo run --example falling_boxes

use glam::Vec3;
use strata_physics::{Aabb, BodyMode, RigidBody, Scene};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut scene = Scene::with_defaults(Vec3::new(0.0, -9.8, 0.0));

    let floor = scene.create_node(None).unwrap();
    scene.set_body(
        floor,
        RigidBody::new(
            BodyMode::Static,
            Aabb::new(Vec3::new(-20.0, -1.0, -20.0), Vec3::new(20.0, 0.0, 20.0)),
        ),
    );

    let mut boxes = Vec::new();
    for i in 0..5 {
        let h = scene.create_node(None).unwrap();
        scene
            .transform_mut(h)
            .unwrap()
            .set_position(Vec3::new(i as f32 * 0.2, 2.0 + i as f32 * 1.5, 0.0));
        let mut body = RigidBody::new(
            BodyMode::Dynamic,
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5)),
        );
        body.set_friction(0.6);
        body.set_bounciness(0.2);
        scene.set_body(h, body);
        boxes.push(h);
    }

    let dt = 1.0 / 60.0;
    for frame in 0..300 {
        scene.refresh(dt);
        scene.end_of_frame_refresh();

        if frame % 60 == 0 {
            println!("--- frame {frame} ---");
            for (i, h) in boxes.iter().enumerate() {
                let pos = scene.transform(*h).unwrap().position();
                let body = scene.body(*h).unwrap();
                println!(
                    "  box {i}: y={:+.3} vel={:+.3} awake={}",
                    pos.y,
                    body.velocity().y,
                    body.is_awake()
                );
            }
        }
    }

    println!("--- settled ---");
    for (i, h) in boxes.iter().enumerate() {
        let pos = scene.transform(*h).unwrap().position();
        println!("  box {i}: {:+.3} {:+.3} {:+.3}", pos.x, pos.y, pos.z);
    }
}
