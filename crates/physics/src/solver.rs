//! Per-tick body simulation: integration, the iterative contact solver and
//! the trigger overlap pass
//!
//! The dynamic path integrates velocity, runs the sleep check, then
//! resolves the tick's displacement through a bounded number of
//! broadphase-query → earliest-contact → response iterations. Contacts
//! against non-dynamic bodies are swept in that body's local frame, so
//! rotated and per-block colliders work without rotating the solver
//! itself.
//!
//! A body's velocity and contact mask may be written both by its own tick
//! and by another body's solver iteration within the same frame (push and
//! replacement). That cross-body write is intentional and safe only
//! because the whole frame is single-threaded.

use aabox::{sweep_box, Aabb, Face, Sweep};
use glam::{Mat4, Vec3};
use std::sync::Arc;

use crate::body::{BodyMode, TickOutcome};
use crate::couple;
use crate::events::ContactEvent;
use crate::node::NodeHandle;
use crate::scene::Scene;
use crate::shape::VoxelShape;

/// Snapshot of a broadphase candidate, copied out so the event sink and
/// cross-body writes never overlap a live borrow
struct Candidate {
    mode: BodyMode,
    is_trigger: bool,
    collider: Aabb,
    world_matrix: Mat4,
    world_inverse: Mat4,
    mass: f32,
    friction: f32,
    bounciness: f32,
    events_enabled: bool,
    end_events_enabled: bool,
    shape: Option<Arc<dyn VoxelShape>>,
}

/// The earliest blocking contact of one solver iteration
struct Contact {
    other: NodeHandle,
    ratio: f32,
    normal: Vec3,
    /// Dominant world-space face of the struck surface
    face: Face,
    replacement: Vec3,
    other_dynamic: bool,
    other_mass: f32,
    other_friction: f32,
    other_bounce: f32,
    other_events: bool,
    other_end_events: bool,
}

/// Principal direction closest to an arbitrary world normal
fn dominant_face(n: Vec3) -> Face {
    let a = n.abs();
    let axis = if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    };
    Face::from_axis(axis, n[axis] >= 0.0)
}

fn candidate_info(scene: &Scene, h: NodeHandle) -> Option<Candidate> {
    let node = scene.node(h)?;
    let body = node.body.as_ref()?;
    Some(Candidate {
        mode: body.mode(),
        is_trigger: body.is_active_trigger(),
        collider: body.collider(),
        world_matrix: node.transform.world_matrix(),
        world_inverse: node.transform.world_inverse(),
        mass: body.mass(),
        friction: body.friction,
        bounciness: body.bounciness,
        events_enabled: body.events_enabled,
        end_events_enabled: body.end_events_enabled,
        shape: node.shape.clone(),
    })
}

/// Run one body's per-frame simulation step
pub(crate) fn tick_body(scene: &mut Scene, h: NodeHandle, dt: f32) -> TickOutcome {
    let Some((mode, active_trigger)) = scene
        .node(h)
        .and_then(|n| n.body.as_ref().map(|b| (b.mode(), b.is_active_trigger())))
    else {
        return TickOutcome::Skipped;
    };
    match mode {
        BodyMode::Dynamic => tick_dynamic(scene, h, dt),
        BodyMode::Trigger | BodyMode::TriggerPerBlock if active_trigger => {
            tick_trigger(scene, h);
            TickOutcome::Stayed
        }
        _ => TickOutcome::Skipped,
    }
}

fn tick_dynamic(scene: &mut Scene, h: NodeHandle, dt: f32) -> TickOutcome {
    let config = scene.config;
    let gravity = scene.gravity;

    let Some(snapshot) = scene.node(h).and_then(|node| {
        node.body.as_ref().map(|body| {
            (
                body.velocity,
                body.motion,
                body.acceleration,
                body.contacts,
                body.mass(),
                body.friction,
                body.bounciness,
                body.groups,
                body.collides_with,
                body.events_enabled,
                body.end_events_enabled,
                body.awake_countdown,
                node.world_collider(),
            )
        })
    }) else {
        return TickOutcome::Skipped;
    };
    let (
        mut velocity,
        motion,
        acceleration,
        contacts0,
        mass,
        friction,
        bounciness,
        groups,
        collides_with,
        events_on,
        end_events_on,
        awake,
        world0,
    ) = snapshot;

    // Integrate, then damp exponentially. Motion is a scripted per-tick
    // offset: it contributes to the displacement but never feeds back
    // into the velocity, so drag does not erode it.
    velocity += (gravity + acceleration) * dt;
    velocity *= (-config.air_drag * dt).exp();
    let mut total = velocity * dt + motion;

    // Sleep: nothing to do, or every axis of the displacement is already
    // blocked and the wake countdown ran out.
    let near_zero = total.length_squared() <= config.sleep_epsilon * config.sleep_epsilon;
    let covered = (0..3).all(|axis| {
        total[axis] == 0.0 || contacts0.contains(Face::from_axis(axis, total[axis] > 0.0))
    });
    if near_zero || (covered && awake == 0) {
        if let Some(body) = scene.body_mut(h) {
            body.velocity = Vec3::ZERO;
        }
        tracing::trace!(?h, "body slept");
        return TickOutcome::Slept;
    }
    if let Some(body) = scene.body_mut(h) {
        body.awake_countdown = awake.saturating_sub(1);
    }

    // Bound the per-tick displacement
    let step = total.length();
    if step > config.max_step {
        total *= config.max_step / step;
    }

    let eps = config.contact_eps_vec();
    let mut dv = total;
    let mut offset = Vec3::ZERO;
    let mut contacts = contacts0;

    for _ in 0..config.solver_iterations {
        if dv.length_squared() <= config.move_epsilon * config.move_epsilon {
            break;
        }
        let world = world0.translated(offset);
        let swept_volume = world.expanded_by(dv);

        let mut leaves = std::mem::take(&mut scene.scratch.overlaps);
        debug_assert!(leaves.is_empty(), "broadphase scratch must be drained before reuse");
        scene.index.query_overlaps(
            &swept_volume,
            groups,
            collides_with,
            config.contact_epsilon,
            &mut leaves,
        );

        let mut best: Option<Contact> = None;

        for li in 0..leaves.len() {
            let leaf = leaves[li];
            let Some(other_h) = scene.index.leaf_payload(leaf) else {
                continue;
            };
            if other_h == h {
                continue;
            }
            let Some(other_aabb) = scene.index.leaf_aabb(leaf) else {
                continue;
            };
            let Some(cand) = candidate_info(scene, other_h) else {
                continue;
            };
            if cand.mode == BodyMode::Disabled {
                continue;
            }

            // Dynamic targets sweep in world space; everything else is
            // re-expressed in the target's local frame first.
            let (sweep, normal, replacement) = if cand.mode == BodyMode::Dynamic {
                let s = sweep_box(&world, dv, &other_aabb, eps, true);
                let n = s.face.map(|f| f.normal()).unwrap_or(Vec3::ZERO);
                (s, n, s.replacement)
            } else {
                let moving_local = world.transformed(&cand.world_inverse);
                let dv_local = cand.world_inverse.transform_vector3(dv);
                let s = if cand.mode.is_per_block() {
                    match &cand.shape {
                        Some(shape) => shape.sweep_box(&moving_local, dv_local, eps, true).sweep,
                        None => Sweep::miss(),
                    }
                } else {
                    sweep_box(&moving_local, dv_local, &cand.collider, eps, true)
                };
                let n = s
                    .face
                    .map(|f| {
                        cand.world_matrix
                            .transform_vector3(f.normal())
                            .normalize_or_zero()
                    })
                    .unwrap_or(Vec3::ZERO);
                let r = cand.world_matrix.transform_vector3(s.replacement);
                (s, n, r)
            };

            if !sweep.is_hit() || normal == Vec3::ZERO {
                continue;
            }
            // Near-1 ratios are float error, not a contact
            if sweep.ratio >= 1.0 - config.ratio_snap {
                continue;
            }

            if cand.is_trigger {
                // Triggers notify but never block motion
                let position = world.translated(dv * sweep.ratio).center();
                let trigger_face = dominant_face(normal);
                if cand.events_enabled {
                    let event = ContactEvent {
                        body: other_h,
                        other: h,
                        face: trigger_face,
                        normal: -normal,
                        position,
                    };
                    scene.events.on_contact(&event);
                }
                if events_on {
                    let event = ContactEvent {
                        body: h,
                        other: other_h,
                        face: trigger_face.opposite(),
                        normal,
                        position,
                    };
                    scene.events.on_contact(&event);
                }
                continue;
            }

            let earlier = best.as_ref().map(|b| sweep.ratio < b.ratio).unwrap_or(true);
            if earlier {
                best = Some(Contact {
                    other: other_h,
                    ratio: sweep.ratio,
                    normal,
                    face: dominant_face(normal),
                    replacement,
                    other_dynamic: cand.mode == BodyMode::Dynamic,
                    other_mass: cand.mass,
                    other_friction: cand.friction,
                    other_bounce: cand.bounciness,
                    other_events: cand.events_enabled,
                    other_end_events: cand.end_events_enabled,
                });
            }
        }

        leaves.clear();
        scene.scratch.overlaps = leaves;

        let Some(contact) = best else {
            // All motion resolved: axes that moved are no longer touching
            offset += dv;
            for axis in 0..3 {
                if dv[axis] != 0.0 {
                    contacts.clear_axis(axis);
                }
            }
            break;
        };

        offset += dv * contact.ratio;

        // One-shot penetration correction. Between two dynamic bodies the
        // lighter one absorbs it.
        if contact.replacement != Vec3::ZERO {
            if contact.other_dynamic && contact.other_mass < mass {
                if let Some(node) = scene.node_mut(contact.other) {
                    node.transform.translate(-contact.replacement);
                    if let Some(other_body) = &mut node.body {
                        other_body.wake(config.awake_frames);
                    }
                }
            } else {
                offset += contact.replacement;
            }
        }

        let n = contact.normal;
        let v_pre = velocity;
        let remaining = dv * (1.0 - contact.ratio);
        let intrude_mag = remaining.dot(n).min(0.0);
        let tangent = remaining - n * intrude_mag;

        // Combined friction damps the tangential velocity and displacement
        let friction_k = config
            .friction_combine
            .apply(friction, contact.other_friction)
            .clamp(0.0, 1.0);
        let keep = 1.0 - friction_k;
        let v_norm_mag = velocity.dot(n);
        let v_tangent = (velocity - n * v_norm_mag) * keep;

        // Combined bounciness converts the intruding velocity into rebound
        // only past the threshold; below it the contact absorbs the motion
        // so resting bodies do not jitter.
        let bounce_k = config
            .bounce_combine
            .apply(bounciness, contact.other_bounce)
            .clamp(0.0, 1.0);
        let rebound = -v_norm_mag.min(0.0) * bounce_k;
        let v_normal = if rebound > config.min_bounce_speed {
            n * rebound
        } else {
            Vec3::ZERO
        };
        velocity = v_tangent + v_normal;

        // Mass-aware push: raise the struck dynamic body's velocity along
        // the push direction to a one-sided minimum. Not additive, and no
        // tangential inheritance.
        if contact.other_dynamic {
            let push_dir = -n;
            let target = v_pre.dot(push_dir) * (mass / (mass + contact.other_mass));
            if target > 0.0 {
                if let Some(other_body) = scene.body_mut(contact.other) {
                    let along = other_body.velocity.dot(push_dir);
                    if along < target {
                        other_body.velocity += push_dir * (target - along);
                    }
                    other_body.wake(config.awake_frames);
                }
            }
        }

        // Contact bits on both sides of the pair
        let my_face = contact.face.opposite();
        contacts.insert(my_face);
        if let Some(other_body) = scene.body_mut(contact.other) {
            other_body.contacts.insert(contact.face);
        }

        // Reciprocal notifications and end-of-contact tracking
        let position = world0.translated(offset).center();
        if events_on {
            let event = ContactEvent {
                body: h,
                other: contact.other,
                face: my_face,
                normal: n,
                position,
            };
            scene.events.on_contact(&event);
        }
        if contact.other_events {
            let event = ContactEvent {
                body: contact.other,
                other: h,
                face: contact.face,
                normal: -n,
                position,
            };
            scene.events.on_contact(&event);
        }
        if end_events_on || contact.other_end_events {
            couple::register(&mut scene.couples, h, contact.other, my_face);
        }

        // Only the friction-damped tangential component survives into the
        // next iteration.
        dv = tangent * keep;
    }

    let moved = offset.length() > config.move_epsilon;
    if let Some(node) = scene.node_mut(h) {
        if moved {
            node.transform.translate(offset);
        }
        if let Some(body) = &mut node.body {
            body.velocity = velocity;
            body.contacts = contacts;
        }
    }
    if moved {
        TickOutcome::Moved
    } else {
        TickOutcome::Stayed
    }
}

/// Overlap-only pass for active triggers
///
/// Each of the six faces is owned by the overlapping body with the largest
/// contact-face area; ties go to the lowest leaf index so index traversal
/// order cannot leak into behavior. A newly assigned owner fires one
/// event; faces with no overlap clear their contact bit.
fn tick_trigger(scene: &mut Scene, h: NodeHandle) {
    let config = scene.config;
    let Some((world, inv, shape, per_block, groups, collides_with, end_events_on, owners0)) =
        scene.node(h).and_then(|node| {
            node.body.as_ref().map(|body| {
                (
                    node.world_collider(),
                    node.transform.world_inverse(),
                    node.shape.clone(),
                    body.mode().is_per_block(),
                    body.groups,
                    body.collides_with,
                    body.end_events_enabled,
                    body.trigger_owners,
                )
            })
        })
    else {
        return;
    };
    // Outward epsilon: overlaps register one frame before a hard contact
    let expanded = world.padded(config.trigger_epsilon);

    let mut leaves = std::mem::take(&mut scene.scratch.overlaps);
    debug_assert!(leaves.is_empty(), "broadphase scratch must be drained before reuse");
    scene
        .index
        .query_overlaps(&expanded, groups, collides_with, 0.0, &mut leaves);

    let mut winners: [Option<(NodeHandle, f32, u32)>; 6] = [None; 6];
    for li in 0..leaves.len() {
        let leaf = leaves[li];
        let Some(other_h) = scene.index.leaf_payload(leaf) else {
            continue;
        };
        if other_h == h {
            continue;
        }
        let Some(other_aabb) = scene.index.leaf_aabb(leaf) else {
            continue;
        };
        let Some(overlap) = expanded.intersection(&other_aabb) else {
            continue;
        };
        if per_block {
            if let Some(shape) = &shape {
                let other_local = other_aabb.transformed(&inv);
                if !shape.overlaps_box(&other_local, config.trigger_epsilon) {
                    continue;
                }
            }
        }

        // The overlap's thinnest axis is the contact axis; the side is
        // whichever half of the trigger the other body sits in.
        let size = overlap.size();
        let axis = if size.x <= size.y && size.x <= size.z {
            0
        } else if size.y <= size.z {
            1
        } else {
            2
        };
        let positive = other_aabb.center()[axis] > world.center()[axis];
        let face = Face::from_axis(axis, positive);
        let area = match axis {
            0 => size.y * size.z,
            1 => size.x * size.z,
            _ => size.x * size.y,
        };

        let slot = &mut winners[face as usize];
        let better = match slot {
            None => true,
            Some((_, best_area, best_leaf)) => {
                area > *best_area || (area == *best_area && leaf.index < *best_leaf)
            }
        };
        if better {
            *slot = Some((other_h, area, leaf.index));
        }
    }
    leaves.clear();
    scene.scratch.overlaps = leaves;

    for face in Face::all() {
        let fi = face as usize;
        let new_owner = winners[fi].map(|(owner, _, _)| owner);
        match new_owner {
            Some(owner) => {
                if owners0[fi] != Some(owner) {
                    let event = ContactEvent {
                        body: h,
                        other: owner,
                        face,
                        normal: -face.normal(),
                        position: world.center(),
                    };
                    scene.events.on_contact(&event);
                }
                let other_end = scene
                    .body(owner)
                    .map(|b| b.end_events_enabled)
                    .unwrap_or(false);
                if end_events_on || other_end {
                    couple::register(&mut scene.couples, h, owner, face);
                }
                if let Some(body) = scene.body_mut(h) {
                    body.contacts.insert(face);
                    body.trigger_owners[fi] = Some(owner);
                }
            }
            None => {
                if let Some(body) = scene.body_mut(h) {
                    body.contacts.remove(face);
                    body.trigger_owners[fi] = None;
                }
            }
        }
    }
}
