//! Real-time collision and physics for a 3D scene engine
//!
//! Continuous (swept) axis-aligned-box collision detection, an iterative
//! contact solver with friction, bounciness, mass-aware push and
//! sleep/wake, and the per-frame orchestration tying the solver to a
//! spatial broadphase index and deferred lifecycle bookkeeping.
//!
//! # Architecture
//!
//! - [`Scene`]: owns the node hierarchy, the spatial index handle and the
//!   injected event sink; drives the ordered frame protocol
//!   (`refresh` → scripting → `end_of_frame_refresh`).
//! - [`RigidBody`]: per-entity physics state; the tick state machine and
//!   contact solver run over it during the refresh walk.
//! - [`SpatialIndex`]: broadphase collaborator consumed through a narrow
//!   trait; [`LinearIndex`] is the bundled reference implementation.
//! - [`VoxelShape`]: per-voxel occupancy collaborator for the `*PerBlock`
//!   collision modes; [`VoxelGrid`] is the bundled reference grid.
//!
//! Everything is single-threaded and synchronous: one deterministic pass
//! per game tick, no queries against a mutating index.

mod body;
mod config;
mod couple;
mod events;
mod node;
mod scene;
mod shape;
mod solver;
mod spatial;
mod transform;

pub use body::{BodyMode, RigidBody, TickOutcome};
pub use config::{CombineRule, PhysicsConfig};
pub use events::{CollisionEvents, ContactEvent, NullEvents};
pub use node::{ColliderSource, NodeHandle};
pub use scene::{CastHit, HitKind, Scene, SceneError};
pub use shape::{VoxelGrid, VoxelRayHit, VoxelShape, VoxelSweep};
pub use spatial::{CastCandidate, LeafHandle, LinearIndex, SpatialIndex};
pub use transform::Transform;

// Re-export for convenience
pub use aabox;
pub use aabox::{sweep_box, Aabb, ContactMask, Face, Sweep};
pub use glam;
