//! Axis-aligned box primitives and swept collision tests
//!
//! This crate is the geometric foundation of the physics stack. It provides
//! the [`Aabb`] value type with overlap and transform queries, the [`Face`]
//! and [`ContactMask`] types describing the six principal contact
//! directions, and the continuous (swept) box-vs-box test used by the
//! contact solver.
//!
//! Everything here is a plain value type over `glam` vectors: no handles,
//! no lifecycle, freely copied and transformed.

mod aabb;
mod face;
mod swept;

pub use aabb::Aabb;
pub use face::{ContactMask, Face};
pub use swept::{sweep_box, Sweep};

// Re-export for convenience
pub use glam;
