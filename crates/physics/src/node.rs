//! Scene nodes and generation-counted handles

use crate::body::RigidBody;
use crate::shape::VoxelShape;
use crate::transform::Transform;
use aabox::Aabb;
use glam::Vec3;
use std::sync::Arc;

/// Generation-counted handle to a scene node
///
/// Handles outliving their node are detected and rejected by every
/// accessor; couples and event payloads hold these instead of references,
/// so a destroyed node is observed as a dead handle rather than dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeHandle {
    pub(crate) fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// How a node resolves its world-aligned collider for indexing
///
/// One explicit variant per node kind, resolved by matching, so the
/// "collider of this node" question never goes through opaque payload
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColliderSource {
    /// The body's collider box, expressed in node-local space
    #[default]
    Extent,
    /// A dimensionless point at the node origin; degenerate, so the node
    /// is never indexed but still participates in the hierarchy
    Point,
    /// The bounds of the attached voxel shape
    Voxels,
}

/// A node in the scene hierarchy
pub struct Node {
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) transform: Transform,
    pub(crate) body: Option<RigidBody>,
    pub(crate) collider_source: ColliderSource,
    pub(crate) shape: Option<Arc<dyn VoxelShape>>,
    /// False while detached from the hierarchy pending removal
    pub(crate) linked: bool,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeHandle>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            transform: Transform::new(),
            body: None,
            collider_source: ColliderSource::default(),
            shape: None,
            linked: true,
        }
    }

    /// World-aligned collider per the node's collider source
    pub(crate) fn world_collider(&self) -> Aabb {
        let world = self.transform.world_matrix();
        match self.collider_source {
            ColliderSource::Extent => match &self.body {
                Some(body) => body.collider().transformed(&world),
                None => Self::point_box(self),
            },
            ColliderSource::Point => Self::point_box(self),
            ColliderSource::Voxels => match &self.shape {
                Some(shape) => shape.bounds().transformed(&world),
                None => Self::point_box(self),
            },
        }
    }

    fn point_box(node: &Node) -> Aabb {
        let p = node.transform.world_matrix().transform_point3(Vec3::ZERO);
        Aabb::new(p, p)
    }
}
