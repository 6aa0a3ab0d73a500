//! RegionTree - the selection hierarchy used for seeding and per-step filtering.
//!
//! Regions are boxes or ellipsoids placed in world coordinates. Top-level
//! regions act as seed boxes; their direct children refine which walks started
//! in them are kept (inclusion), pruned (NOT, prune mode) or hidden (NOT,
//! remove mode). Any region can additionally be a magnet that bends HARDI
//! walks toward its field vector.
//!
//! The tree is an arena: regions are addressed by [`RegionId`], children keep
//! insertion order, and a tracking pass borrows the whole tree immutably.

use crate::geometry::{Aabb, Vec3};
use crate::grid::VoxelGrid;
use crate::{FiberNavError, Result};
use serde::{Deserialize, Serialize};

/// Index of a region inside its [`RegionTree`].
pub type RegionId = usize;

/// Region volume shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionShape {
    Box,
    Ellipsoid,
}

/// Magnet behaviour attached to a region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Magnet {
    /// Direction walks are pulled toward while inside the region
    pub field: Vec3,
}

/// A selection volume with its behaviour flags.
///
/// `size` is expressed in voxels; the world extent is `size * voxel_size`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Vec3,
    pub size: Vec3,
    pub shape: RegionShape,
    pub active: bool,
    /// NOT region: excludes instead of includes
    pub not: bool,
    /// For NOT regions: hide touching walks (true) or cut them at the border (false)
    pub remove: bool,
    pub magnet: Option<Magnet>,
}

impl Region {
    /// Active box region.
    pub fn new_box(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            size,
            shape: RegionShape::Box,
            active: true,
            not: false,
            remove: false,
            magnet: None,
        }
    }

    /// Active ellipsoid region inscribed in the `size` box.
    pub fn new_ellipsoid(center: Vec3, size: Vec3) -> Self {
        Self {
            shape: RegionShape::Ellipsoid,
            ..Self::new_box(center, size)
        }
    }

    pub fn with_not(mut self, remove: bool) -> Self {
        self.not = true;
        self.remove = remove;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_magnet(mut self, field: Vec3) -> Self {
        self.magnet = Some(Magnet { field });
        self
    }

    #[inline]
    pub fn is_magnet(&self) -> bool {
        self.magnet.is_some()
    }

    /// World-space bounding box of the region.
    pub fn bounds(&self, grid: &VoxelGrid) -> Aabb {
        Aabb::from_center_extent(self.center, self.size.scale(grid.voxel_size()))
    }

    /// Shape-aware containment test.
    pub fn contains(&self, pos: Vec3, grid: &VoxelGrid) -> bool {
        let b = self.bounds(grid);
        match self.shape {
            RegionShape::Box => b.contains(pos),
            RegionShape::Ellipsoid => b.ellipsoid_contains(pos),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RegionNode {
    region: Region,
    parent: Option<RegionId>,
    children: Vec<RegionId>,
}

/// Selection hierarchy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegionTree {
    nodes: Vec<RegionNode>,
}

impl RegionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level region.
    pub fn add_root(&mut self, region: Region) -> RegionId {
        self.nodes.push(RegionNode {
            region,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a region under `parent`.
    pub fn add_child(&mut self, parent: RegionId, region: Region) -> Result<RegionId> {
        if parent >= self.nodes.len() {
            return Err(FiberNavError::IndexOutOfBounds {
                index: parent,
                length: self.nodes.len(),
            });
        }
        let id = self.nodes.len();
        self.nodes.push(RegionNode {
            region,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.nodes.get(id).map(|n| &n.region)
    }

    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.nodes.get_mut(id).map(|n| &mut n.region)
    }

    pub fn parent(&self, id: RegionId) -> Option<RegionId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    #[inline]
    pub fn is_top_level(&self, id: RegionId) -> bool {
        self.nodes.get(id).map(|n| n.parent.is_none()).unwrap_or(false)
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: RegionId) -> impl Iterator<Item = (RegionId, &Region)> + '_ {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&c| (c, &self.nodes[c].region))
    }

    /// All regions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &Region)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (i, &n.region))
    }

    /// Regions eligible as seed boxes: active, not NOT, top-level, box-shaped.
    pub fn seed_boxes(&self) -> impl Iterator<Item = (RegionId, &Region)> + '_ {
        self.iter().filter(move |(id, r)| {
            r.active && !r.not && r.shape == RegionShape::Box && self.is_top_level(*id)
        })
    }

    /// Active magnet regions in insertion order.
    pub fn active_magnets(&self) -> impl Iterator<Item = (RegionId, &Region)> + '_ {
        self.iter().filter(|(_, r)| r.active && r.is_magnet())
    }

    pub fn has_active_magnet(&self) -> bool {
        self.active_magnets().next().is_some()
    }
}
