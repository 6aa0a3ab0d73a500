//! Magnet regions bending HARDI walks toward a field vector.

use super::closest_stick;
use crate::geometry::Vec3;
use crate::grid::VoxelGrid;
use crate::region::RegionTree;

/// Outgoing direction and magnet pull at one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deflection {
    /// Stick the walk should follow
    pub v_out: Vec3,
    /// Magnet weight `F`; zero outside every magnet
    pub weight: f32,
    /// Normalized magnet field
    pub v_magnet: Vec3,
}

impl Deflection {
    /// Blend `(1-F)*((1-g)*v_in + g*v_out) + F*v_magnet`.
    #[inline]
    pub fn blend(&self, v_in: Vec3, g: f32) -> Vec3 {
        let f = self.weight;
        (1.0 - f) * ((1.0 - g) * v_in + g * self.v_out) + f * self.v_magnet
    }
}

/// Evaluates the active magnets of a region tree.
#[derive(Clone, Copy, Debug)]
pub struct MagneticDeflector<'a> {
    grid: &'a VoxelGrid,
    regions: &'a RegionTree,
    strength: f32,
    active: bool,
}

impl<'a> MagneticDeflector<'a> {
    pub fn new(grid: &'a VoxelGrid, regions: &'a RegionTree, strength: f32) -> Self {
        Self {
            grid,
            regions,
            strength,
            active: regions.has_active_magnet(),
        }
    }

    /// Whether any magnet can influence the pass.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Choose the outgoing stick at `pos`.
    ///
    /// Inside a magnet (first match in tree order) the stick closest to the
    /// field wins; elsewhere the stick closest to `v_in` does.
    pub fn deflect(&self, v_in: Vec3, sticks: &[Vec3], pos: Vec3) -> Deflection {
        if self.active {
            for (_, region) in self.regions.active_magnets() {
                let Some(magnet) = region.magnet else { continue };
                if !region.bounds(self.grid).contains(pos) {
                    continue;
                }
                let field = magnet.field.normalized();
                return Deflection {
                    v_out: closest_stick(field, sticks).unwrap_or(Vec3::ZERO),
                    weight: self.strength,
                    v_magnet: field,
                };
            }
        }
        Deflection {
            v_out: closest_stick(v_in, sticks).unwrap_or(Vec3::ZERO),
            weight: 0.0,
            v_magnet: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use approx::assert_relative_eq;

    #[test]
    fn test_outside_magnets_follows_closest_stick() {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let mut tree = RegionTree::new();
        tree.add_root(
            Region::new_box(Vec3::new(8.0, 8.0, 8.0), Vec3::new(2.0, 2.0, 2.0)).with_magnet(Vec3::Y),
        );
        let deflector = MagneticDeflector::new(&grid, &tree, 0.5);
        assert!(deflector.is_active());
        let sticks = [Vec3::X, Vec3::Y, Vec3::ZERO];
        let d = deflector.deflect(Vec3::X, &sticks, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(d.weight, 0.0);
        assert_relative_eq!(d.v_out.x, 1.0);
        let blended = d.blend(Vec3::X, 0.6);
        assert_relative_eq!(blended.x, 1.0);
    }

    #[test]
    fn test_inside_magnet_pulls_toward_field() {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let mut tree = RegionTree::new();
        tree.add_root(
            Region::new_box(Vec3::new(5.0, 5.0, 5.0), Vec3::new(4.0, 4.0, 4.0))
                .with_magnet(Vec3::new(0.0, 2.0, 0.0)),
        );
        let deflector = MagneticDeflector::new(&grid, &tree, 0.5);
        let sticks = [Vec3::X, Vec3::Y, Vec3::ZERO];
        let d = deflector.deflect(Vec3::X, &sticks, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(d.weight, 0.5);
        assert_relative_eq!(d.v_out.y, 1.0);
        // g = 0: half incoming, half field
        let blended = d.blend(Vec3::X, 0.0);
        assert_relative_eq!(blended.x, 0.5);
        assert_relative_eq!(blended.y, 0.5);
    }

    #[test]
    fn test_inactive_magnet_ignored() {
        let grid = VoxelGrid::unit(10, 10, 10).unwrap();
        let mut tree = RegionTree::new();
        tree.add_root(
            Region::new_box(Vec3::new(5.0, 5.0, 5.0), Vec3::new(4.0, 4.0, 4.0))
                .with_magnet(Vec3::Y)
                .with_active(false),
        );
        let deflector = MagneticDeflector::new(&grid, &tree, 0.5);
        assert!(!deflector.is_active());
    }
}
