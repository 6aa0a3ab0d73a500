//! Small fixed-size linear algebra used by the tracking engine.
//!
//! `Vec3` and `Mat3` work in single precision, matching the precision of the
//! per-voxel fields they are read from. Only the handful of operations the
//! integrators need are provided.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, Mul, Neg, Sub};

/// Lengths below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

/// A 3D vector in world (millimetre) or direction space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const X: Vec3 = Vec3 {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn from_array(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for degenerate input.
    #[inline]
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > EPSILON {
            self * (1.0 / len)
        } else {
            Vec3::ZERO
        }
    }

    #[inline]
    pub fn is_degenerate(self) -> bool {
        self.length() <= EPSILON
    }

    /// Component-wise product.
    #[inline]
    pub fn scale(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    #[inline]
    pub fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Returns `self` negated if it points away from `reference`.
    #[inline]
    pub fn aligned_with(self, reference: Vec3) -> Vec3 {
        if reference.dot(self) < 0.0 {
            -self
        } else {
            self
        }
    }

    /// Angle in degrees between two unit vectors.
    ///
    /// The dot product is clamped so rounding never produces NaN.
    #[inline]
    pub fn angle_deg(self, other: Vec3) -> f32 {
        self.dot(other).clamp(-1.0, 1.0).acos().to_degrees()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f32 {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        rhs * self
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    #[inline]
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Index<usize> for Vec3 {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index {} out of range", i),
        }
    }
}

/// A 3x3 matrix stored row-major, used for diffusion tensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    pub m: [[f32; 3]; 3],
}

impl Mat3 {
    #[inline]
    pub const fn new(m: [[f32; 3]; 3]) -> Self {
        Self { m }
    }

    /// Diagonal matrix, the usual shape of a synthetic axis-aligned tensor.
    pub const fn diagonal(a: f32, b: f32, c: f32) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    /// Symmetric tensor from its six unique components (xx, xy, xz, yy, yz, zz).
    pub const fn symmetric(xx: f32, xy: f32, xz: f32, yy: f32, yz: f32, zz: f32) -> Self {
        Self::new([[xx, xy, xz], [xy, yy, yz], [xz, yz, zz]])
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[row][col]
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }

    /// Squared Euclidean norm of column `col`.
    #[inline]
    pub fn column_norm_sq(&self, col: usize) -> f32 {
        self.m[0][col] * self.m[0][col]
            + self.m[1][col] * self.m[1][col]
            + self.m[2][col] * self.m[2][col]
    }
}

impl Add for Mat3 {
    type Output = Mat3;

    fn add(self, rhs: Mat3) -> Mat3 {
        let mut out = self;
        for r in 0..3 {
            for c in 0..3 {
                out.m[r][c] += rhs.m[r][c];
            }
        }
        out
    }
}

impl Mul<Mat3> for f32 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = rhs;
        for row in out.m.iter_mut() {
            for v in row.iter_mut() {
                *v *= self;
            }
        }
        out
    }
}

/// Axis-aligned box in world coordinates (bounds inclusive).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_extent(center: Vec3, extent: Vec3) -> Self {
        let half = extent * 0.5;
        Self::new(center - half, center + half)
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Normalized quadratic form of the ellipsoid inscribed in the box is <= 1.
    pub fn ellipsoid_contains(&self, p: Vec3) -> bool {
        let c = self.center();
        let r = self.extent() * 0.5;
        if r.x <= 0.0 || r.y <= 0.0 || r.z <= 0.0 {
            return false;
        }
        let d = p - c;
        (d.x * d.x) / (r.x * r.x) + (d.y * d.y) / (r.y * r.y) + (d.z * d.z) / (r.z * r.z) <= 1.0
    }

    /// Uniformly sampled point inside the box.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec3 {
        let e = self.extent();
        Vec3::new(
            self.min.x + rng.gen::<f32>() * e.x,
            self.min.y + rng.gen::<f32>() * e.y,
            self.min.z + rng.gen::<f32>() * e.z,
        )
    }
}
