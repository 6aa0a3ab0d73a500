//! VoxelMask - bit-packed voxel membership sets.
//!
//! Used for flood-fill visited maps and for cluster membership masks. One bit
//! per voxel of the owning grid, stored in a `BitVec<u32, Lsb0>` so that
//! counting and bulk iteration run a word at a time.
//!
//! # Examples
//!
//! ```
//! use fibernav::VoxelMask;
//!
//! let mut mask = VoxelMask::new(1000);
//! mask.insert(5);
//! mask.insert(512);
//! assert_eq!(mask.count(), 2);
//! assert_eq!(mask.indices(), vec![5, 512]);
//! ```

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr};

const BITS_PER_WORD: usize = 32;

/// One membership bit per voxel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelMask {
    bv: BitVec<u32, Lsb0>,
}

impl VoxelMask {
    /// Empty mask over `n` voxels.
    #[inline]
    pub fn new(n: usize) -> Self {
        Self {
            bv: BitVec::repeat(false, n),
        }
    }

    /// Mask with the given voxels set.
    pub fn from_indices(n: usize, indices: &[usize]) -> Self {
        let mut mask = Self::new(n);
        for &i in indices {
            mask.insert(i);
        }
        mask
    }

    /// Number of voxels the mask spans.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bv.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bv.is_empty()
    }

    /// Mark voxel `i`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `i >= len`.
    #[inline(always)]
    pub fn insert(&mut self, i: usize) {
        debug_assert!(i < self.bv.len(), "voxel {} out of range {}", i, self.bv.len());
        self.bv.set(i, true);
    }

    #[inline(always)]
    pub fn remove(&mut self, i: usize) {
        debug_assert!(i < self.bv.len(), "voxel {} out of range {}", i, self.bv.len());
        self.bv.set(i, false);
    }

    /// Whether voxel `i` is marked. Out-of-range voxels are never marked.
    #[inline(always)]
    pub fn contains(&self, i: usize) -> bool {
        self.bv.get(i).map(|b| *b).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.bv.fill(false);
    }

    /// Number of marked voxels.
    #[inline]
    pub fn count(&self) -> usize {
        self.bv.count_ones()
    }

    /// Marked voxel indices in ascending order.
    ///
    /// Walks the raw words and skips empty ones, which dominates for the
    /// sparse masks produced by clustering.
    pub fn indices(&self) -> Vec<usize> {
        let mut acts = Vec::with_capacity(self.count());
        let words = self.bv.as_raw_slice();

        for (word_idx, word) in words.iter().enumerate() {
            if *word == 0 {
                continue;
            }
            let base = word_idx * BITS_PER_WORD;
            for bit_idx in 0..BITS_PER_WORD {
                let pos = base + bit_idx;
                if pos >= self.bv.len() {
                    break;
                }
                if (*word >> bit_idx) & 1 == 1 {
                    acts.push(pos);
                }
            }
        }

        acts
    }

    /// Number of voxels marked in both masks.
    ///
    /// # Panics
    ///
    /// Panics if the masks span different voxel counts.
    pub fn overlap(&self, other: &VoxelMask) -> usize {
        assert_eq!(self.len(), other.len(), "VoxelMasks must span the same grid");
        self.bv
            .as_raw_slice()
            .iter()
            .zip(other.bv.as_raw_slice())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.bv.as_raw_slice().len() * std::mem::size_of::<u32>()
    }
}

impl BitAnd for &VoxelMask {
    type Output = VoxelMask;

    fn bitand(self, rhs: &VoxelMask) -> VoxelMask {
        assert_eq!(self.len(), rhs.len(), "VoxelMasks must span the same grid");
        let mut out = self.clone();
        for (a, b) in out
            .bv
            .as_raw_mut_slice()
            .iter_mut()
            .zip(rhs.bv.as_raw_slice())
        {
            *a &= *b;
        }
        out
    }
}

impl BitOr for &VoxelMask {
    type Output = VoxelMask;

    fn bitor(self, rhs: &VoxelMask) -> VoxelMask {
        assert_eq!(self.len(), rhs.len(), "VoxelMasks must span the same grid");
        let mut out = self.clone();
        for (a, b) in out
            .bv
            .as_raw_mut_slice()
            .iter_mut()
            .zip(rhs.bv.as_raw_slice())
        {
            *a |= *b;
        }
        out
    }
}
