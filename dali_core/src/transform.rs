// Copyright 2026 the DALi Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 matrix.
//!
//! Covers what the update pass needs to build world and model-view matrices
//! (identity, local transform composition, multiply, point transform) without
//! pulling in a full linear-algebra crate.

use core::ops::Mul;

use bytemuck::{Pod, Zeroable};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::math::Vector3;

/// A column-major 4×4 matrix stored as `[[f32; 4]; 4]`.
///
/// Each inner array is one *column*, matching the memory layout GPU uniform
/// uploads expect.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Matrix {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f32; 4]; 4],
}

impl Matrix {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f32; 4] {
        self.cols[i]
    }

    /// Creates a pure translation.
    #[inline]
    #[must_use]
    pub const fn from_translation(t: Vector3) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [t.x, t.y, t.z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale.
    #[inline]
    #[must_use]
    pub const fn from_scale(s: Vector3) -> Self {
        Self {
            cols: [
                [s.x, 0.0, 0.0, 0.0],
                [0.0, s.y, 0.0, 0.0],
                [0.0, 0.0, s.z, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f32) -> Self {
        #[cfg(feature = "std")]
        let (s, c) = radians.sin_cos();
        #[cfg(not(feature = "std"))]
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Composes `translate * rotate_z * scale`, the local transform of a node.
    #[must_use]
    pub fn from_components(scale: Vector3, rotation_z: f32, translation: Vector3) -> Self {
        Self::from_translation(translation) * Self::from_rotation_z(rotation_z) * Self::from_scale(scale)
    }

    /// Returns the translation column.
    #[inline]
    #[must_use]
    pub const fn translation(&self) -> Vector3 {
        Vector3::new(self.cols[3][0], self.cols[3][1], self.cols[3][2])
    }

    /// Transforms a point (w = 1).
    #[must_use]
    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        let c = &self.cols;
        Vector3::new(
            c[0][0] * p.x + c[1][0] * p.y + c[2][0] * p.z + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[2][1] * p.z + c[3][1],
            c[0][2] * p.x + c[1][2] * p.y + c[2][2] * p.z + c[3][2],
        )
    }

    /// Returns the matrix as a flat column-major array.
    #[inline]
    #[must_use]
    pub fn to_cols_array(self) -> [f32; 16] {
        bytemuck::cast(self.cols)
    }
}

impl Default for Matrix {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f32; 4]; 4];
        for (j, col) in out.iter_mut().enumerate() {
            for (i, v) in col.iter_mut().enumerate() {
                *v = a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Matrix::default(), Matrix::IDENTITY);
    }

    #[test]
    fn identity_multiply() {
        let t = Matrix::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(Matrix::IDENTITY * t, t);
        assert_eq!(t * Matrix::IDENTITY, t);
    }

    #[test]
    fn translation_composition() {
        let a = Matrix::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let b = Matrix::from_translation(Vector3::new(0.0, 2.0, 0.0));
        assert_eq!((a * b).col(3), [1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn components_scale_then_translate() {
        let m = Matrix::from_components(Vector3::new(2.0, 2.0, 2.0), 0.0, Vector3::new(3.0, 4.0, 0.0));
        assert_eq!(m.col(0), [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(m.translation(), Vector3::new(3.0, 4.0, 0.0));
        assert_eq!(m.transform_point(Vector3::new(1.0, 1.0, 0.0)), Vector3::new(5.0, 6.0, 0.0));
    }

    #[test]
    fn rotation_z_ninety_degrees() {
        let r = Matrix::from_rotation_z(core::f32::consts::FRAC_PI_2);
        let p = r.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flat_array_is_column_major() {
        let t = Matrix::from_translation(Vector3::new(5.0, 6.0, 7.0));
        let flat = t.to_cols_array();
        assert_eq!(&flat[12..], &[5.0, 6.0, 7.0, 1.0]);
    }
}
