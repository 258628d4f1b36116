//! Core data types for FEA operations.
//!
//! This module defines the tensor layout conventions used throughout femkit:
//! - Geometric primitives (points)
//! - Attribute shapes derived from a tensor order
//! - Degree of freedom numbering
//! - Stress tensors recovered from nodal fields

use nalgebra::{DMatrix, Matrix3, Vector3};

/// Ambient (cartesian) dimension.
pub const DIMENSION: usize = 3;

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// Tensor-valued attribute stored on nodes and elements.
pub type AttributeValue = DMatrix<f64>;

/// `DIMENSION^exponent`.
#[inline]
pub fn power(exponent: usize) -> usize {
    DIMENSION.pow(exponent as u32)
}

/// Row/column extents of an attribute of the given order.
///
/// rows = 3^⌈order/2⌉, cols = 3^⌊order/2⌋, so order 0 is 1×1, order 1 is
/// 3×1, order 2 is 3×3 and order 4 is 9×9.
#[inline]
pub fn attribute_shape(order: usize) -> (usize, usize) {
    (power((order + 1) / 2), power(order / 2))
}

/// Number of scalar components of an attribute of the given order.
#[inline]
pub fn components(order: usize) -> usize {
    power(order)
}

/// Degrees of freedom carried by each node for a field of the given order.
#[inline]
pub fn dofs_per_node(order: usize) -> usize {
    power(order)
}

/// Global DOF index: `node * dofs_per_node(order) + local`.
#[inline]
pub fn global_dof(node: usize, local: usize, order: usize) -> usize {
    node * dofs_per_node(order) + local
}

/// Inverse of [`components`]: the order `o` with `3^o == n`, if any.
pub fn order_from_components(n: usize) -> Option<usize> {
    let mut order = 0;
    let mut value = 1;
    while value < n {
        value *= DIMENSION;
        order += 1;
    }
    (value == n).then_some(order)
}

/// Full (non-symmetrized) Cauchy stress tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressTensor(pub Matrix3<f64>);

impl StressTensor {
    /// Build from a 3×3 matrix.
    pub fn new(matrix: Matrix3<f64>) -> Self {
        Self(matrix)
    }

    /// Build from nine components flattened row by row.
    pub fn from_row_slice(components: &[f64]) -> Self {
        Self(Matrix3::from_row_slice(components))
    }

    /// Zero stress state.
    pub fn zero() -> Self {
        Self(Matrix3::zeros())
    }

    /// Compute von Mises equivalent stress.
    pub fn von_mises(&self) -> f64 {
        let s = &self.0;
        let s_xx = s[(0, 0)];
        let s_yy = s[(1, 1)];
        let s_zz = s[(2, 2)];
        // Symmetric part of the shear terms
        let t_xy = 0.5 * (s[(0, 1)] + s[(1, 0)]);
        let t_yz = 0.5 * (s[(1, 2)] + s[(2, 1)]);
        let t_xz = 0.5 * (s[(0, 2)] + s[(2, 0)]);

        let term1 = (s_xx - s_yy).powi(2) + (s_yy - s_zz).powi(2) + (s_zz - s_xx).powi(2);
        let term2 = 6.0 * (t_xy.powi(2) + t_yz.powi(2) + t_xz.powi(2));

        ((term1 + term2) / 2.0).sqrt()
    }

    /// Compute hydrostatic (mean) stress.
    pub fn hydrostatic(&self) -> f64 {
        self.0.trace() / 3.0
    }
}
