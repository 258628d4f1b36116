//! 4-node tetrahedron (Tet4) reference element.
//!
//! The Tet4 is the simplest 3D solid element with:
//! - 4 nodes at vertices
//! - 4 triangular boundaries
//! - Constant shape function derivatives
//! - 4-point Keast integration by default
//!
//! # Shape Functions
//!
//! Parametric coordinates (ξ, η, ζ) on the unit tetrahedron:
//! - Node 0: (0, 0, 0) -> N0 = 1 - ξ - η - ζ
//! - Node 1: (1, 0, 0) -> N1 = ξ
//! - Node 2: (0, 1, 0) -> N2 = η
//! - Node 3: (0, 0, 1) -> N3 = ζ
//!
//! # Limitations
//!
//! - Volumetric locking in nearly incompressible materials (ν → 0.5)
//! - Low accuracy - requires fine meshes

use crate::element::ElementShape;
use crate::types::Point3;
use nalgebra::{RowSVector, SMatrix};

/// 4-node tetrahedral reference element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet4;

impl ElementShape<4> for Tet4 {
    const NODE_COORDINATES: [[f64; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];

    fn shape_values(point: &Point3) -> RowSVector<f64, 4> {
        let (xi, eta, zeta) = (point[0], point[1], point[2]);
        RowSVector::<f64, 4>::new(1.0 - xi - eta - zeta, xi, eta, zeta)
    }

    fn natural_derivatives(_point: &Point3) -> SMatrix<f64, 3, 4> {
        // dN/dξ, dN/dη, dN/dζ are constant
        SMatrix::<f64, 3, 4>::new(
            -1.0, 1.0, 0.0, 0.0,
            -1.0, 0.0, 1.0, 0.0,
            -1.0, 0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tet4_partition_of_unity() {
        let n = Tet4::shape_values(&Point3::new(0.1, 0.2, 0.3));
        assert_relative_eq!(n.sum(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(n[0], 0.4, epsilon = 1e-15);
    }

    #[test]
    fn test_tet4_shape_functions_at_nodes() {
        for (j, node) in Tet4::NODE_COORDINATES.iter().enumerate() {
            let n = Tet4::shape_values(&Point3::new(node[0], node[1], node[2]));
            for i in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(n[i], expected, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_tet4_derivatives_are_constant() {
        let a = Tet4::natural_derivatives(&Point3::new(0.0, 0.0, 0.0));
        let b = Tet4::natural_derivatives(&Point3::new(0.2, 0.5, 0.1));
        assert_eq!(a, b);
        for row in 0..3 {
            assert_relative_eq!(a.row(row).sum(), 0.0);
        }
    }
}
