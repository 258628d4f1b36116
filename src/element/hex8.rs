//! 8-node hexahedron (Hex8) reference element.
//!
//! The Hex8 is a standard 3D solid element with:
//! - 8 nodes at vertices of a hexahedron
//! - 6 quadrilateral boundaries
//! - Trilinear shape functions
//! - 2×2×2 Gauss integration (8 points) by default
//!
//! # Shape Functions
//!
//! Trilinear shape functions in natural coordinates (ξ, η, ζ) ∈ [-1, 1]³:
//! ```text
//! N_i = (1 + ξ_i*ξ)(1 + η_i*η)(1 + ζ_i*ζ) / 8
//! ```
//! where (ξ_i, η_i, ζ_i) are ±1 for node i.
//!
//! # Node Numbering
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      / |     / |
//!     4-------5  |
//!     |  3----|--2
//!     | /     | /
//!     |/      |/
//!     0-------1
//!
//! Node 0: (-1, -1, -1)
//! Node 1: (+1, -1, -1)
//! Node 2: (+1, +1, -1)
//! Node 3: (-1, +1, -1)
//! Node 4: (-1, -1, +1)
//! Node 5: (+1, -1, +1)
//! Node 6: (+1, +1, +1)
//! Node 7: (-1, +1, +1)
//! ```

use crate::element::ElementShape;
use crate::types::Point3;
use nalgebra::{RowSVector, SMatrix};

/// Natural coordinates for each of the 8 nodes.
/// Node i has natural coordinates (XI[i], ETA[i], ZETA[i]).
const XI: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

/// 8-node hexahedral reference element (trilinear brick).
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

impl ElementShape<8> for Hex8 {
    const NODE_COORDINATES: [[f64; 3]; 8] = [
        [XI[0], ETA[0], ZETA[0]],
        [XI[1], ETA[1], ZETA[1]],
        [XI[2], ETA[2], ZETA[2]],
        [XI[3], ETA[3], ZETA[3]],
        [XI[4], ETA[4], ZETA[4]],
        [XI[5], ETA[5], ZETA[5]],
        [XI[6], ETA[6], ZETA[6]],
        [XI[7], ETA[7], ZETA[7]],
    ];

    fn shape_values(point: &Point3) -> RowSVector<f64, 8> {
        let (xi, eta, zeta) = (point[0], point[1], point[2]);
        RowSVector::<f64, 8>::from_fn(|_, i| {
            0.125 * (1.0 + XI[i] * xi) * (1.0 + ETA[i] * eta) * (1.0 + ZETA[i] * zeta)
        })
    }

    fn natural_derivatives(point: &Point3) -> SMatrix<f64, 3, 8> {
        let (xi, eta, zeta) = (point[0], point[1], point[2]);
        let mut dn = SMatrix::<f64, 3, 8>::zeros();

        for i in 0..8 {
            let xi_i = XI[i];
            let eta_i = ETA[i];
            let zeta_i = ZETA[i];

            // dN_i/dξ = (1/8) * ξ_i * (1 + η_i*η) * (1 + ζ_i*ζ)
            dn[(0, i)] = 0.125 * xi_i * (1.0 + eta_i * eta) * (1.0 + zeta_i * zeta);

            // dN_i/dη = (1/8) * (1 + ξ_i*ξ) * η_i * (1 + ζ_i*ζ)
            dn[(1, i)] = 0.125 * (1.0 + xi_i * xi) * eta_i * (1.0 + zeta_i * zeta);

            // dN_i/dζ = (1/8) * (1 + ξ_i*ξ) * (1 + η_i*η) * ζ_i
            dn[(2, i)] = 0.125 * (1.0 + xi_i * xi) * (1.0 + eta_i * eta) * zeta_i;
        }

        dn
    }
}
