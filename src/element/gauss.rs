//! Quadrature rules for numerical integration.
//!
//! This module provides:
//! - 1D Gauss-Legendre tables for 1 to 5 points
//! - Product Gauss rules on the reference hypercube [-1, 1]^d
//! - Keast rules on the reference tetrahedron (1, 4, 5 and 11 points)
//! - [`IntegrationRules`], the per-family rule registry owned by a mesh
//!
//! # Usage
//!
//! ```
//! use femkit::element::gauss::IntegrationRule;
//!
//! let rule = IntegrationRule::product_gauss(3, 2).unwrap();
//! assert_eq!(rule.len(), 8);
//!
//! for gp in IntegrationRule::keast(4).unwrap().points() {
//!     // gp.coords gives (ξ, η, ζ) in the unit tetrahedron
//!     // gp.weight is the integration weight
//!     let _ = gp.weight * gp.xi();
//! }
//! ```

use super::ElementType;
use crate::error::{Error, Result};
use crate::types::Point3;

/// A quadrature point with natural coordinates and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    /// Natural coordinates. Unused trailing axes are zero.
    pub coords: [f64; 3],
    /// Integration weight.
    pub weight: f64,
}

impl GaussPoint {
    /// Create a new quadrature point.
    pub fn new(coords: [f64; 3], weight: f64) -> Self {
        Self { coords, weight }
    }

    /// Get ξ (first natural coordinate).
    #[inline]
    pub fn xi(&self) -> f64 {
        self.coords[0]
    }

    /// Get η (second natural coordinate).
    #[inline]
    pub fn eta(&self) -> f64 {
        self.coords[1]
    }

    /// Get ζ (third natural coordinate).
    #[inline]
    pub fn zeta(&self) -> f64 {
        self.coords[2]
    }

    /// Natural coordinates as a point.
    #[inline]
    pub fn point(&self) -> Point3 {
        Point3::new(self.coords[0], self.coords[1], self.coords[2])
    }
}

/// 1D Gauss-Legendre quadrature points and weights.
///
/// Returns (point, weight) pairs for integration on [-1, 1], ordered by
/// increasing point.
///
/// # Arguments
///
/// * `n` - Number of integration points (1 to 5)
pub fn gauss_1d(n: usize) -> Result<Vec<(f64, f64)>> {
    let rule = match n {
        1 => vec![(0.0, 2.0)],
        2 => gauss_2().to_vec(),
        3 => {
            let p = (3.0 / 5.0_f64).sqrt();
            vec![(-p, 5.0 / 9.0), (0.0, 8.0 / 9.0), (p, 5.0 / 9.0)]
        }
        4 => {
            // Points: ±√((3 ∓ 2√(6/5))/7)
            let sqrt_6_5 = (6.0 / 5.0_f64).sqrt();
            let p1 = ((3.0 - 2.0 * sqrt_6_5) / 7.0).sqrt();
            let p2 = ((3.0 + 2.0 * sqrt_6_5) / 7.0).sqrt();
            // Weights: 1/2 ± √(5/6)/6
            let sqrt_5_6 = (5.0 / 6.0_f64).sqrt();
            let w1 = 0.5 + sqrt_5_6 / 6.0;
            let w2 = 0.5 - sqrt_5_6 / 6.0;
            vec![(-p2, w2), (-p1, w1), (p1, w1), (p2, w2)]
        }
        5 => {
            // Points: 0, ±√(5 ∓ 2√(10/7))/3
            let sqrt_10_7 = (10.0 / 7.0_f64).sqrt();
            let p1 = (5.0 - 2.0 * sqrt_10_7).sqrt() / 3.0;
            let p2 = (5.0 + 2.0 * sqrt_10_7).sqrt() / 3.0;
            // Weights: (322 ± 13√70)/900 and 512/900
            let sqrt_70 = 70.0_f64.sqrt();
            let w1 = (322.0 + 13.0 * sqrt_70) / 900.0;
            let w2 = (322.0 - 13.0 * sqrt_70) / 900.0;
            vec![
                (-p2, w2),
                (-p1, w1),
                (0.0, 512.0 / 900.0),
                (p1, w1),
                (p2, w2),
            ]
        }
        _ => {
            return Err(Error::Integration(format!(
                "Gauss-Legendre rule requires 1 to 5 points per axis, got {}",
                n
            )))
        }
    };
    Ok(rule)
}

fn gauss_2() -> [(f64, f64); 2] {
    let p = 1.0 / 3.0_f64.sqrt();
    [(-p, 1.0), (p, 1.0)]
}

/// Tensor product of a 1D rule over `dimension` axes.
///
/// Point `index` is decomposed digit by digit in base `n`, the first axis
/// being the most significant digit.
fn tensor_product(dimension: usize, rule_1d: &[(f64, f64)]) -> Vec<GaussPoint> {
    let n = rule_1d.len();
    let total = n.pow(dimension as u32);
    let mut points = Vec::with_capacity(total);

    for index in 0..total {
        let mut remainder = index;
        let mut coords = [0.0; 3];
        let mut weight = 1.0;
        for (d, coord) in coords.iter_mut().enumerate().take(dimension) {
            let stride = n.pow((dimension - d - 1) as u32);
            let i = remainder / stride;
            remainder -= i * stride;
            let (p, w) = rule_1d[i];
            *coord = p;
            weight *= w;
        }
        points.push(GaussPoint::new(coords, weight));
    }

    points
}

fn keast_4() -> Vec<GaussPoint> {
    let sqrt5 = 5.0_f64.sqrt();
    let a = (5.0 + 3.0 * sqrt5) / 20.0;
    let b = (5.0 - sqrt5) / 20.0;
    let w = 1.0 / 24.0;
    vec![
        GaussPoint::new([a, b, b], w),
        GaussPoint::new([b, a, b], w),
        GaussPoint::new([b, b, a], w),
        GaussPoint::new([b, b, b], w),
    ]
}

/// Construction recipe of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Tensor product of 1D Gauss-Legendre rules.
    ProductGauss {
        /// Number of axes.
        dimension: usize,
        /// Points per axis.
        points_per_axis: usize,
    },
    /// Keast rule on the unit tetrahedron.
    Keast {
        /// Total number of points.
        points: usize,
    },
}

/// Immutable list of quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationRule {
    kind: RuleKind,
    points: Vec<GaussPoint>,
}

impl IntegrationRule {
    /// Product Gauss rule on [-1, 1]^dimension with `n` points per axis.
    pub fn product_gauss(dimension: usize, n: usize) -> Result<Self> {
        if !(1..=3).contains(&dimension) {
            return Err(Error::Integration(format!(
                "product Gauss rule supports 1 to 3 axes, got {}",
                dimension
            )));
        }

        let rule_1d = gauss_1d(n)?;

        Ok(Self {
            kind: RuleKind::ProductGauss {
                dimension,
                points_per_axis: n,
            },
            points: tensor_product(dimension, &rule_1d),
        })
    }

    /// Keast rule on the tetrahedron (0,0,0), (1,0,0), (0,1,0), (0,0,1).
    ///
    /// Weights sum to the reference volume 1/6.
    ///
    /// # Integration Order
    ///
    /// - n=1: exact for polynomials up to degree 1
    /// - n=4: degree 2
    /// - n=5: degree 3
    /// - n=11: degree 4
    pub fn keast(n: usize) -> Result<Self> {
        let points = match n {
            1 => vec![GaussPoint::new([0.25, 0.25, 0.25], 1.0 / 6.0)],
            4 => keast_4(),
            5 => {
                let w_center = -4.0 / 30.0;
                let w = 9.0 / 120.0;
                let a = 0.5;
                let b = 1.0 / 6.0;
                vec![
                    GaussPoint::new([0.25, 0.25, 0.25], w_center),
                    GaussPoint::new([a, b, b], w),
                    GaussPoint::new([b, a, b], w),
                    GaussPoint::new([b, b, a], w),
                    GaussPoint::new([b, b, b], w),
                ]
            }
            11 => {
                let w_center = -74.0 / 5625.0;
                let w_vertex = 343.0 / 45000.0;
                let w_edge = 56.0 / 2250.0;
                let a = 11.0 / 14.0;
                let b = 1.0 / 14.0;
                let root = (5.0 / 14.0_f64).sqrt();
                let p = (1.0 + root) / 4.0;
                let m = (1.0 - root) / 4.0;
                vec![
                    GaussPoint::new([0.25, 0.25, 0.25], w_center),
                    GaussPoint::new([a, b, b], w_vertex),
                    GaussPoint::new([b, a, b], w_vertex),
                    GaussPoint::new([b, b, a], w_vertex),
                    GaussPoint::new([b, b, b], w_vertex),
                    GaussPoint::new([p, p, m], w_edge),
                    GaussPoint::new([p, m, p], w_edge),
                    GaussPoint::new([p, m, m], w_edge),
                    GaussPoint::new([m, p, p], w_edge),
                    GaussPoint::new([m, p, m], w_edge),
                    GaussPoint::new([m, m, p], w_edge),
                ]
            }
            _ => {
                return Err(Error::Integration(format!(
                    "Keast rule exists for 1, 4, 5 or 11 points, got {}",
                    n
                )))
            }
        };

        Ok(Self {
            kind: RuleKind::Keast { points: n },
            points,
        })
    }

    /// How the rule was built.
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Quadrature points in a fixed order.
    pub fn points(&self) -> &[GaussPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the rule has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of weights (reference element measure).
    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }
}

/// One quadrature rule per element family.
#[derive(Debug, Clone)]
pub struct IntegrationRules {
    tet4: IntegrationRule,
    hex8: IntegrationRule,
}

impl IntegrationRules {
    /// Rule used by `element_type`.
    pub fn get(&self, element_type: ElementType) -> &IntegrationRule {
        match element_type {
            ElementType::Tet4 => &self.tet4,
            ElementType::Hex8 => &self.hex8,
        }
    }

    /// Replace the rule used by `element_type`.
    ///
    /// The rule must live on the family's reference element: Keast rules for
    /// tetrahedra, three-axis product Gauss rules for hexahedra.
    pub fn set(&mut self, element_type: ElementType, rule: IntegrationRule) -> Result<()> {
        let compatible = matches!(
            (element_type, rule.kind()),
            (ElementType::Tet4, RuleKind::Keast { .. })
                | (ElementType::Hex8, RuleKind::ProductGauss { dimension: 3, .. })
        );
        if !compatible {
            return Err(Error::Integration(format!(
                "{:?} rule cannot integrate over a {:?} reference element",
                rule.kind(),
                element_type
            )));
        }
        match element_type {
            ElementType::Tet4 => self.tet4 = rule,
            ElementType::Hex8 => self.hex8 = rule,
        }
        Ok(())
    }
}

impl Default for IntegrationRules {
    /// Keast 4 for tetrahedra, 2×2×2 Gauss for hexahedra.
    fn default() -> Self {
        Self {
            tet4: IntegrationRule {
                kind: RuleKind::Keast { points: 4 },
                points: keast_4(),
            },
            hex8: IntegrationRule {
                kind: RuleKind::ProductGauss {
                    dimension: 3,
                    points_per_axis: 2,
                },
                points: tensor_product(3, &gauss_2()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn factorial(n: u32) -> f64 {
        (1..=n).map(f64::from).product()
    }

    /// ∫ x^a y^b z^c over the unit tetrahedron.
    fn tet_monomial(a: u32, b: u32, c: u32) -> f64 {
        factorial(a) * factorial(b) * factorial(c) / factorial(a + b + c + 3)
    }

    fn integrate(rule: &IntegrationRule, a: i32, b: i32, c: i32) -> f64 {
        rule.points()
            .iter()
            .map(|gp| gp.weight * gp.xi().powi(a) * gp.eta().powi(b) * gp.zeta().powi(c))
            .sum()
    }

    #[test]
    fn test_gauss_1d_weights_sum_to_two() {
        for n in 1..=5 {
            let sum: f64 = gauss_1d(n).unwrap().iter().map(|(_, w)| w).sum();
            assert_relative_eq!(sum, 2.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_gauss_1d_exactness() {
        // n points integrate x^(2n-2) exactly: ∫ x^k = 2/(k+1) for even k
        for n in 1..=5 {
            let k = 2 * n - 2;
            let value: f64 = gauss_1d(n)
                .unwrap()
                .iter()
                .map(|(x, w)| w * x.powi(k as i32))
                .sum();
            assert_relative_eq!(value, 2.0 / (k as f64 + 1.0), epsilon = 1e-13);
        }
    }

    #[test]
    fn test_gauss_1d_invalid() {
        assert!(gauss_1d(0).is_err());
        assert!(gauss_1d(6).is_err());
    }

    #[test]
    fn test_product_gauss_ordering() {
        let rule = IntegrationRule::product_gauss(3, 2).unwrap();
        let p = 1.0 / 3.0_f64.sqrt();
        assert_eq!(rule.len(), 8);
        // First axis is the most significant digit
        assert_relative_eq!(rule.points()[0].point(), Point3::new(-p, -p, -p), epsilon = 1e-15);
        assert_relative_eq!(rule.points()[1].point(), Point3::new(-p, -p, p), epsilon = 1e-15);
        assert_relative_eq!(rule.points()[4].point(), Point3::new(p, -p, -p), epsilon = 1e-15);
        assert_relative_eq!(rule.total_weight(), 8.0, epsilon = 1e-14);
    }

    #[test]
    fn test_product_gauss_exactness() {
        let rule = IntegrationRule::product_gauss(3, 3).unwrap();
        assert_eq!(rule.len(), 27);
        // ∫ x²y²z⁴ over [-1,1]³ = (2/3)(2/3)(2/5)
        assert_relative_eq!(integrate(&rule, 2, 2, 4), 8.0 / 45.0, epsilon = 1e-13);
    }

    #[test]
    fn test_product_gauss_lower_dimensions() {
        let rule = IntegrationRule::product_gauss(2, 5).unwrap();
        assert_eq!(rule.len(), 25);
        assert_relative_eq!(rule.total_weight(), 4.0, epsilon = 1e-13);
        assert!(rule.points().iter().all(|gp| gp.zeta() == 0.0));
        assert!(IntegrationRule::product_gauss(4, 2).is_err());
    }

    #[test]
    fn test_keast_weights_sum_to_volume() {
        for n in [1, 4, 5, 11] {
            let rule = IntegrationRule::keast(n).unwrap();
            assert_eq!(rule.len(), n);
            assert_relative_eq!(rule.total_weight(), 1.0 / 6.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_keast_polynomial_exactness() {
        let cases: [(usize, &[(u32, u32, u32)]); 3] = [
            (4, &[(2, 0, 0), (1, 1, 0)]),
            (5, &[(3, 0, 0), (1, 1, 1)]),
            (11, &[(4, 0, 0), (2, 2, 0), (2, 1, 1)]),
        ];
        for (n, monomials) in cases {
            let rule = IntegrationRule::keast(n).unwrap();
            for &(a, b, c) in monomials {
                assert_relative_eq!(
                    integrate(&rule, a as i32, b as i32, c as i32),
                    tet_monomial(a, b, c),
                    epsilon = 1e-14
                );
            }
        }
    }

    #[test]
    fn test_keast_invalid() {
        assert!(IntegrationRule::keast(2).is_err());
    }

    #[test]
    fn test_registry_defaults_and_compatibility() {
        let mut rules = IntegrationRules::default();
        assert_eq!(rules.get(ElementType::Tet4).len(), 4);
        assert_eq!(rules.get(ElementType::Hex8).len(), 8);

        rules
            .set(ElementType::Hex8, IntegrationRule::product_gauss(3, 3).unwrap())
            .unwrap();
        assert_eq!(rules.get(ElementType::Hex8).len(), 27);

        let wrong = rules.set(ElementType::Tet4, IntegrationRule::product_gauss(3, 2).unwrap());
        assert!(wrong.is_err());
        assert_eq!(rules.get(ElementType::Tet4).len(), 4);
    }
}
