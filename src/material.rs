//! Material definitions.
//!
//! A material exposes one constitutive tensor of order 4, stored as a 9×9
//! matrix acting on the row-major flattened displacement gradient. It is
//! attached to elements as the "Stiffness Tensor" attribute.

use crate::error::{Error, Result};
use crate::types::AttributeValue;

/// Isotropic linear elastic material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicMaterial {
    /// Young's modulus E.
    pub youngs_modulus: f64,
    /// Poisson's ratio ν (dimensionless, -1 < ν < 0.5).
    pub poissons_ratio: f64,
}

impl IsotropicMaterial {
    /// Validated material: E > 0 and −1 < ν < 0.5.
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        if youngs_modulus <= 0.0 {
            return Err(Error::InvalidMaterial(
                format!("Young's modulus {} is not positive", youngs_modulus),
            ));
        }
        if poissons_ratio <= -1.0 || poissons_ratio >= 0.5 {
            return Err(Error::InvalidMaterial(
                format!("Poisson's ratio {} is outside (-1, 0.5)", poissons_ratio),
            ));
        }
        Ok(Self {
            youngs_modulus,
            poissons_ratio,
        })
    }

    /// Structural steel (E = 200 GPa, ν = 0.3).
    pub fn steel() -> Self {
        Self {
            youngs_modulus: 200e9,
            poissons_ratio: 0.3,
        }
    }

    /// G = E / 2(1 + ν).
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// K = E / 3(1 − 2ν).
    pub fn bulk_modulus(&self) -> f64 {
        self.youngs_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// λ = Eν / (1 + ν)(1 − 2ν).
    pub fn lame_lambda(&self) -> f64 {
        let e = self.youngs_modulus;
        let nu = self.poissons_ratio;
        e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu))
    }

    /// μ, equal to the shear modulus.
    pub fn lame_mu(&self) -> f64 {
        self.shear_modulus()
    }

    /// Order-4 constitutive tensor as a 9×9 matrix.
    ///
    /// Rows and columns index the gradient component `3·i + j` = ∂u_i/∂x_j,
    /// so that σ = C · vec(∇u) with both shear halves carried explicitly.
    pub fn constitutive_tensor(&self) -> AttributeValue {
        let l = self.lame_lambda();
        let m = self.lame_mu();
        let d = 2.0 * m + l;

        AttributeValue::from_row_slice(
            9,
            9,
            &[
                d, 0.0, 0.0, 0.0, l, 0.0, 0.0, 0.0, l,
                0.0, m, 0.0, m, 0.0, 0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, m, 0.0, 0.0, 0.0, m, 0.0, 0.0,
                0.0, m, 0.0, m, 0.0, 0.0, 0.0, 0.0, 0.0,
                l, 0.0, 0.0, 0.0, d, 0.0, 0.0, 0.0, l,
                0.0, 0.0, 0.0, 0.0, 0.0, m, 0.0, m, 0.0,
                0.0, 0.0, m, 0.0, 0.0, 0.0, m, 0.0, 0.0,
                0.0, 0.0, 0.0, 0.0, 0.0, m, 0.0, m, 0.0,
                l, 0.0, 0.0, 0.0, l, 0.0, 0.0, 0.0, d,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_valid_material() {
        let material = IsotropicMaterial::new(100.0, 0.3).unwrap();
        assert_eq!(material, IsotropicMaterial { youngs_modulus: 100.0, poissons_ratio: 0.3 });
    }

    #[test]
    fn test_non_positive_modulus_is_rejected() {
        for e in [-1.0, 0.0] {
            assert!(matches!(IsotropicMaterial::new(e, 0.3), Err(Error::InvalidMaterial(_))));
        }
    }

    #[test]
    fn test_ratio_out_of_range_is_rejected() {
        for nu in [-1.0, 0.5, 0.6] {
            assert!(IsotropicMaterial::new(480.0, nu).is_err());
        }
    }

    #[test]
    fn test_shear_and_bulk_modulus() {
        let mat = IsotropicMaterial::steel();
        assert_relative_eq!(mat.shear_modulus(), 200e9 / 2.6, epsilon = 1e-6);
        assert_relative_eq!(mat.bulk_modulus(), 200e9 / 1.2, epsilon = 1e-3);
    }

    #[test]
    fn test_constitutive_tensor_symmetry() {
        let c = IsotropicMaterial::steel().constitutive_tensor();
        assert_eq!(c.shape(), (9, 9));
        for i in 0..9 {
            for j in 0..9 {
                assert_relative_eq!(c[(i, j)], c[(j, i)], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_constitutive_tensor_values() {
        // E = 100, ν = 0.25 gives λ = μ = 40
        let c = IsotropicMaterial::new(100.0, 0.25).unwrap().constitutive_tensor();
        assert_relative_eq!(c[(0, 0)], 120.0, epsilon = 1e-12);
        assert_relative_eq!(c[(0, 4)], 40.0, epsilon = 1e-12);
        assert_relative_eq!(c[(1, 1)], 40.0, epsilon = 1e-12);
        assert_relative_eq!(c[(1, 3)], 40.0, epsilon = 1e-12);
        assert_relative_eq!(c[(5, 7)], 40.0, epsilon = 1e-12);
        assert_relative_eq!(c[(0, 1)], 0.0);
    }

    #[test]
    fn test_uniaxial_strain_stress() {
        // ε_xx = 1e-3 only: σ_xx = (λ + 2μ)ε, σ_yy = σ_zz = λε
        let mat = IsotropicMaterial::new(210.0, 0.3).unwrap();
        let c = mat.constitutive_tensor();
        let mut grad = nalgebra::DVector::zeros(9);
        grad[0] = 1e-3;
        let sigma = c * grad;
        let l = mat.lame_lambda();
        let m = mat.lame_mu();
        assert_relative_eq!(sigma[0], (l + 2.0 * m) * 1e-3, epsilon = 1e-12);
        assert_relative_eq!(sigma[4], l * 1e-3, epsilon = 1e-12);
        assert_relative_eq!(sigma[8], l * 1e-3, epsilon = 1e-12);
        assert_relative_eq!(sigma[1], 0.0);
    }
}
