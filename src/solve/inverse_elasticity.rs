//! Nodal forces from known displacements, f = K·q.

use super::{gather_node_field, store_node_field};
use crate::assembly::{assemble_matrix, MatrixKernel};
use crate::error::Result;
use crate::mesh::Mesh;
use crate::sparse::spmv;
use nalgebra::DVector;

/// Inverse linear elasticity: no linear solve, only K·q.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseElasticity {
    /// Element constitutive tensor (order 4).
    pub stiffness: String,
    /// Input node displacements (order 1).
    pub displacements: String,
    /// Output node forces (order 1); their gradient goes to "<force> Gradient".
    pub force: String,
}

impl Default for InverseElasticity {
    fn default() -> Self {
        Self {
            stiffness: "Stiffness Tensor".into(),
            displacements: "Displacements".into(),
            force: "Force".into(),
        }
    }
}

impl InverseElasticity {
    /// Compute the forces, store them and return them.
    pub fn solve(&self, mesh: &mut Mesh) -> Result<DVector<f64>> {
        let c = mesh.element_attribute_id_or_warn(&self.stiffness, 4);
        let k = assemble_matrix(mesh, 1, MatrixKernel::BtCB(c))?;
        let q = gather_node_field(mesh, &self.displacements, 1);
        let f = spmv(&k, &q);

        store_node_field(mesh, &self.force, 1, &f)?;
        mesh.compute_node_bq(1, &self.force, &format!("{} Gradient", self.force))?;
        log::info!("Forces computed for {} nodes", mesh.n_nodes());
        Ok(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::IsotropicMaterial;
    use crate::solve::fixtures::{cube_mesh, cube_supports, cube_traction};
    use crate::solve::{LinearElasticity, LinearElasticityConfig, StaticSolver};
    use crate::types::{AttributeValue, Point3};
    use approx::assert_abs_diff_eq;

    fn cube_with_stiffness() -> Mesh {
        let mut mesh = cube_mesh();
        let c = IsotropicMaterial::new(100.0, 0.3).unwrap().constitutive_tensor();
        mesh.set_element_attribute_from_values("Stiffness Tensor", 4, &c)
            .unwrap();
        mesh
    }

    #[test]
    fn test_rigid_translation_has_no_force() {
        let mut mesh = cube_with_stiffness();
        let shift = AttributeValue::from_column_slice(3, 1, &[0.1, -0.2, 0.3]);
        mesh.set_node_attribute_from_values("Displacements", 1, &shift)
            .unwrap();

        let f = InverseElasticity::default().solve(&mut mesh).unwrap();

        assert_eq!(f.len(), 24);
        assert_abs_diff_eq!(f.amax(), 0.0, epsilon = 1e-10);
        let gradient = mesh.node_attribute_id("Force Gradient", 2).unwrap();
        assert_eq!(mesh.node(0).unwrap().attribute_value(gradient).shape(), (3, 3));
    }

    #[test]
    fn test_recovers_applied_loads() {
        // Solve forward, then recover the loads on the free DOFs
        let mut mesh = cube_with_stiffness();
        let problem = LinearElasticity::new(LinearElasticityConfig {
            compute_stress: false,
            update_coordinates: false,
            ..Default::default()
        })
        .with_essential_conditions(cube_supports())
        .with_natural_conditions(cube_traction());
        StaticSolver::new(problem).solve(&mut mesh).unwrap();

        let f = InverseElasticity::default().solve(&mut mesh).unwrap();

        let supports = cube_supports();
        let traction = cube_traction();
        for dof in 0..24 {
            if !supports.contains(dof) {
                let expected = traction.get(dof).unwrap_or(0.0);
                assert_abs_diff_eq!(f[dof], expected, epsilon = 1e-6);
            }
        }
        let force = mesh.node_attribute_id("Force", 1).unwrap();
        let at_node_one = mesh.node(1).unwrap().attribute_value(force);
        assert_abs_diff_eq!(at_node_one[(2, 0)], -0.3333, epsilon = 1e-6);
        assert_eq!(mesh.node(1).unwrap().coordinates(), Point3::new(1.0, 0.0, 0.0));
    }
}
