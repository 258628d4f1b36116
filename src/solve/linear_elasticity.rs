//! Static linear elasticity.
//!
//! K = ∫ BᵗCB with C the element stiffness tensor, f = ∫ NᵗN·b plus the
//! natural boundary loads, b being the nodal body force.

use super::{store_node_field, StaticProblem};
use crate::assembly::{assemble_matrix, assemble_vector, nbc_vector, MatrixKernel, VectorKernel};
use crate::boundary::BoundaryConditions;
use crate::element::NodalField;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::sparse::CsrMatrix;
use crate::types::{AttributeValue, StressTensor};
use nalgebra::{DVector, Matrix3};
use serde::{Deserialize, Serialize};

/// Attribute names and post-processing switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearElasticityConfig {
    /// Element constitutive tensor (order 4).
    pub stiffness: String,
    /// Node body force (order 1).
    pub body_force: String,
    /// Output node displacements (order 1).
    pub displacements: String,
    /// Output node stress (order 2).
    pub stress: String,
    /// Output node von Mises stress (order 0).
    pub von_mises: String,
    /// Recover nodal stresses after the solve.
    pub compute_stress: bool,
    /// Move nodes by the computed displacement.
    pub update_coordinates: bool,
}

impl Default for LinearElasticityConfig {
    fn default() -> Self {
        Self {
            stiffness: "Stiffness Tensor".into(),
            body_force: "Body Force".into(),
            displacements: "Displacements".into(),
            stress: "Stress".into(),
            von_mises: "Von Mises Stress".into(),
            compute_stress: true,
            update_coordinates: true,
        }
    }
}

/// Linear elasticity problem.
#[derive(Debug, Clone)]
pub struct LinearElasticity {
    config: LinearElasticityConfig,
    essential: BoundaryConditions,
    natural: BoundaryConditions,
}

impl Default for LinearElasticity {
    fn default() -> Self {
        Self::new(LinearElasticityConfig::default())
    }
}

impl LinearElasticity {
    pub fn new(config: LinearElasticityConfig) -> Self {
        Self {
            config,
            essential: BoundaryConditions::new(1),
            natural: BoundaryConditions::new(1),
        }
    }

    /// Prescribed displacements.
    pub fn with_essential_conditions(mut self, conditions: BoundaryConditions) -> Self {
        self.essential = conditions;
        self
    }

    /// Prescribed nodal loads.
    pub fn with_natural_conditions(mut self, conditions: BoundaryConditions) -> Self {
        self.natural = conditions;
        self
    }

    pub fn config(&self) -> &LinearElasticityConfig {
        &self.config
    }

    pub fn natural_conditions(&self) -> &BoundaryConditions {
        &self.natural
    }

    fn store_von_mises(&self, mesh: &mut Mesh) -> Result<()> {
        let stress = mesh.node_attribute_values(&self.config.stress, 2);
        let values = DVector::from_fn(mesh.n_nodes(), |n, _| {
            let block: Matrix3<f64> = stress.fixed_view::<3, 3>(3 * n, 0).into_owned();
            StressTensor::new(block).von_mises()
        });
        let values = AttributeValue::from_column_slice(values.len(), 1, values.as_slice());
        mesh.set_node_attribute_from_values(&self.config.von_mises, 0, &values)?;
        Ok(())
    }
}

impl StaticProblem for LinearElasticity {
    fn system_matrix(&self, mesh: &Mesh) -> Result<CsrMatrix> {
        let c = mesh.element_attribute_id_or_warn(&self.config.stiffness, 4);
        assemble_matrix(mesh, 1, MatrixKernel::BtCB(c))
    }

    fn system_vector(&self, mesh: &Mesh) -> Result<DVector<f64>> {
        let body_force = NodalField::Attribute(mesh.node_attribute_id(&self.config.body_force, 1));
        let fb = assemble_vector(mesh, 1, VectorKernel::NtNQ(body_force))?;
        let fs = nbc_vector(mesh, &self.natural)?;
        Ok(fb + fs)
    }

    fn essential_conditions(&self) -> &BoundaryConditions {
        &self.essential
    }

    fn post_process(&self, mesh: &mut Mesh, solution: &DVector<f64>) -> Result<()> {
        store_node_field(mesh, &self.config.displacements, 1, solution)?;

        if self.config.compute_stress {
            mesh.compute_node_cbq(1, &self.config.stiffness, &self.config.displacements, &self.config.stress)?;
            self.store_von_mises(mesh)?;
        }

        if self.config.update_coordinates {
            mesh.displace_nodes(&self.config.displacements)?;
        }
        Ok(())
    }
}
