//! Scalar reaction-diffusion with logistic growth.
//!
//! Semi-implicit Euler step for ∂u/∂t = ∇·(D∇u) + r·u(1 − u):
//!
//! (M + Δt·D)·u⁺ = M·u + Δt·(R·u − ∫ Nᵗ r (Nu)²)
//!
//! M = ∫ NᵗN, D = ∫ BᵗCB with C the diffusion tensor and R = ∫ Nᵗ r N with r
//! the proliferation rate.

use super::{gather_node_field, snapshot_name, store_node_field, DynamicProblem};
use crate::assembly::{assemble_matrix, assemble_vector, MatrixKernel, VectorKernel};
use crate::attribute::AttributeId;
use crate::boundary::BoundaryConditions;
use crate::element::NodalField;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::sparse::{linear_combination, spmv, CsrMatrix};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Attribute names and the logistic term evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionDiffusionConfig {
    /// Element diffusion tensor (order 2).
    pub diffusion: String,
    /// Element proliferation rate (order 0).
    pub proliferation: String,
    /// Node initial density (order 0).
    pub input: String,
    /// Node final density (order 0).
    pub output: String,
    /// Approximate ∫ Nᵗ r (Nu)² by R·(u⊙u).
    pub use_speed_hack: bool,
}

impl Default for ReactionDiffusionConfig {
    fn default() -> Self {
        Self {
            diffusion: "Diffusion Tensor".into(),
            proliferation: "Proliferation Rate".into(),
            input: "Initial Cell Density".into(),
            output: "Final Cell Density".into(),
            use_speed_hack: false,
        }
    }
}

/// Mass, diffusion and reaction matrices.
#[derive(Debug, Clone)]
pub struct ReactionOperators {
    pub mass: CsrMatrix,
    pub diffusion: CsrMatrix,
    pub reaction: CsrMatrix,
    pub(crate) rate: Option<AttributeId>,
}

impl ReactionOperators {
    pub(crate) fn assemble(mesh: &Mesh, diffusion: &str, proliferation: &str) -> Result<Self> {
        let mass = assemble_matrix(mesh, 0, MatrixKernel::NtN)?;
        log::debug!("M matrix assembled");
        let c = mesh.element_attribute_id_or_warn(diffusion, 2);
        let diffusion = assemble_matrix(mesh, 0, MatrixKernel::BtCB(c))?;
        log::debug!("D matrix assembled");
        let rate = mesh.element_attribute_id_or_warn(proliferation, 0);
        let reaction = assemble_matrix(mesh, 0, MatrixKernel::NtCN(rate))?;
        log::debug!("R matrix assembled");
        Ok(Self {
            mass,
            diffusion,
            reaction,
            rate,
        })
    }

    /// ∫ Nᵗ r (Nu)².
    pub(crate) fn logistic_term(&self, mesh: &Mesh, u: &DVector<f64>) -> Result<DVector<f64>> {
        assemble_vector(mesh, 0, VectorKernel::NtCNQNQ(self.rate, NodalField::Values(u)))
    }
}

/// Reaction-diffusion problem for [`DynamicSolver`](super::DynamicSolver).
#[derive(Debug, Clone, Default)]
pub struct ReactionDiffusion {
    config: ReactionDiffusionConfig,
    essential: BoundaryConditions,
}

impl ReactionDiffusion {
    pub fn new(config: ReactionDiffusionConfig) -> Self {
        Self {
            config,
            essential: BoundaryConditions::new(0),
        }
    }

    /// Prescribed densities.
    pub fn with_essential_conditions(mut self, conditions: BoundaryConditions) -> Self {
        self.essential = conditions;
        self
    }

    pub fn config(&self) -> &ReactionDiffusionConfig {
        &self.config
    }
}

impl DynamicProblem for ReactionDiffusion {
    type Operators = ReactionOperators;

    fn assemble_operators(&self, mesh: &Mesh, _time_step: f64) -> Result<ReactionOperators> {
        ReactionOperators::assemble(mesh, &self.config.diffusion, &self.config.proliferation)
    }

    fn system_matrix(&self, operators: &ReactionOperators, time_step: f64) -> Result<CsrMatrix> {
        linear_combination(1.0, &operators.mass, time_step, &operators.diffusion)
    }

    fn initial_state(&self, mesh: &Mesh) -> Result<Vec<DVector<f64>>> {
        Ok(vec![gather_node_field(mesh, &self.config.input, 0)])
    }

    fn system_vectors(
        &self,
        mesh: &Mesh,
        operators: &ReactionOperators,
        state: &[DVector<f64>],
        time_step: f64,
    ) -> Result<Vec<DVector<f64>>> {
        let u = &state[0];
        let ru = spmv(&operators.reaction, u);
        let ru2 = if self.config.use_speed_hack {
            spmv(&operators.reaction, &u.component_mul(u))
        } else {
            operators.logistic_term(mesh, u)?
        };
        let f = spmv(&operators.mass, u) + (ru - ru2) * time_step;
        Ok(vec![f])
    }

    fn essential_conditions(&self) -> &BoundaryConditions {
        &self.essential
    }

    fn intermediate_process(&self, mesh: &mut Mesh, state: &[DVector<f64>], time: f64) -> Result<()> {
        store_node_field(mesh, &snapshot_name(&self.config.output, time), 0, &state[0])?;
        Ok(())
    }

    fn post_process(&self, mesh: &mut Mesh, state: &[DVector<f64>]) -> Result<()> {
        let output = &self.config.output;
        store_node_field(mesh, output, 0, &state[0])?;
        mesh.compute_node_bq(0, output, &format!("{} Gradient", output))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::fixtures::cube_mesh;
    use crate::solve::{DynamicConfig, DynamicSolver};
    use crate::types::AttributeValue;
    use approx::assert_abs_diff_eq;

    fn seeded_cube(initial: f64) -> Mesh {
        let mut mesh = cube_mesh();
        mesh.set_element_attribute_from_values("Diffusion Tensor", 2, &(AttributeValue::identity(3, 3) * 0.1))
            .unwrap();
        mesh.set_element_attribute_from_values("Proliferation Rate", 0, &AttributeValue::from_element(1, 1, 0.5))
            .unwrap();
        mesh.set_node_attribute_from_values("Initial Cell Density", 0, &AttributeValue::from_element(1, 1, initial))
            .unwrap();
        mesh
    }

    fn short_run(iterations: usize) -> DynamicConfig {
        DynamicConfig {
            iterations,
            time_step: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_uniform_density_follows_logistic_growth() {
        // A uniform field does not diffuse; each step is the explicit
        // logistic update u⁺ = u + Δt·r·u(1 − u)
        for use_speed_hack in [false, true] {
            let mut mesh = seeded_cube(0.2);
            let problem = ReactionDiffusion::new(ReactionDiffusionConfig {
                use_speed_hack,
                ..Default::default()
            });
            DynamicSolver::with_config(problem, short_run(3))
                .solve(&mut mesh)
                .unwrap();

            let mut expected = 0.2;
            for _ in 0..3 {
                expected += 0.1 * 0.5 * expected * (1.0 - expected);
            }
            let u = mesh.node_attribute_values("Final Cell Density", 0);
            for n in 0..8 {
                assert_abs_diff_eq!(u[(n, 0)], expected, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_saturated_density_is_steady() {
        let mut mesh = seeded_cube(1.0);
        DynamicSolver::with_config(ReactionDiffusion::default(), short_run(5))
            .solve(&mut mesh)
            .unwrap();
        let u = mesh.node_attribute_values("Final Cell Density", 0);
        assert_abs_diff_eq!(u.amax(), 1.0, epsilon = 1e-8);
        let gradient = mesh.node_attribute_values("Final Cell Density Gradient", 1);
        assert_abs_diff_eq!(gradient.amax(), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_intermediate_snapshots_and_cutoff() {
        let mut mesh = seeded_cube(0.0);
        let seed = AttributeValue::from_column_slice(8, 1, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        mesh.set_node_attribute_from_values("Initial Cell Density", 0, &seed)
            .unwrap();

        let mut config = short_run(4);
        config.intermediate_iterations = [1, 3].into_iter().collect();
        config.lower_cutoff = Some(0.0);
        config.upper_cutoff = Some(1.0);
        DynamicSolver::with_config(ReactionDiffusion::default(), config)
            .solve(&mut mesh)
            .unwrap();

        assert!(mesh.node_attribute_id("Final Cell Density (0.10)", 0).is_some());
        assert!(mesh.node_attribute_id("Final Cell Density (0.30)", 0).is_some());
        assert!(mesh.node_attribute_id("Final Cell Density (0.20)", 0).is_none());

        let u = mesh.node_attribute_values("Final Cell Density", 0);
        assert!(u.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Diffusion spreads the seed
        assert!(u.iter().skip(1).any(|&v| v > 0.0));
        assert!(u[(0, 0)] < 1.0);
    }

    #[test]
    fn test_prescribed_density_is_held() {
        let mut mesh = seeded_cube(0.3);
        let mut ebc = BoundaryConditions::new(0);
        ebc.set_dof_value(2, 0, 0.9).unwrap();
        let problem = ReactionDiffusion::default().with_essential_conditions(ebc);
        DynamicSolver::with_config(problem, short_run(2))
            .solve(&mut mesh)
            .unwrap();
        let u = mesh.node_attribute_values("Final Cell Density", 0);
        assert_abs_diff_eq!(u[(2, 0)], 0.9, epsilon = 1e-12);
    }
}
