//! Two competing populations sharing one carrying capacity.
//!
//! Both densities u₁, u₂ see the total t = u₁ + u₂ through diffusion and the
//! logistic term. With K = M for both populations:
//!
//! M·u⁺ₖ = M·uₖ − dₖ·Δt·D·t + pₖ·Δt·(R·uₖ − ∫ Nᵗ r (Nuₖ)(Nt))
//!
//! Each population is solved separately, warm-started from its own state.

use super::reaction_diffusion::ReactionOperators;
use super::{gather_node_field, snapshot_name, store_node_field, DynamicProblem};
use crate::boundary::BoundaryConditions;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::sparse::{spmv, CsrMatrix};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Scale factors of one population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationFactors {
    pub diffusion: f64,
    pub proliferation: f64,
}

/// Attribute names, population factors and the logistic term evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoPopulationConfig {
    /// Element diffusion tensor (order 2).
    pub diffusion: String,
    /// Element proliferation rate (order 0).
    pub proliferation: String,
    /// Node initial densities (order 0).
    pub inputs: [String; 2],
    /// Node final densities (order 0).
    pub outputs: [String; 2],
    /// Node final total density (order 0).
    pub total: String,
    pub factors: [PopulationFactors; 2],
    /// Approximate ∫ Nᵗ r (Nuₖ)(Nt) by R·(uₖ⊙t).
    pub use_speed_hack: bool,
}

impl Default for TwoPopulationConfig {
    fn default() -> Self {
        Self {
            diffusion: "Diffusion Tensor".into(),
            proliferation: "Proliferation Rate".into(),
            inputs: ["Initial Cell Density 1".into(), "Initial Cell Density 2".into()],
            outputs: ["Final Cell Density 1".into(), "Final Cell Density 2".into()],
            total: "Final Cell Density Tot".into(),
            factors: [
                PopulationFactors {
                    diffusion: 1.0,
                    proliferation: 1.5,
                },
                PopulationFactors {
                    diffusion: 2.0,
                    proliferation: 1.0,
                },
            ],
            use_speed_hack: true,
        }
    }
}

/// Two-population problem for [`DynamicSolver`](super::DynamicSolver).
#[derive(Debug, Clone, Default)]
pub struct TwoPopulationReactionDiffusion {
    config: TwoPopulationConfig,
    essential: BoundaryConditions,
}

impl TwoPopulationReactionDiffusion {
    pub fn new(config: TwoPopulationConfig) -> Self {
        Self {
            config,
            essential: BoundaryConditions::new(0),
        }
    }

    /// Prescribed densities, applied to both populations.
    pub fn with_essential_conditions(mut self, conditions: BoundaryConditions) -> Self {
        self.essential = conditions;
        self
    }

    pub fn config(&self) -> &TwoPopulationConfig {
        &self.config
    }

    /// ∫ Nᵗ r (Nu)(Nt) from squares: ab = ((a + b)² − a² − b²) / 2.
    fn mixed_logistic_term(
        &self,
        mesh: &Mesh,
        operators: &ReactionOperators,
        u: &DVector<f64>,
        t: &DVector<f64>,
        t_squared: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let sum = operators.logistic_term(mesh, &(u + t))?;
        let u_squared = operators.logistic_term(mesh, u)?;
        Ok((sum - u_squared - t_squared) * 0.5)
    }
}

impl DynamicProblem for TwoPopulationReactionDiffusion {
    type Operators = ReactionOperators;

    fn assemble_operators(&self, mesh: &Mesh, _time_step: f64) -> Result<ReactionOperators> {
        ReactionOperators::assemble(mesh, &self.config.diffusion, &self.config.proliferation)
    }

    fn system_matrix(&self, operators: &ReactionOperators, _time_step: f64) -> Result<CsrMatrix> {
        Ok(operators.mass.clone())
    }

    fn initial_state(&self, mesh: &Mesh) -> Result<Vec<DVector<f64>>> {
        Ok(self
            .config
            .inputs
            .iter()
            .map(|name| gather_node_field(mesh, name, 0))
            .collect())
    }

    fn system_vectors(
        &self,
        mesh: &Mesh,
        operators: &ReactionOperators,
        state: &[DVector<f64>],
        time_step: f64,
    ) -> Result<Vec<DVector<f64>>> {
        let t = &state[0] + &state[1];
        let dt_total = spmv(&operators.diffusion, &t);
        let t_squared = if self.config.use_speed_hack {
            None
        } else {
            Some(operators.logistic_term(mesh, &t)?)
        };

        state
            .iter()
            .zip(&self.config.factors)
            .map(|(u, factors)| -> Result<DVector<f64>> {
                let nonlinear = match &t_squared {
                    None => spmv(&operators.reaction, &u.component_mul(&t)),
                    Some(t_squared) => self.mixed_logistic_term(mesh, operators, u, &t, t_squared)?,
                };
                let growth = spmv(&operators.reaction, u) - nonlinear;
                Ok(spmv(&operators.mass, u) - &dt_total * (factors.diffusion * time_step)
                    + growth * (factors.proliferation * time_step))
            })
            .collect()
    }

    fn essential_conditions(&self) -> &BoundaryConditions {
        &self.essential
    }

    fn intermediate_process(&self, mesh: &mut Mesh, state: &[DVector<f64>], time: f64) -> Result<()> {
        for (name, u) in self.config.outputs.iter().zip(state) {
            store_node_field(mesh, &snapshot_name(name, time), 0, u)?;
        }
        Ok(())
    }

    fn post_process(&self, mesh: &mut Mesh, state: &[DVector<f64>]) -> Result<()> {
        for (name, u) in self.config.outputs.iter().zip(state) {
            store_node_field(mesh, name, 0, u)?;
            mesh.compute_node_bq(0, name, &format!("{} Gradient", name))?;
        }
        let total = &state[0] + &state[1];
        store_node_field(mesh, &self.config.total, 0, &total)?;
        Ok(())
    }
}
