//! Problem drivers.
//!
//! A problem describes *what* to assemble and where to store results; the
//! drivers own the solution procedure:
//!
//! - [`StaticSolver`] assembles K and f once, eliminates essential
//!   conditions and solves K·q = f.
//! - [`DynamicSolver`] assembles the time-invariant operators once, then
//!   steps K·u⁺ = f(u), warm-starting each linear solve from the previous
//!   state.

pub mod inverse_elasticity;
pub mod linear_elasticity;
pub mod reaction_diffusion;
pub mod two_population;

pub use inverse_elasticity::InverseElasticity;
pub use linear_elasticity::{LinearElasticity, LinearElasticityConfig};
pub use reaction_diffusion::{ReactionDiffusion, ReactionDiffusionConfig};
pub use two_population::{PopulationFactors, TwoPopulationConfig, TwoPopulationReactionDiffusion};

use crate::assembly::{apply_ebc, apply_ebc_to_matrix, apply_ebc_to_vector};
use crate::attribute::AttributeId;
use crate::boundary::BoundaryConditions;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::solver::{LinearSolverConfig, SolveStats};
use crate::sparse::{density, CsrMatrix};
use crate::types::AttributeValue;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Node attribute of order 0 or 1 as a global DOF vector.
pub(crate) fn gather_node_field(mesh: &Mesh, name: &str, order: usize) -> DVector<f64> {
    let values = mesh.node_attribute_values(name, order);
    DVector::from_column_slice(values.as_slice())
}

/// Store a global DOF vector as a node attribute of order 0 or 1.
pub(crate) fn store_node_field(mesh: &mut Mesh, name: &str, order: usize, values: &DVector<f64>) -> Result<AttributeId> {
    let values = AttributeValue::from_column_slice(values.len(), 1, values.as_slice());
    mesh.set_node_attribute_from_values(name, order, &values)
}

/// Attribute name of a snapshot taken at `time`.
pub(crate) fn snapshot_name(name: &str, time: f64) -> String {
    format!("{} ({:.2})", name, time)
}

/// Static problem K·q = f.
pub trait StaticProblem {
    /// Global system matrix K.
    fn system_matrix(&self, mesh: &Mesh) -> Result<CsrMatrix>;

    /// Global system vector f.
    fn system_vector(&self, mesh: &Mesh) -> Result<DVector<f64>>;

    /// Prescribed DOF values.
    fn essential_conditions(&self) -> &BoundaryConditions;

    /// Store the solution in the mesh.
    fn post_process(&self, mesh: &mut Mesh, solution: &DVector<f64>) -> Result<()>;
}

/// Driver for [`StaticProblem`]s.
#[derive(Debug, Clone)]
pub struct StaticSolver<P> {
    problem: P,
    linear: LinearSolverConfig,
}

impl<P: StaticProblem> StaticSolver<P> {
    pub fn new(problem: P) -> Self {
        Self {
            problem,
            linear: LinearSolverConfig::default(),
        }
    }

    /// Use another linear solver.
    pub fn with_linear_solver(mut self, linear: LinearSolverConfig) -> Self {
        self.linear = linear;
        self
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    /// Assemble, solve and post-process.
    pub fn solve(&self, mesh: &mut Mesh) -> Result<SolveStats> {
        let k = self.problem.system_matrix(mesh)?;
        let mut f = self.problem.system_vector(mesh)?;
        log::info!("System has {} degrees of freedom", f.len());
        log::info!("System matrix density is {:.3e}", density(&k));

        let k = apply_ebc(&k, &mut f, self.problem.essential_conditions())?;

        let solver = self.linear.build();
        let (q, stats) = solver.solve(&k, &f, None)?;
        log::info!(
            "System solved with {} ({} iterations, error: {:e})",
            solver.name(),
            stats.iterations,
            stats.residual
        );
        if !stats.converged {
            log::warn!("Linear solve did not reach the requested tolerance");
        }

        self.problem.post_process(mesh, &q)?;
        log::info!("Post processing done");
        Ok(stats)
    }
}

/// Time-stepping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    /// Number of time steps.
    pub iterations: usize,
    /// Step size Δt.
    pub time_step: f64,
    /// Values below are raised to this after every step.
    pub lower_cutoff: Option<f64>,
    /// Values above are lowered to this after every step.
    pub upper_cutoff: Option<f64>,
    /// Steps (0-based) after which the state is snapshotted into the mesh.
    pub intermediate_iterations: BTreeSet<usize>,
    /// Linear solver used at every step.
    pub linear: LinearSolverConfig,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            time_step: 1.0,
            lower_cutoff: None,
            upper_cutoff: None,
            intermediate_iterations: BTreeSet::new(),
            linear: LinearSolverConfig::default(),
        }
    }
}

impl DynamicConfig {
    fn clamp(&self, u: &mut DVector<f64>) {
        if let Some(lower) = self.lower_cutoff {
            u.apply(|v| *v = v.max(lower));
        }
        if let Some(upper) = self.upper_cutoff {
            u.apply(|v| *v = v.min(upper));
        }
    }
}

/// Time-dependent problem K·u⁺ = f(u) over one or more coupled fields
/// sharing the same system matrix.
pub trait DynamicProblem {
    /// Time-invariant operators, assembled once per solve.
    type Operators;

    fn assemble_operators(&self, mesh: &Mesh, time_step: f64) -> Result<Self::Operators>;

    /// System matrix K, before elimination.
    fn system_matrix(&self, operators: &Self::Operators, time_step: f64) -> Result<CsrMatrix>;

    /// Initial state of every field.
    fn initial_state(&self, mesh: &Mesh) -> Result<Vec<DVector<f64>>>;

    /// Right-hand side of every field for the current state.
    fn system_vectors(
        &self,
        mesh: &Mesh,
        operators: &Self::Operators,
        state: &[DVector<f64>],
        time_step: f64,
    ) -> Result<Vec<DVector<f64>>>;

    /// Prescribed DOF values, applied to every field.
    fn essential_conditions(&self) -> &BoundaryConditions;

    /// Snapshot the state at `time`.
    fn intermediate_process(&self, mesh: &mut Mesh, state: &[DVector<f64>], time: f64) -> Result<()>;

    /// Store the final state in the mesh.
    fn post_process(&self, mesh: &mut Mesh, state: &[DVector<f64>]) -> Result<()>;
}

/// Driver for [`DynamicProblem`]s.
#[derive(Debug, Clone)]
pub struct DynamicSolver<P> {
    problem: P,
    config: DynamicConfig,
}

impl<P: DynamicProblem> DynamicSolver<P> {
    pub fn new(problem: P) -> Self {
        Self::with_config(problem, DynamicConfig::default())
    }

    pub fn with_config(problem: P, config: DynamicConfig) -> Self {
        Self { problem, config }
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    pub fn config(&self) -> &DynamicConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DynamicConfig {
        &mut self.config
    }

    /// Step through time and post-process the final state.
    ///
    /// The returned statistics sum the linear iterations of every step and
    /// keep the worst residual.
    pub fn solve(&self, mesh: &mut Mesh) -> Result<SolveStats> {
        let dt = self.config.time_step;
        let ebc = self.problem.essential_conditions();

        let operators = self.problem.assemble_operators(mesh, dt)?;
        let matrix = self.problem.system_matrix(&operators, dt)?;
        let k = apply_ebc_to_matrix(&matrix, ebc)?;
        log::info!("System has {} degrees of freedom", k.nrows());
        log::info!("System matrix density is {:.3e}", density(&matrix));

        let mut solver = self.config.linear.build();
        solver.prepare(&k)?;

        let mut state = self.problem.initial_state(mesh)?;
        if let Some(u) = state.iter().find(|u| u.len() != k.nrows()) {
            return Err(Error::Solver(format!(
                "initial state has {} entries, system has {} DOFs",
                u.len(),
                k.nrows()
            )));
        }

        let mut total = SolveStats {
            iterations: 0,
            residual: 0.0,
            converged: true,
        };

        for i in 0..self.config.iterations {
            let rhs = self.problem.system_vectors(mesh, &operators, &state, dt)?;
            if rhs.len() != state.len() {
                return Err(Error::Solver(format!(
                    "{} right-hand sides for {} fields",
                    rhs.len(),
                    state.len()
                )));
            }

            let mut step = SolveStats {
                iterations: 0,
                residual: 0.0,
                converged: true,
            };
            for (u, mut f) in state.iter_mut().zip(rhs) {
                apply_ebc_to_vector(&matrix, &mut f, ebc)?;
                let (next, stats) = solver.solve(&k, &f, Some(u))?;
                *u = next;
                self.config.clamp(u);

                step.iterations += stats.iterations;
                step.residual = step.residual.max(stats.residual);
                step.converged &= stats.converged;
            }

            log::info!(
                "Iteration {}/{} solved ({} iterations, error: {:e})",
                i + 1,
                self.config.iterations,
                step.iterations,
                step.residual
            );

            total.iterations += step.iterations;
            total.residual = total.residual.max(step.residual);
            total.converged &= step.converged;

            if self.config.intermediate_iterations.contains(&i) {
                self.problem.intermediate_process(mesh, &state, i as f64 * dt)?;
            }
        }

        log::info!("System solved");
        self.problem.post_process(mesh, &state)?;
        log::info!("Post processing done");
        Ok(total)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::boundary::BoundaryConditions;
    use crate::element::{Element, ElementType};
    use crate::mesh::Mesh;
    use crate::node::Node;
    use crate::types::Point3;

    /// Unit cube split into six tetrahedra around the diagonal 0-6.
    pub fn cube_mesh() -> Mesh {
        let coordinates = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 0.0, -1.0),
            (1.0, 0.0, -1.0),
            (0.0, 1.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, -1.0),
            (1.0, 1.0, -1.0),
        ];
        let nodes = coordinates
            .iter()
            .enumerate()
            .map(|(i, &(x, y, z))| Node::new(i, Point3::new(x, y, z)))
            .collect();
        let connectivity = [
            [0, 3, 2, 6],
            [0, 1, 3, 6],
            [0, 4, 1, 6],
            [5, 7, 3, 6],
            [5, 3, 1, 6],
            [5, 1, 4, 6],
        ];
        let elements = connectivity
            .iter()
            .map(|c| Element::new(ElementType::Tet4, c.to_vec()).unwrap())
            .collect();
        Mesh::new(nodes, elements).unwrap()
    }

    /// Supports preventing rigid-body motion of the cube.
    pub fn cube_supports() -> BoundaryConditions {
        let mut ebc = BoundaryConditions::new(1);
        for (node, local) in [
            (0, 0),
            (0, 1),
            (1, 1),
            (2, 0),
            (2, 1),
            (2, 2),
            (3, 1),
            (3, 2),
            (4, 0),
            (6, 0),
            (6, 2),
            (7, 2),
        ] {
            ebc.set_dof_value(node, local, 0.0).unwrap();
        }
        ebc
    }

    /// Downward traction on the top face (z = 0).
    pub fn cube_traction() -> BoundaryConditions {
        let mut nbc = BoundaryConditions::new(1);
        for (node, value) in [(0, -0.1667), (5, -0.1667), (1, -0.3333), (4, -0.3333)] {
            nbc.set_dof_value(node, 2, value).unwrap();
        }
        nbc
    }
}
