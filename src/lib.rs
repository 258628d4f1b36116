//! femkit - finite element toolkit for tensor-valued fields
//!
//! Finite element engine for 3D tetrahedral and hexahedral meshes with:
//! - Named, tensor-valued attributes on nodes and elements
//! - Parallel assembly of B/N kernels using Rayon
//! - Essential boundary conditions by elimination
//! - Conjugate gradient and sparse Cholesky linear solvers
//! - Static and time-stepping problem drivers
//!
//! # Architecture
//!
//! The engine is built around these core abstractions:
//!
//! - [`Mesh`]: Nodes, elements, attribute registries and quadrature rules
//! - [`Element`]: Shape functions and integrated element kernels
//! - [`assembly`]: Global matrices and vectors, EBC elimination
//! - [`LinearSolver`] trait: Linear system solution strategies
//! - [`solve`]: Elasticity and reaction-diffusion problem drivers
//!
//! # Example
//!
//! ```no_run
//! use femkit::generate::GridSource;
//! use femkit::solve::{DynamicConfig, DynamicSolver, ReactionDiffusion};
//!
//! let mut mesh = GridSource::default().generate()?;
//! let config = DynamicConfig { iterations: 10, ..Default::default() };
//! DynamicSolver::with_config(ReactionDiffusion::default(), config).solve(&mut mesh)?;
//! # Ok::<(), femkit::Error>(())
//! ```

pub mod types;
pub mod attribute;
pub mod node;
pub mod element;
pub mod mesh;
pub mod material;
pub mod boundary;
pub mod sparse;
pub mod assembly;
pub mod solver;
pub mod solve;
pub mod generate;
pub mod filter;
pub mod grid;
pub mod error;

pub use types::{AttributeValue, Point3, StressTensor};
pub use attribute::AttributeId;
pub use node::Node;
pub use element::{Element, ElementType, IntegrationRule, IntegrationRules};
pub use mesh::Mesh;
pub use material::IsotropicMaterial;
pub use boundary::BoundaryConditions;
pub use sparse::CsrMatrix;
pub use solver::{LinearSolver, LinearSolverConfig, SolveStats};
pub use filter::ThresholdFilter;
pub use grid::UnstructuredGrid;
pub use error::{Error, Result};
