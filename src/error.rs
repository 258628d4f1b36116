//! Error types for femkit operations.

use thiserror::Error;

/// Result type alias using the femkit Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building meshes, assembling or solving.
#[derive(Error, Debug)]
pub enum Error {
    /// Element-related errors (node count, degenerate geometry, kernel shapes).
    #[error("element error: {0}")]
    Element(String),

    /// Mesh-related errors.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Attribute value does not match the shape implied by its order.
    #[error("attribute error: {0}")]
    Attribute(String),

    /// Unsupported quadrature configuration.
    #[error("integration error: {0}")]
    Integration(String),

    /// Assembly errors.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// Solver errors.
    #[error("solver error: {0}")]
    Solver(String),

    /// Matrix singularity or conditioning issues.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// Invalid material properties.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Cell kind with no element counterpart.
    #[error("unsupported element: {0}")]
    UnsupportedElement(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
