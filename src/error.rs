//! Typed errors for the multicomponent FCI library
//!
//! Numerical non-convergence is not an error here: solvers report it through
//! boolean flags on their result values and leave the decision to the caller.

/// Errors raised by string addressing, integral validation and tensor contraction.
#[derive(Debug, thiserror::Error)]
pub enum FciError {
    /// Requested combination the string addressing cannot represent.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Array shape disagrees with the species set or with another operand.
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// A required integral block was not supplied.
    #[error("missing integral block {block} for species {species}")]
    MissingIntegral { species: usize, block: String },

    /// Species index outside the species set, or an invalid index combination.
    #[error("invalid species index {index} for a system of {nspecies} species")]
    InvalidSpecies { index: usize, nspecies: usize },

    /// A bracketed root search was handed an interval without a sign change.
    #[error("root not bracketed: {0}")]
    Bracket(String),

    #[error("ndarray shape error: {0}")]
    Ndarray(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, FciError>;

impl FciError {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        found: impl std::fmt::Debug,
    ) -> Self {
        FciError::ShapeMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }
}
