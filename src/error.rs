//! Error types of the conflation engine.

use std::fmt;

use thiserror::Error;

/// Which of the two input datasets an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetRole {
    Primary,
    Secondary,
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetRole::Primary => write!(f, "primary"),
            DatasetRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// Fatal errors that abort a conflation run before any scoring happens.
#[derive(Debug, Error)]
pub enum ConflateError {
    #[error("the {0} dataset has no features")]
    EmptyDataset(DatasetRole),

    #[error("could not create planar projection: {0}")]
    Projection(#[from] proj::ProjCreateError),

    #[error("could not build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors for a single geometry or a single candidate pair. These never abort a run, the
/// offending pair is skipped.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("comparing {primary} with {secondary} is not supported")]
    Unsupported {
        primary: &'static str,
        secondary: &'static str,
    },

    #[error("geometry has no usable coordinates")]
    Degenerate,

    #[error("could not project geometry: {0}")]
    Projection(#[from] proj::ProjError),
}

pub type GeometryResult<T> = Result<T, GeometryError>;
