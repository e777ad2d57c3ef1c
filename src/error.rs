use thiserror::Error;

/// Fatal error kinds. Poisson non-convergence is deliberately not here: the
/// driver logs it and continues, aborting only if a later state check fails.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("decomposition mismatch: {iproc} x {jproc} subdomains requested, {size} processes available")]
    DecompositionMismatch {
        iproc: usize,
        jproc: usize,
        size: usize,
    },

    #[error("non-finite {field} at cell ({i}, {j}) in step {step}")]
    NonFiniteState {
        field: &'static str,
        i: usize,
        j: usize,
        step: usize,
    },

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;
