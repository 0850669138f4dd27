use thiserror::Error;

/// Central error type for the stem-master-core crate.
#[derive(Debug, Error)]
pub enum MasterError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Mastering chain
    #[error("Invalid filter parameter: {0}")]
    InvalidFilterParameter(String),

    #[error("Mastering failed for {stem}: {reason}")]
    MasteringFailed { stem: String, reason: String },

    // Separation adapter
    #[error("Separation failed: {0}")]
    SeparationFailed(String),

    #[error("Separation output missing under {0}")]
    SeparationOutputMissing(String),

    #[error("Stem not found: {0}")]
    StemNotFound(String),

    // Job lifecycle
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job id `{0}`: expected non-empty [A-Za-z0-9_-]")]
    InvalidJobId(String),

    #[error("Job already exists: {0}")]
    JobExists(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Job store error: {0}")]
    Store(String),
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for MasterError {
    fn from(e: std::io::Error) -> Self {
        MasterError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for MasterError {
    fn from(e: serde_json::Error) -> Self {
        MasterError::Anyhow(e.into())
    }
}

impl From<hound::Error> for MasterError {
    fn from(e: hound::Error) -> Self {
        MasterError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for MasterError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        MasterError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, MasterError>;
