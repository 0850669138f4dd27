pub mod model;
pub mod processor;
pub mod store;

pub use model::{Job, JobStatus};
pub use processor::JobProcessor;
pub use store::{FsJobStore, InMemoryJobStore, JobStore};

use crate::error::{MasterError, Result};

/// Job ids name directories and files, so they are restricted to
/// `[A-Za-z0-9_-]`.
pub fn validate_job_id(job_id: &str) -> Result<()> {
    let valid = !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MasterError::InvalidJobId(job_id.to_string()))
    }
}
