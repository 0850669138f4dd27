use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MasterError, Result};

/// Progress milestones reported by the processor.
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_SEPARATED: u8 = 60;
pub const PROGRESS_VOCALS_MASTERED: u8 = 80;
pub const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, not yet picked up by a worker.
    Queued,
    /// A worker owns the job.
    Running,
    /// Both masters written.
    Done,
    /// Stopped on the first error.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submission and its observable state.
///
/// Fields are public for reading; state changes go through the transition
/// methods, which refuse anything that would break the lifecycle
/// (`queued -> running -> done | failed`, progress never decreasing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocals_master_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumental_master_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            progress: 0,
            error: None,
            vocals_master_url: None,
            instrumental_master_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn invalid(&self, to: &str) -> MasterError {
        MasterError::InvalidTransition {
            job_id: self.job_id.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `queued -> running`, progress 10.
    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(self.invalid("running"));
        }
        self.status = JobStatus::Running;
        self.progress = self.progress.max(PROGRESS_STARTED);
        self.touch();
        Ok(())
    }

    /// Moves a running job's progress forward. Lower values are rejected.
    pub fn advance(&mut self, progress: u8) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(self.invalid(&format!("running@{progress}")));
        }
        if progress < self.progress || progress >= PROGRESS_DONE {
            return Err(self.invalid(&format!("running@{progress}")));
        }
        self.progress = progress;
        self.touch();
        Ok(())
    }

    /// `running -> done` with both master locations.
    pub fn complete(
        &mut self,
        vocals_master_url: impl Into<String>,
        instrumental_master_url: impl Into<String>,
    ) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(self.invalid("done"));
        }
        self.status = JobStatus::Done;
        self.progress = PROGRESS_DONE;
        self.vocals_master_url = Some(vocals_master_url.into());
        self.instrumental_master_url = Some(instrumental_master_url.into());
        self.touch();
        Ok(())
    }

    /// `queued | running -> failed`. Progress stays where it was.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid("failed"));
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.touch();
        Ok(())
    }
}
