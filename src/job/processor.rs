use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context};
use chrono::Utc;
use tracing::{error, info, warn};

use super::{
    model::{Job, JobStatus, PROGRESS_SEPARATED, PROGRESS_VOCALS_MASTERED},
    store::JobStore,
    validate_job_id,
};
use crate::{
    config::ProcessorConfig,
    core::chain::MasteringChain,
    error::{MasterError, Result},
    separation::{DemucsSeparator, Separator},
    types::StemTag,
};

/// Drives jobs through `queued -> running -> done | failed`.
///
/// A processor handles one job at a time, synchronously. Several processors
/// may share one store; each writes only the jobs it picked up.
pub struct JobProcessor<S: Separator> {
    separator: S,
    chain: MasteringChain,
    store: Arc<dyn JobStore>,
    output_root: PathBuf,
    public_base_url: Option<String>,
}

impl JobProcessor<DemucsSeparator> {
    pub fn from_config(config: &ProcessorConfig, store: Arc<dyn JobStore>) -> Self {
        Self::new(DemucsSeparator::new(config.separator.clone()), store, config)
    }
}

impl<S: Separator> JobProcessor<S> {
    pub fn new(separator: S, store: Arc<dyn JobStore>, config: &ProcessorConfig) -> Self {
        Self {
            separator,
            chain: MasteringChain::new(config.mastering.clone()),
            store,
            output_root: config.output_root.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Every artifact of a job lives under this directory.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_root.join(job_id)
    }

    /// Registers a queued job. The caller owns the id.
    pub fn submit(&self, job_id: &str, source: &Path) -> Result<Job> {
        validate_job_id(job_id)?;
        let job = self.store.create(Job::new(job_id))?;
        info!(job_id, source = %source.display(), "job queued");
        Ok(job)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        self.store
            .get(job_id)?
            .ok_or_else(|| MasterError::JobNotFound(job_id.to_string()))
    }

    /// Submits and processes in one call.
    pub fn run(&self, job_id: &str, source: &Path) -> Result<Job> {
        self.submit(job_id, source)?;
        self.process(job_id, source)
    }

    /// Processes a queued job to a terminal state.
    ///
    /// Separation or mastering errors end up in the record (`failed` plus the
    /// error text) and the terminal job is returned as `Ok`. `Err` means the
    /// job could not be picked up (unknown id, not queued) or the store
    /// itself failed.
    pub fn process(&self, job_id: &str, source: &Path) -> Result<Job> {
        self.store.update(job_id, &mut |job: &mut Job| job.start())?;
        info!(job_id, source = %source.display(), "job started");

        let outcome = self.execute(job_id, source).and_then(|(vocals, instrumental)| {
            self.store.update(job_id, &mut |job: &mut Job| {
                job.complete(vocals.clone(), instrumental.clone())
            })
        });

        match outcome {
            Ok(job) => {
                info!(job_id, "job done");
                Ok(job)
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id, "job failed: {message}");
                self.store
                    .update(job_id, &mut |job: &mut Job| job.fail(message.clone()))
            }
        }
    }

    fn execute(&self, job_id: &str, source: &Path) -> Result<(String, String)> {
        std::fs::metadata(source)
            .with_context(|| format!("Source file does not exist: {}", source.display()))?;

        let job_dir = self.job_dir(job_id);
        let stems = self.separator.separate(source, &job_dir.join("separated"))?;
        self.store
            .update(job_id, &mut |job: &mut Job| job.advance(PROGRESS_SEPARATED))?;
        info!(job_id, "separation finished");

        let vocals = self
            .chain
            .master_file(stems.path(StemTag::Vocals), StemTag::Vocals, &job_dir)?;
        self.store
            .update(job_id, &mut |job: &mut Job| job.advance(PROGRESS_VOCALS_MASTERED))?;

        let instrumental = self.chain.master_file(
            stems.path(StemTag::Instrumental),
            StemTag::Instrumental,
            &job_dir,
        )?;

        Ok((
            self.artifact_url(job_id, &vocals),
            self.artifact_url(job_id, &instrumental),
        ))
    }

    fn artifact_url(&self, job_id: &str, path: &Path) -> String {
        match (&self.public_base_url, path.file_name()) {
            (Some(base), Some(name)) => format!(
                "{}/{}/{}",
                base.trim_end_matches('/'),
                job_id,
                name.to_string_lossy()
            ),
            _ => path.display().to_string(),
        }
    }

    /// Fails every `running` job whose last update is older than `lease`.
    ///
    /// A worker that dies mid-job leaves its record `running` forever; this is
    /// the recovery hook for an operator or supervisor. Returns the reaped jobs.
    pub fn reap_stale(&self, lease: Duration) -> Result<Vec<Job>> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| anyhow!("lease out of range: {e}"))?;
        let mut reaped = Vec::new();

        for candidate in self.store.list()? {
            if candidate.status != JobStatus::Running {
                continue;
            }
            let mut expired = false;
            let job = self.store.update(&candidate.job_id, &mut |job: &mut Job| {
                let now = Utc::now();
                if job.status == JobStatus::Running && now - job.updated_at >= lease {
                    expired = true;
                    job.fail(format!(
                        "lease expired: no progress since {}, worker presumed dead",
                        job.updated_at.to_rfc3339()
                    ))
                } else {
                    Ok(())
                }
            })?;
            if expired {
                warn!(job_id = %job.job_id, "reaped stale job");
                reaped.push(job);
            }
        }

        Ok(reaped)
    }
}
