//! Job registry contract and two backends.
//!
//! Every backend serializes updates per job id: `update` runs the closure on
//! a private copy under that job's lock and commits only if it succeeds, so
//! concurrent workers never interleave partial writes to the same record.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use tempfile::NamedTempFile;
use tracing::warn;

use super::{model::Job, validate_job_id};
use crate::error::{MasterError, Result};

pub trait JobStore: Send + Sync {
    /// Inserts a new record. Fails with `JobExists` if the id is taken.
    fn create(&self, job: Job) -> Result<Job>;

    /// `None` for unknown ids, including ids no record could ever carry.
    fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Applies `apply` atomically to the stored record and returns the
    /// committed state. `JobNotFound` if the id is unknown; if `apply`
    /// errors the stored record is left untouched.
    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut Job) -> Result<()>) -> Result<Job>;

    fn list(&self) -> Result<Vec<Job>>;
}

fn poisoned<T>(_: T) -> MasterError {
    MasterError::Store("lock poisoned".into())
}

/// Process-local store, one mutex per job.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Arc<Mutex<Job>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, job_id: &str) -> Result<Option<Arc<Mutex<Job>>>> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        Ok(jobs.get(job_id).cloned())
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job: Job) -> Result<Job> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.job_id) {
            return Err(MasterError::JobExists(job.job_id));
        }
        jobs.insert(job.job_id.clone(), Arc::new(Mutex::new(job.clone())));
        Ok(job)
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let Some(slot) = self.entry(job_id)? else {
            return Ok(None);
        };
        let job = slot.lock().map_err(poisoned)?.clone();
        Ok(Some(job))
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut Job) -> Result<()>) -> Result<Job> {
        let slot = self
            .entry(job_id)?
            .ok_or_else(|| MasterError::JobNotFound(job_id.to_string()))?;
        let mut stored = slot.lock().map_err(poisoned)?;
        let mut next = stored.clone();
        apply(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    fn list(&self) -> Result<Vec<Job>> {
        let slots: Vec<_> = self
            .jobs
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().map_err(poisoned)?.clone());
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }
}

/// One JSON document per job under a directory.
///
/// Writes go through a temp file in the same directory and an atomic rename.
/// Per-id locking covers the workers of one process; separate processes
/// sharing a directory must still not process the same job id.
#[derive(Debug)]
pub struct FsJobStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsJobStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Number of ids with a lock entry. Entries are dropped once no caller
    /// holds them, so this is zero whenever the store is idle.
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    /// Record path for a well-formed id. `None` for ids that can never name
    /// a record, which readers treat as unknown.
    fn record_path(&self, job_id: &str) -> Option<PathBuf> {
        validate_job_id(job_id).ok()?;
        Some(self.dir.join(format!("{job_id}.json")))
    }

    /// Runs `f` while holding the lock for `job_id`, then drops the lock
    /// entry if no other caller still holds it.
    fn with_lock<T>(&self, job_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().map_err(poisoned)?;
            locks.entry(job_id.to_string()).or_default().clone()
        };
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(e) => Err(poisoned(e)),
        };
        drop(lock);

        if let Ok(mut locks) = self.locks.lock() {
            // Only the map holds it: nobody is waiting and nobody can pick it
            // up without the map lock held here.
            if locks.get(job_id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(job_id);
            }
        }
        result
    }

    fn read_job(path: &Path) -> Result<Job> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn temp_with(&self, job: &Job) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), job)?;
        tmp.as_file_mut().flush()?;
        Ok(tmp)
    }
}

impl JobStore for FsJobStore {
    fn create(&self, job: Job) -> Result<Job> {
        validate_job_id(&job.job_id)?;
        let path = self.dir.join(format!("{}.json", job.job_id));

        self.with_lock(&job.job_id, || {
            let tmp = self.temp_with(&job)?;
            tmp.persist_noclobber(&path).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    MasterError::JobExists(job.job_id.clone())
                } else {
                    MasterError::from(e.error)
                }
            })?;
            Ok(())
        })?;
        Ok(job)
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let Some(path) = self.record_path(job_id) else {
            return Ok(None);
        };
        self.with_lock(job_id, || {
            if !path.exists() {
                return Ok(None);
            }
            Self::read_job(&path).map(Some)
        })
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut Job) -> Result<()>) -> Result<Job> {
        let not_found = || MasterError::JobNotFound(job_id.to_string());
        let path = self.record_path(job_id).ok_or_else(not_found)?;

        self.with_lock(job_id, || {
            if !path.exists() {
                return Err(not_found());
            }
            let mut job = Self::read_job(&path)?;
            apply(&mut job)?;
            let tmp = self.temp_with(&job)?;
            tmp.persist(&path).map_err(|e| MasterError::from(e.error))?;
            Ok(job)
        })
    }

    fn list(&self) -> Result<Vec<Job>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_job(&path) {
                Ok(job) => out.push(job),
                Err(e) => warn!(path = %path.display(), "skipping unreadable job record: {e}"),
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }
}
