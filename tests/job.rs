use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use stem_master_core::job::validate_job_id;
use stem_master_core::{FsJobStore, InMemoryJobStore, Job, JobStatus, JobStore, MasterError};

#[test]
fn job_walks_the_happy_path() {
    let mut job = Job::new("abc");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);

    job.start().unwrap();
    assert_eq!((job.status, job.progress), (JobStatus::Running, 10));

    job.advance(60).unwrap();
    job.complete("/out/abc/vocals_master.wav", "/out/abc/instrumental_master.wav")
        .unwrap();
    assert_eq!((job.status, job.progress), (JobStatus::Done, 100));
    assert!(job.error.is_none());
    assert!(job.vocals_master_url.is_some() && job.instrumental_master_url.is_some());
}

#[test]
fn failure_keeps_last_progress() {
    let mut job = Job::new("abc");
    job.start().unwrap();
    job.advance(60).unwrap();
    job.fail("boom").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 60);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert!(job.vocals_master_url.is_none() && job.instrumental_master_url.is_none());
}

#[test]
fn queued_job_can_fail_directly() {
    let mut job = Job::new("abc");
    job.fail("rejected").unwrap();
    assert_eq!((job.status, job.progress), (JobStatus::Failed, 0));
}

#[test]
fn terminal_states_are_immutable() {
    let mut done = Job::new("d");
    done.start().unwrap();
    done.complete("v", "i").unwrap();
    let snapshot = done.clone();

    assert!(matches!(done.start(), Err(MasterError::InvalidTransition { .. })));
    assert!(done.advance(50).is_err());
    assert!(done.fail("late").is_err());
    assert!(done.complete("v2", "i2").is_err());
    assert_eq!(done, snapshot);

    let mut failed = Job::new("f");
    failed.fail("x").unwrap();
    assert!(failed.start().is_err());
    assert!(failed.fail("y").is_err());
    assert_eq!(failed.error.as_deref(), Some("x"));
}

#[test]
fn progress_never_goes_backwards() {
    let mut job = Job::new("p");
    assert!(job.advance(20).is_err(), "queued jobs do not advance");
    job.start().unwrap();
    job.advance(60).unwrap();
    assert!(job.advance(30).is_err());
    assert!(job.advance(100).is_err(), "100 is reserved for completion");
    job.advance(60).unwrap();
    assert_eq!(job.progress, 60);
}

#[test]
fn job_serializes_with_lowercase_status_and_no_empty_fields() {
    let mut job = Job::new("ser");
    job.start().unwrap();
    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["status"], "running");
    assert_eq!(value["progress"], 10);
    assert!(value.get("error").is_none());
    assert!(value.get("vocals_master_url").is_none());

    let back: Job = serde_json::from_value(value).unwrap();
    assert_eq!(back, job);
}

#[test]
fn job_ids_are_restricted() {
    assert!(validate_job_id("3f2a-b_9").is_ok());
    for bad in ["", "../etc", "a/b", "a b", "ü"] {
        assert!(matches!(validate_job_id(bad), Err(MasterError::InvalidJobId(_))), "{bad}");
    }
}

fn exercise_store(store: &dyn JobStore) {
    assert!(store.get("missing").unwrap().is_none());
    let err = store
        .update("missing", &mut |job: &mut Job| job.start())
        .unwrap_err();
    assert!(matches!(err, MasterError::JobNotFound(_)));

    // Ids that can never name a record read as unknown, not as malformed.
    for id in ["a b", "a/b"] {
        assert!(store.get(id).unwrap().is_none(), "{id}");
        let err = store
            .update(id, &mut |job: &mut Job| job.start())
            .unwrap_err();
        assert!(matches!(err, MasterError::JobNotFound(_)), "{id}: {err}");
    }

    store.create(Job::new("j1")).unwrap();
    let err = store.create(Job::new("j1")).unwrap_err();
    assert!(matches!(err, MasterError::JobExists(_)));

    let running = store.update("j1", &mut |job: &mut Job| job.start()).unwrap();
    assert_eq!(running.status, JobStatus::Running);

    // A rejected transition leaves the stored record untouched.
    let err = store
        .update("j1", &mut |job: &mut Job| {
            job.progress = 99;
            job.advance(5)
        })
        .unwrap_err();
    assert!(matches!(err, MasterError::InvalidTransition { .. }));
    assert_eq!(store.get("j1").unwrap().unwrap(), running);

    store.create(Job::new("j2")).unwrap();
    let ids: Vec<_> = store.list().unwrap().into_iter().map(|j| j.job_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"j1".to_string()) && ids.contains(&"j2".to_string()));
}

#[test]
fn in_memory_store_contract() {
    exercise_store(&InMemoryJobStore::new());
}

#[test]
fn fs_store_contract() {
    let tmp = tempdir().unwrap();
    exercise_store(&FsJobStore::open(tmp.path()).unwrap());
}

#[test]
fn fs_store_survives_reopen() {
    let tmp = tempdir().unwrap();
    {
        let store = FsJobStore::open(tmp.path()).unwrap();
        store.create(Job::new("persisted")).unwrap();
        store
            .update("persisted", &mut |job: &mut Job| job.start())
            .unwrap();
    }
    let reopened = FsJobStore::open(tmp.path()).unwrap();
    let job = reopened.get("persisted").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(tmp.path().join("persisted.json").exists());
}

#[test]
fn fs_store_rejects_path_like_ids() {
    let tmp = tempdir().unwrap();
    let store = FsJobStore::open(tmp.path()).unwrap();
    let err = store.create(Job::new("../escape")).unwrap_err();
    assert!(matches!(err, MasterError::InvalidJobId(_)));
}

fn hammer_one_job(store: Arc<dyn JobStore>) -> Job {
    store.create(Job::new("shared")).unwrap();
    store.update("shared", &mut |job: &mut Job| job.start()).unwrap();

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for p in 0..10u8 {
                    let target = 10 + t * 10 + p;
                    // Each thread only ever moves progress forward.
                    let _ = store.update("shared", &mut |job: &mut Job| {
                        job.advance(target.max(job.progress))
                    });
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    store.get("shared").unwrap().unwrap()
}

#[test]
fn concurrent_updates_to_one_job_are_serialized() {
    let job = hammer_one_job(Arc::new(InMemoryJobStore::new()));
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 89);
}

#[test]
fn concurrent_updates_to_one_job_are_serialized_on_disk() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(FsJobStore::open(tmp.path()).unwrap());
    let job = hammer_one_job(store.clone());
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 89);

    let on_disk: Job =
        serde_json::from_slice(&std::fs::read(tmp.path().join("shared.json")).unwrap()).unwrap();
    assert_eq!(on_disk, job);
    assert_eq!(store.tracked_locks(), 0);
}

#[test]
fn fs_store_forgets_locks_of_finished_operations() {
    let tmp = tempdir().unwrap();
    let store = FsJobStore::open(tmp.path()).unwrap();

    for i in 0..50 {
        let id = format!("job-{i}");
        store.create(Job::new(&id)).unwrap();
        store.update(&id, &mut |job: &mut Job| job.start()).unwrap();
        store.get(&id).unwrap().unwrap();
        let _ = store.update(&id, &mut |job: &mut Job| job.advance(5));
    }
    assert!(store.get("never-created").unwrap().is_none());
    assert!(store.create(Job::new("job-0")).is_err());

    assert_eq!(store.tracked_locks(), 0);
    assert_eq!(store.list().unwrap().len(), 50);
}
