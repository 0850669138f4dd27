use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

use stem_master_core::{FsJobStore, Job, JobStatus, JobStore};

fn stem_master(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stem-master"));
    cmd.args(args).env_remove("STEM_MASTER_OUTPUT_DIR");
    cmd
}

fn run(mut cmd: Command) -> Output {
    let out = cmd.output().unwrap();
    assert!(
        out.status.success(),
        "stem-master failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    out
}

fn seed_running(output: &Path, job_id: &str) {
    let store = FsJobStore::open(output.join("jobs")).unwrap();
    store.create(Job::new(job_id)).unwrap();
    store.update(job_id, &mut |job: &mut Job| job.start()).unwrap();
}

#[test]
fn status_reads_the_store_under_output() {
    let tmp = tempdir().unwrap();
    seed_running(tmp.path(), "job-status");

    let out = run(stem_master(&[
        "status",
        "--job-id",
        "job-status",
        "--output",
        tmp.path().to_str().unwrap(),
    ]));
    let job: Job = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(job.job_id, "job-status");
    assert_eq!(job.status, JobStatus::Running);
}

#[test]
fn status_honours_output_env_var() {
    let tmp = tempdir().unwrap();
    seed_running(tmp.path(), "job-env");

    let mut cmd = stem_master(&["status", "--job-id", "job-env"]);
    cmd.env("STEM_MASTER_OUTPUT_DIR", tmp.path());
    let job: Job = serde_json::from_slice(&run(cmd).stdout).unwrap();
    assert_eq!(job.job_id, "job-env");
}

#[test]
fn status_of_unknown_job_fails() {
    let tmp = tempdir().unwrap();
    let out = stem_master(&["status", "-j", "ghost", "-o", tmp.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("ghost"));
}

#[test]
fn reap_fails_stale_jobs_under_output() {
    let tmp = tempdir().unwrap();
    seed_running(tmp.path(), "job-stale");

    let out = run(stem_master(&[
        "reap",
        "--output",
        tmp.path().to_str().unwrap(),
        "--lease-secs",
        "0",
    ]));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "job-stale");

    let store = FsJobStore::open(tmp.path().join("jobs")).unwrap();
    let job = store.get("job-stale").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("lease expired"));
}
