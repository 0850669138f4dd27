use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use walkdir::WalkDir;

use crate::{
    error::{MasterError, Result},
    types::SeparatedStems,
};

/// Picks the directory directly under `output_root` whose name starts with
/// `prefix`. With several candidates the most recently modified wins, ties
/// go to the lexicographically last name.
pub fn find_model_root(output_root: &Path, prefix: &str) -> Result<PathBuf> {
    let missing = || MasterError::SeparationOutputMissing(output_root.display().to_string());

    let entries = fs::read_dir(output_root).map_err(|_| missing())?;

    let mut candidates: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(prefix) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, name, path));
    }

    candidates
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, _, path)| path)
        .ok_or_else(missing)
}

/// Locates the vocal and residual stems beneath the model root.
///
/// The residual suffix (`no_vocals.wav`) also ends with the vocal suffix
/// (`vocals.wav`), so residual matches are classified first.
pub fn resolve_stems(
    output_root: &Path,
    prefix: &str,
    vocals_suffix: &str,
    residual_suffix: &str,
) -> Result<SeparatedStems> {
    let model_root = find_model_root(output_root, prefix)?;

    let mut vocals: Option<PathBuf> = None;
    let mut residual: Option<PathBuf> = None;

    for entry in WalkDir::new(&model_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(residual_suffix) {
            residual.get_or_insert_with(|| entry.path().to_path_buf());
        } else if name.ends_with(vocals_suffix) {
            vocals.get_or_insert_with(|| entry.path().to_path_buf());
        }
        if vocals.is_some() && residual.is_some() {
            break;
        }
    }

    match (vocals, residual) {
        (Some(vocals_path), Some(instrumental_path)) => Ok(SeparatedStems {
            vocals_path,
            instrumental_path,
        }),
        (v, r) => {
            let mut missing = Vec::new();
            if v.is_none() {
                missing.push(format!("*{vocals_suffix}"));
            }
            if r.is_none() {
                missing.push(format!("*{residual_suffix}"));
            }
            Err(MasterError::StemNotFound(format!(
                "{} under {}",
                missing.join(", "),
                model_root.display()
            )))
        }
    }
}
