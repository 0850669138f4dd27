use std::{
    env,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::types::SampleEncoding;

pub const ENV_DEMUCS_BIN: &str = "STEM_MASTER_DEMUCS_BIN";
pub const ENV_OUTPUT_DIR: &str = "STEM_MASTER_OUTPUT_DIR";

/// Tunables of the mastering chain. Defaults reproduce the fixed chain:
/// HPF 40 Hz, LPF 18 kHz, -18 dBFS / 3:1 / +3 dB compressor, -14 dBFS target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringConfig {
    pub highpass_hz: f64,
    pub lowpass_hz: f64,
    pub threshold_db: f64,
    pub ratio: f64,
    pub makeup_db: f64,
    pub target_dbfs: f64,
    /// Absolute peak the normalizer rescales down to when exceeded.
    pub peak_ceiling: f64,
    pub encoding: SampleEncoding,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            highpass_hz: 40.0,
            lowpass_hz: 18_000.0,
            threshold_db: -18.0,
            ratio: 3.0,
            makeup_db: 3.0,
            target_dbfs: -14.0,
            peak_ceiling: 0.999,
            encoding: SampleEncoding::Pcm16,
        }
    }
}

/// How to invoke the two-stem separation tool and find its output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparatorConfig {
    pub program: String,
    pub device: String,
    /// Directory-name prefix the tool uses for its model folder.
    pub model_prefix: String,
    pub vocals_suffix: String,
    pub residual_suffix: String,
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            program: demucs_program(),
            device: "cpu".into(),
            model_prefix: "htdemucs".into(),
            vocals_suffix: "vocals.wav".into(),
            residual_suffix: "no_vocals.wav".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Root under which every job gets its own `<job_id>/` directory.
    pub output_root: PathBuf,
    /// When set, master locations are exposed as `<base>/<job_id>/<file>`
    /// instead of file-system paths.
    pub public_base_url: Option<String>,
    pub mastering: MasteringConfig,
    pub separator: SeparatorConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            output_root: output_root(),
            public_base_url: None,
            mastering: MasteringConfig::default(),
            separator: SeparatorConfig::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.output_root = root.as_ref().to_path_buf();
        self
    }

    /// Default home of the job records, `<output_root>/jobs`.
    pub fn store_dir(&self) -> PathBuf {
        self.output_root.join("jobs")
    }
}

pub fn demucs_program() -> String {
    env::var(ENV_DEMUCS_BIN).unwrap_or_else(|_| "demucs".to_string())
}

/// `STEM_MASTER_OUTPUT_DIR`, else the platform data dir, else `./outputs`.
pub fn output_root() -> PathBuf {
    if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("dev", "StemMaster", "stem-master-core")
        .map(|proj| proj.data_dir().join("outputs"))
        .unwrap_or_else(|| PathBuf::from("outputs"))
}
