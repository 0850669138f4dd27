use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    config::MasteringConfig,
    core::{
        audio::{read_audio, to_interleaved, to_stereo_buffer, write_audio},
        dsp,
    },
    error::{MasterError, Result},
    types::{AudioBuffer, StemTag},
};

/// The fixed per-stem mastering pipeline:
/// high-pass, low-pass, compressor, normalizer.
#[derive(Clone, Debug, Default)]
pub struct MasteringChain {
    config: MasteringConfig,
}

impl MasteringChain {
    pub fn new(config: MasteringConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, buffer: AudioBuffer) -> Result<AudioBuffer> {
        let c = &self.config;
        let y = dsp::highpass(buffer, c.highpass_hz)?;
        let y = dsp::lowpass(y, c.lowpass_hz)?;
        let y = dsp::compress(y, c.threshold_db, c.ratio, c.makeup_db)?;
        dsp::normalize(y, c.target_dbfs, c.peak_ceiling)
    }

    /// Masters one stem file into `<out_dir>/<tag>_master.wav` and returns
    /// the written path. Filter parameter errors are returned as-is, anything
    /// else is reported as `MasteringFailed` for that stem.
    pub fn master_file(&self, input: &Path, tag: StemTag, out_dir: &Path) -> Result<PathBuf> {
        self.master_file_inner(input, tag, out_dir)
            .map_err(|e| match e {
                e @ MasterError::InvalidFilterParameter(_) => e,
                e @ MasterError::MasteringFailed { .. } => e,
                other => MasterError::MasteringFailed {
                    stem: tag.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    fn master_file_inner(&self, input: &Path, tag: StemTag, out_dir: &Path) -> Result<PathBuf> {
        let audio = read_audio(input)?;
        let buffer = to_stereo_buffer(&audio)?;
        debug!(
            stem = %tag,
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate,
            "mastering stem"
        );

        let mastered = self.process(buffer)?;
        if !mastered.is_finite() {
            return Err(MasterError::MasteringFailed {
                stem: tag.to_string(),
                reason: "chain produced non-finite samples".into(),
            });
        }

        std::fs::create_dir_all(out_dir)?;
        let dest = out_dir.join(tag.master_file_name());

        // Write next to the destination and rename, so readers never see a
        // half-written master.
        let tmp = NamedTempFile::new_in(out_dir)?;
        write_audio(tmp.path(), &to_interleaved(&mastered), self.config.encoding)?;
        tmp.persist(&dest).map_err(|e| MasterError::from(e.error))?;

        info!(
            stem = %tag,
            path = %dest.display(),
            peak = mastered.peak(),
            "master written"
        );
        Ok(dest)
    }
}
