use std::{
    fs,
    path::Path,
    process::{Command, Stdio},
};

use tracing::{debug, info, warn};

use super::{resolve::resolve_stems, Separator};
use crate::{
    config::SeparatorConfig,
    error::{MasterError, Result},
    types::SeparatedStems,
};

/// Runs the Demucs command line in `--two-stems vocals` mode.
#[derive(Clone, Debug, Default)]
pub struct DemucsSeparator {
    config: SeparatorConfig,
}

impl DemucsSeparator {
    pub fn new(config: SeparatorConfig) -> Self {
        Self { config }
    }

    fn command(&self, input: &Path, output_root: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--two-stems")
            .arg("vocals")
            .arg("--device")
            .arg(&self.config.device)
            .arg("-o")
            .arg(output_root)
            .arg(input)
            .stdin(Stdio::null());
        cmd
    }
}

impl Separator for DemucsSeparator {
    fn separate(&self, input: &Path, output_root: &Path) -> Result<SeparatedStems> {
        fs::create_dir_all(output_root)?;

        info!(
            program = %self.config.program,
            input = %input.display(),
            output = %output_root.display(),
            "running separation"
        );

        let output = self.command(input, output_root).output().map_err(|e| {
            MasterError::SeparationFailed(format!(
                "could not start `{}`: {e}",
                self.config.program
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostic = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            warn!(status = %output.status, "separation tool exited with failure");
            return Err(MasterError::SeparationFailed(format!(
                "`{}` exited with {}: {}",
                self.config.program, output.status, diagnostic
            )));
        }

        let stems = resolve_stems(
            output_root,
            &self.config.model_prefix,
            &self.config.vocals_suffix,
            &self.config.residual_suffix,
        )?;
        debug!(
            vocals = %stems.vocals_path.display(),
            instrumental = %stems.instrumental_path.display(),
            "stems resolved"
        );
        Ok(stems)
    }
}
