use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Interleaved samples as they come out of the decoder.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Planar view used by the mastering chain: shape is `[frames, channels]`,
/// channels is always 2 once built through `core::audio::to_stereo_buffer`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub samples: Array2<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.nrows()
    }

    pub fn channels(&self) -> usize {
        self.samples.ncols()
    }

    /// Largest absolute sample value, 0 for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()))
    }

    /// RMS over every sample of every channel.
    pub fn rms(&self) -> f64 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&x| (x as f64) * (x as f64)).sum();
        (sum / n as f64).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|x| x.is_finite())
    }
}

/// Which of the two separated stems a file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemTag {
    Vocals,
    Instrumental,
}

impl StemTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StemTag::Vocals => "vocals",
            StemTag::Instrumental => "instrumental",
        }
    }

    /// File name of the mastered artifact for this stem.
    pub fn master_file_name(&self) -> String {
        format!("{}_master.wav", self.as_str())
    }
}

impl fmt::Display for StemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StemTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vocals" | "vocal" | "vox" => Ok(StemTag::Vocals),
            "instrumental" | "inst" | "no_vocals" => Ok(StemTag::Instrumental),
            other => Err(format!("unknown stem tag `{other}`")),
        }
    }
}

/// Sample encoding of the written WAV masters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    #[default]
    Pcm16,
    Float32,
}

/// Paths of the two stems produced by a separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeparatedStems {
    pub vocals_path: PathBuf,
    pub instrumental_path: PathBuf,
}

impl SeparatedStems {
    pub fn path(&self, tag: StemTag) -> &Path {
        match tag {
            StemTag::Vocals => &self.vocals_path,
            StemTag::Instrumental => &self.instrumental_path,
        }
    }
}
