//! Whole-buffer filters used by the mastering chain.
//!
//! Every function takes the buffer by value and hands back the processed
//! buffer, so stages compose as `lowpass(highpass(buf, 40.0)?, 18_000.0)?`.
//! Accumulation is done in `f64`, samples are stored as `f32`.

use ndarray::Axis;

use crate::{
    error::{MasterError, Result},
    types::AudioBuffer,
};

/// Floor added before every logarithm so silence stays finite.
pub const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    HighPass,
    LowPass,
}

/// Normalized transfer function `b / a` with `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

/// Order-2 Butterworth design through the bilinear transform.
///
/// The cutoff is normalized against Nyquist (`fc / (0.5 * sr)`) and must lie
/// strictly inside `(0, 1)`.
pub fn butterworth(kind: FilterKind, fc: f64, sample_rate: u32) -> Result<BiquadCoeffs> {
    if sample_rate == 0 {
        return Err(MasterError::InvalidFilterParameter(
            "sample rate must be positive".into(),
        ));
    }
    let nyq = 0.5 * sample_rate as f64;
    let wn = fc / nyq;
    if !wn.is_finite() || wn <= 0.0 || wn >= 1.0 {
        return Err(MasterError::InvalidFilterParameter(format!(
            "cutoff {fc} Hz must lie in (0, {nyq}) Hz for sample rate {sample_rate}"
        )));
    }

    // Pre-warped analog cutoff, K = tan(pi * Wn / 2).
    let k = (std::f64::consts::FRAC_PI_2 * wn).tan();
    let k2 = k * k;
    let sqrt2 = std::f64::consts::SQRT_2;
    let norm = 1.0 / (1.0 + sqrt2 * k + k2);

    let a = [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm];
    let b = match kind {
        FilterKind::LowPass => {
            let b0 = k2 * norm;
            [b0, 2.0 * b0, b0]
        }
        FilterKind::HighPass => [norm, -2.0 * norm, norm],
    };
    Ok(BiquadCoeffs { b, a })
}

/// Runs the filter along the time axis of every channel, starting from rest.
pub fn lfilter(coeffs: &BiquadCoeffs, buffer: AudioBuffer) -> AudioBuffer {
    let AudioBuffer {
        mut samples,
        sample_rate,
    } = buffer;
    let [b0, b1, b2] = coeffs.b;
    let [_, a1, a2] = coeffs.a;

    for mut channel in samples.axis_iter_mut(Axis(1)) {
        // Direct form II transposed
        let (mut z1, mut z2) = (0.0f64, 0.0f64);
        for s in channel.iter_mut() {
            let x = *s as f64;
            let y = b0 * x + z1;
            z1 = b1 * x - a1 * y + z2;
            z2 = b2 * x - a2 * y;
            *s = y as f32;
        }
    }

    AudioBuffer::new(samples, sample_rate)
}

pub fn highpass(buffer: AudioBuffer, fc: f64) -> Result<AudioBuffer> {
    let coeffs = butterworth(FilterKind::HighPass, fc, buffer.sample_rate)?;
    Ok(lfilter(&coeffs, buffer))
}

pub fn lowpass(buffer: AudioBuffer, fc: f64) -> Result<AudioBuffer> {
    let coeffs = butterworth(FilterKind::LowPass, fc, buffer.sample_rate)?;
    Ok(lfilter(&coeffs, buffer))
}

/// Static compressor.
///
/// The level of each channel is its RMS over the *whole* buffer, and the
/// resulting gain is applied uniformly to that channel. There is no
/// attack/release envelope: a loud passage and a quiet passage of the same
/// stem get exactly the same gain, unlike a real-time dynamics processor.
pub fn compress(
    buffer: AudioBuffer,
    threshold_db: f64,
    ratio: f64,
    makeup_db: f64,
) -> Result<AudioBuffer> {
    if !ratio.is_finite() || ratio < 1.0 {
        return Err(MasterError::InvalidFilterParameter(format!(
            "compressor ratio must be >= 1, got {ratio}"
        )));
    }
    if !threshold_db.is_finite() || !makeup_db.is_finite() {
        return Err(MasterError::InvalidFilterParameter(
            "compressor threshold and makeup gain must be finite".into(),
        ));
    }
    if buffer.frames() == 0 {
        return Ok(buffer);
    }

    let AudioBuffer {
        mut samples,
        sample_rate,
    } = buffer;
    let frames = samples.nrows() as f64;

    for mut channel in samples.axis_iter_mut(Axis(1)) {
        let mean_sq = channel.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / frames;
        let rms = (mean_sq + EPS).sqrt();
        let level_db = 20.0 * (rms + EPS).log10();
        let over = (level_db - threshold_db).max(0.0);
        let gain_db = -(1.0 - 1.0 / ratio) * over;
        let linear = 10f64.powf((gain_db + makeup_db) / 20.0);
        channel.mapv_inplace(|x| (x as f64 * linear) as f32);
    }

    Ok(AudioBuffer::new(samples, sample_rate))
}

/// Whole-buffer RMS in dBFS, floored by [`EPS`].
pub fn rms_dbfs(buffer: &AudioBuffer) -> f64 {
    20.0 * (buffer.rms() + EPS).log10()
}

/// Brings the combined RMS of all channels to `target_dbfs`, then scales the
/// whole buffer down if its peak ends up above `ceiling`.
pub fn normalize(buffer: AudioBuffer, target_dbfs: f64, ceiling: f64) -> Result<AudioBuffer> {
    if !target_dbfs.is_finite() {
        return Err(MasterError::InvalidFilterParameter(format!(
            "normalizer target must be finite, got {target_dbfs}"
        )));
    }
    if !ceiling.is_finite() || ceiling <= 0.0 {
        return Err(MasterError::InvalidFilterParameter(format!(
            "peak ceiling must be positive, got {ceiling}"
        )));
    }
    if buffer.frames() == 0 {
        return Ok(buffer);
    }

    let current = rms_dbfs(&buffer);
    let gain = 10f64.powf((target_dbfs - current) / 20.0);

    let AudioBuffer {
        mut samples,
        sample_rate,
    } = buffer;
    samples.mapv_inplace(|x| (x as f64 * gain) as f32);

    let peak = samples.iter().fold(0.0f64, |m, &x| m.max((x as f64).abs())) + EPS;
    if peak > ceiling {
        let scale = ceiling / peak;
        samples.mapv_inplace(|x| (x as f64 * scale) as f32);
    }

    Ok(AudioBuffer::new(samples, sample_rate))
}
