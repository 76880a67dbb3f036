//! Impulse-response loading.
//!
//! IRs arrive out of band as WAV files (cabinet captures, room measurement
//! sweeps). The loader reads any integer or float WAV, mixes the channels
//! down to mono, normalizes the peak to just under full scale, and caps the
//! length so a mislabeled file cannot balloon the convolver.

use std::path::Path;

use hound::SampleFormat;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Longest IR the convolver will accept, in samples (~1.4 s at 48 kHz).
pub const MAX_IR_SAMPLES: usize = 1 << 16;

/// Normalization target, kept under 1.0 to leave clip headroom.
const NORMALIZE_PEAK: f32 = 0.95;

/// Load a WAV impulse response as normalized mono samples.
pub fn load_ir_wav(path: impl AsRef<Path>) -> Result<Vec<f32>, EngineError> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            let scale = 1.0 / (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(EngineError::IrEmpty);
    }

    // Mono mixdown, truncated to the length cap.
    let frames = (interleaved.len() / channels).min(MAX_IR_SAMPLES);
    let mut mono = Vec::with_capacity(frames);
    for frame in 0..frames {
        let sum: f32 = interleaved[frame * channels..(frame + 1) * channels].iter().sum();
        mono.push(sum / channels as f32);
    }
    if interleaved.len() / channels > MAX_IR_SAMPLES {
        warn!(
            path = %path.display(),
            cap = MAX_IR_SAMPLES,
            "impulse response truncated to length cap"
        );
    }

    // Peak normalize.
    let peak = mono.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    if peak > 0.0 {
        let gain = NORMALIZE_PEAK / peak;
        for sample in &mut mono {
            *sample *= gain;
        }
    }

    debug!(
        path = %path.display(),
        samples = mono.len(),
        source_rate = spec.sample_rate,
        "impulse response loaded"
    );
    Ok(mono)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[f32]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        match spec.sample_format {
            SampleFormat::Float => {
                for &s in samples {
                    writer.write_sample(s).unwrap();
                }
            }
            SampleFormat::Int => {
                for &s in samples {
                    writer.write_sample((s * 32767.0) as i16).unwrap();
                }
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_float_mono_ir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ir.wav");
        write_wav(
            &path,
            hound::WavSpec {
                channels: 1,
                sample_rate: 48000,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
            &[0.5, 0.25, -0.125],
        );

        let ir = load_ir_wav(&path).unwrap();
        assert_eq!(ir.len(), 3);
        // Peak (0.5) normalized to 0.95.
        assert!((ir[0] - 0.95).abs() < 1e-6);
        assert!((ir[1] - 0.475).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_mixdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // L=1.0 R=0.0 mixes to 0.5, then normalizes to 0.95.
        write_wav(
            &path,
            hound::WavSpec {
                channels: 2,
                sample_rate: 44100,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
            &[1.0, 0.0, 0.5, 0.5],
        );

        let ir = load_ir_wav(&path).unwrap();
        assert_eq!(ir.len(), 2);
        assert!((ir[0] - 0.95).abs() < 1e-6);
        assert!((ir[1] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_int16_ir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.wav");
        write_wav(
            &path,
            hound::WavSpec {
                channels: 1,
                sample_rate: 48000,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            &[1.0, -1.0, 0.5],
        );

        let ir = load_ir_wav(&path).unwrap();
        assert_eq!(ir.len(), 3);
        assert!(ir[0] > 0.9 && ir[1] < -0.9);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(load_ir_wav("/nonexistent/ir.wav").is_err());
    }
}
