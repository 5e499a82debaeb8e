pub mod decode;
pub mod features;
pub mod filters;
pub mod spectral;

pub use features::{FEATURE_COUNT, column_names};

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Feature computation error: {0}")]
    Spectral(#[from] spectral::SpectralError),
    #[error("Feature group {group} is {rows}x{frames}, expected {expected_rows} rows")]
    Shape {
        group: &'static str,
        expected_rows: usize,
        rows: usize,
        frames: usize,
    },
}

/// Decode a file and compute its feature vector.
pub fn try_extract(path: &Path) -> Result<Vec<f64>, AnalyzeError> {
    log::debug!(
        "Extracting: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );

    let wave = decode::load_mono(path)?;
    let frames = spectral::compute(&wave)?;
    features::reduce(&frames)
}

/// Feature vector for one file, or `None` if the file could not be
/// analyzed. Failures are logged with the path, never propagated.
pub fn extract(path: &Path) -> Option<Vec<f64>> {
    match try_extract(path) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Failed to extract features from {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn write_tone(path: &Path, sample_rate: u32, secs: f64, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        let n = (sample_rate as f64 * secs) as usize;
        for i in 0..n {
            let t = i as f64 / sample_rate as f64;
            let v = 0.3 * (2.0 * PI * 440.0 * t).sin() + 0.1 * (2.0 * PI * 1250.0 * t).sin();
            for _ in 0..channels {
                w.write_sample((v * i16::MAX as f64) as i16).unwrap();
            }
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_extract_returns_80_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2.wav");
        write_tone(&path, 44100, 1.5, 2);

        let v = extract(&path).expect("tone should analyze");
        assert_eq!(v.len(), 80);
        assert_eq!(v.len(), column_names().len());
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_extract_mp3() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/sample.mp3"));
        let v = try_extract(path).unwrap();
        assert_eq!(v.len(), FEATURE_COUNT);
        assert!(v.iter().all(|x| x.is_finite()));
        assert_eq!(extract(path), Some(v));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3.wav");
        write_tone(&path, 22050, 1.0, 1);

        let a = extract(&path).unwrap();
        let b = extract(&path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_failure_marker() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("4.mp3");
        std::fs::write(&empty, b"").unwrap();
        assert!(extract(&empty).is_none());

        let corrupt = dir.path().join("5.mp3");
        std::fs::write(&corrupt, vec![0x5a; 4096]).unwrap();
        assert!(extract(&corrupt).is_none());

        assert!(extract(&dir.path().join("missing.mp3")).is_none());
    }

    #[test]
    fn test_zero_length_wav_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("6.wav");
        write_tone(&path, 44100, 0.0, 1);
        assert!(matches!(try_extract(&path), Err(AnalyzeError::Decode(_))));
    }

    #[test]
    fn test_zcr_tracks_pitch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("7.wav");
        write_tone(&path, 44100, 1.0, 1);
        let v = extract(&path).unwrap();
        // Dominant 440 Hz: roughly 880 crossings per second
        let zcr_mean = v[FEATURE_COUNT - 2];
        assert!(zcr_mean > 0.01 && zcr_mean < 0.06, "zcr_mean = {}", zcr_mean);
    }
}
