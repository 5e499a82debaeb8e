use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported or unrecognized format: {0}")]
    UnsupportedFormat(String),
    #[error("No audio track found")]
    NoAudioTrack,
    #[error("Audio track has no sample rate")]
    NoSampleRate,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Decoded zero audio samples")]
    EmptySignal,
}

/// Mono waveform at the file's native sample rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a whole audio file to a single channel by averaging channels.
/// No resampling and no truncation: the full file is returned.
pub fn load_mono(path: &Path) -> Result<Waveform, DecodeError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::NoSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buf) => append_mono(&buf, &mut samples),
            // A corrupt frame mid-stream is skipped, the rest still decodes
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("{}: skipping bad frame: {}", path.display(), e);
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::EmptySignal);
    }

    log::debug!(
        "Decoded {}: {} samples at {} Hz",
        path.display(),
        samples.len(),
        sample_rate
    );
    Ok(Waveform {
        samples,
        sample_rate,
    })
}

fn append_mono(buf: &AudioBufferRef, out: &mut Vec<f32>) {
    match buf {
        AudioBufferRef::U8(b) => mix_planes(&**b, out),
        AudioBufferRef::U16(b) => mix_planes(&**b, out),
        AudioBufferRef::U24(b) => mix_planes(&**b, out),
        AudioBufferRef::U32(b) => mix_planes(&**b, out),
        AudioBufferRef::S8(b) => mix_planes(&**b, out),
        AudioBufferRef::S16(b) => mix_planes(&**b, out),
        AudioBufferRef::S24(b) => mix_planes(&**b, out),
        AudioBufferRef::S32(b) => mix_planes(&**b, out),
        AudioBufferRef::F32(b) => mix_planes(&**b, out),
        AudioBufferRef::F64(b) => mix_planes(&**b, out),
    }
}

fn mix_planes<S>(buf: &symphonia::core::audio::AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: symphonia::core::sample::Sample + IntoSample<f32>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    if channels == 0 {
        return;
    }
    out.reserve(frames);
    for i in 0..frames {
        let sum: f32 = (0..channels)
            .map(|c| -> f32 { buf.chan(c)[i].into_sample() })
            .sum();
        out.push(sum / channels as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[(i16, i16)]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for &(l, r) in frames {
            w.write_sample(l).unwrap();
            if channels == 2 {
                w.write_sample(r).unwrap();
            }
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_stereo_downmix_averages_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.wav");
        write_wav(&path, 2, &[(16384, 0); 100]);
        let wave = load_mono(&path).unwrap();
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.samples.len(), 100);
        for s in &wave.samples {
            assert!((s - 0.25).abs() < 1e-3, "got {}", s);
        }
    }

    #[test]
    fn test_native_rate_and_full_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2.wav");
        write_wav(&path, 1, &vec![(1000, 0); 8000 * 3]);
        let wave = load_mono(&path).unwrap();
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.samples.len(), 24000);
    }

    #[test]
    fn test_mp3_decodes_to_mono_at_native_rate() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/sample.mp3"));
        let wave = load_mono(path).unwrap();
        // MPEG-2 layer III, mono, 22.05 kHz
        assert_eq!(wave.sample_rate, 22050);
        assert!(wave.samples.len() > 22050 / 2);
        assert!(wave.samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_empty_wav_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3.wav");
        write_wav(&path, 1, &[]);
        assert!(load_mono(&path).is_err());
    }

    #[test]
    fn test_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("4.mp3");
        std::fs::write(&path, b"definitely not audio data").unwrap();
        assert!(load_mono(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_mono(Path::new("/nonexistent/5.mp3")).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
