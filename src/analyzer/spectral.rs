//! Per-frame feature matrices computed from a mono waveform.
//!
//! Every matrix is `dimension x frames`: row `k` holds coefficient `k` in
//! each analysis frame.

use super::decode::Waveform;
use super::filters;
use ndarray::{Array1, Array2, Axis};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;
use thiserror::Error;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const N_MFCC: usize = 20;
/// Octave bands above `CONTRAST_FMIN`; one more row holds the residual band.
pub const CONTRAST_OCTAVES: usize = 6;
pub const CONTRAST_FMIN: f64 = 200.0;
pub const CONTRAST_QUANTILE: f64 = 0.02;
pub const N_CHROMA: usize = 12;
pub const CENS_SMOOTHING: usize = 41;
pub const ZCR_FRAME_LENGTH: usize = 2048;

const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;
const ZCR_THRESHOLD: f64 = 1e-10;
const CENS_STEPS: [f64; 4] = [0.4, 0.2, 0.1, 0.05];
const CENS_WEIGHT: f64 = 0.25;

pub type Matrix = Array2<f64>;

#[derive(Error, Debug)]
pub enum SpectralError {
    #[error("Empty signal")]
    EmptySignal,
    #[error("Non-finite sample at index {0}")]
    NonFinite(usize),
    #[error("Frequency band {band_hz} Hz exceeds Nyquist ({nyquist} Hz)")]
    BandExceedsNyquist { band_hz: f64, nyquist: f64 },
}

/// All four per-frame feature matrices for one waveform.
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    pub mfcc: Matrix,
    pub contrast: Matrix,
    pub chroma: Matrix,
    pub zcr: Matrix,
}

pub fn compute(wave: &Waveform) -> Result<FrameFeatures, SpectralError> {
    if wave.samples.is_empty() {
        return Err(SpectralError::EmptySignal);
    }
    if let Some(i) = wave.samples.iter().position(|s| !s.is_finite()) {
        return Err(SpectralError::NonFinite(i));
    }

    let magnitude = stft_magnitude(&wave.samples);
    let power = magnitude.mapv(|m| m * m);

    Ok(FrameFeatures {
        mfcc: mfcc(&power, wave.sample_rate),
        contrast: spectral_contrast(&magnitude, wave.sample_rate)?,
        chroma: chroma_cens(&power, wave.sample_rate),
        zcr: zero_crossing_rate(&wave.samples),
    })
}

/// Magnitude spectrogram, `(N_FFT / 2 + 1) x frames`.
///
/// Frames are centred: the signal is zero-padded by `N_FFT / 2` on both
/// sides, giving `1 + len / HOP_LENGTH` frames.
pub fn stft_magnitude(samples: &[f32]) -> Matrix {
    let pad = N_FFT / 2;
    let mut padded = vec![0.0f64; samples.len() + 2 * pad];
    for (dst, &s) in padded[pad..].iter_mut().zip(samples) {
        *dst = s as f64;
    }

    let window = filters::hann(N_FFT, true);
    let n_frames = 1 + (padded.len() - N_FFT) / HOP_LENGTH;
    let n_bins = N_FFT / 2 + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let mut buffer = vec![Complex::new(0.0, 0.0); N_FFT];

    let mut spectrogram = Matrix::zeros((n_bins, n_frames));
    for (t, mut column) in spectrogram.axis_iter_mut(Axis(1)).enumerate() {
        let start = t * HOP_LENGTH;
        for ((b, &x), &w) in buffer.iter_mut().zip(&padded[start..start + N_FFT]).zip(&window) {
            *b = Complex::new(x * w, 0.0);
        }
        fft.process(&mut buffer);
        for (dst, c) in column.iter_mut().zip(&buffer[..n_bins]) {
            *dst = c.norm();
        }
    }
    spectrogram
}

/// Power to decibels relative to 1.0, floored at `TOP_DB` below the peak
/// of the whole matrix.
fn power_to_db(m: &Matrix) -> Matrix {
    let mut db = m.mapv(|v| 10.0 * v.max(AMIN).log10());
    let peak = db.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let floor = peak - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}

/// Orthonormal DCT-II basis, keeping the first `n_out` of `n_in` coefficients.
fn dct_ortho(n_out: usize, n_in: usize) -> Matrix {
    let n = n_in as f64;
    Matrix::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()
    })
}

/// `N_MFCC x frames` cepstral coefficients from a log-mel power spectrogram.
pub fn mfcc(power: &Matrix, sample_rate: u32) -> Matrix {
    let mel_basis =
        filters::mel_filterbank(sample_rate, N_FFT, N_MELS, 0.0, sample_rate as f64 / 2.0);
    let log_mel = power_to_db(&mel_basis.dot(power));
    dct_ortho(N_MFCC, N_MELS).dot(&log_mel)
}

/// `(CONTRAST_OCTAVES + 1) x frames` peak-minus-valley energy in dB per
/// octave sub-band.
pub fn spectral_contrast(magnitude: &Matrix, sample_rate: u32) -> Result<Matrix, SpectralError> {
    let nyquist = sample_rate as f64 / 2.0;
    let n_bands = CONTRAST_OCTAVES + 1;

    // Band edges: 0, fmin, 2*fmin, ... fmin * 2^CONTRAST_OCTAVES
    let mut edges = vec![0.0];
    edges.extend((0..=CONTRAST_OCTAVES).map(|i| CONTRAST_FMIN * 2f64.powi(i as i32)));
    if let Some(&band_hz) = edges[..edges.len() - 1].iter().find(|&&e| e >= nyquist) {
        return Err(SpectralError::BandExceedsNyquist { band_hz, nyquist });
    }

    let freqs = filters::fft_frequencies(sample_rate, N_FFT);
    let n_bins = freqs.len();

    // Bin ranges per band, plus the quantile size for each
    let mut bands: Vec<(std::ops::Range<usize>, usize)> = Vec::with_capacity(n_bands);
    for k in 0..n_bands {
        let (lo, hi) = (edges[k], edges[k + 1]);
        let in_band: Vec<usize> = (0..n_bins).filter(|&i| freqs[i] >= lo && freqs[i] <= hi).collect();
        let (Some(&first), Some(&last)) = (in_band.first(), in_band.last()) else {
            return Err(SpectralError::BandExceedsNyquist { band_hz: lo, nyquist });
        };

        // Neighbouring bands share their boundary bin; the last band takes
        // everything up to Nyquist
        let start = if k > 0 { first.saturating_sub(1) } else { first };
        let end = if k == n_bands - 1 { n_bins } else { last + 1 };
        let selected = end - start;
        let quantile = ((CONTRAST_QUANTILE * selected as f64).round_ties_even() as usize).max(1);
        let used_end = if k < n_bands - 1 { end - 1 } else { end };
        bands.push((start..used_end, quantile));
    }

    let n_frames = magnitude.ncols();
    let mut peak = Matrix::zeros((n_bands, n_frames));
    let mut valley = Matrix::zeros((n_bands, n_frames));
    let mut sorted = Vec::with_capacity(n_bins);
    for (t, frame) in magnitude.axis_iter(Axis(1)).enumerate() {
        for (k, (range, q)) in bands.iter().enumerate() {
            sorted.clear();
            sorted.extend(range.clone().map(|i| frame[i]));
            if sorted.is_empty() {
                continue;
            }
            sorted.sort_by(f64::total_cmp);
            let q = (*q).min(sorted.len()).max(1);
            valley[[k, t]] = sorted[..q].iter().sum::<f64>() / q as f64;
            peak[[k, t]] = sorted[sorted.len() - q..].iter().sum::<f64>() / q as f64;
        }
    }

    Ok(&power_to_db(&peak) - &power_to_db(&valley))
}

/// `N_CHROMA x frames` chroma energy normalized statistics (CENS).
pub fn chroma_cens(power: &Matrix, sample_rate: u32) -> Matrix {
    let fb = filters::chroma_filterbank(sample_rate, N_FFT, N_CHROMA);

    // Per-frame pitch-class energy, L1-normalized, then quantized
    let mut quantized = fb.dot(power);
    for mut column in quantized.axis_iter_mut(Axis(1)) {
        let l1: f64 = column.iter().map(|v| v.abs()).sum();
        let scale = if l1 > f64::MIN_POSITIVE { 1.0 / l1 } else { 1.0 };
        column.mapv_inplace(|v| {
            let v = v * scale;
            CENS_STEPS.iter().filter(|&&step| v > step).count() as f64 * CENS_WEIGHT
        });
    }

    // Smooth along time with a normalized Hann window, zero beyond the edges
    let mut window = filters::hann(CENS_SMOOTHING + 2, false);
    let total: f64 = window.iter().sum();
    window.iter_mut().for_each(|w| *w /= total);
    let center = window.len() as isize / 2;

    let n_frames = quantized.ncols() as isize;
    let mut smoothed = Matrix::zeros(quantized.raw_dim());
    for (row, mut out) in quantized.axis_iter(Axis(0)).zip(smoothed.axis_iter_mut(Axis(0))) {
        for (t, dst) in out.iter_mut().enumerate() {
            *dst = window
                .iter()
                .enumerate()
                .filter_map(|(j, w)| {
                    let idx = t as isize + center - j as isize;
                    (0..n_frames).contains(&idx).then(|| w * row[idx as usize])
                })
                .sum::<f64>();
        }
    }

    // L2-normalize each frame across pitch classes
    for mut column in smoothed.axis_iter_mut(Axis(1)) {
        let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            column.mapv_inplace(|v| v / norm);
        }
    }
    smoothed
}

/// `1 x frames` fraction of sign changes per frame.
///
/// Frames are centred with edge padding. Samples within `ZCR_THRESHOLD` of
/// zero count as zero, and zero counts as positive.
pub fn zero_crossing_rate(samples: &[f32]) -> Matrix {
    let pad = ZCR_FRAME_LENGTH / 2;
    let first = samples.first().copied().unwrap_or(0.0);
    let last = samples.last().copied().unwrap_or(0.0);

    let negative: Vec<bool> = std::iter::repeat_n(first, pad)
        .chain(samples.iter().copied())
        .chain(std::iter::repeat_n(last, pad))
        .map(|s| {
            let s = s as f64;
            s.abs() > ZCR_THRESHOLD && s < 0.0
        })
        .collect();

    let n_frames = 1 + (negative.len() - ZCR_FRAME_LENGTH) / HOP_LENGTH;
    let rates: Array1<f64> = (0..n_frames)
        .map(|t| {
            let frame = &negative[t * HOP_LENGTH..t * HOP_LENGTH + ZCR_FRAME_LENGTH];
            let crossings = frame.windows(2).filter(|w| w[0] != w[1]).count();
            crossings as f64 / ZCR_FRAME_LENGTH as f64
        })
        .collect();
    rates.insert_axis(Axis(0))
}
