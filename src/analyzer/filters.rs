//! Windows and filterbanks shared by the spectral features.
//!
//! Mel scale is the Slaney variant: linear below 1 kHz, logarithmic above,
//! with area-normalized triangular filters.

use ndarray::{Array2, Axis};
use std::f64::consts::PI;

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_logstep() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_logstep()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_logstep() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        MEL_F_SP * mel
    }
}

/// Center frequency of each non-negative FFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let step = sample_rate as f64 / n_fft as f64;
    (0..=n_fft / 2).map(|k| k as f64 * step).collect()
}

/// `n` frequencies evenly spaced on the mel scale between `fmin` and `fmax`.
pub fn mel_frequencies(n: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    let lo = hz_to_mel(fmin);
    let hi = hz_to_mel(fmax);
    if n == 1 {
        return vec![mel_to_hz(lo)];
    }
    (0..n)
        .map(|i| mel_to_hz(lo + (hi - lo) * i as f64 / (n - 1) as f64))
        .collect()
}

/// Hann window. `periodic` is the FFT-friendly variant (length n+1 with the
/// last sample dropped); otherwise the symmetric variant with zero endpoints.
pub fn hann(n: usize, periodic: bool) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let denom = if periodic { n as f64 } else { (n - 1) as f64 };
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Triangular mel filters as an `n_mels x (n_fft / 2 + 1)` weight matrix.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f64> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let mel_f = mel_frequencies(n_mels + 2, fmin, fmax);

    Array2::from_shape_fn((n_mels, fft_freqs.len()), |(i, k)| {
        let lower = (fft_freqs[k] - mel_f[i]) / (mel_f[i + 1] - mel_f[i]);
        let upper = (mel_f[i + 2] - fft_freqs[k]) / (mel_f[i + 2] - mel_f[i + 1]);
        let enorm = 2.0 / (mel_f[i + 2] - mel_f[i]);
        lower.min(upper).max(0.0) * enorm
    })
}

/// C1, the lowest pitch the chroma filterbank covers.
pub const CHROMA_FMIN: f64 = 32.703_195_662_574_83;
/// C8; bins at or above it carry no chroma weight (seven octaves from C1).
pub const CHROMA_FMAX: f64 = 4_186.009_044_809_578;

/// Pitch-class filterbank for STFT bins: `n_chroma x (n_fft / 2 + 1)`.
///
/// Each bin gets a Gaussian bump around its pitch class, columns are
/// L2-normalized, then weighted by a Gaussian over octaves centred on
/// octave 5 with a two-octave spread. Bins outside C1..B7 get no weight.
/// Row 0 is C.
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize, n_chroma: usize) -> Array2<f64> {
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;
    let nc = n_chroma as f64;
    let a440_base = 440.0 / 16.0;

    // Fractional chroma bin of every FFT bin; bin 0 is placed 1.5 octaves below bin 1
    let mut frqbins: Vec<f64> = Vec::with_capacity(n_fft);
    for k in 1..n_fft {
        let f = k as f64 * sample_rate as f64 / n_fft as f64;
        frqbins.push(nc * (f / a440_base).log2());
    }
    frqbins.insert(0, frqbins[0] - 1.5 * nc);

    let mut binwidth: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidth.push(1.0);

    let half = (nc / 2.0).round();
    let mut wts = Array2::from_shape_fn((n_chroma, n_fft), |(c, i)| {
        let d = (frqbins[i] - c as f64 + half + 10.0 * nc).rem_euclid(nc) - half;
        (-0.5 * (2.0 * d / binwidth[i]).powi(2)).exp()
    });

    for (i, mut column) in wts.axis_iter_mut(Axis(1)).enumerate() {
        let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        let freq = i as f64 * sample_rate as f64 / n_fft as f64;
        let octave_weight = if (CHROMA_FMIN..CHROMA_FMAX).contains(&freq) {
            (-0.5 * ((frqbins[i] / nc - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp()
        } else {
            0.0
        };
        let scale = if norm > f64::MIN_POSITIVE {
            octave_weight / norm
        } else {
            octave_weight
        };
        column.mapv_inplace(|w| w * scale);
    }

    // Shift so that row 0 is C rather than A
    let shift = 3 * (n_chroma / 12);
    let n_bins = n_fft / 2 + 1;
    Array2::from_shape_fn((n_chroma, n_bins), |(c, k)| wts[[(c + shift) % n_chroma, k]])
}
