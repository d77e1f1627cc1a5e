//! Offline audio feature extraction: tempo, RMS energy, spectral centroid,
//! zero-crossing rate (§4.3 Feature Extractor).
//!
//! Decode follows the teacher-adjacent symphonia pattern (probe, make a
//! decoder for the first non-null codec track, walk packets into an
//! interleaved `SampleBuffer<f32>`); tempo estimation adds a simplified
//! harmonic/percussive separation ahead of onset-autocorrelation, since a
//! plain broadband onset envelope is dominated by sustained harmonic content
//! on non-percussive material.

use std::path::Path;

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::types::WorkerError;
use crate::models::AudioFeatures;

/// §4.3 step 1: decode at most this much audio, downmixed to mono.
const MAX_DECODE_SECONDS: f64 = 120.0;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;

/// Median-filter half-window, in frames/bins, for harmonic/percussive split.
const MEDIAN_HALF_WINDOW: usize = 8;

const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

/// Extract the fixed four-dimensional feature vector from a normalized audio
/// file. Synchronous and CPU-bound — callers run this inside
/// `tokio::task::spawn_blocking`.
pub fn extract(path: &Path) -> Result<AudioFeatures, WorkerError> {
    let (samples, sample_rate) = decode_mono(path)?;
    if samples.len() < FFT_SIZE {
        return Err(WorkerError::FeatureExtractionFailed {
            message: format!(
                "decoded audio too short for analysis ({} samples, need at least {})",
                samples.len(),
                FFT_SIZE
            ),
        });
    }

    let zero_crossing_rate = zero_crossing_rate(&samples);

    let spectrogram = stft(&samples);
    let (harmonic, percussive) = harmonic_percussive_split(&spectrogram);

    let rms_energy = mean_rms(&spectrogram);
    let spectral_centroid = mean_spectral_centroid(&spectrogram, sample_rate);
    let tempo_bpm = estimate_tempo(&percussive, sample_rate);
    // harmonic component is computed for the separation itself; no harmonic-only
    // feature is reported, matching the fixed 4-tuple contract.
    let _ = &harmonic;

    Ok(AudioFeatures {
        tempo_bpm,
        rms_energy,
        spectral_centroid,
        zero_crossing_rate,
    })
}

fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), WorkerError> {
    let file = std::fs::File::open(path).map_err(|e| WorkerError::FeatureExtractionFailed {
        message: format!("failed to open {}: {e}", path.display()),
    })?;
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
        .map_err(|e| WorkerError::FeatureExtractionFailed {
            message: format!("failed to probe audio: {e}"),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| WorkerError::FeatureExtractionFailed {
            message: "no decodable audio track found".to_string(),
        })?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let source_channels = codec_params.channels.map(|c| c.count()).unwrap_or(2).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| WorkerError::FeatureExtractionFailed {
            message: format!("failed to create decoder: {e}"),
        })?;

    let max_samples = (MAX_DECODE_SECONDS * source_sample_rate as f64) as usize;
    let mut mono: Vec<f32> = Vec::new();

    loop {
        if mono.len() >= max_samples {
            break;
        }
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(_) => continue,
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let interleaved = sample_buf.samples();

        if source_channels == 1 {
            mono.extend_from_slice(interleaved);
        } else {
            for frame in interleaved.chunks(source_channels) {
                let sum: f32 = frame.iter().sum();
                mono.push(sum / source_channels as f32);
            }
        }
    }

    mono.truncate(max_samples);

    if mono.is_empty() {
        return Err(WorkerError::FeatureExtractionFailed {
            message: "decoder produced no samples".to_string(),
        });
    }

    Ok((mono, source_sample_rate))
}

fn zero_crossing_rate(samples: &[f32]) -> f64 {
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1).max(1) as f64
}

/// Magnitude spectrogram: one `FFT_SIZE/2 + 1`-bin row per hop, Hann-windowed.
fn stft(samples: &[f32]) -> Vec<Vec<f32>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let window: Vec<f32> = (0..FFT_SIZE)
        .map(|n| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / (FFT_SIZE as f32 - 1.0)).cos()
        })
        .collect();

    let bins = FFT_SIZE / 2 + 1;
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos + FFT_SIZE <= samples.len() {
        let mut buf: Vec<Complex32> = samples[pos..pos + FFT_SIZE]
            .iter()
            .zip(window.iter())
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);
        let magnitudes: Vec<f32> = buf[..bins].iter().map(|c| c.norm()).collect();
        frames.push(magnitudes);
        pos += HOP_SIZE;
    }

    frames
}

/// Simplified harmonic/percussive source separation via median filtering
/// (Fitzgerald, 2010): harmonic content is smooth along time at a fixed
/// frequency; percussive content is smooth along frequency at a fixed time.
/// A soft mask derived from the two median estimates splits the magnitude
/// spectrogram into harmonic and percussive components.
fn harmonic_percussive_split(spectrogram: &[Vec<f32>]) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    if spectrogram.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let n_frames = spectrogram.len();
    let n_bins = spectrogram[0].len();

    let mut harmonic_med = vec![vec![0.0f32; n_bins]; n_frames];
    for bin in 0..n_bins {
        let column: Vec<f32> = spectrogram.iter().map(|frame| frame[bin]).collect();
        for t in 0..n_frames {
            harmonic_med[t][bin] = windowed_median(&column, t, MEDIAN_HALF_WINDOW);
        }
    }

    let mut percussive_med = vec![vec![0.0f32; n_bins]; n_frames];
    for (t, frame) in spectrogram.iter().enumerate() {
        for bin in 0..n_bins {
            percussive_med[t][bin] = windowed_median(frame, bin, MEDIAN_HALF_WINDOW);
        }
    }

    let mut harmonic = vec![vec![0.0f32; n_bins]; n_frames];
    let mut percussive = vec![vec![0.0f32; n_bins]; n_frames];
    for t in 0..n_frames {
        for bin in 0..n_bins {
            let h = harmonic_med[t][bin];
            let p = percussive_med[t][bin];
            let total = h + p;
            let mask = if total > 0.0 { h / total } else { 0.5 };
            harmonic[t][bin] = spectrogram[t][bin] * mask;
            percussive[t][bin] = spectrogram[t][bin] * (1.0 - mask);
        }
    }

    (harmonic, percussive)
}

fn windowed_median(values: &[f32], center: usize, half_window: usize) -> f32 {
    let start = center.saturating_sub(half_window);
    let end = (center + half_window + 1).min(values.len());
    let mut window: Vec<f32> = values[start..end].to_vec();
    window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    window[window.len() / 2]
}

fn mean_rms(spectrogram: &[Vec<f32>]) -> f64 {
    if spectrogram.is_empty() {
        return 0.0;
    }
    let per_frame: Vec<f64> = spectrogram
        .iter()
        .map(|frame| {
            let sum_sq: f32 = frame.iter().map(|m| m * m).sum();
            ((sum_sq / frame.len() as f32).sqrt()) as f64
        })
        .collect();
    per_frame.iter().sum::<f64>() / per_frame.len() as f64
}

fn mean_spectral_centroid(spectrogram: &[Vec<f32>], sample_rate: u32) -> f64 {
    if spectrogram.is_empty() {
        return 0.0;
    }
    let bin_hz = sample_rate as f64 / FFT_SIZE as f64;
    let per_frame: Vec<f64> = spectrogram
        .iter()
        .map(|frame| {
            let mut weighted = 0.0f64;
            let mut total = 0.0f64;
            for (bin, &mag) in frame.iter().enumerate() {
                let freq = bin as f64 * bin_hz;
                weighted += freq * mag as f64;
                total += mag as f64;
            }
            if total > 0.0 {
                weighted / total
            } else {
                0.0
            }
        })
        .collect();
    per_frame.iter().sum::<f64>() / per_frame.len() as f64
}

/// Tempo from the percussive onset envelope's autocorrelation, restricted to
/// a plausible musical-tempo lag range.
fn estimate_tempo(percussive: &[Vec<f32>], sample_rate: u32) -> f64 {
    if percussive.len() < 2 {
        return 0.0;
    }

    let onset_envelope: Vec<f64> = percussive
        .iter()
        .map(|frame| frame.iter().map(|m| *m as f64).sum())
        .collect();

    let mean = onset_envelope.iter().sum::<f64>() / onset_envelope.len() as f64;
    let centered: Vec<f64> = onset_envelope.iter().map(|v| v - mean).collect();

    let frame_rate = sample_rate as f64 / HOP_SIZE as f64;
    let min_lag = (60.0 / MAX_BPM * frame_rate).round() as usize;
    let max_lag = ((60.0 / MIN_BPM * frame_rate).round() as usize).min(centered.len() - 1);

    if min_lag == 0 || min_lag >= max_lag {
        return 0.0;
    }

    let mut best_lag = min_lag;
    let mut best_corr = f64::MIN;
    for lag in min_lag..=max_lag {
        let corr: f64 = centered[..centered.len() - lag]
            .iter()
            .zip(centered[lag..].iter())
            .map(|(a, b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    if best_corr <= 0.0 {
        return 0.0;
    }

    (60.0 * frame_rate / best_lag as f64).clamp(MIN_BPM, MAX_BPM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_crossing_rate_is_zero_for_constant_signal() {
        let samples = vec![1.0f32; 1000];
        assert_eq!(zero_crossing_rate(&samples), 0.0);
    }

    #[test]
    fn zero_crossing_rate_is_one_for_alternating_signal() {
        let samples: Vec<f32> = (0..1000)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        assert_eq!(zero_crossing_rate(&samples), 1.0);
    }

    #[test]
    fn windowed_median_matches_full_sort_at_interior_points() {
        let values = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        // window covers the whole slice when half_window is large enough
        assert_eq!(windowed_median(&values, 2, 10), 3.0);
    }

    #[test]
    fn harmonic_percussive_split_preserves_energy() {
        let spectrogram = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let (harmonic, percussive) = harmonic_percussive_split(&spectrogram);
        for t in 0..2 {
            for bin in 0..3 {
                let sum = harmonic[t][bin] + percussive[t][bin];
                assert!((sum - spectrogram[t][bin]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn estimate_tempo_returns_zero_for_silence() {
        let percussive = vec![vec![0.0f32; 10]; 200];
        assert_eq!(estimate_tempo(&percussive, 44100), 0.0);
    }
}
