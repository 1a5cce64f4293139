//! Locates the partials of a pitched tone.
//!
//! Instead of picking the strongest peaks of a global spectrum, the scanner
//! assumes a root frequency and searches close to every integer multiple of
//! it. This keeps strong non-harmonic content (noise, close inharmonic
//! partials) out of the result and bounds the number of partials found.

use super::Float;
use super::{Harmonic, HarmonicVector, PeakSearch};

use log::{debug, info};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

// Search range used to refine the FFT bin of the root estimate
const ROOT_SEARCH_CENTS: f32 = 100.0;
const MIN_FFT_LEN: usize = 4096;

pub struct HarmonicScanner {
    search: PeakSearch,
}

impl Default for HarmonicScanner {
    fn default() -> Self {
        HarmonicScanner::new(PeakSearch::default())
    }
}

impl HarmonicScanner {
    pub fn new(search: PeakSearch) -> Self {
        HarmonicScanner{search}
    }

    /// Scan the harmonic series of the given root frequency.
    ///
    /// Candidates are the multiples k * root_frequency for k = 1, 2, ... as
    /// long as they stay below both the Nyquist frequency and
    /// root_frequency * max_harmonics. The harmonic cap is exclusive, so
    /// max_harmonics = 5 scans the first four multiples. The
    /// peak search result for a candidate is dropped if it lies within half a
    /// root frequency of the previously accepted partial, which happens when
    /// the search snaps back to a partial that was already found.
    ///
    /// The measured frequencies may deviate from the exact multiples, which
    /// keeps the inharmonicity of real instruments.
    ///
    /// ```
    /// use wextract::HarmonicScanner;
    ///
    /// let sample_rate = 8000.0;
    /// let signal: Vec<f32> = (0..800)
    ///     .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / sample_rate).sin())
    ///     .collect();
    /// let harmonics = HarmonicScanner::default().scan(&signal, sample_rate, 200.0, 5);
    /// assert_eq!(harmonics.len(), 4);
    /// assert!((harmonics[0].frequency - 200.0).abs() < 1.0);
    /// ```
    pub fn scan(&self,
                signal: &[f32],
                sample_rate: f32,
                root_frequency: f32,
                max_harmonics: usize) -> HarmonicVector {
        let limit = (sample_rate / 2.0).min(root_frequency * max_harmonics as f32);
        let mut harmonics = HarmonicVector::new();
        let mut k: usize = 1;
        loop {
            let candidate = root_frequency * k as f32;
            if !(candidate < limit) { // Also stops for a NaN root
                break;
            }
            let harmonic = self.search.search(signal, candidate, sample_rate);
            let accepted = match harmonics.last() {
                Some(previous) => (harmonic.frequency - previous.frequency).abs() > root_frequency / 2.0,
                None => true,
            };
            if accepted {
                debug!("Harmonic {} at {} Hz: {} exp(i {})",
                    k, harmonic.frequency, harmonic.magnitude(), harmonic.phase());
                harmonics.push(harmonic);
            } else {
                debug!("Harmonic {} at {} Hz duplicates previous partial, skipping", k, harmonic.frequency);
            }
            k += 1;
        }
        info!("Found {} harmonics for root {} Hz", harmonics.len(), root_frequency);
        harmonics
    }

    /// Estimate the root frequency of a tone.
    ///
    /// Takes the strongest bin of a zero-padded FFT above min_frequency and
    /// refines it with the peak search. This assumes the fundamental is the
    /// strongest partial of the tone. Returns None for an empty or silent
    /// signal.
    pub fn estimate_root(&self, signal: &[f32], sample_rate: f32, min_frequency: f32) -> Option<f32> {
        if signal.is_empty() {
            return None;
        }
        let fft_len = signal.len().next_power_of_two().max(MIN_FFT_LEN);
        let mut buffer: Vec<Complex<Float>> = vec![Complex::zero(); fft_len];
        for (b, sample) in buffer.iter_mut().zip(signal.iter()) {
            b.re = *sample as Float;
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);
        fft.process(&mut buffer);

        let bin_width = sample_rate as Float / fft_len as Float;
        let first_bin = ((min_frequency as Float / bin_width).ceil() as usize).max(1);
        let mut max_bin = 0;
        let mut max_magnitude = 0.0;
        for (bin, value) in buffer.iter().enumerate().take(fft_len / 2).skip(first_bin) {
            let magnitude = value.norm();
            if magnitude > max_magnitude {
                max_bin = bin;
                max_magnitude = magnitude;
            }
        }
        if max_bin == 0 {
            return None;
        }
        let coarse = (max_bin as Float * bin_width) as f32;
        let refined = PeakSearch::new(ROOT_SEARCH_CENTS, self.search.points_per_cents)
            .search(signal, coarse, sample_rate);
        info!("Estimated root frequency {} Hz (FFT bin at {} Hz)", refined.frequency, coarse);
        Some(refined.frequency)
    }
}

/// Convert a MIDI note number to a frequency, with A4 (69) at 440 Hz.
///
/// ```
/// use wextract::note_to_frequency;
///
/// assert_eq!(note_to_frequency(57), 220.0);
/// ```
pub fn note_to_frequency(note: u8) -> f32 {
    let two: Float = 2.0;
    (440.0 * two.powf((note as Float - 69.0) / 12.0)) as f32
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn harmonic_tone(root: Float, num_harmonics: usize, sample_rate: Float, duration: Float) -> Vec<f32> {
    use std::f64::consts::PI;
    let num_samples = (sample_rate * duration) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as Float / sample_rate;
            (1..=num_harmonics)
                .map(|k| (2.0 * PI * root * k as Float * t + 0.1 * k as Float).sin() / k as Float)
                .sum::<Float>() as f32
        })
        .collect()
}

#[test]
fn exact_harmonics_are_recovered() {
    let signal = harmonic_tone(100.0, 8, 44100.0, 0.1);
    let harmonics = HarmonicScanner::default().scan(&signal, 44100.0, 100.0, 9);
    assert!(harmonics.len() == 8);
    for (i, h) in harmonics.iter().enumerate() {
        let expected = 100.0 * (i + 1) as f32;
        println!("{}: {} Hz, magnitude {}", i, h.frequency, h.magnitude());
        assert!((h.frequency - expected).abs() < 2.0);
    }
    for pair in harmonics.windows(2) {
        assert!(pair[1].frequency > pair[0].frequency);
    }
    // Amplitudes fall off with 1/k
    assert!(harmonics[0].magnitude() > harmonics[1].magnitude());
    assert!(harmonics[1].magnitude() > harmonics[7].magnitude());
}

#[test]
fn scan_stops_below_nyquist() {
    let signal = harmonic_tone(100.0, 3, 1000.0, 1.0);
    let harmonics = HarmonicScanner::default().scan(&signal, 1000.0, 100.0, 64);
    assert!(harmonics.len() == 4);
    assert!(harmonics.iter().all(|h| h.frequency < 500.0));
}

#[test]
fn duplicate_detections_are_rejected() {
    // A search range of one octave lets the second candidate snap back to the
    // fundamental.
    let scanner = HarmonicScanner::new(PeakSearch::new(1200.0, 1));
    let signal = harmonic_tone(100.0, 1, 8000.0, 0.1);
    let harmonics = scanner.scan(&signal, 8000.0, 100.0, 3);
    assert!(harmonics.len() == 1);
    assert!((harmonics[0].frequency - 100.0).abs() < 2.0);
}

#[test]
fn consecutive_harmonics_are_half_a_root_apart() {
    let signal = harmonic_tone(110.0, 12, 22050.0, 0.2);
    let harmonics = HarmonicScanner::new(PeakSearch::new(300.0, 1)).scan(&signal, 22050.0, 110.0, 16);
    assert!(!harmonics.is_empty());
    for pair in harmonics.windows(2) {
        assert!((pair[1].frequency - pair[0].frequency).abs() > 55.0);
    }
}

#[test]
fn harmonic_cap_is_exclusive() {
    // Tone has more partials than the cap allows
    let signal = harmonic_tone(100.0, 12, 44100.0, 0.1);
    let harmonics = HarmonicScanner::default().scan(&signal, 44100.0, 100.0, 8);
    assert!(harmonics.len() == 7);
    let last = harmonics[harmonics.len() - 1].frequency;
    println!("Last harmonic at {} Hz", last);
    assert!(last < 790.0);
    assert!((last - 700.0).abs() < 2.0);
}

#[test]
fn zero_harmonics_give_empty_result() {
    let signal = harmonic_tone(100.0, 4, 8000.0, 0.1);
    assert!(HarmonicScanner::default().scan(&signal, 8000.0, 100.0, 0).is_empty());
}

#[test]
fn root_is_estimated_from_strongest_partial() {
    let signal = harmonic_tone(100.0, 8, 44100.0, 0.1);
    let root = HarmonicScanner::default().estimate_root(&signal, 44100.0, 20.0);
    match root {
        Some(f) => assert!((f - 100.0).abs() < 1.5),
        None => panic!("No root found"),
    }
}

#[test]
fn silent_signal_has_no_root() {
    let scanner = HarmonicScanner::default();
    assert!(scanner.estimate_root(&[], 44100.0, 20.0).is_none());
    assert!(scanner.estimate_root(&vec![0.0; 1000], 44100.0, 20.0).is_none());
}

#[test]
fn notes_are_converted_to_frequencies() {
    assert!(note_to_frequency(69) == 440.0);
    assert!(note_to_frequency(81) == 880.0);
    assert!((note_to_frequency(60) - 261.6256).abs() < 0.001);
    assert!((note_to_frequency(36) - 65.4064).abs() < 0.001);
}
