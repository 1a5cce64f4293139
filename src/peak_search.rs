//! Estimates frequency, magnitude and phase of a single partial.
//!
//! An FFT only resolves frequencies down to the bin spacing of its block
//! length, which is far too coarse for a window of a few pitch periods. The
//! search here instead correlates the signal with complex exponentials on a
//! fine grid around a coarse target frequency and picks the best match. Each
//! grid point is a single-bin Fourier projection, so the resolution depends
//! only on the grid and not on the length of the window.
//!
//! The grid is spaced logarithmically in cents. With the default settings it
//! covers +/- 20 cents around the target with two points per cent.

use super::Float;

use log::trace;
use rustfft::num_complex::Complex;
use serde::{Serialize, Deserialize};

use std::f64::consts::PI;

pub const DEFAULT_CENTS_RANGE: f32 = 20.0;
pub const DEFAULT_POINTS_PER_CENTS: usize = 2;

/// A single detected partial.
///
/// The amplitude encodes magnitude and phase of the partial relative to the
/// start of the analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    pub frequency: f32,
    pub amplitude: Complex<f32>,
}

impl Harmonic {
    pub fn new(frequency: f32, amplitude: Complex<f32>) -> Self {
        Harmonic{frequency, amplitude}
    }

    pub fn magnitude(&self) -> f32 {
        self.amplitude.norm()
    }

    pub fn phase(&self) -> f32 {
        self.amplitude.arg()
    }
}

/// Partials in the order they were found, the first one being the reference.
pub type HarmonicVector = Vec<Harmonic>;

/// How the number of grid points is derived from the search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridDensity {
    /// points_per_cents points for every cent of the range
    PerCent,
    /// points_per_cents points on each side of the target, regardless of range
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSearch {
    pub cents_range: f32,       // Search range on each side of the target
    pub points_per_cents: usize,
    pub density: GridDensity,
}

impl Default for PeakSearch {
    fn default() -> Self {
        PeakSearch::new(DEFAULT_CENTS_RANGE, DEFAULT_POINTS_PER_CENTS)
    }
}

impl PeakSearch {
    pub fn new(cents_range: f32, points_per_cents: usize) -> Self {
        PeakSearch{cents_range, points_per_cents, density: GridDensity::PerCent}
    }

    pub fn with_density(mut self, density: GridDensity) -> Self {
        self.density = density;
        self
    }

    /// Number of frequencies that are tested.
    ///
    /// The grid always includes both ends of the range and the target
    /// frequency itself.
    pub fn num_points(&self) -> usize {
        match self.density {
            GridDensity::PerCent => self.points_per_cents
                .saturating_mul(self.cents_range as usize)
                .saturating_mul(2)
                .saturating_add(1),
            GridDensity::Total => self.points_per_cents.saturating_mul(2).saturating_add(1),
        }
    }

    /// Calculate the search grid around the given frequency.
    ///
    /// ```
    /// use wextract::PeakSearch;
    ///
    /// let grid = PeakSearch::new(20.0, 2).frequency_grid(440.0);
    /// assert_eq!(grid.len(), 81);
    /// assert!((grid[40] - 440.0).abs() < 1e-9);
    /// ```
    pub fn frequency_grid(&self, coarse_frequency: f32) -> Vec<Float> {
        let num_points = self.num_points();
        let log_freq = (coarse_frequency as Float).log2();
        if num_points < 2 {
            return vec![coarse_frequency as Float];
        }
        let range = self.cents_range as Float;
        let step = 2.0 * range / (num_points - 1) as Float;
        let two: Float = 2.0;
        (0..num_points)
            .map(|i| two.powf(log_freq + (i as Float * step - range) / 1200.0))
            .collect()
    }

    /// Find the strongest partial close to the coarse frequency.
    ///
    /// Returns the grid frequency with the largest correlation together with
    /// the raw correlation value. The magnitude is not normalized, so it grows
    /// with the window length. The phase uses the positive exponent
    /// convention of project(): a partial cos(wt - p) shows up with phase p.
    ///
    /// If no grid point correlates at all (silent signal), the lowest grid
    /// frequency is returned with zero amplitude.
    pub fn search(&self, signal: &[f32], coarse_frequency: f32, sample_rate: f32) -> Harmonic {
        let grid = self.frequency_grid(coarse_frequency);
        let sample_rate = sample_rate as Float;
        let mut max_index = 0;
        let mut max_magnitude = 0.0;
        let mut max_projection = Complex::new(0.0, 0.0);
        for (i, freq) in grid.iter().enumerate() {
            let projection = PeakSearch::project(signal, *freq, sample_rate);
            let magnitude = projection.norm();
            if magnitude > max_magnitude {
                max_index = i;
                max_magnitude = magnitude;
                max_projection = projection;
            }
        }
        trace!("Peak near {} Hz at {} Hz, magnitude {}",
            coarse_frequency, grid[max_index], max_magnitude);
        Harmonic::new(grid[max_index] as f32,
                      Complex::new(max_projection.re as f32, max_projection.im as f32))
    }

    /// Search with explicit settings for a single call.
    ///
    /// ```
    /// use wextract::PeakSearch;
    ///
    /// let sample_rate = 8000.0;
    /// let signal: Vec<f32> = (0..800)
    ///     .map(|i| (2.0 * std::f32::consts::PI * 500.0 * i as f32 / sample_rate).cos())
    ///     .collect();
    /// let peak = PeakSearch::estimate_peak(&signal, 490.0, sample_rate, 50.0, 4);
    /// assert!((peak.frequency - 500.0).abs() < 1.0);
    /// ```
    pub fn estimate_peak(signal: &[f32],
                         coarse_frequency: f32,
                         sample_rate: f32,
                         cents_range: f32,
                         points_per_cents: usize) -> Harmonic {
        PeakSearch::new(cents_range, points_per_cents).search(signal, coarse_frequency, sample_rate)
    }

    /// Correlate the signal with exp(2 pi i f t).
    ///
    /// The exponential is advanced by multiplying a unit phasor with a
    /// constant rotation per sample instead of evaluating sin and cos for
    /// every sample.
    pub fn project(signal: &[f32], frequency: Float, sample_rate: Float) -> Complex<Float> {
        let rotation = Complex::from_polar(1.0, 2.0 * PI * frequency / sample_rate);
        let mut phasor = Complex::new(1.0, 0.0);
        let mut sum = Complex::new(0.0, 0.0);
        for sample in signal {
            sum += phasor * *sample as Float;
            phasor *= rotation;
        }
        sum
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn is_close_to(actual: Float, expected: Float, delta: Float) -> bool {
    let diff = actual - expected;
    if diff > delta || diff < -delta {
        println!("Expected {}, actual {}, delta {}", expected, actual, delta);
        false
    } else {
        true
    }
}

#[cfg(test)]
fn sinusoid(freq: Float, phase: Float, sample_rate: Float, duration: Float, wave_func: fn(Float) -> Float) -> Vec<f32> {
    let num_samples = (duration * sample_rate) as usize;
    (0..num_samples)
        .map(|i| wave_func(2.0 * PI * freq * i as Float / sample_rate + phase) as f32)
        .collect()
}

#[test]
fn grid_is_centered_on_coarse_frequency() {
    let search = PeakSearch::new(20.0, 2);
    let grid = search.frequency_grid(220.0);
    assert!(grid.len() == 81);
    assert!(is_close_to(grid[40], 220.0, 1e-9));
    assert!(is_close_to(grid[0], 220.0 * (2.0 as Float).powf(-20.0 / 1200.0), 1e-9));
    assert!(is_close_to(grid[80], 220.0 * (2.0 as Float).powf(20.0 / 1200.0), 1e-9));
    for pair in grid.windows(2) {
        assert!(pair[1] > pair[0]);
    }
}

#[test]
fn total_density_ignores_range() {
    let search = PeakSearch::new(50.0, 3).with_density(GridDensity::Total);
    assert!(search.num_points() == 7);
    let grid = search.frequency_grid(100.0);
    assert!(is_close_to(grid[3], 100.0, 1e-9));
    assert!(is_close_to(grid[6], 100.0 * (2.0 as Float).powf(50.0 / 1200.0), 1e-9));
}

#[test]
fn huge_density_does_not_overflow() {
    let search = PeakSearch::new(20.0, usize::MAX);
    assert!(search.num_points() == usize::MAX);
    assert!(search.with_density(GridDensity::Total).num_points() == usize::MAX);
}

#[test]
fn frequency_and_phase_of_sinusoid_are_found() {
    let phase = 0.3 * PI;
    // With the positive exponent, cos(wt - p) correlates at angle p
    let signal = sinusoid(220.0, -phase, 44100.0, 0.05, Float::cos);
    assert!(signal.len() == 2205);
    let peak = PeakSearch::estimate_peak(&signal, 220.0, 44100.0, 50.0, 100);
    // The window holds 11 periods, so the negative frequency image leaks into
    // the projection and moves the peak by ~0.08 Hz, far more than the grid
    // step of ~0.0013 Hz.
    assert!(is_close_to(peak.frequency as Float, 220.0, 0.25));
    assert!(is_close_to(peak.phase() as Float, phase, 0.05));
    // Unnormalized: half the window length for a unit amplitude
    assert!(is_close_to(peak.magnitude() as Float, 1102.5, 11.0));
}

#[test]
fn sine_phase_is_mirrored_around_quarter_period() {
    let phase = 0.3 * PI;
    let signal = sinusoid(220.0, phase, 44100.0, 0.05, Float::sin);
    let peak = PeakSearch::estimate_peak(&signal, 220.0, 44100.0, 50.0, 100);
    assert!(is_close_to(peak.frequency as Float, 220.0, 0.25));
    assert!(is_close_to(peak.phase() as Float, PI / 2.0 - phase, 0.05));
}

#[test]
fn offset_target_snaps_to_partial() {
    let signal = sinusoid(1000.0, 0.0, 48000.0, 0.1, Float::sin);
    let peak = PeakSearch::default().search(&signal, 1008.0, 48000.0);
    assert!(is_close_to(peak.frequency as Float, 1000.0, 2.0));
}

#[test]
fn silent_signal_returns_lowest_grid_point() {
    let signal = vec![0.0; 256];
    let search = PeakSearch::default();
    let peak = search.search(&signal, 440.0, 44100.0);
    let grid = search.frequency_grid(440.0);
    assert!(peak.frequency == grid[0] as f32);
    assert!(peak.magnitude() == 0.0);
}
