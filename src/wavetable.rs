//! A single-cycle wavetable built from a list of harmonics.
//!
//! The table holds exactly one period of a waveform and is meant to be played
//! as a loop. It is built by additive synthesis: every detected partial adds a
//! sine wave with its measured magnitude and phase. The summation runs in
//! double precision, the final table is stored as f32 samples.
//!
//! After building, the table is rotated so that it starts at the sample
//! closest to zero. This keeps the jump at the loop point small when the table
//! is repeated.

use super::Float;
use super::Harmonic;

use log::{debug, info, trace};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

use std::f64::consts::PI;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Wavetable {
    pub num_samples: usize, // Length of the single wave cycle
    pub table: Vec<f32>,
}

pub type WavetableRef = Arc<Wavetable>;

impl Wavetable {
    /// Wrap existing samples into a Wavetable.
    pub fn from_samples(table: Vec<f32>) -> Wavetable {
        Wavetable{num_samples: table.len(), table}
    }

    /// Build a wavetable with the given number of samples from a list of
    /// harmonics.
    ///
    /// The first harmonic is the reference. Every harmonic is placed at the
    /// integer multiple of the reference that is closest to its measured
    /// frequency, so slightly inharmonic partials still fit into one cycle.
    ///
    /// With normalize_power set, the table is divided by the L2 norm of the
    /// harmonic amplitudes. This is not guarded against a zero norm: if all
    /// amplitudes are zero, the table is filled with NaN.
    ///
    /// An empty list of harmonics results in silence.
    ///
    /// ```
    /// use wextract::{Harmonic, Wavetable};
    /// use rustfft::num_complex::Complex;
    ///
    /// let harmonics = vec![
    ///     Harmonic::new(100.0, Complex::new(1.0, 0.0)),
    ///     Harmonic::new(201.0, Complex::new(0.0, 0.5)),
    /// ];
    /// let wt = Wavetable::build(&harmonics, 2048, true);
    /// assert_eq!(wt.len(), 2048);
    /// ```
    pub fn build(harmonics: &[Harmonic], num_samples: usize, normalize_power: bool) -> Wavetable {
        if harmonics.is_empty() {
            debug!("No harmonics, creating silent table of {} samples", num_samples);
            return Wavetable::from_samples(vec![0.0; num_samples]);
        }
        let mut table = Wavetable::accumulate(harmonics, num_samples);
        if normalize_power {
            Wavetable::normalize_power(&mut table, harmonics);
        }
        let zero_index = Wavetable::find_zero_index(&table);
        table.rotate_left(zero_index);
        info!("Built table of {} samples from {} harmonics, starting at index {}",
            num_samples, harmonics.len(), zero_index);
        Wavetable::from_samples(table.iter().map(|s| *s as f32).collect())
    }

    // Sum up the sine waves of all harmonics.
    fn accumulate(harmonics: &[Harmonic], num_samples: usize) -> Vec<Float> {
        let mut table = vec![0.0; num_samples];
        let reference = harmonics[0].frequency;
        for h in harmonics {
            let freq_index = (h.frequency / reference).round() as Float;
            let magnitude = h.amplitude.norm() as Float;
            let phase = h.amplitude.arg() as Float;
            trace!("Harmonic at {} Hz ({}): {} exp(i {})", h.frequency, freq_index, magnitude, phase);
            Wavetable::add_sine_wave(&mut table, freq_index, magnitude, phase);
        }
        table
    }

    /// Add a sine wave with given frequency, amplitude and phase to a table.
    ///
    /// Frequency is relative to the buffer length, so a value of 1 will put one
    /// wave period into the table. The values are added to the values already
    /// in the table.
    ///
    /// ```
    /// use wextract::Wavetable;
    ///
    /// let mut table = vec![0.0; 4];
    /// Wavetable::add_sine_wave(&mut table, 1.0, 2.0, 0.0);
    /// assert!((table[1] - 2.0).abs() < 1e-12);
    /// ```
    pub fn add_sine_wave(table: &mut [Float], freq: Float, amplitude: Float, phase: Float) {
        let num_samples = table.len() as Float;
        let mult = freq * 2.0 * PI;
        for (i, sample) in table.iter_mut().enumerate() {
            let time = i as Float / num_samples;
            *sample += amplitude * (mult * time + phase).sin();
        }
    }

    // Divide the table by the L2 norm of the harmonic amplitudes.
    fn normalize_power(table: &mut [Float], harmonics: &[Harmonic]) {
        let squared_norm: Float = harmonics.iter()
            .map(|h| (h.amplitude.norm() as Float).powi(2))
            .sum();
        let norm = squared_norm.sqrt();
        debug!("Normalizing table by {}", norm);
        for sample in table.iter_mut() {
            *sample /= norm;
        }
    }

    // Index of the sample with the smallest absolute value.
    //
    // Returns the first one if several samples share the minimum, and 0 if
    // no sample compares (NaN table).
    fn find_zero_index(table: &[Float]) -> usize {
        let mut zero_index = 0;
        let mut zero_value = Float::INFINITY;
        for (i, sample) in table.iter().enumerate() {
            let abs_value = sample.abs();
            if abs_value < zero_value {
                zero_index = i;
                zero_value = abs_value;
            }
        }
        zero_index
    }

    pub fn len(&self) -> usize {
        self.num_samples
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }

    pub fn samples(&self) -> &[f32] {
        &self.table
    }

    /// Calculate the frequency spectrum of the table.
    ///
    /// Runs an FFT over one cycle. Bin k holds the component that completes k
    /// periods per table, so the harmonics used to build the table show up at
    /// their harmonic index.
    ///
    /// ```
    /// use wextract::{Harmonic, Wavetable};
    /// use rustfft::num_complex::Complex;
    ///
    /// let harmonics = vec![Harmonic::new(50.0, Complex::new(1.0, 0.0))];
    /// let spectrum = Wavetable::build(&harmonics, 256, true).get_freq_spectrum();
    /// assert!(spectrum[1].norm() > 100.0);
    /// ```
    pub fn get_freq_spectrum(&self) -> Vec<Complex<Float>> {
        let fft_len = self.num_samples;
        let mut buffer: Vec<Complex<Float>> = vec![Complex::zero(); fft_len];
        for (b, sample) in buffer.iter_mut().zip(self.table.iter()) {
            b.re = *sample as Float;
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);
        fft.process(&mut buffer);
        buffer
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn is_close_to(actual: Float, expected: Float, delta: Float, index: usize) -> bool {
    let diff = actual - expected;
    if diff > delta || diff < -delta {
        println!("{}: Expected {}, actual {}, delta {}", index, expected, actual, delta);
        false
    } else {
        true
    }
}

#[cfg(test)]
fn test_harmonics() -> Vec<Harmonic> {
    vec![
        Harmonic::new(110.0, Complex::new(0.8, 0.3)),
        Harmonic::new(221.5, Complex::new(-0.2, 0.4)),
        Harmonic::new(329.0, Complex::new(0.1, -0.25)),
        Harmonic::new(441.0, Complex::new(0.05, 0.05)),
    ]
}

#[test]
fn empty_harmonics_give_silence() {
    let wt = Wavetable::build(&[], 1024, true);
    assert!(wt.len() == 1024);
    assert!(wt.table == vec![0.0_f32; 1024]);
}

#[test]
fn table_is_rotated_to_smallest_sample() {
    let harmonics = test_harmonics();
    let num_samples = 512;
    let unrotated = Wavetable::accumulate(&harmonics, num_samples);
    let wt = Wavetable::build(&harmonics, num_samples, false);

    let zero_index = Wavetable::find_zero_index(&unrotated);
    let smallest = unrotated.iter().fold(Float::INFINITY, |m, s| m.min(s.abs()));
    assert!(unrotated[zero_index].abs() == smallest);
    assert!(wt.table[0] == unrotated[zero_index] as f32);

    // Cyclic permutation of the accumulated table
    for i in 0..num_samples {
        let expected = unrotated[(i + zero_index) % num_samples] as f32;
        assert!(wt.table[i] == expected);
    }
}

#[test]
fn power_is_normalized_by_amplitude_norm() {
    let harmonics = test_harmonics();
    let raw = Wavetable::build(&harmonics, 1024, false);
    let normalized = Wavetable::build(&harmonics, 1024, true);
    let norm = harmonics.iter()
        .map(|h| (h.amplitude.norm() as Float).powi(2))
        .sum::<Float>()
        .sqrt();
    for i in 0..1024 {
        assert!(is_close_to(normalized.table[i] as Float * norm, raw.table[i] as Float, 1e-5, i));
    }
}

#[test]
fn single_harmonic_gives_unit_sine() {
    let harmonics = vec![Harmonic::new(220.0, Complex::new(0.0, 3.0))];
    let wt = Wavetable::build(&harmonics, 2048, true);
    let max = wt.table.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    assert!(is_close_to(max as Float, 1.0, 1e-3, 0));
    assert!(wt.table[0].abs() < 1e-3);
}

#[test]
fn frequencies_are_snapped_to_harmonic_index() {
    // 2.4 times the reference rounds to the second harmonic
    let harmonics = vec![
        Harmonic::new(100.0, Complex::new(1.0, 0.0)),
        Harmonic::new(240.0, Complex::new(1.0, 0.0)),
    ];
    let spectrum = Wavetable::build(&harmonics, 256, false).get_freq_spectrum();
    assert!(is_close_to(spectrum[1].norm(), 128.0, 1e-3, 1));
    assert!(is_close_to(spectrum[2].norm(), 128.0, 1e-3, 2));
    assert!(is_close_to(spectrum[3].norm(), 0.0, 1e-3, 3));
}

#[test]
fn zero_amplitudes_are_not_guarded() {
    let harmonics = vec![Harmonic::new(100.0, Complex::new(0.0, 0.0))];
    let wt = Wavetable::build(&harmonics, 64, true);
    assert!(wt.len() == 64);
    assert!(wt.table.iter().all(|s| s.is_nan()));
}

#[test]
fn sine_wave_can_be_added() {
    let mut table = vec![0.0; 8];
    Wavetable::add_sine_wave(&mut table, 2.0, 1.0, 0.0);
    let expected = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0];
    for (i, s) in table.iter().enumerate() {
        assert!(is_close_to(*s, expected[i], 1e-12, i));
    }
}
