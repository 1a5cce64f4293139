//! Extracts a wavetable from a region of a recorded tone.
//!
//! Runs the complete chain: cut the analysis window out of the sample buffer,
//! determine the root frequency, scan the harmonic series and build the
//! table. All parameters come from ExtractSettings, which can be loaded from
//! a JSON file.

use super::{GridDensity, HarmonicScanner, HarmonicVector, PeakSearch, SampleBuffer};
use super::{Wavetable, WavetableRef, WtError};
use super::note_to_frequency;

use log::{debug, error, info};
use serde::{Serialize, Deserialize};

use std::fs;
use std::sync::Arc;

// Lowest root frequency considered when estimating the root
const MIN_ROOT_FREQUENCY: f32 = 20.0;

// Upper bounds for settings that size allocations or the search effort
const MAX_CENTS_RANGE: f32 = 1200.0;
const MAX_GRID_POINTS: usize = 100_000;
const MAX_TABLE_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub region_start: f64,          // Start of analysis window in seconds
    pub region_end: f64,            // End of analysis window in seconds
    pub channel: usize,
    pub root_frequency: Option<f32>,
    pub root_note: Option<u8>,      // MIDI note, used if root_frequency is not set
    pub max_harmonics: usize,
    pub cents_range: f32,
    pub points_per_cents: usize,
    pub grid_density: GridDensity,
    pub table_size: usize,
    pub normalize_power: bool,
    pub output_bits: u16,           // 16 for PCM, 32 for float
    pub output_sample_rate: u32,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        ExtractSettings{
            region_start: 1.0,
            region_end: 2.0,
            channel: 0,
            root_frequency: None,
            root_note: None,
            max_harmonics: 64,
            cents_range: 20.0,
            points_per_cents: 2,
            grid_density: GridDensity::PerCent,
            table_size: 2048,
            normalize_power: true,
            output_bits: 32,
            output_sample_rate: 44100,
        }
    }
}

impl ExtractSettings {
    /// Load settings from a JSON file.
    ///
    /// Fields missing in the file keep their default values.
    pub fn from_file(filename: &str) -> Result<Self, WtError> {
        info!("Reading settings from [{}]", filename);
        let content = fs::read_to_string(filename)?;
        ExtractSettings::from_json(&content)
    }

    /// Parse settings from a JSON string.
    ///
    /// ```
    /// use wextract::ExtractSettings;
    ///
    /// let settings = ExtractSettings::from_json(r#"{"root_note": 45, "table_size": 1024}"#).unwrap();
    /// assert_eq!(settings.root_note, Some(45));
    /// assert_eq!(settings.table_size, 1024);
    /// assert_eq!(settings.max_harmonics, 64);
    /// ```
    pub fn from_json(content: &str) -> Result<Self, WtError> {
        let settings: ExtractSettings = serde_json::from_str(content).map_err(|err| {
            error!("Unable to parse settings: {}", err);
            WtError::from(err)
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, WtError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that all values are usable by the pipeline.
    ///
    /// The channel can only be checked against an actual buffer, this
    /// happens in WtExtractor::extract().
    pub fn validate(&self) -> Result<(), WtError> {
        let fail = |msg: String| {
            error!("Invalid settings: {}", msg);
            Err(WtError::InvalidSettings(msg))
        };
        if !self.region_start.is_finite() || !self.region_end.is_finite()
                || self.region_start < 0.0 || self.region_end < 0.0 {
            return fail(format!("Invalid region {}s - {}s", self.region_start, self.region_end));
        }
        if let Some(freq) = self.root_frequency {
            if !freq.is_finite() || freq <= 0.0 {
                return fail(format!("Root frequency must be positive, got {}", freq));
            }
        }
        if let Some(note) = self.root_note {
            if note > 127 {
                return fail(format!("Root note must be a MIDI note, got {}", note));
            }
        }
        if !self.cents_range.is_finite() || self.cents_range <= 0.0 {
            return fail(format!("Cents range must be positive, got {}", self.cents_range));
        }
        if self.cents_range > MAX_CENTS_RANGE {
            return fail(format!("Cents range must be at most {}, got {}", MAX_CENTS_RANGE, self.cents_range));
        }
        if self.points_per_cents == 0 {
            return fail("Points per cents must be positive".to_string());
        }
        let num_points = self.peak_search().num_points();
        if num_points > MAX_GRID_POINTS {
            return fail(format!("Search grid of {} points exceeds {}", num_points, MAX_GRID_POINTS));
        }
        if self.table_size == 0 || self.table_size > MAX_TABLE_SIZE {
            return fail(format!("Table size must be 1 - {}, got {}", MAX_TABLE_SIZE, self.table_size));
        }
        if self.output_bits != 16 && self.output_bits != 32 {
            return fail(format!("Output bit depth must be 16 or 32, got {}", self.output_bits));
        }
        if self.output_sample_rate == 0 {
            return fail("Output sample rate must be positive".to_string());
        }
        Ok(())
    }

    pub fn peak_search(&self) -> PeakSearch {
        PeakSearch::new(self.cents_range, self.points_per_cents).with_density(self.grid_density)
    }
}

pub struct WtExtractor {
    settings: ExtractSettings,
    scanner: HarmonicScanner,
}

impl WtExtractor {
    /// Create an extractor with validated settings.
    ///
    /// ```
    /// use wextract::{ExtractSettings, WtExtractor};
    ///
    /// let mut settings = ExtractSettings::default();
    /// settings.table_size = 0;
    /// assert!(WtExtractor::new(settings).is_err());
    /// ```
    pub fn new(settings: ExtractSettings) -> Result<Self, WtError> {
        settings.validate()?;
        let scanner = HarmonicScanner::new(settings.peak_search());
        Ok(WtExtractor{settings, scanner})
    }

    pub fn get_settings(&self) -> &ExtractSettings {
        &self.settings
    }

    /// Extract a wavetable from the configured region of the buffer.
    ///
    /// Returns the table together with the harmonics it was built from.
    ///
    /// ```
    /// use wextract::{ExtractSettings, SampleBuffer, WtExtractor};
    ///
    /// let sample_rate = 8000;
    /// let samples: Vec<f32> = (0..8000)
    ///     .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / sample_rate as f32).sin())
    ///     .collect();
    /// let buffer = SampleBuffer::new(samples, 1, sample_rate);
    ///
    /// let mut settings = ExtractSettings::default();
    /// settings.region_start = 0.25;
    /// settings.region_end = 0.5;
    /// settings.root_frequency = Some(200.0);
    /// settings.max_harmonics = 5;
    ///
    /// let extractor = WtExtractor::new(settings).unwrap();
    /// let (table, harmonics) = extractor.extract(&buffer).unwrap();
    /// assert_eq!(table.len(), 2048);
    /// assert_eq!(harmonics.len(), 4);
    /// ```
    pub fn extract(&self, buffer: &SampleBuffer) -> Result<(WavetableRef, HarmonicVector), WtError> {
        let settings = &self.settings;
        if settings.channel >= buffer.num_channels {
            error!("Channel {} not available, buffer has {} channels", settings.channel, buffer.num_channels);
            return Err(WtError::InvalidSettings(
                format!("Channel {} out of range ({} channels)", settings.channel, buffer.num_channels)));
        }
        if buffer.sample_rate == 0 {
            return Err(WtError::InvalidFile("Sample rate is zero".to_string()));
        }
        let signal = buffer.extract(settings.region_start, settings.region_end, settings.channel);
        if signal.is_empty() {
            error!("Region {}s - {}s is empty, buffer is {}s long",
                settings.region_start, settings.region_end, buffer.duration());
            return Err(WtError::EmptyRegion{start: settings.region_start, end: settings.region_end});
        }
        info!("Analyzing {} samples of channel {}", signal.len(), settings.channel);

        let sample_rate = buffer.sample_rate as f32;
        let root_frequency = self.resolve_root(&signal, sample_rate)?;
        let harmonics = self.scanner.scan(&signal, sample_rate, root_frequency, settings.max_harmonics);
        let table = Wavetable::build(&harmonics, settings.table_size, settings.normalize_power);
        Ok((Arc::new(table), harmonics))
    }

    /// Determine the root frequency to scan.
    ///
    /// A configured frequency wins over a configured note. Without either,
    /// the root is estimated from the signal.
    pub fn resolve_root(&self, signal: &[f32], sample_rate: f32) -> Result<f32, WtError> {
        if let Some(freq) = self.settings.root_frequency {
            debug!("Using configured root frequency {} Hz", freq);
            return Ok(freq);
        }
        if let Some(note) = self.settings.root_note {
            let freq = note_to_frequency(note);
            debug!("Using root note {} = {} Hz", note, freq);
            return Ok(freq);
        }
        match self.scanner.estimate_root(signal, sample_rate, MIN_ROOT_FREQUENCY) {
            Some(freq) => Ok(freq),
            None => {
                error!("Unable to estimate root frequency");
                Err(WtError::NoRootFrequency)
            }
        }
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn stereo_tone(root: f64, num_harmonics: usize, sample_rate: u32, duration: f64) -> SampleBuffer {
    use std::f64::consts::PI;
    let num_frames = (sample_rate as f64 * duration) as usize;
    let mut samples = Vec::with_capacity(num_frames * 2);
    for i in 0..num_frames {
        let t = i as f64 / sample_rate as f64;
        let tone: f64 = (1..=num_harmonics)
            .map(|k| (2.0 * PI * root * k as f64 * t).sin() / k as f64)
            .sum();
        samples.push(0.0); // Silent left channel
        samples.push((tone * 0.5) as f32);
    }
    SampleBuffer::new(samples, 2, sample_rate)
}

#[cfg(test)]
fn test_settings() -> ExtractSettings {
    let mut settings = ExtractSettings::default();
    settings.region_start = 0.1;
    settings.region_end = 0.2;
    settings.channel = 1;
    settings.max_harmonics = 9;
    settings
}

#[test]
fn missing_fields_use_defaults() {
    let settings = ExtractSettings::from_json("{}").unwrap();
    assert!(settings == ExtractSettings::default());
    assert!(settings.region_start == 1.0);
    assert!(settings.region_end == 2.0);
    assert!(settings.table_size == 2048);
    assert!(settings.output_bits == 32);
    assert!(settings.output_sample_rate == 44100);
    assert!(settings.normalize_power);
}

#[test]
fn settings_survive_json() {
    let mut settings = test_settings();
    settings.root_frequency = Some(123.5);
    settings.grid_density = GridDensity::Total;
    let json = settings.to_json().unwrap();
    assert!(ExtractSettings::from_json(&json).unwrap() == settings);
}

#[test]
fn malformed_json_is_rejected() {
    let result = ExtractSettings::from_json("{\"table_size\": \"large\"}");
    assert!(matches!(result, Err(WtError::Settings(_))));
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "{\"table_size\": 0}",
        "{\"points_per_cents\": 0}",
        "{\"points_per_cents\": 18446744073709551615}",
        "{\"points_per_cents\": 5000}",
        "{\"cents_range\": 5000.0}",
        "{\"table_size\": 4294967296}",
        "{\"cents_range\": -1.0}",
        "{\"output_bits\": 24}",
        "{\"output_sample_rate\": 0}",
        "{\"root_frequency\": 0.0}",
        "{\"root_note\": 128}",
        "{\"region_start\": -0.5}",
    ];
    for case in cases.iter() {
        let result = ExtractSettings::from_json(case);
        println!("{}: {:?}", case, result);
        assert!(matches!(result, Err(WtError::InvalidSettings(_))));
    }
}

#[test]
fn table_is_extracted_with_root_note() {
    let buffer = stereo_tone(110.0, 8, 44100, 0.5);
    let mut settings = test_settings();
    settings.root_note = Some(45); // A2, 110 Hz
    let extractor = WtExtractor::new(settings).unwrap();
    let (table, harmonics) = extractor.extract(&buffer).unwrap();
    assert!(table.len() == 2048);
    assert!(table.samples().iter().all(|s| s.is_finite()));
    assert!(harmonics.len() == 8);
    assert!((harmonics[0].frequency - 110.0).abs() < 2.0);
    assert!((harmonics[7].frequency - 880.0).abs() < 4.0);
}

#[test]
fn root_frequency_wins_over_note() {
    let mut settings = test_settings();
    settings.root_frequency = Some(100.0);
    settings.root_note = Some(45);
    let extractor = WtExtractor::new(settings).unwrap();
    assert!(extractor.resolve_root(&[], 44100.0).unwrap() == 100.0);
}

#[test]
fn root_is_estimated_if_not_configured() {
    let buffer = stereo_tone(100.0, 8, 44100, 0.5);
    let extractor = WtExtractor::new(test_settings()).unwrap();
    let (table, harmonics) = extractor.extract(&buffer).unwrap();
    assert!(table.len() == 2048);
    assert!(harmonics.len() == 8);
    assert!((harmonics[0].frequency - 100.0).abs() < 2.0);
}

#[test]
fn silent_channel_has_no_root() {
    let buffer = stereo_tone(100.0, 8, 44100, 0.5);
    let mut settings = test_settings();
    settings.channel = 0;
    let extractor = WtExtractor::new(settings).unwrap();
    assert!(matches!(extractor.extract(&buffer), Err(WtError::NoRootFrequency)));
}

#[test]
fn region_outside_of_buffer_is_empty() {
    let buffer = stereo_tone(100.0, 8, 44100, 0.5);
    let mut settings = test_settings();
    settings.root_frequency = Some(100.0);
    settings.region_start = 1.0;
    settings.region_end = 2.0;
    let extractor = WtExtractor::new(settings).unwrap();
    assert!(matches!(extractor.extract(&buffer), Err(WtError::EmptyRegion{..})));
}

#[test]
fn missing_channel_is_rejected() {
    let buffer = stereo_tone(100.0, 8, 44100, 0.5);
    let mut settings = test_settings();
    settings.channel = 2;
    let extractor = WtExtractor::new(settings).unwrap();
    assert!(matches!(extractor.extract(&buffer), Err(WtError::InvalidSettings(_))));
}
