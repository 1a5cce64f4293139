//! Converts between WAV files and the sample types used for analysis.
//!
//! Reading produces a SampleBuffer with all channels of the file, converted
//! to f32 in the range [-1.0, 1.0]. Writing stores a single wavetable cycle as
//! a mono file, together with a sampler chunk that loops the whole cycle.
//!
use super::{SampleBuffer, Wavetable, WavHandler, WavData, WavDataType, Chunk, WtError};
use super::Float;

use log::{error, info};

use num::ToPrimitive;

pub struct WtReader {
    base_path: String,
}

impl WtReader {
    /// Creates a new WtReader instance.
    ///
    /// The argument is a path to a directory that files will be read from
    /// and written to.
    ///
    /// ```
    /// use wextract::WtReader;
    ///
    /// let data_dir = "data".to_string();
    ///
    /// let reader = WtReader::new(&data_dir);
    /// ```
    pub fn new(path: &str) -> Self {
        let mut reader = WtReader{base_path: "".to_string()};
        reader.set_path(path);
        reader
    }

    /// Set the working directory to read files from.
    ///
    /// An empty path means filenames are used as given.
    pub fn set_path(&mut self, path: &str) {
        self.base_path = path.to_string();
        if !self.base_path.is_empty() && !self.base_path.ends_with('/') {
            self.base_path.push('/');
        }
        info!("Set base path to [{}]", self.base_path);
    }

    fn full_path(&self, filename: &str) -> Result<String, WtError> {
        if filename.is_empty() {
            error!("Empty filename");
            return Err(WtError::InvalidFile("Empty filename".to_string()));
        }
        Ok(self.base_path.clone() + filename)
    }

    /// Read a file with the given filename into a SampleBuffer.
    ///
    /// The filename is relative to the base path set in the constructor.
    ///
    /// ``` no_run
    /// use wextract::{WtReader, WtError};
    ///
    /// # fn main() -> Result<(), WtError> {
    ///
    /// let reader = WtReader::new("data");
    /// let buffer = reader.read_file("cello.wav")?;
    /// println!("{} seconds", buffer.duration());
    ///
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_file(&self, filename: &str) -> Result<SampleBuffer, WtError> {
        let filename = self.full_path(filename)?;
        let wav_file = WavHandler::read_file(&filename)?;
        WtReader::create_sample_buffer(&wav_file)
    }

    /// Convert decoded wave file data to a SampleBuffer.
    ///
    /// The channels stay interleaved. Integer samples are scaled from their
    /// full range to [-1.0, 1.0], float samples are taken as they are.
    pub fn create_sample_buffer(wav_file: &WavData) -> Result<SampleBuffer, WtError> {
        let fmt = wav_file.get_fmt();
        if fmt.num_channels == 0 || fmt.sample_rate == 0 {
            error!("Invalid format: {} channels at {} Hz", fmt.num_channels, fmt.sample_rate);
            return Err(WtError::InvalidFile("Zero channels or sample rate".to_string()));
        }
        let samples = match wav_file.get_samples() {
            WavDataType::PCM8(data) => WtReader::convert_samples(data, 0_u8, 255_u8),
            WavDataType::PCM16(data) => WtReader::convert_samples(data, -32768_i16, 32767_i16),
            WavDataType::PCM24(data) => WtReader::convert_samples(data, -8_388_608_i32, 8_388_607_i32),
            WavDataType::PCM32(data) => WtReader::convert_samples(data, i32::MIN, i32::MAX),
            WavDataType::FLOAT32(data) => WtReader::convert_samples(data, -1.0_f32, 1.0_f32),
            WavDataType::FLOAT64(data) => WtReader::convert_samples(data, -1.0_f64, 1.0_f64),
        }?;
        info!("Read {} samples, {} channels at {} Hz",
            samples.len(), fmt.num_channels, fmt.sample_rate);
        Ok(SampleBuffer::new(samples, fmt.get_num_channels(), fmt.sample_rate))
    }

    // Map the range [min, max] of the source type linearly to [-1.0, 1.0].
    fn convert_samples<T>(data: &[T], min: T, max: T) -> Result<Vec<f32>, WtError>
            where T: ToPrimitive + Copy {
        let (min_f, max_f) = match (min.to_f64(), max.to_f64()) {
            (Some(lo), Some(hi)) => (lo as Float, hi as Float),
            _ => return Err(WtError::InvalidFile("Sample range not convertible".to_string())),
        };
        let scale = 2.0 / (max_f - min_f);
        let offset = min_f * scale + 1.0;
        data.iter()
            .map(|s| match s.to_f64() {
                Some(v) => Ok(((v as Float * scale) - offset) as f32),
                None => {
                    error!("Failed to convert source samples to target type");
                    Err(WtError::InvalidFile("Sample not convertible".to_string()))
                }
            })
            .collect()
    }

    /// Convert a wavetable to mono wave data.
    ///
    /// bits_per_sample selects 16 bit PCM or 32 bit float output. A sampler
    /// chunk is added that loops the whole table, with the unity note set to
    /// the pitch the table plays at the given sample rate.
    ///
    /// ```
    /// use wextract::{Wavetable, WtReader, WavDataType};
    ///
    /// let wt = Wavetable::from_samples(vec![0.0, 1.0, 0.0, -1.0]);
    /// let wav_data = WtReader::create_wav_data(&wt, 16, 44100).unwrap();
    /// assert_eq!(wav_data.get_samples(), &WavDataType::PCM16(vec![0, 32767, 0, -32767]));
    /// ```
    pub fn create_wav_data(wt: &Wavetable, bits_per_sample: u16, sample_rate: u32) -> Result<WavData, WtError> {
        let samples = match bits_per_sample {
            16 => WavDataType::PCM16(wt.samples().iter()
                    .map(|s| (s.max(-1.0).min(1.0) * 32767.0).round() as i16)
                    .collect()),
            32 => WavDataType::FLOAT32(wt.samples().to_vec()),
            _ => {
                error!("Unsupported output bit depth {}", bits_per_sample);
                return Err(WtError::InvalidSettings(
                    format!("Output bit depth must be 16 or 32, got {}", bits_per_sample)));
            }
        };
        let mut wav_data = WavData::new_from_data(samples, 1, sample_rate);
        if !wt.is_empty() {
            let (note, fraction) = WtReader::get_unity_note(sample_rate as Float / wt.len() as Float);
            wav_data.add_chunk(Chunk::new_sampler_loop(wt.len(), sample_rate, note, fraction));
        }
        Ok(wav_data)
    }

    // Split the pitch of a frequency into MIDI note and fraction of a
    // semitone, as used by the smpl chunk.
    fn get_unity_note(frequency: Float) -> (u8, u32) {
        let note = 69.0 + 12.0 * (frequency / 440.0).log2();
        let note = note.max(0.0).min(127.0);
        let whole = note.floor();
        let fraction = ((note - whole) * 4_294_967_296.0) as u32;
        (whole as u8, fraction)
    }

    /// Write a wavetable as mono WAV file, relative to the base path.
    pub fn write_table(&self,
                       wt: &Wavetable,
                       filename: &str,
                       bits_per_sample: u16,
                       sample_rate: u32) -> Result<(), WtError> {
        let filename = self.full_path(filename)?;
        let wav_data = WtReader::create_wav_data(wt, bits_per_sample, sample_rate)?;
        info!("Writing table with {} samples to [{}]", wt.len(), filename);
        WavHandler::write_file(&wav_data, &filename)
    }
}


// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn values_match(actual: &[f32], expected: &[f32], delta: f32) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    for i in 0..actual.len() {
        let diff = actual[i] - expected[i];
        if diff > delta || diff < -delta {
            println!("Missmatch, actual {}, expected {}", actual[i], expected[i]);
            return false;
        }
    }
    true
}

#[test]
fn base_path_is_set_up_correctly() {
    let wtr = WtReader::new("NoSlash");
    assert!(wtr.base_path == "NoSlash/".to_string());

    let wtr = WtReader::new("WithSlash/");
    assert!(wtr.base_path == "WithSlash/".to_string());

    let wtr = WtReader::new("");
    assert!(wtr.base_path == "".to_string());
}

#[test]
fn empty_filename_is_rejected() {
    let wtr = WtReader::new("data");
    assert!(matches!(wtr.read_file(""), Err(WtError::InvalidFile(_))));
}

#[test]
fn u8_can_be_converted() {
    let data = vec![0_u8, 255_u8];
    let wav_data = WavData::new_from_data(WavDataType::PCM8(data), 1, 44100);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(buffer.num_channels == 1);
    assert!(buffer.sample_rate == 44100);
    assert!(buffer.samples == vec![-1.0, 1.0]);
}

#[test]
fn i16_can_be_converted() {
    let data = vec![-32768_i16, 32767_i16];
    let wav_data = WavData::new_from_data(WavDataType::PCM16(data), 1, 48000);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(buffer.sample_rate == 48000);
    assert!(buffer.samples == vec![-1.0, 1.0]);
}

#[test]
fn i24_can_be_converted() {
    let data = vec![-8_388_608_i32, -4_194_304, 0, 4_194_304, 8_388_607];
    let wav_data = WavData::new_from_data(WavDataType::PCM24(data), 1, 96000);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(buffer.sample_rate == 96000);
    assert!(values_match(&buffer.samples, &[-1.0, -0.5, 0.0, 0.5, 1.0], 0.000001));
}

#[test]
fn i32_can_be_converted() {
    let data = vec![i32::MIN, i32::MIN / 2, 0, i32::MAX / 2, i32::MAX];
    let wav_data = WavData::new_from_data(WavDataType::PCM32(data), 1, 44100);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(values_match(&buffer.samples, &[-1.0, -0.5, 0.0, 0.5, 1.0], 0.000001));
}

#[test]
fn f32_can_be_converted() {
    let data = vec![-1.0_f32, -0.1234_f32, 0.0_f32, 0.1234_f32, 1.0_f32];
    let wav_data = WavData::new_from_data(WavDataType::FLOAT32(data), 1, 44100);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(values_match(&buffer.samples, &[-1.0, -0.1234, 0.0, 0.1234, 1.0], 0.000001));
}

#[test]
fn f64_can_be_converted() {
    let data = vec![-1.0_f64, -0.1234_f64, 0.0_f64, 0.1234_f64, 1.0_f64];
    let wav_data = WavData::new_from_data(WavDataType::FLOAT64(data), 1, 44100);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(values_match(&buffer.samples, &[-1.0, -0.1234, 0.0, 0.1234, 1.0], 0.000001));
}

#[test]
fn u8_is_scaled_correctly() {
    let data = vec![0_u8, 64_u8, 128_u8, 192_u8, 255_u8];
    let wav_data = WavData::new_from_data(WavDataType::PCM8(data), 1, 44100);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(values_match(&buffer.samples, &[-1.0, -0.5, 0.0, 0.5, 1.0], 0.01));
}

#[test]
fn channels_stay_interleaved() {
    let data = vec![0.5_f32, -0.5, 0.25, -0.25];
    let wav_data = WavData::new_from_data(WavDataType::FLOAT32(data), 2, 4);
    let buffer = WtReader::create_sample_buffer(&wav_data).unwrap();
    assert!(buffer.num_channels == 2);
    assert!(buffer.num_frames() == 2);
    assert!(buffer.extract(0.0, 1.0, 1) == vec![-0.5, -0.25]);
}

#[test]
fn zero_channels_are_rejected() {
    let data = vec![0.5_f32];
    let wav_data = WavData::new_from_data(WavDataType::FLOAT32(data), 0, 44100);
    assert!(WtReader::create_sample_buffer(&wav_data).is_err());
}

#[test]
fn table_is_written_as_float() {
    let wt = Wavetable::from_samples(vec![0.0, 0.5, 0.0, -0.5]);
    let wav_data = WtReader::create_wav_data(&wt, 32, 44100).unwrap();
    assert!(wav_data.get_fmt().get_num_channels() == 1);
    assert!(wav_data.get_fmt().sample_rate == 44100);
    assert!(wav_data.get_samples() == &WavDataType::FLOAT32(vec![0.0, 0.5, 0.0, -0.5]));
}

#[test]
fn pcm_output_is_clipped() {
    let wt = Wavetable::from_samples(vec![1.5, -2.0, 0.5]);
    let wav_data = WtReader::create_wav_data(&wt, 16, 44100).unwrap();
    assert!(wav_data.get_samples() == &WavDataType::PCM16(vec![32767, -32767, 16384]));
}

#[test]
fn unsupported_output_bits_are_rejected() {
    let wt = Wavetable::from_samples(vec![0.0; 8]);
    assert!(matches!(WtReader::create_wav_data(&wt, 24, 44100), Err(WtError::InvalidSettings(_))));
}

#[test]
fn loop_chunk_has_table_pitch() {
    use crate::wav_data::CID_SMPL;

    // 44100 / 100 = 441 Hz, one cent above A4
    let wt = Wavetable::from_samples(vec![0.0; 100]);
    let wav_data = WtReader::create_wav_data(&wt, 32, 44100).unwrap();
    let chunk = wav_data.get_chunk(CID_SMPL).unwrap();
    let data = chunk.get_data();
    let field = |i: usize| u32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]);
    assert!(field(3) == 69);
    assert!(field(4) > 0x0800_0000 && field(4) < 0x1000_0000); // ~3.9 cents
    assert!(field(12) == 99);
}

#[test]
fn unity_note_of_a4_is_exact() {
    let (note, fraction) = WtReader::get_unity_note(440.0);
    assert!(note == 69);
    assert!(fraction == 0);
}
