//! Extracts single-cycle wavetables from recorded tones.
//!
//! The partials of a pitched sound are measured in a short analysis window
//! and resynthesized into one loopable waveform cycle.

mod error;
mod harmonic_scanner;
mod peak_search;
mod signal_range;
mod wav_data;
mod wav_handler;
mod wavetable;
mod wt_extractor;
mod wt_handoff;
mod wt_manager;
mod wt_reader;

pub use error::WtError;
pub use harmonic_scanner::{HarmonicScanner, note_to_frequency};
pub use peak_search::{GridDensity, Harmonic, HarmonicVector, PeakSearch};
pub use signal_range::{SampleBuffer, SignalRange};
pub use wav_data::{Chunk, FmtChunk, WavData, WavDataType};
pub use wav_handler::WavHandler;
pub use wavetable::{Wavetable, WavetableRef};
pub use wt_extractor::{ExtractSettings, WtExtractor};
pub use wt_handoff::{handoff, TableReceiver, TableSender};
pub use wt_manager::{ExtractJob, WtInfo, WtManager};
pub use wt_reader::WtReader;

pub type Float = f64;
