//! Error type shared by the file, settings and pipeline layers.
//!
//! The analysis functions themselves never fail; degenerate input produces
//! degenerate output. Everything that deals with files, settings or the
//! selection of an analysis region reports problems through WtError.

use std::fmt;

#[derive(Debug)]
pub enum WtError {
    /// Reading or writing a file failed.
    Io(std::io::Error),
    /// The data is not a valid RIFF/WAVE stream.
    InvalidFile(String),
    /// The WAV file uses a sample format we can't convert.
    UnsupportedFormat { format_tag: u16, bits_per_sample: u16 },
    /// A settings value is out of range.
    InvalidSettings(String),
    /// The settings file could not be parsed.
    Settings(serde_json::Error),
    /// The selected region contains no samples.
    EmptyRegion { start: f64, end: f64 },
    /// No root frequency was configured and none could be estimated.
    NoRootFrequency,
}

impl fmt::Display for WtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WtError::Io(err) => write!(f, "I/O error: {}", err),
            WtError::InvalidFile(msg) => write!(f, "Invalid wave file: {}", msg),
            WtError::UnsupportedFormat { format_tag, bits_per_sample } => {
                write!(f, "Unsupported sample format {} with {} bits per sample",
                    format_tag, bits_per_sample)
            }
            WtError::InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
            WtError::Settings(err) => write!(f, "Unable to parse settings: {}", err),
            WtError::EmptyRegion { start, end } => {
                write!(f, "Region {}s - {}s contains no samples", start, end)
            }
            WtError::NoRootFrequency => write!(f, "Unable to determine root frequency"),
        }
    }
}

impl std::error::Error for WtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WtError::Io(err) => Some(err),
            WtError::Settings(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WtError {
    fn from(err: std::io::Error) -> Self {
        WtError::Io(err)
    }
}

impl From<serde_json::Error> for WtError {
    fn from(err: serde_json::Error) -> Self {
        WtError::Settings(err)
    }
}
