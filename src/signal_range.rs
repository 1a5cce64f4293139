//! Extracts the analysis window from a recorded sample buffer.
//!
//! Recorded files are usually interleaved multichannel data. The analysis
//! works on a single channel only, so the selected time range of one channel
//! is copied into a flat mono signal.

use log::{debug, warn};

pub struct SignalRange;

impl SignalRange {
    /// Copy the samples of one channel between two points in time.
    ///
    /// The region bounds are given in seconds and converted to frame indices
    /// by truncating division by the sample period. The order of the bounds
    /// doesn't matter. If both bounds map to the same frame, the result is
    /// empty.
    ///
    /// `stride` is the number of samples per frame, `offset` selects the
    /// channel inside a frame. The bounds are not checked against the length
    /// of the source, so the caller must keep the region inside the buffer.
    ///
    /// ```
    /// use wextract::SignalRange;
    ///
    /// // Stereo buffer with 4 frames, sample period 0.25s
    /// let source = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
    /// let right = SignalRange::extract(&source, 0.25, 1.0, 0.25, 2, 1);
    /// assert_eq!(right, vec![3.0, 5.0, 7.0]);
    /// ```
    pub fn extract(source: &[f32],
                   region_start: f64,
                   region_end: f64,
                   sample_period: f64,
                   stride: usize,
                   offset: usize) -> Vec<f32> {
        let (region_start, region_end) = if region_start > region_end {
            (region_end, region_start)
        } else {
            (region_start, region_end)
        };
        let range_start = (region_start / sample_period) as usize;
        let range_end = (region_end / sample_period) as usize;
        if range_start == range_end {
            return vec!();
        }
        debug!("Extracting frames {} to {}, stride {}, offset {}",
            range_start, range_end, stride, offset);
        (range_start..range_end).map(|i| source[stride * i + offset]).collect()
    }
}

/// Interleaved samples as read from a wave file.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub num_channels: usize,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, num_channels: usize, sample_rate: u32) -> Self {
        SampleBuffer{samples, num_channels, sample_rate}
    }

    /// Number of complete frames in the buffer.
    pub fn num_frames(&self) -> usize {
        if self.num_channels == 0 {
            0
        } else {
            self.samples.len() / self.num_channels
        }
    }

    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Length of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        self.num_frames() as f64 * self.sample_period()
    }

    /// Extract a region of a single channel.
    ///
    /// Unlike SignalRange::extract, the region is clamped to the length of
    /// the buffer, so any pair of bounds is safe to use. An invalid channel
    /// results in an empty signal.
    ///
    /// ```
    /// use wextract::SampleBuffer;
    ///
    /// let buffer = SampleBuffer::new(vec![0.5; 200], 2, 100); // 1 second of stereo
    /// let signal = buffer.extract(0.5, 5.0, 0);
    /// assert_eq!(signal.len(), 50);
    /// ```
    pub fn extract(&self, region_start: f64, region_end: f64, channel: usize) -> Vec<f32> {
        if channel >= self.num_channels || self.sample_rate == 0 {
            warn!("Can't extract channel {} from buffer with {} channels at {} Hz",
                channel, self.num_channels, self.sample_rate);
            return vec!();
        }
        let duration = self.duration();
        let start = region_start.max(0.0).min(duration);
        let end = region_end.max(0.0).min(duration);
        SignalRange::extract(&self.samples, start, end, self.sample_period(), self.num_channels, channel)
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn ramp(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}

#[test]
fn region_order_does_not_matter() {
    let source = ramp(40);
    let forward = SignalRange::extract(&source, 0.5, 1.25, 0.25, 2, 1);
    let backward = SignalRange::extract(&source, 1.25, 0.5, 0.25, 2, 1);
    assert!(forward == backward);
    assert!(forward == vec![5.0, 7.0, 9.0]);
}

#[test]
fn identical_frame_indices_give_empty_signal() {
    let source = ramp(64);
    let signal = SignalRange::extract(&source, 1.02, 1.05, 0.1, 2, 0);
    assert!(signal.is_empty());
}

#[test]
fn channel_offset_selects_samples() {
    let source = ramp(12); // 4 frames with 3 channels
    assert!(SignalRange::extract(&source, 0.0, 4.0, 1.0, 3, 0) == vec![0.0, 3.0, 6.0, 9.0]);
    assert!(SignalRange::extract(&source, 0.0, 4.0, 1.0, 3, 2) == vec![2.0, 5.0, 8.0, 11.0]);
}

#[test]
fn buffer_region_is_clamped() {
    let buffer = SampleBuffer::new(ramp(20), 2, 10); // 1 second of stereo
    assert!(buffer.num_frames() == 10);
    let signal = buffer.extract(-1.0, 3.0, 1);
    assert!(signal.len() == 10);
    assert!(signal[0] == 1.0);
    assert!(signal[9] == 19.0);
}

#[test]
fn invalid_channel_gives_empty_signal() {
    let buffer = SampleBuffer::new(ramp(20), 2, 10);
    assert!(buffer.extract(0.0, 1.0, 2).is_empty());
}
