use crate::error::WtError;

// Format tag identifiers (don't care about uLaw for now)
pub const FMT_PCM: u16 = 1;
pub const FMT_FLOAT: u16 = 3;
pub const FMT_EXTENSIBLE: u16 = 0xFFFE;

pub const SIZE_FMT_DATA: usize = 16;

// Offset of the format code inside the SubFormat GUID of an extensible header
const OFFSET_SUB_FORMAT: usize = 24;

// Sampler chunk ID ("smpl") as u32 value (little endian)
pub const CID_SMPL: u32 = 0x6c706d73;

/// Represents the format chunk that needs to be present in every WAV file.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FmtChunk {
    pub format_tag: u16,      // wFormatTag      2   Format code
    pub num_channels: u16,    // nChannels       2   Number of interleaved channels
    pub sample_rate: u32,     // nSamplesPerSec  4   Sampling rate (blocks per second)
    pub avg_data_rate: u32,   // nAvgBytesPerSec 4   Data rate
    pub block_align: u16,     // nBlockAlign     2   Data block size (bytes)
    pub bits_per_sample: u16, // wBitsPerSample  2   Bits per sample
}

impl FmtChunk {
    pub fn new(data: &WavDataType, num_channels: u16, sample_rate: u32) -> FmtChunk {
        let bps = data.get_bits_per_sample();
        let block_align = num_channels * (bps / 8);
        FmtChunk{
            format_tag: data.get_format_tag(),
            num_channels,
            sample_rate,
            avg_data_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: bps,
        }
    }

    /// Parse the content of a fmt chunk.
    ///
    /// For extensible headers, the format tag is replaced by the format code
    /// stored in the SubFormat GUID.
    pub fn from_bytes(bytes: &[u8]) -> Result<FmtChunk, WtError> {
        if bytes.len() < SIZE_FMT_DATA {
            return Err(WtError::InvalidFile(format!("fmt chunk too short ({} bytes)", bytes.len())));
        }
        let u16_at = |pos: usize| u16::from_le_bytes([bytes[pos], bytes[pos + 1]]);
        let u32_at = |pos: usize| u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]);
        let mut format_tag = u16_at(0);
        if format_tag == FMT_EXTENSIBLE {
            if bytes.len() < OFFSET_SUB_FORMAT + 2 {
                return Err(WtError::InvalidFile("Extensible fmt chunk without SubFormat".to_string()));
            }
            format_tag = u16_at(OFFSET_SUB_FORMAT);
        }
        Ok(FmtChunk{
            format_tag,
            num_channels: u16_at(2),
            sample_rate: u32_at(4),
            avg_data_rate: u32_at(8),
            block_align: u16_at(12),
            bits_per_sample: u16_at(14),
        })
    }

    /// Serialize to the 16 byte PCM/float fmt chunk content.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SIZE_FMT_DATA);
        bytes.extend_from_slice(&self.format_tag.to_le_bytes());
        bytes.extend_from_slice(&self.num_channels.to_le_bytes());
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&self.avg_data_rate.to_le_bytes());
        bytes.extend_from_slice(&self.block_align.to_le_bytes());
        bytes.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes
    }

    /// Get the number of audio channels defined in the WAV file.
    pub fn get_num_channels(&self) -> usize {
        self.num_channels as usize
    }

    /// Get the number of bits per sample defined in the WAV file.
    pub fn get_bits_per_sample(&self) -> usize {
        self.bits_per_sample as usize
    }
}

// Generic chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    chunk_id: u32,
    data: Vec<u8>,
}

impl Chunk {
    pub fn new_from_data(chunk_id: u32, data: Vec<u8>) -> Chunk {
        Chunk{chunk_id, data}
    }

    /// Create a sampler chunk with a single forward loop over all samples.
    ///
    /// Samplers use this to loop the table and to know at which MIDI note the
    /// table plays at its original pitch.
    pub fn new_sampler_loop(num_samples: usize, sample_rate: u32, unity_note: u8, pitch_fraction: u32) -> Chunk {
        let sample_period_ns = if sample_rate > 0 { 1_000_000_000 / sample_rate } else { 0 };
        let loop_end = num_samples.saturating_sub(1) as u32; // Inclusive
        let fields: [u32; 15] = [
            0,                  // Manufacturer
            0,                  // Product
            sample_period_ns,
            unity_note as u32,
            pitch_fraction,
            0,                  // SMPTE format
            0,                  // SMPTE offset
            1,                  // Number of loops
            0,                  // Size of sampler data
            0,                  // Cue point ID
            0,                  // Loop type: forward
            0,                  // Loop start
            loop_end,
            0,                  // Fraction
            0,                  // Play count: infinite
        ];
        let mut data = Vec::with_capacity(fields.len() * 4);
        for f in fields.iter() {
            data.extend_from_slice(&f.to_le_bytes());
        }
        Chunk{chunk_id: CID_SMPL, data}
    }

    pub fn get_chunk_id(&self) -> u32 {
        self.chunk_id
    }

    pub fn get_num_bytes(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data
    }
}

/// Container for the different sample data types.
#[derive(Debug, Clone, PartialEq)]
pub enum WavDataType {
    PCM8(Vec<u8>),
    PCM16(Vec<i16>),
    PCM24(Vec<i32>), // Sign extended, range -2^23..2^23
    PCM32(Vec<i32>),
    FLOAT32(Vec<f32>),
    FLOAT64(Vec<f64>)
}

impl WavDataType {
    /// Get the number of samples in the container.
    pub fn get_num_samples(&self) -> usize {
        match self {
            WavDataType::PCM8(v) => v.len(),
            WavDataType::PCM16(v) => v.len(),
            WavDataType::PCM24(v) | WavDataType::PCM32(v) => v.len(),
            WavDataType::FLOAT32(v) => v.len(),
            WavDataType::FLOAT64(v) => v.len(),
        }
    }

    /// Get a printable representation of the data type.
    pub fn get_type(&self) -> &str {
        match self {
            WavDataType::PCM8(_) => "PCM8",
            WavDataType::PCM16(_) => "PCM16",
            WavDataType::PCM24(_) => "PCM24",
            WavDataType::PCM32(_) => "PCM32",
            WavDataType::FLOAT32(_) => "Float32",
            WavDataType::FLOAT64(_) => "Float64",
        }
    }

    /// Get the format tag of the FMT chunk that represents the current
    /// data type.
    pub fn get_format_tag(&self) -> u16 {
        match self {
            WavDataType::PCM8(_)
            | WavDataType::PCM16(_)
            | WavDataType::PCM24(_)
            | WavDataType::PCM32(_) => FMT_PCM,
            WavDataType::FLOAT32(_) | WavDataType::FLOAT64(_) => FMT_FLOAT,
        }
    }

    pub fn get_bits_per_sample(&self) -> u16 {
        match self {
            WavDataType::PCM8(_) => 8,
            WavDataType::PCM16(_) => 16,
            WavDataType::PCM24(_) => 24,
            WavDataType::PCM32(_) => 32,
            WavDataType::FLOAT32(_) => 32,
            WavDataType::FLOAT64(_) => 64,
        }
    }

    pub fn get_num_bytes(&self) -> usize {
        self.get_num_samples() * (self.get_bits_per_sample() / 8) as usize
    }
}

/// Contains the format information, sample data and any extra chunks of a
/// wave file.
#[derive(Debug, Clone)]
pub struct WavData {
    info: FmtChunk,
    data: WavDataType,
    chunks: Vec<Chunk>,
}

impl WavData {
    /// Create a struct containing the given list of samples.
    pub fn new_from_data(samples: WavDataType, num_channels: u16, sample_rate: u32) -> WavData {
        let info = FmtChunk::new(&samples, num_channels, sample_rate);
        WavData::with_format(info, samples)
    }

    /// Combine an already parsed format with sample data.
    pub fn with_format(info: FmtChunk, samples: WavDataType) -> WavData {
        WavData{info, data: samples, chunks: vec!()}
    }

    /// Add an arbitrary chunk to the list of chunks.
    pub fn add_chunk(&mut self, data: Chunk) {
        self.chunks.push(data);
    }

    /// Get the FMT chunk.
    pub fn get_fmt(&self) -> &FmtChunk {
        &self.info
    }

    /// Get the number of samples over all channels.
    pub fn get_num_samples(&self) -> usize {
        self.data.get_num_samples()
    }

    /// Get the number of sample bytes.
    pub fn get_num_bytes(&self) -> usize {
        self.data.get_num_bytes()
    }

    /// Get the list of all extra chunks, not including FMT and DATA.
    pub fn get_chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Find an extra chunk by ID.
    pub fn get_chunk(&self, chunk_id: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.chunk_id == chunk_id)
    }

    pub fn get_samples(&self) -> &WavDataType {
        &self.data
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[test]
fn format_matches_sample_type() {
    let data = WavData::new_from_data(WavDataType::PCM16(vec![1, 2, 3, 4]), 2, 48000);
    let fmt = data.get_fmt();
    assert!(fmt.format_tag == FMT_PCM);
    assert!(fmt.get_num_channels() == 2);
    assert!(fmt.block_align == 4);
    assert!(fmt.avg_data_rate == 192000);
    assert!(data.get_num_bytes() == 8);
}

#[test]
fn fmt_chunk_survives_serialization() {
    let fmt = FmtChunk::new(&WavDataType::FLOAT32(vec![]), 1, 44100);
    let bytes = fmt.to_bytes();
    assert!(bytes.len() == SIZE_FMT_DATA);
    assert!(FmtChunk::from_bytes(&bytes).unwrap() == fmt);
}

#[test]
fn short_fmt_chunk_is_rejected() {
    assert!(matches!(FmtChunk::from_bytes(&[0x01, 0x00, 0x01]), Err(WtError::InvalidFile(_))));
}

#[test]
fn sampler_chunk_loops_whole_table() {
    let chunk = Chunk::new_sampler_loop(2048, 44100, 60, 0);
    let data = chunk.get_data();
    assert!(chunk.get_chunk_id() == CID_SMPL);
    assert!(chunk.get_num_bytes() == 60);
    let field = |i: usize| u32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]);
    assert!(field(2) == 22675); // Sample period in ns
    assert!(field(3) == 60);
    assert!(field(7) == 1);
    assert!(field(11) == 0);
    assert!(field(12) == 2047);
}

#[test]
fn chunk_can_be_added_and_queried() {
    let cid_test: u32 = 0x54534554;
    let mut wav_data = WavData::new_from_data(WavDataType::PCM8(vec![1, 2, 3]), 1, 44100);
    wav_data.add_chunk(Chunk::new_from_data(cid_test, vec![0x05, 0x06, 0x07, 0x08]));
    assert!(wav_data.get_chunks()[0].get_chunk_id() == cid_test);
    assert!(wav_data.get_chunk(cid_test).is_some());
    assert!(wav_data.get_chunk(CID_SMPL).is_none());
}
