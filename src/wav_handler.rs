use crate::error::WtError;
use crate::wav_data::*;

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use log::{debug, error, info, trace, warn};

// List of Chunk IDs as u32 values (little endian)
const CID_RIFF: u32 = 0x46464952;
const CID_WAVE: u32 = 0x45564157;
const CID_FMT:  u32 = 0x20746d66;
const CID_DATA: u32 = 0x61746164;

const SIZE_WAVE_HEADER: u32 = 4;
const SIZE_CHUNK_HEADER: u32 = 8;

#[derive(Debug, Copy, Clone)]
struct ChunkHeader {
    chunk_id: u32,
    size: u32
}

// Conversion of single samples from and to little endian bytes.
trait Sample: Copy {
    const SIZE: usize;
    fn from_le(bytes: &[u8]) -> Self;
    fn write_le<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

macro_rules! impl_sample {
    ($t:ty, $size:expr) => {
        impl Sample for $t {
            const SIZE: usize = $size;

            fn from_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $size];
                raw.copy_from_slice(&bytes[..$size]);
                <$t>::from_le_bytes(raw)
            }

            fn write_le<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                dest.write_all(&self.to_le_bytes())
            }
        }
    }
}

impl_sample!(u8, 1);
impl_sample!(i16, 2);
impl_sample!(i32, 4);
impl_sample!(f32, 4);
impl_sample!(f64, 8);

pub struct WavHandler;

/// Handles reading and writing of .wav files.
///
/// Reads wave files into memory as vectors of samples. The resulting struct
/// contains the FMT info, the data, and all additional chunks that were found
/// in the file.
///
/// Writes samples in the format provided, including any extra chunks that
/// the WavData object contains.
impl WavHandler {
    /// Read a file with the given filename.
    ///
    /// ``` no_run
    /// use wextract::{WavHandler, WtError};
    ///
    /// # fn main() -> Result<(), WtError> {
    ///
    /// let wave_data = WavHandler::read_file("test.wav")?;
    ///
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_file(filename: &str) -> Result<WavData, WtError> {
        info!("Reading wave file [{}]", filename);
        let file = File::open(filename).map_err(|err| {
            error!("Unable to open file [{}]: {}", filename, err);
            WtError::from(err)
        })?;
        WavHandler::read_content(BufReader::new(file))
    }

    /// Read wave data from the provided input stream.
    ///
    /// Source is any stream object implementing the Read trait.
    ///
    /// ```
    /// use wextract::WavHandler;
    /// use std::io::Cursor;
    ///
    /// let data: &[u8] = &[0x00]; // Not a wave file
    /// assert!(WavHandler::read_content(Cursor::new(data)).is_err());
    /// ```
    pub fn read_content<R: Read>(mut source: R) -> Result<WavData, WtError> {
        let size = WavHandler::read_riff_container(&mut source, CID_WAVE)?;

        let mut bytes_read: usize = SIZE_WAVE_HEADER as usize; // Already read the file type
        let mut fmt: Option<FmtChunk> = None;
        let mut samples: Option<WavDataType> = None;
        let mut chunks: Vec<Chunk> = vec!();

        // Read chunks
        while let Some(header) = WavHandler::read_chunk_header(&mut source)? {
            debug!("Reading {} chunk, size {}", WavHandler::get_id_name(header.chunk_id), header.size);
            let content = WavHandler::read_chunk_data(&mut source, header.size as usize)?;
            match header.chunk_id {
                CID_FMT => fmt = Some(FmtChunk::from_bytes(&content)?),
                CID_DATA => {
                    let info = fmt.ok_or_else(|| {
                        error!("Invalid file format, data chunk before format chunk");
                        WtError::InvalidFile("data chunk before fmt chunk".to_string())
                    })?;
                    samples = Some(WavHandler::read_samples(&content, &info)?);
                }
                _ => chunks.push(Chunk::new_from_data(header.chunk_id, content)),
            }
            let padding = WavHandler::skip_padding(&mut source, header.size)?;
            bytes_read += (SIZE_CHUNK_HEADER + header.size) as usize + padding;
        }
        if bytes_read == size {
            debug!("Finished reading {} bytes", bytes_read);
        } else {
            warn!("Invalid file size, read {} bytes, expected {}", bytes_read, size);
        }
        let info = fmt.ok_or_else(|| {
            error!("Invalid file format, format chunk missing");
            WtError::InvalidFile("fmt chunk missing".to_string())
        })?;
        let samples = samples.ok_or_else(|| {
            error!("Invalid file format, data chunk missing");
            WtError::InvalidFile("data chunk missing".to_string())
        })?;
        let mut wav_data = WavData::with_format(info, samples);
        for c in chunks {
            wav_data.add_chunk(c);
        }
        Ok(wav_data)
    }

    // Read the RIFF container information from the input stream.
    //
    // This expects a RIFF header, followed by a 4-byte identifier (e.g.
    // "WAVE"), which is passed as argument.
    fn read_riff_container<R: Read>(source: &mut R, expected_cid: u32) -> Result<usize, WtError> {
        let header = match WavHandler::read_chunk_header(source)? {
            Some(h) => h,
            None => return Err(WtError::InvalidFile("Missing RIFF header".to_string())),
        };
        if header.chunk_id != CID_RIFF {
            error!("Unexpected chunk ID, expected RIFF, found {}", WavHandler::get_id_name(header.chunk_id));
            return Err(WtError::InvalidFile("Not a RIFF file".to_string()));
        }
        let file_type = WavHandler::read_u32(source).map_err(|_| {
            WtError::InvalidFile("Missing file type".to_string())
        })?;
        debug!("File type: {}", WavHandler::get_id_name(file_type));
        if file_type != expected_cid {
            error!("Unexpected file type, expected {}, found {}",
                WavHandler::get_id_name(expected_cid), WavHandler::get_id_name(file_type));
            return Err(WtError::InvalidFile("Not a WAVE file".to_string()));
        }
        Ok(header.size as usize)
    }

    // Read the next chunk header.
    //
    // Returns None if the stream ends before a complete header, which is
    // how the end of the file is detected.
    fn read_chunk_header<R: Read>(source: &mut R) -> Result<Option<ChunkHeader>, WtError> {
        let mut raw = [0u8; SIZE_CHUNK_HEADER as usize];
        match source.read_exact(&mut raw) {
            Ok(()) => (),
            Err(ref err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let chunk_id = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let size = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        trace!("Chunk header {:08x}, size {}", chunk_id, size);
        Ok(Some(ChunkHeader{chunk_id, size}))
    }

    fn read_u32<R: Read>(source: &mut R) -> std::io::Result<u32> {
        let mut raw = [0u8; 4];
        source.read_exact(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    // Read the contents of a chunk from the input stream.
    //
    // Reads through a limited reader, so a corrupt size field can't trigger a
    // huge allocation.
    fn read_chunk_data<R: Read>(source: &mut R, size: usize) -> Result<Vec<u8>, WtError> {
        let mut content = Vec::new();
        source.take(size as u64).read_to_end(&mut content)?;
        if content.len() != size {
            error!("Reading chunk data failed, got {} of {} bytes", content.len(), size);
            return Err(WtError::InvalidFile("Incomplete chunk".to_string()));
        }
        Ok(content)
    }

    // Chunks with an odd size are followed by a padding byte.
    fn skip_padding<R: Read>(source: &mut R, size: u32) -> Result<usize, WtError> {
        if size & 0x01 == 0 {
            return Ok(0);
        }
        let mut pad = [0u8; 1];
        Ok(source.read(&mut pad)?)
    }

    // Convert the raw content of the data chunk into samples.
    fn read_samples(content: &[u8], info: &FmtChunk) -> Result<WavDataType, WtError> {
        let unsupported = WtError::UnsupportedFormat{
            format_tag: info.format_tag,
            bits_per_sample: info.bits_per_sample,
        };
        let samples = match info.format_tag {
            FMT_PCM => match info.bits_per_sample {
                8  => WavDataType::PCM8(WavHandler::read_samples_into(content)),
                16 => WavDataType::PCM16(WavHandler::read_samples_into(content)),
                24 => WavDataType::PCM24(WavHandler::read_pcm24(content)),
                32 => WavDataType::PCM32(WavHandler::read_samples_into(content)),
                _  => return Err(unsupported),
            },
            FMT_FLOAT => match info.bits_per_sample {
                32 => WavDataType::FLOAT32(WavHandler::read_samples_into(content)),
                64 => WavDataType::FLOAT64(WavHandler::read_samples_into(content)),
                _  => return Err(unsupported),
            },
            _ => return Err(unsupported),
        };
        info!("{} samples of type {}", samples.get_num_samples(), samples.get_type());
        Ok(samples)
    }

    // Convert bytes to the matching data type of samples. Trailing bytes that
    // don't form a complete sample are ignored.
    fn read_samples_into<T: Sample>(content: &[u8]) -> Vec<T> {
        content.chunks_exact(T::SIZE).map(T::from_le).collect()
    }

    // 24 bit samples are shifted into the upper bytes of an i32 and back down
    // to extend the sign.
    fn read_pcm24(content: &[u8]) -> Vec<i32> {
        content.chunks_exact(3)
            .map(|b| i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8)
            .collect()
    }

    // Convert a given chunk ID from u32 to printable string.
    fn get_id_name(value: u32) -> String {
        String::from_utf8_lossy(&value.to_le_bytes()).into_owned()
    }

    // ====================
    // Writing of WAV files
    // ====================

    /// Write the given WavData to a file.
    ///
    /// This writes the fmt chunk, any additional chunks and the sample data to
    /// the file.
    pub fn write_file(data: &WavData, filename: &str) -> Result<(), WtError> {
        info!("Writing wave file [{}]", filename);
        let file = File::create(filename).map_err(|err| {
            error!("Unable to open file [{}]: {}", filename, err);
            WtError::from(err)
        })?;
        let mut writer = BufWriter::new(file);
        WavHandler::write_content(&mut writer, data)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the WAV data to the given output stream.
    pub fn write_content<W: Write>(dest: &mut W, data: &WavData) -> Result<(), WtError> {
        // Calculate size:
        // - 4 bytes for "WAVE" header
        // - 8 + 16 bytes for fmt chunk
        // - total length of all other chunks, including padding
        // - 8 + data size for sample data, including padding
        let mut size = SIZE_WAVE_HEADER + SIZE_CHUNK_HEADER + SIZE_FMT_DATA as u32;
        for c in data.get_chunks() {
            size += SIZE_CHUNK_HEADER + WavHandler::padded(c.get_num_bytes());
        }
        let num_bytes = data.get_num_bytes() as u32;
        size += SIZE_CHUNK_HEADER + WavHandler::padded(num_bytes);

        // Write RIFF header + size
        dest.write_all(&CID_RIFF.to_le_bytes())?;
        dest.write_all(&size.to_le_bytes())?;

        // Write WAVE header
        dest.write_all(&CID_WAVE.to_le_bytes())?;

        WavHandler::write_chunk(dest, CID_FMT, &data.get_fmt().to_bytes())?;

        for c in data.get_chunks() {
            WavHandler::write_chunk(dest, c.get_chunk_id(), c.get_data())?;
        }

        // Write data chunk
        dest.write_all(&CID_DATA.to_le_bytes())?;
        dest.write_all(&num_bytes.to_le_bytes())?;
        match data.get_samples() {
            WavDataType::PCM8(v) => WavHandler::write_samples(dest, v),
            WavDataType::PCM16(v) => WavHandler::write_samples(dest, v),
            WavDataType::PCM24(v) => WavHandler::write_pcm24(dest, v),
            WavDataType::PCM32(v) => WavHandler::write_samples(dest, v),
            WavDataType::FLOAT32(v) => WavHandler::write_samples(dest, v),
            WavDataType::FLOAT64(v) => WavHandler::write_samples(dest, v),
        }?;
        if num_bytes & 0x01 == 0x01 {
            dest.write_all(&[0x00])?;
        }
        trace!("Wrote {} bytes", size + SIZE_CHUNK_HEADER);
        Ok(())
    }

    fn padded(num_bytes: u32) -> u32 {
        num_bytes + (num_bytes & 0x01)
    }

    // Write a chunk to the output stream, adding a padding byte for odd sizes.
    fn write_chunk<W: Write>(dest: &mut W, cid: u32, data: &[u8]) -> std::io::Result<()> {
        dest.write_all(&cid.to_le_bytes())?;
        dest.write_all(&(data.len() as u32).to_le_bytes())?;
        dest.write_all(data)?;
        if data.len() & 0x01 == 0x01 {
            dest.write_all(&[0x00])?;
        }
        Ok(())
    }

    // Write the sample data to the output stream in little endian order.
    fn write_samples<W: Write, T: Sample>(dest: &mut W, data: &[T]) -> std::io::Result<()> {
        for sample in data {
            sample.write_le(dest)?;
        }
        Ok(())
    }

    // Write the lower three bytes of each sample.
    fn write_pcm24<W: Write>(dest: &mut W, data: &[i32]) -> std::io::Result<()> {
        for sample in data {
            dest.write_all(&sample.to_le_bytes()[..3])?;
        }
        Ok(())
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
struct TestContext {
}

#[cfg(test)]
impl TestContext {
    pub fn new() -> Self {
        TestContext{}
    }

    pub fn test_read(&mut self, ptr: &[u8]) -> bool {
        self.get_data(ptr).is_ok()
    }

    pub fn get_data(&mut self, ptr: &[u8]) -> Result<WavData, WtError> {
        use std::io::Cursor;
        WavHandler::read_content(Cursor::new(ptr))
    }

    pub fn test_write(&mut self, data: &WavData, expected: &[u8]) -> bool {
        let mut buffer = Vec::new();
        match WavHandler::write_content(&mut buffer, data) {
            Ok(()) => {
                if buffer != expected {
                    println!("Expected {:02x?}\nActual   {:02x?}", expected, buffer);
                    return false;
                }
                true
            }
            Err(_) => false,
        }
    }
}

#[test]
fn incomplete_riff_id_is_rejected() {
    let mut context = TestContext::new();

    let incomplete_riff: &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8,
    ];

    assert!(context.test_read(incomplete_riff) == false);
}

#[test]
fn missing_riff_id_is_rejected() {
    let mut context = TestContext::new();

    let missing_riff_id : &[u8] = &[
        // RIFF header - invalid
        'R' as u8, 'x' as u8, 'x' as u8, 'x' as u8,
        0x04, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
    ];

    assert!(context.test_read(missing_riff_id) == false);
}

#[test]
fn missing_wave_id_is_rejected() {
    let mut context = TestContext::new();

    let missing_wave_id : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x04, 0x00, 0x00, 0x00,
        // Wrong file ID
        'W' as u8, 'O' as u8, 'V' as u8, 'E' as u8,
    ];

    assert!(context.test_read(missing_wave_id) == false);
}

#[test]
fn valid_riff_empty_wave_is_rejected() {
    let mut context = TestContext::new();

    let empty_wave: &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x04, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
    ];

    assert!(matches!(context.get_data(empty_wave), Err(WtError::InvalidFile(_))));
}

#[test]
fn single_sample_byte_can_be_read() {
    let mut context = TestContext::new();

    let single_sample : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x28, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x12, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x44, 0xAC, 0x00, 0x00, // Avg data rate
        0x01, 0x00,             // Block align
        0x08, 0x00,             // 8 bit per sample
        0x00, 0x00,             // Extension size
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x01, 0x00, 0x00, 0x00,
        0x42,                   // Single byte
        0x00                    // Padding
    ];

    let wav_file = context.get_data(single_sample).unwrap();
    assert!(wav_file.get_num_bytes() == 1);
    assert!(wav_file.get_fmt().sample_rate == 44100);
    if let WavDataType::PCM8(v) = wav_file.get_samples() {
        assert!(v == &vec![0x42]);
    } else {
        panic!("Wrong sample type");
    }
}

#[test]
fn incomplete_chunk_is_rejected() {
    let mut context = TestContext::new();

    let incomplete_chunk: &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x04, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x02, 0x00, 0x00, 0x00, // Size = 2
        0x42                    // Only single byte of data
    ];

    assert!(context.test_read(incomplete_chunk) == false);
}

#[test]
fn invalid_size_is_handled() {
    let mut context = TestContext::new();

    let invalid_size: &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x04, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0xff, 0xff, 0xff, 0xff, // Size = 0xFFFFFFFF
        0x42                    // Only single byte of data
    ];

    assert!(context.test_read(invalid_size) == false);
}

#[test]
fn unknown_chunks_are_kept() {
    let mut context = TestContext::new();

    let with_extra_chunk : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x30, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // unknown chunk
        'n' as u8, 'u' as u8, 'l' as u8, 'l' as u8,
        0x01, 0x00, 0x00, 0x00,
        0xFF,
        0x00,                   // Padding
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x88, 0x58, 0x01, 0x00, // Avg data rate
        0x02, 0x00,             // Block align
        0x10, 0x00,             // 16 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x02, 0x00, 0x00, 0x00,
        0x12, 0x34
    ];

    let wav_file = context.get_data(with_extra_chunk).unwrap();
    assert!(wav_file.get_num_bytes() == 2);
    assert!(wav_file.get_chunks().len() == 1);
    assert!(wav_file.get_chunks()[0].get_data() == &[0xFF]);
    if let WavDataType::PCM16(data) = wav_file.get_samples() {
        assert!(data[0] == 0x3412_i16);
    } else {
        panic!("Wrong sample type");
    }
}

#[test]
fn f32_can_be_read() {
    let mut context = TestContext::new();

    let single_sample : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x28, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x03, 0x00,             // Float
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x10, 0xb1, 0x02, 0x00, // Avg data rate
        0x04, 0x00,             // Block align
        0x20, 0x00,             // 32 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x04, 0x00, 0x00, 0x00,
        0xb6, 0xf3, 0x9d, 0x3f  // = 1.234 in LE format
    ];

    let wav_file = context.get_data(single_sample).unwrap();
    if let WavDataType::FLOAT32(data) = wav_file.get_samples() {
        assert!(data.len() == 1);
        assert!(data[0] == 1.234_f32);
    } else {
        panic!("Wrong sample type");
    }
}

#[test]
fn extensible_format_is_resolved() {
    let mut context = TestContext::new();

    let extensible : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x40, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x28, 0x00, 0x00, 0x00,
        0xFE, 0xFF,             // Extensible
        0x02, 0x00,             // 2 channels
        0x80, 0xBB, 0x00, 0x00, // 48000 Hz
        0x00, 0xEE, 0x02, 0x00, // Avg data rate
        0x04, 0x00,             // Block align
        0x10, 0x00,             // 16 bit per sample
        0x16, 0x00,             // Extension size
        0x10, 0x00,             // Valid bits
        0x03, 0x00, 0x00, 0x00, // Channel mask
        0x01, 0x00, 0x00, 0x00, // SubFormat GUID, starting with PCM
        0x00, 0x00, 0x10, 0x00,
        0x80, 0x00, 0x00, 0xAA,
        0x00, 0x38, 0x9B, 0x71,
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x04, 0x00, 0x00, 0x00,
        0x01, 0x00, 0xFF, 0xFF
    ];

    let wav_file = context.get_data(extensible).unwrap();
    assert!(wav_file.get_fmt().format_tag == FMT_PCM);
    assert!(wav_file.get_fmt().get_num_channels() == 2);
    assert!(wav_file.get_samples() == &WavDataType::PCM16(vec![1, -1]));
}

#[test]
fn s24_can_be_read() {
    let mut context = TestContext::new();

    let pcm24 : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x2A, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0xCC, 0x04, 0x02, 0x00, // Avg data rate
        0x03, 0x00,             // Block align
        0x18, 0x00,             // 24 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x06, 0x00, 0x00, 0x00,
        0x01, 0x02, 0x03,       // Positive
        0xFE, 0xFF, 0xFF        // Negative, needs sign extension
    ];

    let wav_file = context.get_data(pcm24).unwrap();
    assert!(wav_file.get_num_bytes() == 6);
    assert!(wav_file.get_samples() == &WavDataType::PCM24(vec![0x030201, -2]));
}

#[test]
fn s32_can_be_read() {
    let mut context = TestContext::new();

    let pcm32 : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x28, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x10, 0xB1, 0x02, 0x00, // Avg data rate
        0x04, 0x00,             // Block align
        0x20, 0x00,             // 32 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x04, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x80  // i32::MIN
    ];

    let wav_file = context.get_data(pcm32).unwrap();
    assert!(wav_file.get_samples() == &WavDataType::PCM32(vec![i32::MIN]));
}

#[test]
fn unsupported_bit_depth_is_rejected() {
    let mut context = TestContext::new();

    let pcm12 : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x26, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x88, 0x58, 0x01, 0x00, // Avg data rate
        0x02, 0x00,             // Block align
        0x0C, 0x00,             // 12 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x02, 0x00, 0x00, 0x00,
        0x01, 0x02
    ];

    let result = context.get_data(pcm12);
    assert!(matches!(result, Err(WtError::UnsupportedFormat{format_tag: 1, bits_per_sample: 12})));
}

#[test]
fn s16_can_be_written() {
    let mut context = TestContext::new();
    let data = WavData::new_from_data(WavDataType::PCM16(vec![-1, 0, 1, 2]), 1, 44100);
    let expected : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x2C, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x88, 0x58, 0x01, 0x00, // Avg data rate
        0x02, 0x00,             // Block align
        0x10, 0x00,             // 16 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x08, 0x00, 0x00, 0x00, // 4 s16 = 8 bytes
        0xFF, 0xFF, 0x00, 0x00,
        0x01, 0x00, 0x02, 0x00,
    ];
    assert!(context.test_write(&data, expected));
}

#[test]
fn s24_can_be_written() {
    let mut context = TestContext::new();
    let data = WavData::new_from_data(WavDataType::PCM24(vec![-1, 0x123456]), 1, 44100);
    let expected : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x2A, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0xCC, 0x04, 0x02, 0x00, // Avg data rate
        0x03, 0x00,             // Block align
        0x18, 0x00,             // 24 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x06, 0x00, 0x00, 0x00, // 2 s24 = 6 bytes
        0xFF, 0xFF, 0xFF,
        0x56, 0x34, 0x12,
    ];
    assert!(context.test_write(&data, expected));
}

#[test]
fn f32_can_be_written() {
    let mut context = TestContext::new();
    let data = WavData::new_from_data(WavDataType::FLOAT32(vec![0.0, 0.1, 0.2, 0.3]), 1, 44100);
    let expected : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x34, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x03, 0x00,             // Float
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x10, 0xb1, 0x02, 0x00, // Avg data rate
        0x04, 0x00,             // Block align
        0x20, 0x00,             // 32 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x10, 0x00, 0x00, 0x00, // 4 f32 = 16 bytes
        0x00, 0x00, 0x00, 0x00, // 0.0
        0xcd, 0xcc, 0xcc, 0x3d, // 0.1
        0xcd, 0xcc, 0x4c, 0x3e, // 0.2
        0x9a, 0x99, 0x99, 0x3e, // 0.3
    ];
    assert!(context.test_write(&data, expected));
}

#[test]
fn odd_number_of_u8_is_padded() {
    let mut context = TestContext::new();
    let data = WavData::new_from_data(WavDataType::PCM8(vec![1, 2, 3]), 1, 44100);
    let expected : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x28, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x44, 0xAC, 0x00, 0x00, // Avg data rate
        0x01, 0x00,             // Block align
        0x08, 0x00,             // 8 bit per sample
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x03, 0x00, 0x00, 0x00, // 3 u8 = 3 bytes
        0x01, 0x02, 0x03, 0x00
    ];
    assert!(context.test_write(&data, expected));
}

#[test]
fn custom_chunk_can_be_added() {
    let cid_test: u32 = 0x54534554;
    let mut context = TestContext::new();
    let mut wav_data = WavData::new_from_data(WavDataType::PCM8(vec![1, 2, 3]), 1, 44100);
    wav_data.add_chunk(Chunk::new_from_data(cid_test, vec![0x05, 0x06, 0x07, 0x08]));
    let expected : &[u8] = &[
        // RIFF header
        'R' as u8, 'I' as u8, 'F' as u8, 'F' as u8,
        0x34, 0x00, 0x00, 0x00,
        // WAVE file ID
        'W' as u8, 'A' as u8, 'V' as u8, 'E' as u8,
        // fmt chunk
        'f' as u8, 'm' as u8, 't' as u8, ' ' as u8,
        0x10, 0x00, 0x00, 0x00,
        0x01, 0x00,             // PCM
        0x01, 0x00,             // 1 channel
        0x44, 0xAC, 0x00, 0x00, // 44100 Hz
        0x44, 0xAC, 0x00, 0x00, // Avg data rate
        0x01, 0x00,             // Block align
        0x08, 0x00,             // 8 bit per sample
        // New chunk goes here
        0x54, 0x45, 0x53, 0x54, // CID = TEST
        0x04, 0x00, 0x00, 0x00, // size
        0x05, 0x06, 0x07, 0x08, // data
        // data chunk
        'd' as u8, 'a' as u8, 't' as u8, 'a' as u8,
        0x03, 0x00, 0x00, 0x00, // 3 u8 = 3 bytes
        0x01, 0x02, 0x03, 0x00
    ];
    assert!(context.test_write(&wav_data, expected));
}

#[test]
fn written_data_can_be_read_back() {
    let mut context = TestContext::new();
    let samples = WavDataType::FLOAT64(vec![0.5, -0.25, 1.0, -1.0, 0.125, 0.0]);
    let mut wav_data = WavData::new_from_data(samples.clone(), 2, 96000);
    wav_data.add_chunk(Chunk::new_sampler_loop(3, 96000, 48, 0));
    let mut buffer = Vec::new();
    WavHandler::write_content(&mut buffer, &wav_data).unwrap();

    let read_back = context.get_data(&buffer).unwrap();
    assert!(read_back.get_fmt() == wav_data.get_fmt());
    assert!(read_back.get_samples() == &samples);
    assert!(read_back.get_chunk(CID_SMPL) == wav_data.get_chunk(CID_SMPL));
}
