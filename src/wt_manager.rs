//! Manages access to extracted wavetables.
//!
//! Has a cache with wavetables, handing references out to clients asking for
//! a table. Several tables can be extracted from the same recording in
//! parallel, e.g. one per sustained note or per region of an evolving tone.

use super::{SampleBuffer, Wavetable, WavetableRef, WtError};
use super::{ExtractSettings, WtExtractor, WtReader};

use crossbeam::channel::unbounded;
use log::{info, warn};
use scoped_threadpool::Pool;
use serde::{Serialize, Deserialize};

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WtInfo {
    pub id: usize,             // ID of wavetable, used as reference
    pub name: String,          // Name of the wavetable
    pub root_frequency: f32,   // Frequency of the reference harmonic
    pub num_harmonics: usize,
    pub num_samples: usize,
    pub filename: String       // Wavetable filename, empty if not written yet
}

/// A single table to extract in a batch.
#[derive(Clone, Debug)]
pub struct ExtractJob {
    pub id: usize,
    pub name: String,
    pub settings: ExtractSettings,
}

pub struct WtManager {
    num_threads: u32,
    output_bits: u16,
    output_sample_rate: u32,
    cache: HashMap<usize, (WtInfo, WavetableRef)>,
    reader: WtReader,
}

impl WtManager {
    /// Generate a new WtManager instance.
    ///
    /// num_threads is the number of worker threads used for batch
    /// extraction.
    ///
    /// ```
    /// use wextract::WtManager;
    ///
    /// let wt_manager = WtManager::new(4);
    /// ```
    pub fn new(num_threads: u32) -> WtManager {
        WtManager{
            num_threads: num_threads.max(1),
            output_bits: 32,
            output_sample_rate: 44100,
            cache: HashMap::new(),
            reader: WtReader::new(""),
        }
    }

    /// Set the sample format used by write_table().
    pub fn set_output_format(&mut self, bits_per_sample: u16, sample_rate: u32) {
        self.output_bits = bits_per_sample;
        self.output_sample_rate = sample_rate;
    }

    /// Add a table with the given info to the cache.
    ///
    /// An existing table with the same ID is replaced.
    pub fn add_table(&mut self, wt_info: WtInfo, table: WavetableRef) {
        info!("Adding table {} [{}] to cache", wt_info.id, wt_info.name);
        self.cache.insert(wt_info.id, (wt_info, table));
    }

    /// Get a single wavetable by id from the cache.
    ///
    /// ```
    /// use wextract::{Wavetable, WtInfo, WtManager};
    /// use std::sync::Arc;
    ///
    /// let mut wt_manager = WtManager::new(1);
    /// let info = WtInfo{
    ///         id: 1,
    ///         name: "Silence".to_string(),
    ///         root_frequency: 0.0,
    ///         num_harmonics: 0,
    ///         num_samples: 2048,
    ///         filename: "".to_string()};
    /// wt_manager.add_table(info, Arc::new(Wavetable::build(&[], 2048, true)));
    /// let table_ref = wt_manager.get_table(1);
    /// assert!(table_ref.is_some());
    /// ```
    pub fn get_table(&self, id: usize) -> Option<WavetableRef> {
        self.cache.get(&id).map(|(_, table)| table.clone())
    }

    pub fn get_info(&self, id: usize) -> Option<&WtInfo> {
        self.cache.get(&id).map(|(wt_info, _)| wt_info)
    }

    /// Infos of all cached tables, ordered by ID.
    pub fn table_infos(&self) -> Vec<WtInfo> {
        let mut infos: Vec<WtInfo> = self.cache.values().map(|(wt_info, _)| wt_info.clone()).collect();
        infos.sort_by_key(|wt_info| wt_info.id);
        infos
    }

    /// Extract several tables from the same buffer in parallel.
    ///
    /// Returns one result per job, in the order of the jobs. Successfully
    /// extracted tables are added to the cache, failed jobs leave the cache
    /// untouched.
    pub fn extract_batch(&mut self, buffer: &SampleBuffer, jobs: &[ExtractJob]) -> Vec<Result<WtInfo, WtError>> {
        info!("Extracting {} tables with {} threads", jobs.len(), self.num_threads);
        let (tx, rx) = unbounded();
        let mut pool = Pool::new(self.num_threads);
        pool.scoped(|scope| {
            for (index, job) in jobs.iter().enumerate() {
                let tx = tx.clone();
                scope.execute(move || {
                    let result = WtExtractor::new(job.settings.clone())
                        .and_then(|extractor| extractor.extract(buffer));
                    // Receiver lives until all jobs are done
                    let _ = tx.send((index, result));
                });
            }
        });
        drop(tx);

        let mut finished: Vec<_> = rx.iter().collect();
        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter()
            .map(|(index, result)| {
                let job = &jobs[index];
                match result {
                    Ok((table, harmonics)) => {
                        let wt_info = WtInfo{
                            id: job.id,
                            name: job.name.clone(),
                            root_frequency: harmonics.first().map_or(0.0, |h| h.frequency),
                            num_harmonics: harmonics.len(),
                            num_samples: table.len(),
                            filename: "".to_string(),
                        };
                        self.add_table(wt_info.clone(), table);
                        Ok(wt_info)
                    }
                    Err(err) => {
                        warn!("Extracting table {} [{}] failed: {}", job.id, job.name, err);
                        Err(err)
                    }
                }
            })
            .collect()
    }

    /// Write a cached table to a WAV file.
    ///
    /// On success, the filename is stored in the table info.
    pub fn write_table(&mut self, id: usize, filename: &str) -> Result<(), WtError> {
        let (wt_info, table) = match self.cache.get_mut(&id) {
            Some(entry) => entry,
            None => {
                warn!("No table with ID {} in cache", id);
                return Err(WtError::InvalidSettings(format!("Unknown table ID {}", id)));
            }
        };
        self.reader.write_table(table, filename, self.output_bits, self.output_sample_rate)?;
        wt_info.filename = filename.to_string();
        Ok(())
    }

    /// Load a previously written table and add it to the cache.
    ///
    /// The file named in the info is read as a single cycle. Only the first
    /// channel is used.
    pub fn load_table(&mut self, wt_info: WtInfo) -> Result<WavetableRef, WtError> {
        let buffer = self.reader.read_file(&wt_info.filename)?;
        let samples: Vec<f32> = buffer.samples.iter()
            .step_by(buffer.num_channels)
            .cloned()
            .collect();
        let table = Arc::new(Wavetable::from_samples(samples));
        let wt_info = WtInfo{num_samples: table.len(), ..wt_info};
        self.add_table(wt_info, table.clone());
        Ok(table)
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn test_buffer() -> SampleBuffer {
    use std::f64::consts::PI;
    let sample_rate = 22050;
    let samples = (0..sample_rate)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            // Root moves from 200 Hz to 300 Hz after half a second
            let root = if t < 0.5 { 200.0 } else { 300.0 };
            ((2.0 * PI * root * t).sin() + 0.5 * (4.0 * PI * root * t).sin()) as f32
        })
        .collect();
    SampleBuffer::new(samples, 1, sample_rate as u32)
}

#[cfg(test)]
fn test_job(id: usize, region_start: f64, root_frequency: f32) -> ExtractJob {
    let mut settings = ExtractSettings::default();
    settings.region_start = region_start;
    settings.region_end = region_start + 0.2;
    settings.root_frequency = Some(root_frequency);
    settings.max_harmonics = 3;
    settings.table_size = 256;
    ExtractJob{id, name: format!("Table {}", id), settings}
}

#[cfg(test)]
fn test_info(id: usize) -> WtInfo {
    WtInfo{
        id,
        name: format!("Table {}", id),
        root_frequency: 100.0,
        num_harmonics: 1,
        num_samples: 4,
        filename: "".to_string()}
}

#[test]
fn tables_can_be_added_and_retrieved() {
    let mut wt_manager = WtManager::new(1);
    assert!(wt_manager.get_table(3).is_none());
    wt_manager.add_table(test_info(3), Arc::new(Wavetable::from_samples(vec![0.0, 1.0, 0.0, -1.0])));
    wt_manager.add_table(test_info(1), Arc::new(Wavetable::from_samples(vec![0.0; 4])));
    assert!(wt_manager.get_table(3).unwrap().table == vec![0.0, 1.0, 0.0, -1.0]);
    assert!(wt_manager.get_info(1).unwrap().name == "Table 1");
    let ids: Vec<usize> = wt_manager.table_infos().iter().map(|i| i.id).collect();
    assert!(ids == vec![1, 3]);
}

#[test]
fn batch_results_keep_job_order() {
    let mut wt_manager = WtManager::new(3);
    let mut failing = test_job(7, 0.0, 200.0);
    failing.settings.channel = 1; // Buffer is mono
    let jobs = vec![test_job(2, 0.1, 200.0), failing, test_job(5, 0.6, 300.0)];
    let results = wt_manager.extract_batch(&test_buffer(), &jobs);

    assert!(results.len() == 3);
    let first = results[0].as_ref().unwrap();
    assert!(first.id == 2);
    assert!(first.num_harmonics == 2);
    assert!(first.num_samples == 256);
    assert!((first.root_frequency - 200.0).abs() < 2.0);
    assert!(matches!(results[1], Err(WtError::InvalidSettings(_))));
    let third = results[2].as_ref().unwrap();
    assert!(third.id == 5);
    assert!((third.root_frequency - 300.0).abs() < 3.0);

    assert!(wt_manager.get_table(2).is_some());
    assert!(wt_manager.get_table(7).is_none());
    assert!(wt_manager.get_table(5).unwrap().len() == 256);
}

#[test]
fn unknown_table_can_not_be_written() {
    let mut wt_manager = WtManager::new(1);
    assert!(wt_manager.write_table(42, "unused.wav").is_err());
}

#[test]
fn written_table_can_be_loaded() {
    let mut wt_manager = WtManager::new(1);
    let samples = vec![0.0, 0.25, 0.5, -0.75];
    wt_manager.add_table(test_info(1), Arc::new(Wavetable::from_samples(samples.clone())));

    let path = std::env::temp_dir().join(format!("wextract_test_{}.wav", std::process::id()));
    let filename = path.to_string_lossy().into_owned();
    wt_manager.write_table(1, &filename).unwrap();
    assert!(wt_manager.get_info(1).unwrap().filename == filename);

    let mut wt_info = test_info(2);
    wt_info.filename = filename.clone();
    wt_info.num_samples = 0;
    let table = wt_manager.load_table(wt_info).unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(table.table == samples);
    assert!(wt_manager.get_info(2).unwrap().num_samples == 4);
}
