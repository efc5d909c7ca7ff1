//! Dataset readers.
//!
//! A source path is either a single file or a directory whose matching files are
//! read in name order. Records are decoded lazily, one file open at a time, so a
//! whole extract never has to fit in memory. Lines or rows that fail to decode are
//! logged and skipped.

use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::Result;
use crate::metrics::SourcesMetrics;
use crate::sources::{OpenAddressesRow, OsmNode, TigerFeature};

pub const OSM_EXTENSIONS: &[&str] = &["ndjson", "jsonl", "json"];
pub const TIGER_EXTENSIONS: &[&str] = &["geojsonl", "geojsons", "ndjson", "jsonl"];
pub const OPENADDRESSES_EXTENSIONS: &[&str] = &["csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One JSON document per line
    JsonLines,
    /// Headed CSV
    Csv,
}

/// Files making up a dataset, sorted by name when `path` is a directory.
pub fn dataset_files(path: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let candidate = entry.path();
        if candidate.is_file() && has_extension(&candidate, extensions) {
            files.push(candidate);
        }
    }
    files.sort();
    if files.is_empty() {
        warn!(path = %path.display(), ?extensions, "No dataset files found");
    }
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)))
        .unwrap_or(false)
}

pub fn osm_nodes(path: &Path) -> Result<DatasetRecords<OsmNode>> {
    let files = dataset_files(path, OSM_EXTENSIONS)?;
    Ok(DatasetRecords::new(constants::OSM_SOURCE, RecordFormat::JsonLines, files))
}

pub fn tiger_features(path: &Path) -> Result<DatasetRecords<TigerFeature>> {
    let files = dataset_files(path, TIGER_EXTENSIONS)?;
    Ok(DatasetRecords::new(constants::TIGER_SOURCE, RecordFormat::JsonLines, files))
}

pub fn openaddresses_rows(path: &Path) -> Result<DatasetRecords<OpenAddressesRow>> {
    let files = dataset_files(path, OPENADDRESSES_EXTENSIONS)?;
    Ok(DatasetRecords::new(constants::OPENADDRESSES_SOURCE, RecordFormat::Csv, files))
}

/// Lazy record iterator over a list of files.
pub struct DatasetRecords<T> {
    source: &'static str,
    format: RecordFormat,
    pending: VecDeque<PathBuf>,
    current: Option<Decoder<T>>,
}

enum Decoder<T> {
    JsonLines {
        path: PathBuf,
        lines: Lines<BufReader<File>>,
        line: usize,
    },
    Csv {
        path: PathBuf,
        rows: csv::DeserializeRecordsIntoIter<BufReader<File>, T>,
        row: usize,
    },
}

impl<T> Decoder<T> {
    fn path(&self) -> &Path {
        match self {
            Decoder::JsonLines { path, .. } | Decoder::Csv { path, .. } => path,
        }
    }
}

impl<T: DeserializeOwned> DatasetRecords<T> {
    pub fn new(source: &'static str, format: RecordFormat, files: Vec<PathBuf>) -> Self {
        Self {
            source,
            format,
            pending: files.into(),
            current: None,
        }
    }

    fn open(&self, path: PathBuf) -> Result<Decoder<T>> {
        let reader = BufReader::new(File::open(&path)?);
        debug!(source = self.source, file = %path.display(), "Opening dataset file");
        Ok(match self.format {
            RecordFormat::JsonLines => Decoder::JsonLines {
                path,
                lines: reader.lines(),
                line: 0,
            },
            RecordFormat::Csv => {
                let rows = csv::ReaderBuilder::new()
                    .flexible(true)
                    .trim(csv::Trim::All)
                    .from_reader(reader)
                    .into_deserialize();
                Decoder::Csv { path, rows, row: 0 }
            }
        })
    }

    fn skip(&self, path: &Path, position: usize, error: &dyn std::fmt::Display) {
        warn!(
            source = self.source,
            file = %path.display(),
            position,
            error = %error,
            "Skipping undecodable record"
        );
        SourcesMetrics::record_decode_error(self.source);
    }
}

/// Next decoded record from the open file; `None` once the file is exhausted.
fn next_in<T: DeserializeOwned>(
    records: &DatasetRecords<T>,
    decoder: &mut Decoder<T>,
) -> Option<T> {
    match decoder {
        Decoder::JsonLines { path, lines, line } => loop {
            let raw = match lines.next()? {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(source = records.source, file = %path.display(), error = %e, "Read failed; abandoning file");
                    return None;
                }
            };
            *line += 1;
            // GeoJSON text sequences prefix each record with an RS byte
            let text = raw.trim().trim_start_matches('\u{1e}').trim_end_matches(',');
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(text) {
                Ok(record) => return Some(record),
                Err(e) => records.skip(path, *line, &e),
            }
        },
        Decoder::Csv { path, rows, row } => loop {
            let decoded = rows.next()?;
            *row += 1;
            match decoded {
                Ok(record) => return Some(record),
                Err(e) => records.skip(path, *row, &e),
            }
        },
    }
}

impl<T: DeserializeOwned> Iterator for DatasetRecords<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(mut decoder) = self.current.take() {
                if let Some(record) = next_in(self, &mut decoder) {
                    self.current = Some(decoder);
                    return Some(record);
                }
                info!(source = self.source, "Finished loading: {}", decoder.path().display());
                continue;
            }

            let path = self.pending.pop_front()?;
            match self.open(path.clone()) {
                Ok(decoder) => self.current = Some(decoder),
                Err(e) => {
                    warn!(source = self.source, file = %path.display(), error = %e, "Cannot open dataset file");
                }
            }
        }
    }
}
