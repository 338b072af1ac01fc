//! Line oriented M3U parser
//!
//! [`M3uParser`] turns any [`BufRead`] into a lazy, finite sequence of
//! [`PlaylistRecord`]s. Each record is assembled from an `#EXTINF` line and
//! the URL line that follows it:
//!
//! ```text
//! #EXTM3U
//! #EXTINF:-1 tvg-id="espn.us" tvg-name="HD ESPN" group-title="Sports",HD ESPN
//! http://example.com/espn.ts
//! ```
//!
//! The parser is not restartable; open a fresh reader to parse again.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{PlaylistRecord, GROUP_TITLE, TVG_NAME};

const FILE_HEADER: &str = "#EXTM3U";
const EXTINF_PREFIX: &str = "#EXTINF";

/// Number of `key="value"` pairs the EXTINF grammar captures
const MAX_ATTRIBUTES: usize = 5;

fn extinf_regex() -> &'static Regex {
    static EXTINF: OnceLock<Regex> = OnceLock::new();
    EXTINF.get_or_init(|| {
        let pair = r#"(?: *?([\w-]*)="(.*?)")?"#;
        let pattern = format!(r"^#EXTINF:-?\d+,?{}.*,(.*)", pair.repeat(MAX_ATTRIBUTES));
        Regex::new(&pattern).expect("EXTINF grammar is a valid regex")
    })
}

fn leading_word_regex() -> &'static Regex {
    static LEADING_WORD: OnceLock<Regex> = OnceLock::new();
    LEADING_WORD.get_or_init(|| Regex::new(r"^\w*").expect("leading word is a valid regex"))
}

/// Fields extracted from one EXTINF line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtinfFields {
    pub attributes: Vec<(String, String)>,
    pub label: String,
}

/// Extract the attributes and trailing label from an EXTINF line
pub fn parse_extinf(line: &str) -> AppResult<ExtinfFields> {
    let caps = extinf_regex()
        .captures(line)
        .ok_or_else(|| AppError::record_extraction(line))?;

    let attributes = (0..MAX_ATTRIBUTES)
        .filter_map(|i| {
            let key = caps.get(1 + i * 2)?.as_str();
            let value = caps.get(2 + i * 2)?.as_str();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect();

    let label = caps
        .get(1 + MAX_ATTRIBUTES * 2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Ok(ExtinfFields { attributes, label })
}

/// Fill in `tvg-name` and `group-title` when the playlist omits them
pub fn derive_defaults(record: &mut PlaylistRecord) {
    if record.tvg_name().map_or(true, str::is_empty) {
        record
            .attributes
            .insert(TVG_NAME.to_string(), record.label.clone());
    }

    if record.group_title().map_or(true, str::is_empty) {
        let name = record.tvg_name().unwrap_or_default();
        let group = leading_word_regex()
            .find(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        record.attributes.insert(GROUP_TITLE.to_string(), group);
    }
}

#[derive(Debug, Default)]
struct PendingRecord {
    attributes: BTreeMap<String, String>,
    label: String,
    has_extinf: bool,
    poisoned: bool,
}

/// Counters collected while parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub malformed: usize,
    pub dangling: usize,
}

pub struct M3uParser<R> {
    lines: Lines<R>,
    pending: PendingRecord,
    stats: ParseStats,
    finished: bool,
}

impl M3uParser<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> M3uParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            pending: PendingRecord::default(),
            stats: ParseStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    fn handle_extinf(&mut self, line: &str) {
        self.pending.has_extinf = true;
        match parse_extinf(line) {
            Ok(fields) => {
                self.pending.attributes.extend(fields.attributes);
                self.pending.label = fields.label;
            }
            Err(e) => {
                warn!("Skipping playlist entry: {}", e);
                self.pending.poisoned = true;
            }
        }
    }

    fn complete(&mut self, url: &str) -> Option<PlaylistRecord> {
        let pending = std::mem::take(&mut self.pending);
        if pending.poisoned {
            self.stats.malformed += 1;
            debug!("Dropped stream {} after malformed EXTINF", url);
            return None;
        }

        let mut record = PlaylistRecord {
            attributes: pending.attributes,
            label: pending.label,
            stream: url.to_string(),
        };
        derive_defaults(&mut record);
        self.stats.records += 1;
        Some(record)
    }

    fn finish(&mut self) {
        self.finished = true;
        if self.pending.has_extinf {
            self.stats.dangling += 1;
            warn!(
                "Playlist ended after an EXTINF line without a stream URL (label '{}'), entry dropped",
                self.pending.label
            );
        }
        self.pending = PendingRecord::default();
    }
}

impl<R: BufRead> Iterator for M3uParser<R> {
    type Item = PlaylistRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!("Failed to read playlist line {}: {}", self.stats.lines + 1, e);
                    self.finish();
                    return None;
                }
                None => {
                    self.finish();
                    return None;
                }
            };
            self.stats.lines += 1;

            let line = line.trim_start_matches('\u{feff}').trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with(FILE_HEADER) {
                continue;
            }

            if line.starts_with(EXTINF_PREFIX) {
                self.handle_extinf(line);
                continue;
            }

            if let Some(record) = self.complete(line.trim()) {
                return Some(record);
            }
        }
    }
}
