use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::TripletError;

/// One utterance of the training corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceRecord {
    /// Audio file holding the utterance.
    pub file: PathBuf,
    /// Speaker identity.
    pub speaker_id: String,
    /// Recording group of the utterance (LibriSpeech chapter).
    pub chapter_id: String,
}

impl UtteranceRecord {
    pub fn new(file: impl Into<PathBuf>, speaker_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            speaker_id: speaker_id.into(),
            chapter_id: chapter_id.into(),
        }
    }
}

/// Read-only table of utterances grouped by speaker.
///
/// Speakers are kept in sorted order so a seeded sampler draws the same
/// triplets on every run.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    records: Vec<UtteranceRecord>,
    speakers: Vec<String>,
    by_speaker: Vec<Vec<usize>>,
}

impl CorpusIndex {
    /// Builds an index from a list of records.
    pub fn new(records: Vec<UtteranceRecord>) -> Self {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, r) in records.iter().enumerate() {
            groups.entry(r.speaker_id.as_str()).or_default().push(i);
        }
        let speakers = groups.keys().map(|s| s.to_string()).collect();
        let by_speaker = groups.into_values().collect();
        Self {
            records,
            speakers,
            by_speaker,
        }
    }

    /// Scans a LibriSpeech-style tree for `.wav` files.
    ///
    /// File stems must look like `{speaker}-{chapter}-{utterance}`
    /// (e.g. `1272-128104-0000.wav`); other `.wav` files are skipped.
    pub fn scan_librispeech(dir: impl AsRef<Path>) -> Result<Self, TripletError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_wavs(dir, &mut files)?;
        files.sort();

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            match parse_librispeech_stem(&file) {
                Some((speaker, chapter)) => records.push(UtteranceRecord::new(file, speaker, chapter)),
                None => warn!("skipping {}: not a LibriSpeech file name", file.display()),
            }
        }
        debug!("scanned {} utterances under {}", records.len(), dir.display());
        Ok(Self::new(records))
    }

    /// Number of utterances.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no utterance.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in insertion order.
    pub fn records(&self) -> &[UtteranceRecord] {
        &self.records
    }

    /// Distinct speaker identities, sorted.
    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    /// Number of distinct speakers.
    pub fn num_speakers(&self) -> usize {
        self.speakers.len()
    }

    /// Records of the `i`-th speaker in [`CorpusIndex::speakers`] order.
    pub fn utterances_at(&self, i: usize) -> impl ExactSizeIterator<Item = &UtteranceRecord> + '_ {
        self.by_speaker[i].iter().map(|&r| &self.records[r])
    }

    /// Records of a speaker by identity. Empty if the speaker is unknown.
    pub fn utterances_of(&self, speaker_id: &str) -> Vec<&UtteranceRecord> {
        match self.speakers.binary_search_by(|s| s.as_str().cmp(speaker_id)) {
            Ok(i) => self.utterances_at(i).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn speaker_record(&self, speaker: usize, nth: usize) -> &UtteranceRecord {
        &self.records[self.by_speaker[speaker][nth]]
    }

    pub(crate) fn speaker_len(&self, speaker: usize) -> usize {
        self.by_speaker[speaker].len()
    }
}

fn collect_wavs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), TripletError> {
    let entries = fs::read_dir(dir).map_err(|e| TripletError::Corpus(format!("read {}: {e}", dir.display())))?;
    for entry in entries {
        let path = entry
            .map_err(|e| TripletError::Corpus(format!("read {}: {e}", dir.display())))?
            .path();
        if path.is_dir() {
            collect_wavs(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("wav")) {
            out.push(path);
        }
    }
    Ok(())
}

fn parse_librispeech_stem(file: &Path) -> Option<(String, String)> {
    let stem = file.file_stem()?.to_str()?;
    let mut parts = stem.split('-');
    let speaker = parts.next().filter(|s| !s.is_empty())?;
    let chapter = parts.next().filter(|s| !s.is_empty())?;
    parts.next()?;
    Some((speaker.to_string(), chapter.to_string()))
}
