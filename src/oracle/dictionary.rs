use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::core::error::DictionaryError;
use crate::oracle::TieBreakOracle;

/// Uniform shape every dictionary entry is normalized into at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictionaryRecord {
    pub gloss: Option<String>,
    pub pronunciation: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Gloss(String),
    Structured {
        #[serde(default, alias = "meaning", alias = "gloss")]
        definition: Option<String>,
        #[serde(default, alias = "reading", alias = "pronunciation")]
        pinyin: Option<String>,
    },
    Other(serde_json::Value),
}

impl From<RawEntry> for DictionaryRecord {
    fn from(entry: RawEntry) -> Self {
        match entry {
            RawEntry::Gloss(gloss) => DictionaryRecord {
                gloss: Some(gloss).filter(|g| !g.trim().is_empty()),
                pronunciation: None,
            },
            RawEntry::Structured { definition, pinyin } => DictionaryRecord {
                gloss: definition,
                pronunciation: pinyin,
            },
            RawEntry::Other(_) => DictionaryRecord::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDictionary {
    Entries(BTreeMap<String, RawEntry>),
    Headwords(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct DictionaryOracle {
    records: HashMap<String, DictionaryRecord>,
}

impl DictionaryOracle {
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let raw = fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let oracle = Self::from_json_str(&raw).map_err(|source| DictionaryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), entries = oracle.len(), "loaded dictionary");
        Ok(oracle)
    }

    /// Accepts either an object of `headword -> entry` or an array of headwords.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDictionary = serde_json::from_str(json)?;
        let records = match raw {
            RawDictionary::Entries(entries) => entries
                .into_iter()
                .map(|(headword, entry)| (headword, DictionaryRecord::from(entry)))
                .collect::<Vec<_>>(),
            RawDictionary::Headwords(words) => words
                .into_iter()
                .map(|headword| (headword, DictionaryRecord::default()))
                .collect(),
        };
        Ok(Self::from_records(records))
    }

    pub fn from_headwords<I, S>(headwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_records(
            headwords
                .into_iter()
                .map(|h| (h.as_ref().to_string(), DictionaryRecord::default())),
        )
    }

    fn from_records(records: impl IntoIterator<Item = (String, DictionaryRecord)>) -> Self {
        let records = records
            .into_iter()
            .filter_map(|(headword, record)| {
                let key = normalize_headword(&headword);
                (!key.is_empty()).then_some((key, record))
            })
            .collect();
        Self { records }
    }

    pub fn get(&self, headword: &str) -> Option<&DictionaryRecord> {
        self.records.get(&normalize_headword(headword))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn normalize_headword(headword: &str) -> String {
    headword.trim().nfc().collect()
}

impl TieBreakOracle for DictionaryOracle {
    fn has_entry(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }
}
