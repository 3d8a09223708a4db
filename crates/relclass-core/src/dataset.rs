//! # Dataset Provider
//!
//! Learns the vocabulary and label map from a training file, then loads any
//! file into aligned id sequences and label ids.
//!
//! One example per line: whitespace-delimited tokens followed by the label.
//!
//! ```text
//! aspirin relieves mild headaches treats
//! the tablet contains 81 mg aspirin contains
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RelclassError, Result};
use crate::padding::truncate_front;

/// Token stored at the reserved id.
pub const UNK_TOKEN: &str = "<unk>";

/// Id of unknown tokens; also the padding sentinel.
pub const UNK_ID: u32 = 0;

/// Frozen word → id mapping. Id 0 is reserved for unknown tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    word2int: HashMap<String, u32>,
    int2word: Vec<String>,
}

impl Vocabulary {
    fn new() -> Self {
        let mut vocab = Self {
            word2int: HashMap::new(),
            int2word: Vec::new(),
        };
        vocab.insert(UNK_TOKEN);
        vocab
    }

    fn insert(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.word2int.get(word) {
            return id;
        }
        let id = self.int2word.len() as u32;
        self.word2int.insert(word.to_string(), id);
        self.int2word.push(word.to_string());
        id
    }

    /// Id of `word`, or [`UNK_ID`] when it was never seen in training.
    pub fn encode(&self, word: &str) -> u32 {
        self.word2int.get(word).copied().unwrap_or(UNK_ID)
    }

    pub fn get(&self, word: &str) -> Option<u32> {
        self.word2int.get(word).copied()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.int2word.get(id as usize).map(String::as_str)
    }

    /// Number of ids, including the reserved one.
    pub fn len(&self) -> usize {
        self.int2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.int2word.is_empty()
    }

    /// Words in id order, starting with [`UNK_TOKEN`].
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.int2word
            .iter()
            .enumerate()
            .map(|(id, w)| (id as u32, w.as_str()))
    }
}

/// Frozen label → id mapping, ids assigned in first-seen order from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    label2int: HashMap<String, u32>,
    int2label: Vec<String>,
}

impl LabelMap {
    fn new() -> Self {
        Self {
            label2int: HashMap::new(),
            int2label: Vec::new(),
        }
    }

    fn insert(&mut self, label: &str) -> u32 {
        if let Some(&id) = self.label2int.get(label) {
            return id;
        }
        let id = self.int2label.len() as u32;
        self.label2int.insert(label.to_string(), id);
        self.int2label.push(label.to_string());
        id
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.label2int.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.label2int.contains_key(label)
    }

    pub fn label(&self, id: u32) -> Option<&str> {
        self.int2label.get(id as usize).map(String::as_str)
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.int2label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.int2label.is_empty()
    }

    /// Labels in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.int2label
            .iter()
            .enumerate()
            .map(|(id, l)| (id as u32, l.as_str()))
    }

    /// All label ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        (0..self.int2label.len() as u32).collect()
    }
}

impl<'a> FromIterator<&'a str> for LabelMap {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut map = LabelMap::new();
        for label in iter {
            map.insert(label);
        }
        map
    }
}

/// Aligned id sequences and label ids loaded from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Examples {
    pub sequences: Vec<Vec<u32>>,
    pub labels: Vec<u32>,
}

impl Examples {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Length of the longest sequence (0 when empty).
    pub fn max_len(&self) -> usize {
        self.sequences.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Vocabulary and label map learned from a training file.
#[derive(Debug, Clone)]
pub struct DatasetProvider {
    vocabulary: Vocabulary,
    labels: LabelMap,
}

impl DatasetProvider {
    /// Learn the vocabulary and label map from `train_path`.
    pub fn build_vocabulary<P: AsRef<Path>>(train_path: P) -> Result<Self> {
        let path = train_path.as_ref();
        let mut vocabulary = Vocabulary::new();
        let mut labels = LabelMap::new();

        for_each_example(path, |_, tokens, label| {
            for token in tokens {
                vocabulary.insert(token);
            }
            labels.insert(label);
            Ok(())
        })?;

        info!(
            path = %path.display(),
            words = vocabulary.len(),
            labels = labels.len(),
            "built vocabulary"
        );
        Ok(Self { vocabulary, labels })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Map every example in `path` through the frozen vocabulary and label map.
    ///
    /// Unknown words become [`UNK_ID`]; unknown labels are an error. With
    /// `max_len`, longer sequences keep only their last `max_len` ids.
    pub fn load<P: AsRef<Path>>(&self, path: P, max_len: Option<usize>) -> Result<Examples> {
        let path = path.as_ref();
        let mut examples = Examples::default();

        for_each_example(path, |line, tokens, label| {
            let label_id = self.labels.get(label).ok_or_else(|| RelclassError::UnknownLabel {
                path: path.to_path_buf(),
                line,
                label: label.to_string(),
            })?;
            let mut seq: Vec<u32> = tokens.iter().map(|t| self.vocabulary.encode(t)).collect();
            if let Some(width) = max_len {
                truncate_front(&mut seq, width);
            }
            examples.sequences.push(seq);
            examples.labels.push(label_id);
            Ok(())
        })?;

        debug!(path = %path.display(), examples = examples.len(), "loaded examples");
        Ok(examples)
    }
}

/// Call `f(line_number, tokens, label)` for every example line in `path`.
fn for_each_example<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, &[&str], &str) -> Result<()>,
{
    let reader = BufReader::new(File::open(path)?);

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some((label, tokens)) = fields.split_last().filter(|(_, t)| !t.is_empty()) else {
            return Err(malformed(path, idx + 1));
        };
        f(idx + 1, tokens, label)?;
    }

    Ok(())
}

fn malformed(path: &Path, line: usize) -> RelclassError {
    RelclassError::DataFormat {
        path: PathBuf::from(path),
        line,
        reason: "expected one or more tokens followed by a label".into(),
    }
}
