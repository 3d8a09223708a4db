//! # Word Vectors
//!
//! Reads pre-trained word embeddings in the word2vec text format and aligns
//! them to a [`Vocabulary`]; writes learned embeddings back out in the same
//! format.
//!
//! ```text
//! aspirin 0.12 -0.40 0.03
//! tablet 0.88 0.10 -0.27
//! ```
//!
//! A leading `<count> <dims>` header line is accepted on input.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::{debug, info, warn};

use crate::dataset::Vocabulary;
use crate::error::{RelclassError, Result};

/// Row-major `rows × dim` embedding table; row `i` belongs to vocabulary id `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(RelclassError::Shape(format!(
                "embedding row {bad} has {} values, expected {dim}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            rows: rows.len(),
            dim,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Copy a 2-D `f32` tensor (e.g. a trained embedding layer).
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let (rows, dim) = tensor.dims2()?;
        let data = tensor.flatten_all()?.to_vec1::<f32>()?;
        Ok(Self { rows, dim, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// `f32` tensor of shape `(rows, dim)`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.data, (self.rows, self.dim), device)?)
    }
}

/// An external word → vector table.
#[derive(Debug, Clone)]
pub struct WordVectors {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    /// Read a word2vec text file.
    ///
    /// A first line of two integers is only taken as a `<count> <dims>`
    /// header when `dims` matches the width of the vectors that follow
    /// (and, for one-dimensional tables, `count` matches the row count).
    /// Otherwise it is an ordinary one-value row.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut dim = None;
        let mut vectors = HashMap::new();
        let mut candidate = None;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();

            if idx == 0 {
                if let Some(header) = Header::parse(word, &values) {
                    candidate = Some(header);
                    continue;
                }
            }

            let vector = parse_vector(path, idx + 1, word, &values)?;
            check_width(path, idx + 1, word, &mut dim, vector.len())?;
            vectors.insert(word.to_string(), vector);
        }

        if let Some(header) = candidate {
            if header.confirmed_by(dim, vectors.len()) {
                debug!(count = header.count, dims = header.dims, "skipped word2vec header");
            } else {
                check_width(path, 1, &header.word, &mut dim, 1)?;
                vectors.entry(header.word).or_insert_with(|| vec![header.dims as f32]);
            }
        }

        let dim = dim.ok_or_else(|| RelclassError::DataFormat {
            path: path.to_path_buf(),
            line: 0,
            reason: "no word vectors found".into(),
        })?;

        info!(path = %path.display(), words = vectors.len(), dim, "loaded word vectors");
        Ok(Self { dim, vectors })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }

    /// Build a matrix whose row `i` is the vector of vocabulary id `i`.
    ///
    /// Vocabulary words missing from the table get a zero row.
    pub fn select_vectors(&self, vocabulary: &Vocabulary) -> EmbeddingMatrix {
        let mut matrix = EmbeddingMatrix::zeros(vocabulary.len(), self.dim);
        let mut found = 0usize;

        for (id, word) in vocabulary.iter() {
            if let Some(vector) = self.vectors.get(word) {
                matrix.row_mut(id as usize).copy_from_slice(vector);
                found += 1;
            }
        }

        let missing = vocabulary.len() - found;
        if missing > 0 {
            warn!(missing, "vocabulary words without a pre-trained vector start at zero");
        }
        info!(found, missing, "selected pre-trained vectors for vocabulary");
        matrix
    }
}

/// A first line that looks like `<count> <dims>`.
struct Header {
    word: String,
    count: usize,
    dims: usize,
}

impl Header {
    fn parse(first: &str, rest: &[&str]) -> Option<Self> {
        let [dims] = rest else {
            return None;
        };
        Some(Self {
            word: first.to_string(),
            count: first.parse().ok()?,
            dims: dims.parse().ok()?,
        })
    }

    fn confirmed_by(&self, width: Option<usize>, rows: usize) -> bool {
        match width {
            Some(1) => self.dims == 1 && self.count == rows,
            Some(w) => self.dims == w,
            None => false,
        }
    }
}

fn parse_vector(path: &Path, line: usize, word: &str, values: &[&str]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| v.parse::<f32>())
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| RelclassError::DataFormat {
            path: path.to_path_buf(),
            line,
            reason: format!("invalid value in vector of {word:?}: {e}"),
        })
}

/// Fix the table width on the first row and hold every later row to it.
fn check_width(
    path: &Path,
    line: usize,
    word: &str,
    dim: &mut Option<usize>,
    width: usize,
) -> Result<()> {
    let reason = match *dim {
        None if width == 0 => format!("word {word:?} has no vector"),
        None => {
            *dim = Some(width);
            return Ok(());
        }
        Some(d) if d != width => format!("expected {d} values for {word:?}, found {width}"),
        Some(_) => return Ok(()),
    };
    Err(RelclassError::DataFormat {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

/// Write one `word v1 .. vN` line per vocabulary entry, in id order.
pub fn write_vectors<P: AsRef<Path>>(
    vocabulary: &Vocabulary,
    matrix: &EmbeddingMatrix,
    path: P,
) -> Result<()> {
    if matrix.rows() != vocabulary.len() {
        return Err(RelclassError::Shape(format!(
            "embedding matrix has {} rows but vocabulary has {} entries",
            matrix.rows(),
            vocabulary.len()
        )));
    }

    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    for (id, word) in vocabulary.iter() {
        write!(out, "{word}")?;
        for value in matrix.row(id as usize) {
            write!(out, " {value}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    info!(path = %path.display(), words = vocabulary.len(), "wrote word vectors");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetProvider;

    fn vocabulary(dir: &tempfile::TempDir) -> Vocabulary {
        let train = dir.path().join("train.txt");
        std::fs::write(&train, "aspirin tablet contains\nibuprofen capsule other\n").unwrap();
        DatasetProvider::build_vocabulary(&train)
            .unwrap()
            .vocabulary()
            .clone()
    }

    #[test]
    fn test_select_vectors_aligns_rows() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = vocabulary(&dir);
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "2 3\ntablet 1 2 3\nunrelated 9 9 9\naspirin 4 5 6\n").unwrap();

        let vectors = WordVectors::load(&path).unwrap();
        assert_eq!(vectors.dim(), 3);
        assert_eq!(vectors.len(), 3);

        let matrix = vectors.select_vectors(&vocab);
        assert_eq!(matrix.rows(), vocab.len());
        assert_eq!(matrix.row(vocab.encode("aspirin") as usize), &[4.0, 5.0, 6.0]);
        assert_eq!(matrix.row(vocab.encode("tablet") as usize), &[1.0, 2.0, 3.0]);
        // Missing words and the reserved id fall back to zeros.
        assert_eq!(matrix.row(vocab.encode("capsule") as usize), &[0.0; 3]);
        assert_eq!(matrix.row(0), &[0.0; 3]);
    }

    #[test]
    fn test_write_then_select_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = vocabulary(&dir);
        let rows: Vec<Vec<f32>> = (0..vocab.len())
            .map(|i| vec![i as f32 * 0.1, -1.0 / (i as f32 + 3.0), 1e-7])
            .collect();
        let matrix = EmbeddingMatrix::from_rows(rows).unwrap();

        let path = dir.path().join("weights.txt");
        write_vectors(&vocab, &matrix, &path).unwrap();
        let restored = WordVectors::load(&path).unwrap().select_vectors(&vocab);

        assert_eq!(restored.rows(), matrix.rows());
        for i in 0..matrix.rows() {
            for (a, b) in matrix.row(i).iter().zip(restored.row(i)) {
                assert!((a - b).abs() < 1e-6, "row {i}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_inconsistent_width_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "a 1 2\nb 1 2 3\n").unwrap();

        let err = WordVectors::load(&path).unwrap_err();
        assert!(matches!(err, RelclassError::DataFormat { line: 2, .. }));
    }

    #[test]
    fn test_numeric_first_row_is_not_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "81 2
aspirin 3
").unwrap();

        let vectors = WordVectors::load(&path).unwrap();
        assert_eq!(vectors.dim(), 1);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.get("81"), Some(&[2.0][..]));
        assert_eq!(vectors.get("aspirin"), Some(&[3.0][..]));
    }

    #[test]
    fn test_one_dimensional_header_needs_matching_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "2 1
aspirin 3
tablet 4
").unwrap();

        let vectors = WordVectors::load(&path).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.get("2"), None);
    }

    #[test]
    fn test_header_with_wrong_width_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        std::fs::write(&path, "1 2
aspirin 0.1 0.2 0.3
").unwrap();

        let err = WordVectors::load(&path).unwrap_err();
        assert!(matches!(err, RelclassError::DataFormat { line: 1, .. }));
    }

    #[test]
    fn test_write_rejects_row_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = vocabulary(&dir);
        let matrix = EmbeddingMatrix::zeros(vocab.len() + 1, 2);
        let err = write_vectors(&vocab, &matrix, dir.path().join("w.txt")).unwrap_err();
        assert!(matches!(err, RelclassError::Shape(_)));
    }

    #[test]
    fn test_from_tensor() {
        let t = Tensor::new(&[[1f32, 2.], [3., 4.]], &Device::Cpu).unwrap();
        let m = EmbeddingMatrix::from_tensor(&t).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.row(1), &[3.0, 4.0]);
    }
}
