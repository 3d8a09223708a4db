//! # relclass Core
//!
//! Data handling shared by the `lstm` and `cnn` text classifiers: typed
//! configuration, vocabulary and label maps, sequence padding, word vectors,
//! F1 metrics and the plain-text reporter. Nothing in this crate trains.
//!
//! ## Quick Start
//!
//! ```rust
//! use relclass_core::padding::{one_hot, pad_sequences};
//!
//! let padded = pad_sequences(&[vec![3, 4], vec![5, 6, 7, 8]], 3);
//! assert_eq!(padded.row(0), &[0, 3, 4]);
//! assert_eq!(padded.row(1), &[6, 7, 8]);
//!
//! let labels = one_hot(&[1, 0], 2).unwrap();
//! assert_eq!(labels.row(0), &[0.0, 1.0]);
//! ```
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod padding;
pub mod report;
pub mod vectors;

// Re-export primary API
pub use config::{
    CnnParams, CommonParams, DataPaths, ExperimentConfig, LstmParams, ModelKind, ModelParams,
    data_root_from, data_root_from_env,
};
pub use dataset::{DatasetProvider, Examples, LabelMap, Vocabulary};
pub use error::{RelclassError, Result};
pub use metrics::{Evaluation, MicroF1Scope, f1_micro_subset, f1_per_class};
pub use padding::{OneHotLabels, PaddedSequences, one_hot, pad_sequences};
pub use report::Reporter;
pub use vectors::{EmbeddingMatrix, WordVectors, write_vectors};
