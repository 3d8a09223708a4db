//! # relclass
//!
//! Relation classification over short token sequences with an LSTM or a
//! CNN. Data loading, padding, word vectors and F1 scoring live in
//! [`relclass_core`]; model building, training and the end-to-end run live
//! in [`relclass_trainer`].
//!
//! ```no_run
//! use relclass::{ExperimentConfig, ModelKind};
//!
//! let config = ExperimentConfig::load("cnn.cfg", ModelKind::Cnn)?;
//! let outcome = relclass::run(&config, "/data/relations".as_ref(), std::io::stdout())?;
//! println!("{:?}", outcome.f1("contains"));
//! # Ok::<(), relclass::RelclassError>(())
//! ```

pub use relclass_core;
pub use relclass_trainer;

pub use relclass_core::{
    DataPaths, DatasetProvider, EmbeddingMatrix, Evaluation, ExperimentConfig, LabelMap,
    MicroF1Scope, ModelKind, ModelParams, RelclassError, Result, Vocabulary, WordVectors,
};
pub use relclass_trainer::{Model, ModelShape, Outcome, TrainSettings, run};
