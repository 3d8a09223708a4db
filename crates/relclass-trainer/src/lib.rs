//! # relclass trainer
//!
//! Builds, trains and evaluates the LSTM and CNN relation classifiers on
//! top of the data handling in `relclass-core`. The `lstm` and `cnn`
//! binaries are thin wrappers around [`pipeline::run`].

pub mod dropout;
pub mod evaluate;
pub mod init;
pub mod model;
pub mod optim;
pub mod pipeline;
pub mod trainer;

pub use evaluate::{Distribution, predict};
pub use model::{Model, ModelShape};
pub use optim::{ParamsRmsProp, RmsProp};
pub use pipeline::{Outcome, run};
pub use trainer::{EpochMetrics, TrainSettings, fit};
