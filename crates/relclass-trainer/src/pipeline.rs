//! End-to-end experiment: load, train, evaluate, report.

use std::io::Write;
use std::path::Path;

use candle_core::Device;
use relclass_core::Result;
use relclass_core::config::{ExperimentConfig, ModelParams};
use relclass_core::dataset::DatasetProvider;
use relclass_core::metrics::Evaluation;
use relclass_core::padding::{one_hot, pad_sequences};
use relclass_core::report::Reporter;
use relclass_core::vectors::{WordVectors, write_vectors};
use tracing::{info, warn};

use crate::evaluate::predict;
use crate::model::{Model, ModelShape};
use crate::trainer::{EpochMetrics, TrainSettings, fit};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub history: Vec<EpochMetrics>,
    pub evaluation: Evaluation,
    /// Label strings indexed by id.
    pub labels: Vec<String>,
}

impl Outcome {
    /// F1 of `label`, if the label exists.
    pub fn f1(&self, label: &str) -> Option<f64> {
        let id = self.labels.iter().position(|l| l == label)?;
        self.evaluation.per_class.get(id).copied()
    }
}

/// Run one experiment, writing the human-readable report to `out`.
///
/// Data paths in `config` are resolved against `data_root`; the learned
/// embeddings file of a CNN run is written where `[data] weights` points.
pub fn run<W: Write>(config: &ExperimentConfig, data_root: &Path, out: W) -> Result<Outcome> {
    let params = &config.model;
    let paths = config.data.resolve(data_root);
    let mut reporter = Reporter::new(out);
    reporter.config(&paths, params)?;

    let provider = DatasetProvider::build_vocabulary(&paths.train)?;
    let train = provider.load(&paths.train, None)?;
    let max_len = train.max_len();
    let test = provider.load(&paths.test, Some(max_len))?;
    info!(train = train.len(), test = test.len(), max_len, "loaded examples");

    let pretrained = match (params, &paths.embed) {
        (ModelParams::Cnn(_), Some(embed)) => {
            let vectors = WordVectors::load(embed)?;
            Some(vectors.select_vectors(provider.vocabulary()))
        }
        (ModelParams::Lstm(_), Some(embed)) => {
            warn!(path = %embed.display(), "LSTM ignores pre-trained embeddings");
            None
        }
        (_, None) => None,
    };

    let labels = provider.labels();
    let train_x = pad_sequences(&train.sequences, max_len);
    let train_y = one_hot(&train.labels, labels.len())?;
    let test_x = pad_sequences(&test.sequences, max_len);
    let test_y = one_hot(&test.labels, labels.len())?;
    reporter.shape("train_x", train_x.shape())?;
    reporter.shape("train_y", train_y.shape())?;
    reporter.shape("test_x", test_x.shape())?;
    reporter.shape("test_y", test_y.shape())?;

    let shape = ModelShape {
        vocab_size: provider.vocabulary().len(),
        max_len,
        classes: labels.len(),
    };
    let model = Model::build(params, shape, pretrained.as_ref(), &Device::Cpu)?;

    let settings = TrainSettings::for_params(params);
    let history = fit(&model, &train_x, &train_y, &settings, reporter.writer())?;

    if let ModelParams::Cnn(_) = params {
        write_vectors(provider.vocabulary(), &model.embedding_weights()?, &paths.weights)?;
    }

    let predicted = predict(&model, &test_x, settings.batch_size)?.argmax();
    let gold = test_y.argmax();
    let evaluation = Evaluation::compute(&gold, &predicted, labels)?;
    reporter.scores(labels, &evaluation)?;
    info!(aggregate = evaluation.aggregate, "evaluation finished");

    Ok(Outcome {
        history,
        evaluation,
        labels: labels.iter().map(|(_, l)| l.to_string()).collect(),
    })
}
