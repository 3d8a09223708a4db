//! Mini-batch training loop.

use std::io::Write;

use candle_core::{D, Device, Tensor};
use candle_nn::Optimizer;
use oorandom::Rand32;
use relclass_core::config::ModelParams;
use relclass_core::metrics::accuracy;
use relclass_core::padding::{OneHotLabels, PaddedSequences};
use relclass_core::{RelclassError, Result};
use tracing::{debug, info};

use crate::dropout::DropoutMasks;
use crate::model::Model;
use crate::optim::{ParamsRmsProp, RmsProp};

/// Fraction of training rows the LSTM holds out for validation.
pub const LSTM_VALIDATION_SPLIT: f64 = 0.1;
/// The CNN trains on every row.
pub const CNN_VALIDATION_SPLIT: f64 = 0.0;

/// How [`fit`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSettings {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// Trailing fraction of the training rows used only for validation.
    pub validation_split: f64,
    pub seed: u64,
}

impl TrainSettings {
    pub fn for_params(params: &ModelParams) -> Self {
        let common = params.common();
        let validation_split = match params {
            ModelParams::Lstm(_) => LSTM_VALIDATION_SPLIT,
            ModelParams::Cnn(_) => CNN_VALIDATION_SPLIT,
        };
        Self {
            batch_size: common.batch,
            epochs: common.epochs,
            learning_rate: common.learnrt,
            validation_split,
            seed: common.seed,
        }
    }
}

/// Per-epoch metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

impl std::fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loss: {:.4} - acc: {:.4}", self.loss, self.accuracy)?;
        if let (Some(loss), Some(acc)) = (self.val_loss, self.val_accuracy) {
            write!(f, " - val_loss: {loss:.4} - val_acc: {acc:.4}")?;
        }
        Ok(())
    }
}

/// Categorical cross-entropy of `logits` against one-hot `targets`, averaged over rows.
pub fn categorical_crossentropy(logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    log_probs.mul(targets)?.sum(D::Minus1)?.neg()?.mean_all()
}

/// Row index at which the validation rows start.
pub fn validation_split_at(rows: usize, fraction: f64) -> usize {
    (rows as f64 * (1.0 - fraction)).floor() as usize
}

fn shuffle(indices: &mut [u32], seed: u64) {
    let mut rng = Rand32::new(seed);
    for i in (1..indices.len()).rev() {
        let j = rng.rand_range(0..(i as u32 + 1)) as usize;
        indices.swap(i, j);
    }
}

/// Train `model` with RMSProp for the full configured number of epochs.
///
/// One `Epoch i/n - ...` line per epoch is written to `progress`.
pub fn fit<W: Write>(
    model: &Model,
    train_x: &PaddedSequences,
    train_y: &OneHotLabels,
    settings: &TrainSettings,
    progress: &mut W,
) -> Result<Vec<EpochMetrics>> {
    if train_x.rows() != train_y.rows() {
        return Err(RelclassError::Shape(format!(
            "{} sequences but {} label rows",
            train_x.rows(),
            train_y.rows()
        )));
    }
    if settings.batch_size == 0 {
        return Err(RelclassError::Config("batch size must be greater than zero".into()));
    }

    let rows = train_x.rows();
    let split_at = validation_split_at(rows, settings.validation_split);
    if split_at == 0 {
        return Err(RelclassError::Config(format!(
            "validation split {} leaves no training rows out of {rows}",
            settings.validation_split
        )));
    }

    let device = Device::Cpu;
    let xs = train_x.to_tensor(&device)?;
    let ys = train_y.to_tensor(&device)?;
    let (fit_xs, fit_ys) = (xs.narrow(0, 0, split_at)?, ys.narrow(0, 0, split_at)?);
    let validation = if split_at < rows {
        let n = rows - split_at;
        Some((xs.narrow(0, split_at, n)?, ys.narrow(0, split_at, n)?))
    } else {
        None
    };

    let mut optimizer = RmsProp::new(
        model.varmap().all_vars(),
        ParamsRmsProp {
            lr: settings.learning_rate,
            ..Default::default()
        },
    )?;
    let mut masks = DropoutMasks::new(settings.seed.wrapping_add(1));
    let mut indices: Vec<u32> = (0..split_at as u32).collect();
    let mut history = Vec::with_capacity(settings.epochs);

    info!(
        train = split_at,
        validation = rows - split_at,
        epochs = settings.epochs,
        batch = settings.batch_size,
        "training"
    );

    for epoch in 0..settings.epochs {
        shuffle(&mut indices, settings.seed.wrapping_add(epoch as u64));

        let mut loss_sum = 0.0;
        let mut gold = Vec::with_capacity(split_at);
        let mut predicted = Vec::with_capacity(split_at);

        for (step, chunk) in indices.chunks(settings.batch_size).enumerate() {
            let idx = Tensor::from_slice(chunk, chunk.len(), &device)?;
            let batch_x = fit_xs.index_select(&idx, 0)?;
            let batch_y = fit_ys.index_select(&idx, 0)?;

            let logits = model.forward_t(&batch_x, Some(&mut masks))?;
            let loss = categorical_crossentropy(&logits, &batch_y)?;
            optimizer.backward_step(&loss)?;

            let loss_val = loss.to_scalar::<f32>()? as f64;
            loss_sum += loss_val * chunk.len() as f64;
            predicted.extend(logits.argmax(D::Minus1)?.to_vec1::<u32>()?);
            gold.extend(batch_y.argmax(D::Minus1)?.to_vec1::<u32>()?);
            debug!(epoch = epoch + 1, step, loss = loss_val, "batch");
        }

        let (val_loss, val_accuracy) = match &validation {
            Some((vx, vy)) => {
                let (l, a) = evaluate_loss(model, vx, vy, settings.batch_size)?;
                (Some(l), Some(a))
            }
            None => (None, None),
        };

        let metrics = EpochMetrics {
            epoch: epoch + 1,
            loss: loss_sum / split_at as f64,
            accuracy: accuracy(&gold, &predicted),
            val_loss,
            val_accuracy,
        };
        writeln!(progress, "Epoch {}/{} - {}", epoch + 1, settings.epochs, metrics)?;
        history.push(metrics);
    }

    Ok(history)
}

/// Mean loss and accuracy of `model` on held-out rows, without dropout.
fn evaluate_loss(model: &Model, xs: &Tensor, ys: &Tensor, batch_size: usize) -> Result<(f64, f64)> {
    let rows = xs.dim(0)?;
    let mut loss_sum = 0.0;
    let mut gold = Vec::with_capacity(rows);
    let mut predicted = Vec::with_capacity(rows);

    let mut start = 0;
    while start < rows {
        let len = batch_size.min(rows - start);
        let batch_x = xs.narrow(0, start, len)?;
        let batch_y = ys.narrow(0, start, len)?;

        let logits = model.forward_t(&batch_x, None)?;
        let loss = categorical_crossentropy(&logits, &batch_y)?.to_scalar::<f32>()? as f64;
        loss_sum += loss * len as f64;
        predicted.extend(logits.argmax(D::Minus1)?.to_vec1::<u32>()?);
        gold.extend(batch_y.argmax(D::Minus1)?.to_vec1::<u32>()?);
        start += len;
    }

    Ok((loss_sum / rows as f64, accuracy(&gold, &predicted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use crate::model::ModelShape;
    use relclass_core::config::{CnnParams, CommonParams, LstmParams};
    use relclass_core::padding::{one_hot, pad_sequences};

    fn common(epochs: usize) -> CommonParams {
        CommonParams {
            batch: 2,
            epochs,
            embdims: 8,
            dropout: 0.0,
            learnrt: 0.01,
            seed: 3,
        }
    }

    fn data() -> (PaddedSequences, OneHotLabels) {
        // label 0 sentences use ids 1..=3, label 1 sentences use ids 4..=6
        let seqs = vec![
            vec![1, 2, 3],
            vec![4, 5, 6],
            vec![2, 3, 1],
            vec![5, 6, 4],
            vec![3, 1],
            vec![6, 4],
        ];
        let labels = vec![0, 1, 0, 1, 0, 1];
        (pad_sequences(&seqs, 3), one_hot(&labels, 2).unwrap())
    }

    const SHAPE: ModelShape = ModelShape {
        vocab_size: 7,
        max_len: 3,
        classes: 2,
    };

    #[test]
    fn test_settings_keep_validation_asymmetry() {
        let lstm = ModelParams::Lstm(LstmParams {
            common: common(1),
            units: 4,
            udropout: 0.0,
            wdropout: 0.0,
        });
        let cnn = ModelParams::Cnn(CnnParams {
            common: common(1),
            filters: 4,
            filtlen: 2,
            hidden: 4,
        });
        assert_eq!(TrainSettings::for_params(&lstm).validation_split, 0.1);
        assert_eq!(TrainSettings::for_params(&cnn).validation_split, 0.0);
    }

    #[test]
    fn test_validation_split_at() {
        assert_eq!(validation_split_at(4, 0.1), 3);
        assert_eq!(validation_split_at(100, 0.1), 90);
        assert_eq!(validation_split_at(7, 0.0), 7);
    }

    #[test]
    fn test_crossentropy_matches_hand_computation() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[0f32, 0.0], [2.0, 0.0]], &device).unwrap();
        let targets = Tensor::new(&[[1f32, 0.0], [0.0, 1.0]], &device).unwrap();
        let loss = categorical_crossentropy(&logits, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        let expected = (2f32.ln() + (1.0 + 2f32.exp()).ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        shuffle(&mut a, 9);
        shuffle(&mut b, 9);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_cnn_loss_decreases() {
        let params = ModelParams::Cnn(CnnParams {
            common: common(30),
            filters: 8,
            filtlen: 2,
            hidden: 8,
        });
        let model = Model::build(&params, SHAPE, None, &Device::Cpu).unwrap();
        let (xs, ys) = data();

        let settings = TrainSettings::for_params(&params);
        let history = fit(&model, &xs, &ys, &settings, &mut io::sink()).unwrap();
        assert_eq!(history.len(), 30);
        assert!(history.iter().all(|m| m.val_loss.is_none()));
        assert!(history.last().unwrap().loss < history[0].loss);
    }

    #[test]
    fn test_lstm_reports_validation() {
        let params = ModelParams::Lstm(LstmParams {
            common: common(2),
            units: 4,
            udropout: 0.1,
            wdropout: 0.1,
        });
        let model = Model::build(&params, SHAPE, None, &Device::Cpu).unwrap();
        let (xs, ys) = data();

        let settings = TrainSettings::for_params(&params);
        let history = fit(&model, &xs, &ys, &settings, &mut io::sink()).unwrap();
        assert_eq!(history.len(), 2);
        for m in &history {
            assert!(m.loss.is_finite());
            assert!(m.val_loss.is_some());
            assert!((0.0..=1.0).contains(&m.val_accuracy.unwrap()));
        }
    }

    #[test]
    fn test_mismatched_rows_rejected() {
        let params = ModelParams::Cnn(CnnParams {
            common: common(1),
            filters: 2,
            filtlen: 2,
            hidden: 2,
        });
        let model = Model::build(&params, SHAPE, None, &Device::Cpu).unwrap();
        let (xs, _) = data();
        let ys = one_hot(&[0, 1], 2).unwrap();
        let settings = TrainSettings::for_params(&params);
        let err = fit(&model, &xs, &ys, &settings, &mut io::sink()).unwrap_err();
        assert!(matches!(err, RelclassError::Shape(_)));
    }

    #[test]
    fn test_epoch_lines_go_to_progress_writer() {
        let params = ModelParams::Cnn(CnnParams {
            common: common(3),
            filters: 2,
            filtlen: 2,
            hidden: 2,
        });
        let model = Model::build(&params, SHAPE, None, &Device::Cpu).unwrap();
        let (xs, ys) = data();

        let mut progress = Vec::new();
        let settings = TrainSettings::for_params(&params);
        fit(&model, &xs, &ys, &settings, &mut progress).unwrap();
        let text = String::from_utf8(progress).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Epoch 1/3 - loss: "), "{text}");
        assert!(lines[2].starts_with("Epoch 3/3 - loss: "), "{text}");
    }
}
