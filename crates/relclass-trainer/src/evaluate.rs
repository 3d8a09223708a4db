//! Class distributions for unseen examples.

use candle_core::{D, Device};
use relclass_core::Result;
use relclass_core::padding::PaddedSequences;

use crate::model::Model;

/// Row-major `rows × classes` softmax probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    rows: usize,
    classes: usize,
    probs: Vec<f32>,
}

impl Distribution {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.probs[i * self.classes..(i + 1) * self.classes]
    }

    /// Most probable class of every row (lowest id wins ties).
    pub fn argmax(&self) -> Vec<u32> {
        (0..self.rows)
            .map(|i| {
                let mut best = 0;
                for (c, &p) in self.row(i).iter().enumerate() {
                    if p > self.row(i)[best] {
                        best = c;
                    }
                }
                best as u32
            })
            .collect()
    }
}

/// Class probabilities for every row of `xs`, computed `batch_size` rows at a time.
pub fn predict(model: &Model, xs: &PaddedSequences, batch_size: usize) -> Result<Distribution> {
    let device = Device::Cpu;
    let all = xs.to_tensor(&device)?;
    let rows = xs.rows();
    let batch_size = batch_size.max(1);

    let mut probs = Vec::new();
    let mut classes = 0;
    let mut start = 0;
    while start < rows {
        let len = batch_size.min(rows - start);
        let logits = model.forward_t(&all.narrow(0, start, len)?, None)?;
        let batch = candle_nn::ops::softmax(&logits, D::Minus1)?;
        classes = batch.dim(1)?;
        probs.extend(batch.flatten_all()?.to_vec1::<f32>()?);
        start += len;
    }

    Ok(Distribution {
        rows,
        classes,
        probs,
    })
}
