//! LSTM and CNN text classifiers.
//!
//! Both stacks start from a trainable embedding table and end in a dense
//! layer producing one logit per class. Softmax is applied by the loss and
//! by [`crate::evaluate::predict`], not here.

use candle_core::{D, DType, Device, IndexOp, Tensor};
use candle_nn::rnn::{LSTM, LSTMConfig, LSTMState, RNN};
use candle_nn::{Conv1d, Conv1dConfig, Embedding, Linear, Module, VarBuilder, VarMap};
use relclass_core::config::{CnnParams, LstmParams, ModelKind, ModelParams};
use relclass_core::vectors::EmbeddingMatrix;
use relclass_core::{RelclassError, Result};
use tracing::info;

use crate::dropout::DropoutMasks;
use crate::init;

/// Variable prefix of the embedding table.
pub const EMBEDDING: &str = "embedding";

/// Dimensions fixed by the data rather than the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    /// Rows of the embedding table, including the reserved id.
    pub vocab_size: usize,
    /// Padded sequence width.
    pub max_len: usize,
    pub classes: usize,
}

/// Embedding → LSTM → Dense(classes).
pub struct LstmClassifier {
    embedding: Embedding,
    lstm: LSTM,
    output: Linear,
    units: usize,
    dropout: f32,
    wdropout: f32,
    udropout: f32,
}

impl LstmClassifier {
    pub fn new(
        params: &LstmParams,
        shape: &ModelShape,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let embdims = params.common.embdims;
        let embedding = candle_nn::embedding(shape.vocab_size, embdims, vb.pp(EMBEDDING))?;
        let lstm = candle_nn::lstm(embdims, params.units, LSTMConfig::default(), vb.pp("lstm"))?;
        let output = candle_nn::linear(params.units, shape.classes, vb.pp("output"))?;

        Ok(Self {
            embedding,
            lstm,
            output,
            units: params.units,
            dropout: params.common.dropout,
            wdropout: params.wdropout,
            udropout: params.udropout,
        })
    }

    /// `xs`: `(batch, steps)` ids. Returns `(batch, classes)` logits.
    ///
    /// With `masks`, whole words are dropped from the embedded input and one
    /// input mask and one recurrent mask are drawn per sequence and reused at
    /// every timestep.
    pub fn forward_t(
        &self,
        xs: &Tensor,
        mut masks: Option<&mut DropoutMasks>,
    ) -> candle_core::Result<Tensor> {
        let embedded = self.embedding.forward(xs)?;
        let (batch, steps, dims) = embedded.dims3()?;

        let (embedded, input_mask, recurrent_mask) = match masks.as_deref_mut() {
            Some(m) => {
                let device = embedded.device().clone();
                (
                    m.apply(&embedded, &[batch, steps, 1], self.dropout)?,
                    m.maybe_mask(&[batch, dims], self.wdropout, &device)?,
                    m.maybe_mask(&[batch, self.units], self.udropout, &device)?,
                )
            }
            None => (embedded, None, None),
        };

        let mut state = self.lstm.zero_state(batch)?;
        for step in 0..steps {
            let mut x = embedded.i((.., step, ..))?.contiguous()?;
            if let Some(mask) = &input_mask {
                x = x.mul(mask)?;
            }
            let h = match &recurrent_mask {
                Some(mask) => state.h().mul(mask)?,
                None => state.h().clone(),
            };
            state = self.lstm.step(&x, &LSTMState::new(h, state.c().clone()))?;
        }

        self.output.forward(state.h())
    }
}

/// Embedding → Conv1D + relu → global max pool → Dropout → Dense + relu →
/// Dropout → Dense(classes).
pub struct CnnClassifier {
    embedding: Embedding,
    conv: Conv1d,
    hidden: Linear,
    output: Linear,
    dropout: f32,
}

impl CnnClassifier {
    pub fn new(
        params: &CnnParams,
        shape: &ModelShape,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let embdims = params.common.embdims;
        let embedding = candle_nn::embedding(shape.vocab_size, embdims, vb.pp(EMBEDDING))?;
        let conv = candle_nn::conv1d(
            embdims,
            params.filters,
            params.filtlen,
            Conv1dConfig::default(),
            vb.pp("conv"),
        )?;
        let hidden = candle_nn::linear(params.filters, params.hidden, vb.pp("hidden"))?;
        let output = candle_nn::linear(params.hidden, shape.classes, vb.pp("output"))?;

        Ok(Self {
            embedding,
            conv,
            hidden,
            output,
            dropout: params.common.dropout,
        })
    }

    /// `xs`: `(batch, steps)` ids. Returns `(batch, classes)` logits.
    pub fn forward_t(
        &self,
        xs: &Tensor,
        mut masks: Option<&mut DropoutMasks>,
    ) -> candle_core::Result<Tensor> {
        // conv1d wants (batch, channels, length)
        let embedded = self.embedding.forward(xs)?.transpose(1, 2)?.contiguous()?;
        let features = self.conv.forward(&embedded)?.relu()?.max(D::Minus1)?;
        let (batch, filters) = features.dims2()?;

        let features = match masks.as_deref_mut() {
            Some(m) => m.apply(&features, &[batch, filters], self.dropout)?,
            None => features,
        };
        let hidden = self.hidden.forward(&features)?.relu()?;
        let width = hidden.dim(1)?;
        let hidden = match masks.as_deref_mut() {
            Some(m) => m.apply(&hidden, &[batch, width], self.dropout)?,
            None => hidden,
        };

        self.output.forward(&hidden)
    }
}

/// One of the two classifier stacks.
pub enum Network {
    Lstm(LstmClassifier),
    Cnn(CnnClassifier),
}

/// A classifier together with the variables it trains.
pub struct Model {
    varmap: VarMap,
    network: Network,
}

impl Model {
    /// Assemble the layer stack described by `params`. Performs no training.
    ///
    /// Weights are drawn from the config seed; `pretrained`, when given,
    /// replaces the embedding table afterwards.
    pub fn build(
        params: &ModelParams,
        shape: ModelShape,
        pretrained: Option<&EmbeddingMatrix>,
        device: &Device,
    ) -> Result<Self> {
        params.validate()?;
        if shape.vocab_size == 0 || shape.classes == 0 || shape.max_len == 0 {
            return Err(RelclassError::Config(format!(
                "cannot build a model for {shape:?}"
            )));
        }

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let network = match params {
            ModelParams::Lstm(p) => Network::Lstm(LstmClassifier::new(p, &shape, vb)?),
            ModelParams::Cnn(p) => {
                if p.filtlen > shape.max_len {
                    return Err(RelclassError::Config(format!(
                        "filtlen {} exceeds the longest training sequence ({})",
                        p.filtlen, shape.max_len
                    )));
                }
                Network::Cnn(CnnClassifier::new(p, &shape, vb)?)
            }
        };

        init::reseed(&varmap, params.common().seed)?;

        if let Some(matrix) = pretrained {
            let expected = (shape.vocab_size, params.common().embdims);
            if (matrix.rows(), matrix.dim()) != expected {
                return Err(RelclassError::Shape(format!(
                    "pre-trained embeddings are {}x{}, model expects {}x{}",
                    matrix.rows(),
                    matrix.dim(),
                    expected.0,
                    expected.1
                )));
            }
            init::assign(&varmap, &format!("{EMBEDDING}.weight"), &matrix.to_tensor(device)?)?;
            info!("embedding layer seeded with pre-trained vectors");
        }

        let parameters: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
        info!(kind = %params.kind(), ?shape, parameters, "built model");

        Ok(Self { varmap, network })
    }

    pub fn kind(&self) -> ModelKind {
        match self.network {
            Network::Lstm(_) => ModelKind::Lstm,
            Network::Cnn(_) => ModelKind::Cnn,
        }
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Logits for `xs`. Dropout is active only when `masks` is given.
    pub fn forward_t(
        &self,
        xs: &Tensor,
        masks: Option<&mut DropoutMasks>,
    ) -> candle_core::Result<Tensor> {
        match &self.network {
            Network::Lstm(net) => net.forward_t(xs, masks),
            Network::Cnn(net) => net.forward_t(xs, masks),
        }
    }

    fn embedding(&self) -> &Embedding {
        match &self.network {
            Network::Lstm(net) => &net.embedding,
            Network::Cnn(net) => &net.embedding,
        }
    }

    /// Current contents of the embedding table.
    pub fn embedding_weights(&self) -> Result<EmbeddingMatrix> {
        EmbeddingMatrix::from_tensor(self.embedding().embeddings())
    }
}
