//! RMSProp for candle variables.
//!
//! `candle-nn` ships SGD and AdamW only. This follows the same
//! [`Optimizer`] contract so `backward_step` drives it like any other.

use candle_core::backprop::GradStore;
use candle_core::{Result, Var};
use candle_nn::Optimizer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsRmsProp {
    pub lr: f64,
    /// Decay of the running average of squared gradients.
    pub rho: f64,
    pub eps: f64,
}

impl Default for ParamsRmsProp {
    fn default() -> Self {
        Self {
            lr: 0.001,
            rho: 0.9,
            eps: 1e-8,
        }
    }
}

struct VarRmsProp {
    var: Var,
    mean_square: Var,
}

/// `ms = rho * ms + (1 - rho) * g^2; theta -= lr * g / (sqrt(ms) + eps)`
pub struct RmsProp {
    vars: Vec<VarRmsProp>,
    params: ParamsRmsProp,
}

impl Optimizer for RmsProp {
    type Config = ParamsRmsProp;

    fn new(vars: Vec<Var>, params: ParamsRmsProp) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let mean_square = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(VarRmsProp { var, mean_square })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let ParamsRmsProp { lr, rho, eps } = self.params;
        for slot in self.vars.iter() {
            let Some(grad) = grads.get(&slot.var) else {
                continue;
            };
            let mean_square = slot
                .mean_square
                .affine(rho, 0.0)?
                .add(&grad.sqr()?.affine(1.0 - rho, 0.0)?)?;
            let delta = grad
                .div(&mean_square.sqrt()?.affine(1.0, eps)?)?
                .affine(lr, 0.0)?;
            slot.var.set(&slot.var.sub(&delta)?)?;
            slot.mean_square.set(&mean_square)?;
        }
        Ok(())
    }
}
