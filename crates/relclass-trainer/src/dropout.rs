//! Seeded dropout masks.
//!
//! candle's CPU device cannot be seeded, so masks are drawn from an
//! `oorandom` generator owned by the training loop and passed into every
//! training-mode forward pass.

use candle_core::{Device, Result, Tensor};
use oorandom::Rand32;

/// Source of inverted-dropout masks.
pub struct DropoutMasks {
    rng: Rand32,
}

impl DropoutMasks {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rand32::new(seed),
        }
    }

    /// Mask of `shape` holding `0` for dropped units and `1 / (1 - rate)` for kept ones.
    pub fn mask(&mut self, shape: &[usize], rate: f32, device: &Device) -> Result<Tensor> {
        let n: usize = shape.iter().product();
        let keep = 1.0 / (1.0 - rate);
        let values: Vec<f32> = (0..n)
            .map(|_| if self.rng.rand_float() < rate { 0.0 } else { keep })
            .collect();
        Tensor::from_vec(values, shape, device)
    }

    /// Like [`DropoutMasks::mask`], but `None` when `rate` is zero.
    pub fn maybe_mask(
        &mut self,
        shape: &[usize],
        rate: f32,
        device: &Device,
    ) -> Result<Option<Tensor>> {
        if rate <= 0.0 {
            return Ok(None);
        }
        self.mask(shape, rate, device).map(Some)
    }

    /// Multiply `xs` by a fresh mask of `mask_shape`, broadcast over the remaining dims.
    ///
    /// A zero rate returns `xs` untouched.
    pub fn apply(&mut self, xs: &Tensor, mask_shape: &[usize], rate: f32) -> Result<Tensor> {
        if rate <= 0.0 {
            return Ok(xs.clone());
        }
        let mask = self.mask(mask_shape, rate, xs.device())?;
        xs.broadcast_mul(&mask)
    }
}
