//! Seeded parameter initialization.
//!
//! Layers are first created through a [`VarMap`], which fills them from
//! candle's unseeded generator. [`reseed`] then overwrites every variable in
//! name order from an `oorandom` generator so a run is reproducible from its
//! config seed alone.

use candle_core::{Result, Tensor};
use candle_nn::VarMap;
use oorandom::Rand32;
use tracing::debug;

/// Half-width of the uniform range used for embedding tables.
pub const EMBEDDING_INIT_RANGE: f32 = 0.05;

/// How one variable is filled.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scheme {
    Zeros,
    Uniform(f32),
    /// Orthonormal columns, for recurrent kernels.
    Orthogonal,
    /// Zeros with the LSTM forget-gate slice set to one.
    ForgetBias,
}

fn scheme_for(name: &str, dims: &[usize]) -> Scheme {
    let leaf = name.rsplit('.').next().unwrap_or(name);
    // candle packs LSTM gates as (input, forget, cell, output); only the
    // input-side bias carries the forget offset so the summed bias is 1.
    if leaf.starts_with("bias_ih") {
        return Scheme::ForgetBias;
    }
    if leaf.starts_with("bias") {
        return Scheme::Zeros;
    }
    if leaf.starts_with("weight_hh") {
        return Scheme::Orthogonal;
    }
    if name.starts_with("embedding") {
        return Scheme::Uniform(EMBEDDING_INIT_RANGE);
    }
    // Glorot uniform. Linear weights are (out, in), conv weights (out, in, k).
    let receptive: usize = dims.iter().skip(2).product();
    let fan_out = dims.first().copied().unwrap_or(1) * receptive;
    let fan_in = dims.get(1).copied().unwrap_or(1) * receptive;
    Scheme::Uniform((6.0 / (fan_in + fan_out).max(1) as f32).sqrt())
}

fn fill(scheme: Scheme, dims: &[usize], rng: &mut Rand32) -> Vec<f32> {
    let n: usize = dims.iter().product();
    match scheme {
        Scheme::Zeros => vec![0.0; n],
        Scheme::Uniform(limit) => (0..n)
            .map(|_| (rng.rand_float() * 2.0 - 1.0) * limit)
            .collect(),
        Scheme::ForgetBias => {
            let units = n / 4;
            let mut values = vec![0.0; n];
            values[units..2 * units].fill(1.0);
            values
        }
        Scheme::Orthogonal => {
            let rows = dims.first().copied().unwrap_or(n);
            orthogonal(rows, n / rows.max(1), rng)
        }
    }
}

/// Standard normal sample (Box-Muller).
fn normal(rng: &mut Rand32) -> f32 {
    let u1 = 1.0 - rng.rand_float();
    let u2 = rng.rand_float();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Row-major `rows × cols` matrix whose shorter side is orthonormal.
///
/// Gaussian draws are orthonormalized with modified Gram-Schmidt.
fn orthogonal(rows: usize, cols: usize, rng: &mut Rand32) -> Vec<f32> {
    // Orthonormalize `count` vectors of length `len`, then lay them out.
    let (count, len) = if rows >= cols { (cols, rows) } else { (rows, cols) };
    let mut basis: Vec<Vec<f32>> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut v: Vec<f32> = (0..len).map(|_| normal(rng)).collect();
        for b in &basis {
            let dot: f32 = v.iter().zip(b).map(|(x, y)| x * y).sum();
            v.iter_mut().zip(b).for_each(|(x, y)| *x -= dot * y);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-12 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        basis.push(v);
    }

    let mut out = vec![0.0; rows * cols];
    for (k, v) in basis.iter().enumerate() {
        for (i, &x) in v.iter().enumerate() {
            if rows >= cols {
                out[i * cols + k] = x;
            } else {
                out[k * cols + i] = x;
            }
        }
    }
    out
}

/// Overwrite every variable in `varmap` with seeded values.
pub fn reseed(varmap: &VarMap, seed: u64) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".into()))?;

    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    let mut rng = Rand32::new(seed);
    for name in names {
        let var = &data[name];
        let dims = var.dims().to_vec();
        let scheme = scheme_for(name, &dims);
        let values = fill(scheme, &dims, &mut rng);
        debug!(name = %name, ?dims, ?scheme, "initialized variable");

        let tensor = Tensor::from_vec(values, dims.as_slice(), var.device())?;
        var.set(&tensor.to_dtype(var.dtype())?)?;
    }
    Ok(())
}

/// Replace the contents of the variable called `name`.
pub fn assign(varmap: &VarMap, name: &str, value: &Tensor) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable map lock poisoned".into()))?;
    let var = data
        .get(name)
        .ok_or_else(|| candle_core::Error::Msg(format!("no variable named {name}")))?;
    var.set(value)
}
