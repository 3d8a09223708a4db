//! # Experiment Configuration
//!
//! Reads the INI settings file shared by the `lstm` and `cnn` programs into
//! typed, validated hyperparameters. Lookups by key happen once here; every
//! later stage works with named fields.
//!
//! ```ini
//! [data]
//! train = relations/train.txt
//! test = relations/test.txt
//!
//! [lstm]
//! batch = 32
//! epochs = 3
//! embdims = 300
//! units = 128
//! dropout = 0.25
//! udropout = 0.25
//! wdropout = 0.25
//! learnrt = 0.001
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use tracing::warn;

use crate::error::{RelclassError, Result};

/// Environment variable holding the base directory of all data files.
pub const DATA_ROOT_VAR: &str = "DATA_ROOT";

/// Seed used when the config does not name one.
pub const DEFAULT_SEED: u64 = 1337;

/// Where learned CNN embeddings are written when `[data] weights` is absent.
pub const DEFAULT_WEIGHTS_FILE: &str = "weights.txt";

/// Which classifier a config file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Lstm,
    Cnn,
}

impl ModelKind {
    /// INI section holding this model's hyperparameters.
    pub fn section(self) -> &'static str {
        match self {
            ModelKind::Lstm => "lstm",
            ModelKind::Cnn => "cnn",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Data file locations from the `[data]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub train: PathBuf,
    pub test: PathBuf,
    /// Pre-trained word vectors (CNN only).
    pub embed: Option<PathBuf>,
    /// Output file for learned embeddings (CNN only). Not prefixed with the data root.
    pub weights: PathBuf,
}

impl DataPaths {
    /// Prefix the input paths with `root`. Absolute paths are left as they are.
    pub fn resolve(&self, root: &Path) -> DataPaths {
        DataPaths {
            train: root.join(&self.train),
            test: root.join(&self.test),
            embed: self.embed.as_ref().map(|p| root.join(p)),
            weights: self.weights.clone(),
        }
    }
}

/// Read the data root from `DATA_ROOT`.
pub fn data_root_from_env() -> Result<PathBuf> {
    data_root_from(std::env::var_os(DATA_ROOT_VAR))
}

/// Data root from a raw `DATA_ROOT` value; unset and empty are both errors.
pub fn data_root_from(value: Option<OsString>) -> Result<PathBuf> {
    match value {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => Err(RelclassError::Environment(DATA_ROOT_VAR)),
    }
}

/// Hyperparameters common to both classifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonParams {
    pub batch: usize,
    pub epochs: usize,
    pub embdims: usize,
    pub dropout: f32,
    pub learnrt: f64,
    pub seed: u64,
}

impl CommonParams {
    fn from_section(section: &Section<'_>) -> Result<Self> {
        Ok(Self {
            batch: section.require("batch")?,
            epochs: section.require("epochs")?,
            embdims: section.require("embdims")?,
            dropout: section.require("dropout")?,
            learnrt: section.require("learnrt")?,
            seed: section.optional("seed")?.unwrap_or(DEFAULT_SEED),
        })
    }

    /// Reject values no model can be built or trained with.
    pub fn validate(&self) -> Result<()> {
        positive("batch", self.batch)?;
        positive("epochs", self.epochs)?;
        positive("embdims", self.embdims)?;
        dropout_rate("dropout", self.dropout)?;
        if !self.learnrt.is_finite() || self.learnrt <= 0.0 {
            return Err(RelclassError::Config(format!(
                "learnrt must be a positive number, got {}",
                self.learnrt
            )));
        }
        Ok(())
    }
}

/// `[lstm]` hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmParams {
    pub common: CommonParams,
    /// LSTM hidden units.
    pub units: usize,
    /// Recurrent (hidden-to-hidden) dropout.
    pub udropout: f32,
    /// Input (embedding-to-hidden) dropout.
    pub wdropout: f32,
}

impl LstmParams {
    pub fn validate(&self) -> Result<()> {
        self.common.validate()?;
        positive("units", self.units)?;
        dropout_rate("udropout", self.udropout)?;
        dropout_rate("wdropout", self.wdropout)
    }
}

/// `[cnn]` hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CnnParams {
    pub common: CommonParams,
    /// Number of convolution filters.
    pub filters: usize,
    /// Convolution kernel length.
    pub filtlen: usize,
    /// Width of the dense hidden layer.
    pub hidden: usize,
}

impl CnnParams {
    pub fn validate(&self) -> Result<()> {
        self.common.validate()?;
        positive("filters", self.filters)?;
        positive("filtlen", self.filtlen)?;
        positive("hidden", self.hidden)
    }
}

/// Hyperparameters for one of the two classifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParams {
    Lstm(LstmParams),
    Cnn(CnnParams),
}

impl ModelParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParams::Lstm(_) => ModelKind::Lstm,
            ModelParams::Cnn(_) => ModelKind::Cnn,
        }
    }

    pub fn common(&self) -> &CommonParams {
        match self {
            ModelParams::Lstm(p) => &p.common,
            ModelParams::Cnn(p) => &p.common,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ModelParams::Lstm(p) => p.validate(),
            ModelParams::Cnn(p) => p.validate(),
        }
    }

    /// Hyperparameters as `(key, value)` pairs, in the order they are echoed.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        let c = self.common();
        let mut out = vec![
            ("batch", c.batch.to_string()),
            ("epochs", c.epochs.to_string()),
            ("embdims", c.embdims.to_string()),
        ];
        match self {
            ModelParams::Lstm(p) => out.extend([
                ("units", p.units.to_string()),
                ("dropout", c.dropout.to_string()),
                ("udropout", p.udropout.to_string()),
                ("wdropout", p.wdropout.to_string()),
            ]),
            ModelParams::Cnn(p) => out.extend([
                ("filters", p.filters.to_string()),
                ("filtlen", p.filtlen.to_string()),
                ("hidden", p.hidden.to_string()),
                ("dropout", c.dropout.to_string()),
            ]),
        }
        out.push(("learnrt", c.learnrt.to_string()));
        out
    }
}

/// A fully parsed and validated settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub data: DataPaths,
    pub model: ModelParams,
}

impl ExperimentConfig {
    /// Load and validate the settings file at `path` for the given model.
    pub fn load<P: AsRef<Path>>(path: P, kind: ModelKind) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text, kind)
    }

    /// Parse settings from INI text.
    pub fn parse(text: &str, kind: ModelKind) -> Result<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| RelclassError::Config(format!("invalid INI syntax: {e}")))?;

        let data = Section::find(&ini, "data")?;
        let mut paths = DataPaths {
            train: data.require("train")?,
            test: data.require("test")?,
            embed: data.optional("embed")?,
            weights: data
                .optional("weights")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS_FILE)),
        };

        let section = Section::find(&ini, kind.section())?;
        let common = CommonParams::from_section(&section)?;
        let model = match kind {
            ModelKind::Lstm => {
                if paths.embed.take().is_some() {
                    warn!("[data] embed is ignored by the lstm model");
                }
                ModelParams::Lstm(LstmParams {
                    common,
                    units: section.require("units")?,
                    udropout: section.require("udropout")?,
                    wdropout: section.require("wdropout")?,
                })
            }
            ModelKind::Cnn => ModelParams::Cnn(CnnParams {
                common,
                filters: section.require("filters")?,
                filtlen: section.require("filtlen")?,
                hidden: section.require("hidden")?,
            }),
        };
        model.validate()?;

        Ok(Self { data: paths, model })
    }
}

/// Typed access to one INI section.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn find(ini: &'a Ini, name: &'static str) -> Result<Self> {
        let props = ini
            .section(Some(name))
            .ok_or_else(|| RelclassError::Config(format!("missing section [{name}]")))?;
        Ok(Self { name, props })
    }

    fn require<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional(key)?.ok_or_else(|| {
            RelclassError::Config(format!("missing key {}.{key}", self.name))
        })
    }

    fn optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.props.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                RelclassError::Config(format!("{}.{key} = {raw:?}: {e}", self.name))
            }),
        }
    }
}

fn positive(key: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(RelclassError::Config(format!("{key} must be greater than zero")));
    }
    Ok(())
}

fn dropout_rate(key: &str, value: f32) -> Result<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(RelclassError::Config(format!(
            "{key} must be in [0, 1), got {value}"
        )));
    }
    Ok(())
}
