//! F1 scores over predicted and gold label ids.
//!
//! Zero-division cases (a label never predicted, or never present) score 0.0.

use crate::dataset::LabelMap;
use crate::error::{RelclassError, Result};

/// Label designating the forward relation in relation-extraction datasets.
pub const CONTAINS: &str = "contains";
/// Label designating the inverse relation.
pub const CONTAINS_INVERSE: &str = "contains-1";

/// Which labels the aggregate micro-F1 pools over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicroF1Scope {
    /// Every label in the label map.
    AllLabels(Vec<u32>),
    /// Only the `contains` / `contains-1` pair.
    RelationPair(u32, u32),
}

impl MicroF1Scope {
    /// Pick the scope once: the relation pair when both labels exist, else all labels.
    pub fn from_label_map(labels: &LabelMap) -> Self {
        match (labels.get(CONTAINS), labels.get(CONTAINS_INVERSE)) {
            (Some(a), Some(b)) => MicroF1Scope::RelationPair(a, b),
            _ => MicroF1Scope::AllLabels(labels.ids()),
        }
    }

    pub fn label_ids(&self) -> Vec<u32> {
        match self {
            MicroF1Scope::AllLabels(ids) => ids.clone(),
            MicroF1Scope::RelationPair(a, b) => vec![*a, *b],
        }
    }

    /// Caption used when reporting the aggregate score.
    pub fn caption(&self) -> &'static str {
        match self {
            MicroF1Scope::AllLabels(_) => "all",
            MicroF1Scope::RelationPair(..) => "contains average",
        }
    }

    pub fn score(&self, gold: &[u32], predicted: &[u32]) -> Result<f64> {
        f1_micro_subset(gold, predicted, &self.label_ids())
    }
}

/// Per-label and aggregate F1 of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Indexed by label id.
    pub per_class: Vec<f64>,
    pub scope: MicroF1Scope,
    pub aggregate: f64,
}

impl Evaluation {
    pub fn compute(gold: &[u32], predicted: &[u32], labels: &LabelMap) -> Result<Self> {
        let scope = MicroF1Scope::from_label_map(labels);
        Ok(Self {
            per_class: f1_per_class(gold, predicted, labels.len())?,
            aggregate: scope.score(gold, predicted)?,
            scope,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_count: usize,
}

impl Counts {
    fn f1(self) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_count;
        if denom == 0 {
            0.0
        } else {
            2.0 * self.tp as f64 / denom as f64
        }
    }
}

fn counts_for(gold: &[u32], predicted: &[u32], label: u32) -> Counts {
    let mut c = Counts::default();
    for (&g, &p) in gold.iter().zip(predicted) {
        match (g == label, p == label) {
            (true, true) => c.tp += 1,
            (false, true) => c.fp += 1,
            (true, false) => c.fn_count += 1,
            (false, false) => {}
        }
    }
    c
}

/// F1 of each label id in `0..classes`; index `i` holds the score of label `i`.
pub fn f1_per_class(gold: &[u32], predicted: &[u32], classes: usize) -> Result<Vec<f64>> {
    check_lengths(gold, predicted)?;
    Ok((0..classes as u32)
        .map(|label| counts_for(gold, predicted, label).f1())
        .collect())
}

/// Micro-averaged F1 pooling TP/FP/FN over `label_ids` only.
pub fn f1_micro_subset(gold: &[u32], predicted: &[u32], label_ids: &[u32]) -> Result<f64> {
    check_lengths(gold, predicted)?;
    let pooled = label_ids
        .iter()
        .map(|&label| counts_for(gold, predicted, label))
        .fold(Counts::default(), |acc, c| Counts {
            tp: acc.tp + c.tp,
            fp: acc.fp + c.fp,
            fn_count: acc.fn_count + c.fn_count,
        });
    Ok(pooled.f1())
}

fn check_lengths(gold: &[u32], predicted: &[u32]) -> Result<()> {
    if gold.len() != predicted.len() {
        return Err(RelclassError::Shape(format!(
            "{} gold labels but {} predictions",
            gold.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Fraction of positions where `predicted` equals `gold`.
pub fn accuracy(gold: &[u32], predicted: &[u32]) -> f64 {
    if gold.is_empty() {
        return 0.0;
    }
    let correct = gold.iter().zip(predicted).filter(|(g, p)| g == p).count();
    correct as f64 / gold.len() as f64
}
