//! Human-readable experiment output.

use std::io::{self, Write};

use crate::config::{DataPaths, ModelParams};
use crate::dataset::LabelMap;
use crate::metrics::{Evaluation, MicroF1Scope};

/// Writes configuration, tensor shapes and scores as plain text lines.
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// The underlying writer, for progress lines interleaved with the report.
    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    /// Echo the resolved data paths and every hyperparameter.
    pub fn config(&mut self, paths: &DataPaths, params: &ModelParams) -> io::Result<()> {
        writeln!(self.out, "train: {}", paths.train.display())?;
        writeln!(self.out, "test: {}", paths.test.display())?;
        if let Some(embed) = &paths.embed {
            writeln!(self.out, "embeddings: {}", embed.display())?;
        }
        for (key, value) in params.settings() {
            writeln!(self.out, "{key}: {value}")?;
        }
        Ok(())
    }

    pub fn shape(&mut self, name: &str, (rows, cols): (usize, usize)) -> io::Result<()> {
        writeln!(self.out, "{name} shape: ({rows}, {cols})")
    }

    /// One `f1(<label>)=<score>` line per label, then the aggregate score.
    pub fn scores(&mut self, labels: &LabelMap, eval: &Evaluation) -> io::Result<()> {
        writeln!(self.out)?;
        for (id, label) in labels.iter() {
            let score = eval.per_class.get(id as usize).copied().unwrap_or(0.0);
            writeln!(self.out, "f1({label})={score:.6}")?;
        }
        if matches!(eval.scope, MicroF1Scope::RelationPair(..)) {
            writeln!(self.out)?;
        }
        writeln!(self.out, "f1({}) = {}", eval.scope.caption(), eval.aggregate)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExperimentConfig, ModelKind};
    use std::path::Path;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Reporter<Vec<u8>>) -> io::Result<()>,
    {
        let mut reporter = Reporter::new(Vec::new());
        f(&mut reporter).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_config_echo() {
        let cfg = ExperimentConfig::parse(
            "[data]\ntrain=a.txt\ntest=b.txt\nembed=v.txt\n\
             [cnn]\nbatch=8\nepochs=1\nembdims=10\nfilters=4\n\
             filtlen=2\nhidden=6\ndropout=0.5\nlearnrt=0.01\n",
            ModelKind::Cnn,
        )
        .unwrap();
        let paths = cfg.data.resolve(Path::new("/data"));
        let text = render(|r| r.config(&paths, &cfg.model));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "train: /data/a.txt");
        assert_eq!(lines[2], "embeddings: /data/v.txt");
        assert!(lines.contains(&"filtlen: 2"));
        assert_eq!(lines.last(), Some(&"learnrt: 0.01"));
    }

    #[test]
    fn test_shape_line() {
        let text = render(|r| r.shape("train_x", (4, 7)));
        assert_eq!(text, "train_x shape: (4, 7)\n");
    }

    #[test]
    fn test_scores_relation_pair() {
        let labels: LabelMap = ["contains", "contains-1", "other"].into_iter().collect();
        let eval = Evaluation::compute(&[0, 1, 2], &[0, 1, 1], &labels).unwrap();
        let text = render(|r| r.scores(&labels, &eval));

        assert!(text.contains("f1(contains)=1.000000\n"));
        assert!(text.contains("f1(other)=0.000000\n"));
        assert!(text.contains("\n\nf1(contains average) = 0.8"));
    }

    #[test]
    fn test_scores_all_labels() {
        let labels: LabelMap = ["yes", "no"].into_iter().collect();
        let eval = Evaluation::compute(&[0, 1], &[0, 1], &labels).unwrap();
        let text = render(|r| r.scores(&labels, &eval));
        assert!(text.ends_with("f1(no)=1.000000\nf1(all) = 1\n"));
    }
}
