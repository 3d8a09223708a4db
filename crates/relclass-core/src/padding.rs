//! # Sequence Padding and Label Encoding
//!
//! Turns variable-length id sequences into a fixed-width matrix and label ids
//! into a one-hot matrix.
//!
//! Padding goes at the front, and sequences longer than the width lose their
//! leading ids, so the end of every sentence stays next to the classifier.

use candle_core::{Device, Tensor};

use crate::dataset::UNK_ID;
use crate::error::{RelclassError, Result};

/// Value written into padded positions.
pub const PAD_ID: u32 = UNK_ID;

/// Row-major `rows × width` matrix of vocabulary ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedSequences {
    rows: usize,
    width: usize,
    data: Vec<u32>,
}

impl PaddedSequences {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.width)
    }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// `u32` tensor of shape `(rows, width)`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.data, (self.rows, self.width), device)?)
    }
}

/// Row-major `rows × classes` one-hot matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotLabels {
    rows: usize,
    classes: usize,
    data: Vec<f32>,
}

impl OneHotLabels {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.classes)
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.classes..(i + 1) * self.classes]
    }

    /// Recover the label id of every row.
    pub fn argmax(&self) -> Vec<u32> {
        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .position(|&v| v == 1.0)
                    .unwrap_or(0) as u32
            })
            .collect()
    }

    /// `f32` tensor of shape `(rows, classes)`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.data, (self.rows, self.classes), device)?)
    }
}

/// Drop leading ids until `seq` is at most `width` long.
pub fn truncate_front(seq: &mut Vec<u32>, width: usize) {
    if seq.len() > width {
        seq.drain(..seq.len() - width);
    }
}

/// Pad or truncate every sequence to exactly `width` ids.
pub fn pad_sequences(sequences: &[Vec<u32>], width: usize) -> PaddedSequences {
    let mut data = Vec::with_capacity(sequences.len() * width);
    for seq in sequences {
        let keep = seq.len().min(width);
        data.extend(std::iter::repeat_n(PAD_ID, width - keep));
        data.extend_from_slice(&seq[seq.len() - keep..]);
    }
    PaddedSequences {
        rows: sequences.len(),
        width,
        data,
    }
}

/// One-hot encode `labels` over `classes` columns.
pub fn one_hot(labels: &[u32], classes: usize) -> Result<OneHotLabels> {
    let mut data = vec![0.0f32; labels.len() * classes];
    for (i, &label) in labels.iter().enumerate() {
        let label = label as usize;
        if label >= classes {
            return Err(RelclassError::Shape(format!(
                "label id {label} out of range for {classes} classes"
            )));
        }
        data[i * classes + label] = 1.0;
    }
    Ok(OneHotLabels {
        rows: labels.len(),
        classes,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_width_is_unchanged() {
        let padded = pad_sequences(&[vec![4, 5, 6]], 3);
        assert_eq!(padded.row(0), &[4, 5, 6]);
    }

    #[test]
    fn test_short_sequence_is_front_padded() {
        let padded = pad_sequences(&[vec![7, 8]], 4);
        assert_eq!(padded.row(0), &[PAD_ID, PAD_ID, 7, 8]);
    }

    #[test]
    fn test_one_over_width_drops_first_id() {
        let padded = pad_sequences(&[vec![1, 2, 3, 4]], 3);
        assert_eq!(padded.row(0), &[2, 3, 4]);
        assert_eq!(padded.shape(), (1, 3));
    }

    #[test]
    fn test_empty_sequence_is_all_padding() {
        let padded = pad_sequences(&[vec![], vec![9]], 3);
        assert_eq!(padded.row(0), &[PAD_ID; 3]);
        assert_eq!(padded.row(1), &[PAD_ID, PAD_ID, 9]);
    }

    #[test]
    fn test_truncate_front() {
        let mut seq = vec![1, 2, 3, 4, 5];
        truncate_front(&mut seq, 2);
        assert_eq!(seq, vec![4, 5]);

        let mut short = vec![1];
        truncate_front(&mut short, 2);
        assert_eq!(short, vec![1]);
    }

    #[test]
    fn test_one_hot_rows() {
        let classes = 4;
        let labels: Vec<u32> = (0..classes as u32).collect();
        let encoded = one_hot(&labels, classes).unwrap();

        for k in 0..classes {
            let row = encoded.row(k);
            assert_eq!(row.iter().filter(|&&v| v == 1.0).count(), 1);
            assert_eq!(row.iter().filter(|&&v| v == 0.0).count(), classes - 1);
            assert_eq!(row[k], 1.0);
        }
        assert_eq!(encoded.argmax(), labels);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range() {
        let err = one_hot(&[0, 2], 2).unwrap_err();
        assert!(matches!(err, RelclassError::Shape(_)));
    }

    #[test]
    fn test_to_tensor_shapes() {
        let device = Device::Cpu;
        let padded = pad_sequences(&[vec![1, 2], vec![3]], 2);
        let xs = padded.to_tensor(&device).unwrap();
        assert_eq!(xs.dims(), &[2, 2]);
        assert_eq!(xs.to_vec2::<u32>().unwrap(), vec![vec![1, 2], vec![0, 3]]);

        let ys = one_hot(&[1, 0], 2).unwrap().to_tensor(&device).unwrap();
        assert_eq!(ys.to_vec2::<f32>().unwrap(), vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
    }
}
