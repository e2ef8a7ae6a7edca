//! Sequence data model: per-utterance sequences, the flattened fitting
//! representation, and the per-word corpus.
//!
//! The fitter consumes a single concatenated observation matrix plus the
//! ordered per-sequence lengths (`FlattenedSequences`). The corpus keeps both
//! shapes per word and builds the flattened view from the sequence view, so
//! the two can never disagree. Everything here is immutable once built.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::SelectError;

/// One observed utterance of one vocabulary item: an ordered list of
/// fixed-dimension feature vectors, stored as a matrix with one row per
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    frames: DMatrix<f64>,
}

impl Sequence {
    /// Build a sequence from per-frame feature vectors.
    ///
    /// Rejects empty sequences, ragged frames, and non-finite features.
    pub fn from_frames(frames: &[Vec<f64>]) -> Result<Self, SelectError> {
        let Some(first) = frames.first() else {
            return Err(SelectError::data("Sequence has no frames."));
        };
        let dim = first.len();
        if dim == 0 {
            return Err(SelectError::data("Sequence frames have zero dimensions."));
        }
        for (i, frame) in frames.iter().enumerate() {
            if frame.len() != dim {
                return Err(SelectError::data(format!(
                    "Frame {i} has {} features, expected {dim}.",
                    frame.len()
                )));
            }
            if frame.iter().any(|v| !v.is_finite()) {
                return Err(SelectError::data(format!(
                    "Frame {i} contains a non-finite feature."
                )));
            }
        }

        let mut m = DMatrix::<f64>::zeros(frames.len(), dim);
        for (i, frame) in frames.iter().enumerate() {
            for (j, &v) in frame.iter().enumerate() {
                m[(i, j)] = v;
            }
        }
        Ok(Self { frames: m })
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.nrows() == 0
    }

    /// Feature dimensionality.
    pub fn dim(&self) -> usize {
        self.frames.ncols()
    }

    pub fn frames(&self) -> &DMatrix<f64> {
        &self.frames
    }
}

/// Concatenated observation matrix plus ordered per-sequence lengths: the
/// input shape required by model fitting.
///
/// Invariants (enforced at construction): the lengths sum to the row count
/// of the matrix, their order matches the concatenation order, and every
/// contributing sequence shares the matrix's column count.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedSequences {
    x: DMatrix<f64>,
    lengths: Vec<usize>,
}

impl FlattenedSequences {
    /// Reassemble the sequences at `indices` (in order) into one flattened
    /// representation. This is the combine step used by the cross-validation
    /// strategy to build a fold's training data.
    pub fn combine(indices: &[usize], sequences: &[Sequence]) -> Result<Self, SelectError> {
        if indices.is_empty() {
            return Err(SelectError::data("No sequences selected to combine."));
        }
        let first = match indices.first().and_then(|&i| sequences.get(i)) {
            Some(s) => s,
            None => {
                return Err(SelectError::data(format!(
                    "Sequence index {} out of range (have {}).",
                    indices[0],
                    sequences.len()
                )));
            }
        };
        let dim = first.dim();

        let mut total = 0usize;
        let mut lengths = Vec::with_capacity(indices.len());
        for &i in indices {
            let Some(seq) = sequences.get(i) else {
                return Err(SelectError::data(format!(
                    "Sequence index {i} out of range (have {}).",
                    sequences.len()
                )));
            };
            if seq.dim() != dim {
                return Err(SelectError::data(format!(
                    "Sequence {i} has dimension {}, expected {dim}.",
                    seq.dim()
                )));
            }
            total += seq.len();
            lengths.push(seq.len());
        }

        let mut x = DMatrix::<f64>::zeros(total, dim);
        let mut row = 0usize;
        for &i in indices {
            let frames = sequences[i].frames();
            for r in 0..frames.nrows() {
                x.row_mut(row).copy_from(&frames.row(r));
                row += 1;
            }
        }

        Ok(Self { x, lengths })
    }

    /// Flatten every sequence, in order.
    pub fn from_all(sequences: &[Sequence]) -> Result<Self, SelectError> {
        let indices: Vec<usize> = (0..sequences.len()).collect();
        Self::combine(&indices, sequences)
    }

    /// The concatenated observation matrix (one row per frame).
    pub fn observations(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// Per-sequence lengths, in concatenation order.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Total number of observation frames across all sequences.
    pub fn n_frames(&self) -> usize {
        self.x.nrows()
    }

    /// Number of sequences.
    pub fn n_sequences(&self) -> usize {
        self.lengths.len()
    }

    /// Feature dimensionality.
    pub fn dim(&self) -> usize {
        self.x.ncols()
    }
}

/// Read-only per-word corpus: word → sequences plus word → flattened view.
///
/// Built from the sequence mapping alone; the flattened mapping is derived,
/// never supplied, so the two views stay mutually consistent. Words iterate
/// in lexical order, which keeps every downstream sweep deterministic.
#[derive(Debug, Clone)]
pub struct Corpus {
    sequences: BTreeMap<String, Vec<Sequence>>,
    flattened: BTreeMap<String, FlattenedSequences>,
}

impl Corpus {
    pub fn from_sequences(
        sequences: BTreeMap<String, Vec<Sequence>>,
    ) -> Result<Self, SelectError> {
        if sequences.is_empty() {
            return Err(SelectError::data("Corpus has no vocabulary items."));
        }

        let mut flattened = BTreeMap::new();
        for (word, seqs) in &sequences {
            if seqs.is_empty() {
                return Err(SelectError::data(format!(
                    "Word \"{word}\" has no sequences."
                )));
            }
            let flat = FlattenedSequences::from_all(seqs).map_err(|e| {
                SelectError::data(format!("Word \"{word}\": {e}"))
            })?;
            flattened.insert(word.clone(), flat);
        }

        Ok(Self {
            sequences,
            flattened,
        })
    }

    /// Vocabulary labels in lexical order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.sequences.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// The word's sequence list, if present.
    pub fn sequences(&self, word: &str) -> Option<&[Sequence]> {
        self.sequences.get(word).map(Vec::as_slice)
    }

    /// The word's flattened representation, if present.
    pub fn flattened(&self, word: &str) -> Option<&FlattenedSequences> {
        self.flattened.get(word)
    }

    /// All `(word, flattened)` pairs in lexical order.
    pub fn iter_flattened(&self) -> impl Iterator<Item = (&str, &FlattenedSequences)> {
        self.flattened.iter().map(|(w, f)| (w.as_str(), f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(values: &[(f64, f64)]) -> Sequence {
        let frames: Vec<Vec<f64>> = values.iter().map(|&(a, b)| vec![a, b]).collect();
        Sequence::from_frames(&frames).unwrap()
    }

    #[test]
    fn sequence_rejects_ragged_frames() {
        let err = Sequence::from_frames(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Data);
    }

    #[test]
    fn sequence_rejects_non_finite_features() {
        assert!(Sequence::from_frames(&[vec![1.0, f64::NAN]]).is_err());
    }

    #[test]
    fn combine_preserves_order_and_lengths() {
        let sequences = vec![
            seq(&[(1.0, 1.0), (2.0, 2.0)]),
            seq(&[(3.0, 3.0)]),
            seq(&[(4.0, 4.0), (5.0, 5.0), (6.0, 6.0)]),
        ];

        let flat = FlattenedSequences::combine(&[2, 0], &sequences).unwrap();
        assert_eq!(flat.lengths(), &[3, 2]);
        assert_eq!(flat.n_frames(), 5);
        assert_eq!(flat.dim(), 2);
        // Sequence 2 first, then sequence 0.
        assert_eq!(flat.observations()[(0, 0)], 4.0);
        assert_eq!(flat.observations()[(3, 0)], 1.0);
    }

    #[test]
    fn combine_rejects_out_of_range_index() {
        let sequences = vec![seq(&[(1.0, 1.0)])];
        assert!(FlattenedSequences::combine(&[1], &sequences).is_err());
    }

    #[test]
    fn flattened_lengths_sum_to_rows() {
        let sequences = vec![seq(&[(1.0, 1.0), (2.0, 2.0)]), seq(&[(3.0, 3.0)])];
        let flat = FlattenedSequences::from_all(&sequences).unwrap();
        assert_eq!(flat.lengths().iter().sum::<usize>(), flat.n_frames());
    }

    #[test]
    fn corpus_views_are_consistent() {
        let mut map = BTreeMap::new();
        map.insert("book".to_string(), vec![seq(&[(1.0, 1.0), (2.0, 2.0)])]);
        map.insert("chair".to_string(), vec![seq(&[(3.0, 3.0)]), seq(&[(4.0, 4.0)])]);

        let corpus = Corpus::from_sequences(map).unwrap();
        assert_eq!(corpus.len(), 2);
        for word in ["book", "chair"] {
            let seqs = corpus.sequences(word).unwrap();
            let flat = corpus.flattened(word).unwrap();
            assert_eq!(seqs.len(), flat.n_sequences());
            assert_eq!(
                seqs.iter().map(Sequence::len).sum::<usize>(),
                flat.n_frames()
            );
        }
        // Lexical iteration order.
        let words: Vec<&str> = corpus.words().collect();
        assert_eq!(words, vec!["book", "chair"]);
    }

    #[test]
    fn corpus_rejects_word_without_sequences() {
        let mut map = BTreeMap::new();
        map.insert("empty".to_string(), Vec::new());
        assert!(Corpus::from_sequences(map).is_err());
    }
}
