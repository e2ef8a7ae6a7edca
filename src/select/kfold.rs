//! Deterministic k-fold index splitting.
//!
//! Folds are contiguous index blocks with the first `n_samples % n_splits`
//! folds one element larger, no shuffling. Determinism matters: given the
//! same corpus and configuration, every selection run must partition the
//! sequences identically.

use crate::error::{ErrorKind, SelectError};

/// Index splitter producing `(train, validation)` pairs.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self, SelectError> {
        if n_splits < 2 {
            return Err(SelectError::config("KFold requires n_splits >= 2."));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split `0..n_samples` into `n_splits` folds.
    ///
    /// Each returned pair holds the training indices (everything outside the
    /// fold) and the validation indices (the fold itself), both ascending.
    pub fn split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, SelectError> {
        if n_samples < self.n_splits {
            return Err(SelectError::new(
                ErrorKind::InsufficientData,
                format!(
                    "Cannot split {n_samples} sequences into {} folds.",
                    self.n_splits
                ),
            ));
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0usize;
        for fold in 0..self.n_splits {
            let len = base + usize::from(fold < extra);
            let validation: Vec<usize> = (start..start + len).collect();
            let train: Vec<usize> = (0..n_samples)
                .filter(|i| *i < start || *i >= start + len)
                .collect();
            splits.push((train, validation));
            start += len;
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_single_split() {
        assert!(KFold::new(1).is_err());
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let kfold = KFold::new(3).unwrap();
        let err = kfold.split(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.is_recoverable());
    }

    #[test]
    fn folds_partition_the_indices() {
        let kfold = KFold::new(3).unwrap();
        let splits = kfold.split(7).unwrap();
        assert_eq!(splits.len(), 3);

        let mut seen = Vec::new();
        for (train, validation) in &splits {
            assert_eq!(train.len() + validation.len(), 7);
            for i in validation {
                assert!(!train.contains(i));
            }
            seen.extend_from_slice(validation);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn first_folds_take_the_remainder() {
        let kfold = KFold::new(3).unwrap();
        let splits = kfold.split(7).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn split_is_deterministic() {
        let kfold = KFold::new(4).unwrap();
        assert_eq!(kfold.split(10).unwrap(), kfold.split(10).unwrap());
    }
}
