//! Seeded train/test partitioning
//!
//! The index sample is drawn with a `ChaCha8Rng` seeded through
//! `SeedableRng::seed_from_u64`, which is portable across platforms and
//! releases of `rand_chacha`. The row indices `0..n` are shuffled with
//! `SliceRandom::shuffle` (Fisher–Yates in `rand` 0.9) and the first
//! `floor(train_fraction · n)` positions become the training rows.
//! Both sides are sorted ascending so that partitions keep panel order.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::*;

/// Seed used for the canonical partition
pub const DEFAULT_SEED: u64 = 123;
/// Share of rows assigned to the training partition
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Disjoint train/test row indices covering a panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    train: Vec<usize>,
    test: Vec<usize>,
}

impl Partition {
    /// Training row indices, ascending
    pub fn train(&self) -> &[usize] {
        &self.train
    }

    /// Test row indices, ascending
    pub fn test(&self) -> &[usize] {
        &self.test
    }

    /// Number of rows in the partitioned panel
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Whether the partition covers no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the (train, test) panels
    pub fn apply(&self, panel: &Panel) -> Result<(Panel, Panel)> {
        if panel.nrows() != self.len() {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.len()),
                actual: format!("{} rows", panel.nrows()),
            });
        }

        Ok((panel.take(&self.train)?, panel.take(&self.test)?))
    }
}

/// Deterministic train/test splitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplitter {
    /// Random seed
    pub seed: u64,
    /// Fraction of rows used for training
    pub train_fraction: f64,
}

impl Default for DatasetSplitter {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            train_fraction: DEFAULT_TRAIN_FRACTION,
        }
    }
}

impl DatasetSplitter {
    /// Create a splitter with the default 80/20 fraction
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Set the training fraction
    pub fn train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction;
        self
    }

    /// Partition `n` row indices
    pub fn partition(&self, n: usize) -> Result<Partition> {
        if n < 2 {
            return Err(DataError::InsufficientData { n, required: 2 });
        }

        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(DataError::InvalidParameter(format!(
                "train fraction must lie in (0, 1), got {}",
                self.train_fraction
            )));
        }

        let n_train = (self.train_fraction * n as f64).floor() as usize;
        if n_train == 0 || n_train == n {
            return Err(DataError::InsufficientData { n, required: 2 });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let mut test = indices.split_off(n_train);
        let mut train = indices;
        train.sort_unstable();
        test.sort_unstable();

        debug!(
            seed = self.seed,
            n_train = train.len(),
            n_test = test.len(),
            "Partitioned panel"
        );

        Ok(Partition { train, test })
    }

    /// Partition a panel and materialize both sides
    pub fn split(&self, panel: &Panel) -> Result<(Panel, Panel, Partition)> {
        let partition = self.partition(panel.nrows())?;
        let (train, test) = partition.apply(panel)?;
        Ok((train, test, partition))
    }
}
