/// Weighted random choice over arbitrary items.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DistributionError {
    #[error("item count ({items}) does not match weight count ({weights})")]
    LengthMismatch { items: usize, weights: usize },
    #[error("weight {weight} at index {index} is negative")]
    NegativeWeight { index: usize, weight: f64 },
    #[error("weight at index {index} is not a finite number")]
    InvalidWeight { index: usize },
    #[error("weights sum to zero (nothing can be chosen)")]
    ZeroTotal,
}

/// A fixed pairing of items to non-negative weights.
///
/// Immutable once built; sampling is independent each call and never
/// exhausts the distribution. Rebuild it to change weights.
#[derive(Debug, Clone)]
pub struct WeightedDistribution<T> {
    items: Vec<T>,
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl<T> WeightedDistribution<T> {
    pub fn build(items: Vec<T>, weights: Vec<f64>) -> Result<Self, DistributionError> {
        if items.len() != weights.len() {
            return Err(DistributionError::LengthMismatch {
                items: items.len(),
                weights: weights.len(),
            });
        }
        for (index, &weight) in weights.iter().enumerate() {
            if !weight.is_finite() {
                return Err(DistributionError::InvalidWeight { index });
            }
            if weight < 0.0 {
                return Err(DistributionError::NegativeWeight { index, weight });
            }
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(DistributionError::ZeroTotal);
        }

        let index = WeightedIndex::new(&weights).map_err(|_| DistributionError::ZeroTotal)?;
        Ok(Self {
            items,
            weights,
            index,
        })
    }

    /// Build from `(item, weight)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (T, f64)>) -> Result<Self, DistributionError> {
        let (items, weights) = pairs.into_iter().unzip();
        Self::build(items, weights)
    }

    /// Draw one item with probability proportional to its weight.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.index.sample(rng)]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Probability of drawing the item at `index`.
    pub fn probability(&self, index: usize) -> Option<f64> {
        let total: f64 = self.weights.iter().sum();
        self.weights.get(index).map(|w| w / total)
    }
}
