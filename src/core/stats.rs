//! Running moments and pooled standard deviation
//!
//! `Moments` accumulates in f64 with Welford updates and merges partial
//! results with the exact pairwise combination law, so a chunked or
//! parallel reduction gives the same mean/variance as a sequential pass.

use crate::core::dq::QualityFlags;
use crate::core::number::ScalarValue;
use crate::types::{DqError, DqResult};
use ndarray::{ArrayBase, Data, Dimension, Zip};
use num_traits::Float;

/// Mergeable summary of a set of (n, u, dq) elements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Sum of squared deviations of the nominals from `mean`
    pub m2: f64,
    /// Sum of squared uncertainties
    pub sum_u2: f64,
    pub min: f64,
    pub max: f64,
    /// Union of the flags of every accumulated element
    pub dq: QualityFlags,
}

impl Default for Moments {
    fn default() -> Self {
        Self::new()
    }
}

impl Moments {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            mean: 0.0,
            m2: 0.0,
            sum_u2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            dq: QualityFlags::empty(),
        }
    }

    pub fn push(&mut self, v: ScalarValue) {
        let n = v.n as f64;
        let u = v.u as f64;
        self.count += 1;
        self.sum += n;
        let delta = n - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (n - self.mean);
        self.sum_u2 += u * u;
        self.min = self.min.min(n);
        self.max = self.max.max(n);
        self.dq |= v.dq;
    }

    /// Combine two partial summaries.
    pub fn merge(self, other: Self) -> Self {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let (na, nb) = (self.count as f64, other.count as f64);
        let count = self.count + other.count;
        let total = count as f64;
        let delta = other.mean - self.mean;
        Self {
            count,
            sum: self.sum + other.sum,
            mean: self.mean + delta * nb / total,
            m2: self.m2 + other.m2 + delta * delta * na * nb / total,
            sum_u2: self.sum_u2 + other.sum_u2,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            dq: self.dq | other.dq,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Population variance of the nominals
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Mean of the squared uncertainties
    pub fn mean_u2(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_u2 / self.count as f64
        }
    }

    /// `sqrt(variance of nominals + mean of variances)`.
    ///
    /// Treats every element as a sub-population of equal size.
    pub fn pooled_sd(&self) -> f64 {
        (self.variance() + self.mean_u2()).sqrt()
    }

    /// Root-sum-of-squares of the uncertainties
    pub fn rss_u(&self) -> f64 {
        self.sum_u2.sqrt()
    }
}

impl FromIterator<ScalarValue> for Moments {
    fn from_iter<I: IntoIterator<Item = ScalarValue>>(iter: I) -> Self {
        let mut m = Moments::new();
        for v in iter {
            m.push(v);
        }
        m
    }
}

impl Extend<ScalarValue> for Moments {
    fn extend<I: IntoIterator<Item = ScalarValue>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

/// Summarise a slice in parallel chunks, merging with [`Moments::merge`].
#[cfg(feature = "parallel")]
pub fn par_moments(items: &[ScalarValue], chunk_size: usize) -> Moments {
    use rayon::prelude::*;

    items
        .par_chunks(chunk_size.max(1))
        .map(|chunk| chunk.iter().copied().collect::<Moments>())
        .reduce(Moments::new, Moments::merge)
}

/// Pooled standard deviation of matching nominal and uncertainty arrays:
/// `sqrt(var(n) + mean(u^2))`. Empty input gives zero.
pub fn pooled_sd<T, S1, S2, D>(n: &ArrayBase<S1, D>, u: &ArrayBase<S2, D>) -> DqResult<T>
where
    T: Float,
    S1: Data<Elem = T>,
    S2: Data<Elem = T>,
    D: Dimension,
{
    if n.shape() != u.shape() {
        return Err(DqError::mismatch(n.shape(), u.shape()));
    }
    if n.is_empty() {
        return Ok(T::zero());
    }

    let mut m = Moments::new();
    Zip::from(n).and(u).for_each(|&nv, &uv| {
        m.push(ScalarValue::new(
            nv.to_f32().unwrap_or(f32::NAN),
            uv.to_f32().unwrap_or(f32::NAN),
        ));
    });
    Ok(T::from(m.pooled_sd()).unwrap_or_else(T::nan))
}
