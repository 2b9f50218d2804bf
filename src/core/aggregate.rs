//! Pooled statistics over values and masked images
//!
//! The uncertainty of a mean is the pooled standard deviation
//! `sqrt(var(n_i) + mean(u_i^2))`: each element is treated as a
//! sub-population with its own spread, not as an exact sample.
//! Elements carrying any excluded flag (BAD by default) are skipped.

use crate::core::dq::QualityFlags;
use crate::core::image::ImageCube;
use crate::core::number::ScalarValue;
use crate::core::stats::Moments;
use crate::core::value::Value;
use crate::types::{DqResult, Mask, Nominal};
use ndarray::{Axis, Ix2};
use serde::{Deserialize, Serialize};

/// Element count above which a flattened reduction is done in parallel chunks
const PARALLEL_CHUNK: usize = 1 << 14;

/// Reduction to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    /// Mean with pooled-variance uncertainty
    Mean,
    /// Sum with quadrature uncertainty
    Sum,
    /// Population standard deviation of the nominals
    Sd,
    Min,
    Max,
}

/// How image inputs are reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateMode {
    /// One result per band
    PerBand,
    /// All bands flattened into one result
    Scalar,
}

/// Aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateParams {
    pub mode: AggregateMode,
    /// Elements with any of these flags are left out
    pub exclude: QualityFlags,
}

impl Default for AggregateParams {
    fn default() -> Self {
        Self {
            mode: AggregateMode::PerBand,
            exclude: QualityFlags::BAD,
        }
    }
}

/// Reduces values and masked images to summary values
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    params: AggregateParams,
}

impl Aggregator {
    pub fn new(params: AggregateParams) -> Self {
        Self { params }
    }

    /// Per-band mode, BAD elements excluded
    pub fn standard() -> Self {
        Self::new(AggregateParams::default())
    }

    pub fn params(&self) -> &AggregateParams {
        &self.params
    }

    fn keep(&self, v: &ScalarValue) -> bool {
        !v.dq.intersects(self.params.exclude)
    }

    fn moments<I>(&self, items: I) -> Moments
    where
        I: IntoIterator<Item = ScalarValue>,
    {
        let kept: Vec<ScalarValue> = items.into_iter().filter(|v| self.keep(v)).collect();

        #[cfg(feature = "parallel")]
        {
            if kept.len() > PARALLEL_CHUNK {
                return crate::core::stats::par_moments(&kept, PARALLEL_CHUNK);
            }
        }

        kept.into_iter().collect()
    }

    /// Reduce every element of every input to one scalar value.
    pub fn reduce(&self, stat: Statistic, values: &[Value]) -> Value {
        let m = self.moments(values.iter().flat_map(|v| v.iter()));
        log::debug!(
            "{:?} over {} values: {} elements kept",
            stat,
            values.len(),
            m.count
        );
        Value::from_scalar(finish(stat, &m))
    }

    pub fn mean(&self, values: &[Value]) -> Value {
        self.reduce(Statistic::Mean, values)
    }

    pub fn sum(&self, values: &[Value]) -> Value {
        self.reduce(Statistic::Sum, values)
    }

    pub fn sd(&self, values: &[Value]) -> Value {
        self.reduce(Statistic::Sd, values)
    }

    pub fn min(&self, values: &[Value]) -> Value {
        self.reduce(Statistic::Min, values)
    }

    pub fn max(&self, values: &[Value]) -> Value {
        self.reduce(Statistic::Max, values)
    }

    /// Reduce the masked pixels of an image.
    ///
    /// Per-band mode gives a vector with one element per band; scalar mode
    /// flattens every masked pixel of every band.
    pub fn reduce_image(
        &self,
        stat: Statistic,
        image: &ImageCube,
        mask: &Mask,
    ) -> DqResult<Value> {
        let region = image.extract(mask)?;
        log::info!(
            "{:?} ({:?}) over {} masked pixels x {} bands",
            stat,
            self.params.mode,
            region.shape()[0],
            image.bands()
        );

        match self.params.mode {
            AggregateMode::Scalar => Ok(self.reduce(stat, std::slice::from_ref(&region))),
            AggregateMode::PerBand => {
                let cells = region_columns(&region)?;
                let results = self.per_band(stat, cells);
                Ok(Value::from_scalars(&[results.len()], results)?)
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn per_band(&self, stat: Statistic, columns: Vec<Vec<ScalarValue>>) -> Vec<ScalarValue> {
        use rayon::prelude::*;

        columns
            .into_par_iter()
            .map(|col| finish(stat, &self.moments(col)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn per_band(&self, stat: Statistic, columns: Vec<Vec<ScalarValue>>) -> Vec<ScalarValue> {
        columns
            .into_iter()
            .map(|col| finish(stat, &self.moments(col)))
            .collect()
    }
}

/// Split an (npix x bands) region into one element list per band.
fn region_columns(region: &Value) -> DqResult<Vec<Vec<ScalarValue>>> {
    let n = region.n().view().into_dimensionality::<Ix2>()?;
    let u = region.u().view().into_dimensionality::<Ix2>()?;
    let dq = region.dq().view().into_dimensionality::<Ix2>()?;

    Ok(n.axis_iter(Axis(1))
        .zip(u.axis_iter(Axis(1)))
        .zip(dq.axis_iter(Axis(1)))
        .map(|((n, u), dq)| {
            n.iter()
                .zip(u.iter())
                .zip(dq.iter())
                .map(|((&n, &u), &dq)| ScalarValue { n, u, dq })
                .collect()
        })
        .collect())
}

/// Turn accumulated moments into the requested statistic.
///
/// An empty accumulator (no input, or everything excluded) gives
/// `0±0` flagged NODATA.
pub fn finish(stat: Statistic, m: &Moments) -> ScalarValue {
    if m.is_empty() {
        log::warn!("{:?} of an empty selection", stat);
        return ScalarValue::new(0.0, 0.0).with_dq(QualityFlags::NODATA);
    }
    let (n, u, dq) = match stat {
        Statistic::Mean => (m.mean, m.pooled_sd(), m.dq),
        Statistic::Sum => (m.sum, m.rss_u(), m.dq),
        Statistic::Sd => (m.sd(), 0.0, m.dq | QualityFlags::NOUNCERTAINTY),
        Statistic::Min => (m.min, 0.0, m.dq | QualityFlags::NOUNCERTAINTY),
        Statistic::Max => (m.max, 0.0, m.dq | QualityFlags::NOUNCERTAINTY),
    };
    ScalarValue {
        n: n as Nominal,
        u: u as Nominal,
        dq,
    }
}

/// Mean of all elements with pooled uncertainty, BAD elements excluded
pub fn mean(values: &[Value]) -> Value {
    Aggregator::standard().mean(values)
}

/// Sum of all elements with quadrature uncertainty, BAD elements excluded
pub fn sum(values: &[Value]) -> Value {
    Aggregator::standard().sum(values)
}

/// Population SD of the nominals, BAD elements excluded
pub fn sd(values: &[Value]) -> Value {
    Aggregator::standard().sd(values)
}

pub fn min(values: &[Value]) -> Value {
    Aggregator::standard().min(values)
}

pub fn max(values: &[Value]) -> Value {
    Aggregator::standard().max(values)
}
