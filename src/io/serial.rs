//! Primitive record forms for persisting values
//!
//! A [`Value`] is stored as plain numbers: a scalar as `{n, u, dq}`, an
//! array as its shape plus flat row-major lists. Flags are stored as their
//! raw 16-bit word, so reserved bits survive a round trip.

use crate::core::dq::QualityFlags;
use crate::core::value::Value;
use crate::types::{DqBits, DqError, DqResult, Nominal};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Serialized form of a [`Value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueRecord {
    Scalar {
        n: Nominal,
        u: Nominal,
        dq: DqBits,
    },
    Array {
        shape: Vec<usize>,
        n: Vec<Nominal>,
        u: Vec<Nominal>,
        dq: Vec<DqBits>,
    },
}

impl From<Value> for ValueRecord {
    fn from(value: Value) -> Self {
        if let Some(v) = value.as_scalar() {
            return ValueRecord::Scalar {
                n: v.n,
                u: v.u,
                dq: v.dq.bits(),
            };
        }
        let shape = value.shape().to_vec();
        let (n, u, dq) = value.into_parts();
        ValueRecord::Array {
            shape,
            n: n.iter().copied().collect(),
            u: u.iter().copied().collect(),
            dq: dq.iter().map(|d| d.bits()).collect(),
        }
    }
}

impl TryFrom<ValueRecord> for Value {
    type Error = DqError;

    fn try_from(record: ValueRecord) -> DqResult<Self> {
        match record {
            ValueRecord::Scalar { n, u, dq } => {
                Ok(Value::scalar(n, u, QualityFlags::from_raw(dq)))
            }
            ValueRecord::Array { shape, n, u, dq } => {
                let expected: usize = shape.iter().product();
                if n.len() != expected || u.len() != expected || dq.len() != expected {
                    return Err(DqError::Serialization(format!(
                        "shape {:?} needs {} elements, got n={} u={} dq={}",
                        shape,
                        expected,
                        n.len(),
                        u.len(),
                        dq.len()
                    )));
                }
                let dim = IxDyn(&shape);
                let dq: Vec<QualityFlags> = dq.into_iter().map(QualityFlags::from_raw).collect();
                Value::from_parts(
                    ArrayD::from_shape_vec(dim.clone(), n)?,
                    Some(ArrayD::from_shape_vec(dim.clone(), u)?),
                    Some(ArrayD::from_shape_vec(dim, dq)?),
                )
            }
        }
    }
}

impl Value {
    /// Primitive record form
    pub fn to_record(&self) -> ValueRecord {
        ValueRecord::from(self.clone())
    }

    pub fn from_record(record: ValueRecord) -> DqResult<Self> {
        Value::try_from(record)
    }
}
