//! dqcore: values with uncertainty and data-quality flags
//!
//! Every measurement is a (nominal, uncertainty, flags) triple, either a
//! scalar or an array (vectors of bands, images of pixels x bands). The
//! arithmetic operators propagate uncertainty with first-order error
//! propagation and union the quality flags of their operands. Numeric
//! trouble such as division by zero is never an error: the affected
//! element gets a substitute value and a flag, and the rest of the
//! computation carries on.
//!
//! ```rust
//! use dqcore::{ScalarValue, QualityFlags};
//!
//! let a = ScalarValue::new(2.0, 3.0);
//! let b = ScalarValue::new(7.0, 4.0);
//! assert_eq!(a + b, ScalarValue::new(9.0, 5.0));
//!
//! let z = ScalarValue::new(6.0, 1.0) / ScalarValue::new(0.0, 0.0);
//! assert!(z.dq.contains(QualityFlags::DIVIDE_BY_ZERO));
//! ```
//!
//! Image arithmetic goes through [`ImageOperator`], which applies an
//! operator to the masked pixels of an [`ImageCube`] and returns a new
//! image; statistics over values or masked images go through
//! [`Aggregator`].

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{DqError, DqResult, Mask, Side, Nominal, DqBits};

pub use crate::core::{
    QualityFlags, ScalarValue, Value, ValueKind, UnaryOp, BinaryOp,
    Aggregator, AggregateParams, AggregateMode, Statistic,
    ImageCube, ImageOperator, ImageOpParams, Moments, pooled_sd,
};
pub use crate::core::aggregate::{mean, sum, sd, min, max};
pub use io::ValueRecord;
