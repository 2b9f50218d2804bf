//! Core value, flag and aggregation modules

pub mod dq;
pub mod number;
pub mod value;
pub mod stats;
pub mod aggregate;
pub mod image;
pub mod image_ops;

// Re-export main types
pub use dq::{QualityFlags, FlagInfo, CATALOGUE};
pub use number::{ScalarValue, APPROX_EPSILON, UNDEFINED_UNCERTAINTY};
pub use value::{Value, ValueKind, UnaryOp, BinaryOp};
pub use stats::{Moments, pooled_sd};
pub use aggregate::{Aggregator, AggregateParams, AggregateMode, Statistic};
pub use image::ImageCube;
pub use image_ops::{ImageOperator, ImageOpParams};
