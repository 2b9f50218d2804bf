use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Nominal and uncertainty storage type
pub type Nominal = f32;

/// Raw quality-flag word as stored in image flag planes
pub type DqBits = u16;

/// Inclusion mask over the spatial dimensions (true = include)
pub type Mask = Array2<bool>;

/// 3D float plane (rows x cols x bands)
pub type BandArray = Array3<Nominal>;

/// 3D flag plane (rows x cols x bands)
pub type DqArray = Array3<DqBits>;

/// Which operand of a binary operation a broadcast constant occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Constant is the left operand (`k op image`)
    Left,
    /// Constant is the right operand (`image op k`)
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Structural errors. Numeric conditions (division by zero, complex
/// results...) are never reported here; they are carried as quality flags.
#[derive(Debug, thiserror::Error)]
pub enum DqError {
    #[error("Unknown quality flag: {0}")]
    UnknownFlag(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DqError {
    pub(crate) fn mismatch(left: &[usize], right: &[usize]) -> Self {
        DqError::ShapeMismatch {
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

/// Result type for value and image operations
pub type DqResult<T> = Result<T, DqError>;
