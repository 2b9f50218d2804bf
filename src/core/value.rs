//! Vector-capable values
//!
//! A [`Value`] holds nominal, uncertainty and flag arrays of one shared
//! shape. A 0-D shape is a scalar. Binary operators broadcast a scalar
//! against an array of any shape; two arrays must have identical shapes.
//! Every operator works element by element through the [`ScalarValue`]
//! rules, so the flags of an output element depend only on the elements
//! it was computed from.

use crate::core::dq::QualityFlags;
use crate::core::number::ScalarValue;
use crate::io::serial::ValueRecord;
use crate::types::{DqError, DqResult, Nominal};
use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element count above which element-wise operators run in parallel
const PARALLEL_MIN_ELEMENTS: usize = 1 << 16;

/// Shape class of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// 0-D
    Scalar,
    /// 1-D, e.g. one value per band
    Vector,
    /// 2-D or more, e.g. pixels x bands
    Image,
}

/// Element-wise unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    /// Fuzzy NOT, `1 - x`
    Not,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Abs,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 7] = [
        UnaryOp::Neg,
        UnaryOp::Not,
        UnaryOp::Sqrt,
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Tan,
        UnaryOp::Abs,
    ];

    pub fn apply(self, v: ScalarValue) -> ScalarValue {
        match self {
            UnaryOp::Neg => -v,
            UnaryOp::Not => !v,
            UnaryOp::Sqrt => v.sqrt(),
            UnaryOp::Sin => v.sin(),
            UnaryOp::Cos => v.cos(),
            UnaryOp::Tan => v.tan(),
            UnaryOp::Abs => v.abs(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Abs => "abs",
        }
    }
}

impl FromStr for UnaryOp {
    type Err = DqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnaryOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| DqError::UnknownOperator(s.to_string()))
    }
}

/// Element-wise binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// Fuzzy AND (min)
    And,
    /// Fuzzy OR (max)
    Or,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 7] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Pow,
        BinaryOp::And,
        BinaryOp::Or,
    ];

    pub fn apply(self, a: ScalarValue, b: ScalarValue) -> ScalarValue {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.pow(b),
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }

    /// Operand order does not matter
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or
        )
    }
}

impl FromStr for BinaryOp {
    type Err = DqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BinaryOp::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| DqError::UnknownOperator(s.to_string()))
    }
}

/// Nominal, uncertainty and flags, as scalars or as same-shape arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValueRecord", try_from = "ValueRecord")]
pub struct Value {
    n: ArrayD<Nominal>,
    u: ArrayD<Nominal>,
    dq: ArrayD<QualityFlags>,
}

impl Value {
    /// Build a value from its three arrays.
    ///
    /// * `u = None` gives zero uncertainty and sets NOUNCERTAINTY on every element
    /// * `dq = None` gives no flags
    /// * a 0-D `u` or `dq` is broadcast to the shape of `n`
    ///
    /// A scalar `n` with an array `u` or `dq` is rejected, as are
    /// arrays whose shape differs from `n`.
    pub fn from_parts(
        n: ArrayD<Nominal>,
        u: Option<ArrayD<Nominal>>,
        dq: Option<ArrayD<QualityFlags>>,
    ) -> DqResult<Self> {
        let (u, missing_u) = match u {
            Some(u) => (conform(u, &n, "uncertainty")?, false),
            None => (ArrayD::zeros(n.raw_dim()), true),
        };
        let mut dq = match dq {
            Some(dq) => conform(dq, &n, "flags")?,
            None => ArrayD::from_elem(n.raw_dim(), QualityFlags::empty()),
        };
        if missing_u {
            dq.mapv_inplace(|d| d | QualityFlags::NOUNCERTAINTY);
        }
        Ok(Self { n, u, dq })
    }

    /// Explicit scalar. `u = 0.0` here does not imply NOUNCERTAINTY.
    pub fn scalar(n: Nominal, u: Nominal, dq: QualityFlags) -> Self {
        Self::from_scalar(ScalarValue { n, u, dq })
    }

    /// Scalar with no uncertainty supplied
    pub fn nominal(n: Nominal) -> Self {
        Self::from_scalar(ScalarValue::nominal(n))
    }

    pub fn from_scalar(v: ScalarValue) -> Self {
        let shape = IxDyn(&[]);
        Self {
            n: ArrayD::from_elem(shape.clone(), v.n),
            u: ArrayD::from_elem(shape.clone(), v.u),
            dq: ArrayD::from_elem(shape, v.dq),
        }
    }

    /// 1-D value from three equal-length lists
    pub fn vector(n: Vec<Nominal>, u: Vec<Nominal>, dq: Vec<QualityFlags>) -> DqResult<Self> {
        Self::from_parts(
            Array1::from(n).into_dyn(),
            Some(Array1::from(u).into_dyn()),
            Some(Array1::from(dq).into_dyn()),
        )
    }

    /// 1-D value with no uncertainty supplied
    pub fn nominal_vector(n: Vec<Nominal>) -> Self {
        let n = Array1::from(n).into_dyn();
        let dq = ArrayD::from_elem(n.raw_dim(), QualityFlags::NOUNCERTAINTY);
        Self {
            u: ArrayD::zeros(n.raw_dim()),
            n,
            dq,
        }
    }

    /// Inverse of [`Value::split`]: lay `items` out in row-major order.
    pub fn from_scalars(shape: &[usize], items: Vec<ScalarValue>) -> DqResult<Self> {
        let cells = ArrayD::from_shape_vec(IxDyn(shape), items)?;
        Ok(Self::from_cells(cells.view()))
    }

    fn from_cells(cells: ArrayViewD<'_, ScalarValue>) -> Self {
        Self {
            n: cells.map(|c| c.n),
            u: cells.map(|c| c.u),
            dq: cells.map(|c| c.dq),
        }
    }

    fn cells(&self) -> ArrayD<ScalarValue> {
        Zip::from(&self.n)
            .and(&self.u)
            .and(&self.dq)
            .map_collect(|&n, &u, &dq| ScalarValue { n, u, dq })
    }

    pub fn n(&self) -> &ArrayD<Nominal> {
        &self.n
    }

    pub fn u(&self) -> &ArrayD<Nominal> {
        &self.u
    }

    pub fn dq(&self) -> &ArrayD<QualityFlags> {
        &self.dq
    }

    pub fn into_parts(self) -> (ArrayD<Nominal>, ArrayD<Nominal>, ArrayD<QualityFlags>) {
        (self.n, self.u, self.dq)
    }

    pub fn shape(&self) -> &[usize] {
        self.n.shape()
    }

    /// Number of elements (1 for a scalar)
    pub fn len(&self) -> usize {
        self.n.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n.is_empty()
    }

    pub fn kind(&self) -> ValueKind {
        match self.n.ndim() {
            0 => ValueKind::Scalar,
            1 => ValueKind::Vector,
            _ => ValueKind::Image,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.kind() == ValueKind::Scalar
    }

    /// The single element of a 0-D value
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        if self.is_scalar() {
            self.get(&[])
        } else {
            None
        }
    }

    pub fn get(&self, index: &[usize]) -> Option<ScalarValue> {
        let idx = IxDyn(index);
        Some(ScalarValue {
            n: *self.n.get(idx.clone())?,
            u: *self.u.get(idx.clone())?,
            dq: *self.dq.get(idx)?,
        })
    }

    /// Elements in row-major order
    pub fn iter(&self) -> impl Iterator<Item = ScalarValue> + '_ {
        self.n
            .iter()
            .zip(self.u.iter())
            .zip(self.dq.iter())
            .map(|((&n, &u), &dq)| ScalarValue { n, u, dq })
    }

    /// One [`ScalarValue`] per element, row-major. A scalar gives one item.
    pub fn split(&self) -> Vec<ScalarValue> {
        self.iter().collect()
    }

    /// Union of every element's flags
    pub fn dq_union(&self) -> QualityFlags {
        self.dq.fold(QualityFlags::empty(), |acc, &d| acc | d)
    }

    /// Same shape, every element within [`crate::core::number::APPROX_EPSILON`].
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().zip(other.iter()).all(|(a, b)| a.approx_eq(&b))
    }

    /// Apply `f` to every element.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(ScalarValue) -> ScalarValue + Sync + Send,
    {
        let cells = self.cells();

        if cfg!(feature = "parallel") && cells.len() >= PARALLEL_MIN_ELEMENTS {
            let out = Zip::from(&cells).par_map_collect(|&c| f(c));
            return Self::from_cells(out.view());
        }

        let out = cells.mapv(f);
        Self::from_cells(out.view())
    }

    /// Combine two values element by element.
    ///
    /// Scalars broadcast against anything; arrays must match exactly.
    pub fn zip_with<F>(&self, other: &Value, f: F) -> DqResult<Self>
    where
        F: Fn(ScalarValue, ScalarValue) -> ScalarValue + Sync + Send,
    {
        let shape = match (self.kind(), other.kind()) {
            (ValueKind::Scalar, _) => other.shape().to_vec(),
            (_, ValueKind::Scalar) => self.shape().to_vec(),
            _ if self.shape() == other.shape() => self.shape().to_vec(),
            _ => return Err(DqError::mismatch(self.shape(), other.shape())),
        };

        let lhs = self.cells();
        let rhs = other.cells();
        let dim = IxDyn(&shape);
        let a = lhs
            .broadcast(dim.clone())
            .ok_or_else(|| DqError::mismatch(self.shape(), &shape))?;
        let b = rhs
            .broadcast(dim)
            .ok_or_else(|| DqError::mismatch(other.shape(), &shape))?;

        if cfg!(feature = "parallel") && a.len() >= PARALLEL_MIN_ELEMENTS {
            let out = Zip::from(&a).and(&b).par_map_collect(|&x, &y| f(x, y));
            return Ok(Self::from_cells(out.view()));
        }

        let out = Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y));
        Ok(Self::from_cells(out.view()))
    }

    pub fn unary(&self, op: UnaryOp) -> Self {
        self.map(|v| op.apply(v))
    }

    pub fn binary(&self, op: BinaryOp, other: &Value) -> DqResult<Self> {
        self.zip_with(other, |a, b| op.apply(a, b))
    }

    pub fn add(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Add, other)
    }

    pub fn sub(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Sub, other)
    }

    pub fn mul(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Mul, other)
    }

    pub fn div(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Div, other)
    }

    pub fn pow(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Pow, other)
    }

    pub fn and(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(&self, other: &Value) -> DqResult<Self> {
        self.binary(BinaryOp::Or, other)
    }

    pub fn neg(&self) -> Self {
        self.unary(UnaryOp::Neg)
    }

    pub fn not(&self) -> Self {
        self.unary(UnaryOp::Not)
    }

    pub fn sqrt(&self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn sin(&self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(&self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn tan(&self) -> Self {
        self.unary(UnaryOp::Tan)
    }

    pub fn abs(&self) -> Self {
        self.unary(UnaryOp::Abs)
    }
}

/// Brings a 0-D `u`/`dq` array up to the shape of `n`.
fn conform<T: Clone>(a: ArrayD<T>, n: &ArrayD<Nominal>, what: &str) -> DqResult<ArrayD<T>> {
    if a.shape() == n.shape() {
        return Ok(a);
    }
    if n.ndim() == 0 {
        return Err(DqError::InvalidShape(format!(
            "scalar nominal with {:?} {}",
            a.shape(),
            what
        )));
    }
    if a.ndim() == 0 {
        return a
            .broadcast(n.raw_dim())
            .map(|view| view.to_owned())
            .ok_or_else(|| DqError::mismatch(n.shape(), a.shape()));
    }
    Err(DqError::mismatch(n.shape(), a.shape()))
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Value::from_scalar(v)
    }
}

/// `n±u` with flag letters; arrays render as `[a, b, ...]` in row-major order
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.as_scalar() {
            return write!(f, "{}", v);
        }
        let items: Vec<String> = self.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", items.join(", "))
    }
}
