//! Scalar value with uncertainty and quality flags
//!
//! First-order error propagation for the basic arithmetic operators:
//!
//! - sums and differences add uncertainties in quadrature
//! - products use Goodman's formula (uncorrelated operands)
//! - quotients use the derived form `sqrt((n1*u2)^2 + (n2*u1)^2) / n2^2`
//! - powers use `sqrt(a^(2b-2) * ((a*ub*ln a)^2 + (b*ua)^2))` with `a = |base|`
//!
//! Degenerate cases never panic and never leak NaN: they produce a fixed
//! substitute value and set a quality flag.

use crate::core::dq::QualityFlags;
use crate::types::Nominal;
use approx::{AbsDiffEq, RelativeEq};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Neg, Not, Sub};

/// Tolerance used by [`ScalarValue::approx_eq`]
pub const APPROX_EPSILON: Nominal = 1e-4;

/// Uncertainty given to `0 ** negative`. An arbitrary large placeholder
/// kept for compatibility, not a real bound.
pub const UNDEFINED_UNCERTAINTY: Nominal = 100.0;

/// An immutable (nominal, uncertainty, flags) triple
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalarValue {
    /// Nominal value
    pub n: Nominal,
    /// Uncertainty (standard deviation)
    pub u: Nominal,
    /// Quality flags
    pub dq: QualityFlags,
}

impl ScalarValue {
    /// Explicit nominal and uncertainty, no flags. An explicit `u = 0.0`
    /// does not set NOUNCERTAINTY.
    pub const fn new(n: Nominal, u: Nominal) -> Self {
        Self {
            n,
            u,
            dq: QualityFlags::empty(),
        }
    }

    /// Nominal only: `u = 0` and NOUNCERTAINTY set.
    pub const fn nominal(n: Nominal) -> Self {
        Self {
            n,
            u: 0.0,
            dq: QualityFlags::NOUNCERTAINTY,
        }
    }

    pub const fn with_dq(self, dq: QualityFlags) -> Self {
        Self { dq, ..self }
    }

    /// True if any BAD bit is set
    pub fn is_bad(&self) -> bool {
        self.dq.is_bad()
    }

    /// Tolerant comparison: `n` and `u` within [`APPROX_EPSILON`]
    /// (absolute or relative), flags exactly equal.
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.relative_eq(other, APPROX_EPSILON, APPROX_EPSILON)
    }

    /// `self ** exp`
    pub fn pow(self, exp: Self) -> Self {
        let dq = self.dq | exp.dq;
        let a = self.n.abs();

        if a == 0.0 {
            return if exp.n == 1.0 {
                // d(x^1)/dx = 1, so the base's own uncertainty passes through
                Self { n: 0.0, u: self.u, dq }
            } else if exp.n < 0.0 {
                Self {
                    n: 0.0,
                    u: UNDEFINED_UNCERTAINTY,
                    dq: dq | QualityFlags::UNDEFINED,
                }
            } else {
                Self { n: 0.0, u: 0.0, dq }
            };
        }

        let (n, dq) = if self.n < 0.0 && exp.n.fract() != 0.0 {
            let z = Complex::new(self.n as f64, 0.0).powf(exp.n as f64);
            (z.re, dq | QualityFlags::COMPLEX_RESULT)
        } else {
            ((self.n as f64).powf(exp.n as f64), dq)
        };

        let (a, b) = (a as f64, exp.n as f64);
        let (ua, ub) = (self.u as f64, exp.u as f64);
        let spread = (a * ub * a.ln()).powi(2) + (b * ua).powi(2);
        // exact operands stay exact even when a^(2b-2) overflows
        let u = if spread == 0.0 {
            0.0
        } else {
            (a.powf(2.0 * b - 2.0) * spread).sqrt()
        };

        Self::settle(n, u, dq)
    }

    /// Narrow an f64 result to storage precision, flagging UNDEFINED when it
    /// does not fit. A non-finite nominal gives `0±UNDEFINED_UNCERTAINTY`;
    /// a non-finite uncertainty alone is replaced by [`UNDEFINED_UNCERTAINTY`].
    fn settle(n: f64, u: f64, dq: QualityFlags) -> Self {
        let (n, u) = (n as Nominal, u as Nominal);
        if !n.is_finite() {
            return Self {
                n: 0.0,
                u: UNDEFINED_UNCERTAINTY,
                dq: dq | QualityFlags::UNDEFINED,
            };
        }
        if !u.is_finite() {
            return Self {
                n,
                u: UNDEFINED_UNCERTAINTY,
                dq: dq | QualityFlags::UNDEFINED,
            };
        }
        Self { n, u, dq }
    }

    pub fn sqrt(self) -> Self {
        if self.n < 0.0 {
            Self {
                n: 0.0,
                u: 0.0,
                dq: self.dq | QualityFlags::COMPLEX_RESULT,
            }
        } else if self.n == 0.0 {
            Self { n: 0.0, u: 0.0, dq: self.dq }
        } else {
            let root = self.n.sqrt();
            Self {
                n: root,
                u: self.u / (2.0 * root),
                dq: self.dq,
            }
        }
    }

    pub fn sin(self) -> Self {
        Self {
            n: self.n.sin(),
            u: (self.n.cos() * self.u).abs(),
            dq: self.dq,
        }
    }

    pub fn cos(self) -> Self {
        Self {
            n: self.n.cos(),
            u: (self.n.sin() * self.u).abs(),
            dq: self.dq,
        }
    }

    /// Near a pole (`|cos n| <= f32::EPSILON`) the result follows the
    /// division rule: `(0, 0)` with DIVIDE_BY_ZERO.
    pub fn tan(self) -> Self {
        let c = self.n.cos();
        if c.abs() <= Nominal::EPSILON {
            return Self {
                n: 0.0,
                u: 0.0,
                dq: self.dq | QualityFlags::DIVIDE_BY_ZERO,
            };
        }
        Self {
            n: self.n.sin() / c,
            u: (self.u / (c * c)).abs(),
            dq: self.dq,
        }
    }

    pub fn abs(self) -> Self {
        Self {
            n: self.n.abs(),
            ..self
        }
    }
}

impl Add for ScalarValue {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            n: self.n + rhs.n,
            u: self.u.hypot(rhs.u),
            dq: self.dq | rhs.dq,
        }
    }
}

impl Sub for ScalarValue {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            n: self.n - rhs.n,
            u: self.u.hypot(rhs.u),
            dq: self.dq | rhs.dq,
        }
    }
}

impl Mul for ScalarValue {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            n: self.n * rhs.n,
            u: (self.n * rhs.u).hypot(rhs.n * self.u),
            dq: self.dq | rhs.dq,
        }
    }
}

impl Div for ScalarValue {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let dq = self.dq | rhs.dq;
        if rhs.n == 0.0 {
            return Self {
                n: 0.0,
                u: 0.0,
                dq: dq | QualityFlags::DIVIDE_BY_ZERO,
            };
        }
        let (n1, u1) = (self.n as f64, self.u as f64);
        let (n2, u2) = (rhs.n as f64, rhs.u as f64);
        Self::settle(n1 / n2, (n1 * u2).hypot(n2 * u1) / (n2 * n2), dq)
    }
}

impl Neg for ScalarValue {
    type Output = Self;

    fn neg(self) -> Self {
        Self { n: -self.n, ..self }
    }
}

/// Fuzzy NOT: `1 - n`
impl Not for ScalarValue {
    type Output = Self;

    fn not(self) -> Self {
        Self {
            n: 1.0 - self.n,
            ..self
        }
    }
}

/// Fuzzy AND: the operand with the smaller nominal, whole.
impl BitAnd for ScalarValue {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        if rhs.n < self.n {
            rhs
        } else {
            self
        }
    }
}

/// Fuzzy OR: the operand with the larger nominal, whole.
impl BitOr for ScalarValue {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        if rhs.n > self.n {
            rhs
        } else {
            self
        }
    }
}

impl From<Nominal> for ScalarValue {
    fn from(n: Nominal) -> Self {
        Self::nominal(n)
    }
}

impl AbsDiffEq for ScalarValue {
    type Epsilon = Nominal;

    fn default_epsilon() -> Nominal {
        APPROX_EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Nominal) -> bool {
        self.dq == other.dq
            && self.n.abs_diff_eq(&other.n, epsilon)
            && self.u.abs_diff_eq(&other.u, epsilon)
    }
}

impl RelativeEq for ScalarValue {
    fn default_max_relative() -> Nominal {
        APPROX_EPSILON
    }

    fn relative_eq(&self, other: &Self, epsilon: Nominal, max_relative: Nominal) -> bool {
        self.dq == other.dq
            && self.n.relative_eq(&other.n, epsilon, max_relative)
            && self.u.relative_eq(&other.u, epsilon, max_relative)
    }
}

/// `n±u` followed by flag letters, e.g. `2±0u`
impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}±{}{}", self.n, self.u, self.dq.chars())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(n: Nominal, u: Nominal) -> ScalarValue {
        ScalarValue::new(n, u)
    }

    #[test]
    fn test_add_sub_quadrature() {
        assert_eq!(sv(2.0, 3.0) + sv(7.0, 4.0), sv(9.0, 5.0));
        assert_eq!(sv(2.0, 3.0) - sv(7.0, 4.0), sv(-5.0, 5.0));
    }

    #[test]
    fn test_mul_goodman() {
        let r = sv(2.0, 0.1) * sv(3.0, 0.2);
        assert!(r.approx_eq(&sv(6.0, 0.5)));
    }

    #[test]
    fn test_div() {
        let r = sv(6.0, 1.0) / sv(4.0, 0.2);
        assert!(r.approx_eq(&sv(1.5, 0.261_007_66)));
    }

    #[test]
    fn test_div_by_zero_flags() {
        let r = sv(6.0, 1.0) / sv(0.0, 0.0);
        assert_eq!(r, sv(0.0, 0.0).with_dq(QualityFlags::DIVIDE_BY_ZERO));
        assert!(r.n.is_finite());
    }

    #[test]
    fn test_div_by_tiny_divisor_stays_finite() {
        // the divisor squared underflows in f32
        let r = sv(1.0, 0.0) / sv(1e-25, 0.0);
        assert!((r.n / 1e25 - 1.0).abs() < 1e-5);
        assert_eq!(r.u, 0.0);
        assert!(r.dq.is_empty());

        let r = sv(1.0, 1.0) / sv(1e-25, 0.0);
        assert!((r.u / 1e25 - 1.0).abs() < 1e-5);
        assert!(r.dq.is_empty());
    }

    #[test]
    fn test_div_overflow_flags_undefined() {
        let r = sv(1e30, 0.0) / sv(1e-30, 0.0);
        assert_eq!(r, sv(0.0, UNDEFINED_UNCERTAINTY).with_dq(QualityFlags::UNDEFINED));
    }

    #[test]
    fn test_pow_reference() {
        let r = sv(2.0, 0.1).pow(sv(3.0, 0.2));
        assert!(r.approx_eq(&sv(8.0, 1.634_001_1)));

        let r = sv(3.0, 0.5).pow(sv(0.5, 0.1));
        assert!(r.approx_eq(&sv(1.732_050_8, 0.238_834_26)));
    }

    #[test]
    fn test_pow_zero_base() {
        assert_eq!(sv(0.0, 2.0).pow(sv(1.0, 3.0)), sv(0.0, 2.0));
        assert_eq!(sv(0.0, 2.0).pow(sv(2.0, 3.0)), sv(0.0, 0.0));
        assert_eq!(sv(0.0, 2.0).pow(sv(0.0, 3.0)), sv(0.0, 0.0));

        let r = sv(0.0, 2.0).pow(sv(-1.0, 3.0));
        assert_eq!(r.dq, QualityFlags::UNDEFINED);
        assert_eq!(r.n, 0.0);
        assert_eq!(r.u, UNDEFINED_UNCERTAINTY);
    }

    #[test]
    fn test_pow_exact_operands_stay_exact() {
        let r = sv(10.0, 0.0).pow(sv(3.0, 0.0));
        assert!((r.n - 1000.0).abs() < 1e-3);
        assert_eq!(r.u, 0.0);
        assert!(r.dq.is_empty());
    }

    #[test]
    fn test_pow_overflow_flags_undefined() {
        for (base, exp) in [(1e-30, -10.0), (1e20, 20.0)] {
            let r = sv(base, 0.0).pow(sv(exp, 0.0));
            assert!(r.n.is_finite() && r.u.is_finite());
            assert_eq!(r, sv(0.0, UNDEFINED_UNCERTAINTY).with_dq(QualityFlags::UNDEFINED));
        }

        // finite nominal, uncertainty past f32 range
        let r = sv(1e-20, 1e-19).pow(sv(-1.9, 0.0));
        assert!(r.n.is_finite());
        assert_eq!(r.u, UNDEFINED_UNCERTAINTY);
        assert!(r.dq.contains(QualityFlags::UNDEFINED));
    }

    #[test]
    fn test_pow_complex_result() {
        let r = sv(-2.0, 0.0).pow(sv(0.5, 0.0));
        assert_eq!(r.dq, QualityFlags::COMPLEX_RESULT);
        assert!(r.n.abs() < 1e-6);
        assert!(r.u.is_finite());

        // integer exponents of negative bases stay real
        let r = sv(-2.0, 0.0).pow(sv(3.0, 0.0));
        assert!((r.n + 8.0).abs() < 1e-5);
        assert!(r.dq.is_empty());
    }

    #[test]
    fn test_unary_sign_ops() {
        let v = sv(0.25, 0.1).with_dq(QualityFlags::TEST);
        assert_eq!(-v, sv(-0.25, 0.1).with_dq(QualityFlags::TEST));
        assert_eq!(!v, sv(0.75, 0.1).with_dq(QualityFlags::TEST));
        assert_eq!((-v).abs(), v);
    }

    #[test]
    fn test_fuzzy_and_or_keep_winner() {
        let a = sv(0.2, 0.01).with_dq(QualityFlags::SATURATED);
        let b = sv(0.7, 0.05);
        assert_eq!(a & b, a);
        assert_eq!(b & a, a);
        assert_eq!(a | b, b);
        assert_eq!(b | a, b);
    }

    #[test]
    fn test_sqrt_edge_cases() {
        let r = sv(4.0, 0.4).sqrt();
        assert!(r.approx_eq(&sv(2.0, 0.1)));

        let r = sv(-4.0, 0.4).with_dq(QualityFlags::TEST).sqrt();
        assert_eq!(r.n, 0.0);
        assert_eq!(r.dq, QualityFlags::TEST | QualityFlags::COMPLEX_RESULT);

        assert_eq!(sv(0.0, 1.0).sqrt(), sv(0.0, 0.0));
    }

    #[test]
    fn test_trig() {
        let r = sv(0.0, 0.1).sin();
        assert!(r.approx_eq(&sv(0.0, 0.1)));
        let r = sv(0.0, 0.1).cos();
        assert!(r.approx_eq(&sv(1.0, 0.0)));
        let r = sv(0.0, 0.1).tan();
        assert!(r.approx_eq(&sv(0.0, 0.1)));
    }

    #[test]
    fn test_tan_pole_does_not_blow_up() {
        let r = sv(std::f32::consts::FRAC_PI_2, 0.1).tan();
        assert!(r.n.is_finite());
        assert!(r.u.is_finite());
        assert!(r.dq.contains(QualityFlags::DIVIDE_BY_ZERO));
    }

    #[test]
    fn test_flags_union() {
        let a = sv(1.0, 0.1).with_dq(QualityFlags::SATURATED);
        let b = sv(2.0, 0.1).with_dq(QualityFlags::NOUNCERTAINTY);
        for r in [a + b, a - b, a * b, a / b, a.pow(b)] {
            assert!(r.dq.contains(a.dq | b.dq));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(sv(2.0, 0.5).to_string(), "2±0.5");
        assert_eq!(ScalarValue::nominal(3.0).to_string(), "3±0u");
        let e = sv(1.0, 0.0).with_dq(QualityFlags::ERROR | QualityFlags::NOUNCERTAINTY);
        assert_eq!(e.to_string(), "1±0uE");
    }
}
