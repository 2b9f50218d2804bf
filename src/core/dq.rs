//! Data quality (DQ) flags
//!
//! A fixed catalogue of 16-bit quality markers attached to every nominal
//! value. Flags are never cleared by arithmetic: the result of an operation
//! carries the union of its operands' flags plus anything the operation
//! itself raised.

use crate::types::{DqBits, DqError, DqResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

bitflags::bitflags! {
    /// Per-element quality flags.
    ///
    /// Bits 7..=14 are reserved for future flags; they survive
    /// serialization untouched but have no name.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QualityFlags: DqBits {
        /// No data at this element
        const NODATA = 1 << 0;
        /// Uncertainty was never supplied (u is a placeholder zero)
        const NOUNCERTAINTY = 1 << 1;
        /// Sensor saturation
        const SATURATED = 1 << 2;
        /// Generic error raised by a processing step
        const ERROR = 1 << 3;
        /// Result came out of a division by zero
        const DIVIDE_BY_ZERO = 1 << 4;
        /// Mathematically undefined result (e.g. 0 to a negative power)
        const UNDEFINED = 1 << 5;
        /// True result is complex; only the real part is stored
        const COMPLEX_RESULT = 1 << 6;
        /// Reserved for test code
        const TEST = 1 << 15;
    }
}

impl QualityFlags {
    /// Elements carrying any of these bits are left out of aggregate statistics.
    pub const BAD: Self = Self::NODATA
        .union(Self::SATURATED)
        .union(Self::DIVIDE_BY_ZERO)
        .union(Self::UNDEFINED)
        .union(Self::COMPLEX_RESULT);
}

/// One catalogue entry
#[derive(Debug, Clone, Copy)]
pub struct FlagInfo {
    pub flag: QualityFlags,
    /// Short lower-case name used in serialized text
    pub name: &'static str,
    /// Constant name
    pub ident: &'static str,
    /// Single-letter code appended to rendered values
    pub letter: char,
    pub description: &'static str,
}

/// Every named flag, in increasing bit order.
pub const CATALOGUE: [FlagInfo; 8] = [
    FlagInfo {
        flag: QualityFlags::NODATA,
        name: "nodata",
        ident: "NODATA",
        letter: 'N',
        description: "no data",
    },
    FlagInfo {
        flag: QualityFlags::NOUNCERTAINTY,
        name: "nounc",
        ident: "NOUNCERTAINTY",
        letter: 'u',
        description: "no uncertainty supplied",
    },
    FlagInfo {
        flag: QualityFlags::SATURATED,
        name: "sat",
        ident: "SATURATED",
        letter: 'S',
        description: "saturated",
    },
    FlagInfo {
        flag: QualityFlags::ERROR,
        name: "err",
        ident: "ERROR",
        letter: 'E',
        description: "processing error",
    },
    FlagInfo {
        flag: QualityFlags::DIVIDE_BY_ZERO,
        name: "divzero",
        ident: "DIVIDE_BY_ZERO",
        letter: 'Z',
        description: "division by zero",
    },
    FlagInfo {
        flag: QualityFlags::UNDEFINED,
        name: "undef",
        ident: "UNDEFINED",
        letter: 'U',
        description: "undefined result",
    },
    FlagInfo {
        flag: QualityFlags::COMPLEX_RESULT,
        name: "complex",
        ident: "COMPLEX_RESULT",
        letter: 'C',
        description: "complex result",
    },
    FlagInfo {
        flag: QualityFlags::TEST,
        name: "test",
        ident: "TEST",
        letter: 'T',
        description: "test flag",
    },
];

/// Look up a single flag by short name or constant name (case-insensitive).
pub fn flag(name: &str) -> DqResult<QualityFlags> {
    let wanted = name.trim();
    CATALOGUE
        .iter()
        .find(|info| {
            info.name.eq_ignore_ascii_case(wanted) || info.ident.eq_ignore_ascii_case(wanted)
        })
        .map(|info| info.flag)
        .ok_or_else(|| DqError::UnknownFlag(name.to_string()))
}

/// Catalogue entries for every named bit set in `mask`, in bit order.
pub fn info(mask: QualityFlags) -> impl Iterator<Item = &'static FlagInfo> {
    CATALOGUE.iter().filter(move |info| mask.contains(info.flag))
}

/// Names of the set bits, in increasing bit order.
pub fn names(mask: QualityFlags) -> Vec<&'static str> {
    info(mask).map(|info| info.name).collect()
}

impl QualityFlags {
    /// Look up a single flag by name.
    pub fn flag(name: &str) -> DqResult<Self> {
        flag(name)
    }

    /// Names of the set bits, in increasing bit order.
    pub fn names(self) -> Vec<&'static str> {
        names(self)
    }

    /// Letter codes for the set bits (e.g. `"uZ"`).
    pub fn chars(self) -> String {
        info(self).map(|info| info.letter).collect()
    }

    /// `"nodata|sat"`, or `"none"` for the empty set.
    pub fn describe(self) -> String {
        if self.is_empty() {
            "none".to_string()
        } else {
            names(self).join("|")
        }
    }

    /// True if any BAD bit is set.
    pub fn is_bad(self) -> bool {
        self.intersects(Self::BAD)
    }

    /// Decode a raw flag word, keeping reserved bits.
    pub fn from_raw(bits: DqBits) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Parses `"nodata|sat"`-style text. `"none"` and the empty string give no flags.
impl FromStr for QualityFlags {
    type Err = DqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::empty());
        }
        s.split('|')
            .try_fold(Self::empty(), |acc, part| Ok(acc | flag(part)?))
    }
}

// Serialized as the raw word so reserved bits round-trip exactly.
impl Serialize for QualityFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for QualityFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DqBits::deserialize(deserializer).map(Self::from_bits_retain)
    }
}
