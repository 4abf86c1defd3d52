//! Value and type system shared by the catalog and the storage engine.
//!
//! Values are null-aware. Comparisons follow three-valued logic: any
//! comparison against NULL yields [`CmpBool::Null`], which predicates
//! treat as "not satisfied". Arithmetic used by aggregation propagates
//! NULL.

mod value;

pub use value::*;

use std::fmt;

/// Identifier of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    Boolean = 1,
    Integer = 2,
    BigInt = 3,
    Varchar = 4,
}

impl TypeId {
    /// Returns whether values of this type have a fixed encoded width.
    #[inline]
    pub fn is_fixed(self) -> bool {
        !matches!(self, TypeId::Varchar)
    }
}

impl From<u8> for TypeId {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            1 => TypeId::Boolean,
            2 => TypeId::Integer,
            3 => TypeId::BigInt,
            4 => TypeId::Varchar,
            _ => unreachable!("invalid type id"),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeId::Boolean => f.pad("BOOLEAN"),
            TypeId::Integer => f.pad("INTEGER"),
            TypeId::BigInt => f.pad("BIGINT"),
            TypeId::Varchar => f.pad("VARCHAR"),
        }
    }
}

/// Result of a three-valued comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpBool {
    False,
    True,
    Null,
}

impl CmpBool {
    /// Returns true only for a definite `True`. NULL collapses to false,
    /// which is the filter-predicate reading.
    #[inline]
    pub fn is_true(self) -> bool {
        matches!(self, CmpBool::True)
    }
}

impl From<bool> for CmpBool {
    #[inline]
    fn from(value: bool) -> Self {
        if value { CmpBool::True } else { CmpBool::False }
    }
}
