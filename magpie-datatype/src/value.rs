use crate::{CmpBool, TypeId};
use std::cmp::Ordering;
use std::fmt;

/// A single column value.
///
/// `Null` is typeless: it compares as NULL against everything and can be
/// stored in a column of any type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Varchar(String),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type of this value, if it carries one.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(TypeId::Boolean),
            Value::Integer(_) => Some(TypeId::Integer),
            Value::BigInt(_) => Some(TypeId::BigInt),
            Value::Varchar(_) => Some(TypeId::Varchar),
        }
    }

    /// Total order over non-null values of the same type.
    /// Integer and BigInt compare numerically against each other.
    fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
            (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
            (Value::BigInt(l), Value::BigInt(r)) => l.cmp(r),
            (Value::Integer(l), Value::BigInt(r)) => i64::from(*l).cmp(r),
            (Value::BigInt(l), Value::Integer(r)) => l.cmp(&i64::from(*r)),
            (Value::Varchar(l), Value::Varchar(r)) => l.cmp(r),
            (l, r) => unreachable!("incomparable values {l:?} and {r:?}"),
        }
    }

    #[inline]
    fn cmp_null_aware(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.total_cmp(other))
    }

    #[inline]
    pub fn compare_eq(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord == Ordering::Equal),
        }
    }

    #[inline]
    pub fn compare_ne(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord != Ordering::Equal),
        }
    }

    #[inline]
    pub fn compare_lt(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord == Ordering::Less),
        }
    }

    #[inline]
    pub fn compare_le(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord != Ordering::Greater),
        }
    }

    #[inline]
    pub fn compare_gt(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord == Ordering::Greater),
        }
    }

    #[inline]
    pub fn compare_ge(&self, other: &Value) -> CmpBool {
        match self.cmp_null_aware(other) {
            None => CmpBool::Null,
            Some(ord) => CmpBool::from(ord != Ordering::Less),
        }
    }

    /// Addition for SUM/COUNT accumulation. NULL propagates.
    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::Integer(l), Value::Integer(r)) => Value::Integer(l.wrapping_add(*r)),
            (Value::BigInt(l), Value::BigInt(r)) => Value::BigInt(l.wrapping_add(*r)),
            (Value::Integer(l), Value::BigInt(r)) => Value::BigInt(i64::from(*l).wrapping_add(*r)),
            (Value::BigInt(l), Value::Integer(r)) => Value::BigInt(l.wrapping_add(i64::from(*r))),
            (l, r) => unreachable!("cannot add {l:?} and {r:?}"),
        }
    }

    /// MIN accumulation. NULL loses to any non-null value.
    pub fn min(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Null, v) | (v, Value::Null) => v.clone(),
            (l, r) => {
                if l.total_cmp(r) == Ordering::Greater {
                    r.clone()
                } else {
                    l.clone()
                }
            }
        }
    }

    /// MAX accumulation. NULL loses to any non-null value.
    pub fn max(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Null, v) | (v, Value::Null) => v.clone(),
            (l, r) => {
                if l.total_cmp(r) == Ordering::Less {
                    r.clone()
                } else {
                    l.clone()
                }
            }
        }
    }

    /// Encode this value into `out`. The encoding is self-describing so a
    /// partial tuple (projection) can be decoded without padding tricks:
    /// one tag byte, then a fixed-width or length-prefixed payload.
    pub fn encode_to(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(0),
            Value::Boolean(v) => {
                out.push(TypeId::Boolean as u8);
                out.push(u8::from(*v));
            }
            Value::Integer(v) => {
                out.push(TypeId::Integer as u8);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::BigInt(v) => {
                out.push(TypeId::BigInt as u8);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::Varchar(v) => {
                out.push(TypeId::Varchar as u8);
                out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                out.extend_from_slice(v.as_bytes());
            }
        }
    }

    /// Decode one value starting at `idx`. Returns the value and the
    /// index one past its encoding. Fails on truncated input.
    pub fn decode_from(data: &[u8], idx: usize) -> Option<(Value, usize)> {
        let tag = *data.get(idx)?;
        let idx = idx + 1;
        match tag {
            0 => Some((Value::Null, idx)),
            t if t == TypeId::Boolean as u8 => {
                let v = *data.get(idx)?;
                Some((Value::Boolean(v != 0), idx + 1))
            }
            t if t == TypeId::Integer as u8 => {
                let bytes = data.get(idx..idx + 4)?;
                Some((Value::Integer(i32::from_le_bytes(bytes.try_into().ok()?)), idx + 4))
            }
            t if t == TypeId::BigInt as u8 => {
                let bytes = data.get(idx..idx + 8)?;
                Some((Value::BigInt(i64::from_le_bytes(bytes.try_into().ok()?)), idx + 8))
            }
            t if t == TypeId::Varchar as u8 => {
                let len_bytes = data.get(idx..idx + 4)?;
                let len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
                let idx = idx + 4;
                let bytes = data.get(idx..idx + len)?;
                let s = std::str::from_utf8(bytes).ok()?;
                Some((Value::Varchar(s.to_string()), idx + len))
            }
            _ => None,
        }
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Value::BigInt(value)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::Varchar(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.pad("<NULL>"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Varchar(v) => f.pad(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_valued_compare() {
        let one = Value::from(1);
        let two = Value::from(2);
        assert_eq!(one.compare_lt(&two), CmpBool::True);
        assert_eq!(two.compare_lt(&one), CmpBool::False);
        assert_eq!(one.compare_eq(&Value::Null), CmpBool::Null);
        assert_eq!(Value::Null.compare_eq(&Value::Null), CmpBool::Null);
        assert!(!one.compare_eq(&Value::Null).is_true());
    }

    #[test]
    fn test_mixed_width_compare() {
        assert_eq!(Value::from(7).compare_eq(&Value::from(7i64)), CmpBool::True);
        assert_eq!(Value::from(7i64).compare_gt(&Value::from(3)), CmpBool::True);
    }

    #[test]
    fn test_aggregate_arithmetic() {
        let sum = Value::from(3).add(&Value::from(4));
        assert_eq!(sum, Value::from(7));
        assert_eq!(Value::Null.add(&Value::from(1)), Value::Null);
        assert_eq!(Value::Null.min(&Value::from(5)), Value::from(5));
        assert_eq!(Value::from(2).max(&Value::from(5)), Value::from(5));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let values = vec![
            Value::Null,
            Value::from(true),
            Value::from(-17),
            Value::from(1i64 << 40),
            Value::from("magpie"),
        ];
        let mut buf = vec![];
        for v in &values {
            v.encode_to(&mut buf);
        }
        let mut idx = 0;
        for v in &values {
            let (decoded, next) = Value::decode_from(&buf, idx).unwrap();
            assert_eq!(&decoded, v);
            idx = next;
        }
        assert_eq!(idx, buf.len());
    }
}
