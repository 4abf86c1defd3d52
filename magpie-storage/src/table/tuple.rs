use crate::buffer::page::PageId;
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::fmt;

/// Record identifier: page id plus slot number within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u16,
}

impl Rid {
    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Rid { page_id, slot }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.page_id, self.slot)
    }
}

/// Per-tuple metadata stored in the slot descriptor.
///
/// `ts` is the commit timestamp of the version, or the writing
/// transaction's temporary timestamp while uncommitted. Occupies
/// exactly 16 bytes on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    pub ts: i64,
    pub is_deleted: bool,
}

impl TupleMeta {
    #[inline]
    pub fn new(ts: i64, is_deleted: bool) -> Self {
        TupleMeta { ts, is_deleted }
    }
}

/// A variable-length record: column values in schema order, encoded as
/// a self-describing byte sequence.
///
/// The same representation carries full tuples and the partial tuples
/// stored in undo logs (whose schema is the projection of the base
/// schema onto the modified columns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    data: Vec<u8>,
}

impl Tuple {
    /// Builds a tuple from values. The value count must match the
    /// schema.
    pub fn from_values(schema: &Schema, values: &[Value]) -> Tuple {
        debug_assert_eq!(schema.column_count(), values.len());
        let mut data = vec![];
        for value in values {
            value.encode_to(&mut data);
        }
        Tuple { data }
    }

    #[inline]
    pub fn from_bytes(data: Vec<u8>) -> Tuple {
        Tuple { data }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the value of the `idx`-th column.
    pub fn value(&self, schema: &Schema, idx: usize) -> Value {
        debug_assert!(idx < schema.column_count());
        let mut pos = 0;
        for _ in 0..idx {
            let (_, next) = Value::decode_from(&self.data, pos).expect("corrupt tuple");
            pos = next;
        }
        Value::decode_from(&self.data, pos).expect("corrupt tuple").0
    }

    /// Decodes all column values in schema order.
    pub fn values(&self, schema: &Schema) -> Vec<Value> {
        let mut out = Vec::with_capacity(schema.column_count());
        let mut pos = 0;
        for _ in 0..schema.column_count() {
            let (value, next) = Value::decode_from(&self.data, pos).expect("corrupt tuple");
            out.push(value);
            pos = next;
        }
        out
    }

    /// Projects this tuple onto `key_attrs`, producing the key tuple an
    /// index stores.
    pub fn key_tuple(&self, schema: &Schema, key_schema: &Schema, key_attrs: &[usize]) -> Tuple {
        debug_assert_eq!(key_schema.column_count(), key_attrs.len());
        let values = self.values(schema);
        let key_values: Vec<Value> = key_attrs.iter().map(|&i| values[i].clone()).collect();
        Tuple::from_values(key_schema, &key_values)
    }
}
