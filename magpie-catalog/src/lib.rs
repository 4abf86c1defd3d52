//! Schema metadata shared by the planner-facing surface and the storage
//! engine: columns, schemas and object identifiers.

use magpie_datatype::TypeId;
use std::fmt;
use std::sync::Arc;

/// Identifier of a table within the catalog.
pub type TableOid = u32;
/// Identifier of an index within the catalog.
pub type IndexOid = u32;

/// A single column: name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    type_id: TypeId,
}

impl Column {
    #[inline]
    pub fn new(name: impl Into<String>, type_id: TypeId) -> Self {
        Column {
            name: name.into(),
            type_id,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// An ordered list of columns.
///
/// Schemas are immutable once constructed and shared by reference
/// between plan nodes and executors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Arc<[Column]>,
}

impl Schema {
    #[inline]
    pub fn new(columns: Vec<Column>) -> Self {
        Schema {
            columns: Arc::from(columns.into_boxed_slice()),
        }
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of the named column, if present.
    #[inline]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Projection of this schema onto the given column indexes, in order.
    /// This is how key schemas and partial-tuple schemas are derived.
    pub fn project(&self, attrs: &[usize]) -> Schema {
        let columns = attrs.iter().map(|&i| self.columns[i].clone()).collect();
        Schema::new(columns)
    }

    /// Concatenation of two schemas, used by join outputs.
    pub fn join(left: &Schema, right: &Schema) -> Schema {
        let mut columns = Vec::with_capacity(left.column_count() + right.column_count());
        columns.extend_from_slice(left.columns());
        columns.extend_from_slice(right.columns());
        Schema::new(columns)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", col.name(), col.type_id())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_project() {
        let schema = Schema::new(vec![
            Column::new("a", TypeId::Integer),
            Column::new("b", TypeId::Varchar),
            Column::new("c", TypeId::BigInt),
        ]);
        let proj = schema.project(&[2, 0]);
        assert_eq!(proj.column_count(), 2);
        assert_eq!(proj.column(0).name(), "c");
        assert_eq!(proj.column(1).name(), "a");
        assert_eq!(schema.column_index("b"), Some(1));
        assert_eq!(schema.column_index("z"), None);
    }

    #[test]
    fn test_schema_join() {
        let left = Schema::new(vec![Column::new("l", TypeId::Integer)]);
        let right = Schema::new(vec![Column::new("r", TypeId::Integer)]);
        let joined = Schema::join(&left, &right);
        assert_eq!(joined.column_count(), 2);
        assert_eq!(joined.column(1).name(), "r");
    }
}
