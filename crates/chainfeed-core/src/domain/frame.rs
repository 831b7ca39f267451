use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ValidationError;

/// Schema-agnostic tabular payload returned by every provider fetch.
///
/// A frame is an ordered set of column names plus rows of JSON cells.
/// Every row has exactly one cell per column; construction enforces this
/// so downstream consumers never see ragged tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ValidationError> {
        if columns.is_empty() {
            return Err(ValidationError::EmptyFrameSchema);
        }
        for (index, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyColumnName { index });
            }
            if columns[..index].contains(name) {
                return Err(ValidationError::DuplicateColumn { name: name.clone() });
            }
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(ValidationError::RowWidthMismatch {
                    row,
                    expected: columns.len(),
                    found: cells.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Result<Self, ValidationError> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Two frames are compatible when they carry the same column set,
    /// regardless of column order.
    pub fn compatible_with(&self, other: &Frame) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .all(|column| other.column_index(column).is_some())
    }

    /// Appends another frame's rows, remapping its cells into this
    /// frame's column order. Fails when schemas are incompatible.
    pub fn vstack(&mut self, other: &Frame) -> Result<(), ValidationError> {
        if !self.compatible_with(other) {
            return Err(ValidationError::SchemaMismatch);
        }

        let mapping = self
            .columns
            .iter()
            .map(|column| {
                other
                    .column_index(column)
                    .expect("compatible frames share every column")
            })
            .collect::<Vec<_>>();

        for row in other.rows() {
            self.rows
                .push(mapping.iter().map(|&index| row[index].clone()).collect());
        }
        Ok(())
    }

    /// Returns a copy with `source` and `dataset` lineage columns
    /// prepended, so consolidated datasets stay attributable.
    pub fn with_lineage(&self, source: &str, dataset: &str) -> Result<Frame, ValidationError> {
        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        columns.push(String::from("source"));
        columns.push(String::from("dataset"));
        columns.extend(self.columns.iter().cloned());

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = Vec::with_capacity(row.len() + 2);
                cells.push(Value::String(source.to_owned()));
                cells.push(Value::String(dataset.to_owned()));
                cells.extend(row.iter().cloned());
                cells
            })
            .collect();

        Frame::new(columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(columns: &[&str], rows: Vec<Vec<Value>>) -> Frame {
        Frame::new(columns.iter().map(|c| (*c).to_owned()).collect(), rows).expect("valid frame")
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Frame::new(
            vec![String::from("a"), String::from("b")],
            vec![vec![json!(1)]],
        )
        .expect_err("must fail");
        assert!(matches!(err, ValidationError::RowWidthMismatch { .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Frame::new(vec![String::from("a"), String::from("a")], Vec::new())
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::DuplicateColumn { .. }));
    }

    #[test]
    fn compatibility_is_order_insensitive() {
        let left = sample(&["a", "b"], vec![vec![json!(1), json!(2)]]);
        let right = sample(&["b", "a"], vec![vec![json!(3), json!(4)]]);
        assert!(left.compatible_with(&right));
    }

    #[test]
    fn vstack_remaps_columns() {
        let mut left = sample(&["a", "b"], vec![vec![json!(1), json!(2)]]);
        let right = sample(&["b", "a"], vec![vec![json!(3), json!(4)]]);

        left.vstack(&right).expect("compatible frames stack");
        assert_eq!(left.row_count(), 2);
        assert_eq!(left.rows()[1], vec![json!(4), json!(3)]);
    }

    #[test]
    fn vstack_rejects_incompatible_schema() {
        let mut left = sample(&["a"], vec![vec![json!(1)]]);
        let right = sample(&["z"], vec![vec![json!(2)]]);
        let err = left.vstack(&right).expect_err("must fail");
        assert!(matches!(err, ValidationError::SchemaMismatch));
        assert_eq!(left.row_count(), 1);
    }

    #[test]
    fn lineage_prepends_source_and_dataset() {
        let frame = sample(&["v"], vec![vec![json!(9)]]);
        let tagged = frame.with_lineage("dune", "bot_volume").expect("valid");

        assert_eq!(tagged.columns(), ["source", "dataset", "v"]);
        assert_eq!(
            tagged.rows()[0],
            vec![json!("dune"), json!("bot_volume"), json!(9)]
        );
    }
}
