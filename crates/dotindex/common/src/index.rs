// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{SchemaError, SchemaResult};
use crate::schema::Column;

/// An (ordered) sequence of columns on one table.
///
/// Identity is the column sequence: equality, hashing and ordering ignore the estimated
/// size, which is only a cached annotation. Column order is significant because the
/// leading column decides whether an index is usable for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawIndex")]
pub struct Index {
    columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_size: Option<u64>,
}

#[derive(Deserialize)]
struct RawIndex {
    columns: Vec<Column>,
    #[serde(default)]
    estimated_size: Option<u64>,
}

impl TryFrom<RawIndex> for Index {
    type Error = SchemaError;

    fn try_from(raw: RawIndex) -> Result<Self, Self::Error> {
        let index = Index::new(raw.columns)?;
        Ok(match raw.estimated_size {
            Some(size) => index.with_estimated_size(size),
            None => index,
        })
    }
}

impl Index {
    pub fn new(columns: Vec<Column>) -> SchemaResult<Self> {
        let first = columns.first().ok_or(SchemaError::EmptyIndex)?;
        if let Some(other) = columns.iter().find(|column| column.table() != first.table()) {
            return Err(SchemaError::MixedTables {
                first: first.table().unwrap_or_default().to_string(),
                other: other.table().unwrap_or_default().to_string(),
            });
        }

        Ok(Self { columns, estimated_size: None })
    }

    pub fn single(column: Column) -> Self {
        Self {
            columns: vec![column],
            estimated_size: None,
        }
    }

    pub fn with_estimated_size(mut self, bytes: u64) -> Self {
        self.estimated_size = Some(bytes);
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn leading_column(&self) -> &Column {
        &self.columns[0]
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_single_column(&self) -> bool {
        self.columns.len() == 1
    }

    /// The table of the leading column; all columns share it.
    pub fn table(&self) -> Option<&str> {
        self.leading_column().table()
    }

    /// Estimated size in bytes, if it was attached to this value.
    pub fn estimated_size(&self) -> Option<u64> {
        self.estimated_size
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.columns.contains(column)
    }

    /// True iff `other` is a single-column index on the same table whose column is not
    /// part of this index yet.
    pub fn appendable_by(&self, other: &Index) -> bool {
        other.is_single_column() && self.table() == other.table() && !self.contains(other.leading_column())
    }

    /// True iff the columns of `other` are a prefix of this index's columns.
    pub fn subsumes(&self, other: &Index) -> bool {
        self.columns.starts_with(&other.columns)
    }

    /// A new index with `column` appended.
    pub fn appended(&self, column: Column) -> SchemaResult<Index> {
        let mut columns = self.columns.clone();
        columns.push(column);
        Index::new(columns)
    }

    /// The index over the first `width` columns, if that is a non-empty proper prefix.
    pub fn prefix(&self, width: usize) -> Option<Index> {
        if width == 0 || width >= self.columns.len() {
            return None;
        }
        Some(Self {
            columns: self.columns[..width].to_vec(),
            estimated_size: None,
        })
    }

    /// Name used when the index is created for real, e.g. `tablea_col0_col1_idx`.
    pub fn idx_name(&self) -> String {
        let columns = self.columns.iter().map(Column::name).collect::<Vec<_>>().join("_");
        match self.table() {
            Some(table) => format!("{table}_{columns}_idx"),
            None => format!("{columns}_idx"),
        }
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.columns.hash(state);
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.columns.len().cmp(&other.columns.len()).then_with(|| self.columns.cmp(&other.columns))
    }
}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.columns.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        write!(f, "I({columns})")
    }
}

/// Groups indexes by the table they are defined on, keeping the input order per table.
pub fn indexes_by_table<'a>(indexes: impl IntoIterator<Item = &'a Index>) -> BTreeMap<Option<String>, Vec<Index>> {
    let mut by_table: BTreeMap<Option<String>, Vec<Index>> = BTreeMap::new();
    for index in indexes {
        by_table.entry(index.table().map(str::to_string)).or_default().push(index.clone());
    }
    by_table
}
