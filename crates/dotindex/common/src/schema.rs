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
use std::fmt;

/// A column, identified by its table and its (lower-cased) name.
///
/// The table is a non-owning back reference by name. Columns without a table never
/// compare equal to a column that belongs to one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Column {
    table: Option<String>,
    name: String,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Self {
            table: None,
            name: name.to_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// `table.column`, or just the column name for table-less columns.
    pub fn qualified_name(&self) -> String {
        match &self.table {
            Some(table) => format!("{table}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C {}", self.qualified_name())
    }
}

/// A table owns its columns. Two tables are equal only if they are structurally identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Adds a column and binds it to this table. Returns the bound column.
    pub fn add_column(&mut self, mut column: Column) -> Column {
        column.table = Some(self.name.clone());
        self.columns.push(column.clone());
        column
    }

    pub fn add_columns(&mut self, columns: impl IntoIterator<Item = Column>) -> Vec<Column> {
        columns.into_iter().map(|column| self.add_column(column)).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        let name = name.to_lowercase();
        self.columns.iter().find(|column| column.name == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A workload query together with the columns it references.
///
/// The referenced columns are computed once when the workload is generated, so they are
/// treated as given data here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub nr: u32,
    pub text: String,
    pub columns: Vec<Column>,
}

impl Query {
    pub fn new(nr: u32, text: &str, columns: Vec<Column>) -> Self {
        Self {
            nr,
            text: text.to_lowercase(),
            columns,
        }
    }

    pub fn references(&self, column: &Column) -> bool {
        self.columns.contains(column)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.nr)
    }
}
