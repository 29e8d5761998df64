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
use std::collections::BTreeSet;

use crate::index::Index;
use crate::schema::{Column, Query};

/// An ordered list of queries plus the name of the database they run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub queries: Vec<Query>,
    pub database_name: String,
}

impl Workload {
    pub fn new(queries: Vec<Query>, database_name: &str) -> Self {
        Self {
            queries,
            database_name: database_name.to_string(),
        }
    }

    /// A workload that consists of a single query of this one.
    pub fn for_query(&self, query: &Query) -> Workload {
        Workload::new(vec![query.clone()], &self.database_name)
    }

    /// Every column referenced by at least one query, deduplicated and sorted.
    pub fn indexable_columns(&self) -> Vec<Column> {
        self.queries.iter().flat_map(|query| query.columns.iter().cloned()).collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// One single-column index per indexable column, sorted.
    pub fn potential_indexes(&self) -> Vec<Index> {
        self.indexable_columns().into_iter().map(Index::single).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
