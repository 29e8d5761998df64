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

//! What-If index creation
//!
//! Translates `Index` values into hypothetical indexes of a database session and keeps
//! track of the handles, so that every simulated index can be dropped again.

use dotindex_common::Index;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::connector::{DatabaseConnector, HypotheticalIndex};
use crate::error::{SelectionError, SelectionResult};

#[derive(Debug, Default)]
pub struct WhatIfIndexCreation {
    simulated_indexes: BTreeMap<u32, String>,
    handles: HashMap<Index, HypotheticalIndex>,
    estimated_sizes: HashMap<Index, u64>,
}

impl WhatIfIndexCreation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates `index` in the connector's session.
    ///
    /// With `store_size` the estimated size is requested right away unless it is already
    /// known for this column sequence.
    pub fn simulate_index<C: DatabaseConnector + ?Sized>(&mut self, connector: &mut C, index: &Index, store_size: bool) -> SelectionResult<HypotheticalIndex> {
        if self.handles.contains_key(index) {
            return Err(SelectionError::InvalidState(format!("{index} is already simulated")));
        }

        let handle = connector.simulate_index(index)?;
        debug!("Simulated {} as {}", index, handle.name);
        self.simulated_indexes.insert(handle.oid, handle.name.clone());
        self.handles.insert(index.clone(), handle.clone());

        if store_size {
            self.request_estimated_size(connector, index)?;
        }

        Ok(handle)
    }

    /// Known size of `index`, asking the session for it if the index is simulated but unsized.
    pub fn request_estimated_size<C: DatabaseConnector + ?Sized>(&mut self, connector: &mut C, index: &Index) -> SelectionResult<u64> {
        if let Some(size) = self.estimated_size(index) {
            return Ok(size);
        }

        let oid = self
            .handles
            .get(index)
            .map(|handle| handle.oid)
            .ok_or_else(|| SelectionError::InvalidState(format!("size of {index} requested but it is not simulated")))?;
        let size = connector.estimated_index_size(oid)?;
        self.estimated_sizes.insert(index.clone(), size);
        Ok(size)
    }

    pub fn drop_simulated_index<C: DatabaseConnector + ?Sized>(&mut self, connector: &mut C, index: &Index) -> SelectionResult<()> {
        let handle = self
            .handles
            .remove(index)
            .ok_or_else(|| SelectionError::InvalidState(format!("{index} is not simulated")))?;
        self.simulated_indexes.remove(&handle.oid);
        connector.drop_simulated_index(handle.oid)?;
        Ok(())
    }

    /// Drops every tracked hypothetical index. Bookkeeping is reset even if the connector fails.
    pub fn drop_all_simulated_indexes<C: DatabaseConnector + ?Sized>(&mut self, connector: &mut C) -> SelectionResult<()> {
        let oids: Vec<u32> = std::mem::take(&mut self.simulated_indexes).into_keys().collect();
        self.handles.clear();

        for oid in oids {
            connector.drop_simulated_index(oid)?;
        }
        Ok(())
    }

    /// Size attached to the index value, else the size recorded by an earlier simulation.
    pub fn estimated_size(&self, index: &Index) -> Option<u64> {
        index.estimated_size().or_else(|| self.estimated_sizes.get(index).copied())
    }

    /// The hypothetical name the database uses for `index`, while it is simulated.
    pub fn hypothetical_name(&self, index: &Index) -> Option<&str> {
        self.handles.get(index).map(|handle| handle.name.as_str())
    }

    pub fn is_simulated(&self, index: &Index) -> bool {
        self.handles.contains_key(index)
    }

    pub fn simulated_count(&self) -> usize {
        self.simulated_indexes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorError, MockDatabaseConnector};
    use dotindex_common::{Column, Table};

    fn index() -> Index {
        let mut table = Table::new("TableA");
        Index::single(table.add_column(Column::new("Col0")))
    }

    #[test]
    fn test_simulate_and_drop() {
        let mut connector = MockDatabaseConnector::new();
        connector.expect_simulate_index().times(1).returning(|_| {
            Ok(HypotheticalIndex {
                oid: 7,
                name: "<7>btree_tablea_col0".to_string(),
            })
        });
        connector.expect_estimated_index_size().withf(|oid| *oid == 7).times(1).returning(|_| Ok(16384));
        connector.expect_drop_simulated_index().withf(|oid| *oid == 7).times(1).returning(|_| Ok(()));

        let mut what_if = WhatIfIndexCreation::new();
        let index = index();
        what_if.simulate_index(&mut connector, &index, true).unwrap();

        assert!(what_if.is_simulated(&index));
        assert_eq!(what_if.hypothetical_name(&index), Some("<7>btree_tablea_col0"));
        assert_eq!(what_if.estimated_size(&index), Some(16384));

        what_if.drop_simulated_index(&mut connector, &index).unwrap();
        assert!(!what_if.is_simulated(&index));
        assert_eq!(what_if.simulated_count(), 0);
        assert_eq!(what_if.estimated_size(&index), Some(16384));
    }

    #[test]
    fn test_known_size_is_not_requested_again() {
        let mut connector = MockDatabaseConnector::new();
        connector.expect_simulate_index().times(1).returning(|_| Ok(HypotheticalIndex { oid: 1, name: "a".to_string() }));
        connector.expect_estimated_index_size().never();

        let mut what_if = WhatIfIndexCreation::new();
        what_if.simulate_index(&mut connector, &index().with_estimated_size(8192), true).unwrap();
    }

    #[test]
    fn test_drop_unsimulated_index_is_invalid_state() {
        let mut connector = MockDatabaseConnector::new();
        connector.expect_drop_simulated_index().never();

        let mut what_if = WhatIfIndexCreation::new();
        let result = what_if.drop_simulated_index(&mut connector, &index());
        assert!(matches!(result, Err(SelectionError::InvalidState(_))));
    }

    #[test]
    fn test_drop_all_resets_bookkeeping() {
        let mut connector = MockDatabaseConnector::new();
        let mut next_oid = 0;
        connector.expect_simulate_index().times(2).returning(move |_| {
            next_oid += 1;
            Ok(HypotheticalIndex { oid: next_oid, name: format!("<{next_oid}>") })
        });
        connector.expect_drop_simulated_index().times(2).returning(|_| Ok(()));

        let mut table = Table::new("TableA");
        let columns = table.add_columns([Column::new("Col0"), Column::new("Col1")]);
        let mut what_if = WhatIfIndexCreation::new();
        what_if.simulate_index(&mut connector, &Index::single(columns[0].clone()), false).unwrap();
        what_if.simulate_index(&mut connector, &Index::single(columns[1].clone()), false).unwrap();

        what_if.drop_all_simulated_indexes(&mut connector).unwrap();
        assert_eq!(what_if.simulated_count(), 0);
        what_if.drop_all_simulated_indexes(&mut connector).unwrap();
    }

    #[test]
    fn test_connector_failure_propagates() {
        let mut connector = MockDatabaseConnector::new();
        connector.expect_simulate_index().returning(|_| Err(ConnectorError::SessionClosed));

        let mut what_if = WhatIfIndexCreation::new();
        let result = what_if.simulate_index(&mut connector, &index(), false);
        assert!(matches!(result, Err(SelectionError::Connector(ConnectorError::SessionClosed))));
        assert_eq!(what_if.simulated_count(), 0);
    }
}
