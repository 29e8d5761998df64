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

//! Reference points for comparing the real algorithms: no indexes at all, and one
//! single-column index per indexable column.

use dotindex_common::{Index, Workload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{AlgorithmBase, SelectionAlgorithm};
use crate::connector::DatabaseConnector;
use crate::cost_evaluation::CostStatistics;
use crate::error::SelectionResult;

/// Neither baseline takes parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineConfig {}

pub struct NoIndexAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
}

impl<'a, C: DatabaseConnector + ?Sized> NoIndexAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, _config: BaselineConfig) -> SelectionResult<Self> {
        Ok(Self {
            base: AlgorithmBase::new("no_index", connector)?,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for NoIndexAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        self.base.run(workload, |_| Ok(BTreeSet::new()))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}

pub struct AllIndexesAlgorithm<'a, C: DatabaseConnector + ?Sized> {
    base: AlgorithmBase<'a, C>,
}

impl<'a, C: DatabaseConnector + ?Sized> AllIndexesAlgorithm<'a, C> {
    pub fn new(connector: &'a mut C, _config: BaselineConfig) -> SelectionResult<Self> {
        Ok(Self {
            base: AlgorithmBase::new("all_indexes", connector)?,
        })
    }
}

impl<C: DatabaseConnector + ?Sized> SelectionAlgorithm for AllIndexesAlgorithm<'_, C> {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn calculate_best_indexes(&mut self, workload: &Workload) -> SelectionResult<BTreeSet<Index>> {
        self.base.run(workload, |_| Ok(workload.potential_indexes().into_iter().collect()))
    }

    fn cost_statistics(&self) -> CostStatistics {
        self.base.statistics()
    }
}
