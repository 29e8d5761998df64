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

//! Shared entities for DotIndex
//!
//! This crate holds the schema and workload model that index selection operates on:
//! columns, tables, queries, workloads and the `Index` identifier itself. Nothing in
//! here talks to a database; the cost oracle lives in `dotindex-core`.

pub mod error;
pub mod index;
pub mod schema;
pub mod units;
pub mod workload;

pub use error::{SchemaError, SchemaResult};
pub use index::{Index, indexes_by_table};
pub use schema::{Column, Query, Table};
pub use workload::Workload;
