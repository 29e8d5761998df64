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

//! Unit conversions used for budgets and reporting.
//!
//! Storage units are decimal (1 MB = 1000 * 1000 bytes) to match how budgets are configured.

pub fn b_to_mb(bytes: f64) -> f64 {
    bytes / 1000.0 / 1000.0
}

pub fn mb_to_b(megabytes: f64) -> f64 {
    megabytes * 1000.0 * 1000.0
}
