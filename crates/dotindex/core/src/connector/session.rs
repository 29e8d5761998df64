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

use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

use super::{ConnectorResult, DatabaseConnector};

/// Owns a connector for the duration of a run and closes it on every exit path.
///
/// Prefer `close()` to observe the result; dropping an open session closes it and
/// only logs a failure.
pub struct Session<C: DatabaseConnector> {
    connector: C,
    closed: bool,
}

impl<C: DatabaseConnector> Session<C> {
    pub fn open(connector: C) -> Self {
        debug!("Database session opened");
        Self { connector, closed: false }
    }

    pub fn close(mut self) -> ConnectorResult<()> {
        self.closed = true;
        self.connector.close()?;
        debug!("Database session closed");
        Ok(())
    }
}

impl<C: DatabaseConnector> Deref for Session<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connector
    }
}

impl<C: DatabaseConnector> DerefMut for Session<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connector
    }
}

impl<C: DatabaseConnector> Drop for Session<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.connector.close() {
            warn!("Failed to close database session: {}", e);
        }
    }
}
