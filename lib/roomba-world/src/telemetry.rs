/*
 * Copyright (C) 2023 Asim Ihsan
 * SPDX-License-Identifier: AGPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU Affero General Public License as published by the Free
 * Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
 * PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>
 */

//! Read-only measurements for whoever plots or records a run.

use serde::{Deserialize, Serialize};

use crate::grid::{Coordinate, EntityKey};

/// World-level measurements after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Ticks completed.
    pub tick: u64,

    /// Trash still on the grid.
    pub trash: usize,

    /// Trash placed at setup.
    pub initial_trash: usize,

    /// Share of the initial trash cleaned, in percent. 100 when there was none.
    pub clean_percentage: f64,

    /// Roombas still alive.
    pub roombas: usize,

    /// Mean battery level of live roombas, 0 when none are left.
    pub average_energy: f64,

    /// Sum of battery levels of live roombas.
    pub total_energy: u64,

    /// Moves made by live roombas.
    pub total_moves: u64,

    /// Trash cleaned by live roombas.
    pub total_cleaned: u64,

    /// Tick at which the last trash was cleaned.
    pub all_clean_tick: Option<u64>,
}

/// Per-roomba measurements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoombaReport {
    /// Grid entity of the roomba.
    pub key: EntityKey,

    /// Where it stands.
    pub cell: Coordinate,

    /// Battery level.
    pub energy: u32,

    /// Moves made.
    pub moves_count: u64,

    /// Trash cleaned.
    pub cleaned_count: u64,
}

pub(crate) fn clean_percentage(initial_trash: usize, trash: usize) -> f64 {
    if initial_trash == 0 {
        return 100.0;
    }
    (initial_trash.saturating_sub(trash)) as f64 / initial_trash as f64 * 100.0
}
