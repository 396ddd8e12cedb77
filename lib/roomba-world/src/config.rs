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

//! Run parameters and their validation.

use serde::{Deserialize, Serialize};

use crate::grid::GridError;

/// Largest accepted width or height, border included.
pub const MAX_GRID_SIDE: i32 = 4096;

/// Configuration or setup error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The border takes the outer ring, so anything smaller has no room inside.
    #[error("grid must be at least 3x3, got {width}x{height}")]
    GridTooSmall {
        /// Requested width.
        width: i32,

        /// Requested height.
        height: i32,
    },

    /// Either side exceeds [`MAX_GRID_SIDE`].
    #[error("grid must be at most {max}x{max}, got {width}x{height}", max = MAX_GRID_SIDE)]
    GridTooLarge {
        /// Requested width.
        width: i32,

        /// Requested height.
        height: i32,
    },

    /// A percentage is not a fraction in `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    PercentageOutOfRange {
        /// Parameter name.
        name: &'static str,

        /// Offending value.
        value: f64,
    },

    /// Multi-agent mode with zero agents.
    #[error("multi-agent mode needs at least one agent")]
    NoAgents,

    /// A run must be allowed at least one tick.
    #[error("max_steps must be at least 1")]
    NoSteps,

    /// Setup tried to place something the grid rejected.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// How roombas and stations are laid out at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// One roomba sharing a cell with its station at (1, 1).
    SingleAgent,

    /// `num_agents` roombas, each with its own station on a random empty cell.
    MultiAgent,
}

/// Named parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Agent layout.
    pub mode: SimulationMode,

    /// Number of roombas. Only used in multi-agent mode.
    pub num_agents: usize,

    /// Grid width, including the border.
    pub width: i32,

    /// Grid height, including the border.
    pub height: i32,

    /// Seed of the world's random source.
    pub seed: u64,

    /// The run stops after this many ticks even if trash is left.
    pub max_steps: u64,

    /// Fraction of all cells that start with trash.
    pub dirty_percentage: f64,

    /// Fraction of all cells that receive an extra obstacle, on top of the border.
    pub obstacle_percentage: f64,
}

impl SimulationConfig {
    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 3 || self.height < 3 {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_GRID_SIDE || self.height > MAX_GRID_SIDE {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        for (name, value) in [
            ("dirty_percentage", self.dirty_percentage),
            ("obstacle_percentage", self.obstacle_percentage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::PercentageOutOfRange { name, value });
            }
        }
        if self.mode == SimulationMode::MultiAgent && self.num_agents == 0 {
            return Err(ConfigError::NoAgents);
        }
        if self.max_steps == 0 {
            return Err(ConfigError::NoSteps);
        }
        Ok(())
    }

    /// Number of roombas setup will try to create.
    pub fn agent_count(&self) -> usize {
        match self.mode {
            SimulationMode::SingleAgent => 1,
            SimulationMode::MultiAgent => self.num_agents,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::SingleAgent,
            num_agents: 1,
            width: 8,
            height: 8,
            seed: 42,
            max_steps: 1000,
            dirty_percentage: 0.2,
            obstacle_percentage: 0.1,
        }
    }
}
