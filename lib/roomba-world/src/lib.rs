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

#![warn(missing_docs)]

//! Roomba world.
//!
//! A grid of rooms bordered by walls, with trash, obstacles and charging stations, and roombas
//! that clean it while keeping their batteries alive.
//!
//! PEAS - Performance, Environment, Action, Sensing
//!
//! - Performance: how much trash is cleaned, and how fast.
//! - Environment: [`grid::Grid`], driven tick by tick by [`world::World`].
//! - Actuators: move to a neighboring cell, clean, charge.
//! - Sensors: the roomba's own cell and its neighborhood, through [`grid::GridView`].
//!
//! See:
//! -  Chapter 2: Intelligent Agents, page 40
//! -  Chapter 3: Solving Problems by Searching, page 94

pub mod config;
pub mod grid;
pub mod path;
pub mod roomba;
pub mod telemetry;
pub mod world;

pub use config::{ConfigError, SimulationConfig, SimulationMode, MAX_GRID_SIDE};
pub use grid::{Coordinate, EntityKey, Grid, GridError, GridView, Neighborhood, Occupant};
pub use path::{find_path, Distance, Route};
pub use roomba::{Errand, Roomba};
pub use telemetry::{RoombaReport, TelemetrySnapshot};
pub use world::World;

/// Random source. Every run is reproducible from its seed.
pub type Rng = rand_pcg::Pcg64;

/// Hash map used throughout the crate.
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Hash set used throughout the crate.
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
