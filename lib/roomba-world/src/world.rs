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

//! The world a simulation runs in, and the tick scheduler.

use std::cell::{Ref, RefCell};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimulationConfig, SimulationMode};
use crate::grid::{
    Coordinate, EntityKey, Grid, GridError, Neighborhood, Occupant, OccupantKind,
};
use crate::roomba::{Roomba, Roombas, StepContext, MAX_ENERGY};
use crate::telemetry::{clean_percentage, RoombaReport, TelemetrySnapshot};
use crate::Rng;

/// The roomba world: the grid, the roomba controllers, and the tick loop that drives them.
///
/// Every tick, each live roomba steps exactly once, in an order shuffled from the world's seeded
/// random source. The run stops once all trash is cleaned or the tick limit is reached.
pub struct World {
    grid: Grid,
    roombas: Roombas,
    rng: Rng,
    tick: u64,
    max_steps: u64,
    initial_trash: usize,
    all_clean_tick: Option<u64>,
    running: bool,
}

impl World {
    /// Build the world described by `config`: a bordered 8-connected grid, stations and
    /// roombas per the simulation mode, then trash, then extra obstacles.
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = Grid::new(config.width, config.height, Neighborhood::Moore, false);
        let mut world = World::with_grid(grid, config.seed, config.max_steps);

        for cell in world.grid.border_cells() {
            world.add_obstacle(cell)?;
        }

        match config.mode {
            SimulationMode::SingleAgent => {
                let cell = Coordinate::new(1, 1);
                let station = world.add_station(cell)?;
                world.add_roomba(cell, MAX_ENERGY, Some(station))?;
            }
            SimulationMode::MultiAgent => {
                for placed in 0..config.num_agents {
                    let Some(cell) = world.grid.random_empty_cell(&mut world.rng) else {
                        warn!(placed, requested = config.num_agents, "no empty cell left for roomba");
                        break;
                    };
                    let station = world.add_station(cell)?;
                    world.add_roomba(cell, MAX_ENERGY, Some(station))?;
                }
            }
        }

        let area = f64::from(config.width) * f64::from(config.height);
        let trash = (area * config.dirty_percentage).floor() as usize;
        for _ in 0..trash {
            let Some(cell) = world.grid.random_empty_cell(&mut world.rng) else {
                break;
            };
            world.add_trash(cell)?;
        }

        let obstacles = (area * config.obstacle_percentage).floor() as usize;
        for _ in 0..obstacles {
            let Some(cell) = world.grid.random_empty_cell(&mut world.rng) else {
                break;
            };
            world.add_obstacle(cell)?;
        }

        info!(
            width = config.width,
            height = config.height,
            roombas = world.live_roombas(),
            trash = world.initial_trash,
            seed = config.seed,
            "world ready"
        );
        Ok(world)
    }

    /// An otherwise empty world on a prepared grid. Use the `add_*` methods to populate it.
    pub fn with_grid(grid: Grid, seed: u64, max_steps: u64) -> Self {
        Self {
            grid,
            roombas: Roombas::new(),
            rng: Rng::seed_from_u64(seed),
            tick: 0,
            max_steps,
            initial_trash: 0,
            all_clean_tick: None,
            running: true,
        }
    }

    /// Place an obstacle.
    pub fn add_obstacle(&mut self, cell: Coordinate) -> Result<EntityKey, GridError> {
        self.grid.place(cell, Occupant::Obstacle)
    }

    /// Place a charging station.
    pub fn add_station(&mut self, cell: Coordinate) -> Result<EntityKey, GridError> {
        self.grid.place(cell, Occupant::Station)
    }

    /// Place a piece of dirty trash. It counts towards the initial trash.
    pub fn add_trash(&mut self, cell: Coordinate) -> Result<EntityKey, GridError> {
        let key = self.grid.place(cell, Occupant::trash())?;
        self.initial_trash += 1;
        Ok(key)
    }

    /// Place a roomba homed at `home_station`.
    pub fn add_roomba(
        &mut self,
        cell: Coordinate,
        energy: u32,
        home_station: Option<EntityKey>,
    ) -> Result<EntityKey, GridError> {
        let roomba = Roomba::spawn(&mut self.grid, cell, energy, home_station)?;
        let key = roomba.key();
        self.roombas.insert(key, RefCell::new(roomba));
        Ok(key)
    }

    /// The grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// A live roomba.
    pub fn roomba(&self, key: EntityKey) -> Option<Ref<'_, Roomba>> {
        self.roombas.get(key).map(|roomba| roomba.borrow())
    }

    /// Keys of all live roombas.
    pub fn roomba_keys(&self) -> Vec<EntityKey> {
        self.roombas.keys().collect()
    }

    /// Advance one tick. Does nothing once the run has stopped.
    pub fn step(&mut self) -> Result<(), GridError> {
        if !self.running {
            return Ok(());
        }

        let mut order = self.roomba_keys();
        order.shuffle(&mut self.rng);
        for key in order {
            self.step_roomba(key)?;
        }
        self.tick += 1;

        let trash = self.trash_count();
        debug!(tick = self.tick, trash, roombas = self.live_roombas(), "tick complete");
        if trash == 0 {
            if self.all_clean_tick.is_none() {
                self.all_clean_tick = Some(self.tick);
                info!(tick = self.tick, "all trash cleaned");
            }
            self.running = false;
        }
        if self.tick >= self.max_steps {
            self.running = false;
        }
        Ok(())
    }

    /// Let a single roomba act, outside the regular tick order. A roomba that dies is
    /// dropped and never stepped again.
    pub fn step_roomba(&mut self, key: EntityKey) -> Result<(), GridError> {
        let Some(roomba) = self.roombas.get(key) else {
            return Ok(());
        };
        let alive = {
            let mut roomba = roomba.borrow_mut();
            let mut ctx = StepContext {
                grid: &mut self.grid,
                peers: &self.roombas,
                rng: &mut self.rng,
            };
            roomba.step(&mut ctx)?;
            roomba.is_alive()
        };
        if !alive {
            self.roombas.remove(key);
        }
        Ok(())
    }

    /// Step until the run stops, then return the final measurements.
    pub fn run(&mut self) -> Result<TelemetrySnapshot, GridError> {
        self.run_with(|_| {})
    }

    /// Like [`World::run`], handing a snapshot to `observer` after every tick.
    pub fn run_with<F>(&mut self, mut observer: F) -> Result<TelemetrySnapshot, GridError>
    where
        F: FnMut(&TelemetrySnapshot),
    {
        while self.running {
            self.step()?;
            observer(&self.snapshot());
        }
        Ok(self.snapshot())
    }

    /// Whether another tick will do anything.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ticks completed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Tick at which the last trash was cleaned, if it was.
    pub fn all_clean_tick(&self) -> Option<u64> {
        self.all_clean_tick
    }

    /// Trash placed at setup.
    pub fn initial_trash(&self) -> usize {
        self.initial_trash
    }

    /// Trash still on the grid.
    pub fn trash_count(&self) -> usize {
        self.grid.count(OccupantKind::Trash)
    }

    /// Roombas still alive.
    pub fn live_roombas(&self) -> usize {
        self.roombas.len()
    }

    /// Mean battery level of live roombas, 0 when none are left.
    pub fn average_energy(&self) -> f64 {
        if self.roombas.is_empty() {
            return 0.0;
        }
        self.total_energy() as f64 / self.roombas.len() as f64
    }

    fn total_energy(&self) -> u64 {
        self.roombas
            .values()
            .map(|roomba| u64::from(roomba.borrow().energy()))
            .sum()
    }

    /// World-level measurements.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let trash = self.trash_count();
        let (total_moves, total_cleaned) =
            self.roombas.values().fold((0, 0), |(moves, cleaned), roomba| {
                let roomba = roomba.borrow();
                (moves + roomba.moves_count(), cleaned + roomba.cleaned_count())
            });
        TelemetrySnapshot {
            tick: self.tick,
            trash,
            initial_trash: self.initial_trash,
            clean_percentage: clean_percentage(self.initial_trash, trash),
            roombas: self.live_roombas(),
            average_energy: self.average_energy(),
            total_energy: self.total_energy(),
            total_moves,
            total_cleaned,
            all_clean_tick: self.all_clean_tick,
        }
    }

    /// Per-roomba measurements.
    pub fn roomba_reports(&self) -> Vec<RoombaReport> {
        self.roombas
            .iter()
            .filter_map(|(key, roomba)| {
                let roomba = roomba.borrow();
                let cell = self.grid.position_of(key).ok()?;
                Some(RoombaReport {
                    key,
                    cell,
                    energy: roomba.energy(),
                    moves_count: roomba.moves_count(),
                    cleaned_count: roomba.cleaned_count(),
                })
            })
            .collect()
    }
}

impl std::fmt::Display for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.grid)?;
        write!(
            f,
            "tick {}: {} trash left, {} roombas",
            self.tick,
            self.trash_count(),
            self.live_roombas()
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::grid::GridView;
    use crate::path::Distance;
    use crate::roomba::{Errand, CHARGE_RATE, SAFETY_MARGIN};
    use crate::HashSet;

    fn bordered_world(width: i32, height: i32, seed: u64) -> World {
        let mut grid = Grid::new(width, height, Neighborhood::Moore, false);
        for cell in grid.border_cells() {
            grid.place(cell, Occupant::Obstacle).expect("place failed");
        }
        World::with_grid(grid, seed, 10_000)
    }

    #[test]
    fn test_default_setup() {
        let world = World::new(&SimulationConfig::default()).expect("setup failed");
        let grid = world.grid();

        assert_eq!(grid.count(OccupantKind::Obstacle), 28 + 6);
        assert_eq!(grid.count(OccupantKind::Trash), 12);
        assert_eq!(world.initial_trash(), 12);
        assert_eq!(grid.count(OccupantKind::Station), 1);
        assert_eq!(world.live_roombas(), 1);

        let start = Coordinate::new(1, 1);
        assert!(grid.has(start, OccupantKind::Station));
        assert!(grid.has(start, OccupantKind::Roomba));
        let key = world.roomba_keys()[0];
        let roomba = world.roomba(key).expect("roomba missing");
        assert_eq!(roomba.energy(), MAX_ENERGY);
        assert_eq!(roomba.distance_to_station(), Distance::Steps(0));
    }

    #[test]
    fn test_multi_agent_setup_gives_every_roomba_its_own_station() {
        let config = SimulationConfig {
            mode: SimulationMode::MultiAgent,
            num_agents: 5,
            width: 20,
            height: 20,
            ..SimulationConfig::default()
        };
        let world = World::new(&config).expect("setup failed");

        assert_eq!(world.live_roombas(), 5);
        assert_eq!(world.grid().count(OccupantKind::Station), 5);
        for key in world.roomba_keys() {
            let roomba = world.roomba(key).expect("roomba missing");
            let station = roomba.home_station().expect("no home station");
            assert_eq!(
                world.grid().position_of(station),
                world.grid().position_of(key)
            );
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimulationConfig {
            dirty_percentage: -0.1,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            World::new(&config),
            Err(ConfigError::PercentageOutOfRange { .. })
        ));

        let config = SimulationConfig {
            width: 65536,
            height: 65536,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            World::new(&config),
            Err(ConfigError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn test_same_seed_same_run() {
        for seed in [1, 42, 1234] {
            let config = SimulationConfig {
                seed,
                ..SimulationConfig::default()
            };
            let first = World::new(&config)
                .expect("setup failed")
                .run()
                .expect("run failed");
            let second = World::new(&config)
                .expect("setup failed")
                .run()
                .expect("run failed");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_run_stops_at_clean_or_tick_limit() {
        let config = SimulationConfig {
            max_steps: 300,
            ..SimulationConfig::default()
        };
        let mut world = World::new(&config).expect("setup failed");
        let mut ticks_seen = 0;
        let snapshot = world
            .run_with(|snapshot| {
                ticks_seen += 1;
                assert_eq!(snapshot.tick, ticks_seen);
                assert!(snapshot.average_energy <= f64::from(MAX_ENERGY));
            })
            .expect("run failed");

        assert!(!world.is_running());
        assert!(snapshot.tick <= 300);
        match snapshot.all_clean_tick {
            Some(tick) => {
                assert_eq!(tick, snapshot.tick);
                assert_eq!(snapshot.trash, 0);
                assert_relative_eq!(snapshot.clean_percentage, 100.0);
            }
            None => assert_eq!(snapshot.tick, 300),
        }

        // once stopped, further steps are no-ops
        world.step().expect("step failed");
        assert_eq!(world.tick(), snapshot.tick);
    }

    #[test]
    fn test_world_without_trash_is_clean_after_first_tick() {
        let mut world = bordered_world(6, 6, 42);
        let station = world
            .add_station(Coordinate::new(1, 1))
            .expect("place failed");
        world
            .add_roomba(Coordinate::new(1, 1), MAX_ENERGY, Some(station))
            .expect("spawn failed");

        let snapshot = world.run().expect("run failed");
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.all_clean_tick, Some(1));
        assert_relative_eq!(snapshot.clean_percentage, 100.0);
    }

    // 10x10 bordered grid, station and roomba at (1, 1), trash at (5, 5). The roomba wanders,
    // turns back once its battery only just covers the way home, charges, and walks back to
    // where it turned around.
    #[test]
    fn test_single_roomba_round_trip() {
        let mut world = bordered_world(10, 10, 42);
        let home = Coordinate::new(1, 1);
        let station = world.add_station(home).expect("place failed");
        let key = world
            .add_roomba(home, MAX_ENERGY, Some(station))
            .expect("spawn failed");
        world.add_trash(Coordinate::new(5, 5)).expect("place failed");

        let mut distances = HashSet::default();
        let mut work = None;
        let mut charged_after_return = false;
        let mut completed = false;

        for _ in 0..10_000 {
            let (energy, distance, had_work) = {
                let roomba = world.roomba(key).expect("roomba died");
                (
                    roomba.energy(),
                    roomba.distance_to_station(),
                    roomba.work_position().is_some(),
                )
            };

            world.step_roomba(key).expect("step failed");

            let roomba = world.roomba(key).expect("roomba died");
            let cell = world.grid().position_of(key).expect("roomba missing");
            assert!(roomba.energy() <= MAX_ENERGY);
            distances.insert(roomba.distance_to_station());

            // the survival check is the only thing that records a work position
            if work.is_none() && !had_work && roomba.work_position().is_some() {
                let steps = distance.steps().expect("station should be reachable");
                assert!(energy as usize <= steps + SAFETY_MARGIN);
                work = roomba.work_position();
            }

            if work.is_some() && !charged_after_return && roomba.energy() == MAX_ENERGY {
                assert_eq!(cell, home);
                assert!(roomba.is_returning_to_work());
                charged_after_return = true;
            }

            if charged_after_return && roomba.work_position().is_none() {
                assert_eq!(roomba.errand(), Errand::Working);
                assert_eq!(Some(cell), work);
                completed = true;
                break;
            }
        }

        assert!(completed, "roomba never made it back to work");
        assert!(distances.len() > 1);
    }

    // one roomba is mid-charge when a second one arrives on the same station
    #[test]
    fn test_second_roomba_waits_for_charger() {
        let mut world = bordered_world(10, 10, 42);
        let cell = Coordinate::new(3, 3);
        let station = world.add_station(cell).expect("place failed");
        world.add_trash(Coordinate::new(7, 7)).expect("place failed");

        let charging = world
            .add_roomba(cell, 60, Some(station))
            .expect("spawn failed");
        world.step_roomba(charging).expect("step failed");
        assert_eq!(world.roomba(charging).expect("missing").energy(), 65);
        assert!(world.roomba(charging).expect("missing").is_charging());

        let arriving = world
            .add_roomba(cell, 40, Some(station))
            .expect("spawn failed");
        world.step().expect("step failed");

        let first = world.roomba(charging).expect("missing");
        let second = world.roomba(arriving).expect("missing");
        assert_eq!(first.energy(), 65 + CHARGE_RATE);
        assert_eq!(second.energy(), 40);
        assert!(second.is_waiting_at_station());
        assert_eq!(second.moves_count(), 0);
        assert_eq!(world.grid().position_of(arriving), Ok(cell));
        drop(first);
        drop(second);

        // once the first is full, the second gets the charger
        for _ in 0..5 {
            world.step_roomba(charging).expect("step failed");
            world.step_roomba(arriving).expect("step failed");
        }
        assert_eq!(world.roomba(arriving).expect("missing").energy(), 40);
        world.step_roomba(charging).expect("step failed");
        assert_eq!(world.roomba(charging).expect("missing").energy(), MAX_ENERGY);
        world.step_roomba(arriving).expect("step failed");
        let second = world.roomba(arriving).expect("missing");
        assert_eq!(second.energy(), 40 + CHARGE_RATE);
        assert!(second.is_charging());
        assert!(!second.is_waiting_at_station());
    }

    #[test]
    fn test_roomba_with_empty_battery_is_removed() {
        let mut world = bordered_world(8, 8, 3);
        world.add_trash(Coordinate::new(6, 6)).expect("place failed");
        let key = world
            .add_roomba(Coordinate::new(2, 2), 1, None)
            .expect("spawn failed");

        while world.live_roombas() > 0 && world.is_running() {
            world.step().expect("step failed");
        }

        assert!(world.roomba(key).is_none());
        assert_eq!(world.grid().count(OccupantKind::Roomba), 0);
        assert_eq!(world.grid().position_of(key), Err(GridError::UnknownEntity));

        let tick = world.tick();
        world.step().expect("step failed");
        assert_eq!(world.tick(), tick + 1);
        let snapshot = world.snapshot();
        assert_eq!(snapshot.roombas, 0);
        assert_relative_eq!(snapshot.average_energy, 0.0);
        assert!(world.roomba_reports().is_empty());
    }

    #[test]
    fn test_reports_follow_roombas() {
        let config = SimulationConfig {
            mode: SimulationMode::MultiAgent,
            num_agents: 3,
            width: 12,
            height: 12,
            max_steps: 50,
            ..SimulationConfig::default()
        };
        let mut world = World::new(&config).expect("setup failed");
        world.run().expect("run failed");

        let reports = world.roomba_reports();
        assert_eq!(reports.len(), world.live_roombas());
        let snapshot = world.snapshot();
        assert_eq!(
            reports.iter().map(|r| r.moves_count).sum::<u64>(),
            snapshot.total_moves
        );
        for report in reports {
            assert!(report.energy <= MAX_ENERGY);
            assert!(!world.grid().is_blocked(report.cell));
        }
    }
}
