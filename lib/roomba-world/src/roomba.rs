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

//! The roomba controller.
//!
//! A roomba is a model-based reflex agent with a battery. Every tick it runs a subsumption
//! ladder, where the first rung that applies wins:
//!
//! 1. survival: head home when the battery only just covers the trip back,
//! 2. charging: charge, or wait for the charger, while standing on a station,
//! 3. return to work: walk back to where it was before it went to charge,
//! 4. return to station: walk home,
//! 5. explore and clean.

use std::cell::RefCell;
use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::{debug, info};

use crate::grid::{Coordinate, EntityKey, Grid, GridError, GridView, Occupant, OccupantKind};
use crate::path::{find_path, Distance};
use crate::Rng;

/// Full battery.
pub const MAX_ENERGY: u32 = 100;

/// Energy gained per tick on a free charger.
pub const CHARGE_RATE: u32 = 5;

/// Spare energy a roomba keeps on top of the distance home before it turns back.
pub const SAFETY_MARGIN: usize = 10;

/// Chance that an exploring roomba moves at all on a given tick.
pub const EXPLORE_PROBABILITY: f64 = 0.5;

/// Roomba controllers, keyed by the grid entity they drive.
pub type Roombas = SecondaryMap<EntityKey, RefCell<Roomba>>;

/// What a roomba is busy with. Returning to the station and returning to work exclude each
/// other, so they are one enum rather than two flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Errand {
    /// Exploring and cleaning.
    Working,

    /// Low battery, heading to a station.
    ReturningToStation,

    /// Charged, heading back to the remembered work position.
    ReturningToWork,
}

/// Everything a roomba may touch during its step besides itself.
pub struct StepContext<'a> {
    /// The grid. Only the stepping roomba's own entity and trash it cleans are mutated.
    pub grid: &'a mut Grid,

    /// All roombas, used to see whether a peer holds the charger. The stepping roomba may be
    /// in here, mutably borrowed.
    pub peers: &'a Roombas,

    /// Shared random source.
    pub rng: &'a mut Rng,
}

/// Controller state of one roomba.
#[derive(Debug, Clone)]
pub struct Roomba {
    key: EntityKey,
    energy: u32,
    home_station: Option<EntityKey>,
    path_to_station: VecDeque<Coordinate>,
    distance_to_station: Distance,
    errand: Errand,
    waiting_at_station: bool,
    charging: bool,
    work_position: Option<Coordinate>,
    path_to_work: VecDeque<Coordinate>,
    moves_count: u64,
    cleaned_count: u64,
    alive: bool,
}

impl Roomba {
    /// Put a roomba on `cell` and plan its way home.
    pub fn spawn(
        grid: &mut Grid,
        cell: Coordinate,
        energy: u32,
        home_station: Option<EntityKey>,
    ) -> Result<Self, GridError> {
        let key = grid.place(cell, Occupant::Roomba)?;
        let mut roomba = Self {
            key,
            energy: energy.min(MAX_ENERGY),
            home_station,
            path_to_station: VecDeque::new(),
            distance_to_station: Distance::Unreachable,
            errand: Errand::Working,
            waiting_at_station: false,
            charging: false,
            work_position: None,
            path_to_work: VecDeque::new(),
            moves_count: 0,
            cleaned_count: 0,
            alive: true,
        };
        roomba.refresh_station_path(grid);
        Ok(roomba)
    }

    /// The grid entity this controller drives.
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Battery level in `[0, MAX_ENERGY]`.
    pub fn energy(&self) -> u32 {
        self.energy
    }

    /// Moves made so far.
    pub fn moves_count(&self) -> u64 {
        self.moves_count
    }

    /// Trash cleaned so far.
    pub fn cleaned_count(&self) -> u64 {
        self.cleaned_count
    }

    /// The station this roomba charges at.
    pub fn home_station(&self) -> Option<EntityKey> {
        self.home_station
    }

    /// Current errand.
    pub fn errand(&self) -> Errand {
        self.errand
    }

    /// Heading to a station.
    pub fn is_returning_to_station(&self) -> bool {
        self.errand == Errand::ReturningToStation
    }

    /// Heading back to work.
    pub fn is_returning_to_work(&self) -> bool {
        self.errand == Errand::ReturningToWork
    }

    /// Standing on a station without charging, either just arrived or blocked by a peer.
    pub fn is_waiting_at_station(&self) -> bool {
        self.waiting_at_station
    }

    /// Holds the charger of the station it stands on.
    pub fn is_charging(&self) -> bool {
        self.charging
    }

    /// Where to go back to after charging.
    pub fn work_position(&self) -> Option<Coordinate> {
        self.work_position
    }

    /// Cached distance to the home station.
    pub fn distance_to_station(&self) -> Distance {
        self.distance_to_station
    }

    /// Cached path to the home station, next cell first.
    pub fn path_to_station(&self) -> &VecDeque<Coordinate> {
        &self.path_to_station
    }

    /// False once the battery ran out and the roomba was taken off the grid.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Act for one tick.
    pub fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), GridError> {
        if !self.alive {
            return Ok(());
        }

        self.check_survival(ctx.grid)?;

        if self.energy < MAX_ENERGY || self.waiting_at_station {
            let cell = ctx.grid.position_of(self.key)?;
            if ctx.grid.has(cell, OccupantKind::Station) {
                // charging or waiting takes the whole tick
                self.charge(ctx.grid, ctx.peers, cell);
                return Ok(());
            }
            self.waiting_at_station = false;
            self.charging = false;
        }

        match self.errand {
            Errand::ReturningToWork => {
                self.return_to_work(ctx.grid)?;
                self.die_if_stranded(ctx.grid)?;
            }
            Errand::ReturningToStation => {
                self.return_to_station(ctx.grid)?;
                self.die_if_stranded(ctx.grid)?;
            }
            Errand::Working => {
                self.explore(ctx.grid, ctx.rng)?;
                self.clean(ctx.grid)?;
                if self.energy == 0 {
                    self.die(ctx.grid)?;
                }
            }
        }
        Ok(())
    }

    fn check_survival(&mut self, grid: &Grid) -> Result<(), GridError> {
        if self.home_station.is_none() || self.errand == Errand::ReturningToStation {
            return Ok(());
        }
        let Some(distance) = self.distance_to_station.steps() else {
            return Ok(());
        };
        if self.energy as usize > distance + SAFETY_MARGIN {
            return Ok(());
        }

        let cell = grid.position_of(self.key)?;
        if self.work_position.is_none() {
            self.work_position = Some(cell);
        }
        self.errand = Errand::ReturningToStation;
        self.path_to_work.clear();
        debug!(
            roomba = ?self.key,
            energy = self.energy,
            distance,
            %cell,
            "low battery, returning to station"
        );
        Ok(())
    }

    fn charge(&mut self, grid: &Grid, peers: &Roombas, cell: Coordinate) {
        if self.charger_taken(grid, peers, cell) {
            if !self.waiting_at_station {
                debug!(roomba = ?self.key, %cell, "charger taken, waiting");
            }
            self.waiting_at_station = true;
            self.charging = false;
            return;
        }

        self.charging = true;
        self.waiting_at_station = false;
        self.energy = (self.energy + CHARGE_RATE).min(MAX_ENERGY);
        if self.energy < MAX_ENERGY {
            return;
        }

        self.charging = false;
        self.waiting_at_station = false;
        self.errand = Errand::Working;
        if let Some(work) = self.work_position {
            self.errand = Errand::ReturningToWork;
            self.recompute_path_to_work(grid, work);
        }
        self.refresh_station_path(grid);
        debug!(roomba = ?self.key, %cell, errand = ?self.errand, "fully charged");
    }

    /// Another roomba on this cell is mid-charge. Roombas that merely wait do not hold the
    /// charger, so two arrivals never lock each other out.
    fn charger_taken(&self, grid: &Grid, peers: &Roombas, cell: Coordinate) -> bool {
        grid.occupants_of(cell)
            .into_iter()
            .filter(|(key, occupant)| *key != self.key && occupant.kind() == OccupantKind::Roomba)
            .filter_map(|(key, _)| peers.get(key))
            .any(|peer| {
                peer.try_borrow()
                    .map(|peer| peer.charging && peer.energy < MAX_ENERGY)
                    .unwrap_or(false)
            })
    }

    fn return_to_work(&mut self, grid: &mut Grid) -> Result<(), GridError> {
        let Some(work) = self.work_position else {
            self.errand = Errand::Working;
            return Ok(());
        };
        if grid.position_of(self.key)? == work {
            self.arrive_at_work(work);
            return Ok(());
        }

        match self.path_to_work.front().copied() {
            Some(next) if !grid.is_blocked(next) => {
                self.move_to(grid, next)?;
                self.path_to_work.pop_front();
                self.refresh_station_path(grid);
                if next == work {
                    self.arrive_at_work(work);
                }
            }
            _ => self.recompute_path_to_work(grid, work),
        }
        Ok(())
    }

    fn arrive_at_work(&mut self, work: Coordinate) {
        self.errand = Errand::Working;
        self.work_position = None;
        self.path_to_work.clear();
        debug!(roomba = ?self.key, cell = %work, "back at work");
    }

    fn return_to_station(&mut self, grid: &mut Grid) -> Result<(), GridError> {
        let cell = grid.position_of(self.key)?;
        if grid.has(cell, OccupantKind::Station) {
            self.arrive_at_station(cell);
            return Ok(());
        }

        let nearby_station = grid
            .neighbors_of(cell)
            .into_iter()
            .find(|n| grid.has(*n, OccupantKind::Station) && !grid.is_blocked(*n));
        if let Some(station) = nearby_station {
            self.move_to(grid, station)?;
            self.refresh_station_path(grid);
            self.arrive_at_station(station);
            return Ok(());
        }

        match self.path_to_station.front().copied() {
            Some(next) if !grid.is_blocked(next) => {
                self.move_to(grid, next)?;
                self.path_to_station.pop_front();
                self.distance_to_station.decrement();
            }
            _ => {
                self.path_to_station.clear();
                self.refresh_station_path(grid);
            }
        }
        Ok(())
    }

    fn arrive_at_station(&mut self, cell: Coordinate) {
        self.waiting_at_station = true;
        self.errand = Errand::Working;
        debug!(roomba = ?self.key, %cell, "arrived at station");
    }

    fn explore(&mut self, grid: &mut Grid, rng: &mut Rng) -> Result<(), GridError> {
        if !rng.gen_bool(EXPLORE_PROBABILITY) || self.energy == 0 {
            return Ok(());
        }

        let cell = grid.position_of(self.key)?;
        let open: Vec<Coordinate> = grid
            .neighbors_of(cell)
            .into_iter()
            .filter(|n| !grid.is_blocked(*n))
            .collect();
        let dirty: Vec<Coordinate> = open
            .iter()
            .copied()
            .filter(|n| grid.has_dirty_trash(*n))
            .collect();

        let target = if dirty.is_empty() {
            open.choose(rng)
        } else {
            dirty.choose(rng)
        };
        if let Some(target) = target.copied() {
            self.move_to(grid, target)?;
            self.refresh_station_path(grid);
        }
        Ok(())
    }

    fn clean(&mut self, grid: &mut Grid) -> Result<(), GridError> {
        if self.errand != Errand::Working {
            return Ok(());
        }
        let cell = grid.position_of(self.key)?;
        let trash = grid
            .occupants_of(cell)
            .into_iter()
            .find(|(_, occupant)| occupant.is_dirty_trash());
        if let Some((trash, _)) = trash {
            *grid.occupant_mut(trash)? = Occupant::Trash { dirty: false };
            grid.remove(trash)?;
            self.cleaned_count += 1;
            debug!(roomba = ?self.key, %cell, "cleaned trash");
        }
        Ok(())
    }

    /// Path following ran the battery flat somewhere without a charger.
    fn die_if_stranded(&mut self, grid: &mut Grid) -> Result<(), GridError> {
        if self.energy > 0 {
            return Ok(());
        }
        let cell = grid.position_of(self.key)?;
        if !grid.has(cell, OccupantKind::Station) {
            self.die(grid)?;
        }
        Ok(())
    }

    fn die(&mut self, grid: &mut Grid) -> Result<(), GridError> {
        let cell = grid.position_of(self.key)?;
        grid.remove(self.key)?;
        self.alive = false;
        self.path_to_station.clear();
        self.path_to_work.clear();
        info!(roomba = ?self.key, %cell, moves = self.moves_count, "battery empty, roomba removed");
        Ok(())
    }

    fn move_to(&mut self, grid: &mut Grid, cell: Coordinate) -> Result<(), GridError> {
        grid.relocate(self.key, cell)?;
        self.energy = self.energy.saturating_sub(1);
        self.moves_count += 1;
        Ok(())
    }

    fn refresh_station_path(&mut self, grid: &Grid) {
        let route = match self.home_station {
            Some(station) => match (grid.position_of(self.key), grid.position_of(station)) {
                (Ok(from), Ok(to)) => Some(find_path(grid, from, to)),
                _ => None,
            },
            None => None,
        };
        match route {
            Some(route) => {
                self.path_to_station = route.path;
                self.distance_to_station = route.distance;
            }
            None => {
                self.path_to_station.clear();
                self.distance_to_station = Distance::Unreachable;
            }
        }
        if self.home_station.is_some() && self.distance_to_station == Distance::Unreachable {
            debug!(roomba = ?self.key, "home station unreachable");
        }
    }

    fn recompute_path_to_work(&mut self, grid: &Grid, work: Coordinate) {
        self.path_to_work = match grid.position_of(self.key) {
            Ok(from) => find_path(grid, from, work).path,
            Err(_) => VecDeque::new(),
        };
    }
}
