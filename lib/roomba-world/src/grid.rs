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

//! The spatial grid the roombas live on.
//!
//! Every entity, fixed or mobile, is identified by an [`EntityKey`] and sits on exactly one
//! [`Coordinate`]. The [`GridView`] trait is the read-only surface the path finder and the agent
//! controller query; [`Grid`] is the concrete implementation and also owns the mutations.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::Rng;

new_key_type! {
    /// Identity of an entity placed on the grid.
    pub struct EntityKey;
}

/// Grid error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Coordinate does not name a cell of this grid.
    #[error("coordinate is outside the grid: {0}")]
    OutOfBounds(Coordinate),

    /// Entity key was never placed, or has already been removed.
    #[error("entity is not on the grid")]
    UnknownEntity,
}

/// A cell address. `x` is the column and `y` is the row, both starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    /// Column.
    pub x: i32,

    /// Row.
    pub y: i32,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Kind of an occupant, without any per-entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupantKind {
    /// Blocks traversal.
    Obstacle,

    /// Dirt to be cleaned.
    Trash,

    /// Charging point.
    Station,

    /// A roomba.
    Roomba,
}

/// Something that sits on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    /// Immobile, blocks traversal.
    Obstacle,

    /// Immobile dirt. Removed from the grid once cleaned.
    Trash {
        /// Whether the trash still needs cleaning.
        dirty: bool,
    },

    /// Immobile, shared charging point.
    Station,

    /// Mobile agent. Its controller state lives outside the grid, keyed by the same
    /// [`EntityKey`].
    Roomba,
}

impl Occupant {
    /// Fresh, dirty trash.
    pub fn trash() -> Self {
        Occupant::Trash { dirty: true }
    }

    /// The kind of this occupant.
    pub fn kind(&self) -> OccupantKind {
        match self {
            Occupant::Obstacle => OccupantKind::Obstacle,
            Occupant::Trash { .. } => OccupantKind::Trash,
            Occupant::Station => OccupantKind::Station,
            Occupant::Roomba => OccupantKind::Roomba,
        }
    }

    /// True for trash that has not been cleaned yet.
    pub fn is_dirty_trash(&self) -> bool {
        matches!(self, Occupant::Trash { dirty: true })
    }
}

/// Which cells count as neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighborhood {
    /// 4-connected: up, down, left, right.
    VonNeumann,

    /// 8-connected: includes diagonals.
    Moore,
}

/// Read-only view of a grid. This is all the path finder and the agent controller need to
/// know about space.
pub trait GridView {
    /// Resolve a coordinate to a cell of this grid. On a torus the coordinate is wrapped,
    /// otherwise out-of-range coordinates resolve to `None`.
    fn lookup(&self, coordinate: Coordinate) -> Option<Coordinate>;

    /// Neighboring cells, in a fixed enumeration order.
    fn neighbors_of(&self, cell: Coordinate) -> Vec<Coordinate>;

    /// Entities on a cell, in placement order.
    fn occupants_of(&self, cell: Coordinate) -> Vec<(EntityKey, Occupant)>;

    /// Whether any occupant of `cell` is of `kind`.
    fn has(&self, cell: Coordinate, kind: OccupantKind) -> bool {
        self.occupants_of(cell)
            .iter()
            .any(|(_, occupant)| occupant.kind() == kind)
    }

    /// Whether an obstacle sits on `cell`.
    fn is_blocked(&self, cell: Coordinate) -> bool {
        self.has(cell, OccupantKind::Obstacle)
    }

    /// Whether `cell` holds trash that still needs cleaning.
    fn has_dirty_trash(&self, cell: Coordinate) -> bool {
        self.occupants_of(cell)
            .iter()
            .any(|(_, occupant)| occupant.is_dirty_trash())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entity {
    cell: Coordinate,
    occupant: Occupant,
}

/// Rectangular grid of cells, each holding zero or more entities.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    neighborhood: Neighborhood,
    torus: bool,
    cells: Vec<Vec<EntityKey>>,
    entities: SlotMap<EntityKey, Entity>,
}

impl Grid {
    /// Create an empty grid.
    pub fn new(width: i32, height: i32, neighborhood: Neighborhood, torus: bool) -> Self {
        let len = width.max(0) as usize * height.max(0) as usize;
        Self {
            width,
            height,
            neighborhood,
            torus,
            cells: vec![Vec::new(); len],
            entities: SlotMap::with_key(),
        }
    }

    /// Width of the grid.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height of the grid.
    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, cell: Coordinate) -> Option<usize> {
        if cell.x < 0 || cell.x >= self.width || cell.y < 0 || cell.y >= self.height {
            return None;
        }
        Some(cell.y as usize * self.width as usize + cell.x as usize)
    }

    /// Whether the coordinate names a cell of this grid, without wrapping.
    pub fn contains(&self, cell: Coordinate) -> bool {
        self.index(cell).is_some()
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coordinate::new(x, y)))
    }

    /// Cells on the outer edge of the grid.
    pub fn border_cells(&self) -> Vec<Coordinate> {
        self.cells()
            .filter(|c| c.x == 0 || c.y == 0 || c.x == self.width - 1 || c.y == self.height - 1)
            .collect()
    }

    /// Put a new entity on a cell.
    pub fn place(&mut self, cell: Coordinate, occupant: Occupant) -> Result<EntityKey, GridError> {
        let index = self.index(cell).ok_or(GridError::OutOfBounds(cell))?;
        let key = self.entities.insert(Entity { cell, occupant });
        self.cells[index].push(key);
        Ok(key)
    }

    /// Move an entity to another cell. Either the entity ends up on `to` or nothing changes.
    pub fn relocate(&mut self, key: EntityKey, to: Coordinate) -> Result<(), GridError> {
        let to_index = self.index(to).ok_or(GridError::OutOfBounds(to))?;
        let from = self.position_of(key)?;
        if from == to {
            return Ok(());
        }
        let from_index = self.index(from).ok_or(GridError::OutOfBounds(from))?;
        self.cells[from_index].retain(|k| *k != key);
        self.cells[to_index].push(key);
        self.entities[key].cell = to;
        Ok(())
    }

    /// Take an entity off the grid for good.
    pub fn remove(&mut self, key: EntityKey) -> Result<Occupant, GridError> {
        let entity = self.entities.remove(key).ok_or(GridError::UnknownEntity)?;
        if let Some(index) = self.index(entity.cell) {
            self.cells[index].retain(|k| *k != key);
        }
        Ok(entity.occupant)
    }

    /// Where an entity currently is.
    pub fn position_of(&self, key: EntityKey) -> Result<Coordinate, GridError> {
        self.entities
            .get(key)
            .map(|e| e.cell)
            .ok_or(GridError::UnknownEntity)
    }

    /// What an entity is.
    pub fn occupant(&self, key: EntityKey) -> Result<Occupant, GridError> {
        self.entities
            .get(key)
            .map(|e| e.occupant)
            .ok_or(GridError::UnknownEntity)
    }

    /// Mutable access to an entity's occupant state, e.g. to mark trash clean.
    pub fn occupant_mut(&mut self, key: EntityKey) -> Result<&mut Occupant, GridError> {
        self.entities
            .get_mut(key)
            .map(|e| &mut e.occupant)
            .ok_or(GridError::UnknownEntity)
    }

    /// Whether a cell holds no entities at all.
    pub fn is_empty(&self, cell: Coordinate) -> bool {
        self.index(cell)
            .map(|index| self.cells[index].is_empty())
            .unwrap_or(false)
    }

    /// All cells without any entity.
    pub fn empty_cells(&self) -> Vec<Coordinate> {
        self.cells().filter(|c| self.is_empty(*c)).collect()
    }

    /// A uniformly random empty cell, or `None` if the grid is full.
    pub fn random_empty_cell(&self, rng: &mut Rng) -> Option<Coordinate> {
        self.empty_cells().choose(rng).copied()
    }

    /// Number of entities of a kind.
    pub fn count(&self, kind: OccupantKind) -> usize {
        self.entities
            .values()
            .filter(|e| e.occupant.kind() == kind)
            .count()
    }
}

impl GridView for Grid {
    fn lookup(&self, coordinate: Coordinate) -> Option<Coordinate> {
        if self.torus && self.width > 0 && self.height > 0 {
            return Some(Coordinate::new(
                coordinate.x.rem_euclid(self.width),
                coordinate.y.rem_euclid(self.height),
            ));
        }
        self.index(coordinate).map(|_| coordinate)
    }

    fn neighbors_of(&self, cell: Coordinate) -> Vec<Coordinate> {
        let mut neighbors = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if self.neighborhood == Neighborhood::VonNeumann && dx != 0 && dy != 0 {
                    continue;
                }
                if let Some(neighbor) = self.lookup(Coordinate::new(cell.x + dx, cell.y + dy)) {
                    // tiny tori wrap several offsets onto the same cell
                    if neighbor != cell && !neighbors.contains(&neighbor) {
                        neighbors.push(neighbor);
                    }
                }
            }
        }
        neighbors
    }

    fn occupants_of(&self, cell: Coordinate) -> Vec<(EntityKey, Occupant)> {
        match self.index(cell) {
            Some(index) => self.cells[index]
                .iter()
                .map(|key| (*key, self.entities[*key].occupant))
                .collect(),
            None => Vec::new(),
        }
    }
}

// print one character per cell, rows top to bottom. a roomba hides whatever else is on its
// cell, a station hides trash.
impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s =
            String::with_capacity((self.width.max(0) as usize + 1) * self.height.max(0) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = Coordinate::new(x, y);
                let c = if self.has(cell, OccupantKind::Roomba) {
                    'R'
                } else if self.has(cell, OccupantKind::Station) {
                    'S'
                } else if self.has(cell, OccupantKind::Obstacle) {
                    '#'
                } else if self.has_dirty_trash(cell) {
                    '*'
                } else {
                    '.'
                };
                s.push(c);
            }
            if y < self.height - 1 {
                s.push('\n');
            }
        }
        write!(f, "{}", s)
    }
}
