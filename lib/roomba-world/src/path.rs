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

//! Breadth-first shortest paths over a [`GridView`].
//!
//! See Chapter 3: Solving Problems by Searching, breadth-first search, page 94.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::{Coordinate, GridView};
use crate::{HashMap, HashSet};

/// Number of moves to a goal, or the marker that there is no way there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    /// Goal is this many moves away.
    Steps(usize),

    /// No obstacle-free path exists.
    Unreachable,
}

impl Distance {
    /// The number of steps, if the goal is reachable.
    pub fn steps(&self) -> Option<usize> {
        match self {
            Distance::Steps(steps) => Some(*steps),
            Distance::Unreachable => None,
        }
    }

    /// One step closer. Stays at zero, and unreachable stays unreachable.
    pub fn decrement(&mut self) {
        if let Distance::Steps(steps) = self {
            *steps = steps.saturating_sub(1);
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Steps(steps) => write!(f, "{}", steps),
            Distance::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Result of a search. `path` excludes the start and ends with the goal; it is empty when the
/// goal is unreachable or when start and goal are the same cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Cells to move through, head first.
    pub path: VecDeque<Coordinate>,

    /// Length of `path`, or unreachable.
    pub distance: Distance,
}

impl Route {
    /// The route for a goal that cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            path: VecDeque::new(),
            distance: Distance::Unreachable,
        }
    }
}

/// Find a shortest path in edge count from `start` to `goal`, never entering a cell with an
/// obstacle on it. Ties go to whichever neighbor `neighbors_of` enumerates first, so the same
/// grid always yields the same path.
pub fn find_path<G: GridView>(grid: &G, start: Coordinate, goal: Coordinate) -> Route {
    let (Some(start), Some(goal)) = (grid.lookup(start), grid.lookup(goal)) else {
        return Route::unreachable();
    };

    let mut frontier: VecDeque<Coordinate> = VecDeque::from([start]);
    let mut visited: HashSet<Coordinate> = HashSet::default();
    let mut parents: HashMap<Coordinate, Coordinate> = HashMap::default();
    visited.insert(start);

    while let Some(current) = frontier.pop_front() {
        if current == goal {
            let path = reconstruct(&parents, start, goal);
            let distance = Distance::Steps(path.len());
            return Route { path, distance };
        }

        for neighbor in grid.neighbors_of(current) {
            if visited.contains(&neighbor) || grid.is_blocked(neighbor) {
                continue;
            }
            visited.insert(neighbor);
            parents.insert(neighbor, current);
            frontier.push_back(neighbor);
        }
    }

    Route::unreachable()
}

fn reconstruct(
    parents: &HashMap<Coordinate, Coordinate>,
    start: Coordinate,
    goal: Coordinate,
) -> VecDeque<Coordinate> {
    let mut path = VecDeque::new();
    let mut current = goal;
    while current != start {
        path.push_front(current);
        current = parents[&current];
    }
    path
}
