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

//! Evaluate the roomba agent over many seeds.

use std::error::Error;
use std::ops::Range;
use std::path::PathBuf;

use rayon::prelude::*;
use roomba_world::{ConfigError, SimulationConfig, TelemetrySnapshot, World};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Run the same simulation for every seed in 0..runs and record the performance of each, plus
// the averages over all of them. Runs are independent, so they go in parallel.
//
// Usage: roomba-evaluate [config.json] [runs]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next().map(PathBuf::from) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SimulationConfig::default(),
    };
    let runs = match args.next() {
        Some(runs) => runs.parse::<u64>()?,
        None => 100,
    };

    let results = evaluate(&config, 0..runs)?;
    for (seed, snapshot) in &results {
        match snapshot.all_clean_tick {
            Some(tick) => println!("seed {}: clean at tick {}", seed, tick),
            None => println!(
                "seed {}: {:.1}% clean after {} ticks",
                seed, snapshot.clean_percentage, snapshot.tick
            ),
        }
    }

    let evaluation = summarize(&results);
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}

/// Aggregate performance over a batch of runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Evaluation {
    runs: usize,
    completed: usize,
    average_completion_tick: Option<f64>,
    average_clean_percentage: f64,
    average_survivors: f64,
}

fn evaluate(
    config: &SimulationConfig,
    seeds: Range<u64>,
) -> Result<Vec<(u64, TelemetrySnapshot)>, ConfigError> {
    seeds
        .into_par_iter()
        .map(|seed| {
            let config = SimulationConfig {
                seed,
                ..config.clone()
            };
            let mut world = World::new(&config)?;
            let snapshot = world.run()?;
            info!(seed, tick = snapshot.tick, "run finished");
            Ok((seed, snapshot))
        })
        .collect()
}

fn summarize(results: &[(u64, TelemetrySnapshot)]) -> Evaluation {
    let runs = results.len();
    let completion_ticks: Vec<u64> = results
        .iter()
        .filter_map(|(_, snapshot)| snapshot.all_clean_tick)
        .collect();
    let average_completion_tick = if completion_ticks.is_empty() {
        None
    } else {
        Some(completion_ticks.iter().sum::<u64>() as f64 / completion_ticks.len() as f64)
    };
    let mean = |f: &dyn Fn(&TelemetrySnapshot) -> f64| {
        if runs == 0 {
            0.0
        } else {
            results.iter().map(|(_, snapshot)| f(snapshot)).sum::<f64>() / runs as f64
        }
    };

    Evaluation {
        runs,
        completed: completion_ticks.len(),
        average_completion_tick,
        average_clean_percentage: mean(&|s| s.clean_percentage),
        average_survivors: mean(&|s| s.roombas as f64),
    }
}
