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

use std::error::Error;
use std::path::{Path, PathBuf};

use roomba_world::{SimulationConfig, World};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Run one roomba simulation and print how it went.
//
// Usage: roomba-simulate [config.json]
//
// The config file holds any subset of the SimulationConfig fields, e.g.
//
//     {"mode": "multi_agent", "num_agents": 5, "width": 20, "height": 20}
//
// Missing fields take their defaults. Set RUST_LOG=debug to follow every roomba decision.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    if let Err(e) = run(config_path.as_deref()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn run(config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = load_config(config_path)?;
    info!(agents = config.agent_count(), max_steps = config.max_steps, "starting");

    let mut world = World::new(&config)?;
    println!("{}", world);

    let report_every = (config.max_steps / 10).max(1);
    let snapshot = world.run_with(|snapshot| {
        if snapshot.tick % report_every == 0 {
            info!(
                tick = snapshot.tick,
                trash = snapshot.trash,
                roombas = snapshot.roombas,
                average_energy = snapshot.average_energy,
                "progress"
            );
        }
    })?;

    println!("{}", world);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("{}", serde_json::to_string_pretty(&world.roomba_reports())?);
    Ok(())
}
