//! Chain-reaction flash propagation over an energy grid.
//!
//! Every tick raises each cell's energy by one. Cells above the threshold fire,
//! bumping all existing neighbours, which may push those over the threshold in
//! turn. Rounds repeat until no new cell crosses; only then are fired cells
//! reset to zero, so a cell fires at most once per tick.

use crate::grid::Grid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;
use trophy_core::{Coord, Result};

/// Energy above this value fires.
pub const FLASH_THRESHOLD: u8 = 9;

/// What happened during one flash tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashOutcome {
    /// Every cell that fired this tick
    pub fired: BTreeSet<Coord>,
    /// Cells newly crossing the threshold, one entry per propagation round
    pub waves: Vec<Vec<Coord>>,
    /// Number of cells in the grid the tick ran on
    pub cell_count: usize,
}

impl FlashOutcome {
    pub fn flash_count(&self) -> usize {
        self.fired.len()
    }

    /// Every cell in the grid fired in the same tick.
    pub fn is_synchronized(&self) -> bool {
        self.cell_count > 0 && self.fired.len() == self.cell_count
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlashEngine;

impl FlashEngine {
    pub fn new() -> Self {
        Self
    }

    /// Advance the grid by one tick and report the cells that fired.
    pub fn tick(&self, grid: &mut Grid<u8>) -> Result<FlashOutcome> {
        for energy in grid.values_mut() {
            *energy = energy.saturating_add(1);
        }

        let (rows, cols) = grid.dimensions();
        let mut fired_mask: Grid<bool> = Grid::new(rows, cols);
        let mut fired = BTreeSet::new();
        let mut waves = Vec::new();

        loop {
            let mut wave = Vec::new();
            for (pos, energy) in grid.iter() {
                if energy > FLASH_THRESHOLD && !fired_mask.get(pos)? {
                    wave.push(pos);
                }
            }

            if wave.is_empty() {
                break;
            }

            for &pos in &wave {
                fired_mask.set(pos, true)?;
                fired.insert(pos);

                let neighbors: Vec<Coord> = grid.neighbors(pos).collect();
                for neighbor in neighbors {
                    let energy = grid.get_mut(neighbor)?;
                    *energy = energy.saturating_add(1);
                }
            }

            trace!(round = waves.len(), size = wave.len(), "Flash wave");
            waves.push(wave);
        }

        for &pos in &fired {
            grid.set(pos, 0)?;
        }

        Ok(FlashOutcome {
            fired,
            waves,
            cell_count: grid.len(),
        })
    }
}
