//! Directional settling of movable rocks around immovable cubes.
//!
//! Two engines share the same grid and direction model:
//! - [`DropEngine`] keeps a single particle in flight, spawned at a source on
//!   the uphill wall, and stops for good once a particle leaves the grid or the
//!   source is buried.
//! - [`BulkEngine`] moves the first movable rock (row-major) by one cell per
//!   tick until nothing can move, then reports `Stable` until the direction
//!   changes.

use crate::grid::Grid;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use trophy_core::{Coord, FallDirection, Result, SettleCell, SettleConfig, SettleMode};

pub type SettleGrid = Grid<SettleCell>;

/// Why the drop engine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The particle at `from` would leave the grid in the fall direction
    FellOut { from: Coord },
    /// The spawn cell is already occupied
    SourceBlocked { at: Coord },
}

/// Result of one settling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleEvent {
    Spawned { at: Coord },
    Moved { from: Coord, to: Coord },
    Rested { at: Coord },
    Stable,
    Halted(HaltReason),
}

/// Position-weighted rock total for the given fall direction.
///
/// A rock's weight is its distance, counted from 1, from the wall opposite the
/// fall direction: rocks piled against the downhill wall weigh the full extent
/// of the grid along the fall axis.
pub fn load(grid: &SettleGrid, direction: FallDirection) -> u64 {
    let (rows, cols) = grid.dimensions();

    grid.iter()
        .filter(|(_, cell)| *cell == SettleCell::Rock)
        .map(|(pos, _)| {
            let weight = match direction {
                FallDirection::Up => rows - pos.row,
                FallDirection::Down => pos.row + 1,
                FallDirection::Left => cols - pos.col,
                FallDirection::Right => pos.col + 1,
            };
            weight as u64
        })
        .sum()
}

/// Spawn cell on the wall opposite the fall direction.
///
/// `lane` selects the position along that wall and is clamped to the grid.
pub fn spawn_point(grid: &SettleGrid, direction: FallDirection, lane: usize) -> Option<Coord> {
    let (rows, cols) = grid.dimensions();
    if grid.is_empty() {
        return None;
    }

    let pos = match direction {
        FallDirection::Down => Coord::new(0, lane.min(cols - 1)),
        FallDirection::Up => Coord::new(rows - 1, lane.min(cols - 1)),
        FallDirection::Right => Coord::new(lane.min(rows - 1), 0),
        FallDirection::Left => Coord::new(lane.min(rows - 1), cols - 1),
    };
    Some(pos)
}

fn is_free(grid: &SettleGrid, pos: Coord) -> bool {
    matches!(grid.get(pos), Ok(SettleCell::Empty))
}

/// Sequential drop-and-spawn engine
#[derive(Debug, Clone)]
pub struct DropEngine {
    direction: FallDirection,
    spawn_lane: usize,
    falling: Option<Coord>,
    halted: Option<HaltReason>,
    rested: u64,
    moves: u64,
}

impl DropEngine {
    pub fn new(direction: FallDirection, spawn_lane: usize) -> Self {
        Self {
            direction,
            spawn_lane,
            falling: None,
            halted: None,
            rested: 0,
            moves: 0,
        }
    }

    pub fn direction(&self) -> FallDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: FallDirection) {
        self.direction = direction;
    }

    /// Particle currently in flight, if any
    pub fn falling(&self) -> Option<Coord> {
        self.falling
    }

    pub fn halted(&self) -> Option<HaltReason> {
        self.halted
    }

    /// Particles that have come to rest since the last reset
    pub fn rested(&self) -> u64 {
        self.rested
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn reset(&mut self, direction: FallDirection) {
        *self = Self::new(direction, self.spawn_lane);
    }

    pub fn tick(&mut self, grid: &mut SettleGrid) -> Result<SettleEvent> {
        if let Some(reason) = self.halted {
            return Ok(SettleEvent::Halted(reason));
        }

        let Some(pos) = self.falling else {
            return Ok(self.spawn(grid));
        };

        let (d_row, d_col) = self.direction.to_delta();
        let Some(forward) = grid.step(pos, d_row, d_col) else {
            return Ok(self.halt(HaltReason::FellOut { from: pos }));
        };

        let (l_row, l_col) = self.direction.lateral();
        let candidates = [
            Some(forward),
            grid.step(pos, d_row + l_row, d_col + l_col),
            grid.step(pos, d_row - l_row, d_col - l_col),
        ];

        match candidates.into_iter().flatten().find(|c| is_free(grid, *c)) {
            Some(next) => {
                trace!(from = %pos, to = %next, "Particle falls");
                self.falling = Some(next);
                self.moves += 1;
                Ok(SettleEvent::Moved { from: pos, to: next })
            }
            None => {
                grid.set(pos, SettleCell::Rock)?;
                self.falling = None;
                self.rested += 1;
                debug!(at = %pos, rested = self.rested, "Particle came to rest");
                Ok(SettleEvent::Rested { at: pos })
            }
        }
    }

    fn spawn(&mut self, grid: &SettleGrid) -> SettleEvent {
        match spawn_point(grid, self.direction, self.spawn_lane) {
            Some(at) if is_free(grid, at) => {
                self.falling = Some(at);
                SettleEvent::Spawned { at }
            }
            Some(at) => self.halt(HaltReason::SourceBlocked { at }),
            None => self.halt(HaltReason::SourceBlocked { at: Coord::new(0, 0) }),
        }
    }

    fn halt(&mut self, reason: HaltReason) -> SettleEvent {
        info!(
            event = "settle_halted",
            reason = ?reason,
            rested = self.rested,
            "Drop simulation stopped"
        );
        self.falling = None;
        self.halted = Some(reason);
        SettleEvent::Halted(reason)
    }
}

/// Scan-and-move-one-per-tick engine
#[derive(Debug, Clone)]
pub struct BulkEngine {
    direction: FallDirection,
    stable: bool,
    moves: u64,
}

impl BulkEngine {
    pub fn new(direction: FallDirection) -> Self {
        Self {
            direction,
            stable: false,
            moves: 0,
        }
    }

    pub fn direction(&self) -> FallDirection {
        self.direction
    }

    /// Changing direction clears the stable signal; setting the same one is a no-op.
    pub fn set_direction(&mut self, direction: FallDirection) {
        if direction != self.direction {
            debug!(from = %self.direction, to = %direction, "Fall direction changed");
            self.direction = direction;
            self.stable = false;
        }
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }

    pub fn reset(&mut self, direction: FallDirection) {
        *self = Self::new(direction);
    }

    /// First rock in row-major order with a free cell directly downhill.
    pub fn find_movable(&self, grid: &SettleGrid) -> Option<(Coord, Coord)> {
        let (d_row, d_col) = self.direction.to_delta();
        grid.iter()
            .filter(|(_, cell)| *cell == SettleCell::Rock)
            .find_map(|(pos, _)| {
                grid.step(pos, d_row, d_col)
                    .filter(|target| is_free(grid, *target))
                    .map(|target| (pos, target))
            })
    }

    pub fn tick(&mut self, grid: &mut SettleGrid) -> Result<SettleEvent> {
        if self.stable {
            return Ok(SettleEvent::Stable);
        }

        match self.find_movable(grid) {
            Some((from, to)) => {
                grid.set(to, SettleCell::Rock)?;
                grid.set(from, SettleCell::Empty)?;
                self.moves += 1;
                trace!(from = %from, to = %to, "Rock slides");
                Ok(SettleEvent::Moved { from, to })
            }
            None => {
                self.stable = true;
                info!(
                    event = "settle_stable",
                    direction = %self.direction,
                    moves = self.moves,
                    load = load(grid, self.direction),
                    "Rocks settled"
                );
                Ok(SettleEvent::Stable)
            }
        }
    }
}

/// Either settling mode behind one interface
#[derive(Debug, Clone)]
pub enum SettleEngine {
    Drop(DropEngine),
    Bulk(BulkEngine),
}

impl SettleEngine {
    pub fn from_config(config: &SettleConfig) -> Self {
        match config.mode {
            SettleMode::Drop => {
                SettleEngine::Drop(DropEngine::new(config.initial_direction, config.spawn_lane))
            }
            SettleMode::Bulk => SettleEngine::Bulk(BulkEngine::new(config.initial_direction)),
        }
    }

    pub fn direction(&self) -> FallDirection {
        match self {
            SettleEngine::Drop(engine) => engine.direction(),
            SettleEngine::Bulk(engine) => engine.direction(),
        }
    }

    pub fn set_direction(&mut self, direction: FallDirection) {
        match self {
            SettleEngine::Drop(engine) => engine.set_direction(direction),
            SettleEngine::Bulk(engine) => engine.set_direction(direction),
        }
    }

    pub fn reset(&mut self, direction: FallDirection) {
        match self {
            SettleEngine::Drop(engine) => engine.reset(direction),
            SettleEngine::Bulk(engine) => engine.reset(direction),
        }
    }

    pub fn moves(&self) -> u64 {
        match self {
            SettleEngine::Drop(engine) => engine.moves(),
            SettleEngine::Bulk(engine) => engine.moves(),
        }
    }

    pub fn tick(&mut self, grid: &mut SettleGrid) -> Result<SettleEvent> {
        match self {
            SettleEngine::Drop(engine) => engine.tick(grid),
            SettleEngine::Bulk(engine) => engine.tick(grid),
        }
    }
}
