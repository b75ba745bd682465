//! Core type definitions for the simulation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grid coordinate in index space (row first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Shift by a signed delta. Returns `None` if either index would go negative;
    /// the upper bound is the grid's business.
    pub fn offset(&self, d_row: isize, d_col: isize) -> Option<Self> {
        Some(Self {
            row: self.row.checked_add_signed(d_row)?,
            col: self.col.checked_add_signed(d_col)?,
        })
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Direction particles fall in. `Down` means increasing row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallDirection {
    Up,
    Down,
    Left,
    Right,
}

impl FallDirection {
    /// Step in `(row, col)` space.
    pub fn to_delta(&self) -> (isize, isize) {
        match self {
            FallDirection::Up => (-1, 0),
            FallDirection::Down => (1, 0),
            FallDirection::Left => (0, -1),
            FallDirection::Right => (0, 1),
        }
    }

    /// Sideways step tried first when the straight path is blocked.
    ///
    /// This is the fall delta rotated a quarter turn, so the tie-break rotates
    /// with the frame: falling `Down` tries down-left before down-right.
    pub fn lateral(&self) -> (isize, isize) {
        let (d_row, d_col) = self.to_delta();
        (d_col, -d_row)
    }

    pub fn all() -> [FallDirection; 4] {
        [
            FallDirection::Up,
            FallDirection::Down,
            FallDirection::Left,
            FallDirection::Right,
        ]
    }
}

impl TryFrom<u8> for FallDirection {
    type Error = Error;

    /// Raw encoding used by sensor drivers: 0 up, 1 down, 2 left, 3 right.
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FallDirection::Up),
            1 => Ok(FallDirection::Down),
            2 => Ok(FallDirection::Left),
            3 => Ok(FallDirection::Right),
            other => Err(Error::InvalidDirection(format!("raw value {}", other))),
        }
    }
}

impl FromStr for FallDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "north" => Ok(FallDirection::Up),
            "down" | "south" => Ok(FallDirection::Down),
            "left" | "west" => Ok(FallDirection::Left),
            "right" | "east" => Ok(FallDirection::Right),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for FallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FallDirection::Up => "up",
            FallDirection::Down => "down",
            FallDirection::Left => "left",
            FallDirection::Right => "right",
        };
        f.write_str(name)
    }
}

/// Cell state for the settling simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SettleCell {
    #[default]
    Empty,
    /// Movable particle
    Rock,
    /// Immovable obstacle
    Cube,
}

impl SettleCell {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(SettleCell::Empty),
            'O' => Some(SettleCell::Rock),
            '#' => Some(SettleCell::Cube),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            SettleCell::Empty => '.',
            SettleCell::Rock => 'O',
            SettleCell::Cube => '#',
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SettleCell::Empty
    }
}

/// Monotonic wall-clock reading in milliseconds from an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn after_millis(&self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}
