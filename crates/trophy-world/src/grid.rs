//! Bounded 2D grid shared by both simulation engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use trophy_core::{Coord, Error, Result, SettleCell};

/// A fixed-size, row-major 2D grid. Access outside `[0, rows) x [0, cols)` is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

/// Neighbour offsets for 8-connectivity, row-major order.
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl<T: Copy + Default> Grid<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::default())
    }
}

impl<T: Copy> Grid<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }

    /// Build from row vectors. Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(height * width);

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(Error::malformed(
                    i + 1,
                    format!("expected {} cells, found {}", width, row.len()),
                ));
            }
            cells.extend(row);
        }

        Ok(Self {
            rows: height,
            cols: width,
            cells,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, pos: Coord) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn get(&self, pos: Coord) -> Result<T> {
        let index = self.index_of(pos)?;
        Ok(self.cells[index])
    }

    pub fn set(&mut self, pos: Coord, value: T) -> Result<()> {
        let index = self.index_of(pos)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Mutable access to one cell
    pub fn get_mut(&mut self, pos: Coord) -> Result<&mut T> {
        let index = self.index_of(pos)?;
        Ok(&mut self.cells[index])
    }

    /// Apply a signed step and return the target only if it lies inside the grid.
    pub fn step(&self, pos: Coord, d_row: isize, d_col: isize) -> Option<Coord> {
        pos.offset(d_row, d_col).filter(|p| self.contains(*p))
    }

    /// Existing 8-connected neighbours. Edge and corner cells get fewer; nothing wraps.
    pub fn neighbors(&self, pos: Coord) -> impl Iterator<Item = Coord> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(move |&(dr, dc)| self.step(pos, dr, dc))
    }

    pub fn index_to_coord(&self, index: usize) -> Coord {
        Coord::new(index / self.cols, index % self.cols)
    }

    /// Iterator over all cells with positions, row-major
    pub fn iter(&self) -> impl Iterator<Item = (Coord, T)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, value)| (self.index_to_coord(i), *value))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.cells.iter_mut()
    }

    fn index_of(&self, pos: Coord) -> Result<usize> {
        if !self.contains(pos) {
            return Err(Error::OutOfBounds {
                row: pos.row,
                col: pos.col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(pos.row * self.cols + pos.col)
    }
}

/// Energy grids print one digit per cell; values above 9 print as `*`.
fn energy_char(value: u8) -> char {
    char::from_digit(value as u32, 10).unwrap_or('*')
}

impl fmt::Display for Grid<u8> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols.max(1)) {
            let line: String = row.iter().map(|v| energy_char(*v)).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl fmt::Display for Grid<SettleCell> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols.max(1)) {
            let line: String = row.iter().map(SettleCell::to_char).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
