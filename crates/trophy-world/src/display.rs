//! Mapping between grid cells and what a display shows for them.
//!
//! Axis convention, used everywhere: the column index runs along display X
//! (left to right) and the row index runs along display Y (top to bottom).

use crate::grid::Grid;
use crate::settle::SettleGrid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trophy_core::{Coord, DisplayConfig, SettleCell};

/// Opaque index of the visual element that represents one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisplayHandle(pub u32);

/// Direct, search-free mapping between grid cells and display handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleMap {
    rows: usize,
    cols: usize,
}

impl HandleMap {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn for_grid<T: Copy>(grid: &Grid<T>) -> Self {
        let (rows, cols) = grid.dimensions();
        Self::new(rows, cols)
    }

    pub fn handle(&self, pos: Coord) -> Option<DisplayHandle> {
        if pos.row < self.rows && pos.col < self.cols {
            Some(DisplayHandle((pos.row * self.cols + pos.col) as u32))
        } else {
            None
        }
    }

    pub fn coord(&self, handle: DisplayHandle) -> Option<Coord> {
        let index = handle.0 as usize;
        if self.cols == 0 || index >= self.rows * self.cols {
            return None;
        }
        Some(Coord::new(index / self.cols, index % self.cols))
    }
}

/// Pixel placement of grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLayout {
    pub origin_x: i32,
    pub origin_y: i32,
    pub pitch: i32,
    pub inset: i32,
}

impl CellLayout {
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            origin_x: config.origin_x,
            origin_y: config.origin_y,
            pitch: config.cell_pitch,
            inset: config.cell_inset,
        }
    }

    /// Anchor pixel for a cell marker.
    pub fn grid_to_display(&self, pos: Coord) -> (i32, i32) {
        (
            self.origin_x + self.inset + self.pitch * pos.col as i32,
            self.origin_y + self.inset + self.pitch * pos.row as i32,
        )
    }

    /// Cell containing pixel `(x, y)`, if it falls inside a `rows x cols` grid.
    pub fn display_to_grid(&self, x: i32, y: i32, rows: usize, cols: usize) -> Option<Coord> {
        if self.pitch <= 0 {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        if dx < 0 || dy < 0 {
            return None;
        }

        let pos = Coord::new((dy / self.pitch) as usize, (dx / self.pitch) as usize);
        (pos.row < rows && pos.col < cols).then_some(pos)
    }
}

/// Semantic state of a cell, for the sink to turn into pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellVisual {
    Energy(u8),
    Flashing,
    Empty,
    Rock,
    /// The particle currently in flight
    Falling,
    Cube,
}

impl CellVisual {
    pub fn for_settle(cell: SettleCell) -> Self {
        match cell {
            SettleCell::Empty => CellVisual::Empty,
            SettleCell::Rock => CellVisual::Rock,
            SettleCell::Cube => CellVisual::Cube,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            CellVisual::Energy(v) => char::from_digit(*v as u32, 10).unwrap_or('+'),
            CellVisual::Flashing => '*',
            CellVisual::Empty => '.',
            CellVisual::Rock => 'O',
            CellVisual::Falling => 'o',
            CellVisual::Cube => '#',
        }
    }
}

/// Render target for simulation output
pub trait DisplaySink {
    /// Called before a full redraw of a `rows x cols` grid. A zero-sized frame
    /// means the active screen has no grid.
    fn begin_frame(&mut self, _rows: usize, _cols: usize) {}

    fn draw_cell(&mut self, handle: DisplayHandle, pos: Coord, visual: CellVisual);

    /// Show a named counter, already formatted to its fixed width.
    fn draw_counter(&mut self, label: &str, text: &str);
}

/// Zero-padded fixed-width counter text, e.g. `0042` for width 4.
pub fn format_counter(value: u64, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

/// Redraw every cell of an energy grid.
pub fn paint_energy<S: DisplaySink + ?Sized>(sink: &mut S, grid: &Grid<u8>) {
    let handles = HandleMap::for_grid(grid);
    sink.begin_frame(grid.rows(), grid.cols());
    for (pos, energy) in grid.iter() {
        if let Some(handle) = handles.handle(pos) {
            sink.draw_cell(handle, pos, CellVisual::Energy(energy));
        }
    }
}

/// Redraw every cell of a rock map.
pub fn paint_settle<S: DisplaySink + ?Sized>(sink: &mut S, grid: &SettleGrid) {
    let handles = HandleMap::for_grid(grid);
    sink.begin_frame(grid.rows(), grid.cols());
    for (pos, cell) in grid.iter() {
        if let Some(handle) = handles.handle(pos) {
            sink.draw_cell(handle, pos, CellVisual::for_settle(cell));
        }
    }
}

/// Character-buffer sink for terminals and logs
#[derive(Debug, Clone)]
pub struct TextSink {
    rows: usize,
    cols: usize,
    cells: Vec<char>,
    counters: BTreeMap<String, String>,
}

impl TextSink {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![' '; rows * cols],
            counters: BTreeMap::new(),
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn counter(&self, label: &str) -> Option<&str> {
        self.counters.get(label).map(String::as_str)
    }

    /// Grid rows followed by `label: value` lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.cells.chunks(self.cols.max(1)) {
            out.extend(row.iter());
            out.push('\n');
        }
        for (label, text) in &self.counters {
            out.push_str(&format!("{}: {}\n", label, text));
        }
        out
    }
}

impl DisplaySink for TextSink {
    fn begin_frame(&mut self, rows: usize, cols: usize) {
        if (rows, cols) != (self.rows, self.cols) {
            *self = Self::new(rows, cols);
        }
    }

    fn draw_cell(&mut self, handle: DisplayHandle, _pos: Coord, visual: CellVisual) {
        if let Some(cell) = self.cells.get_mut(handle.0 as usize) {
            *cell = visual.as_char();
        }
    }

    fn draw_counter(&mut self, label: &str, text: &str) {
        self.counters.insert(label.to_string(), text.to_string());
    }
}
