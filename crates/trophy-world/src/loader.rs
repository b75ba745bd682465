//! Text-grid loading for both demos.
//!
//! Energy grids degrade gracefully: a missing or malformed file yields a random
//! grid. Rock maps are a strict contract: a missing file falls back to the
//! built-in example map, but a malformed one is an error.

use crate::grid::Grid;
use crate::settle::SettleGrid;
use rand::Rng;
use std::path::PathBuf;
use tracing::{info, warn};
use trophy_core::{Error, Result, SettleCell, SettleMode};

/// Built-in rock map used when no map file is present
pub const EXAMPLE_ROCK_MAP: &str = "\
O....#....
O.OO#....#
.....##...
OO.#O....O
.O.....O#.
O.#..O.#.#
..O..#O..O
.......O..
#....###..
#OO..#....
";

/// Built-in sand cave used by drop mode when no map file is present.
/// The source above column 8 is open all the way down.
pub const EXAMPLE_CAVE_MAP: &str = "\
............
............
............
............
......#...##
......#...#.
....###...#.
..........#.
..........#.
..#########.
";

/// Fallback map matching a settling mode.
pub fn example_map(mode: SettleMode) -> &'static str {
    match mode {
        SettleMode::Drop => EXAMPLE_CAVE_MAP,
        SettleMode::Bulk => EXAMPLE_ROCK_MAP,
    }
}

/// Where a demo's starting grid comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridSource {
    /// A text file on the device filesystem
    File(PathBuf),
    /// Inline text, mostly for tests and embedded maps
    Text(String),
    /// No input at all; use the demo's fallback
    Absent,
}

impl GridSource {
    /// Fetch the raw text. A file that does not exist maps to `ResourceMissing`.
    pub fn read(&self) -> Result<String> {
        match self {
            GridSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ResourceMissing(path.display().to_string())
                } else {
                    Error::Io(e)
                }
            }),
            GridSource::Text(text) => Ok(text.clone()),
            GridSource::Absent => Err(Error::ResourceMissing("no grid source".to_string())),
        }
    }
}

/// Parse digit rows. Each of the first `rows` lines needs at least `cols`
/// digits; anything after column `cols` is ignored.
pub fn parse_energy_grid(text: &str, rows: usize, cols: usize) -> Result<Grid<u8>> {
    let mut lines = text.lines();
    let mut grid = Grid::new(rows, cols);

    for row in 0..rows {
        let line = lines
            .next()
            .ok_or_else(|| Error::malformed(row + 1, format!("expected {} rows", rows)))?;
        let digits: Vec<char> = line.chars().take(cols).collect();
        if digits.len() < cols {
            return Err(Error::malformed(
                row + 1,
                format!("expected at least {} digits, found {}", cols, digits.len()),
            ));
        }

        for (col, c) in digits.into_iter().enumerate() {
            let value = c
                .to_digit(10)
                .ok_or_else(|| Error::malformed(row + 1, format!("'{}' is not a digit", c)))?;
            grid.set(trophy_core::Coord::new(row, col), value as u8)?;
        }
    }

    Ok(grid)
}

/// Uniform random energy in `0..=max_energy` for every cell.
pub fn random_energy_grid<R: Rng>(rows: usize, cols: usize, max_energy: u8, rng: &mut R) -> Grid<u8> {
    let mut grid = Grid::new(rows, cols);
    for value in grid.values_mut() {
        *value = rng.gen_range(0..=max_energy);
    }
    grid
}

/// Load the starting energy grid, falling back to random values on any failure.
pub fn load_energy_grid<R: Rng>(
    source: &GridSource,
    rows: usize,
    cols: usize,
    max_energy: u8,
    rng: &mut R,
) -> Grid<u8> {
    let parsed = source
        .read()
        .and_then(|text| parse_energy_grid(&text, rows, cols));

    match parsed {
        Ok(grid) => {
            info!(rows, cols, "Loaded energy grid from input");
            grid
        }
        Err(e) => {
            warn!(error = %e, "Energy grid unavailable, generating random grid");
            random_energy_grid(rows, cols, max_energy, rng)
        }
    }
}

/// Parse a rock map: exactly `rows` lines of exactly `cols` characters from `.O#`.
pub fn parse_settle_map(text: &str, rows: usize, cols: usize) -> Result<SettleGrid> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != rows {
        return Err(Error::malformed(
            lines.len().min(rows) + 1,
            format!("expected {} rows, found {}", rows, lines.len()),
        ));
    }

    let mut cells = Vec::with_capacity(rows);
    for (i, line) in lines.iter().enumerate() {
        let row: Vec<SettleCell> = line
            .chars()
            .map(|c| {
                SettleCell::from_char(c)
                    .ok_or_else(|| Error::malformed(i + 1, format!("unrecognized character '{}'", c)))
            })
            .collect::<Result<_>>()?;

        if row.len() != cols {
            return Err(Error::malformed(
                i + 1,
                format!("expected {} cells, found {}", cols, row.len()),
            ));
        }
        cells.push(row);
    }

    Grid::from_rows(cells)
}

/// Load a rock map. Only a missing resource falls back to `fallback`;
/// malformed content in either is returned as an error.
pub fn load_settle_map(
    source: &GridSource,
    fallback: &str,
    rows: usize,
    cols: usize,
) -> Result<SettleGrid> {
    let text = match source.read() {
        Ok(text) => text,
        Err(Error::ResourceMissing(what)) => {
            warn!(missing = %what, "Rock map missing, using built-in example");
            fallback.to_string()
        }
        Err(e) => return Err(e),
    };

    parse_settle_map(&text, rows, cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;
    use trophy_core::Coord;

    #[test]
    fn test_parse_energy_grid() {
        let grid = parse_energy_grid("123x\n4567\n", 2, 3).unwrap();
        assert_eq!(grid.to_string(), "123\n456\n");
    }

    #[test]
    fn test_parse_energy_grid_rejects_bad_input() {
        assert!(matches!(
            parse_energy_grid("12\n34\n", 2, 3),
            Err(Error::MalformedInput { line: 1, .. })
        ));
        assert!(matches!(
            parse_energy_grid("123\n4a6\n", 2, 3),
            Err(Error::MalformedInput { line: 2, .. })
        ));
        assert!(matches!(
            parse_energy_grid("123\n", 2, 3),
            Err(Error::MalformedInput { line: 2, .. })
        ));
    }

    #[test]
    fn test_random_grid_is_bounded_and_seeded() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let grid = random_energy_grid(10, 10, 8, &mut rng);
        assert!(grid.iter().all(|(_, v)| v <= 8));

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(grid, random_energy_grid(10, 10, 8, &mut rng));
    }

    #[test]
    fn test_energy_falls_back_when_missing_or_malformed() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let missing = GridSource::File(PathBuf::from("/nonexistent/octopus.txt"));
        let grid = load_energy_grid(&missing, 10, 10, 8, &mut rng);
        assert_eq!(grid.dimensions(), (10, 10));
        assert!(grid.iter().all(|(_, v)| v <= 8));

        let malformed = GridSource::Text("not digits\n".to_string());
        let grid = load_energy_grid(&malformed, 10, 10, 8, &mut rng);
        assert!(grid.iter().all(|(_, v)| v <= 8));
    }

    #[test]
    fn test_energy_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "90\n09\n").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let source = GridSource::File(file.path().to_path_buf());
        let grid = load_energy_grid(&source, 2, 2, 8, &mut rng);
        assert_eq!(grid.get(Coord::new(0, 0)).unwrap(), 9);
        assert_eq!(grid.get(Coord::new(1, 1)).unwrap(), 9);
    }

    #[test]
    fn test_parse_settle_map() {
        let grid = parse_settle_map("O.#\n...\n", 2, 3).unwrap();
        assert_eq!(grid.get(Coord::new(0, 0)).unwrap(), SettleCell::Rock);
        assert_eq!(grid.get(Coord::new(0, 2)).unwrap(), SettleCell::Cube);
        assert_eq!(grid.to_string(), "O.#\n...\n");
    }

    #[test]
    fn test_parse_settle_map_is_strict() {
        assert!(matches!(
            parse_settle_map("O.x\n...\n", 2, 3),
            Err(Error::MalformedInput { line: 1, .. })
        ));
        assert!(matches!(
            parse_settle_map("O.\n...\n", 2, 3),
            Err(Error::MalformedInput { line: 1, .. })
        ));
        assert!(matches!(
            parse_settle_map("O..\n....\n", 2, 3),
            Err(Error::MalformedInput { line: 2, .. })
        ));
        assert!(matches!(
            parse_settle_map("O..\n...\n...\n", 2, 3),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_settle_fallback_only_when_missing() {
        let missing = GridSource::File(PathBuf::from("/nonexistent/rocks.txt"));
        let grid = load_settle_map(&missing, EXAMPLE_ROCK_MAP, 10, 10).unwrap();
        assert_eq!(grid.to_string(), EXAMPLE_ROCK_MAP);

        let grid = load_settle_map(&GridSource::Absent, EXAMPLE_ROCK_MAP, 10, 10).unwrap();
        assert_eq!(grid.to_string(), EXAMPLE_ROCK_MAP);

        let grid = load_settle_map(&GridSource::Absent, example_map(SettleMode::Drop), 10, 12).unwrap();
        assert_eq!(grid.to_string(), EXAMPLE_CAVE_MAP);

        let malformed = GridSource::Text("O?........\n".repeat(10));
        let err = load_settle_map(&malformed, EXAMPLE_ROCK_MAP, 10, 10).unwrap_err();
        assert!(err.is_fatal());
    }
}
