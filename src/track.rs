//! Track grids and how they are loaded.
//!
//! A track is a dense, immutable grid of [`Cell`]s plus the ordered list of
//! start cells players spawn on. Tracks come from three places: the two
//! built-in reference maps, a whitespace-separated integer grid file, or
//! raw rows assembled by tests.

use std::fmt;
use std::path::Path;

/// A single track cell.
///
/// The numeric values are the wire and replay representation; a cell is
/// traversable iff its value is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// Impassable wall.
    Wall,
    /// Plain traversable cell.
    Empty,
    /// Start cell; players spawn here in row-major order.
    Start,
    /// Traversable cell the track format leaves unclassified.
    Unknown,
    /// Mask value for cells hidden from a player's view.
    NotVisible,
    /// Reaching this cell wins the race.
    Goal,
}

impl Cell {
    /// Numeric value used on the wire and in replay files.
    #[must_use]
    pub const fn value(self) -> i64 {
        match self {
            Cell::Wall => -1,
            Cell::Empty => 0,
            Cell::Start => 1,
            Cell::Unknown => 2,
            Cell::NotVisible => 3,
            Cell::Goal => 100,
        }
    }

    /// Parse a raw cell value, `None` for anything unrecognised.
    #[must_use]
    pub const fn from_value(value: i64) -> Option<Cell> {
        match value {
            -1 => Some(Cell::Wall),
            0 => Some(Cell::Empty),
            1 => Some(Cell::Start),
            2 => Some(Cell::Unknown),
            3 => Some(Cell::NotVisible),
            100 => Some(Cell::Goal),
            _ => None,
        }
    }

    /// Whether a player may occupy or cross this cell.
    #[must_use]
    pub const fn traversable(self) -> bool {
        self.value() >= 0
    }
}

/// A grid position or velocity, in (row, col) order.
///
/// Row comes first because observations and replies put the vertical
/// coordinate first on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos {
    /// Row index (vertical).
    pub row: i32,
    /// Column index (horizontal).
    pub col: i32,
}

impl Pos {
    /// Create a new position.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

impl std::ops::Add for Pos {
    type Output = Pos;

    fn add(self, rhs: Pos) -> Pos {
        Pos::new(self.row + rhs.row, self.col + rhs.col)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Error type for track construction and loading.
#[derive(Debug)]
pub enum TrackError {
    /// The track file could not be read.
    Io(std::io::Error),
    /// A grid value is not a known cell.
    UnknownCell {
        /// The offending raw value.
        value: i64,
        /// Row of the value.
        row: usize,
        /// Column of the value.
        col: usize,
    },
    /// A grid value is not an integer at all.
    NotANumber {
        /// Row of the token.
        row: usize,
        /// Column of the token.
        col: usize,
    },
    /// Grid rows have differing lengths.
    Ragged {
        /// First row whose length differs from row 0.
        row: usize,
    },
    /// The grid has no rows or no columns.
    Empty,
    /// The grid contains no start cells.
    NoStart,
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::Io(e) => write!(f, "failed to read track file: {e}"),
            TrackError::UnknownCell { value, row, col } => {
                write!(f, "unknown cell value {value} at ({row}, {col})")
            }
            TrackError::NotANumber { row, col } => {
                write!(f, "non-numeric cell at ({row}, {col})")
            }
            TrackError::Ragged { row } => {
                write!(f, "row {row} has a different length than row 0")
            }
            TrackError::Empty => write!(f, "track grid is empty"),
            TrackError::NoStart => write!(f, "track has no start cells"),
        }
    }
}

impl std::error::Error for TrackError {}

impl From<std::io::Error> for TrackError {
    fn from(e: std::io::Error) -> Self {
        TrackError::Io(e)
    }
}

/// An immutable racing track.
///
/// Frozen after construction: all mutation during a match happens on
/// players, never on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    cells: Vec<Cell>,
    height: i32,
    width: i32,
    starts: Vec<Pos>,
}

impl Track {
    /// Build a track from raw cell values, one inner `Vec` per row.
    ///
    /// Start cells are collected in row-major order.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackError`] if the grid is empty, ragged, contains an
    /// unknown value, or has no start cells.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self, TrackError> {
        let Some(first) = rows.first() else {
            return Err(TrackError::Empty);
        };
        let width = first.len();
        if width == 0 {
            return Err(TrackError::Empty);
        }
        let mut cells = Vec::with_capacity(rows.len() * width);
        let mut starts = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(TrackError::Ragged { row: r });
            }
            for (c, &value) in row.iter().enumerate() {
                let cell = Cell::from_value(value)
                    .ok_or(TrackError::UnknownCell { value, row: r, col: c })?;
                if cell == Cell::Start {
                    starts.push(Pos::new(int_pos(r), int_pos(c)));
                }
                cells.push(cell);
            }
        }
        if starts.is_empty() {
            return Err(TrackError::NoStart);
        }
        Ok(Self {
            cells,
            height: int_pos(rows.len()),
            width: int_pos(width),
            starts,
        })
    }

    /// Parse a track from whitespace-separated integer grid text.
    ///
    /// One line per row; blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackError`] for malformed text or an invalid grid.
    pub fn parse(text: &str) -> Result<Self, TrackError> {
        let mut rows: Vec<Vec<i64>> = Vec::new();
        for (r, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let mut row = Vec::new();
            for (c, token) in line.split_whitespace().enumerate() {
                let value = token
                    .parse::<i64>()
                    .map_err(|_| TrackError::NotANumber { row: r, col: c })?;
                row.push(value);
            }
            rows.push(row);
        }
        Self::from_rows(&rows)
    }

    /// Load a track from a grid file.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackError`] if the file cannot be read or the grid is
    /// invalid.
    pub fn from_file(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// The fixed 5x8 reference track used throughout the tests.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // built-in grid is well-formed
    pub fn minimal() -> Self {
        let rows = vec![
            vec![-1, -1, -1, -1, -1, -1, -1, -1],
            vec![-1, 1, 0, 0, 2, -1, -1, -1],
            vec![-1, 1, -1, 0, 2, -1, -1, -1],
            vec![-1, 1, -1, 0, 2, 0, 100, -1],
            vec![-1, -1, -1, -1, -1, -1, -1, -1],
        ];
        Self::from_rows(&rows).expect("built-in track is well-formed")
    }

    /// A small open map with a 2x3 goal block, good for quick races.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // built-in grid is well-formed
    pub fn playable() -> Self {
        let rows = vec![
            vec![-1, -1, -1, -1, -1, -1, -1, -1],
            vec![-1, 1, 0, 0, 2, 100, 100, -1],
            vec![-1, 1, 0, 0, 2, 100, 100, -1],
            vec![-1, 1, 0, 0, 2, 100, 100, -1],
            vec![-1, -1, -1, -1, -1, -1, -1, -1],
        ];
        Self::from_rows(&rows).expect("built-in track is well-formed")
    }

    /// Cell at `(row, col)`, `None` outside the grid.
    #[must_use]
    pub fn get(&self, row: i64, col: i64) -> Option<Cell> {
        if row < 0 || col < 0 || row >= i64::from(self.height) || col >= i64::from(self.width) {
            return None;
        }
        let index = usize::try_from(row * i64::from(self.width) + col).ok()?;
        self.cells.get(index).copied()
    }

    /// Cell at a position, `None` outside the grid.
    #[must_use]
    pub fn cell_at(&self, pos: Pos) -> Option<Cell> {
        self.get(i64::from(pos.row), i64::from(pos.col))
    }

    /// Whether a position lies inside the grid.
    #[must_use]
    pub fn contains(&self, pos: Pos) -> bool {
        self.cell_at(pos).is_some()
    }

    /// Grid shape as `(height, width)`.
    #[must_use]
    pub const fn shape(&self) -> (i32, i32) {
        (self.height, self.width)
    }

    /// Start cells in row-major order.
    #[must_use]
    pub fn starts(&self) -> &[Pos] {
        &self.starts
    }

    /// The full grid as raw cell values, row-major.
    #[must_use]
    pub fn raw_rows(&self) -> Vec<Vec<i64>> {
        let width = usize::try_from(self.width).unwrap_or_default();
        self.cells
            .chunks(width)
            .map(|row| row.iter().map(|c| c.value()).collect())
            .collect()
    }
}

/// Convert a grid extent to `i32`, saturating on absurd sizes.
fn int_pos(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
