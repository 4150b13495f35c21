use thiserror::Error;

use crate::app::Vec2;

/// Grid address. Row 0 is the top row; world y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn is_adjacent_to(self, other: Cell) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }

    /// Straight-line distance in cell units.
    pub fn euclidean_distance(self, other: Cell) -> f32 {
        let dr = self.row as f32 - other.row as f32;
        let dc = self.col as f32 - other.col as f32;
        (dr * dr + dc * dc).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Open,
    ScorePellet,
    PowerPellet,
    Wall,
    Pen,
    Gate,
    Spawn,
}

impl CellKind {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Open),
            1 | 7..=16 => Some(Self::Wall),
            2 => Some(Self::ScorePellet),
            3 => Some(Self::PowerPellet),
            4 => Some(Self::Spawn),
            5 => Some(Self::Pen),
            6 => Some(Self::Gate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid has no cells")]
    Empty,
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown cell code {code} at row {row}, column {col}")]
    UnknownCode { row: usize, col: usize, code: u16 },
    #[error("invalid cell value '{value}' at row {row}, column {col}")]
    InvalidCsvValue {
        row: usize,
        col: usize,
        value: String,
    },
}

/// Maze classification, built once per level and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: u32,
    cols: u32,
    tile_size: f32,
    kinds: Vec<CellKind>,
    pen_cells: Vec<Cell>,
    gate_cells: Vec<Cell>,
    spawn_cell: Option<Cell>,
}

impl Grid {
    pub fn from_codes(codes: &[Vec<u16>], tile_size: f32) -> Result<Self, GridError> {
        let cols = codes.first().map(Vec::len).unwrap_or(0);
        if codes.is_empty() || cols == 0 {
            return Err(GridError::Empty);
        }

        let mut kinds = Vec::with_capacity(codes.len() * cols);
        let mut pen_cells = Vec::new();
        let mut gate_cells = Vec::new();
        let mut spawn_cell = None;
        for (row, row_codes) in codes.iter().enumerate() {
            if row_codes.len() != cols {
                return Err(GridError::RaggedRow {
                    row,
                    expected: cols,
                    actual: row_codes.len(),
                });
            }
            for (col, &code) in row_codes.iter().enumerate() {
                let kind =
                    CellKind::from_code(code).ok_or(GridError::UnknownCode { row, col, code })?;
                let cell = Cell::new(row as u32, col as u32);
                match kind {
                    CellKind::Pen => pen_cells.push(cell),
                    CellKind::Gate => gate_cells.push(cell),
                    CellKind::Spawn if spawn_cell.is_none() => spawn_cell = Some(cell),
                    _ => {}
                }
                kinds.push(kind);
            }
        }

        Ok(Self {
            rows: codes.len() as u32,
            cols: cols as u32,
            tile_size,
            kinds,
            pen_cells,
            gate_cells,
            spawn_cell,
        })
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// World-space size of the whole maze as `(width, height)`.
    pub fn world_size(&self) -> (f32, f32) {
        (
            self.cols as f32 * self.tile_size,
            self.rows as f32 * self.tile_size,
        )
    }

    fn index_of(&self, cell: Cell) -> Option<usize> {
        if cell.row >= self.rows || cell.col >= self.cols {
            return None;
        }
        Some(cell.row as usize * self.cols as usize + cell.col as usize)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index_of(cell).is_some()
    }

    pub fn cell_kind(&self, cell: Cell) -> Option<CellKind> {
        self.index_of(cell).map(|index| self.kinds[index])
    }

    pub fn is_wall(&self, cell: Cell) -> bool {
        self.cell_kind(cell) == Some(CellKind::Wall)
    }

    /// Pathfinding passability: walls and anything outside the grid are blocked.
    pub fn is_blocked(&self, cell: Cell) -> bool {
        !matches!(self.cell_kind(cell), Some(kind) if kind != CellKind::Wall)
    }

    /// Cells the player's vehicle collides with. Outside the grid is free so the car can
    /// drive through portal margins.
    pub fn blocks_vehicle(&self, cell: Cell) -> bool {
        matches!(
            self.cell_kind(cell),
            Some(CellKind::Wall) | Some(CellKind::Gate)
        )
    }

    pub fn pen_cells(&self) -> &[Cell] {
        &self.pen_cells
    }

    pub fn gate_cells(&self) -> &[Cell] {
        &self.gate_cells
    }

    pub fn spawn_cell(&self) -> Option<Cell> {
        self.spawn_cell
    }

    pub fn cells_of_kind(&self, kind: CellKind) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols;
        self.kinds
            .iter()
            .enumerate()
            .filter(move |(_, candidate)| **candidate == kind)
            .map(move |(index, _)| Cell::new(index as u32 / cols, index as u32 % cols))
    }

    /// In-grid neighbours in the fixed order up, down, left, right.
    pub fn neighbors(&self, cell: Cell) -> [Option<Cell>; 4] {
        let up = (cell.row > 0).then(|| Cell::new(cell.row - 1, cell.col));
        let down = (cell.row + 1 < self.rows).then(|| Cell::new(cell.row + 1, cell.col));
        let left = (cell.col > 0).then(|| Cell::new(cell.row, cell.col - 1));
        let right = (cell.col + 1 < self.cols).then(|| Cell::new(cell.row, cell.col + 1));
        [up, down, left, right]
    }

    pub fn cell_at_world(&self, world: Vec2) -> Option<Cell> {
        let col = (world.x / self.tile_size).floor();
        let row = (world.y / self.tile_size).floor();
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let cell = Cell::new(row as u32, col as u32);
        self.contains(cell).then_some(cell)
    }

    pub fn cell_center_world(&self, cell: Cell) -> Vec2 {
        Vec2 {
            x: (cell.col as f32 + 0.5) * self.tile_size,
            y: (cell.row as f32 + 0.5) * self.tile_size,
        }
    }
}

/// Parses the editor's CSV tile export (one row per line, comma-separated codes).
pub fn parse_grid_csv(text: &str) -> Result<Vec<Vec<u16>>, GridError> {
    let mut rows = Vec::new();
    for (row, line) in text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
    {
        let mut codes = Vec::new();
        for (col, raw) in line.split(',').map(str::trim).enumerate() {
            let code = raw
                .parse::<u16>()
                .map_err(|_| GridError::InvalidCsvValue {
                    row,
                    col,
                    value: raw.to_string(),
                })?;
            codes.push(code);
        }
        rows.push(codes);
    }
    Ok(rows)
}

/// Builds a grid from ASCII art, one character per cell. Test helper shared across modules.
///
/// `#` wall, `.` pellet, `o` power, `P` spawn, `=` pen, `-` gate, anything else open.
#[cfg(test)]
pub(crate) fn grid_from_ascii(rows: &[&str]) -> Grid {
    let codes = rows
        .iter()
        .map(|row| {
            row.chars()
                .map(|ch| match ch {
                    '#' => 1,
                    '.' => 2,
                    'o' => 3,
                    'P' => 4,
                    '=' => 5,
                    '-' => 6,
                    _ => 0,
                })
                .collect::<Vec<u16>>()
        })
        .collect::<Vec<_>>();
    Grid::from_codes(&codes, 48.0).expect("ascii grid")
}
