use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::app::Vec2;
use crate::config::GameTuning;
use crate::sim::grid::{parse_grid_csv, CellKind, Grid, GridError};

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error("failed to read level file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list level directory {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse level json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
    #[error("level has no playerSpawn entry and no spawn cell")]
    MissingPlayerSpawn,
    #[error("editorTileSize must be positive, got {0}")]
    InvalidEditorTileSize(f32),
    #[error("non-finite coordinate at {field}")]
    NonFiniteCoordinate { field: String },
    #[error("no level files found in {dir}")]
    EmptyCatalog { dir: PathBuf },
}

/// Grid payload: either the code table itself or the editor's CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSource {
    Codes(Vec<Vec<u16>>),
    Csv(String),
}

/// A point in editor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorSpawn {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
}

/// On-disk level format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDef {
    #[serde(default)]
    pub name: Option<String>,
    pub grid: GridSource,
    #[serde(default)]
    pub editor_tile_size: Option<f32>,
    #[serde(default)]
    pub dots: Option<Vec<EditorPoint>>,
    #[serde(default)]
    pub powers: Option<Vec<EditorPoint>>,
    #[serde(default)]
    pub player_spawn: Option<EditorSpawn>,
    #[serde(default)]
    pub enemy_spawns: Vec<EditorSpawn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectibleKind {
    ScorePellet,
    PowerPellet,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub position: Vec2,
    pub kind: CollectibleKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec2,
    pub rotation_degrees: f32,
}

/// A level resolved into world coordinates, ready for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub name: String,
    pub grid: Grid,
    pub collectibles: Vec<Collectible>,
    pub player_spawn: SpawnPoint,
    /// Empty means enemies are placed on shuffled pen cells.
    pub enemy_spawns: Vec<SpawnPoint>,
}

impl Level {
    pub fn score_pellet_count(&self) -> usize {
        self.collectibles
            .iter()
            .filter(|collectible| collectible.kind == CollectibleKind::ScorePellet)
            .count()
    }
}

pub fn parse_level_json(raw: &str) -> Result<LevelDef, LevelLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, LevelDef>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        LevelLoadError::Parse {
            path,
            source: error.into_inner(),
        }
    })
}

impl LevelDef {
    /// A bare grid; collectibles and the player spawn come from the cell codes.
    pub fn from_codes(codes: Vec<Vec<u16>>) -> Self {
        Self {
            name: None,
            grid: GridSource::Codes(codes),
            editor_tile_size: None,
            dots: None,
            powers: None,
            player_spawn: None,
            enemy_spawns: Vec::new(),
        }
    }

    pub fn resolve(
        &self,
        fallback_name: &str,
        tuning: &GameTuning,
    ) -> Result<Level, LevelLoadError> {
        let codes = match &self.grid {
            GridSource::Codes(codes) => codes.clone(),
            GridSource::Csv(text) => parse_grid_csv(text)?,
        };
        let grid = Grid::from_codes(&codes, tuning.tile_size)?;

        let editor_tile_size = self.editor_tile_size.unwrap_or(tuning.editor_tile_size);
        if editor_tile_size.is_nan() || editor_tile_size <= 0.0 {
            return Err(LevelLoadError::InvalidEditorTileSize(editor_tile_size));
        }
        let scale = tuning.editor_scale(editor_tile_size);

        let mut collectibles = Vec::new();
        collect_pickups(
            &mut collectibles,
            self.dots.as_deref(),
            "dots",
            CollectibleKind::ScorePellet,
            CellKind::ScorePellet,
            &grid,
            scale,
        )?;
        collect_pickups(
            &mut collectibles,
            self.powers.as_deref(),
            "powers",
            CollectibleKind::PowerPellet,
            CellKind::PowerPellet,
            &grid,
            scale,
        )?;

        let player_spawn = match self.player_spawn {
            Some(spawn) => scale_spawn(spawn, scale, "playerSpawn")?,
            None => {
                let cell = grid.spawn_cell().ok_or(LevelLoadError::MissingPlayerSpawn)?;
                SpawnPoint {
                    position: grid.cell_center_world(cell),
                    rotation_degrees: 0.0,
                }
            }
        };

        let enemy_spawns = self
            .enemy_spawns
            .iter()
            .enumerate()
            .map(|(index, spawn)| scale_spawn(*spawn, scale, &format!("enemySpawns[{index}]")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Level {
            name: self
                .name
                .clone()
                .unwrap_or_else(|| fallback_name.to_string()),
            grid,
            collectibles,
            player_spawn,
            enemy_spawns,
        })
    }
}

fn collect_pickups(
    out: &mut Vec<Collectible>,
    listed: Option<&[EditorPoint]>,
    field: &str,
    kind: CollectibleKind,
    cell_kind: CellKind,
    grid: &Grid,
    scale: f32,
) -> Result<(), LevelLoadError> {
    match listed {
        Some(points) => {
            for (index, point) in points.iter().enumerate() {
                let position =
                    scale_point(point.x, point.y, scale, || format!("{field}[{index}]"))?;
                out.push(Collectible { position, kind });
            }
        }
        None => out.extend(grid.cells_of_kind(cell_kind).map(|cell| Collectible {
            position: grid.cell_center_world(cell),
            kind,
        })),
    }
    Ok(())
}

fn scale_spawn(spawn: EditorSpawn, scale: f32, field: &str) -> Result<SpawnPoint, LevelLoadError> {
    let position = scale_point(spawn.x, spawn.y, scale, || field.to_string())?;
    if !spawn.rotation.is_finite() {
        return Err(LevelLoadError::NonFiniteCoordinate {
            field: format!("{field}.rotation"),
        });
    }
    Ok(SpawnPoint {
        position,
        rotation_degrees: spawn.rotation,
    })
}

fn scale_point(
    x: f32,
    y: f32,
    scale: f32,
    field: impl FnOnce() -> String,
) -> Result<Vec2, LevelLoadError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(LevelLoadError::NonFiniteCoordinate { field: field() });
    }
    Ok(Vec2::new(x * scale, y * scale))
}

/// Loads one level file. `.json` files are [`LevelDef`]s; `.csv` files are bare editor grids.
pub fn load_level_file(path: &Path, tuning: &GameTuning) -> Result<Level, LevelLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LevelLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let def = if is_csv {
        LevelDef::from_codes(parse_grid_csv(&raw)?)
    } else {
        parse_level_json(&raw)?
    };

    let fallback_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("level");
    let level = def.resolve(fallback_name, tuning)?;
    let (rows, cols) = level.grid.dimensions();
    info!(
        level = %level.name,
        rows,
        cols,
        dots = level.score_pellet_count(),
        enemy_spawns = level.enemy_spawns.len(),
        "level_loaded"
    );
    Ok(level)
}

/// Every `.json`/`.csv` level in `dir`, ordered by file name.
pub fn load_level_catalog(dir: &Path, tuning: &GameTuning) -> Result<Vec<Level>, LevelLoadError> {
    let entries = fs::read_dir(dir).map_err(|source| LevelLoadError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LevelLoadError::ReadDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_level = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "json" || ext == "csv");
        if is_level {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(LevelLoadError::EmptyCatalog {
            dir: dir.to_path_buf(),
        });
    }
    paths
        .iter()
        .map(|path| load_level_file(path, tuning))
        .collect()
}
