use std::fs;
use std::io;
use std::path::Path;

use lazr_core::sim::DEFAULT_INITIALS;
use lazr_core::{
    load_level_catalog, resolve_app_paths, AppError, GameSession, GameTuning,
    JsonFileResultsStore, LoopConfig, Session, SessionConfig,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::autopilot::Autopilot;

const SEED_ENV_VAR: &str = "LAZR_SEED";
const INITIALS_ENV_VAR: &str = "LAZR_INITIALS";
const START_LEVEL_ENV_VAR: &str = "LAZR_START_LEVEL";
const DEFAULT_SEED: u64 = 0x1a2d_d21f;
const INITIALS_LEN: usize = 3;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: GameSession,
    pub(crate) input: Autopilot,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== LAZR DRIFT Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        levels_dir = %paths.levels_dir.display(),
        cache_dir = %paths.cache_dir.display(),
        "startup"
    );

    let tuning = load_tuning(&paths.tuning_file)?;
    let catalog = load_level_catalog(&paths.levels_dir, &tuning)?;
    let session_config = SessionConfig {
        tuning,
        seed: parse_seed(std::env::var(SEED_ENV_VAR).ok()),
        initials: normalize_initials(std::env::var(INITIALS_ENV_VAR).ok()),
        start_level: parse_start_level(std::env::var(START_LEVEL_ENV_VAR).ok()),
    };
    info!(
        levels = catalog.len(),
        seed = session_config.seed,
        initials = %session_config.initials,
        start_level = session_config.start_level,
        "session_config"
    );

    let results = JsonFileResultsStore::in_cache_dir(&paths.cache_dir);
    let session = Session::new(session_config, catalog, Box::new(results))?;

    Ok(AppWiring {
        config: LoopConfig::from_env(),
        scene: GameSession::new(session),
        input: Autopilot::default(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// The override file is optional; a missing file means shipped defaults.
fn load_tuning(path: &Path) -> Result<GameTuning, AppError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(GameTuning::default()),
        Err(source) => {
            return Err(AppError::TuningRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let tuning = GameTuning::from_json_str(&raw).map_err(|source| AppError::TuningParse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "tuning_loaded");
    Ok(tuning)
}

fn parse_seed(raw: Option<String>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_SEED;
    };
    match raw.trim().parse::<u64>() {
        Ok(seed) => seed,
        Err(_) => {
            warn!(
                env_var = SEED_ENV_VAR,
                value = raw.as_str(),
                "invalid seed; falling back to default"
            );
            DEFAULT_SEED
        }
    }
}

fn parse_start_level(raw: Option<String>) -> u32 {
    let Some(raw) = raw else {
        return 1;
    };
    match raw.trim().parse::<u32>() {
        Ok(level) if level >= 1 => level,
        _ => {
            warn!(
                env_var = START_LEVEL_ENV_VAR,
                value = raw.as_str(),
                "invalid start level; starting at level 1"
            );
            1
        }
    }
}

/// Up to three uppercase letters or digits; anything else falls back to the default.
fn normalize_initials(raw: Option<String>) -> String {
    let initials = raw
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .take(INITIALS_LEN)
        .collect::<String>();
    if initials.is_empty() {
        DEFAULT_INITIALS.to_string()
    } else {
        initials
    }
}
