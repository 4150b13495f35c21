mod atomic_io;
pub mod level;
pub mod scores;

pub use level::{
    load_level_catalog, load_level_file, parse_level_json, Collectible, CollectibleKind,
    EditorPoint, EditorSpawn, GridSource, Level, LevelDef, LevelLoadError, SpawnPoint,
};
pub use scores::{
    insert_ranked, normalize_ranked, qualifies, InMemoryResultsStore, JsonFileResultsStore,
    RankedResult, RankedResultsStore, ScoreStoreError, MAX_RANKED_RESULTS, RANKED_RESULTS_FILE,
};
