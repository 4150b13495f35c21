use super::*;
use crate::app::InputAction;
use crate::content::{InMemoryResultsStore, ScoreStoreError, SpawnPoint};
use crate::sim::grid::{grid_from_ascii, Cell, Grid};

const STEP: Duration = Duration::from_millis(10);

fn boxed_grid(rows: usize, cols: usize) -> Grid {
    let wall = "#".repeat(cols);
    let inner = format!("#{}#", " ".repeat(cols - 2));
    let lines = (0..rows)
        .map(|row| {
            if row == 0 || row + 1 == rows {
                wall.clone()
            } else {
                inner.clone()
            }
        })
        .collect::<Vec<_>>();
    let refs = lines.iter().map(String::as_str).collect::<Vec<_>>();
    grid_from_ascii(&refs)
}

fn spawn_at(grid: &Grid, row: u32, col: u32) -> SpawnPoint {
    SpawnPoint {
        position: grid.cell_center_world(Cell::new(row, col)),
        rotation_degrees: 0.0,
    }
}

fn pellet(grid: &Grid, row: u32, col: u32, kind: CollectibleKind) -> Collectible {
    Collectible {
        position: grid.cell_center_world(Cell::new(row, col)),
        kind,
    }
}

/// Ten dots along the middle row, one power pellet in the far corner, no enemies.
fn corridor_level() -> Level {
    let grid = boxed_grid(5, 24);
    let mut collectibles = (0..10)
        .map(|i| pellet(&grid, 2, 2 + 2 * i, CollectibleKind::ScorePellet))
        .collect::<Vec<_>>();
    collectibles.push(pellet(&grid, 3, 22, CollectibleKind::PowerPellet));
    Level {
        name: "corridor".to_string(),
        player_spawn: spawn_at(&grid, 2, 1),
        enemy_spawns: Vec::new(),
        collectibles,
        grid,
    }
}

/// Open room with one enemy that has no gate to leave through, so it holds still.
fn arena_level(name: &str) -> Level {
    let grid = boxed_grid(7, 9);
    Level {
        name: name.to_string(),
        player_spawn: spawn_at(&grid, 3, 1),
        enemy_spawns: vec![spawn_at(&grid, 3, 6)],
        collectibles: vec![pellet(&grid, 1, 4, CollectibleKind::ScorePellet)],
        grid,
    }
}

fn new_session(levels: Vec<Level>, store: InMemoryResultsStore) -> Session {
    let config = SessionConfig {
        seed: 7,
        ..SessionConfig::default()
    };
    Session::new(config, levels, Box::new(store)).expect("session")
}

fn advance(session: &mut Session, duration: Duration) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let mut elapsed = Duration::ZERO;
    while elapsed < duration {
        events.extend(session.tick(STEP, &InputSnapshot::empty()));
        elapsed += STEP;
    }
    events
}

fn advance_until_running(session: &mut Session) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for _ in 0..1_000 {
        if session.phase() == SessionPhase::Running {
            return events;
        }
        events.extend(session.tick(STEP, &InputSnapshot::empty()));
    }
    panic!("session never reached Running, stuck in {:?}", session.phase());
}

/// Parks the car on the given enemy and ticks once.
fn ram_enemy(session: &mut Session, slot: usize) -> Vec<SessionEvent> {
    session.player.position = session.enemies[slot].position;
    session.tick(STEP, &InputSnapshot::empty())
}

/// Sends enemy 0 out on patrol with a fresh decision, ticks once and reports its speed.
fn patrol_speed(session: &mut Session) -> f32 {
    let enemy = &mut session.enemies[0];
    enemy.reset_to_spawn();
    enemy.mode = EnemyMode::Patrolling;
    session.tick(STEP, &InputSnapshot::empty());
    session.enemies()[0].velocity.length()
}

/// Parks the car on the first remaining dot and ticks once.
fn clear_single_dot(session: &mut Session) -> Vec<SessionEvent> {
    advance_until_running(session);
    session.player.position = session.level().collectibles[0].position;
    session.tick(STEP, &InputSnapshot::empty())
}

fn count(events: &[SessionEvent], wanted: impl Fn(&SessionEvent) -> bool) -> usize {
    events.iter().filter(|event| wanted(event)).count()
}

struct OfflineStore;

impl RankedResultsStore for OfflineStore {
    fn load_ranked_results(&self) -> Result<Vec<RankedResult>, ScoreStoreError> {
        Err(ScoreStoreError::Unavailable("offline".to_string()))
    }

    fn save_ranked_results(&mut self, _results: &[RankedResult]) -> Result<(), ScoreStoreError> {
        Err(ScoreStoreError::Unavailable("offline".to_string()))
    }
}

#[test]
fn ready_banner_holds_the_world_for_the_configured_time() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    assert_eq!(session.phase(), SessionPhase::ReadyCountdown);
    assert_eq!(session.snapshot().banner.as_deref(), Some(READY_BANNER));

    advance(&mut session, Duration::from_millis(1_390));
    assert_eq!(session.phase(), SessionPhase::ReadyCountdown);
    let events = advance(&mut session, STEP);
    assert_eq!(events, vec![SessionEvent::RoundLive]);
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(session.snapshot().banner, None);
}

#[test]
fn collecting_every_dot_advances_exactly_once_without_power() {
    let mut session = new_session(vec![corridor_level()], InMemoryResultsStore::default());
    let mut events = advance_until_running(&mut session);

    let dots = session
        .level()
        .collectibles
        .iter()
        .filter(|collectible| collectible.kind == CollectibleKind::ScorePellet)
        .map(|collectible| collectible.position)
        .collect::<Vec<_>>();
    assert_eq!(dots.len(), 10);

    for dot in dots {
        session.player.position = dot;
        events.extend(session.tick(STEP, &InputSnapshot::empty()));
    }
    events.extend(advance(&mut session, Duration::from_millis(500)));

    assert_eq!(
        count(&events, |event| matches!(event, SessionEvent::LevelCleared { .. })),
        1
    );
    assert_eq!(
        count(&events, |event| matches!(event, SessionEvent::PowerStarted)),
        0
    );
    assert_eq!(session.score(), 100);
    assert!(!session.is_powered());
    // A single-level catalog wraps straight back to a fresh level 1 with all ten dots.
    assert_eq!(session.level_number(), 1);
    assert_eq!(session.level().score_pellet_count(), 10);
}

#[test]
fn three_hits_from_a_dangerous_enemy_end_the_run_without_a_fourth_dying() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    let mut dying_entries = 0;

    for hit in 1..=3u32 {
        let events = ram_enemy(&mut session, 0);
        assert!(events.contains(&SessionEvent::PlayerHit {
            lives_left: 3 - hit
        }));
        assert_eq!(session.lives(), 3 - hit);
        assert_eq!(session.score(), 0);

        if session.phase() == SessionPhase::Dying {
            dying_entries += 1;
            advance(&mut session, Duration::from_millis(1_300));
            assert_eq!(session.phase(), SessionPhase::ReadyCountdown);
            assert_eq!(
                session.player_position(),
                session.level().player_spawn.position
            );
            assert_eq!(
                session.enemies()[0].position,
                session.enemies()[0].spawn_position()
            );
            advance_until_running(&mut session);
        }
    }

    assert_eq!(dying_entries, 2);
    assert_eq!(session.phase(), SessionPhase::GameOver);
    let events = advance(&mut session, Duration::from_millis(1_500));
    assert!(events.contains(&SessionEvent::RunFinished {
        score: 0,
        rank: None
    }));
    let summary = session.ended().expect("run finished");
    assert!(!summary.quit);
    assert!(session.tick(STEP, &InputSnapshot::empty()).is_empty());
}

#[test]
fn death_countdown_walks_through_banner_stages() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    ram_enemy(&mut session, 0);
    advance(&mut session, Duration::from_millis(1_300));

    let banner = |session: &Session| session.snapshot().banner;
    assert_eq!(banner(&session).as_deref(), Some("3"));
    advance(&mut session, Duration::from_millis(1_000));
    assert_eq!(banner(&session).as_deref(), Some("2"));
    advance(&mut session, Duration::from_millis(1_000));
    assert_eq!(banner(&session).as_deref(), Some("1"));
    advance(&mut session, Duration::from_millis(1_000));
    assert_eq!(banner(&session).as_deref(), Some("GO!"));
    assert_eq!(session.phase(), SessionPhase::ReadyCountdown);
    advance(&mut session, Duration::from_millis(500));
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(banner(&session), None);
}

#[test]
fn capture_scores_once_and_respawns_the_enemy_non_eatable() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    session.start_power();
    assert!(session.enemies()[0].eatable);

    let events = ram_enemy(&mut session, 0);
    assert!(events.contains(&SessionEvent::EnemyCaptured { slot: 0 }));
    assert_eq!(session.score(), 200);
    assert_eq!(session.lives(), 3);
    assert!(!session.enemies()[0].enabled);

    // Still parked on the captured enemy: nothing else happens.
    let events = session.tick(STEP, &InputSnapshot::empty());
    assert!(events.is_empty());
    assert_eq!(session.score(), 200);

    session.player.position = session.level().player_spawn.position;
    let events = advance(&mut session, Duration::from_millis(900));
    assert!(events.contains(&SessionEvent::EnemyRespawned { slot: 0 }));
    let enemy = &session.enemies()[0];
    assert!(enemy.enabled);
    assert!(!enemy.eatable);
    assert_eq!(enemy.mode, EnemyMode::Leaving);
    assert_eq!(enemy.position, enemy.spawn_position());

    // Power is still on, but this enemy stays dangerous until the next power pellet.
    assert!(session.is_powered());
    let events = ram_enemy(&mut session, 0);
    assert!(events.contains(&SessionEvent::PlayerHit { lives_left: 2 }));
    assert_eq!(session.score(), 200);

    // Dying does not hand the flag back either.
    advance_until_running(&mut session);
    assert_eq!(session.enemies()[0].position, session.enemies()[0].spawn_position());
    assert!(!session.enemies()[0].eatable);
}

#[test]
fn power_expires_on_the_world_clock_and_leaves_eatable_flags_alone() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    session.start_power();

    let events = advance(&mut session, Duration::from_millis(5_990));
    assert!(!events.contains(&SessionEvent::PowerEnded));
    assert!(session.is_powered());

    let events = advance(&mut session, STEP);
    assert_eq!(events, vec![SessionEvent::PowerEnded]);
    assert!(!session.is_powered());
    assert!(session.enemies()[0].eatable);
    assert!(session.snapshot().enemies[0].danger);
}

#[test]
fn power_pellet_pickup_turns_every_enemy_eatable() {
    let mut level = arena_level("a");
    let power = pellet(&level.grid, 5, 2, CollectibleKind::PowerPellet);
    level.collectibles.push(power);
    let mut session = new_session(vec![level], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    session.enemies[0].eatable = false;

    session.player.position = power.position;
    let events = session.tick(STEP, &InputSnapshot::empty());
    assert_eq!(events, vec![SessionEvent::PowerStarted]);
    assert!(session.is_powered());
    assert!(session.enemies()[0].eatable);
    assert!(!session.snapshot().enemies[0].danger);
    assert_eq!(session.level().collectibles.len(), 1);
}

#[test]
fn one_damage_hit_per_tick_even_with_two_enemies_touching() {
    let mut level = arena_level("a");
    level.enemy_spawns.push(spawn_at(&level.grid, 5, 6));
    let mut session = new_session(vec![level], InMemoryResultsStore::default());
    advance_until_running(&mut session);

    let target = session.enemies[0].position;
    session.enemies[1].position = target;
    session.player.position = target;
    let events = session.tick(STEP, &InputSnapshot::empty());
    assert_eq!(
        count(&events, |event| matches!(event, SessionEvent::PlayerHit { .. })),
        1
    );
    assert_eq!(session.lives(), 2);
}

#[test]
fn pause_toggles_only_while_live_and_freezes_agents() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    let pause = InputSnapshot::empty().with_pause_pressed(true);

    session.tick(STEP, &pause);
    assert_eq!(session.phase(), SessionPhase::ReadyCountdown);

    advance_until_running(&mut session);
    assert!(patrol_speed(&mut session) > 0.0);
    let throttle = InputSnapshot::empty().with_action_down(InputAction::Accelerate, true);
    for _ in 0..10 {
        session.tick(STEP, &throttle);
    }
    assert!(session.snapshot().player.speed > 0.0);
    assert!(session.enemies()[0].velocity.length() > 0.0);

    session.tick(STEP, &pause);
    assert_eq!(session.phase(), SessionPhase::Paused);
    assert_eq!(session.snapshot().player.speed, 0.0);
    assert!(session
        .enemies()
        .iter()
        .all(|enemy| enemy.velocity == Vec2::ZERO));
    let parked = session.player_position();
    let enemy_parked = session.enemies()[0].position;
    for _ in 0..10 {
        session.tick(STEP, &throttle);
    }
    assert_eq!(session.player_position(), parked);
    assert_eq!(session.enemies()[0].position, enemy_parked);

    session.tick(STEP, &pause);
    assert_eq!(session.phase(), SessionPhase::Running);
}

#[test]
fn restarting_discards_effects_scheduled_before_the_restart() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    ram_enemy(&mut session, 0);
    assert_eq!(session.phase(), SessionPhase::Dying);

    session.restart_level();
    assert_eq!(session.lives(), 2);
    assert_eq!(session.snapshot().banner.as_deref(), Some(READY_BANNER));

    let events = advance(&mut session, Duration::from_millis(1_400));
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(
        count(&events, |event| matches!(event, SessionEvent::RoundLive)),
        1
    );
    advance(&mut session, Duration::from_millis(3_000));
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(session.snapshot().banner, None);
}

#[test]
fn quit_ends_the_session_and_later_ticks_do_nothing() {
    let mut session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    advance_until_running(&mut session);
    let clock = session.clock();

    session.quit();
    let summary = session.ended().expect("ended");
    assert!(summary.quit);
    assert!(session.tick(STEP, &InputSnapshot::empty()).is_empty());
    assert_eq!(session.clock(), clock);

    session.new_game();
    assert!(session.ended().is_none());
    assert_eq!(session.phase(), SessionPhase::ReadyCountdown);
}

#[test]
fn game_over_records_a_qualifying_score_under_the_initials() {
    let store = InMemoryResultsStore::with_results(vec![RankedResult::new("ZZZ", 50)]);
    let mut session = new_session(vec![arena_level("a")], store.clone());
    assert_eq!(session.high_score(), 50);

    advance_until_running(&mut session);
    session.add_score(300);
    assert_eq!(session.high_score(), 300);
    for _ in 0..3 {
        ram_enemy(&mut session, 0);
        if session.phase() == SessionPhase::Dying {
            advance(&mut session, Duration::from_millis(1_300));
            advance_until_running(&mut session);
        }
    }
    let events = advance(&mut session, Duration::from_millis(1_500));

    assert!(events.contains(&SessionEvent::RunFinished {
        score: 300,
        rank: Some(1)
    }));
    assert_eq!(
        store.results(),
        vec![RankedResult::new("AAA", 300), RankedResult::new("ZZZ", 50)]
    );
}

#[test]
fn unavailable_results_store_never_blocks_gameplay() {
    let config = SessionConfig::default();
    let mut session =
        Session::new(config, vec![arena_level("a")], Box::new(OfflineStore)).expect("session");
    assert_eq!(session.high_score(), 0);

    advance_until_running(&mut session);
    session.add_score(10);
    for _ in 0..3 {
        ram_enemy(&mut session, 0);
        if session.phase() == SessionPhase::Dying {
            advance(&mut session, Duration::from_millis(1_300));
            advance_until_running(&mut session);
        }
    }
    advance(&mut session, Duration::from_millis(1_500));
    assert!(session.ended().is_some());
}

#[test]
fn level_number_wraps_to_one_after_the_last_catalog_level() {
    let catalog = vec![arena_level("a"), arena_level("b"), arena_level("c")];
    let mut session = new_session(catalog, InMemoryResultsStore::default());
    assert_eq!((session.level_number(), session.level().name.as_str()), (1, "a"));

    for (cleared, next, name) in [(1, 2, "b"), (2, 3, "c"), (3, 1, "a")] {
        let events = clear_single_dot(&mut session);
        assert!(events.contains(&SessionEvent::LevelCleared { level: cleared }));
        assert_eq!(session.level_number(), next);
        assert_eq!(session.level().name, name);
    }
    assert_eq!(session.score(), 30);

    session.new_game_at_level(4);
    assert_eq!((session.level_number(), session.level().name.as_str()), (1, "a"));
    session.new_game_at_level(3);
    assert_eq!((session.level_number(), session.level().name.as_str()), (3, "c"));
}

#[test]
fn enemy_speed_scales_with_level_and_drops_under_power() {
    let tuning = GameTuning::default();
    let catalog = vec![arena_level("a"), arena_level("b"), arena_level("c")];
    let mut session = new_session(catalog, InMemoryResultsStore::default());

    advance_until_running(&mut session);
    let base = patrol_speed(&mut session);
    assert!((base - tuning.enemy_base_speed).abs() < 1e-2);

    session.start_power();
    let powered = patrol_speed(&mut session);
    let expected = tuning.enemy_base_speed * tuning.enemy_power_speed_multiplier;
    assert!((powered - expected).abs() < 1e-2);

    session.new_game_at_level(3);
    advance_until_running(&mut session);
    let level_three = patrol_speed(&mut session);
    let expected = tuning.enemy_base_speed * tuning.enemy_level_speed_growth.powi(2);
    assert!((level_three - expected).abs() < 1e-2);

    // Clearing the last level brings the speed back to base.
    clear_single_dot(&mut session);
    assert_eq!(session.level_number(), 1);
    advance_until_running(&mut session);
    assert!((patrol_speed(&mut session) - tuning.enemy_base_speed).abs() < 1e-2);
}

#[test]
fn eatable_flags_carry_per_slot_into_the_next_level() {
    let catalog = vec![arena_level("a"), arena_level("b")];
    let mut session = new_session(catalog, InMemoryResultsStore::default());
    advance_until_running(&mut session);
    session.enemies[0].eatable = false;

    let dot = session.level().collectibles[0].position;
    session.player.position = dot;
    let events = session.tick(STEP, &InputSnapshot::empty());
    assert!(events.contains(&SessionEvent::LevelCleared { level: 1 }));
    assert_eq!(session.level_number(), 2);
    assert!(!session.enemies()[0].eatable);

    session.new_game();
    assert!(session.enemies()[0].eatable);
}

#[test]
fn pen_spawns_pick_up_to_four_distinct_pen_cells_deterministically() {
    let grid = grid_from_ascii(&[
        "##########", //
        "#   P    #", //
        "####-#####", //
        "#======= #", //
        "##########",
    ]);
    let level = Level {
        name: "pen".to_string(),
        player_spawn: spawn_at(&grid, 1, 4),
        enemy_spawns: Vec::new(),
        collectibles: Vec::new(),
        grid,
    };

    let first = new_session(vec![level.clone()], InMemoryResultsStore::default());
    let second = new_session(vec![level.clone()], InMemoryResultsStore::default());
    let positions = |session: &Session| {
        session
            .enemies()
            .iter()
            .map(|enemy| enemy.position)
            .collect::<Vec<_>>()
    };

    let placed = positions(&first);
    assert_eq!(placed.len(), 4);
    assert_eq!(placed, positions(&second));
    for (index, position) in placed.iter().enumerate() {
        let cell = level.grid.cell_at_world(*position).expect("in grid");
        assert!(level.grid.pen_cells().contains(&cell));
        assert!(!placed[..index].contains(position));
    }
}

#[test]
fn snapshot_serializes_for_presentation() {
    let session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    let value = serde_json::to_value(session.snapshot()).expect("snapshot json");
    assert_eq!(value["phase"], "ready_countdown");
    assert_eq!(value["banner"], READY_BANNER);
    assert_eq!(value["lives"], 3);
    assert_eq!(value["enemies"][0]["mode"], "leaving");
    assert_eq!(value["collectibles"][0]["kind"], "score_pellet");
}

#[test]
fn game_session_quits_on_request_and_when_the_run_finishes() {
    let session = new_session(vec![arena_level("a")], InMemoryResultsStore::default());
    let mut scene = GameSession::new(session);
    scene.load();
    assert_eq!(
        scene.update(STEP, &InputSnapshot::empty()),
        SceneCommand::None
    );
    assert!(scene.debug_title().is_some_and(|title| title.contains("lives 3")));

    let quit = InputSnapshot::empty().with_quit_requested(true);
    assert_eq!(scene.update(STEP, &quit), SceneCommand::Quit);
    assert!(scene.session().ended().is_some_and(|summary| summary.quit));
}
