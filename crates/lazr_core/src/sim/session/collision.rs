use crate::app::{Aabb, Vec2};
use crate::config::{BodySize, GameTuning};
use crate::content::{Collectible, CollectibleKind};
use crate::sim::enemy::Enemy;

pub(super) fn body_box(center: Vec2, size: BodySize) -> Aabb {
    let (half_width, half_height) = size.half_extents();
    Aabb::new(center, half_width, half_height)
}

fn collectible_size(kind: CollectibleKind, tuning: &GameTuning) -> BodySize {
    match kind {
        CollectibleKind::ScorePellet => tuning.dot_body,
        CollectibleKind::PowerPellet => tuning.power_body,
    }
}

/// Indices of collectibles the player box touches, in list order.
pub(super) fn touched_collectibles(
    player: &Aabb,
    collectibles: &[Collectible],
    tuning: &GameTuning,
) -> Vec<usize> {
    collectibles
        .iter()
        .enumerate()
        .filter(|(_, collectible)| {
            player.overlaps(&body_box(
                collectible.position,
                collectible_size(collectible.kind, tuning),
            ))
        })
        .map(|(index, _)| index)
        .collect()
}

/// Indices of enabled enemies the player box touches, in slot order.
pub(super) fn touching_enemies(
    player: &Aabb,
    enemies: &[Enemy],
    tuning: &GameTuning,
) -> Vec<usize> {
    enemies
        .iter()
        .enumerate()
        .filter(|(_, enemy)| {
            enemy.enabled && player.overlaps(&body_box(enemy.position, tuning.enemy_body))
        })
        .map(|(index, _)| index)
        .collect()
}
