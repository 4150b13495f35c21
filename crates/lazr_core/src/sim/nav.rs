use std::collections::VecDeque;

use super::grid::{Cell, Grid};

/// Breadth-first shortest path from `start` to `goal`, both included.
///
/// Neighbours are expanded up, down, left, right, so among equally short routes the result
/// is always the same. `start == goal` yields the one-cell path. Blocked endpoints and
/// disconnected regions yield `None`.
pub fn find_path(grid: &Grid, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
    if grid.is_blocked(start) || grid.is_blocked(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let (rows, cols) = grid.dimensions();
    let node_count = rows as usize * cols as usize;
    let index_of = |cell: Cell| cell.row as usize * cols as usize + cell.col as usize;

    let mut visited = vec![false; node_count];
    let mut parent = vec![None::<Cell>; node_count];
    let mut open = VecDeque::new();
    visited[index_of(start)] = true;
    open.push_back(start);

    while let Some(current) = open.pop_front() {
        if current == goal {
            return Some(reconstruct_path(&parent, cols, start, goal));
        }
        for neighbor in grid.neighbors(current).into_iter().flatten() {
            let neighbor_index = index_of(neighbor);
            if visited[neighbor_index] || grid.is_blocked(neighbor) {
                continue;
            }
            visited[neighbor_index] = true;
            parent[neighbor_index] = Some(current);
            open.push_back(neighbor);
        }
    }

    None
}

fn reconstruct_path(parent: &[Option<Cell>], cols: u32, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut cursor = goal;
    let mut cells = vec![cursor];
    while cursor != start {
        let index = cursor.row as usize * cols as usize + cursor.col as usize;
        match parent[index] {
            Some(previous) => {
                cursor = previous;
                cells.push(cursor);
            }
            None => break,
        }
    }
    cells.reverse();
    cells
}

/// The target whose path from `from` is shortest in hops; ties go to the earlier target.
pub fn nearest_reachable(grid: &Grid, from: Cell, targets: &[Cell]) -> Option<Cell> {
    let mut best: Option<(usize, Cell)> = None;
    for &target in targets {
        let Some(path) = find_path(grid, from, target) else {
            continue;
        };
        match best {
            Some((best_len, _)) if best_len <= path.len() => {}
            _ => best = Some((path.len(), target)),
        }
    }
    best.map(|(_, cell)| cell)
}
