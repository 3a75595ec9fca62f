//! Grid pathfinding and line of sight.
//!
//! A* is 4-directional with a Manhattan heuristic. Paths include the start
//! tile, so `path[0] == start` and `path.last() == goal` on success. The
//! `blocked_positions` set holds dynamic obstacles (other entities/players);
//! the goal tile is exempt from it so a chaser can path onto its target's
//! tile. Static collision always blocks, including the goal.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::map::CollisionGrid;

pub type Tile = (i32, i32);

/// Outcome of a pathfinding request.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub success: bool,
    pub path: Vec<Tile>,
    /// Number of steps (path length minus one) when successful.
    pub distance: u32,
}

impl PathResult {
    fn failure() -> PathResult {
        PathResult {
            success: false,
            path: Vec::new(),
            distance: 0,
        }
    }
}

fn manhattan(a: Tile, b: Tile) -> u32 {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

fn neighbors(tile: Tile) -> [Tile; 4] {
    let (x, y) = tile;
    [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)]
}

/// A* search from `start` to `goal`.
///
/// Fails when either endpoint is collision-blocked, when `start` or `goal`
/// is out of bounds, or when no path exists within `max_distance` steps.
pub fn find_path(
    grid: &CollisionGrid,
    start: Tile,
    goal: Tile,
    blocked_positions: &HashSet<Tile>,
    max_distance: u32,
) -> PathResult {
    if grid.is_blocked(start.0, start.1) || grid.is_blocked(goal.0, goal.1) {
        return PathResult::failure();
    }

    if start == goal {
        return PathResult {
            success: true,
            path: vec![start],
            distance: 0,
        };
    }

    // (f, insertion counter) keyed min-heap; the counter keeps expansion
    // order deterministic among equal-cost nodes.
    let mut open: BinaryHeap<Reverse<(u32, u64, Tile)>> = BinaryHeap::new();
    let mut counter: u64 = 0;
    let mut came_from: HashMap<Tile, Tile> = HashMap::new();
    let mut g_score: HashMap<Tile, u32> = HashMap::new();
    let mut closed: HashSet<Tile> = HashSet::new();

    g_score.insert(start, 0);
    open.push(Reverse((manhattan(start, goal), counter, start)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        if closed.contains(&current) {
            continue;
        }
        if current == goal {
            return reconstruct(&came_from, start, goal);
        }
        closed.insert(current);

        let current_g = g_score[&current];
        if current_g >= max_distance {
            continue;
        }

        for next in neighbors(current) {
            if closed.contains(&next) {
                continue;
            }
            if grid.is_blocked(next.0, next.1) {
                continue;
            }
            // Dynamic obstacles block everything except the goal tile.
            if next != goal && blocked_positions.contains(&next) {
                continue;
            }

            let tentative = current_g + 1;
            if g_score.get(&next).map_or(true, |&g| tentative < g) {
                came_from.insert(next, current);
                g_score.insert(next, tentative);
                counter += 1;
                open.push(Reverse((tentative + manhattan(next, goal), counter, next)));
            }
        }
    }

    PathResult::failure()
}

fn reconstruct(came_from: &HashMap<Tile, Tile>, start: Tile, goal: Tile) -> PathResult {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => return PathResult::failure(),
        }
    }
    path.reverse();
    let distance = (path.len() - 1) as u32;
    PathResult {
        success: true,
        path,
        distance,
    }
}

/// First step of the path toward `target`, or None when unreachable or
/// already there.
pub fn next_step(
    grid: &CollisionGrid,
    current: Tile,
    target: Tile,
    blocked_positions: &HashSet<Tile>,
    max_distance: u32,
) -> Option<Tile> {
    let result = find_path(grid, current, target, blocked_positions, max_distance);
    if !result.success || result.path.len() < 2 {
        return None;
    }
    Some(result.path[1])
}

/// Bresenham line walk. A blocked tile strictly between the endpoints breaks
/// line of sight; the endpoints' own collision state does not.
pub fn has_line_of_sight(grid: &CollisionGrid, start: Tile, end: Tile) -> bool {
    let (mut x0, mut y0) = start;
    let (x1, y1) = end;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        let here = (x0, y0);
        if here != start && here != end && grid.is_blocked(x0, y0) {
            return false;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }

    true
}

/// Spiral outward from `center`, returning the nearest tile that is walkable
/// and unoccupied. Candidates at each ring are tried closest-first by
/// Manhattan distance. Used for respawn collision fallback.
pub fn find_nearest_open_tile(
    grid: &CollisionGrid,
    center: Tile,
    blocked_positions: &HashSet<Tile>,
    max_radius: i32,
) -> Option<Tile> {
    if !grid.is_blocked(center.0, center.1) && !blocked_positions.contains(&center) {
        return Some(center);
    }

    for radius in 1..=max_radius {
        let mut ring: Vec<Tile> = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dy.abs()) != radius {
                    continue;
                }
                ring.push((center.0 + dx, center.1 + dy));
            }
        }
        ring.sort_by_key(|t| (manhattan(*t, center), t.1, t.0));
        for tile in ring {
            if !grid.is_blocked(tile.0, tile.1) && !blocked_positions.contains(&tile) {
                return Some(tile);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_blocks() -> HashSet<Tile> {
        HashSet::new()
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = CollisionGrid::open(10, 10);
        let result = find_path(&grid, (3, 3), (3, 3), &no_blocks(), 50);
        assert!(result.success);
        assert_eq!(result.path, vec![(3, 3)]);
        assert_eq!(result.distance, 0);
    }

    #[test]
    fn test_straight_line() {
        let grid = CollisionGrid::open(10, 10);
        let result = find_path(&grid, (0, 0), (4, 0), &no_blocks(), 50);
        assert!(result.success);
        assert_eq!(result.path[0], (0, 0));
        assert_eq!(*result.path.last().unwrap(), (4, 0));
        assert_eq!(result.distance, 4);
    }

    #[test]
    fn test_routes_around_single_obstacle() {
        // 5x5 grid, only (2,2) blocked, start (0,2), goal (4,2).
        let mut grid = CollisionGrid::open(5, 5);
        grid.set_blocked(2, 2, true);
        let result = find_path(&grid, (0, 2), (4, 2), &no_blocks(), 50);
        assert!(result.success);
        assert!(result.path.len() >= 5);
        assert!(!result.path.contains(&(2, 2)));
        assert_eq!(result.path[0], (0, 2));
        assert_eq!(*result.path.last().unwrap(), (4, 2));
    }

    #[test]
    fn test_adjacent_steps_are_orthogonal() {
        let mut grid = CollisionGrid::open(20, 20);
        for x in 3..15 {
            grid.set_blocked(x, 10, true);
        }
        let result = find_path(&grid, (5, 5), (5, 15), &no_blocks(), 50);
        assert!(result.success);
        for pair in result.path.windows(2) {
            let dx = (pair[1].0 - pair[0].0).abs();
            let dy = (pair[1].1 - pair[0].1).abs();
            assert_eq!(dx + dy, 1, "non-orthogonal step {:?} -> {:?}", pair[0], pair[1]);
        }
        for tile in &result.path {
            assert!(!grid.is_blocked(tile.0, tile.1));
        }
    }

    #[test]
    fn test_max_distance_cutoff() {
        // Empty 100x100, (0,0) to (99,0) needs 99 steps; limit is 50.
        let grid = CollisionGrid::open(100, 100);
        let result = find_path(&grid, (0, 0), (99, 0), &no_blocks(), 50);
        assert!(!result.success);
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_goal_in_blocked_positions_is_reachable() {
        let grid = CollisionGrid::open(10, 10);
        let mut blocked = HashSet::new();
        blocked.insert((5, 5));
        let result = find_path(&grid, (2, 5), (5, 5), &blocked, 50);
        assert!(result.success);
        assert_eq!(*result.path.last().unwrap(), (5, 5));
        // Intermediate tiles must avoid the dynamic set.
        for tile in &result.path[..result.path.len() - 1] {
            assert!(!blocked.contains(tile));
        }
    }

    #[test]
    fn test_intermediate_blocked_positions_avoided() {
        let grid = CollisionGrid::open(10, 3);
        let mut blocked = HashSet::new();
        blocked.insert((5, 1));
        let result = find_path(&grid, (3, 1), (8, 1), &blocked, 50);
        assert!(result.success);
        assert!(!result.path.contains(&(5, 1)));
    }

    #[test]
    fn test_collision_blocked_goal_fails() {
        let mut grid = CollisionGrid::open(5, 5);
        grid.set_blocked(4, 4, true);
        let result = find_path(&grid, (0, 0), (4, 4), &no_blocks(), 50);
        assert!(!result.success);
    }

    #[test]
    fn test_fully_walled_goal_fails() {
        let mut grid = CollisionGrid::open(9, 9);
        for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
            grid.set_blocked(4 + dx, 4 + dy, true);
        }
        let result = find_path(&grid, (0, 0), (4, 4), &no_blocks(), 60);
        assert!(!result.success);
    }

    #[test]
    fn test_next_step_moves_closer() {
        let grid = CollisionGrid::open(10, 10);
        let step = next_step(&grid, (0, 0), (3, 0), &no_blocks(), 50).unwrap();
        assert_eq!(step, (1, 0));
        assert!(next_step(&grid, (3, 0), (3, 0), &no_blocks(), 50).is_none());
    }

    #[test]
    fn test_los_clear_and_blocked() {
        let mut grid = CollisionGrid::open(10, 10);
        assert!(has_line_of_sight(&grid, (0, 0), (9, 9)));
        grid.set_blocked(5, 5, true);
        assert!(!has_line_of_sight(&grid, (0, 0), (9, 9)));
    }

    #[test]
    fn test_los_endpoints_exempt() {
        // Only intermediate tiles matter: a wall on either endpoint does not
        // break sight between them when the span is clear.
        let mut grid = CollisionGrid::open(10, 10);
        grid.set_blocked(0, 0, true);
        grid.set_blocked(5, 0, true);
        assert!(has_line_of_sight(&grid, (0, 0), (5, 0)));
        grid.set_blocked(2, 0, true);
        assert!(!has_line_of_sight(&grid, (0, 0), (5, 0)));
    }

    #[test]
    fn test_los_wall_row_blocks_vertical_sight() {
        // Wall across y=55 between x=45..60; goblin at (50,50), player (55,60).
        let mut grid = CollisionGrid::open(100, 100);
        for x in 45..61 {
            grid.set_blocked(x, 55, true);
        }
        assert!(!has_line_of_sight(&grid, (50, 50), (55, 60)));
        assert!(has_line_of_sight(&grid, (50, 50), (55, 50)));
    }

    #[test]
    fn test_nearest_open_tile_prefers_manhattan_one() {
        let grid = CollisionGrid::open(30, 30);
        let mut occupied = HashSet::new();
        occupied.insert((10, 15));
        let tile = find_nearest_open_tile(&grid, (10, 15), &occupied, 10).unwrap();
        let dist = (tile.0 - 10).abs() + (tile.1 - 15).abs();
        assert_eq!(dist, 1, "expected an orthogonal neighbor, got {:?}", tile);
    }

    #[test]
    fn test_nearest_open_tile_center_free() {
        let grid = CollisionGrid::open(30, 30);
        assert_eq!(
            find_nearest_open_tile(&grid, (3, 3), &no_blocks(), 10),
            Some((3, 3))
        );
    }

    #[test]
    fn test_nearest_open_tile_exhausted() {
        let mut grid = CollisionGrid::open(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                grid.set_blocked(x, y, true);
            }
        }
        assert_eq!(find_nearest_open_tile(&grid, (2, 2), &no_blocks(), 2), None);
    }
}
