//! Interest management: which entities and players a session receives
//! updates about, and the per-session diffing that produces spawn/despawn
//! deltas.

use std::collections::HashSet;

use crate::entities::EntityState;
use crate::map::CHUNK_SIZE;

/// Visible range in tiles for a chunk radius: `(chunk_radius + 1) * 16`.
pub fn visible_range(chunk_radius: i32) -> i32 {
    (chunk_radius + 1) * CHUNK_SIZE
}

/// Axis-aligned visibility window: both axis deltas within range.
pub fn in_visible_range(observer: (i32, i32), other: (i32, i32), range: i32) -> bool {
    (observer.0 - other.0).abs() <= range && (observer.1 - other.1).abs() <= range
}

/// Whether an observer receives updates for an entity in `state`. Dying
/// entities stay observable for the death animation; dead ones do not.
pub fn entity_observable(state: EntityState) -> bool {
    state != EntityState::Dead
}

/// Set difference producing (entered, left) relative to the previously sent
/// set.
pub fn diff_visible<T: Copy + Eq + std::hash::Hash>(
    previous: &HashSet<T>,
    current: &HashSet<T>,
) -> (Vec<T>, Vec<T>) {
    let entered = current.difference(previous).copied().collect();
    let left = previous.difference(current).copied().collect();
    (entered, left)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_is_32() {
        assert_eq!(visible_range(1), 32);
        assert_eq!(visible_range(0), 16);
        assert_eq!(visible_range(2), 48);
    }

    #[test]
    fn test_window_is_axis_aligned() {
        let obs = (100, 100);
        assert!(in_visible_range(obs, (132, 100), 32));
        assert!(in_visible_range(obs, (132, 132), 32));
        assert!(!in_visible_range(obs, (133, 100), 32));
        assert!(!in_visible_range(obs, (100, 67), 32));
        // Both axes checked independently, so the window is a square.
        assert!(in_visible_range(obs, (68, 132), 32));
    }

    #[test]
    fn test_dying_observable_dead_not() {
        assert!(entity_observable(EntityState::Idle));
        assert!(entity_observable(EntityState::Combat));
        assert!(entity_observable(EntityState::Dying));
        assert!(!entity_observable(EntityState::Dead));
    }

    #[test]
    fn test_diff_produces_spawn_and_despawn_sets() {
        let previous: HashSet<u64> = [1, 2, 3].into_iter().collect();
        let current: HashSet<u64> = [2, 3, 4, 5].into_iter().collect();
        let (mut entered, mut left) = diff_visible(&previous, &current);
        entered.sort_unstable();
        left.sort_unstable();
        assert_eq!(entered, vec![4, 5]);
        assert_eq!(left, vec![1]);
    }

    #[test]
    fn test_diff_empty_previous_spawns_everything() {
        let previous: HashSet<u64> = HashSet::new();
        let current: HashSet<u64> = [7].into_iter().collect();
        let (entered, left) = diff_visible(&previous, &current);
        assert_eq!(entered, vec![7]);
        assert!(left.is_empty());
    }
}
