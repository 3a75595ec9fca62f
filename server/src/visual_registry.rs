//! Hash-based visual state deduplication.
//!
//! Instead of sending full appearance/equipment payloads every tick, the
//! broadcast pipeline attaches a 12-hex fingerprint and sends the full
//! [`VisualState`] only to observers that have not seen that fingerprint.
//!
//! Three structures, all ephemeral:
//! - fingerprint -> VisualState, LRU-bounded at `MAX_CACHE_SIZE`
//! - entity key -> current fingerprint (change detection)
//! - observer -> seen fingerprints, bounded at `MAX_OBSERVER_CACHE_SIZE`
//!   with half-eviction on overflow (deliberately not strict LRU)
//!
//! Evicting a fingerprint from the cache is safe: the affected observers
//! simply receive full data again on next sight.

use std::collections::{HashMap, HashSet};

use common::visual::VisualState;
use parking_lot::Mutex;

/// Maximum number of cached visual states.
pub const MAX_CACHE_SIZE: usize = 10_000;

/// Maximum fingerprints tracked per observer.
pub const MAX_OBSERVER_CACHE_SIZE: usize = 500;

struct RegistryInner {
    /// fingerprint -> (state, last-use stamp).
    cache: HashMap<String, (VisualState, u64)>,
    use_counter: u64,
    entity_hashes: HashMap<String, String>,
    observer_seen: HashMap<i64, HashSet<String>>,
}

impl RegistryInner {
    fn touch(&mut self, hash: &str) {
        self.use_counter += 1;
        if let Some(entry) = self.cache.get_mut(hash) {
            entry.1 = self.use_counter;
        }
    }

    fn insert(&mut self, hash: String, state: VisualState) {
        self.use_counter += 1;
        self.cache.insert(hash, (state, self.use_counter));
        while self.cache.len() > MAX_CACHE_SIZE {
            if let Some(oldest) = self
                .cache
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(k, _)| k.clone())
            {
                self.cache.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

/// Shared registry; one per server.
pub struct VisualRegistry {
    inner: Mutex<RegistryInner>,
}

impl VisualRegistry {
    pub fn new() -> VisualRegistry {
        VisualRegistry {
            inner: Mutex::new(RegistryInner {
                cache: HashMap::new(),
                use_counter: 0,
                entity_hashes: HashMap::new(),
                observer_seen: HashMap::new(),
            }),
        }
    }

    /// Register an entity's current visual state, returning its fingerprint.
    pub fn register_visual_state(&self, entity_key: &str, state: &VisualState) -> String {
        let hash = state.compute_hash();
        let mut inner = self.inner.lock();
        inner
            .entity_hashes
            .insert(entity_key.to_string(), hash.clone());
        if inner.cache.contains_key(&hash) {
            inner.touch(&hash);
        } else {
            inner.insert(hash.clone(), state.clone());
        }
        hash
    }

    pub fn get_visual_state(&self, hash: &str) -> Option<VisualState> {
        let mut inner = self.inner.lock();
        if inner.cache.contains_key(hash) {
            inner.touch(hash);
        }
        inner.cache.get(hash).map(|(state, _)| state.clone())
    }

    pub fn entity_hash(&self, entity_key: &str) -> Option<String> {
        self.inner.lock().entity_hashes.get(entity_key).cloned()
    }

    /// True when the observer has not seen this fingerprint.
    pub fn observer_needs_full_visual(&self, observer_id: i64, hash: &str) -> bool {
        let inner = self.inner.lock();
        match inner.observer_seen.get(&observer_id) {
            None => true,
            Some(seen) => !seen.contains(hash),
        }
    }

    /// Record that full data for a fingerprint was sent to an observer. On
    /// overflow, an arbitrary half of the seen-set is dropped; the affected
    /// fingerprints are simply resent on next sight.
    pub fn mark_hash_seen(&self, observer_id: i64, hash: &str) {
        let mut inner = self.inner.lock();
        let seen = inner.observer_seen.entry(observer_id).or_default();
        seen.insert(hash.to_string());
        if seen.len() > MAX_OBSERVER_CACHE_SIZE {
            let keep: HashSet<String> = seen
                .iter()
                .skip(seen.len() / 2)
                .cloned()
                .collect();
            *seen = keep;
        }
    }

    /// Main broadcast-path entry: returns the fingerprint plus the full
    /// state when this observer needs it, updating the seen-set.
    pub fn visual_for_observer(
        &self,
        observer_id: i64,
        entity_key: &str,
        state: &VisualState,
    ) -> (String, Option<VisualState>) {
        let hash = self.register_visual_state(entity_key, state);
        if self.observer_needs_full_visual(observer_id, &hash) {
            self.mark_hash_seen(observer_id, &hash);
            (hash, Some(state.clone()))
        } else {
            (hash, None)
        }
    }

    /// Drop tracking for a disconnected observer.
    pub fn remove_observer(&self, observer_id: i64) {
        self.inner.lock().observer_seen.remove(&observer_id);
    }

    /// Drop the entity -> fingerprint binding for a despawned entity. The
    /// cached state stays: other entities may share it.
    pub fn remove_entity(&self, entity_key: &str) {
        self.inner.lock().entity_hashes.remove(entity_key);
    }
}

impl Default for VisualRegistry {
    fn default() -> Self {
        VisualRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::appearance::{presets, AppearanceData};
    use common::visual::{EquipSlot, EquippedVisuals, SlotVisual};

    fn state_with_sprite(sprite: &str) -> VisualState {
        let mut eq = EquippedVisuals::default();
        eq.set_slot(
            EquipSlot::MainHand,
            Some(SlotVisual {
                sprite: sprite.to_string(),
                tint: None,
            }),
        );
        VisualState::new(AppearanceData::default(), eq)
    }

    #[test]
    fn test_first_sight_sends_full_then_hash_only() {
        let registry = VisualRegistry::new();
        let state = state_with_sprite("bronze_shortsword");

        let (hash1, full1) = registry.visual_for_observer(1, "player:9", &state);
        assert!(full1.is_some());

        let (hash2, full2) = registry.visual_for_observer(1, "player:9", &state);
        assert_eq!(hash1, hash2);
        assert!(full2.is_none());
    }

    #[test]
    fn test_per_observer_isolation() {
        let registry = VisualRegistry::new();
        let state = state_with_sprite("bronze_shortsword");

        let (_, full_a) = registry.visual_for_observer(1, "player:9", &state);
        assert!(full_a.is_some());
        // A different observer still needs the data.
        let (_, full_b) = registry.visual_for_observer(2, "player:9", &state);
        assert!(full_b.is_some());
    }

    #[test]
    fn test_hash_change_triggers_resend() {
        let registry = VisualRegistry::new();
        let before = state_with_sprite("copper_dagger");
        let after = state_with_sprite("iron_shortsword");

        let (hash_before, _) = registry.visual_for_observer(1, "player:9", &before);
        let (hash_after, full) = registry.visual_for_observer(1, "player:9", &after);
        assert_ne!(hash_before, hash_after);
        assert!(full.is_some());
        assert_eq!(registry.entity_hash("player:9"), Some(hash_after));
    }

    #[test]
    fn test_same_visual_shared_across_entities() {
        let registry = VisualRegistry::new();
        let uniform = VisualState::new(presets::guard(), EquippedVisuals::default());

        let (hash_a, full_a) = registry.visual_for_observer(1, "entity:1", &uniform);
        assert!(full_a.is_some());
        // Second guard with the identical uniform: observer already knows it.
        let (hash_b, full_b) = registry.visual_for_observer(1, "entity:2", &uniform);
        assert_eq!(hash_a, hash_b);
        assert!(full_b.is_none());
    }

    #[test]
    fn test_observer_removal_forgets_seen() {
        let registry = VisualRegistry::new();
        let state = state_with_sprite("shortbow");
        let (hash, _) = registry.visual_for_observer(1, "player:9", &state);
        assert!(!registry.observer_needs_full_visual(1, &hash));
        registry.remove_observer(1);
        assert!(registry.observer_needs_full_visual(1, &hash));
    }

    #[test]
    fn test_seen_set_half_eviction() {
        let registry = VisualRegistry::new();
        for i in 0..(MAX_OBSERVER_CACHE_SIZE + 1) {
            registry.mark_hash_seen(1, &format!("{i:012x}"));
        }
        let inner = registry.inner.lock();
        let seen = inner.observer_seen.get(&1).unwrap();
        assert!(seen.len() <= MAX_OBSERVER_CACHE_SIZE / 2 + 1);
    }

    #[test]
    fn test_entity_removal_keeps_cache() {
        let registry = VisualRegistry::new();
        let state = state_with_sprite("shortbow");
        let hash = registry.register_visual_state("entity:5", &state);
        registry.remove_entity("entity:5");
        assert!(registry.entity_hash("entity:5").is_none());
        assert!(registry.get_visual_state(&hash).is_some());
    }
}
