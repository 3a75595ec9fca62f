//! Authenticated sessions and the registry that routes frames to them.
//!
//! Each session owns a bounded outbound channel drained by its socket's
//! writer thread. Sends never block: a full channel means the client cannot
//! keep up, and the session is flagged for disconnect instead of stalling
//! the tick loop. Sends to a disconnected session drop silently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use bitflags::bitflags;
use common::protocol::{Frame, PlayerRole};
use parking_lot::{Mutex, RwLock};

/// Outbound frames buffered per session before backpressure kicks in.
pub const OUTBOUND_BUFFER: usize = 256;

bitflags! {
    /// Personal systems changed since the last warm tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const INVENTORY = 0b001;
        const EQUIPMENT = 0b010;
        const STATS     = 0b100;
    }
}

/// Mutable, lock-guarded part of a session.
pub struct SessionState {
    pub map_id: String,
    pub dirty: DirtyFlags,
    /// Entity ids included in the last EVENT_GAME_UPDATE sent.
    pub last_sent_entities: HashSet<u64>,
    /// Player ids included in the last EVENT_GAME_UPDATE sent.
    pub last_sent_players: HashSet<i64>,
}

/// One authenticated connection.
pub struct Session {
    pub player_id: i64,
    pub username: String,
    pub role: PlayerRole,
    outbound: SyncSender<Frame>,
    disconnected: AtomicBool,
    /// Tick of the last accepted move, for server-side rate limiting.
    pub last_move_tick: AtomicU64,
    /// Tick of the last swing, shared by explicit attacks and
    /// auto-retaliation.
    pub last_attack_tick: AtomicU64,
    pub state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        player_id: i64,
        username: String,
        role: PlayerRole,
        map_id: String,
    ) -> (Arc<Session>, Receiver<Frame>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(OUTBOUND_BUFFER);
        let session = Arc::new(Session {
            player_id,
            username,
            role,
            outbound: tx,
            disconnected: AtomicBool::new(false),
            last_move_tick: AtomicU64::new(0),
            last_attack_tick: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                map_id,
                dirty: DirtyFlags::empty(),
                last_sent_entities: HashSet::new(),
                last_sent_players: HashSet::new(),
            }),
        });
        (session, rx)
    }

    /// Queue a frame. Returns false when the session is (now) disconnected;
    /// callers in the broadcast path ignore the result by design.
    pub fn send(&self, frame: Frame) -> bool {
        if self.is_disconnected() {
            return false;
        }
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Outbound buffer full for player {} ({}); disconnecting",
                    self.player_id,
                    self.username
                );
                self.mark_disconnected();
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.mark_disconnected();
                false
            }
        }
    }

    pub fn mark_disconnected(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn mark_dirty(&self, flags: DirtyFlags) {
        self.state.lock().dirty |= flags;
    }

    /// Take and clear the dirty flags (warm tick).
    pub fn take_dirty(&self) -> DirtyFlags {
        let mut state = self.state.lock();
        let dirty = state.dirty;
        state.dirty = DirtyFlags::empty();
        dirty
    }
}

/// All live sessions, addressable by player id and username.
pub struct SessionRegistry {
    by_id: RwLock<HashMap<i64, Arc<Session>>>,
    by_name: RwLock<HashMap<String, i64>>,
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry {
            by_id: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, session: Arc<Session>) {
        self.by_name
            .write()
            .insert(session.username.to_lowercase(), session.player_id);
        self.by_id.write().insert(session.player_id, session);
    }

    pub fn unregister(&self, player_id: i64) -> Option<Arc<Session>> {
        let session = self.by_id.write().remove(&player_id);
        if let Some(ref s) = session {
            self.by_name.write().remove(&s.username.to_lowercase());
        }
        session
    }

    pub fn get(&self, player_id: i64) -> Option<Arc<Session>> {
        self.by_id.read().get(&player_id).cloned()
    }

    pub fn get_by_username(&self, username: &str) -> Option<Arc<Session>> {
        let id = *self.by_name.read().get(&username.to_lowercase())?;
        self.get(id)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.by_id.read().values().cloned().collect()
    }

    pub fn on_map(&self, map_id: &str) -> Vec<Arc<Session>> {
        self.by_id
            .read()
            .values()
            .filter(|s| !s.is_disconnected() && s.state.lock().map_id == map_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        SessionRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::{MessageType, ServerShutdownPayload};

    fn shutdown_frame() -> Frame {
        Frame::event(
            MessageType::EventServerShutdown,
            &ServerShutdownPayload {
                reason: "test".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_send_and_receive() {
        let (session, rx) = Session::new(1, "alice".to_string(), PlayerRole::Player, "m".to_string());
        assert!(session.send(shutdown_frame()));
        let frame = rx.recv().unwrap();
        assert_eq!(frame.msg_type, MessageType::EventServerShutdown);
    }

    #[test]
    fn test_backpressure_disconnects() {
        let (session, _rx) = Session::new(1, "alice".to_string(), PlayerRole::Player, "m".to_string());
        for _ in 0..OUTBOUND_BUFFER {
            assert!(session.send(shutdown_frame()));
        }
        // Buffer full and nobody draining: the next send flags disconnect.
        assert!(!session.send(shutdown_frame()));
        assert!(session.is_disconnected());
        // Further sends drop silently.
        assert!(!session.send(shutdown_frame()));
    }

    #[test]
    fn test_registry_lookup_case_insensitive() {
        let registry = SessionRegistry::new();
        let (session, _rx) =
            Session::new(7, "Alice".to_string(), PlayerRole::Admin, "m".to_string());
        registry.register(session);
        assert!(registry.get_by_username("alice").is_some());
        assert!(registry.get_by_username("ALICE").is_some());
        assert!(registry.get(7).is_some());
        registry.unregister(7);
        assert!(registry.get_by_username("alice").is_none());
    }

    #[test]
    fn test_on_map_filters() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = Session::new(1, "a".to_string(), PlayerRole::Player, "overworld".to_string());
        let (b, _rx_b) = Session::new(2, "b".to_string(), PlayerRole::Player, "dungeon".to_string());
        registry.register(a);
        registry.register(b);
        let on_overworld = registry.on_map("overworld");
        assert_eq!(on_overworld.len(), 1);
        assert_eq!(on_overworld[0].player_id, 1);
    }

    #[test]
    fn test_dirty_flags_take_and_clear() {
        let (session, _rx) = Session::new(1, "a".to_string(), PlayerRole::Player, "m".to_string());
        session.mark_dirty(DirtyFlags::INVENTORY);
        session.mark_dirty(DirtyFlags::STATS);
        let taken = session.take_dirty();
        assert!(taken.contains(DirtyFlags::INVENTORY | DirtyFlags::STATS));
        assert!(session.take_dirty().is_empty());
    }
}
