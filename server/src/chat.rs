//! Chat: message normalization, per-channel length clamps, and a short
//! in-memory history ring for replay.

use std::collections::VecDeque;

use common::chat::ChatChannel;
use common::protocol::ChatMessagePayload;
use parking_lot::Mutex;

use crate::config::ChatSection;

/// Messages kept for replay within a short window.
const HISTORY_CAPACITY: usize = 100;

/// Trim whitespace and clamp to the channel limit. Returns None for
/// messages that are empty after trimming.
pub fn normalize_message(raw: &str, limit: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= limit {
        return Some(trimmed.to_string());
    }
    Some(trimmed.chars().take(limit).collect())
}

/// Channel length limit from config.
pub fn channel_limit(config: &ChatSection, channel: ChatChannel) -> usize {
    match channel {
        ChatChannel::Local => config.max_message_length_local,
        ChatChannel::Global => config.max_message_length_global,
        ChatChannel::Dm => config.max_message_length_dm,
    }
}

/// Whether a role may speak on the global channel.
pub fn global_allowed(config: &ChatSection, role: &str) -> bool {
    config.global_enabled && config.global_allowed_roles.iter().any(|r| r == role)
}

/// Recent-message ring buffer.
pub struct ChatService {
    history: Mutex<VecDeque<ChatMessagePayload>>,
}

impl ChatService {
    pub fn new() -> ChatService {
        ChatService {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    pub fn record(&self, message: ChatMessagePayload) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(message);
    }

    pub fn recent(&self, count: usize) -> Vec<ChatMessagePayload> {
        let history = self.history.lock();
        history.iter().rev().take(count).rev().cloned().collect()
    }
}

impl Default for ChatService {
    fn default() -> Self {
        ChatService::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChatSection {
        ChatSection::default()
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(normalize_message("", 280), None);
        assert_eq!(normalize_message("   \t  ", 280), None);
    }

    #[test]
    fn test_trimmed_and_passed_through() {
        assert_eq!(
            normalize_message("  hello world  ", 280),
            Some("hello world".to_string())
        );
    }

    #[test]
    fn test_clamped_to_exact_limit() {
        let long = "a".repeat(300);
        let clamped = normalize_message(&long, 280).unwrap();
        assert_eq!(clamped.chars().count(), 280);

        let exactly = "b".repeat(200);
        assert_eq!(normalize_message(&exactly, 200), Some(exactly));
    }

    #[test]
    fn test_clamp_counts_chars_not_bytes() {
        let long = "ä".repeat(10);
        let clamped = normalize_message(&long, 4).unwrap();
        assert_eq!(clamped.chars().count(), 4);
    }

    #[test]
    fn test_channel_limits() {
        let config = config();
        assert_eq!(channel_limit(&config, ChatChannel::Local), 280);
        assert_eq!(channel_limit(&config, ChatChannel::Global), 200);
        assert_eq!(channel_limit(&config, ChatChannel::Dm), 500);
    }

    #[test]
    fn test_global_role_gate() {
        let mut config = config();
        config.global_allowed_roles = vec!["moderator".to_string(), "admin".to_string()];
        assert!(!global_allowed(&config, "player"));
        assert!(global_allowed(&config, "admin"));
        config.global_enabled = false;
        assert!(!global_allowed(&config, "admin"));
    }

    #[test]
    fn test_history_ring_bounded() {
        let service = ChatService::new();
        for i in 0..(HISTORY_CAPACITY + 20) {
            service.record(ChatMessagePayload {
                channel: ChatChannel::Local,
                sender_id: 1,
                sender_name: "a".to_string(),
                message: format!("m{i}"),
                recipient: None,
                timestamp: i as i64,
            });
        }
        let recent = service.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.last().unwrap().message, format!("m{}", HISTORY_CAPACITY + 19));
    }
}
