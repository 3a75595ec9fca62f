//! Bearer-token consumption.
//!
//! The external auth service writes `auth_token:{token} -> player_id` with
//! its own TTL when it mints a token. The game server consumes tokens
//! atomically (get-and-delete) so each token authenticates exactly one
//! socket.

use redis::Commands;

use super::{auth_token_key, StateStore};

impl StateStore {
    /// Atomically consume a bearer token, returning the player id it was
    /// minted for. A missing/expired/reused token yields None.
    pub fn consume_auth_token(&self, token: &str) -> Result<Option<i64>, String> {
        if token.is_empty() {
            return Ok(None);
        }
        let key = auth_token_key(token);
        let script =
            "local v = redis.call('GET', KEYS[1]); if v then redis.call('DEL', KEYS[1]); end; return v";
        let value: Option<String> = self.with_conn(|con| {
            redis::cmd("EVAL").arg(script).arg(1).arg(&key).query(con)
        })?;
        let Some(raw) = value else {
            return Ok(None);
        };
        raw.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| "Invalid auth token value".to_string())
    }

    /// Mint a token directly in the store. Used by dev seeding and tests;
    /// production tokens come from the HTTP auth service.
    pub fn issue_auth_token(
        &self,
        token: &str,
        player_id: i64,
        ttl_secs: u64,
    ) -> Result<(), String> {
        self.with_conn(|con| {
            con.set_ex::<_, _, ()>(auth_token_key(token), player_id.to_string(), ttl_secs)
        })
    }
}
