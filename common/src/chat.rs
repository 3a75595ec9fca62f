use serde::{Deserialize, Serialize};

/// Chat routing channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatChannel {
    /// Heard by players within the local chunk radius.
    Local,
    /// Server-wide; restricted to configured roles.
    Global,
    /// Direct message to a single online player.
    Dm,
}

impl ChatChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatChannel::Local => "local",
            ChatChannel::Global => "global",
            ChatChannel::Dm => "dm",
        }
    }
}
