//! Wire protocol: length-prefixed msgpack frames shared by server and client.
//!
//! Every frame is a self-describing packed map of the shape
//! `{ id: str?, type: str, payload: map, version: str }`. Commands and
//! queries originate client-side; responses are correlated by `id`; events
//! are unsolicited. Payloads are staged as [`rmpv::Value`] and decoded into
//! the typed structs below by the handler for the frame's type, so payload
//! validation is deserialization.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::appearance::AppearanceData;
use crate::chat::ChatChannel;
use crate::direction::Direction;
use crate::skills::SkillType;
use crate::stats::ItemStats;
use crate::visual::{EquipSlot, VisualState};

/// Protocol version carried on every frame and checked at the connection
/// layer. Mismatches close the socket.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Frames larger than this are treated as a protocol violation.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
//  Message types
// ---------------------------------------------------------------------------

/// Closed enum of every message type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Commands (client -> server)
    CmdAuthenticate,
    CmdMove,
    CmdChatSend,
    CmdAttack,
    CmdToggleAutoRetaliate,
    CmdInventoryMove,
    CmdInventorySort,
    CmdItemDrop,
    CmdItemPickup,
    CmdItemEquip,
    CmdItemUnequip,
    CmdUpdateAppearance,
    CmdAdminGive,

    // Queries (client -> server)
    QueryInventory,
    QueryEquipment,
    QueryStats,
    QueryMapChunks,

    // Responses (server -> client, correlated by id)
    RespSuccess,
    RespError,
    RespData,

    // Events (server -> client, unsolicited)
    EventWelcome,
    EventChunkUpdate,
    EventStateUpdate,
    EventGameUpdate,
    EventChatMessage,
    EventPlayerJoined,
    EventPlayerLeft,
    EventPlayerDied,
    EventPlayerRespawn,
    EventCombatAction,
    EventAppearanceUpdate,
    EventServerShutdown,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::CmdAuthenticate => "CMD_AUTHENTICATE",
            MessageType::CmdMove => "CMD_MOVE",
            MessageType::CmdChatSend => "CMD_CHAT_SEND",
            MessageType::CmdAttack => "CMD_ATTACK",
            MessageType::CmdToggleAutoRetaliate => "CMD_TOGGLE_AUTO_RETALIATE",
            MessageType::CmdInventoryMove => "CMD_INVENTORY_MOVE",
            MessageType::CmdInventorySort => "CMD_INVENTORY_SORT",
            MessageType::CmdItemDrop => "CMD_ITEM_DROP",
            MessageType::CmdItemPickup => "CMD_ITEM_PICKUP",
            MessageType::CmdItemEquip => "CMD_ITEM_EQUIP",
            MessageType::CmdItemUnequip => "CMD_ITEM_UNEQUIP",
            MessageType::CmdUpdateAppearance => "CMD_UPDATE_APPEARANCE",
            MessageType::CmdAdminGive => "CMD_ADMIN_GIVE",
            MessageType::QueryInventory => "QUERY_INVENTORY",
            MessageType::QueryEquipment => "QUERY_EQUIPMENT",
            MessageType::QueryStats => "QUERY_STATS",
            MessageType::QueryMapChunks => "QUERY_MAP_CHUNKS",
            MessageType::RespSuccess => "RESP_SUCCESS",
            MessageType::RespError => "RESP_ERROR",
            MessageType::RespData => "RESP_DATA",
            MessageType::EventWelcome => "EVENT_WELCOME",
            MessageType::EventChunkUpdate => "EVENT_CHUNK_UPDATE",
            MessageType::EventStateUpdate => "EVENT_STATE_UPDATE",
            MessageType::EventGameUpdate => "EVENT_GAME_UPDATE",
            MessageType::EventChatMessage => "EVENT_CHAT_MESSAGE",
            MessageType::EventPlayerJoined => "EVENT_PLAYER_JOINED",
            MessageType::EventPlayerLeft => "EVENT_PLAYER_LEFT",
            MessageType::EventPlayerDied => "EVENT_PLAYER_DIED",
            MessageType::EventPlayerRespawn => "EVENT_PLAYER_RESPAWN",
            MessageType::EventCombatAction => "EVENT_COMBAT_ACTION",
            MessageType::EventAppearanceUpdate => "EVENT_APPEARANCE_UPDATE",
            MessageType::EventServerShutdown => "EVENT_SERVER_SHUTDOWN",
        }
    }
}

// ---------------------------------------------------------------------------
//  Frame + codec
// ---------------------------------------------------------------------------

/// One message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Correlation id echoed back on responses. None on events.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default = "empty_payload")]
    pub payload: rmpv::Value,
    pub version: String,
}

fn empty_payload() -> rmpv::Value {
    rmpv::Value::Map(Vec::new())
}

impl Frame {
    /// Build a frame from a typed payload struct.
    pub fn new<P: Serialize>(
        id: Option<String>,
        msg_type: MessageType,
        payload: &P,
    ) -> Result<Frame, String> {
        let value = rmpv::ext::to_value(payload)
            .map_err(|e| format!("serialize {} payload: {e}", msg_type.as_str()))?;
        Ok(Frame {
            id,
            msg_type,
            payload: value,
            version: PROTOCOL_VERSION.to_string(),
        })
    }

    /// Unsolicited event frame.
    pub fn event<P: Serialize>(msg_type: MessageType, payload: &P) -> Result<Frame, String> {
        Frame::new(None, msg_type, payload)
    }

    /// RESP_SUCCESS correlated to `id`.
    pub fn success<P: Serialize>(id: Option<String>, payload: &P) -> Result<Frame, String> {
        Frame::new(id, MessageType::RespSuccess, payload)
    }

    /// RESP_DATA correlated to `id`.
    pub fn data<P: Serialize>(id: Option<String>, payload: &P) -> Result<Frame, String> {
        Frame::new(id, MessageType::RespData, payload)
    }

    /// RESP_ERROR carrying the structured error payload.
    pub fn error(id: Option<String>, payload: &ErrorPayload) -> Frame {
        Frame::new(id, MessageType::RespError, payload)
            .unwrap_or_else(|_| Frame {
                id: None,
                msg_type: MessageType::RespError,
                payload: empty_payload(),
                version: PROTOCOL_VERSION.to_string(),
            })
    }

    /// Decode this frame's payload into its typed struct. A failure here is a
    /// validation error by construction.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, String> {
        rmpv::ext::from_value(self.payload.clone())
            .map_err(|e| format!("invalid {} payload: {e}", self.msg_type.as_str()))
    }
}

/// Encode a frame as a msgpack map (no length prefix).
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let mut ser = rmp_serde::Serializer::new(&mut buf).with_struct_map();
    frame
        .serialize(&mut ser)
        .map_err(|e| format!("encode frame: {e}"))?;
    Ok(buf)
}

/// Decode a msgpack map into a frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, String> {
    rmp_serde::from_slice(bytes).map_err(|e| format!("decode frame: {e}"))
}

/// Write one length-prefixed frame (u32 big-endian length + msgpack body).
pub fn write_frame<W: Write>(w: &mut W, frame: &Frame) -> Result<(), String> {
    let body = encode_frame(frame)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(format!("frame too large: {} bytes", body.len()));
    }
    let len = (body.len() as u32).to_be_bytes();
    w.write_all(&len).map_err(|e| format!("write frame length: {e}"))?;
    w.write_all(&body).map_err(|e| format!("write frame body: {e}"))?;
    w.flush().map_err(|e| format!("flush frame: {e}"))?;
    Ok(())
}

/// Read one length-prefixed frame. Blocks until a full frame arrives.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Frame, String> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .map_err(|e| format!("read frame length: {e}"))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(format!("frame too large: {len} bytes"));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body)
        .map_err(|e| format!("read frame body: {e}"))?;
    decode_frame(&body)
}

// ---------------------------------------------------------------------------
//  Error taxonomy
// ---------------------------------------------------------------------------

/// Failure classification carried on every RESP_ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Bad input.
    Validation,
    /// Insufficient role or unmet precondition.
    Permission,
    /// State race, e.g. slot already occupied.
    Conflict,
    /// Backend failure; the client may retry after `retry_after`.
    System,
}

/// Stable error code strings.
pub mod codes {
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const PLAYER_BANNED: &str = "PLAYER_BANNED";
    pub const PLAYER_TIMED_OUT: &str = "PLAYER_TIMED_OUT";
    pub const PLAYER_NOT_ONLINE: &str = "PLAYER_NOT_ONLINE";

    pub const MOVE_BLOCKED: &str = "MOVE_BLOCKED";
    pub const MOVE_OCCUPIED: &str = "MOVE_OCCUPIED";
    pub const MOVE_RATE_LIMITED: &str = "MOVE_RATE_LIMITED";

    pub const ATTACK_INVALID_TARGET: &str = "ATTACK_INVALID_TARGET";
    pub const ATTACK_NOT_ATTACKABLE: &str = "ATTACK_NOT_ATTACKABLE";
    pub const ATTACK_OUT_OF_RANGE: &str = "ATTACK_OUT_OF_RANGE";
    pub const ATTACK_NO_LOS: &str = "ATTACK_NO_LOS";

    pub const INV_INVALID_SLOT: &str = "INV_INVALID_SLOT";
    pub const INV_SLOT_EMPTY: &str = "INV_SLOT_EMPTY";
    pub const INV_FULL: &str = "INV_FULL";
    pub const ITEM_NOT_EQUIPPABLE: &str = "ITEM_NOT_EQUIPPABLE";
    pub const EQUIP_REQUIREMENTS_NOT_MET: &str = "EQUIP_REQUIREMENTS_NOT_MET";
    pub const EQUIP_HANDS_BLOCKED: &str = "EQUIP_HANDS_BLOCKED";
    pub const PICKUP_NOT_FOUND: &str = "PICKUP_NOT_FOUND";
    pub const PICKUP_TOO_FAR: &str = "PICKUP_TOO_FAR";
    pub const PICKUP_PROTECTED: &str = "PICKUP_PROTECTED";

    pub const CHAT_EMPTY: &str = "CHAT_EMPTY";
    pub const CHAT_CHANNEL_DISABLED: &str = "CHAT_CHANNEL_DISABLED";
    pub const CHAT_NOT_ALLOWED: &str = "CHAT_NOT_ALLOWED";
    pub const CHAT_RECIPIENT_OFFLINE: &str = "CHAT_RECIPIENT_OFFLINE";

    pub const APPEARANCE_INVALID: &str = "APPEARANCE_INVALID";

    pub const ADMIN_NOT_AUTHORIZED: &str = "ADMIN_NOT_AUTHORIZED";
    pub const ADMIN_PLAYER_NOT_FOUND: &str = "ADMIN_PLAYER_NOT_FOUND";
    pub const ADMIN_ITEM_NOT_FOUND: &str = "ADMIN_ITEM_NOT_FOUND";
    pub const ADMIN_INVENTORY_FULL: &str = "ADMIN_INVENTORY_FULL";
    pub const ADMIN_INVALID_QUANTITY: &str = "ADMIN_INVALID_QUANTITY";

    pub const MAP_CHUNK_OUT_OF_RANGE: &str = "MAP_CHUNK_OUT_OF_RANGE";

    pub const SYS_INTERNAL_ERROR: &str = "SYS_INTERNAL_ERROR";
    pub const SYS_BACKPRESSURE: &str = "SYS_BACKPRESSURE";
}

/// Structured body of a RESP_ERROR frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_code: String,
    pub error: String,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<rmpv::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retry_after: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub suggested_action: Option<String>,
}

impl ErrorPayload {
    pub fn new(code: &str, category: ErrorCategory, message: impl Into<String>) -> ErrorPayload {
        ErrorPayload {
            error_code: code.to_string(),
            error: message.into(),
            category,
            details: None,
            retry_after: None,
            suggested_action: None,
        }
    }

    pub fn with_details(mut self, details: rmpv::Value) -> ErrorPayload {
        self.details = Some(details);
        self
    }

    pub fn with_retry_after(mut self, seconds: f64) -> ErrorPayload {
        self.retry_after = Some(seconds);
        self
    }
}

// ---------------------------------------------------------------------------
//  Shared enums
// ---------------------------------------------------------------------------

/// Player access roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Player,
    Moderator,
    Admin,
}

impl PlayerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerRole::Player => "player",
            PlayerRole::Moderator => "moderator",
            PlayerRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<PlayerRole> {
        match s {
            "player" => Some(PlayerRole::Player),
            "moderator" => Some(PlayerRole::Moderator),
            "admin" => Some(PlayerRole::Admin),
            _ => None,
        }
    }
}

/// What an attack or hit-splat refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Player,
    Entity,
}

// ---------------------------------------------------------------------------
//  Command payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatePayload {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovePayload {
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSendPayload {
    pub channel: ChatChannel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackPayload {
    pub target_kind: TargetKind,
    pub target_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleAutoRetaliatePayload {
    /// Explicit value; absent means "flip the current setting".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovePayload {
    pub from_slot: u8,
    pub to_slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDropPayload {
    pub slot: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPickupPayload {
    pub ground_item_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEquipPayload {
    pub slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUnequipPayload {
    pub slot: EquipSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppearancePayload {
    pub appearance: AppearanceData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminGivePayload {
    pub target_username: String,
    pub item_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapChunksQueryPayload {
    pub center_x: i32,
    pub center_y: i32,
    pub radius: i32,
}

// ---------------------------------------------------------------------------
//  Views (server -> client payload fragments)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub player_id: i64,
    pub username: String,
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
    pub current_hp: i32,
    pub max_hp: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_state: Option<VisualState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub instance_id: u64,
    pub name: String,
    pub display_name: String,
    pub x: i32,
    pub y: i32,
    pub state: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub level: i32,
    /// Set for sprite-sheet monsters.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sprite_sheet_id: Option<String>,
    /// Set for paperdoll humanoids.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_state: Option<VisualState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundItemView {
    pub ground_item_id: u64,
    pub item_name: String,
    pub display_name: String,
    pub x: i32,
    pub y: i32,
    pub quantity: u32,
    pub is_yours: bool,
    pub is_protected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitSplat {
    pub target_kind: TargetKind,
    pub target_id: u64,
    pub amount: i32,
    pub miss: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySlotView {
    pub slot: u8,
    pub item_name: String,
    pub display_name: String,
    pub quantity: u32,
    pub max_stack_size: u32,
    pub rarity: String,
    pub rarity_color: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_durability: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryView {
    pub slots: Vec<InventorySlotView>,
    pub max_slots: u8,
    pub used_slots: u8,
    pub free_slots: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentSlotView {
    pub slot: EquipSlot,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_durability: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentView {
    pub slots: Vec<EquipmentSlotView>,
    pub total_stats: ItemStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub skill: SkillType,
    pub level: u32,
    pub xp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsView {
    pub skills: Vec<SkillEntry>,
    pub totals: ItemStats,
    pub current_hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLayerView {
    pub name: String,
    /// Row-major 16x16 tile ids; 0 means empty.
    pub tiles: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkView {
    pub cx: i32,
    pub cy: i32,
    pub layers: Vec<ChunkLayerView>,
}

// ---------------------------------------------------------------------------
//  Event payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomePayload {
    pub player_id: i64,
    pub username: String,
    pub role: PlayerRole,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
    pub current_hp: i32,
    pub max_hp: i32,
    pub appearance: AppearanceData,
    pub inventory: InventoryView,
    pub equipment: EquipmentView,
    pub stats: StatsView,
    pub tick: u64,
    pub auto_retaliate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdatePayload {
    pub tick: u64,
    pub players: Vec<PlayerView>,
    pub entities: Vec<EntityView>,
    pub removed_players: Vec<i64>,
    pub removed_entities: Vec<u64>,
    pub ground_items: Vec<GroundItemView>,
    pub hit_splats: Vec<HitSplat>,
}

/// Which personal systems a consolidated state update carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSystems {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdatePayload {
    pub update_type: String,
    pub target: String,
    pub systems: StateSystems,
}

impl StateUpdatePayload {
    pub fn personal(systems: StateSystems) -> StateUpdatePayload {
        StateUpdatePayload {
            update_type: "full".to_string(),
            target: "personal".to_string(),
            systems,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub channel: ChatChannel,
    pub sender_id: i64,
    pub sender_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinedPayload {
    pub player_id: i64,
    pub username: String,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftPayload {
    pub player_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDiedPayload {
    pub player_id: i64,
    pub username: String,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRespawnPayload {
    pub player_id: i64,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub current_hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatActionPayload {
    pub attacker_kind: TargetKind,
    pub attacker_id: u64,
    pub target_kind: TargetKind,
    pub target_id: u64,
    pub damage: i32,
    pub miss: bool,
    pub target_hp_remaining: i32,
    pub target_died: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppearanceUpdatePayload {
    pub player_id: i64,
    pub visual_hash: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visual_state: Option<VisualState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUpdatePayload {
    pub map_id: String,
    pub chunks: Vec<ChunkView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerShutdownPayload {
    pub reason: String,
}

// ---------------------------------------------------------------------------
//  Data-response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResultPayload {
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let frame = Frame::new(
            Some("req-1".to_string()),
            MessageType::CmdMove,
            &MovePayload {
                direction: Direction::East,
            },
        )
        .unwrap();

        let bytes = encode_frame(&frame).unwrap();
        let decoded = decode_frame(&bytes).unwrap();

        assert_eq!(decoded.id.as_deref(), Some("req-1"));
        assert_eq!(decoded.msg_type, MessageType::CmdMove);
        assert_eq!(decoded.version, PROTOCOL_VERSION);

        let payload: MovePayload = decoded.parse_payload().unwrap();
        assert_eq!(payload.direction, Direction::East);
    }

    #[test]
    fn test_length_prefixed_round_trip() {
        let frame = Frame::event(
            MessageType::EventChatMessage,
            &ChatMessagePayload {
                channel: ChatChannel::Local,
                sender_id: 7,
                sender_name: "alice".to_string(),
                message: "hello".to_string(),
                recipient: None,
                timestamp: 1_700_000_000,
            },
        )
        .unwrap();

        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor).unwrap();
        assert_eq!(decoded.msg_type, MessageType::EventChatMessage);
        let payload: ChatMessagePayload = decoded.parse_payload().unwrap();
        assert_eq!(payload.sender_name, "alice");
    }

    #[test]
    fn test_payload_validation_is_deserialization() {
        // A move frame whose direction is not one of the closed enum values
        // must fail to parse.
        let mut fields = Vec::new();
        fields.push((
            rmpv::Value::String("direction".into()),
            rmpv::Value::String("upward".into()),
        ));
        let frame = Frame {
            id: None,
            msg_type: MessageType::CmdMove,
            payload: rmpv::Value::Map(fields),
            version: PROTOCOL_VERSION.to_string(),
        };
        assert!(frame.parse_payload::<MovePayload>().is_err());
    }

    #[test]
    fn test_message_type_wire_names() {
        let frame = Frame::event(
            MessageType::EventServerShutdown,
            &ServerShutdownPayload {
                reason: "maintenance".to_string(),
            },
        )
        .unwrap();
        let bytes = encode_frame(&frame).unwrap();
        // The wire bytes must carry the SCREAMING_SNAKE_CASE name.
        let haystack = String::from_utf8_lossy(&bytes);
        assert!(haystack.contains("EVENT_SERVER_SHUTDOWN"));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut cursor = std::io::Cursor::new({
            let mut v = Vec::new();
            v.extend_from_slice(&(MAX_FRAME_BYTES as u32 + 1).to_be_bytes());
            v
        });
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn test_error_payload_shape() {
        let err = ErrorPayload::new(
            codes::ADMIN_NOT_AUTHORIZED,
            ErrorCategory::Permission,
            "You do not have permission to use this command",
        );
        let frame = Frame::error(Some("abc".to_string()), &err);
        let decoded: ErrorPayload = frame.parse_payload().unwrap();
        assert_eq!(decoded.error_code, codes::ADMIN_NOT_AUTHORIZED);
        assert_eq!(decoded.category, ErrorCategory::Permission);
        assert!(decoded.retry_after.is_none());
    }
}
