//! Wire protocol shared between the match server and its clients.
//!
//! Every exchange is a JSON envelope `{ "type": <tag>, "payload": <value> }`.
//! This crate only describes the shapes; encoding/decoding of the envelope
//! itself and routing by tag lives in the server.

use serde::{Deserialize, Serialize};

/// Short opaque identifier for a connected player (first 8 hex chars of a UUID).
pub type PlayerId = String;
/// Short opaque identifier for a lobby (first 8 hex chars of a UUID).
pub type LobbyId = String;

/// A message envelope exchanged in both directions over the socket.
///
/// `payload` is kept as a raw [`serde_json::Value`] so the envelope can be
/// decoded before the caller knows (or cares) which concrete payload type
/// belongs to `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Builds an envelope from any serializable payload.
    pub fn new(kind: impl Into<String>, payload: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Envelope {
            kind: kind.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decodes the payload into the requested type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

// ---------------------------------------------------------------------
// Message type tags.
// ---------------------------------------------------------------------

/// Client -> Server tags.
pub mod client_tags {
    pub const SET_NAME: &str = "set_name";
    pub const CREATE_LOBBY: &str = "create_lobby";
    pub const JOIN_LOBBY: &str = "join_lobby";
    pub const LEAVE_LOBBY: &str = "leave_lobby";
    pub const LIST_LOBBIES: &str = "list_lobbies";
    pub const SET_READY: &str = "set_ready";
    pub const START_GAME: &str = "start_game";
    pub const GAME_COMMAND: &str = "game_command";
}

/// Server -> Client tags.
pub mod server_tags {
    pub const WELCOME: &str = "welcome";
    pub const LOBBY_LIST: &str = "lobby_list";
    pub const LOBBY_CREATED: &str = "lobby_created";
    pub const LOBBY_JOINED: &str = "lobby_joined";
    pub const LOBBY_LEFT: &str = "lobby_left";
    pub const LOBBY_UPDATE: &str = "lobby_update";
    pub const GAME_STARTING: &str = "game_starting";
    pub const GAME_STATE: &str = "game_state";
    pub const GAME_END: &str = "game_end";
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------
// Lobby lifecycle payloads.
// ---------------------------------------------------------------------

/// Sent once, immediately after the socket is upgraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNamePayload {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyPayload {
    pub name: String,
    pub max_players: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyPayload {
    pub lobby_id: LobbyId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReadyPayload {
    pub ready: bool,
}

/// Sent to the leaver only; members who stay behind learn of the departure
/// from the following `lobby_update` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyLeftPayload {
    pub lobby_id: LobbyId,
}

/// Lobby lifecycle state as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyState {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub player_id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub slot: Option<u8>,
}

/// Full description of a lobby, used in `lobby_created`/`lobby_update`/listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyInfo {
    pub lobby_id: LobbyId,
    pub name: String,
    pub host_id: PlayerId,
    pub max_players: u8,
    pub state: LobbyState,
    pub members: Vec<MemberInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyListPayload {
    pub lobbies: Vec<LobbyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartingPayload {
    pub lobby: LobbyInfo,
    pub your_slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ---------------------------------------------------------------------
// In-match command payload.
// ---------------------------------------------------------------------

/// The discriminant of a `GameCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Move,
    Attack,
    AttackMove,
    Stop,
    PlaceBuilding,
    ProduceUnit,
    CancelProduction,
    SetRally,
}

/// A single player-authored intent. Optional fields are populated according
/// to `command_type`; unused fields are simply `None`/omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCommand {
    #[serde(rename = "type")]
    pub command_type: CommandType,
    #[serde(default)]
    pub unit_ids: Vec<u64>,
    #[serde(default)]
    pub building_id: Option<u64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub target_id: Option<u64>,
    #[serde(default)]
    pub building_type: Option<u32>,
    #[serde(default)]
    pub unit_type: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCommandPayload {
    pub command: GameCommand,
}

// ---------------------------------------------------------------------
// Game-state snapshot payload.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitState {
    pub id: u64,
    #[serde(rename = "type")]
    pub unit_type: u32,
    pub owner: i32,
    pub x: f64,
    pub y: f64,
    pub hp: f32,
    pub max_hp: f32,
    pub angle: f32,
    pub turret_angle: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_target: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingState {
    pub id: u64,
    #[serde(rename = "type")]
    pub building_type: u32,
    pub owner: i32,
    pub x: f64,
    pub y: f64,
    pub hp: f32,
    pub max_hp: f32,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_progress: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_type: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileState {
    pub id: u64,
    pub owner: i32,
    pub x: f64,
    pub y: f64,
    pub tx: f64,
    pub ty: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGameState {
    pub metal: f32,
    pub metal_cap: f32,
    pub metal_prod: f32,
    pub energy: f32,
    pub energy_cap: f32,
    pub energy_prod: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub tick: u64,
    pub players: Vec<PlayerGameState>,
    pub units: Vec<UnitState>,
    pub buildings: Vec<BuildingState>,
    pub projectiles: Vec<ProjectileState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    LastStanding,
    Surrender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPayload {
    pub winner_slot: i32,
    pub winner_name: String,
    pub reason: EndReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_a_typed_payload() {
        let payload = SetReadyPayload { ready: true };
        let envelope = Envelope::new(client_tags::SET_READY, &payload).unwrap();
        assert_eq!(envelope.kind, "set_ready");
        let decoded: SetReadyPayload = envelope.decode().unwrap();
        assert!(decoded.ready);
    }

    #[test]
    fn game_command_tolerates_missing_optional_fields() {
        let json = r#"{"type":"stop","unitIds":[1,2,3]}"#;
        let cmd: GameCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.command_type, CommandType::Stop);
        assert_eq!(cmd.unit_ids, vec![1, 2, 3]);
        assert!(cmd.target_id.is_none());
    }

    #[test]
    fn lobby_info_serializes_with_camel_case_fields() {
        let info = LobbyInfo {
            lobby_id: "abc12345".into(),
            name: "room".into(),
            host_id: "host1234".into(),
            max_players: 2,
            state: LobbyState::Waiting,
            members: vec![],
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["lobbyId"], "abc12345");
        assert_eq!(value["state"], "waiting");
    }
}
