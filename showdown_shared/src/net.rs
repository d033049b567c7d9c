//! Wire protocol.
//!
//! Goals:
//! - One JSON message per WebSocket text frame.
//! - Envelope `{"event": <name>, "data": <payload>}` so browser code can
//!   dispatch on `event` the way it would with any event emitter.
//! - Keep serialization explicit: every payload shape lives here.

use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    game::{Block, Mode},
    math::Transform,
};

static NEXT_CONN_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies a live connection. Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConnId(pub u32);

impl ConnId {
    pub fn new_unique() -> Self {
        ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ConnId> for String {
    fn from(id: ConnId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ConnId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map(ConnId)
    }
}

/// A player as seen in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub username: String,
    pub blocks: Vec<Block>,
}

/// Roster keyed by connection id. Ordered so broadcasts are stable.
pub type Roster = BTreeMap<ConnId, PlayerView>;

/// Per-player block transforms, index-aligned with each player's blocks.
pub type PhysicsFrame = BTreeMap<ConnId, Vec<Transform>>;

/// Full session snapshot sent on every join, or a rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitPayload {
    pub players: Roster,
    pub mode: Option<Mode>,
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client -> server intents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    Join { mode: Mode, username: String },
    PlaceBlock(Block),
    VoteWinner(ConnId),
}

/// Server -> client events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a new connection so it knows its own id.
    Welcome(ConnId),
    Init(InitPayload),
    BlockAdded { id: ConnId, block: Block },
    PhysicsUpdate(PhysicsFrame),
    PlayerLeft(ConnId),
    WinnerDeclared(ConnId),
}

impl ServerMsg {
    /// Event name as it appears on the wire, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::Welcome(_) => "welcome",
            ServerMsg::Init(_) => "init",
            ServerMsg::BlockAdded { .. } => "blockAdded",
            ServerMsg::PhysicsUpdate(_) => "physicsUpdate",
            ServerMsg::PlayerLeft(_) => "playerLeft",
            ServerMsg::WinnerDeclared(_) => "winnerDeclared",
        }
    }
}

/// Encodes a message as a JSON text frame.
pub fn encode<T: Serialize>(msg: &T) -> anyhow::Result<String> {
    serde_json::to_string(msg).context("serialize msg")
}

pub fn decode_client(text: &str) -> anyhow::Result<ClientMsg> {
    serde_json::from_str(text).context("deserialize client msg")
}

pub fn decode_server(text: &str) -> anyhow::Result<ServerMsg> {
    serde_json::from_str(text).context("deserialize server msg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use serde_json::json;

    #[test]
    fn join_matches_wire_shape() {
        let msg = decode_client(r#"{"event":"join","data":{"mode":"traditional","username":"Ann"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Join {
                mode: Mode::Traditional,
                username: "Ann".into()
            }
        );
    }

    #[test]
    fn vote_carries_string_id() {
        let msg = decode_client(r#"{"event":"voteWinner","data":"42"}"#).unwrap();
        assert_eq!(msg, ClientMsg::VoteWinner(ConnId(42)));
        assert!(decode_client(r#"{"event":"voteWinner","data":"nobody"}"#).is_err());
    }

    #[test]
    fn block_added_wire_shape() {
        let msg = ServerMsg::BlockAdded {
            id: ConnId(3),
            block: Block::new(Vec3::new(2.0, 0.5, 3.0), 0x888888),
        };
        let v: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "event": "blockAdded",
                "data": {"id": "3", "block": {"x": 2.0, "y": 0.5, "z": 3.0, "color": 0x888888}}
            })
        );
    }

    #[test]
    fn init_omits_absent_error_and_keys_roster_by_id() {
        let mut players = Roster::new();
        players.insert(
            ConnId(9),
            PlayerView {
                username: "Bob".into(),
                blocks: Vec::new(),
            },
        );
        let msg = ServerMsg::Init(InitPayload {
            players,
            mode: Some(Mode::Artist),
            theme: Some("Tree".into()),
            error: None,
        });
        let v: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(v["event"], "init");
        assert_eq!(v["data"]["players"]["9"]["username"], "Bob");
        assert_eq!(v["data"]["mode"], "artist");
        assert!(v["data"].get("error").is_none());

        let back = decode_server(&encode(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn physics_update_is_keyed_object_of_arrays() {
        let mut frame = PhysicsFrame::new();
        frame.insert(ConnId(1), vec![Transform::at(Vec3::new(1.0, 0.5, 2.0))]);
        frame.insert(ConnId(2), Vec::new());
        let v: serde_json::Value =
            serde_json::from_str(&encode(&ServerMsg::PhysicsUpdate(frame)).unwrap()).unwrap();
        assert_eq!(v["data"]["1"][0]["quaternion"]["w"], 1.0);
        assert_eq!(v["data"]["2"], json!([]));
    }
}
