//! Town events and the gateway's request/response messages.
//!
//! [`TownEvent`] is what a town controller emits to its listeners. The
//! gateway wraps those events, along with replies to client requests, in
//! [`ServerMessage`]s. Clients speak [`ClientMessage`]s. Both directions
//! travel inside an [`Envelope`].

use serde::{Deserialize, Serialize};

use crate::{AccessToken, ChannelId, Player, PlayerId, SessionToken, TownId, UserLocation};

// ---------------------------------------------------------------------------
// TownEvent
// ---------------------------------------------------------------------------

/// Something that happened in a town.
///
/// The first four variants are delivered to every listener. The
/// `PrivateMessageRequest` variant is only delivered to listeners bound to
/// the target player.
///
/// Internally tagged, so `PlayerMoved` looks like
/// `{ "type": "PlayerMoved", "player": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TownEvent {
    PlayerJoined { player: Player },
    PlayerMoved { player: Player },
    PlayerDisconnected { player: Player },
    TownDestroyed,
    /// Someone created a private channel and wants the target to join it.
    PrivateMessageRequest {
        channel: ChannelId,
        requester: PlayerId,
    },
}

impl TownEvent {
    /// Returns `true` for events that go to every listener.
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, Self::PrivateMessageRequest { .. })
    }
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// A publicly listed town, as shown in the town directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownListing {
    pub town_id: TownId,
    pub friendly_name: String,
    pub current_occupancy: usize,
    pub maximum_occupancy: usize,
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Client → server requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // -- Directory --
    ListTowns,

    CreateTown {
        friendly_name: String,
        is_publicly_listed: bool,
    },

    /// Change a town's metadata. Fields left as `None` are untouched.
    UpdateTown {
        town_id: TownId,
        update_password: String,
        #[serde(default)]
        friendly_name: Option<String>,
        #[serde(default)]
        is_publicly_listed: Option<bool>,
    },

    DeleteTown {
        town_id: TownId,
        update_password: String,
    },

    // -- Presence --
    JoinTown { town_id: TownId, user_name: String },

    Move { location: UserLocation },

    /// Ask the town to provision a fresh private channel owned by the
    /// caller.
    RequestPrivateChannel,

    /// Tell `target` that a private channel is waiting for them.
    NotifyPrivateChannel { target: PlayerId, channel: ChannelId },

    Leave,
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Server → client replies and pushed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    TownList { towns: Vec<TownListing> },

    TownCreated {
        town_id: TownId,
        update_password: String,
    },

    TownUpdated { town_id: TownId },

    TownDeleted { town_id: TownId },

    /// Everything a client needs after a successful join.
    Joined {
        town_id: TownId,
        friendly_name: String,
        player_id: PlayerId,
        session_token: SessionToken,
        access_token: AccessToken,
        broadcast_channel: ChannelId,
        group_channel: ChannelId,
        players: Vec<Player>,
    },

    /// Reply to `RequestPrivateChannel`. `None` when the caller has no
    /// live session in the town.
    PrivateChannel { channel: Option<ChannelId> },

    Left,

    /// A pushed town event.
    Event { event: TownEvent },

    /// `code` follows HTTP conventions (400, 403, 404, 409, 410, 502).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The wrapper around every frame on the wire.
///
/// `seq` is per-direction and per-connection. `timestamp` is milliseconds
/// since the connection was accepted (server side) or whatever clock the
/// client prefers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, body: T) -> Self {
        Self {
            seq,
            timestamp,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    fn ada() -> Player {
        Player::new(PlayerId::from("p-ada"), "ada")
    }

    #[test]
    fn test_town_event_player_joined_json_format() {
        let event = TownEvent::PlayerJoined { player: ada() };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "PlayerJoined");
        assert_eq!(json["player"]["id"], "p-ada");
        assert_eq!(json["player"]["location"]["rotation"], "front");
    }

    #[test]
    fn test_town_event_private_request_json_format() {
        let event = TownEvent::PrivateMessageRequest {
            channel: ChannelId::from("CH9"),
            requester: PlayerId::from("p-bob"),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "PrivateMessageRequest");
        assert_eq!(json["channel"], "CH9");
        assert_eq!(json["requester"], "p-bob");
    }

    #[test]
    fn test_only_private_request_is_targeted() {
        assert!(TownEvent::TownDestroyed.is_broadcast());
        assert!(TownEvent::PlayerMoved { player: ada() }.is_broadcast());
        assert!(
            !TownEvent::PrivateMessageRequest {
                channel: ChannelId::from("c"),
                requester: PlayerId::from("p"),
            }
            .is_broadcast()
        );
    }

    #[test]
    fn test_client_move_parses_from_json() {
        let json = r#"{
            "type": "Move",
            "location": { "x": 1.5, "y": 2.0, "rotation": "right", "moving": true }
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Move { location } => {
                assert_eq!(location.rotation, Direction::Right);
                assert!(location.moving);
            }
            other => panic!("expected Move, got {other:?}"),
        }
    }

    #[test]
    fn test_update_town_optional_fields_default_to_none() {
        let json = r#"{"type":"UpdateTown","town_id":"T1","update_password":"pw"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::UpdateTown {
                town_id: TownId::from("T1"),
                update_password: "pw".into(),
                friendly_name: None,
                is_publicly_listed: None,
            }
        );
    }

    #[test]
    fn test_server_event_nests_town_event() {
        let msg = ServerMessage::Event {
            event: TownEvent::TownDestroyed,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["event"]["type"], "TownDestroyed");
    }

    #[test]
    fn test_envelope_timestamp_defaults_when_missing() {
        let json = r#"{"seq": 3, "body": {"type": "Leave"}}"#;
        let env: Envelope<ClientMessage> = serde_json::from_str(json).unwrap();
        assert_eq!(env.seq, 3);
        assert_eq!(env.timestamp, 0);
        assert_eq!(env.body, ClientMessage::Leave);
    }

    #[test]
    fn test_decode_unknown_request_type_returns_error() {
        let unknown = r#"{"type": "Teleport", "x": 9000}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
