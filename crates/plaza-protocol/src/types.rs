//! Identity and world types shared by every Plaza crate.
//!
//! Everything in here is plain data: it can be serialized onto the wire,
//! cloned into events, and compared in tests. None of it knows about
//! locks, providers, or connections.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a string-backed identifier newtype.
///
/// Each identifier wraps a `String` so that a `PlayerId` can never be
/// passed where a `ChannelId` is expected. `#[serde(transparent)]` keeps
/// the JSON form a bare string: `"A1B2C3D4"`, not `{"0":"A1B2C3D4"}`.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Identifies a player within a town.
    PlayerId
}

string_id! {
    /// Identifies a town. Either a configured well-known id or an
    /// 8-character random id.
    TownId
}

string_id! {
    /// The capability a client presents for operations after joining.
    ///
    /// Issued once per successful join and never shared between live
    /// sessions.
    SessionToken
}

string_id! {
    /// A credential issued by the channel provider. Opaque to Plaza.
    AccessToken
}

string_id! {
    /// A provider-side communication channel.
    ChannelId
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Which way an avatar is facing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

/// Where a player stands and how they are oriented.
///
/// The town controller stores this verbatim. Plausibility checks (walls,
/// speed) belong to whoever calls the move operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct UserLocation {
    pub x: f64,
    pub y: f64,
    pub rotation: Direction,
    pub moving: bool,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player's public record: who they are and where they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub user_name: String,
    #[serde(default)]
    pub location: UserLocation,
}

impl Player {
    /// Creates a player standing at the origin, facing front.
    pub fn new(id: PlayerId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            location: UserLocation::default(),
        }
    }

    /// Overwrites the player's location.
    pub fn update_location(&mut self, location: UserLocation) {
        self.location = location;
    }
}
