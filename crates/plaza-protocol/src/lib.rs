//! Shared vocabulary for Plaza.
//!
//! - **Types** ([`PlayerId`], [`TownId`], [`Player`], [`UserLocation`], ...)
//!   used by the session, provider and town layers.
//! - **Events** ([`TownEvent`]) emitted by a town to its listeners.
//! - **Wire messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`])
//!   spoken by the WebSocket gateway.
//! - **Codec** ([`Codec`], [`JsonCodec`]) turning envelopes into bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Town (events, sessions)
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, Envelope, ServerMessage, TownEvent, TownListing};
pub use types::{
    AccessToken, ChannelId, Direction, Player, PlayerId, SessionToken, TownId, UserLocation,
};
