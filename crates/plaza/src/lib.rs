//! # Plaza
//!
//! Shared virtual towns. Players join a town, walk around in it, and talk
//! through chat and video channels provisioned by an external channel
//! provider. Plaza keeps the authoritative record of who is where, issues
//! each player's session and provider credential, creates each town's
//! shared channels exactly once, and cleans up private channels when
//! their owner leaves.
//!
//! The crates, leaf first:
//!
//! - `plaza-protocol`: ids, player records, events, wire messages, codec
//! - `plaza-session`: sessions and the per-town session book
//! - `plaza-provider`: the [`ChannelProvider`](prelude::ChannelProvider)
//!   boundary and an in-memory provider
//! - `plaza-town`: town controllers and the town registry
//! - `plaza-transport`: WebSocket transport
//! - `plaza` (this crate): the server and per-connection handler
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plaza::prelude::*;
//!
//! # async fn run() -> Result<(), PlazaError> {
//! let server = PlazaServerBuilder::new()
//!     .bind("127.0.0.1:8081")
//!     .build(MemoryProvider::new())
//!     .await?;
//! server.create_town("Main Street", true).await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PlazaError;
pub use server::{DEFAULT_BIND, PlazaServer, PlazaServerBuilder};

pub use plaza_protocol as protocol;
pub use plaza_provider as provider;
pub use plaza_session as session;
pub use plaza_town as town;
pub use plaza_transport as transport;

/// Everything needed to run a server or drive towns directly.
pub mod prelude {
    pub use crate::{PlazaError, PlazaServer, PlazaServerBuilder};
    pub use plaza_protocol::{
        ChannelId, ClientMessage, Codec, Direction, Envelope, JsonCodec, Player, PlayerId,
        ServerMessage, SessionToken, TownEvent, TownId, TownListing, UserLocation,
    };
    pub use plaza_provider::{ChannelProvider, MemoryProvider, ProviderError};
    pub use plaza_session::{Session, new_player};
    pub use plaza_town::{
        Departure, ForwardingListener, ListenerTarget, TownConfig, TownController, TownError,
        TownListener, TownRegistry,
    };
}
