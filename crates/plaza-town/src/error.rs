//! Error types for the town layer.

use plaza_protocol::{PlayerId, TownId};
use plaza_provider::ProviderError;

/// Errors raised by town controllers and the town registry.
///
/// "Nobody home" results such as an unknown session token or a private
/// channel request from someone not in the town are `Option`s, not
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum TownError {
    /// The channel provider failed while the operation needed it.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// No town with this id is registered.
    #[error("town {0} not found")]
    NotFound(TownId),

    /// A town with this id is already registered.
    #[error("town {0} already exists")]
    AlreadyExists(TownId),

    /// The update password did not match.
    #[error("invalid update password for town {0}")]
    InvalidPassword(TownId),

    /// Town names must contain something other than whitespace.
    #[error("town name must not be empty")]
    InvalidName,

    /// Occupancy has reached capacity.
    #[error("town {0} is full")]
    Full(TownId),

    /// The town was torn down and accepts no new players.
    #[error("town {0} has been destroyed")]
    Destroyed(TownId),

    /// The player is not on the town's roster.
    #[error("player {0} not in town {1}")]
    PlayerNotFound(PlayerId, TownId),
}
