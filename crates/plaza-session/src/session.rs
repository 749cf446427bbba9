//! Session records and the random identifiers behind them.

use plaza_protocol::{AccessToken, ChannelId, Player, PlayerId, SessionToken};
use rand::Rng;

/// One player's visit to one town.
///
/// Created exactly once per successful join and destroyed exactly once
/// when the player leaves. The channel ids are copies of the town's
/// shared channels at the moment the session was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The player this session belongs to.
    pub player_id: PlayerId,

    /// Secret the client presents for every later operation.
    ///
    /// 32 lowercase hex characters (128 bits of randomness).
    pub token: SessionToken,

    /// Credential issued by the channel provider for this player.
    pub access_token: AccessToken,

    /// The town-wide broadcast channel.
    pub broadcast_channel: ChannelId,

    /// The town-wide group channel.
    pub group_channel: ChannelId,
}

/// Generates a 32-character hex session token.
pub fn generate_session_token() -> SessionToken {
    SessionToken(random_hex::<16>())
}

/// Generates a 16-character hex player id.
pub fn generate_player_id() -> PlayerId {
    PlayerId(random_hex::<8>())
}

/// Builds a player with a fresh random id, standing at the origin.
pub fn new_player(user_name: impl Into<String>) -> Player {
    Player::new(generate_player_id(), user_name)
}

/// `N` random bytes rendered as `2 * N` lowercase hex characters.
fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
