//! Player sessions for Plaza.
//!
//! A [`Session`] is the server's record of one visit to one town: which
//! player it belongs to, the token the client uses to prove it, the
//! provider credential it was issued, and the town's shared channel ids.
//! A [`SessionBook`] holds the live sessions of a single town.
//!
//! ```text
//! Town layer (above)  ← opens and closes sessions as players come and go
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below)  ← PlayerId, SessionToken, AccessToken, ChannelId
//! ```

mod book;
mod session;

pub use book::SessionBook;
pub use session::{Session, generate_player_id, generate_session_token, new_player};
