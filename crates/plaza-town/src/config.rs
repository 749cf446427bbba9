//! Town configuration and the random identifiers a town is born with.

use plaza_protocol::TownId;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Capacity of a town unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 50;

const TOWN_ID_ALPHABET: &[u8] = b"1234567890ABCDEF";
const TOWN_ID_LEN: usize = 8;

const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const PASSWORD_LEN: usize = 24;

// ---------------------------------------------------------------------------
// TownConfig
// ---------------------------------------------------------------------------

/// Settings applied to every town a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TownConfig {
    /// Maximum concurrent players. Checked by the gateway before a join,
    /// not by the controller.
    pub capacity: usize,

    /// A fixed town id for a demo town. A town created with exactly this
    /// friendly name gets this id instead of a random one.
    pub well_known_id: Option<String>,

    /// Whether tearing a town down also deletes the private channels its
    /// players created and never cleaned up. Off by default: private
    /// channels belong to whoever requested them, and providers expire
    /// idle channels on their own.
    pub sweep_private_channels: bool,
}

impl Default for TownConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            well_known_id: None,
            sweep_private_channels: false,
        }
    }
}

impl TownConfig {
    /// Returns the well-known id if `friendly_name` claims it.
    pub fn well_known_id_for(&self, friendly_name: &str) -> Option<TownId> {
        self.well_known_id
            .as_deref()
            .filter(|id| *id == friendly_name)
            .map(TownId::from)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// An 8-character id drawn from `1234567890ABCDEF`.
pub fn generate_town_id() -> TownId {
    TownId(random_string(TOWN_ID_ALPHABET, TOWN_ID_LEN))
}

/// A 24-character URL-safe secret.
pub fn generate_update_password() -> String {
    random_string(PASSWORD_ALPHABET, PASSWORD_LEN)
}

fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}
