//! Error types for the provider boundary.

use plaza_protocol::ChannelId;

/// Any failure reported by a channel provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or timed out.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request: bad credential, quota, etc.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// A channel the caller referenced does not exist on the provider.
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),
}
