//! The channel provider boundary.
//!
//! Plaza does not move chat messages or video itself, and it does not mint
//! credentials. An external messaging/video service does both. This crate
//! defines the three calls Plaza needs from such a service as the
//! [`ChannelProvider`] trait, so the town controller can be handed a real
//! client in production and [`MemoryProvider`] in development and tests.
//!
//! The controller receives its provider explicitly at construction; there
//! is no process-wide instance.

mod error;
mod memory;

pub use error::ProviderError;
pub use memory::MemoryProvider;

use std::future::Future;

use plaza_protocol::{AccessToken, ChannelId, PlayerId, TownId};

/// Issues access tokens and creates or destroys channels.
///
/// # Example
///
/// ```rust
/// use plaza_protocol::{AccessToken, ChannelId, PlayerId, TownId};
/// use plaza_provider::{ChannelProvider, ProviderError};
///
/// /// Refuses everything. Handy for exercising failure paths.
/// struct Offline;
///
/// impl ChannelProvider for Offline {
///     async fn issue_access_token(
///         &self,
///         _town: &TownId,
///         _client: &PlayerId,
///     ) -> Result<AccessToken, ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn create_channel(
///         &self,
///         _token: &AccessToken,
///     ) -> Result<ChannelId, ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
///
///     async fn delete_channels(
///         &self,
///         _token: &AccessToken,
///         _channels: &[ChannelId],
///     ) -> Result<(), ProviderError> {
///         Err(ProviderError::Unavailable("offline".into()))
///     }
/// }
/// ```
pub trait ChannelProvider: Send + Sync + 'static {
    /// Issues a token that lets `client` use the provider on behalf of
    /// `town`. The provider maps anyone presenting the token back to
    /// `client`.
    fn issue_access_token(
        &self,
        town: &TownId,
        client: &PlayerId,
    ) -> impl Future<Output = Result<AccessToken, ProviderError>> + Send;

    /// Creates a new channel using `token` and returns its id.
    fn create_channel(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<ChannelId, ProviderError>> + Send;

    /// Destroys `channels`. Callers treat this as best-effort.
    fn delete_channels(
        &self,
        token: &AccessToken,
        channels: &[ChannelId],
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
