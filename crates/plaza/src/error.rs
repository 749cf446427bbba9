//! Unified error type for the Plaza server.

use plaza_protocol::ProtocolError;
use plaza_provider::ProviderError;
use plaza_town::TownError;
use plaza_transport::TransportError;

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A town or directory operation was refused.
    #[error(transparent)]
    Town(#[from] TownError),

    /// The channel provider failed outside any town operation.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_protocol::TownId;

    #[test]
    fn test_from_transport_error() {
        let err: PlazaError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, PlazaError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: PlazaError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, PlazaError::Protocol(_)));
    }

    #[test]
    fn test_from_town_error() {
        let err: PlazaError = TownError::NotFound(TownId::from("ABCD1234")).into();
        assert!(matches!(err, PlazaError::Town(_)));
        assert!(err.to_string().contains("ABCD1234"));
    }

    #[test]
    fn test_from_provider_error() {
        let err: PlazaError = ProviderError::Unavailable("down".into()).into();
        assert!(matches!(err, PlazaError::Provider(_)));
    }
}
