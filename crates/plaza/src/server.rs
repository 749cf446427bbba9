//! `PlazaServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → town registry →
//! town controllers → channel provider.

use std::sync::Arc;
use std::time::Duration;

use plaza_protocol::{Codec, JsonCodec, TownId};
use plaza_provider::ChannelProvider;
use plaza_town::{TownConfig, TownRegistry};
use plaza_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::PlazaError;
use crate::handler::handle_connection;

/// Address used when none is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1:8081";

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// State shared by every connection task.
pub(crate) struct ServerState<P: ChannelProvider, C: Codec> {
    pub(crate) towns: Mutex<TownRegistry<P>>,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Plaza server.
///
/// # Example
///
/// ```rust,no_run
/// use plaza::prelude::*;
///
/// # async fn run() -> Result<(), PlazaError> {
/// let server = PlazaServerBuilder::new()
///     .bind("0.0.0.0:8081")
///     .build(MemoryProvider::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PlazaServerBuilder {
    bind_addr: String,
    town_config: TownConfig,
    handshake_timeout: Duration,
    idle_timeout: Duration,
}

impl PlazaServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            town_config: TownConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Settings applied to every town this server creates.
    pub fn town_config(mut self, config: TownConfig) -> Self {
        self.town_config = config;
        self
    }

    /// How long a fresh connection may stay silent before its first
    /// request.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long a connection may stay silent between requests.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the transport. Towns get their channels from `provider`.
    pub async fn build<P: ChannelProvider>(
        self,
        provider: P,
    ) -> Result<PlazaServer<P, JsonCodec>, PlazaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            towns: Mutex::new(TownRegistry::new(self.town_config, Arc::new(provider))),
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
            idle_timeout: self.idle_timeout,
        });

        Ok(PlazaServer { transport, state })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Plaza server. Call [`run`](Self::run) to start serving.
pub struct PlazaServer<P: ChannelProvider, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<P, C>>,
}

impl<P: ChannelProvider, C: Codec> PlazaServer<P, C> {
    /// The address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Creates a town before any client connects, e.g. a demo town.
    /// Returns its id and update password.
    pub async fn create_town(
        &self,
        friendly_name: &str,
        is_publicly_listed: bool,
    ) -> Result<(TownId, String), PlazaError> {
        let created = self
            .state
            .towns
            .lock()
            .await
            .create_town(friendly_name, is_publicly_listed)?;
        Ok(created)
    }

    /// Accepts connections and spawns a handler task for each. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), PlazaError> {
        tracing::info!("Plaza server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
