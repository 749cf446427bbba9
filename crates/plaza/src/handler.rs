//! Per-connection handler: decode requests, drive towns, relay events.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! A connection can use the town directory at any time and be present in
//! at most one town. While present, its town events are relayed to the
//! socket as they happen, interleaved with replies to its requests.
//!
//! The flow is:
//!   1. Wait for a request (the first one within the handshake timeout,
//!      later ones within the idle timeout) or a town event.
//!   2. Requests map onto registry and controller calls; events are
//!      wrapped in `ServerMessage::Event`.
//!   3. On `Leave`, close, error or timeout the player leaves their town
//!      exactly once.

use std::sync::Arc;
use std::time::Instant;

use plaza_protocol::{ClientMessage, Codec, Envelope, ServerMessage, TownEvent};
use plaza_provider::ChannelProvider;
use plaza_session::{Session, new_player};
use plaza_town::{
    EventReceiver, ForwardingListener, ListenerTarget, TownController, TownError, TownListener,
};
use plaza_transport::{Connection, WebSocketConnection};

use crate::PlazaError;
use crate::server::ServerState;

const NOT_IN_TOWN: &str = "not in a town";

/// A connection's membership in one town.
///
/// Dropping it without calling [`leave`](Self::leave) still unregisters
/// the listener and destroys the session. Since `Drop` is synchronous,
/// that cleanup runs in a spawned task.
struct Presence<P: ChannelProvider> {
    town: Arc<TownController<P>>,
    session: Session,
    listener: Arc<dyn TownListener>,
    events: EventReceiver,
    left: bool,
}

impl<P: ChannelProvider> Presence<P> {
    async fn leave(mut self) {
        self.left = true;
        depart(&self.town, &self.listener, &self.session).await;
    }
}

impl<P: ChannelProvider> Drop for Presence<P> {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        let town = Arc::clone(&self.town);
        let listener = Arc::clone(&self.listener);
        let session = self.session.clone();
        tokio::spawn(async move {
            depart(&town, &listener, &session).await;
        });
    }
}

async fn depart<P: ChannelProvider>(
    town: &TownController<P>,
    listener: &Arc<dyn TownListener>,
    session: &Session,
) {
    town.remove_town_listener(listener).await;
    let Some(departure) = town.destroy_session(session).await else {
        return;
    };
    if !departure.stranded_channels.is_empty() {
        tracing::warn!(
            town_id = %town.town_id(),
            player_id = %session.player_id,
            channels = departure.stranded_channels.len(),
            "private channels left behind"
        );
    }
}

/// Sequenced, timestamped replies to one connection.
struct Outbound<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbound<'_, C> {
    async fn send(&mut self, body: ServerMessage) -> Result<(), PlazaError> {
        let envelope = Envelope::new(
            next_seq(&mut self.seq),
            self.start.elapsed().as_millis() as u64,
            body,
        );
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn error(&mut self, code: u16, message: impl Into<String>) -> Result<(), PlazaError> {
        self.send(ServerMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    async fn town_error(&mut self, e: &TownError) -> Result<(), PlazaError> {
        self.error(error_code(e), e.to_string()).await
    }
}

/// Maps a town error onto an HTTP-style status code.
fn error_code(e: &TownError) -> u16 {
    match e {
        TownError::InvalidName => 400,
        TownError::InvalidPassword(_) => 403,
        TownError::NotFound(_) | TownError::PlayerNotFound(..) => 404,
        TownError::AlreadyExists(_) | TownError::Full(_) => 409,
        TownError::Destroyed(_) => 410,
        TownError::Provider(_) => 502,
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<P, C>>,
) -> Result<(), PlazaError>
where
    P: ChannelProvider,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut out = Outbound {
        conn: &conn,
        codec: &state.codec,
        seq: 1,
        start: Instant::now(),
    };
    let mut presence: Option<Presence<P>> = None;
    let mut deadline = tokio::time::Instant::now() + state.handshake_timeout;

    loop {
        let read = tokio::select! {
            Some(event) = next_event(&mut presence) => {
                let destroyed = matches!(event, TownEvent::TownDestroyed);
                out.send(ServerMessage::Event { event }).await?;
                if destroyed {
                    if let Some(p) = presence.take() {
                        p.leave().await;
                    }
                }
                continue;
            }
            read = conn.recv() => read,
            () = tokio::time::sleep_until(deadline) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        };

        let data = match read {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };
        deadline = tokio::time::Instant::now() + state.idle_timeout;

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                out.error(400, format!("invalid message: {e}")).await?;
                continue;
            }
        };

        dispatch(&state, &mut out, &mut presence, envelope.body).await?;
    }

    if let Some(p) = presence.take() {
        p.leave().await;
    }
    let _ = conn.close().await;
    Ok(())
}

/// Waits for the next event of the town this connection is in. Never
/// resolves while the connection is in no town.
///
/// The player's own `PlayerJoined` is skipped; the `Joined` reply already
/// carries it.
async fn next_event<P: ChannelProvider>(
    presence: &mut Option<Presence<P>>,
) -> Option<TownEvent> {
    let Some(p) = presence else {
        return std::future::pending().await;
    };
    loop {
        let event = p.events.recv().await?;
        if let TownEvent::PlayerJoined { player } = &event {
            if player.id == p.session.player_id {
                continue;
            }
        }
        return Some(event);
    }
}

/// Executes one client request and writes its reply.
async fn dispatch<P, C>(
    state: &ServerState<P, C>,
    out: &mut Outbound<'_, C>,
    presence: &mut Option<Presence<P>>,
    msg: ClientMessage,
) -> Result<(), PlazaError>
where
    P: ChannelProvider,
    C: Codec,
{
    match msg {
        // -- Directory --------------------------------------------------
        ClientMessage::ListTowns => {
            let towns = state.towns.lock().await.list_public().await;
            out.send(ServerMessage::TownList { towns }).await
        }

        ClientMessage::CreateTown {
            friendly_name,
            is_publicly_listed,
        } => {
            let created = state
                .towns
                .lock()
                .await
                .create_town(&friendly_name, is_publicly_listed);
            match created {
                Ok((town_id, update_password)) => {
                    out.send(ServerMessage::TownCreated {
                        town_id,
                        update_password,
                    })
                    .await
                }
                Err(e) => out.town_error(&e).await,
            }
        }

        ClientMessage::UpdateTown {
            town_id,
            update_password,
            friendly_name,
            is_publicly_listed,
        } => {
            let result = state
                .towns
                .lock()
                .await
                .update_town(&town_id, &update_password, friendly_name, is_publicly_listed)
                .await;
            match result {
                Ok(()) => out.send(ServerMessage::TownUpdated { town_id }).await,
                Err(e) => out.town_error(&e).await,
            }
        }

        ClientMessage::DeleteTown {
            town_id,
            update_password,
        } => {
            // Unregister under the registry lock, tear down outside it.
            let removed = state
                .towns
                .lock()
                .await
                .remove_town(&town_id, &update_password);
            match removed {
                Ok(town) => {
                    let stranded = town.disconnect_all_players().await;
                    if !stranded.is_empty() {
                        tracing::warn!(
                            %town_id,
                            channels = stranded.len(),
                            "shared channels left behind"
                        );
                    }
                    out.send(ServerMessage::TownDeleted { town_id }).await
                }
                Err(e) => out.town_error(&e).await,
            }
        }

        // -- Presence ---------------------------------------------------
        ClientMessage::JoinTown { town_id, user_name } => {
            if presence.is_some() {
                return out.error(409, "already in a town").await;
            }
            let town = state.towns.lock().await.get(&town_id);
            let Some(town) = town else {
                return out.town_error(&TownError::NotFound(town_id)).await;
            };

            // The listener holds the player's slot and is live before the
            // join commits, so invitations sent right after it are kept.
            let player = new_player(user_name);
            let (listener, events) =
                ForwardingListener::channel(ListenerTarget::Player(player.id.clone()));
            let listener: Arc<dyn TownListener> = listener;
            if let Err(e) = town.try_add_town_listener(Arc::clone(&listener)).await {
                return out.town_error(&e).await;
            }

            let session = match town.add_player(player.clone()).await {
                Ok(session) => session,
                Err(e) => {
                    town.remove_town_listener(&listener).await;
                    return out.town_error(&e).await;
                }
            };

            tracing::debug!(%town_id, player_id = %player.id, "connection joined town");
            let joined = ServerMessage::Joined {
                town_id,
                friendly_name: town.friendly_name().await,
                player_id: player.id,
                session_token: session.token.clone(),
                access_token: session.access_token.clone(),
                broadcast_channel: session.broadcast_channel.clone(),
                group_channel: session.group_channel.clone(),
                players: town.players().await,
            };
            *presence = Some(Presence {
                town,
                session,
                listener,
                events,
                left: false,
            });
            out.send(joined).await
        }

        ClientMessage::Move { location } => {
            let Some(p) = presence.as_ref() else {
                return out.error(403, NOT_IN_TOWN).await;
            };
            match p
                .town
                .update_player_location(&p.session.player_id, location)
                .await
            {
                // The mover hears its own PlayerMoved event.
                Ok(_) => Ok(()),
                Err(e) => out.town_error(&e).await,
            }
        }

        ClientMessage::RequestPrivateChannel => {
            let Some(p) = presence.as_ref() else {
                return out.error(403, NOT_IN_TOWN).await;
            };
            match p.town.create_channel(&p.session.player_id).await {
                Ok(channel) => out.send(ServerMessage::PrivateChannel { channel }).await,
                Err(e) => out.town_error(&e).await,
            }
        }

        ClientMessage::NotifyPrivateChannel { target, channel } => {
            let Some(p) = presence.as_ref() else {
                return out.error(403, NOT_IN_TOWN).await;
            };
            p.town
                .create_message_request(&target, &p.session.player_id, &channel)
                .await;
            Ok(())
        }

        ClientMessage::Leave => match presence.take() {
            Some(p) => {
                p.leave().await;
                out.send(ServerMessage::Left).await
            }
            None => out.error(403, NOT_IN_TOWN).await,
        },
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_protocol::{PlayerId, TownId};
    use plaza_provider::ProviderError;

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }

    #[test]
    fn test_error_code_mapping() {
        let town = || TownId::from("ABCD1234");
        assert_eq!(error_code(&TownError::InvalidName), 400);
        assert_eq!(error_code(&TownError::InvalidPassword(town())), 403);
        assert_eq!(error_code(&TownError::NotFound(town())), 404);
        assert_eq!(
            error_code(&TownError::PlayerNotFound(PlayerId::from("p"), town())),
            404
        );
        assert_eq!(error_code(&TownError::Full(town())), 409);
        assert_eq!(error_code(&TownError::AlreadyExists(town())), 409);
        assert_eq!(error_code(&TownError::Destroyed(town())), 410);
        assert_eq!(
            error_code(&TownError::Provider(ProviderError::Unavailable("x".into()))),
            502
        );
    }
}
