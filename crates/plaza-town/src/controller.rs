//! The town controller: authoritative state of one town.
//!
//! Roster, sessions, private-channel index, listeners and metadata all
//! live behind one `tokio::sync::Mutex`. Every mutation emits its event
//! while that lock is held, so listeners see events in mutation order.
//!
//! Provider calls never happen under the lock. Shared-channel
//! provisioning goes through a `OnceCell`, which lets exactly one joiner
//! create the broadcast and group channels while the others wait for its
//! result.
//!
//! ```text
//!  add_player ──► issue token ──► OnceCell (provision once) ──► lock: open session, PlayerJoined
//!  destroy_session ──► lock: close session, PlayerDisconnected ──► delete private channels
//! ```

use std::sync::Arc;

use plaza_protocol::{
    AccessToken, ChannelId, Player, PlayerId, SessionToken, TownEvent, TownId, TownListing,
    UserLocation,
};
use plaza_provider::{ChannelProvider, ProviderError};
use plaza_session::{Session, SessionBook};
use tokio::sync::{Mutex, OnceCell};

use crate::config::{TownConfig, generate_update_password};
use crate::error::TownError;
use crate::listener::{ListenerRegistry, TownListener};
use crate::private::PrivateChannelIndex;

/// The town's broadcast and group channels and the token that created
/// them. Set at most once per town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedChannels {
    pub reference_token: AccessToken,
    pub broadcast: ChannelId,
    pub group: ChannelId,
}

/// Outcome of a successful [`TownController::destroy_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    /// The departed player's last known record.
    pub player: Player,

    /// Private channels the provider failed to delete. Empty when
    /// cleanup succeeded or there was nothing to clean up.
    pub stranded_channels: Vec<ChannelId>,
}

/// A roster entry, tied to the session that put it there.
struct Member {
    token: SessionToken,
    player: Player,
}

struct TownState {
    friendly_name: String,
    is_publicly_listed: bool,
    /// Join order.
    roster: Vec<Member>,
    sessions: SessionBook,
    private_channels: PrivateChannelIndex,
    listeners: ListenerRegistry,
    destroyed: bool,
    /// Set once some caller has taken responsibility for deleting the
    /// shared pair after teardown.
    shared_released: bool,
}

impl TownState {
    /// Closes a session and drops its roster entry together.
    fn remove_member(&mut self, token: &SessionToken) -> Option<(Session, Player)> {
        let session = self.sessions.close(token)?;
        let idx = self.roster.iter().position(|m| &m.token == token)?;
        let member = self.roster.remove(idx);
        Some((session, member.player))
    }

    fn find_player_mut(&mut self, player_id: &PlayerId) -> Option<&mut Player> {
        self.roster
            .iter_mut()
            .map(|m| &mut m.player)
            .find(|p| &p.id == player_id)
    }
}

// ---------------------------------------------------------------------------
// TownController
// ---------------------------------------------------------------------------

/// Coordinates one town. Shared as `Arc<TownController<P>>` between every
/// task acting for a player in the town.
pub struct TownController<P: ChannelProvider> {
    town_id: TownId,
    update_password: String,
    capacity: usize,
    sweep_private_channels: bool,
    provider: Arc<P>,
    shared: OnceCell<SharedChannels>,
    state: Mutex<TownState>,
}

impl<P: ChannelProvider> TownController<P> {
    /// Creates an empty town. Channels are provisioned on the first join.
    pub fn new(
        town_id: TownId,
        friendly_name: impl Into<String>,
        is_publicly_listed: bool,
        config: &TownConfig,
        provider: Arc<P>,
    ) -> Self {
        Self {
            town_id,
            update_password: generate_update_password(),
            capacity: config.capacity,
            sweep_private_channels: config.sweep_private_channels,
            provider,
            shared: OnceCell::new(),
            state: Mutex::new(TownState {
                friendly_name: friendly_name.into(),
                is_publicly_listed,
                roster: Vec::new(),
                sessions: SessionBook::new(),
                private_channels: PrivateChannelIndex::default(),
                listeners: ListenerRegistry::default(),
                destroyed: false,
                shared_released: false,
            }),
        }
    }

    // -- Joining and leaving ------------------------------------------------

    /// Adds `player` to the town and issues their session.
    ///
    /// The first successful join also provisions the town's broadcast and
    /// group channels. Concurrent first joins provision exactly once; the
    /// rest reuse the result. On any provider failure nothing is added.
    ///
    /// The controller does not deduplicate player ids and does not check
    /// capacity; both are the caller's business.
    pub async fn add_player(&self, player: Player) -> Result<Session, TownError> {
        if self.is_destroyed().await {
            return Err(TownError::Destroyed(self.town_id.clone()));
        }

        let access_token = self
            .provider
            .issue_access_token(&self.town_id, &player.id)
            .await?;
        let shared = self.provision_shared_channels(&access_token).await?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.destroyed {
            // If teardown found the cell still empty, nobody has released
            // the pair yet.
            let orphaned = !state.shared_released;
            state.shared_released = true;
            drop(guard);
            if orphaned {
                let pair = vec![shared.broadcast.clone(), shared.group.clone()];
                self.delete_best_effort(&shared.reference_token, pair).await;
            }
            return Err(TownError::Destroyed(self.town_id.clone()));
        }

        let session = state
            .sessions
            .open(
                player.id.clone(),
                access_token,
                shared.broadcast.clone(),
                shared.group.clone(),
            )
            .clone();
        state.roster.push(Member {
            token: session.token.clone(),
            player: player.clone(),
        });

        tracing::info!(
            town_id = %self.town_id,
            player_id = %player.id,
            players = state.roster.len(),
            "player joined"
        );
        state
            .listeners
            .broadcast(&TownEvent::PlayerJoined { player });

        Ok(session)
    }

    /// Provisions the broadcast and group channels on first use.
    ///
    /// If the group channel fails after the broadcast channel was created,
    /// the broadcast channel is deleted again and the cell stays empty, so
    /// the next joiner starts from scratch.
    async fn provision_shared_channels(
        &self,
        token: &AccessToken,
    ) -> Result<&SharedChannels, ProviderError> {
        self.shared
            .get_or_try_init(|| async {
                let broadcast = self.provider.create_channel(token).await?;
                let group = match self.provider.create_channel(token).await {
                    Ok(group) => group,
                    Err(e) => {
                        let orphan = std::slice::from_ref(&broadcast);
                        let cleanup = self.provider.delete_channels(token, orphan).await;
                        if let Err(cleanup) = cleanup {
                            tracing::warn!(
                                town_id = %self.town_id,
                                channel = %broadcast,
                                error = %cleanup,
                                "failed to delete orphaned broadcast channel"
                            );
                        }
                        return Err(e);
                    }
                };

                tracing::info!(
                    town_id = %self.town_id,
                    %broadcast,
                    %group,
                    "shared channels provisioned"
                );
                Ok::<_, ProviderError>(SharedChannels {
                    reference_token: token.clone(),
                    broadcast,
                    group,
                })
            })
            .await
    }

    /// Removes a session and its player from the town.
    ///
    /// Local cleanup always completes first and emits
    /// `PlayerDisconnected`. Afterwards the private channels the player
    /// created are deleted with the session's own access token; channels
    /// the provider refused to delete come back in
    /// [`Departure::stranded_channels`].
    ///
    /// Returns `None`, with no event and no provider call, if the session
    /// was not live.
    pub async fn destroy_session(&self, session: &Session) -> Option<Departure> {
        let (closed, player, owned) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let (closed, player) = state.remove_member(&session.token)?;
            let owned = state.private_channels.take(&player.id);

            tracing::info!(
                town_id = %self.town_id,
                player_id = %player.id,
                private_channels = owned.len(),
                players = state.roster.len(),
                "player left"
            );
            state.listeners.broadcast(&TownEvent::PlayerDisconnected {
                player: player.clone(),
            });

            (closed, player, owned)
        };

        let stranded_channels = self.delete_best_effort(&closed.access_token, owned).await;
        Some(Departure {
            player,
            stranded_channels,
        })
    }

    /// Deletes `channels`, returning them all if the provider refused.
    async fn delete_best_effort(
        &self,
        token: &AccessToken,
        channels: Vec<ChannelId>,
    ) -> Vec<ChannelId> {
        if channels.is_empty() {
            return channels;
        }
        match self.provider.delete_channels(token, &channels).await {
            Ok(()) => {
                tracing::debug!(
                    town_id = %self.town_id,
                    channels = channels.len(),
                    "channels deleted"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    town_id = %self.town_id,
                    channels = channels.len(),
                    error = %e,
                    "channel cleanup failed"
                );
                channels
            }
        }
    }

    // -- Movement -----------------------------------------------------------

    /// Overwrites a player's location and broadcasts `PlayerMoved`.
    pub async fn update_player_location(
        &self,
        player_id: &PlayerId,
        location: UserLocation,
    ) -> Result<Player, TownError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let player = state
            .find_player_mut(player_id)
            .ok_or_else(|| TownError::PlayerNotFound(player_id.clone(), self.town_id.clone()))?;
        player.update_location(location);
        let player = player.clone();

        tracing::trace!(town_id = %self.town_id, %player_id, "player moved");
        state.listeners.broadcast(&TownEvent::PlayerMoved {
            player: player.clone(),
        });
        Ok(player)
    }

    // -- Private channels ---------------------------------------------------

    /// Creates a private channel on behalf of `requester`.
    ///
    /// Returns `Ok(None)` without calling the provider if the requester
    /// has no live session. If the requester leaves while the channel is
    /// being created, the new channel is deleted again and `Ok(None)` is
    /// returned.
    pub async fn create_channel(
        &self,
        requester: &PlayerId,
    ) -> Result<Option<ChannelId>, TownError> {
        let token = {
            let state = self.state.lock().await;
            match state.sessions.find_by_player(requester) {
                Some(session) => session.access_token.clone(),
                None => {
                    tracing::debug!(
                        town_id = %self.town_id,
                        player_id = %requester,
                        "private channel requested by absent player"
                    );
                    return Ok(None);
                }
            }
        };

        let channel = self.provider.create_channel(&token).await?;

        {
            let mut state = self.state.lock().await;
            if state.sessions.find_by_player(requester).is_some() {
                state
                    .private_channels
                    .record(requester.clone(), channel.clone());
                tracing::debug!(
                    town_id = %self.town_id,
                    player_id = %requester,
                    %channel,
                    "private channel created"
                );
                return Ok(Some(channel));
            }
        }

        tracing::debug!(
            town_id = %self.town_id,
            player_id = %requester,
            %channel,
            "requester left during channel creation"
        );
        self.delete_best_effort(&token, vec![channel]).await;
        Ok(None)
    }

    /// Invites `target` to join `channel`, created by `requester`.
    ///
    /// Only listeners bound to `target` hear about it. Returns how many
    /// listeners that was; zero is not an error.
    pub async fn create_message_request(
        &self,
        target: &PlayerId,
        requester: &PlayerId,
        channel: &ChannelId,
    ) -> usize {
        let state = self.state.lock().await;
        let event = TownEvent::PrivateMessageRequest {
            channel: channel.clone(),
            requester: requester.clone(),
        };
        let delivered = state.listeners.notify_player(target, &event);
        tracing::debug!(
            town_id = %self.town_id,
            player_id = %requester,
            %target,
            delivered,
            "private channel invitation sent"
        );
        delivered
    }

    // -- Listeners ----------------------------------------------------------

    pub async fn add_town_listener(&self, listener: Arc<dyn TownListener>) {
        self.state.lock().await.listeners.add(listener);
    }

    /// Registers `listener` only if the town is live and has a free slot.
    ///
    /// Occupancy is the listener count, so the check and the registration
    /// share one critical section.
    pub async fn try_add_town_listener(
        &self,
        listener: Arc<dyn TownListener>,
    ) -> Result<(), TownError> {
        let mut state = self.state.lock().await;
        if state.destroyed {
            return Err(TownError::Destroyed(self.town_id.clone()));
        }
        if state.listeners.len() >= self.capacity {
            return Err(TownError::Full(self.town_id.clone()));
        }
        state.listeners.add(listener);
        Ok(())
    }

    /// Unregisters `listener` by identity. Unknown listeners are ignored.
    pub async fn remove_town_listener(&self, listener: &Arc<dyn TownListener>) -> bool {
        self.state.lock().await.listeners.remove(listener)
    }

    // -- Teardown -----------------------------------------------------------

    /// Tears the town down: deletes the shared channels, broadcasts
    /// `TownDestroyed` and refuses further joins.
    ///
    /// With `sweep_private_channels` configured, leftover private channels
    /// are deleted in the same request. Returns the channels the provider
    /// failed to delete. Calling this again does nothing.
    pub async fn disconnect_all_players(&self) -> Vec<ChannelId> {
        let (shared, swept) = {
            let mut state = self.state.lock().await;
            if state.destroyed {
                return Vec::new();
            }
            state.destroyed = true;

            // A join still provisioning leaves the cell empty here; that
            // join deletes the pair itself once it sees the town destroyed.
            let shared = self.shared.get();
            state.shared_released = shared.is_some();

            let swept = if self.sweep_private_channels {
                state.private_channels.drain_all()
            } else {
                Vec::new()
            };

            tracing::info!(
                town_id = %self.town_id,
                players = state.roster.len(),
                listeners = state.listeners.len(),
                private_channels_left = state.private_channels.len(),
                "town destroyed"
            );
            state.listeners.broadcast(&TownEvent::TownDestroyed);
            (shared, swept)
        };

        match shared {
            Some(shared) => {
                let mut channels = vec![shared.broadcast.clone(), shared.group.clone()];
                channels.extend(swept);
                self.delete_best_effort(&shared.reference_token, channels)
                    .await
            }
            None => swept,
        }
    }

    // -- Lookup and metadata ------------------------------------------------

    /// Returns the live session holding `token`, if any.
    pub async fn get_session_by_token(&self, token: &SessionToken) -> Option<Session> {
        self.state.lock().await.sessions.get(token).cloned()
    }

    pub fn town_id(&self) -> &TownId {
        &self.town_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The secret required to update or delete this town.
    pub fn update_password(&self) -> &str {
        &self.update_password
    }

    /// The broadcast and group channels, once provisioned.
    pub fn shared_channels(&self) -> Option<&SharedChannels> {
        self.shared.get()
    }

    pub async fn friendly_name(&self) -> String {
        self.state.lock().await.friendly_name.clone()
    }

    pub async fn set_friendly_name(&self, name: impl Into<String>) {
        self.state.lock().await.friendly_name = name.into();
    }

    pub async fn is_publicly_listed(&self) -> bool {
        self.state.lock().await.is_publicly_listed
    }

    pub async fn set_publicly_listed(&self, listed: bool) {
        self.state.lock().await.is_publicly_listed = listed;
    }

    /// Number of registered listeners.
    pub async fn occupancy(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    /// Whether one more player fits.
    pub async fn has_capacity(&self) -> bool {
        self.occupancy().await < self.capacity
    }

    /// Roster snapshot in join order.
    pub async fn players(&self) -> Vec<Player> {
        let state = self.state.lock().await;
        state.roster.iter().map(|m| m.player.clone()).collect()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Private channels `player_id` created and still owns.
    pub async fn private_channels_for(&self, player_id: &PlayerId) -> Vec<ChannelId> {
        let state = self.state.lock().await;
        state.private_channels.channels_for(player_id).to_vec()
    }

    pub async fn is_destroyed(&self) -> bool {
        self.state.lock().await.destroyed
    }

    /// This town as it appears in the public directory.
    pub async fn listing(&self) -> TownListing {
        let state = self.state.lock().await;
        TownListing {
            town_id: self.town_id.clone(),
            friendly_name: state.friendly_name.clone(),
            current_occupancy: state.listeners.len(),
            maximum_occupancy: self.capacity,
        }
    }
}
