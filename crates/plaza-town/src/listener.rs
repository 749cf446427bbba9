//! Town listeners: who hears about what happens in a town.
//!
//! Every listener hears the broadcast events (joins, moves, departures,
//! teardown). A listener bound to a player additionally hears private
//! channel invitations addressed to that player.

use std::sync::Arc;

use plaza_protocol::{PlayerId, TownEvent};
use tokio::sync::mpsc;

/// Whom a listener speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerTarget {
    /// Acts for one player and receives their private invitations.
    Player(PlayerId),
    /// Observes the town without representing anyone.
    Broadcast,
}

impl ListenerTarget {
    /// Returns `true` if this target is bound to `player_id`.
    pub fn is_player(&self, player_id: &PlayerId) -> bool {
        matches!(self, Self::Player(id) if id == player_id)
    }
}

/// Receives town events.
///
/// Callbacks run while the town's lock is held, which is what keeps event
/// order identical to mutation order. Implementations must not block or
/// call back into the town.
pub trait TownListener: Send + Sync + 'static {
    fn target(&self) -> &ListenerTarget;

    fn on_event(&self, event: &TownEvent);
}

/// Receiving half of a [`ForwardingListener`].
pub type EventReceiver = mpsc::UnboundedReceiver<TownEvent>;

/// A listener that forwards every event into an unbounded channel.
///
/// The gateway registers one per connected player and relays whatever
/// arrives on the receiver to the socket. If the receiver is gone the
/// event is dropped.
pub struct ForwardingListener {
    target: ListenerTarget,
    sender: mpsc::UnboundedSender<TownEvent>,
}

impl ForwardingListener {
    pub fn new(target: ListenerTarget, sender: mpsc::UnboundedSender<TownEvent>) -> Self {
        Self { target, sender }
    }

    /// Creates a listener together with the receiver it feeds.
    pub fn channel(target: ListenerTarget) -> (Arc<Self>, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(target, tx)), rx)
    }
}

impl TownListener for ForwardingListener {
    fn target(&self) -> &ListenerTarget {
        &self.target
    }

    fn on_event(&self, event: &TownEvent) {
        let _ = self.sender.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<Arc<dyn TownListener>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, listener: Arc<dyn TownListener>) {
        self.listeners.push(listener);
    }

    /// Removes `listener` by identity. Returns `false` if it was never
    /// registered.
    pub(crate) fn remove(&mut self, listener: &Arc<dyn TownListener>) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
        self.listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers `event` to every listener.
    pub(crate) fn broadcast(&self, event: &TownEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }

    /// Delivers `event` only to listeners bound to `player_id`. Returns
    /// how many received it.
    pub(crate) fn notify_player(&self, player_id: &PlayerId, event: &TownEvent) -> usize {
        let mut delivered = 0;
        for listener in &self.listeners {
            if listener.target().is_player(player_id) {
                listener.on_event(event);
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_protocol::ChannelId;

    fn listener(target: ListenerTarget) -> (Arc<dyn TownListener>, EventReceiver) {
        let (l, rx) = ForwardingListener::channel(target);
        (l, rx)
    }

    fn invite() -> TownEvent {
        TownEvent::PrivateMessageRequest {
            channel: ChannelId::from("CH1"),
            requester: PlayerId::from("bob"),
        }
    }

    #[test]
    fn test_broadcast_reaches_every_listener() {
        let mut reg = ListenerRegistry::default();
        let (a, mut rx_a) = listener(ListenerTarget::Player(PlayerId::from("ada")));
        let (b, mut rx_b) = listener(ListenerTarget::Broadcast);
        reg.add(a);
        reg.add(b);

        reg.broadcast(&TownEvent::TownDestroyed);

        assert_eq!(rx_a.try_recv().unwrap(), TownEvent::TownDestroyed);
        assert_eq!(rx_b.try_recv().unwrap(), TownEvent::TownDestroyed);
    }

    #[test]
    fn test_notify_player_skips_other_targets() {
        let mut reg = ListenerRegistry::default();
        let (ada, mut rx_ada) = listener(ListenerTarget::Player(PlayerId::from("ada")));
        let (cy, mut rx_cy) = listener(ListenerTarget::Player(PlayerId::from("cy")));
        let (obs, mut rx_obs) = listener(ListenerTarget::Broadcast);
        reg.add(ada);
        reg.add(cy);
        reg.add(obs);

        let delivered = reg.notify_player(&PlayerId::from("ada"), &invite());

        assert_eq!(delivered, 1);
        assert_eq!(rx_ada.try_recv().unwrap(), invite());
        assert!(rx_cy.try_recv().is_err());
        assert!(rx_obs.try_recv().is_err());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut reg = ListenerRegistry::default();
        let (a, _rx_a) = listener(ListenerTarget::Broadcast);
        let (b, mut rx_b) = listener(ListenerTarget::Broadcast);
        reg.add(a.clone());
        reg.add(b);

        assert!(reg.remove(&a));
        assert_eq!(reg.len(), 1);

        reg.broadcast(&TownEvent::TownDestroyed);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let mut reg = ListenerRegistry::default();
        let (a, _rx_a) = listener(ListenerTarget::Broadcast);
        let (stranger, _rx_s) = listener(ListenerTarget::Broadcast);
        reg.add(a);

        assert!(!reg.remove(&stranger));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_forwarding_listener_survives_dropped_receiver() {
        let (l, rx) = ForwardingListener::channel(ListenerTarget::Broadcast);
        drop(rx);
        l.on_event(&TownEvent::TownDestroyed);
    }

    #[test]
    fn test_listener_target_is_player() {
        let ada = PlayerId::from("ada");
        assert!(ListenerTarget::Player(ada.clone()).is_player(&ada));
        assert!(!ListenerTarget::Player(PlayerId::from("bob")).is_player(&ada));
        assert!(!ListenerTarget::Broadcast.is_player(&ada));
    }
}
