//! The session book: every live session of one town.
//!
//! # Concurrency note
//!
//! `SessionBook` is a plain `HashMap` wrapper with no locking of its own.
//! The town controller keeps it inside the town's single mutex, alongside
//! the roster it must stay consistent with.

use std::collections::HashMap;

use plaza_protocol::{AccessToken, ChannelId, PlayerId, SessionToken};

use crate::{Session, generate_session_token};

/// Live sessions keyed by their token.
///
/// ```text
/// open() ──→ [live: get()/find_by_player() resolve it] ──→ close()
///                                                            │
///                                                            ▼
///                                                  [gone: lookups miss]
/// ```
#[derive(Debug, Default)]
pub struct SessionBook {
    sessions: HashMap<SessionToken, Session>,
}

impl SessionBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new session for `player_id` and records it.
    ///
    /// The token is regenerated until it does not collide with a live
    /// session, so two live sessions never share a token.
    pub fn open(
        &mut self,
        player_id: PlayerId,
        access_token: AccessToken,
        broadcast_channel: ChannelId,
        group_channel: ChannelId,
    ) -> &Session {
        let token = loop {
            let candidate = generate_session_token();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        tracing::debug!(%player_id, "session opened");

        self.sessions.entry(token.clone()).or_insert(Session {
            player_id,
            token,
            access_token,
            broadcast_channel,
            group_channel,
        })
    }

    /// Removes a session. Returns `None` if it was not live, which makes
    /// closing twice harmless.
    pub fn close(&mut self, token: &SessionToken) -> Option<Session> {
        let removed = self.sessions.remove(token);
        if let Some(session) = &removed {
            tracing::debug!(player_id = %session.player_id, "session closed");
        }
        removed
    }

    /// Looks up a live session by its token.
    pub fn get(&self, token: &SessionToken) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Finds the live session of a player, if any.
    ///
    /// Linear scan; towns hold at most a few dozen sessions.
    pub fn find_by_player(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.values().find(|s| &s.player_id == player_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(book: &mut SessionBook, player: &str) -> Session {
        book.open(
            PlayerId::from(player),
            AccessToken::from(format!("tok-{player}")),
            ChannelId::from("broadcast"),
            ChannelId::from("group"),
        )
        .clone()
    }

    #[test]
    fn test_open_records_credentials_and_channels() {
        let mut book = SessionBook::new();

        let session = open(&mut book, "p1");

        assert_eq!(session.player_id, PlayerId::from("p1"));
        assert_eq!(session.access_token, AccessToken::from("tok-p1"));
        assert_eq!(session.broadcast_channel, ChannelId::from("broadcast"));
        assert_eq!(session.group_channel, ChannelId::from("group"));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_open_issues_unique_tokens() {
        let mut book = SessionBook::new();

        let a = open(&mut book, "p1");
        let b = open(&mut book, "p2");

        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_get_resolves_live_token() {
        let mut book = SessionBook::new();
        let session = open(&mut book, "p1");

        assert_eq!(book.get(&session.token), Some(&session));
    }

    #[test]
    fn test_close_makes_token_unresolvable() {
        let mut book = SessionBook::new();
        let session = open(&mut book, "p1");

        let closed = book.close(&session.token);

        assert_eq!(closed, Some(session.clone()));
        assert!(book.get(&session.token).is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn test_close_twice_returns_none_second_time() {
        let mut book = SessionBook::new();
        let session = open(&mut book, "p1");

        assert!(book.close(&session.token).is_some());
        assert!(book.close(&session.token).is_none());
    }

    #[test]
    fn test_find_by_player_only_sees_live_sessions() {
        let mut book = SessionBook::new();
        let s1 = open(&mut book, "p1");
        open(&mut book, "p2");

        assert_eq!(
            book.find_by_player(&PlayerId::from("p1")).map(|s| &s.token),
            Some(&s1.token)
        );

        book.close(&s1.token);
        assert!(book.find_by_player(&PlayerId::from("p1")).is_none());
        assert!(book.find_by_player(&PlayerId::from("p2")).is_some());
    }

    #[test]
    fn test_get_unknown_token_is_none() {
        let book = SessionBook::new();
        assert!(book.get(&SessionToken::from("nope")).is_none());
        assert!(book.is_empty());
    }
}
