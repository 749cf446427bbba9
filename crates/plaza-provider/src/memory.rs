//! An in-process provider for development servers and tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use plaza_protocol::{AccessToken, ChannelId, PlayerId, TownId};

use crate::{ChannelProvider, ProviderError};

const UNLIMITED: usize = usize::MAX;

/// A [`ChannelProvider`] that keeps everything in memory.
///
/// Besides behaving like a provider it counts calls, logs every deletion
/// request, and can be told to fail, so tests can assert exactly what the
/// town controller asked for.
#[derive(Debug)]
pub struct MemoryProvider {
    next_id: AtomicU64,
    token_requests: AtomicUsize,
    create_requests: AtomicUsize,
    /// Creations left before `create_channel` starts failing.
    create_budget: AtomicUsize,
    latency: Option<Duration>,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    issued: HashSet<AccessToken>,
    live: Vec<ChannelId>,
    deletions: Vec<Vec<ChannelId>>,
    fail_tokens: bool,
    fail_deletes: bool,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// A provider that answers immediately and never fails.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            token_requests: AtomicUsize::new(0),
            create_requests: AtomicUsize::new(0),
            create_budget: AtomicUsize::new(UNLIMITED),
            latency: None,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A provider that sleeps for `latency` inside every call, which
    /// widens the window for concurrent callers to interleave.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    /// Makes token issuance fail (or succeed again).
    pub fn fail_token_issuance(&self, fail: bool) {
        self.lock().fail_tokens = fail;
    }

    /// Allows `budget` more successful channel creations, after which
    /// every creation fails. `None` lifts the limit.
    pub fn set_creation_budget(&self, budget: Option<usize>) {
        self.create_budget
            .store(budget.unwrap_or(UNLIMITED), Ordering::SeqCst);
    }

    /// Makes channel deletion fail (or succeed again). Failed requests
    /// are still logged.
    pub fn fail_deletion(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// How many times `issue_access_token` was called.
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// How many times `create_channel` was called, successful or not.
    pub fn create_requests(&self) -> usize {
        self.create_requests.load(Ordering::SeqCst)
    }

    /// Channels created and not yet deleted, in creation order.
    pub fn live_channels(&self) -> Vec<ChannelId> {
        self.lock().live.clone()
    }

    /// Every `delete_channels` request, in call order.
    pub fn deletion_requests(&self) -> Vec<Vec<ChannelId>> {
        self.lock().deletions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_creation_slot(&self) -> bool {
        self.create_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl ChannelProvider for MemoryProvider {
    async fn issue_access_token(
        &self,
        town: &TownId,
        client: &PlayerId,
    ) -> Result<AccessToken, ProviderError> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut state = self.lock();
        if state.fail_tokens {
            return Err(ProviderError::Unavailable("token service down".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = AccessToken(format!("AT-{town}-{client}-{n}"));
        state.issued.insert(token.clone());
        Ok(token)
    }

    async fn create_channel(&self, token: &AccessToken) -> Result<ChannelId, ProviderError> {
        self.create_requests.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if !self.lock().issued.contains(token) {
            return Err(ProviderError::Rejected("unknown access token".into()));
        }
        if !self.take_creation_slot() {
            return Err(ProviderError::Unavailable("channel quota exhausted".into()));
        }

        let channel = ChannelId(format!(
            "CH{:08x}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        self.lock().live.push(channel.clone());
        tracing::trace!(%channel, "memory provider created channel");
        Ok(channel)
    }

    async fn delete_channels(
        &self,
        token: &AccessToken,
        channels: &[ChannelId],
    ) -> Result<(), ProviderError> {
        self.pause().await;

        let mut state = self.lock();
        state.deletions.push(channels.to_vec());
        if state.fail_deletes {
            return Err(ProviderError::Unavailable("delete timed out".into()));
        }
        if !state.issued.contains(token) {
            return Err(ProviderError::Rejected("unknown access token".into()));
        }

        let mut unknown = None;
        for channel in channels {
            match state.live.iter().position(|c| c == channel) {
                Some(idx) => {
                    state.live.remove(idx);
                }
                None => unknown = unknown.or_else(|| Some(channel.clone())),
            }
        }
        match unknown {
            Some(channel) => Err(ProviderError::UnknownChannel(channel)),
            None => Ok(()),
        }
    }
}
