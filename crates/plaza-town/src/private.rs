//! Which player caused which private channel to exist.

use std::collections::HashMap;

use plaza_protocol::{ChannelId, PlayerId};

/// Private channels grouped by the player who requested them.
///
/// Only channels the provider actually created are recorded, so whatever
/// is taken out of here on departure is exactly what has to be deleted.
#[derive(Debug, Default)]
pub(crate) struct PrivateChannelIndex {
    by_requester: HashMap<PlayerId, Vec<ChannelId>>,
}

impl PrivateChannelIndex {
    pub(crate) fn record(&mut self, requester: PlayerId, channel: ChannelId) {
        self.by_requester.entry(requester).or_default().push(channel);
    }

    pub(crate) fn channels_for(&self, requester: &PlayerId) -> &[ChannelId] {
        self.by_requester
            .get(requester)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Removes and returns a requester's channels, oldest first.
    pub(crate) fn take(&mut self, requester: &PlayerId) -> Vec<ChannelId> {
        self.by_requester.remove(requester).unwrap_or_default()
    }

    /// Removes and returns every recorded channel.
    pub(crate) fn drain_all(&mut self) -> Vec<ChannelId> {
        self.by_requester.drain().flat_map(|(_, v)| v).collect()
    }

    /// Total number of recorded channels.
    pub(crate) fn len(&self) -> usize {
        self.by_requester.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn ch(s: &str) -> ChannelId {
        ChannelId::from(s)
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut idx = PrivateChannelIndex::default();
        idx.record(pid("ada"), ch("c1"));
        idx.record(pid("ada"), ch("c2"));

        assert_eq!(idx.channels_for(&pid("ada")), &[ch("c1"), ch("c2")]);
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_channels_for_unknown_requester_is_empty() {
        let idx = PrivateChannelIndex::default();
        assert!(idx.channels_for(&pid("ghost")).is_empty());
    }

    #[test]
    fn test_take_empties_the_entry() {
        let mut idx = PrivateChannelIndex::default();
        idx.record(pid("ada"), ch("c1"));
        idx.record(pid("bob"), ch("c2"));

        assert_eq!(idx.take(&pid("ada")), vec![ch("c1")]);
        assert!(idx.take(&pid("ada")).is_empty(), "second take finds nothing");
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_drain_all_returns_everything() {
        let mut idx = PrivateChannelIndex::default();
        idx.record(pid("ada"), ch("c1"));
        idx.record(pid("bob"), ch("c2"));
        idx.record(pid("bob"), ch("c3"));

        let mut all = idx.drain_all();
        all.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        assert_eq!(all, vec![ch("c1"), ch("c2"), ch("c3")]);
        assert_eq!(idx.len(), 0);
    }
}
