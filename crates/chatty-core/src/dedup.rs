//! Record of message ids already forwarded.
//!
//! Lives for the whole process and never evicts.

use chatty_config::DedupScope;
use dashmap::DashSet;

use crate::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    channel: Option<Channel>,
    id: i64,
}

#[derive(Debug)]
pub struct DedupSet {
    scope: DedupScope,
    sent: DashSet<Key>,
}

impl DedupSet {
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            sent: DashSet::new(),
        }
    }

    fn key(&self, channel: Channel, id: i64) -> Key {
        let channel = match self.scope {
            // Raw ids only: equal ids on different channels collide.
            DedupScope::Global => None,
            DedupScope::PerChannel => Some(channel),
        };
        Key { channel, id }
    }

    /// Record `id` as sent. Returns `true` only for the first caller.
    pub fn mark_sent(&self, channel: Channel, id: i64) -> bool {
        self.sent.insert(self.key(channel, id))
    }

    pub fn contains(&self, channel: Channel, id: i64) -> bool {
        self.sent.contains(&self.key(channel, id))
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    pub fn scope(&self) -> DedupScope {
        self.scope
    }
}
