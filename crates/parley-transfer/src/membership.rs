//! Channel membership from a fixed table.
//!
//! The chat side normally answers which channels a user sits in; a share
//! server without a chat connection is configured with a static table.

use std::collections::{BTreeMap, BTreeSet};

use parley_files::ChannelMembership;
use parley_shared::PeerIdentity;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticMembership {
    channels: BTreeMap<String, BTreeSet<Uuid>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, channel: impl Into<String>, user: Uuid) {
        self.channels.entry(channel.into()).or_default().insert(user);
    }

    /// Parse `chan=uuid,uuid;chan2=uuid`. Bad entries are skipped with a warning.
    pub fn parse(table: &str) -> Self {
        let mut membership = Self::new();
        for entry in table.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((channel, users)) = entry.split_once('=') else {
                warn!(entry, "Ignoring channel entry without '='");
                continue;
            };
            let channel = channel.trim();
            if channel.is_empty() {
                warn!(entry, "Ignoring channel entry without a name");
                continue;
            }
            for user in users.split(',').map(str::trim).filter(|u| !u.is_empty()) {
                match Uuid::parse_str(user) {
                    Ok(uuid) => membership.join(channel, uuid),
                    Err(_) => warn!(channel, user, "Ignoring invalid member uuid"),
                }
            }
        }
        membership
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl ChannelMembership for StaticMembership {
    fn channels_of(&self, peer: &PeerIdentity) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, members)| members.contains(&peer.uuid))
            .map(|(channel, _)| channel.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let membership = StaticMembership::parse(&format!(
            "#rust={a}, {b} ; #music={b};#broken;={a};#bad=nope"
        ));

        assert_eq!(membership.channel_count(), 2);
        assert_eq!(
            membership.channels_of(&PeerIdentity::new("a", a)),
            vec!["#rust".to_string()]
        );
        assert_eq!(
            membership.channels_of(&PeerIdentity::new("b", b)),
            vec!["#music".to_string(), "#rust".to_string()]
        );
        assert!(membership
            .channels_of(&PeerIdentity::new("c", Uuid::new_v4()))
            .is_empty());
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(StaticMembership::parse(""), StaticMembership::new());
    }
}
