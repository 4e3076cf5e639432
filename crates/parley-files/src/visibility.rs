//! Who may see and download a package.

use std::fmt;
use std::str::FromStr;

use parley_shared::PeerIdentity;
use uuid::Uuid;

/// Answers which chat channels a peer is currently in.
pub trait ChannelMembership: Send + Sync {
    fn channels_of(&self, peer: &PeerIdentity) -> Vec<String>;
}

impl<F> ChannelMembership for F
where
    F: Fn(&PeerIdentity) -> Vec<String> + Send + Sync,
{
    fn channels_of(&self, peer: &PeerIdentity) -> Vec<String> {
        self(peer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityKind {
    #[default]
    Public,
    /// Hidden until discovered with the package key
    Private,
    /// Members of any listed channel
    Channel,
    /// Listed users, matched by uuid
    User,
}

impl VisibilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityKind::Public => "public",
            VisibilityKind::Private => "private",
            VisibilityKind::Channel => "channel",
            VisibilityKind::User => "user",
        }
    }
}

impl fmt::Display for VisibilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(VisibilityKind::Public),
            "private" => Ok(VisibilityKind::Private),
            "channel" => Ok(VisibilityKind::Channel),
            "user" => Ok(VisibilityKind::User),
            other => Err(format!("unknown visibility {other:?}")),
        }
    }
}

/// Access policy of a package.
///
/// `data` depends on the kind: comma-separated channel names for
/// [`VisibilityKind::Channel`], comma-separated `nick|uuid` pairs for
/// [`VisibilityKind::User`], the package key for [`VisibilityKind::Private`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Visibility {
    pub kind: VisibilityKind,
    pub data: String,
    pub discovered: bool,
}

impl Visibility {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn private(key: impl Into<String>) -> Self {
        Self {
            kind: VisibilityKind::Private,
            data: key.into(),
            discovered: false,
        }
    }

    pub fn channels<S: AsRef<str>>(channels: &[S]) -> Self {
        Self {
            kind: VisibilityKind::Channel,
            data: join(channels.iter().map(|c| c.as_ref().trim().to_string())),
            discovered: false,
        }
    }

    pub fn users(users: &[PeerIdentity]) -> Self {
        Self {
            kind: VisibilityKind::User,
            data: join(users.iter().map(PeerIdentity::to_pair)),
            discovered: false,
        }
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        split_list(&self.data)
    }

    /// Uuids from the `nick|uuid` list. Unparseable entries are skipped.
    pub fn user_uuids(&self) -> impl Iterator<Item = Uuid> + '_ {
        split_list(&self.data).filter_map(|entry| {
            let (_, uuid) = entry.rsplit_once('|')?;
            Uuid::parse_str(uuid.trim()).ok()
        })
    }

    /// Whether `peer` may download from the package.
    ///
    /// Private packages pass here: their gate is discovery, not transfer.
    pub fn permits(&self, peer: &PeerIdentity, membership: &dyn ChannelMembership) -> bool {
        match self.kind {
            VisibilityKind::Public | VisibilityKind::Private => true,
            VisibilityKind::Channel => {
                let joined = membership.channels_of(peer);
                self.channel_names()
                    .any(|channel| joined.iter().any(|j| j == channel))
            }
            VisibilityKind::User => self.user_uuids().any(|uuid| uuid == peer.uuid),
        }
    }

    /// Whether the package may be announced at all.
    pub fn listable(&self) -> bool {
        self.kind != VisibilityKind::Private || self.discovered
    }

    /// Mark a private package discovered when `key` matches.
    pub fn discover(&mut self, key: &str) -> bool {
        if self.kind == VisibilityKind::Private && !self.data.is_empty() && self.data == key {
            self.discovered = true;
        }
        self.discovered
    }
}

fn split_list(data: &str) -> impl Iterator<Item = &str> {
    data.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(nick: &str) -> PeerIdentity {
        PeerIdentity::new(nick, Uuid::new_v4())
    }

    fn in_channels(channels: &'static [&'static str]) -> impl ChannelMembership {
        move |_: &PeerIdentity| channels.iter().map(|c| c.to_string()).collect::<Vec<_>>()
    }

    #[test]
    fn test_public_always_permits() {
        assert!(Visibility::public().permits(&peer("a"), &in_channels(&[])));
    }

    #[test]
    fn test_channel_membership() {
        let visibility = Visibility::channels(&["#rust", " #music "]);
        assert_eq!(visibility.data, "#rust,#music");

        assert!(visibility.permits(&peer("a"), &in_channels(&["#music"])));
        assert!(visibility.permits(&peer("a"), &in_channels(&["#other", "#rust"])));
        assert!(!visibility.permits(&peer("a"), &in_channels(&["#other"])));
        assert!(!visibility.permits(&peer("a"), &in_channels(&[])));
    }

    #[test]
    fn test_user_matches_uuid_not_nick() {
        let alice = peer("alice");
        let visibility = Visibility::users(&[alice.clone()]);

        let renamed = PeerIdentity::new("not-alice", alice.uuid);
        assert!(visibility.permits(&renamed, &in_channels(&[])));

        let impostor = PeerIdentity::new("alice", Uuid::new_v4());
        assert!(!visibility.permits(&impostor, &in_channels(&[])));
    }

    #[test]
    fn test_channel_does_not_fall_through_to_users() {
        let alice = peer("alice");
        let visibility = Visibility {
            kind: VisibilityKind::Channel,
            data: alice.to_pair(),
            discovered: false,
        };
        assert!(!visibility.permits(&alice, &in_channels(&["#rust"])));
    }

    #[test]
    fn test_private_listing_requires_discovery() {
        let mut visibility = Visibility::private("s3cret");
        assert!(!visibility.listable());
        assert!(!visibility.discover("wrong"));
        assert!(!visibility.listable());
        assert!(visibility.discover("s3cret"));
        assert!(visibility.listable());
        assert!(visibility.permits(&peer("a"), &in_channels(&[])));
    }

    #[test]
    fn test_kind_parse() {
        for kind in [
            VisibilityKind::Public,
            VisibilityKind::Private,
            VisibilityKind::Channel,
            VisibilityKind::User,
        ] {
            assert_eq!(kind.as_str().parse::<VisibilityKind>(), Ok(kind));
        }
        assert!("everyone".parse::<VisibilityKind>().is_err());
    }
}
