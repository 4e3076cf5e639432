//! Message literals spoken between peers.
//!
//! Every message is a [`Tag`] whose `t` attribute selects the message type.
//! The letters are reused across categories (file-share control vs package
//! notices); the tag name tells them apart. Peers interoperate on these
//! exact bytes.

use crate::tag::Tag;
use crate::types::PeerIdentity;

/// Tag name of file-share session messages
pub const SHARE_TAG: &str = "fs";

/// Tag name of package update notices
pub const NOTICE_TAG: &str = "pn";

pub const ATTR_TYPE: &str = "t";
pub const ATTR_UUID: &str = "u";
pub const ATTR_PATH: &str = "p";
pub const ATTR_STATUS: &str = "s";
pub const ATTR_PEER_UUID: &str = "i";
pub const ATTR_PEER_NICK: &str = "n";

pub const TYPE_ENCRYPTION: &str = "e";
pub const TYPE_UUID: &str = "u";
pub const TYPE_PASSWORD: &str = "p";
pub const TYPE_REQUEST: &str = "r";

/// Short status codes carried in the post of replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Visibility rejected the peer
    AccessDenied,
    /// Unknown package or path
    NotFound,
    /// Reading the requested file failed
    IoError,
    /// Stream complete
    Done,
    /// Stream cancelled
    Cancelled,
    /// Password or package selection required first
    AuthRequired,
    /// Package selected
    Selected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::AccessDenied => "a",
            Status::NotFound => "er",
            Status::IoError => "ex",
            Status::Done => "d",
            Status::Cancelled => "c",
            Status::AuthRequired => "pw",
            Status::Selected => "ok",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Status::AccessDenied),
            "er" => Some(Status::NotFound),
            "ex" => Some(Status::IoError),
            "d" => Some(Status::Done),
            "c" => Some(Status::Cancelled),
            "pw" => Some(Status::AuthRequired),
            "ok" => Some(Status::Selected),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session control messages sent by the downloading peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareMessage {
    /// Session secret for the transport cipher
    Encryption(Vec<u8>),
    /// Select a package, optionally naming the requesting peer
    Select {
        package: String,
        peer: Option<PeerIdentity>,
    },
    /// Password hash for the selected package
    Password(String),
    /// Request a file by its path relative to the package root
    Request(String),
    /// Anything else with the share tag name
    Unknown(String),
}

impl ShareMessage {
    /// Interpret a tag. `None` if it is not a file-share message at all.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        if tag.name() != SHARE_TAG {
            return None;
        }

        let kind = tag.attr(ATTR_TYPE).unwrap_or_default();
        let message = match kind {
            TYPE_ENCRYPTION => ShareMessage::Encryption(tag.post().to_vec()),
            TYPE_UUID => {
                let peer = match (tag.attr(ATTR_PEER_NICK), tag.attr(ATTR_PEER_UUID)) {
                    (Some(nick), Some(uuid)) => uuid::Uuid::parse_str(uuid)
                        .ok()
                        .map(|uuid| PeerIdentity::new(nick, uuid)),
                    _ => None,
                };
                ShareMessage::Select {
                    package: tag.attr(ATTR_UUID).unwrap_or_default().to_string(),
                    peer,
                }
            }
            TYPE_PASSWORD => {
                ShareMessage::Password(tag.post_str().unwrap_or_default().trim().to_string())
            }
            TYPE_REQUEST => {
                ShareMessage::Request(tag.attr(ATTR_PATH).unwrap_or_default().to_string())
            }
            other => ShareMessage::Unknown(other.to_string()),
        };
        Some(message)
    }

    pub fn to_tag(&self) -> Tag {
        let tag = Tag::new(SHARE_TAG);
        match self {
            ShareMessage::Encryption(secret) => tag
                .with_attr(ATTR_TYPE, TYPE_ENCRYPTION)
                .with_post(secret.clone()),
            ShareMessage::Select { package, peer } => {
                let mut tag = tag
                    .with_attr(ATTR_TYPE, TYPE_UUID)
                    .with_attr(ATTR_UUID, package.clone());
                if let Some(peer) = peer {
                    tag = tag
                        .with_attr(ATTR_PEER_NICK, peer.nick.clone())
                        .with_attr(ATTR_PEER_UUID, peer.uuid.to_string());
                }
                tag
            }
            ShareMessage::Password(hash) => tag
                .with_attr(ATTR_TYPE, TYPE_PASSWORD)
                .with_post(hash.clone()),
            ShareMessage::Request(path) => tag
                .with_attr(ATTR_TYPE, TYPE_REQUEST)
                .with_attr(ATTR_PATH, path.clone()),
            ShareMessage::Unknown(kind) => tag.with_attr(ATTR_TYPE, kind.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

pub fn encryption_reply(accepted: bool) -> Tag {
    Tag::new(SHARE_TAG)
        .with_attr(ATTR_TYPE, TYPE_ENCRYPTION)
        .with_attr(ATTR_STATUS, accepted.to_string())
}

pub fn select_reply(status: Status) -> Tag {
    Tag::new(SHARE_TAG)
        .with_attr(ATTR_TYPE, TYPE_UUID)
        .with_attr(ATTR_STATUS, (status == Status::Selected).to_string())
        .with_post(status.as_str())
}

pub fn password_reply(accepted: bool) -> Tag {
    Tag::new(SHARE_TAG)
        .with_attr(ATTR_TYPE, TYPE_PASSWORD)
        .with_attr(ATTR_STATUS, accepted.to_string())
}

/// One chunk of file data.
pub fn chunk(path: &str, bytes: &[u8]) -> Tag {
    Tag::new(SHARE_TAG)
        .with_attr(ATTR_TYPE, TYPE_REQUEST)
        .with_attr(ATTR_PATH, path)
        .with_attr(ATTR_STATUS, "true")
        .with_post(bytes.to_vec())
}

/// Final or error status of a file request.
pub fn request_status(path: &str, status: Status) -> Tag {
    Tag::new(SHARE_TAG)
        .with_attr(ATTR_TYPE, TYPE_REQUEST)
        .with_attr(ATTR_PATH, path)
        .with_attr(ATTR_STATUS, "false")
        .with_post(status.as_str())
}

/// Read the status code out of a reply.
pub fn reply_status(tag: &Tag) -> Option<Status> {
    tag.post_str().and_then(Status::from_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_message_roundtrip() {
        let messages = [
            ShareMessage::Encryption(vec![1; 16]),
            ShareMessage::Select {
                package: uuid::Uuid::new_v4().to_string(),
                peer: Some(PeerIdentity::new("bob", uuid::Uuid::new_v4())),
            },
            ShareMessage::Password("abc123".into()),
            ShareMessage::Request("docs/readme.txt".into()),
        ];

        for message in messages {
            let bytes = message.to_tag().into_encoded();
            let tag = Tag::parse(&bytes).unwrap();
            assert_eq!(ShareMessage::from_tag(&tag), Some(message));
        }
    }

    #[test]
    fn test_other_tag_names_ignored() {
        let tag = Tag::construct("chat", &["t", "u"]);
        assert_eq!(ShareMessage::from_tag(&tag), None);
    }

    #[test]
    fn test_unknown_type() {
        let tag = Tag::construct(SHARE_TAG, &["t", "zz"]);
        assert_eq!(
            ShareMessage::from_tag(&tag),
            Some(ShareMessage::Unknown("zz".into()))
        );
    }

    #[test]
    fn test_status_literals() {
        assert_eq!(Status::AccessDenied.as_str(), "a");
        assert_eq!(Status::NotFound.as_str(), "er");
        assert_eq!(Status::IoError.as_str(), "ex");
        assert_eq!(Status::Done.as_str(), "d");
        assert_eq!(Status::Cancelled.as_str(), "c");
        assert_eq!(Status::from_code("c"), Some(Status::Cancelled));
        assert_eq!(Status::from_code("zz"), None);
    }

    #[test]
    fn test_request_status_reply() {
        let reply = request_status("a.txt", Status::Done);
        assert!(!reply.attr_flag(ATTR_STATUS));
        assert_eq!(reply.attr(ATTR_PATH), Some("a.txt"));
        assert_eq!(reply_status(&reply), Some(Status::Done));

        let data = chunk("a.txt", b"xyz");
        assert!(data.attr_flag(ATTR_STATUS));
        assert_eq!(data.post(), b"xyz");
    }
}
