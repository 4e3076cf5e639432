use uuid::Uuid;

/// Who is on the other end of a connection: a chat nick plus the user's
/// stable uuid. Access checks only ever look at the uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    pub nick: String,
    pub uuid: Uuid,
}

impl PeerIdentity {
    pub fn new(nick: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            nick: nick.into(),
            uuid,
        }
    }

    /// Parse one `nick|uuid` entry as used in user visibility lists.
    pub fn from_pair(pair: &str) -> Option<Self> {
        let (nick, uuid) = pair.trim().rsplit_once('|')?;
        let uuid = Uuid::parse_str(uuid.trim()).ok()?;
        Some(Self::new(nick.trim(), uuid))
    }

    pub fn to_pair(&self) -> String {
        format!("{}|{}", self.nick, self.uuid)
    }
}

impl std::fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.nick, self.uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
