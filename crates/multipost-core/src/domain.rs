use std::fmt;

/// Platform channel id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub i64);

/// Platform message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Regional data center id advertised in a migration redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataCenterId(pub i32);

/// Backend account id (opaque string).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix used for channels that have no platform username.
const SYNTHETIC_PREFIX: &str = "channel_";

/// A dispatch target as submitted by the client: either a platform
/// username or a synthetic `channel_<id>` identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostTarget {
    Channel(ChannelId),
    Username(String),
}

impl PostTarget {
    /// Parse a raw target string. A `channel_`-prefixed target with a
    /// non-numeric id yields `None` (resolution failure for that target).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.strip_prefix(SYNTHETIC_PREFIX) {
            Some(rest) => rest.parse::<i64>().ok().map(|id| Self::Channel(ChannelId(id))),
            None => Some(Self::Username(raw.to_string())),
        }
    }
}

impl fmt::Display for PostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "{SYNTHETIC_PREFIX}{}", id.0),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// Synthetic posting identifier for a channel without a username.
pub fn synthetic_username(id: ChannelId) -> String {
    format!("{SYNTHETIC_PREFIX}{}", id.0)
}

/// A writable channel as reported to the client: derived data, recomputed
/// per listing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub title: String,
    pub main_username: String,
}
