//! Channel variant taxonomy (§3) and the per-channel subscriber registry.

pub mod manager;

use serde::{Deserialize, Serialize};

/// The six channel classes, composed from two orthogonal capabilities
/// (§9: "tagged variants + composed capabilities" rather than an
/// inheritance hierarchy). Selection is by name prefix, evaluated in the
/// order below — first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    Public,
    Private,
    Presence,
    Cache,
    PrivateCache,
    PresenceCache,
}

impl ChannelType {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("private-cache-") {
            ChannelType::PrivateCache
        } else if name.starts_with("presence-cache-") {
            ChannelType::PresenceCache
        } else if name.starts_with("cache-") || name == "cache" {
            ChannelType::Cache
        } else if name.starts_with("private-") {
            ChannelType::Private
        } else if name.starts_with("presence-") {
            ChannelType::Presence
        } else {
            ChannelType::Public
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(
            self,
            ChannelType::Private | ChannelType::Presence | ChannelType::PrivateCache | ChannelType::PresenceCache
        )
    }

    pub fn is_cache(self) -> bool {
        matches!(self, ChannelType::Cache | ChannelType::PrivateCache | ChannelType::PresenceCache)
    }

    pub fn is_presence(self) -> bool {
        matches!(self, ChannelType::Presence | ChannelType::PresenceCache)
    }

    /// Client events (§4.5.2) are allowed only on private/presence channels
    /// and their cache variants.
    pub fn allows_client_events(self) -> bool {
        matches!(
            self,
            ChannelType::Private | ChannelType::Presence | ChannelType::PrivateCache | ChannelType::PresenceCache
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_dispatch_is_first_match_wins() {
        assert_eq!(ChannelType::from_name("private-cache-foo"), ChannelType::PrivateCache);
        assert_eq!(ChannelType::from_name("presence-cache-foo"), ChannelType::PresenceCache);
        assert_eq!(ChannelType::from_name("cache-foo"), ChannelType::Cache);
        assert_eq!(ChannelType::from_name("cache"), ChannelType::Cache);
        assert_eq!(ChannelType::from_name("private-foo"), ChannelType::Private);
        assert_eq!(ChannelType::from_name("presence-foo"), ChannelType::Presence);
        assert_eq!(ChannelType::from_name("chat"), ChannelType::Public);
    }

    #[test]
    fn capabilities_match_variant() {
        assert!(ChannelType::PresenceCache.requires_auth());
        assert!(ChannelType::PresenceCache.is_cache());
        assert!(ChannelType::PresenceCache.is_presence());
        assert!(!ChannelType::Public.requires_auth());
        assert!(!ChannelType::Cache.requires_auth());
    }
}
