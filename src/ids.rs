//! Identifier newtypes for the chat platform.
//!
//! These prevent mixing up the various opaque string identifiers the
//! platform hands us (communities, users, channels, messages, interaction
//! tokens).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for a community (guild) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub String);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GuildId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GuildId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Newtype for a platform user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Render as a platform mention.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Newtype for a channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for an interaction token.
///
/// The token authorizes follow-up replies to a specific interaction and is
/// never logged; `Debug` is implemented manually to redact it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionToken(pub String);

impl fmt::Debug for InteractionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteractionToken(..)")
    }
}

impl From<&str> for InteractionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mention() {
        let user = UserId::from("42");
        assert_eq!(user.mention(), "<@42>");
    }

    #[test]
    fn test_interaction_token_debug_redacts() {
        let token = InteractionToken::from("very-secret");
        assert!(!format!("{:?}", token).contains("very-secret"));
    }
}
