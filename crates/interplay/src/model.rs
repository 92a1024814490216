//! Minimal platform object models consumed from interaction payloads
//!
//! These only carry the fields this crate reads.  Everything is lenient on
//! deserialization: missing display fields fall back to their defaults so a
//! sparse payload still produces a usable object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serenity::model::{
    id::{ChannelId, GuildId, MessageId, RoleId, UserId},
    Timestamp,
};

/// A platform user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID
    pub id: UserId,
    /// The user's unique handle
    #[serde(rename = "username", default)]
    pub name: String,
    /// The user's display name, if set
    #[serde(default)]
    pub global_name: Option<String>,
    /// Whether this account belongs to a bot
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Construct a user with only an ID and handle
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            global_name: None,
            bot: false,
        }
    }

    /// The name to show for this user
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str { self.global_name.as_deref().unwrap_or(&self.name) }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "@{}", self.name) }
}

/// A user's membership in a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The guild this membership belongs to
    ///
    /// Interaction payloads omit this, so it is filled in from the
    /// interaction after parsing.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// The member's user account
    pub user: User,
    /// The member's guild nickname
    #[serde(default)]
    pub nick: Option<String>,
    /// The roles assigned to this member
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// When the user joined the guild
    #[serde(default)]
    pub joined_at: Option<Timestamp>,
}

impl Member {
    /// The name to show for this member within its guild
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.nick
            .as_deref()
            .unwrap_or_else(|| self.user.display_name())
    }
}

/// A guild member with its user object stripped, as found in the `members`
/// resolved bundle
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PartialMember {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub joined_at: Option<Timestamp>,
}

impl PartialMember {
    pub(crate) fn into_member(self, guild_id: GuildId, user: User) -> Member {
        let Self {
            nick,
            roles,
            joined_at,
        } = self;

        Member {
            guild_id: Some(guild_id),
            user,
            nick,
            roles,
            joined_at,
        }
    }
}

/// Either a bare user or a guild member, depending on where an interaction
/// originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Person {
    /// A user outside of any guild context
    User(User),
    /// A user acting within a guild
    Member(Member),
}

impl Person {
    /// The underlying user account
    #[inline]
    #[must_use]
    pub fn user(&self) -> &User {
        match self {
            Self::User(u) => u,
            Self::Member(m) => &m.user,
        }
    }

    /// The user's ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> UserId { self.user().id }

    /// The guild membership, if any
    #[inline]
    #[must_use]
    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::User(_) => None,
            Self::Member(m) => Some(m),
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self.user(), f) }
}

/// A guild role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// The role's ID
    pub id: RoleId,
    /// The guild the role belongs to, filled in after parsing
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// The role's name
    #[serde(default)]
    pub name: String,
    /// The role's color as an RGB integer
    #[serde(default, rename = "color")]
    pub colour: u32,
    /// The role's position in the hierarchy
    #[serde(default)]
    pub position: i32,
    /// Whether the role can be mentioned by anyone
    #[serde(default)]
    pub mentionable: bool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "@{}", self.name) }
}

/// A text, voice, category or DM channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// The channel's ID
    pub id: ChannelId,
    /// The raw channel type code
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// The guild containing this channel, or `None` for DM channels
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// The channel's name
    #[serde(default)]
    pub name: Option<String>,
    /// The category containing this channel
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
}

impl Channel {
    /// Whether this channel exists outside of a guild
    #[inline]
    #[must_use]
    pub fn is_private(&self) -> bool { self.guild_id.is_none() }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(ref n) => write!(f, "#{n}"),
            None => write!(f, "<#{}>", self.id),
        }
    }
}

/// A reference from one message to another (e.g. a reply)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    /// The referenced message
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// The channel containing the referenced message
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// The guild containing the referenced message
    #[serde(default)]
    pub guild_id: Option<GuildId>,
}

/// A channel message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The message's ID
    pub id: MessageId,
    /// The channel the message was posted in
    pub channel_id: ChannelId,
    /// The message's author
    #[serde(default)]
    pub author: Option<User>,
    /// The text content of the message
    #[serde(default)]
    pub content: String,
    /// When the message was posted
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    /// The raw message flags
    #[serde(default)]
    pub flags: Option<u64>,
    /// The message this one references, if any
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
    /// The raw component rows attached to the message
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sparse_user() {
        let user: User = serde_json::from_value(json!({ "id": 9 })).unwrap();
        assert_eq!(user.id, UserId::new(9));
        assert_eq!(user.name, "");
        assert!(!user.bot);

        let user: User =
            serde_json::from_value(json!({ "id": "9", "username": "q", "global_name": "Q" }))
                .unwrap();
        assert_eq!(user.display_name(), "Q");
    }

    #[test]
    fn test_member_display_name() {
        let member = PartialMember {
            nick: Some("nick".into()),
            ..PartialMember::default()
        }
        .into_member(GuildId::new(1), User::new(UserId::new(2), "user"));

        assert_eq!(member.guild_id, Some(GuildId::new(1)));
        assert_eq!(member.display_name(), "nick");
        assert_eq!(Person::Member(member).id(), UserId::new(2));
    }

    #[test]
    fn test_channel_display() {
        let chan: Channel =
            serde_json::from_value(json!({ "id": "5", "type": 0, "name": "general" })).unwrap();
        assert_eq!(chan.to_string(), "#general");
        assert!(chan.is_private());
    }
}
