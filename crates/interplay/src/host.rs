//! Seams through which the host bot process plugs into this crate
//!
//! The host owns the gateway connection, its guild cache, and whatever
//! listener machinery reacts to interactions.  This module defines the
//! minimal surface needed from each, plus simple implementations usable by
//! hosts without their own.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};

use crate::{
    interaction::{InteractionButton, InteractionCommand},
    model::{Channel, Member, Role, User},
};

/// The gateway event name carrying interaction payloads
pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";

/// A handler for one raw gateway event type
pub trait EventParser: Send + Sync {
    /// Handle a raw event payload
    ///
    /// Implementations must not panic on malformed input.
    fn parse(&self, data: Value);
}

/// A host-side table of raw event parsers, keyed by gateway event name
pub trait EventSource {
    /// Install a parser for the given event
    ///
    /// Returns `false` without replacing anything if a parser is already
    /// installed for that event.
    fn install_parser(&self, event: &'static str, parser: Arc<dyn EventParser>) -> bool;

    /// Remove the parser for the given event if it is `parser`, returning
    /// whether it was removed
    ///
    /// A different parser installed for the same event is left in place.
    fn remove_parser(&self, event: &str, parser: &Arc<dyn EventParser>) -> bool;
}

/// Whether two parser handles point at the same parser
#[inline]
#[must_use]
pub fn same_parser(a: &Arc<dyn EventParser>, b: &Arc<dyn EventParser>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A simple [`EventSource`] for hosts that route raw events by name
#[derive(Default)]
pub struct ParserTable(RwLock<HashMap<&'static str, Arc<dyn EventParser>>>);

impl ParserTable {
    /// Deliver a raw event to its parser, returning whether one was installed
    pub fn deliver(&self, event: &str, data: Value) -> bool {
        let parser = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned();

        if let Some(parser) = parser {
            parser.parse(data);
            true
        } else {
            tracing::trace!(event, "No parser installed for event");
            false
        }
    }

    /// Whether a parser is installed for the given event
    #[must_use]
    pub fn has_parser(&self, event: &str) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event)
    }
}

impl fmt::Debug for ParserTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.0.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_set().entries(map.keys()).finish()
    }
}

impl EventSource for ParserTable {
    fn install_parser(&self, event: &'static str, parser: Arc<dyn EventParser>) -> bool {
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(event) {
            return false;
        }

        map.insert(event, parser);
        true
    }

    fn remove_parser(&self, event: &str, parser: &Arc<dyn EventParser>) -> bool {
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if !map.get(event).is_some_and(|p| same_parser(p, parser)) {
            return false;
        }

        map.remove(event);
        true
    }
}

/// A typed interaction event re-emitted to host listeners
#[derive(Debug, Clone)]
pub enum InteractionEvent {
    /// A slash command was invoked
    Slash(Arc<InteractionCommand>),
    /// A button was pressed
    Button(Arc<InteractionButton>),
}

impl InteractionEvent {
    /// The listener event name for this interaction
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slash(_) => "slash_interaction",
            Self::Button(_) => "button_interaction",
        }
    }
}

/// Receiver for typed interaction events
///
/// [`dispatch`](Self::dispatch) is called synchronously from the event
/// parser; implementations should hand any real work off to a task.
pub trait EventSink: Send + Sync {
    /// Emit an event to listeners
    fn dispatch(&self, event: InteractionEvent);
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<InteractionEvent> {
    fn dispatch(&self, event: InteractionEvent) {
        if let Err(err) = self.send(event) {
            tracing::warn!(event = err.0.name(), "Interaction listener channel closed");
        }
    }
}

/// An [`EventSink`] that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn dispatch(&self, event: InteractionEvent) {
        tracing::trace!(event = event.name(), "Discarding interaction event");
    }
}

/// Read and write access to the host's cached guild state
///
/// Every method has a no-op default, so hosts need only implement what their
/// cache actually stores.
pub trait GuildCache: fmt::Debug + Send + Sync {
    /// Look up a cached guild member
    fn member(&self, guild: GuildId, user: UserId) -> Option<Member> {
        let _ = (guild, user);
        None
    }

    /// Add a member built from interaction data to the cache
    fn add_member(&self, member: &Member) { let _ = member; }

    /// Look up a cached guild channel
    fn guild_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel> {
        let _ = (guild, channel);
        None
    }

    /// Look up a cached DM channel
    fn private_channel(&self, channel: ChannelId) -> Option<Channel> {
        let _ = channel;
        None
    }

    /// Look up a cached guild role
    fn role(&self, guild: GuildId, role: RoleId) -> Option<Role> {
        let _ = (guild, role);
        None
    }

    /// Add a role built from interaction data to the cache
    fn add_role(&self, role: &Role) { let _ = role; }

    /// Record a user seen in a DM interaction
    fn store_user(&self, user: &User) { let _ = user; }
}

/// A [`GuildCache`] that caches nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl GuildCache for NoCache {}

/// A small in-memory [`GuildCache`]
#[derive(Debug, Default)]
pub struct MemoryGuildCache {
    members: RwLock<HashMap<(GuildId, UserId), Member>>,
    channels: RwLock<HashMap<ChannelId, Channel>>,
    roles: RwLock<HashMap<(GuildId, RoleId), Role>>,
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryGuildCache {
    /// Insert or replace a channel
    pub fn add_channel(&self, channel: Channel) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.id, channel);
    }

    /// Look up a stored user
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl GuildCache for MemoryGuildCache {
    fn member(&self, guild: GuildId, user: UserId) -> Option<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(guild, user))
            .cloned()
    }

    fn add_member(&self, member: &Member) {
        let Some(guild) = member.guild_id else { return };
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((guild, member.user.id), member.clone());
    }

    fn guild_channel(&self, guild: GuildId, channel: ChannelId) -> Option<Channel> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .filter(|c| c.guild_id == Some(guild))
            .cloned()
    }

    fn private_channel(&self, channel: ChannelId) -> Option<Channel> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .filter(|c| c.is_private())
            .cloned()
    }

    fn role(&self, guild: GuildId, role: RoleId) -> Option<Role> {
        self.roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(guild, role))
            .cloned()
    }

    fn add_role(&self, role: &Role) {
        let Some(guild) = role.guild_id else { return };
        self.roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((guild, role.id), role.clone());
    }

    fn store_user(&self, user: &User) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user.clone());
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl EventParser for Counter {
        fn parse(&self, _: Value) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    #[test]
    fn test_parser_table() {
        let table = ParserTable::default();
        let counter = Arc::new(Counter::default());
        let parser = Arc::clone(&counter) as Arc<dyn EventParser>;
        let stranger = Arc::new(Counter::default()) as Arc<dyn EventParser>;

        assert!(!table.deliver(INTERACTION_CREATE, json!({})));
        assert!(table.install_parser(INTERACTION_CREATE, Arc::clone(&parser)));
        assert!(!table.install_parser(INTERACTION_CREATE, Arc::clone(&stranger)));

        assert!(table.deliver(INTERACTION_CREATE, json!({})));
        assert!(table.deliver(INTERACTION_CREATE, json!({})));
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        assert!(!table.remove_parser(INTERACTION_CREATE, &stranger));
        assert!(table.has_parser(INTERACTION_CREATE));

        assert!(table.remove_parser(INTERACTION_CREATE, &parser));
        assert!(!table.remove_parser(INTERACTION_CREATE, &parser));
        assert!(!table.has_parser(INTERACTION_CREATE));
    }

    #[test]
    fn test_memory_cache_scoping() {
        let cache = MemoryGuildCache::default();
        cache.add_channel(Channel {
            id: ChannelId::new(3),
            kind: 0,
            guild_id: Some(GuildId::new(1)),
            name: Some("general".into()),
            parent_id: None,
        });

        assert!(cache
            .guild_channel(GuildId::new(1), ChannelId::new(3))
            .is_some());
        assert!(cache
            .guild_channel(GuildId::new(2), ChannelId::new(3))
            .is_none());
        assert!(cache.private_channel(ChannelId::new(3)).is_none());
    }
}
