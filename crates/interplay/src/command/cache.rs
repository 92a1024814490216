use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use serenity::model::id::{CommandId, GuildId};

use super::SlashCommand;

/// The result of looking up a command by ID
///
/// Lookups never fail outright: an unknown ID yields
/// [`Unknown`](Self::Unknown), which is falsy and still displays something
/// identifiable, so callers printing a command name need no special casing.
#[derive(Debug, Clone)]
pub enum CommandRef {
    /// A cached command
    Known(Arc<SlashCommand>),
    /// An ID with no cached command
    Unknown(CommandId),
}

impl CommandRef {
    /// Whether this refers to a cached command
    #[inline]
    #[must_use]
    pub fn is_known(&self) -> bool { matches!(self, Self::Known(_)) }

    /// The ID that was looked up
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<CommandId> {
        match self {
            Self::Known(c) => c.id(),
            Self::Unknown(i) => Some(*i),
        }
    }

    /// The cached command, if known
    #[inline]
    #[must_use]
    pub fn command(&self) -> Option<&Arc<SlashCommand>> {
        match self {
            Self::Known(c) => Some(c),
            Self::Unknown(_) => None,
        }
    }

    /// The command name, or an identifying placeholder for unknown commands
    #[must_use]
    pub fn name(&self) -> String { self.to_string() }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(c) => fmt::Display::fmt(c, f),
            Self::Unknown(i) => write!(f, "UnknownCommand(id={i})"),
        }
    }
}

/// Process-wide mapping from command ID to registered command
///
/// Entries are never evicted except by an explicit delete or bulk replace.
#[derive(Debug, Default)]
pub struct CommandCache(RwLock<HashMap<CommandId, Arc<SlashCommand>>>);

impl CommandCache {
    /// Look up a command by ID
    #[must_use]
    pub fn get(&self, id: CommandId) -> CommandRef {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map_or(CommandRef::Unknown(id), |c| CommandRef::Known(Arc::clone(c)))
    }

    /// Insert a registered command, replacing any previous entry with the same
    /// ID
    ///
    /// Commands without an ID are ignored and returned as `None`.
    pub fn insert(&self, cmd: SlashCommand) -> Option<Arc<SlashCommand>> {
        let id = cmd.id()?;
        let cmd = Arc::new(cmd);
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&cmd));
        Some(cmd)
    }

    /// Remove a command, returning it if it was cached
    pub fn remove(&self, id: CommandId) -> Option<Arc<SlashCommand>> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Remove every command in the given scope, returning their IDs
    pub fn remove_scope(&self, guild: Option<GuildId>) -> Vec<CommandId> {
        let mut map = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let ids: Vec<_> = map
            .iter()
            .filter(|(_, c)| c.guild_id() == guild)
            .map(|(i, _)| *i)
            .collect();

        for id in &ids {
            map.remove(id);
        }

        ids
    }

    /// A snapshot of every cached command
    #[must_use]
    pub fn all(&self) -> Vec<Arc<SlashCommand>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// The number of cached commands
    #[must_use]
    pub fn len(&self) -> usize { self.0.read().unwrap_or_else(PoisonError::into_inner).len() }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn registered(id: u64, guild: Option<u64>) -> SlashCommand {
        SlashCommand::from_value(json!({
            "id": id.to_string(),
            "name": format!("cmd{id}"),
            "description": "d",
            "guild_id": guild.map(|g| g.to_string()),
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_sentinel() {
        let cache = CommandCache::default();
        let found = cache.get(CommandId::new(55));

        assert!(!found.is_known());
        assert!(found.command().is_none());
        assert_eq!(found.id(), Some(CommandId::new(55)));
        assert_eq!(found.name(), "UnknownCommand(id=55)");
    }

    #[test]
    fn test_insert_remove() {
        let cache = CommandCache::default();
        assert!(cache.insert(SlashCommand::new("x", "y")).is_none());
        assert!(cache.is_empty());

        cache.insert(registered(1, None));
        assert_eq!(cache.get(CommandId::new(1)).name(), "cmd1");

        assert!(cache.remove(CommandId::new(1)).is_some());
        assert!(cache.remove(CommandId::new(1)).is_none());
        assert!(!cache.get(CommandId::new(1)).is_known());
    }

    #[test]
    fn test_remove_scope() {
        let cache = CommandCache::default();
        cache.insert(registered(1, None));
        cache.insert(registered(2, Some(10)));
        cache.insert(registered(3, Some(10)));
        cache.insert(registered(4, Some(11)));

        let mut removed = cache.remove_scope(Some(GuildId::new(10)));
        removed.sort();
        assert_eq!(removed, [CommandId::new(2), CommandId::new(3)]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(CommandId::new(1)).is_known());
    }
}
