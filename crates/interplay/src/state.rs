//! The process-wide interaction dispatcher and command registry
//!
//! An [`InteractionState`] is built once at startup and attached to the
//! host's event source, after which it receives every raw
//! `INTERACTION_CREATE` payload.  It also owns the command cache and is the
//! only route through which commands are registered, edited or deleted, so
//! the cache and the persisted command map stay consistent.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::Value;
use serenity::model::id::{ApplicationId, CommandId, GuildId};

use crate::{
    command::{CommandCache, CommandEdit, CommandError, CommandRef, SlashCommand},
    config::{Config, UnknownInteractionPolicy},
    host::{
        DiscardEvents, EventParser, EventSink, EventSource, GuildCache, InteractionEvent, NoCache,
        INTERACTION_CREATE,
    },
    http::{HttpError, InteractionsHttp, Transport},
    interaction::{InteractionButton, InteractionCommand, PayloadError, RawInteraction},
    store::{CommandStore, MemoryStore, StoreError},
};

/// An error arising from building or attaching an [`InteractionState`]
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The state is already attached to an event source
    #[error("Interaction state is already attached")]
    AlreadyAttached,
    /// The event source already has a parser for interaction events
    #[error("Another parser is already installed for {0}")]
    ParserConflict(&'static str),
    /// The command store could not be read or written
    #[error("Error accessing command store")]
    Store(#[from] StoreError),
    /// The application ID could not be resolved
    #[error("Error resolving application ID")]
    Http(#[from] HttpError),
}

/// Builder for an [`InteractionState`]
pub struct Builder {
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn CommandStore>>,
    sink: Option<Arc<dyn EventSink>>,
    guilds: Option<Arc<dyn GuildCache>>,
    application_id: Option<ApplicationId>,
    config: Config,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("transport", &self.transport)
            .field("store", &self.store)
            .field("application_id", &self.application_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Set the persistent command store
    ///
    /// Defaults to an in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CommandStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the receiver for typed interaction events
    ///
    /// Defaults to discarding every event.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the host's guild cache, used for option resolution
    #[must_use]
    pub fn guild_cache(mut self, guilds: Arc<dyn GuildCache>) -> Self {
        self.guilds = Some(guilds);
        self
    }

    /// Use an explicit application ID rather than resolving one
    #[must_use]
    pub fn application_id(mut self, id: ApplicationId) -> Self {
        self.application_id = Some(id);
        self
    }

    /// Set the runtime configuration
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Resolve the application ID and construct the state
    ///
    /// The ID is taken from the builder, then the store, then the API, and is
    /// persisted if it was not already.
    ///
    /// # Errors
    /// This method returns an error if the store cannot be read or written, or
    /// if the ID must be fetched and the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn build(self) -> Result<Arc<InteractionState>, StateError> {
        let Self {
            transport,
            store,
            sink,
            guilds,
            application_id,
            config,
        } = self;

        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
        let stored = store.load().await?.application_id;

        let application_id = match (application_id, stored) {
            (Some(id), _) | (None, Some(id)) => id,
            (None, None) => {
                tracing::info!("Fetching application ID");
                InteractionsHttp::current_application(&*transport).await?
            },
        };

        if stored != Some(application_id) {
            store.set_application_id(application_id).await?;
        }

        let http = InteractionsHttp::new(transport, application_id)
            .default_allowed_mentions(config.default_allowed_mentions());

        Ok(Arc::new(InteractionState {
            http,
            commands: Arc::new(CommandCache::default()),
            store,
            sink: sink.unwrap_or_else(|| Arc::new(DiscardEvents)),
            guilds: guilds.unwrap_or_else(|| Arc::new(NoCache)),
            config,
            attached: AtomicBool::new(false),
        }))
    }
}

/// Owner of the command cache and dispatcher for interaction events
pub struct InteractionState {
    http: InteractionsHttp,
    commands: Arc<CommandCache>,
    store: Arc<dyn CommandStore>,
    sink: Arc<dyn EventSink>,
    guilds: Arc<dyn GuildCache>,
    config: Config,
    attached: AtomicBool,
}

impl fmt::Debug for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionState")
            .field("application_id", &self.http.application_id())
            .field("command_count", &self.commands.len())
            .field("attached", &self.attached.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InteractionState {
    /// Begin building a new state over the given transport
    #[must_use]
    pub fn builder(transport: Arc<dyn Transport>) -> Builder {
        Builder {
            transport,
            store: None,
            sink: None,
            guilds: None,
            application_id: None,
            config: Config::default(),
        }
    }

    /// The application this state acts as
    #[inline]
    #[must_use]
    pub fn application_id(&self) -> ApplicationId { self.http.application_id() }

    /// The underlying request builder
    #[inline]
    #[must_use]
    pub fn http(&self) -> &InteractionsHttp { &self.http }

    /// The active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config { &self.config }

    /// Install this state as the interaction event parser of `source`
    ///
    /// # Errors
    /// This method returns an error if this state is already attached, or if
    /// `source` already has an interaction parser.
    pub fn attach(self: &Arc<Self>, source: &dyn EventSource) -> Result<(), StateError> {
        if self.attached.swap(true, Ordering::SeqCst) {
            return Err(StateError::AlreadyAttached);
        }

        if !source.install_parser(INTERACTION_CREATE, Arc::clone(self) as Arc<dyn EventParser>) {
            self.attached.store(false, Ordering::SeqCst);
            return Err(StateError::ParserConflict(INTERACTION_CREATE));
        }

        tracing::debug!("Attached interaction parser");
        Ok(())
    }

    /// Remove this state's parser from `source`, returning whether it was
    /// installed there
    ///
    /// A parser belonging to anything else is left alone, and this state stays
    /// attached if its parser was not found.
    pub fn detach(self: &Arc<Self>, source: &dyn EventSource) -> bool {
        let parser = Arc::clone(self) as Arc<dyn EventParser>;
        if !source.remove_parser(INTERACTION_CREATE, &parser) {
            tracing::debug!("Interaction parser not installed on this source");
            return false;
        }

        self.attached.store(false, Ordering::SeqCst);
        tracing::debug!("Detached interaction parser");
        true
    }

    /// Load persisted commands into the cache, then attach to `source`
    ///
    /// Nothing is loaded if this state is already attached.
    ///
    /// # Errors
    /// This method returns an error if this state is already attached, the
    /// store cannot be read, or attaching fails.
    pub async fn initialize(self: &Arc<Self>, source: &dyn EventSource) -> Result<(), StateError> {
        if self.attached.load(Ordering::SeqCst) {
            return Err(StateError::AlreadyAttached);
        }

        let count = self.cache_commands().await?;
        tracing::info!(count, "Loaded persisted commands");
        self.attach(source)
    }

    /// Reload every persisted command into the cache, returning how many were
    /// loaded
    ///
    /// Records that cannot be read are logged and skipped.
    ///
    /// # Errors
    /// This method returns an error if the store cannot be read.
    pub async fn cache_commands(&self) -> Result<usize, StoreError> {
        let stored = self.store.load().await?;
        let mut count = 0;

        for (id, record) in stored.commands {
            match SlashCommand::from_value(record) {
                Ok(cmd) if cmd.id() == Some(id) => {
                    self.commands.insert(cmd);
                    count += 1;
                },
                Ok(cmd) => {
                    tracing::warn!(%id, stored_id = ?cmd.id(), "Persisted command ID mismatch");
                },
                Err(err) => tracing::warn!(%id, %err, "Skipping malformed persisted command"),
            }
        }

        Ok(count)
    }

    /// Look up a cached command
    #[inline]
    #[must_use]
    pub fn get_command(&self, id: CommandId) -> CommandRef { self.commands.get(id) }

    /// A snapshot of every cached command
    #[inline]
    #[must_use]
    pub fn commands(&self) -> Vec<Arc<SlashCommand>> { self.commands.all() }

    async fn persist(&self, cmd: SlashCommand) -> Result<Arc<SlashCommand>, CommandError> {
        let id = cmd.require_id()?;
        let record = cmd.to_value().map_err(CommandError::Malformed)?;
        self.store.save_command(id, record).await?;

        self.commands
            .insert(cmd)
            .ok_or(CommandError::Unknown(id))
    }

    /// Register a command with the API, then cache and persist it
    ///
    /// # Errors
    /// This method returns an error if the API call fails, returns malformed
    /// data, or the store cannot be written.
    #[tracing::instrument(level = "info", skip(self, cmd), fields(name = cmd.name()))]
    pub async fn register(
        &self,
        mut cmd: SlashCommand,
    ) -> Result<Arc<SlashCommand>, CommandError> {
        let data = match cmd.guild_id() {
            Some(guild) => {
                self.http
                    .add_guild_slash_command(guild, cmd.to_request())
                    .await?
            },
            None => self.http.add_slash_command(cmd.to_request()).await?,
        };

        cmd.apply_response(data)?;
        self.persist(cmd).await
    }

    /// Partially update a cached command, then re-cache and persist it
    ///
    /// # Errors
    /// This method returns an error if the command is not cached, the API call
    /// fails or returns malformed data, or the store cannot be written.
    #[tracing::instrument(level = "info", skip(self, edit))]
    pub async fn edit(
        &self,
        id: CommandId,
        edit: CommandEdit,
    ) -> Result<Arc<SlashCommand>, CommandError> {
        let CommandRef::Known(cached) = self.commands.get(id) else {
            return Err(CommandError::Unknown(id));
        };

        let data = match cached.guild_id() {
            Some(guild) => {
                self.http
                    .edit_guild_slash_command(guild, id, &edit)
                    .await?
            },
            None => self.http.edit_slash_command(id, &edit).await?,
        };

        let mut cmd = SlashCommand::clone(&cached);
        cmd.apply_response(data)?;
        self.persist(cmd).await
    }

    /// Delete a cached command from the API, the cache and the store
    ///
    /// Nothing is evicted if the API call fails.
    ///
    /// # Errors
    /// This method returns an error if the command is not cached, the API call
    /// fails, or the store cannot be written.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn delete(&self, id: CommandId) -> Result<(), CommandError> {
        let CommandRef::Known(cached) = self.commands.get(id) else {
            return Err(CommandError::Unknown(id));
        };

        match cached.guild_id() {
            Some(guild) => self.http.remove_guild_slash_command(guild, id).await?,
            None => self.http.remove_slash_command(id).await?,
        }

        self.commands.remove(id);
        self.store.remove_command(id).await?;
        Ok(())
    }

    /// List the commands currently registered with the API in one scope,
    /// without touching the cache
    ///
    /// # Errors
    /// This method returns an error if the API call fails or returns malformed
    /// data.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_commands(
        &self,
        guild: Option<GuildId>,
    ) -> Result<Vec<SlashCommand>, CommandError> {
        let data = match guild {
            Some(guild) => self.http.get_guild_slash_commands(guild).await?,
            None => self.http.get_slash_commands().await?,
        };

        parse_command_list(data, guild)
    }

    /// Replace every command in one scope with the given list
    ///
    /// Previously cached commands in the scope are evicted from the cache and
    /// the store; the commands returned by the API are cached and persisted.
    ///
    /// # Errors
    /// This method returns an error if the API call fails or returns malformed
    /// data, or the store cannot be written.
    #[tracing::instrument(level = "info", skip(self, cmds), fields(count = cmds.len()))]
    pub async fn replace_commands(
        &self,
        guild: Option<GuildId>,
        cmds: &[SlashCommand],
    ) -> Result<Vec<Arc<SlashCommand>>, CommandError> {
        let reqs: Vec<_> = cmds.iter().map(SlashCommand::to_request).collect();
        let data = match guild {
            Some(guild) => self.http.put_guild_slash_commands(guild, &reqs).await?,
            None => self.http.put_slash_commands(&reqs).await?,
        };
        let registered = parse_command_list(data, guild)?;

        for id in self.commands.remove_scope(guild) {
            self.store.remove_command(id).await?;
        }

        let mut out = Vec::with_capacity(registered.len());
        for cmd in registered {
            out.push(self.persist(cmd).await?);
        }

        Ok(out)
    }

    fn handle(&self, data: Value) -> Result<(), PayloadError> {
        let raw = RawInteraction::parse(data)?;
        let event = match raw.kind {
            2 => self.slash(raw)?,
            3 => self.button(raw)?,
            kind => match self.config.unknown_interactions {
                UnknownInteractionPolicy::Ignore => {
                    tracing::debug!(kind, "Ignoring interaction of unhandled type");
                    return Ok(());
                },
                UnknownInteractionPolicy::Reject => return Err(PayloadError::UnknownType(kind)),
                UnknownInteractionPolicy::TreatAsCommand => self.slash(raw)?,
            },
        };

        tracing::trace!(event = event.name(), "Dispatching interaction event");
        self.sink.dispatch(event);
        Ok(())
    }

    fn slash(&self, raw: RawInteraction) -> Result<InteractionEvent, PayloadError> {
        InteractionCommand::from_raw(
            self.http.clone(),
            raw,
            Arc::clone(&self.commands),
            &*self.guilds,
        )
        .map(|c| InteractionEvent::Slash(Arc::new(c)))
    }

    fn button(&self, raw: RawInteraction) -> Result<InteractionEvent, PayloadError> {
        InteractionButton::from_raw(self.http.clone(), raw)
            .map(|b| InteractionEvent::Button(Arc::new(b)))
    }
}

impl EventParser for InteractionState {
    fn parse(&self, data: Value) {
        tracing::trace!(%data, "Interaction data received");

        match self.handle(data.clone()) {
            Ok(()) => (),
            Err(err @ PayloadError::UnknownType(_)) => {
                tracing::warn!(%err, payload = %data, "Rejected interaction");
            },
            Err(err) => {
                tracing::error!(?err, payload = %data, "Error handling interaction");
            },
        }
    }
}

fn parse_command_list(
    data: Value,
    guild: Option<GuildId>,
) -> Result<Vec<SlashCommand>, CommandError> {
    let list: Vec<Value> = serde_json::from_value(data).map_err(CommandError::Malformed)?;

    list.into_iter()
        .map(|v| {
            let cmd = SlashCommand::from_value(v).map_err(CommandError::Malformed)?;
            Ok(match (cmd.guild_id(), guild) {
                (None, Some(g)) => cmd.guild(g),
                _ => cmd,
            })
        })
        .collect()
}
