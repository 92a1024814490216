//! Types for describing registered slash commands and caching them in memory

mod cache;
mod option;

use std::fmt;

pub use cache::*;
pub use option::*;
use serde::{Deserialize, Serialize};
use serenity::model::id::{ApplicationId, CommandId, GuildId};

use crate::{http::HttpError, store::StoreError};

/// An error arising from registering, editing or deleting a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The API call failed
    #[error("HTTP error")]
    Http(#[from] HttpError),
    /// The persisted command map could not be updated
    #[error("Error persisting command")]
    Store(#[from] StoreError),
    /// The API returned data that could not be read as a command
    #[error("Malformed command data from API")]
    Malformed(#[source] serde_json::Error),
    /// The command has no ID, i.e. was never registered
    #[error("Command {0:?} has not been registered")]
    Unregistered(String),
    /// No command with the given ID is cached
    #[error("Unknown command {0}")]
    Unknown(CommandId),
}

/// A slash command, either registered with the platform or awaiting
/// registration
///
/// The ID is assigned by the platform on registration; a locally-constructed
/// command has none until then.  A `guild_id` of `None` denotes a global
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    id: Option<CommandId>,
    #[serde(default)]
    application_id: Option<ApplicationId>,
    name: String,
    description: String,
    #[serde(default)]
    guild_id: Option<GuildId>,
    #[serde(default)]
    options: Vec<SlashOption>,
}

/// The request body for creating or overwriting a command
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommandRequest<'a> {
    name: &'a str,
    description: &'a str,
    options: &'a [SlashOption],
}

/// A partial update to a registered command
///
/// Only fields set to `Some` are sent; everything else is left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandEdit {
    /// The new command name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The new command description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The new parameter list, replacing the old one wholesale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SlashOption>>,
}

impl CommandEdit {
    /// Whether this edit would change nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.options.is_none()
    }
}

/// The subset of fields read back from a create or edit response
#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    id: Option<CommandId>,
    #[serde(default)]
    application_id: Option<ApplicationId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    options: Vec<SlashOption>,
}

impl SlashCommand {
    /// Construct a new, unregistered global command
    #[must_use]
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            id: None,
            application_id: None,
            name: name.into(),
            description: desc.into(),
            guild_id: None,
            options: vec![],
        }
    }

    /// Scope this command to a single guild
    #[inline]
    #[must_use]
    pub fn guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// Append a parameter or subcommand
    #[inline]
    #[must_use]
    pub fn option(mut self, option: SlashOption) -> Self {
        self.options.push(option);
        self
    }

    /// Append several parameters or subcommands
    #[inline]
    #[must_use]
    pub fn options(mut self, options: impl IntoIterator<Item = SlashOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// The platform-assigned ID, if registered
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<CommandId> { self.id }

    /// The ID of the application owning this command, if registered
    #[inline]
    #[must_use]
    pub fn application_id(&self) -> Option<ApplicationId> { self.application_id }

    /// The guild this command is scoped to, or `None` if global
    #[inline]
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> { self.guild_id }

    /// The command's name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The fully-qualified name of this command, as shown to users
    #[inline]
    #[must_use]
    pub fn qualified_name(&self) -> &str { &self.name }

    /// The command's description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str { &self.description }

    /// The command's parameters or subcommands
    #[inline]
    #[must_use]
    pub fn get_options(&self) -> &[SlashOption] { &self.options }

    /// Produce the minimal payload for a create or overwrite call
    #[inline]
    #[must_use]
    pub fn to_request(&self) -> CommandRequest<'_> {
        CommandRequest {
            name: &self.name,
            description: &self.description,
            options: &self.options,
        }
    }

    /// Serialize the full state of this command, including its identity, for
    /// persistence
    ///
    /// # Errors
    /// This method returns an error if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Reconstruct a command from persisted or API data
    ///
    /// # Errors
    /// This function returns an error if required fields are missing or an
    /// option has an invalid type.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Merge a create or edit response into this command
    ///
    /// Identity and naming fields are only overwritten when present; the
    /// option list is always replaced.
    pub(crate) fn apply_response(&mut self, data: serde_json::Value) -> Result<(), CommandError> {
        let CommandResponse {
            id,
            application_id,
            name,
            description,
            options,
        } = serde_json::from_value(data).map_err(CommandError::Malformed)?;

        if let Some(id) = id {
            self.id = Some(id);
        }
        if let Some(app) = application_id {
            self.application_id = Some(app);
        }
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.name = name;
        }
        if let Some(desc) = description.filter(|d| !d.is_empty()) {
            self.description = desc;
        }
        self.options = options;

        Ok(())
    }

    /// Require this command to have been registered
    pub(crate) fn require_id(&self) -> Result<CommandId, CommandError> {
        self.id
            .ok_or_else(|| CommandError::Unregistered(self.name.clone()))
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name) }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn sample() -> SlashCommand {
        SlashCommand::new("tag", "Manage tags")
            .guild(GuildId::new(42))
            .option(
                SlashOption::new(SlashOptionType::SubCommand, "add", "Add a tag")
                    .option(
                        SlashOption::new(SlashOptionType::String, "name", "Tag name")
                            .required(true),
                    )
                    .option(SlashOption::new(
                        SlashOptionType::Channel,
                        "where",
                        "Target channel",
                    )),
            )
            .option(
                SlashOption::new(SlashOptionType::SubCommand, "mode", "Set mode").option(
                    SlashOption::new(SlashOptionType::Integer, "level", "Level")
                        .choice("Low", 1_i64)
                        .choice("High", 2_i64),
                ),
            )
    }

    #[test]
    fn test_request_omits_identity() {
        let mut cmd = sample();
        cmd.id = Some(CommandId::new(7));
        cmd.application_id = Some(ApplicationId::new(8));

        let req = serde_json::to_value(cmd.to_request()).unwrap();
        let obj = req.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(req["name"], "tag");
        assert_eq!(req["description"], "Manage tags");
        assert_eq!(req["options"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_persisted_roundtrip() {
        let mut cmd = sample();
        cmd.id = Some(CommandId::new(7));

        let value = cmd.to_value().unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["guild_id"], "42");

        let back = SlashCommand::from_value(value).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_from_api_data() {
        let cmd = SlashCommand::from_value(json!({
            "id": "55",
            "application_id": "1",
            "version": "99",
            "type": 1,
            "name": "ping",
            "description": "Ping!",
        }))
        .unwrap();

        assert_eq!(cmd.id(), Some(CommandId::new(55)));
        assert_eq!(cmd.guild_id(), None);
        assert!(cmd.get_options().is_empty());
    }

    #[test]
    fn test_apply_response() {
        let mut cmd = sample();
        cmd.apply_response(json!({
            "id": "9",
            "application_id": "3",
            "name": "tag",
            "description": "",
            "options": [{ "type": 3, "name": "q", "description": "Query" }],
        }))
        .unwrap();

        assert_eq!(cmd.id(), Some(CommandId::new(9)));
        assert_eq!(cmd.application_id(), Some(ApplicationId::new(3)));
        assert_eq!(cmd.description(), "Manage tags");
        assert_eq!(cmd.get_options().len(), 1);
        assert_eq!(cmd.get_options()[0].name(), "q");
        assert_eq!(cmd.require_id().unwrap(), CommandId::new(9));
    }

    #[test]
    fn test_unregistered() {
        assert!(matches!(
            sample().require_id(),
            Err(CommandError::Unregistered(n)) if n == "tag"
        ));
    }

    fn arb_leaf() -> impl Strategy<Value = SlashOption> {
        (
            3_u8..=8,
            "[a-z]{1,12}",
            ".{0,40}",
            any::<bool>(),
            prop::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..4),
        )
            .prop_map(|(kind, name, desc, req, choices)| {
                SlashOption::try_new(kind, name, desc)
                    .unwrap()
                    .required(req)
                    .choices(
                        choices
                            .into_iter()
                            .map(|(n, v)| SlashOptionChoice::new(n, v)),
                    )
            })
    }

    fn arb_option() -> impl Strategy<Value = SlashOption> {
        prop_oneof![
            arb_leaf(),
            ("[a-z]{1,12}", ".{0,40}", prop::collection::vec(arb_leaf(), 0..4)).prop_map(
                |(name, desc, opts)| {
                    opts.into_iter().fold(
                        SlashOption::new(SlashOptionType::SubCommand, name, desc),
                        SlashOption::option,
                    )
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn prop_persisted_roundtrip(
            id in 1_u32..,
            guild in prop::option::of(1_u64..u64::from(u32::MAX)),
            name in "[a-z]{1,32}",
            desc in ".{1,100}",
            opts in prop::collection::vec(arb_option(), 0..6),
        ) {
            let mut cmd = SlashCommand::new(name, desc).options(opts);
            cmd.id = Some(CommandId::new(u64::from(id)));
            cmd.guild_id = guild.map(GuildId::new);

            let back = SlashCommand::from_value(cmd.to_value().unwrap()).unwrap();
            prop_assert_eq!(back.name(), cmd.name());
            prop_assert_eq!(back.description(), cmd.description());
            prop_assert_eq!(back.guild_id(), cmd.guild_id());
            prop_assert_eq!(back.get_options(), cmd.get_options());
        }
    }
}
