use std::{collections::HashMap, fmt, ops::Deref, sync::Arc};

use serde::Deserialize;
use serde_json::Value;
use serenity::model::id::{ChannelId, CommandId, GuildId, RoleId, UserId};

use super::{InteractionResponse, PayloadError, RawInteraction, ResolveError};
use crate::{
    command::{CommandCache, CommandRef, SlashOptionType},
    host::GuildCache,
    http::InteractionsHttp,
    model::{Channel, PartialMember, Person, Role, User},
};

/// The value supplied for a single command option
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// The scalar exactly as it appeared in the payload
    Raw(Value),
    /// A user, resolved from the payload or the guild cache
    User(Person),
    /// A channel, resolved from the payload or the guild cache
    Channel(Channel),
    /// A role, resolved from the payload or the guild cache
    Role(Role),
}

impl OptionValue {
    /// The raw value as a string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Raw(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The raw value as an integer, if it is one
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Raw(v) => v.as_i64(),
            _ => None,
        }
    }

    /// The raw value as a boolean, if it is one
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Raw(v) => v.as_bool(),
            _ => None,
        }
    }

    /// The resolved user, if this is one
    #[must_use]
    pub fn as_user(&self) -> Option<&Person> {
        match self {
            Self::User(p) => Some(p),
            _ => None,
        }
    }

    /// The resolved channel, if this is one
    #[must_use]
    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// The resolved role, if this is one
    #[must_use]
    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(Value::String(s)) => f.write_str(s),
            Self::Raw(v) => fmt::Display::fmt(v, f),
            Self::User(p) => fmt::Display::fmt(p, f),
            Self::Channel(c) => fmt::Display::fmt(c, f),
            Self::Role(r) => fmt::Display::fmt(r, f),
        }
    }
}

/// One argument supplied by the invoking user
///
/// Subcommands and subcommand groups carry no value, only nested options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseOption {
    kind: SlashOptionType,
    name: String,
    value: Option<OptionValue>,
    options: Vec<ResponseOption>,
}

impl ResponseOption {
    /// The option's declared type
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SlashOptionType { self.kind }

    /// The option's name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The supplied value
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&OptionValue> { self.value.as_ref() }

    /// Nested options, for subcommands
    #[inline]
    #[must_use]
    pub fn options(&self) -> &[ResponseOption] { &self.options }

    fn write_summary(&self, out: &mut String) {
        use fmt::Write;

        match self.value {
            Some(ref v) => write!(out, " `{}: {v}`", self.name),
            None => write!(out, " {}", self.name),
        }
        .ok();

        for opt in &self.options {
            opt.write_summary(out);
        }
    }
}

impl fmt::Display for ResponseOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref v) => write!(f, "{}: {v}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandData {
    id: CommandId,
    name: String,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    resolved: Resolved,
}

fn default_option_type() -> SlashOptionType { SlashOptionType::String }

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(rename = "type", default = "default_option_type")]
    kind: SlashOptionType,
    name: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    options: Vec<RawOption>,
}

#[derive(Debug, Default, Deserialize)]
struct Resolved {
    #[serde(default)]
    users: HashMap<String, Value>,
    #[serde(default)]
    members: HashMap<String, Value>,
    #[serde(default)]
    roles: HashMap<String, Value>,
    #[serde(default)]
    channels: HashMap<String, Value>,
}

struct ResolveCtx<'a> {
    guild_id: Option<GuildId>,
    resolved: &'a Resolved,
    guilds: &'a dyn GuildCache,
}

impl ResolveCtx<'_> {
    fn entry<T: serde::de::DeserializeOwned>(
        map: &HashMap<String, Value>,
        kind: &'static str,
        key: &str,
    ) -> Result<T, ResolveError> {
        let value = map.get(key).ok_or_else(|| ResolveError::Missing {
            kind,
            id: key.to_owned(),
        })?;

        T::deserialize(value).map_err(|source| ResolveError::Malformed { kind, source })
    }
}

fn snowflake(value: &Value) -> Result<(String, u64), ResolveError> {
    let key = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        v => return Err(ResolveError::BadId(v.clone())),
    };

    match key.parse() {
        Ok(0) | Err(_) => Err(ResolveError::BadId(value.clone())),
        Ok(id) => Ok((key, id)),
    }
}

type Resolver = fn(&ResolveCtx<'_>, &Value) -> Result<OptionValue, ResolveError>;

/// The resolver for each option type whose raw value is a reference into the
/// resolved bundle.  Types with no entry keep their raw value.
fn resolver(kind: SlashOptionType) -> Option<Resolver> {
    match kind {
        SlashOptionType::User => Some(resolve_user),
        SlashOptionType::Channel => Some(resolve_channel),
        SlashOptionType::Role => Some(resolve_role),
        SlashOptionType::SubCommand
        | SlashOptionType::SubCommandGroup
        | SlashOptionType::String
        | SlashOptionType::Integer
        | SlashOptionType::Boolean => None,
    }
}

fn resolve_user(ctx: &ResolveCtx<'_>, value: &Value) -> Result<OptionValue, ResolveError> {
    let (key, id) = snowflake(value)?;
    let id = UserId::new(id);

    let Some(guild) = ctx.guild_id else {
        let user: User = ResolveCtx::entry(&ctx.resolved.users, "user", &key)?;
        ctx.guilds.store_user(&user);
        return Ok(OptionValue::User(Person::User(user)));
    };

    if let Some(member) = ctx.guilds.member(guild, id) {
        return Ok(OptionValue::User(Person::Member(member)));
    }

    let user: User = ResolveCtx::entry(&ctx.resolved.users, "user", &key)?;
    if !ctx.resolved.members.contains_key(&key) {
        return Ok(OptionValue::User(Person::User(user)));
    }

    let partial: PartialMember = ResolveCtx::entry(&ctx.resolved.members, "member", &key)?;
    let member = partial.into_member(guild, user);
    ctx.guilds.add_member(&member);
    Ok(OptionValue::User(Person::Member(member)))
}

fn resolve_channel(ctx: &ResolveCtx<'_>, value: &Value) -> Result<OptionValue, ResolveError> {
    let (key, id) = snowflake(value)?;
    let id = ChannelId::new(id);

    let cached = match ctx.guild_id {
        Some(guild) => ctx.guilds.guild_channel(guild, id),
        None => ctx.guilds.private_channel(id),
    };
    if let Some(channel) = cached {
        return Ok(OptionValue::Channel(channel));
    }

    let mut channel: Channel = ResolveCtx::entry(&ctx.resolved.channels, "channel", &key)?;
    channel.guild_id = channel.guild_id.or(ctx.guild_id);
    Ok(OptionValue::Channel(channel))
}

fn resolve_role(ctx: &ResolveCtx<'_>, value: &Value) -> Result<OptionValue, ResolveError> {
    let (key, id) = snowflake(value)?;
    let guild = ctx.guild_id.ok_or(ResolveError::NoGuild("role"))?;

    if let Some(role) = ctx.guilds.role(guild, RoleId::new(id)) {
        return Ok(OptionValue::Role(role));
    }

    let mut role: Role = ResolveCtx::entry(&ctx.resolved.roles, "role", &key)?;
    role.guild_id = Some(guild);
    ctx.guilds.add_role(&role);
    Ok(OptionValue::Role(role))
}

fn parse_options(ctx: &ResolveCtx<'_>, raw: Vec<RawOption>) -> Vec<ResponseOption> {
    raw.into_iter()
        .map(|RawOption {
                 kind,
                 name,
                 value,
                 options,
             }| {
            let value = value.map(|value| {
                let Some(resolve) = resolver(kind) else {
                    return OptionValue::Raw(value);
                };

                resolve(ctx, &value).unwrap_or_else(|err| {
                    tracing::error!(
                        ?err,
                        option = %name,
                        %kind,
                        raw = %value,
                        "Failed to resolve option value"
                    );
                    OptionValue::Raw(value)
                })
            });

            ResponseOption {
                kind,
                name,
                value,
                options: parse_options(ctx, options),
            }
        })
        .collect()
}

/// A slash command invocation
pub struct InteractionCommand {
    base: InteractionResponse,
    command_name: String,
    command_id: CommandId,
    options: Vec<ResponseOption>,
    content: String,
    commands: Arc<CommandCache>,
}

impl fmt::Debug for InteractionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionCommand")
            .field("base", &self.base)
            .field("command", &self.command())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Deref for InteractionCommand {
    type Target = InteractionResponse;

    fn deref(&self) -> &Self::Target { &self.base }
}

impl InteractionCommand {
    pub(crate) fn from_raw(
        http: InteractionsHttp,
        raw: RawInteraction,
        commands: Arc<CommandCache>,
        guilds: &dyn GuildCache,
    ) -> Result<Self, PayloadError> {
        let base = InteractionResponse::from_raw(http, raw)?;
        let CommandData {
            id,
            name,
            options,
            resolved,
        } = CommandData::deserialize(base.data())?;

        let ctx = ResolveCtx {
            guild_id: base.guild_id(),
            resolved: &resolved,
            guilds,
        };
        let options = parse_options(&ctx, options);

        let mut content = format!("/{name}");
        for opt in &options {
            opt.write_summary(&mut content);
        }

        Ok(Self {
            base,
            command_name: name,
            command_id: id,
            options,
            content,
            commands,
        })
    }

    /// The invoked command's name
    #[inline]
    #[must_use]
    pub fn command_name(&self) -> &str { &self.command_name }

    /// The invoked command's ID
    #[inline]
    #[must_use]
    pub fn command_id(&self) -> CommandId { self.command_id }

    /// The registered command, or an unknown-command placeholder if it is not
    /// cached
    #[must_use]
    pub fn command(&self) -> CommandRef { self.commands.get(self.command_id) }

    /// The supplied options, in payload order
    #[inline]
    #[must_use]
    pub fn options(&self) -> &[ResponseOption] { &self.options }

    /// Look up a top-level option by name
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&ResponseOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// A human-readable summary of the invocation, e.g.
    /// ``/tag add `name: foo` ``
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str { &self.content }
}
