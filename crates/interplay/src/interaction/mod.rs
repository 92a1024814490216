//! Per-interaction response objects
//!
//! # Notes
//!
//! Every interaction must be acknowledged exactly once through the callback
//! endpoint.  After that, the referent of the edit and delete endpoints is the
//! message created (or, for component interactions, updated) by that
//! acknowledgment, and follow-up messages go through the webhook endpoint.
//!
//! [`InteractionResponse`] tracks this with three flags:
//! - `sent` is set once the callback endpoint has accepted an acknowledgment.
//!   Any call that would create a second acknowledgment edits the original
//!   message instead.
//! - `deferred` is set when an acknowledgment carried no content.
//! - `completed` is set once real content has been delivered.
//!
//! Acknowledging calls on one response are serialized, so two concurrent
//! sends cannot both observe `sent == false`.

mod button;
mod command;
mod message;

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

pub use button::InteractionButton;
pub use command::{InteractionCommand, OptionValue, ResponseOption};
pub use message::{InteractionMessage, MessageBody};
use serde::Deserialize;
use serde_json::Value;
use serenity::model::{
    id::{ApplicationId, ChannelId, GuildId, InteractionId, UserId},
    Timestamp,
};

use crate::{
    http::{CallbackType, HttpError, InteractionsHttp, MessageTarget},
    model::{Member, Person, User},
};

/// An error arising from responding to an interaction
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The API call failed
    #[error("HTTP error")]
    Http(#[from] HttpError),
    /// A follow-up was attempted before the interaction was acknowledged
    #[error("Interaction has not been acknowledged yet")]
    NotAcknowledged,
    /// The API returned a message that could not be read
    #[error("Malformed message data from API")]
    Malformed(#[source] serde_json::Error),
}

/// An error arising from reading an inbound interaction payload
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The payload did not match the expected shape
    #[error("Malformed interaction payload")]
    Json(#[from] serde_json::Error),
    /// Neither `member` nor `user` was present
    #[error("Interaction has no member or user")]
    MissingAuthor,
    /// The interaction type is not handled
    #[error("Unhandled interaction type {0}")]
    UnknownType(u8),
}

/// An error arising from resolving an option value against the payload's
/// resolved data
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The raw option value was not an ID
    #[error("Option value {0} is not an ID")]
    BadId(Value),
    /// The resolved bundle had no entry for the ID
    #[error("No resolved {kind} with ID {id}")]
    Missing {
        /// The kind of object sought
        kind: &'static str,
        /// The ID sought
        id: String,
    },
    /// The resolved entry could not be read
    #[error("Invalid resolved {kind} data")]
    Malformed {
        /// The kind of object read
        kind: &'static str,
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
    },
    /// The object can only be resolved inside a guild
    #[error("Cannot resolve a {0} outside of a guild")]
    NoGuild(&'static str),
}

/// An interaction token, redacted from debug output
#[derive(Clone)]
pub(crate) struct Token(Arc<str>);

impl Token {
    #[inline]
    pub(crate) fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Token(..)") }
}

/// The fields common to every inbound interaction payload
#[derive(Debug, Deserialize)]
pub(crate) struct RawInteraction {
    pub id: InteractionId,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    pub token: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Option<Value>,
}

impl RawInteraction {
    pub(crate) fn parse(data: Value) -> Result<Self, PayloadError> {
        serde_json::from_value(data).map_err(Into::into)
    }
}

/// The state shared by every kind of interaction
///
/// Handlers usually reach this through [`InteractionCommand`] or
/// [`InteractionButton`], both of which dereference to it.
pub struct InteractionResponse {
    http: InteractionsHttp,
    id: InteractionId,
    version: u64,
    token: Token,
    application_id: Option<ApplicationId>,
    guild_id: Option<GuildId>,
    channel_id: Option<ChannelId>,
    author: Person,
    data: Value,
    sent: AtomicBool,
    deferred: AtomicBool,
    completed: AtomicBool,
    ack: tokio::sync::Mutex<()>,
}

impl fmt::Debug for InteractionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionResponse")
            .field("id", &self.id)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("author", &self.author)
            .field("sent", &self.is_sent())
            .field("deferred", &self.is_deferred())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

impl InteractionResponse {
    pub(crate) fn from_raw(
        http: InteractionsHttp,
        raw: RawInteraction,
    ) -> Result<Self, PayloadError> {
        let RawInteraction {
            id,
            kind: _,
            application_id,
            token,
            version,
            guild_id,
            channel_id,
            member,
            user,
            data,
            message: _,
        } = raw;

        let author = match (member, user) {
            (Some(mut member), _) => {
                member.guild_id = member.guild_id.or(guild_id);
                Person::Member(member)
            },
            (None, Some(user)) => Person::User(user),
            (None, None) => return Err(PayloadError::MissingAuthor),
        };

        Ok(Self {
            http,
            id,
            version,
            token: Token(token.into()),
            application_id,
            guild_id,
            channel_id,
            author,
            data,
            sent: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            ack: tokio::sync::Mutex::new(()),
        })
    }

    /// The interaction's ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> InteractionId { self.id }

    /// The payload version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 { self.version }

    /// The application the interaction was sent to
    #[inline]
    #[must_use]
    pub fn application_id(&self) -> Option<ApplicationId> { self.application_id }

    /// The guild the interaction originated in, or `None` for a DM
    #[inline]
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> { self.guild_id }

    /// The channel the interaction originated in
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> Option<ChannelId> { self.channel_id }

    /// Whether the interaction originated outside of a guild
    #[inline]
    #[must_use]
    pub fn is_dm(&self) -> bool { self.guild_id.is_none() }

    /// The invoking user, with guild membership if invoked in a guild
    #[inline]
    #[must_use]
    pub fn author(&self) -> &Person { &self.author }

    /// The invoking user's ID
    #[inline]
    #[must_use]
    pub fn author_id(&self) -> UserId { self.author.id() }

    /// The raw type-specific `data` object of the payload
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Value { &self.data }

    /// When the interaction was created, derived from its ID
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Timestamp { self.id.created_at() }

    /// A link to the interaction's position in its channel
    #[must_use]
    pub fn jump_url(&self) -> Option<String> {
        let channel = self.channel_id?;
        Some(match self.guild_id {
            Some(g) => format!("https://discord.com/channels/{g}/{channel}/{}", self.id),
            None => format!("https://discord.com/channels/@me/{channel}/{}", self.id),
        })
    }

    /// Whether an initial acknowledgment has been sent
    #[inline]
    #[must_use]
    pub fn is_sent(&self) -> bool { self.sent.load(Ordering::SeqCst) }

    /// Whether a contentless acknowledgment has been sent
    #[inline]
    #[must_use]
    pub fn is_deferred(&self) -> bool { self.deferred.load(Ordering::SeqCst) }

    /// Whether real content has been delivered
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool { self.completed.load(Ordering::SeqCst) }

    /// Acknowledge the interaction, or edit the original message if it has
    /// already been acknowledged
    ///
    /// `kind` is only used for the initial acknowledgment.  If `completes` is
    /// unset the call is treated as a deferral.
    #[tracing::instrument(level = "debug", skip(self, body), fields(id = %self.id))]
    pub(crate) async fn acknowledge(
        &self,
        kind: CallbackType,
        body: MessageBody,
        completes: bool,
    ) -> Result<InteractionMessage, ResponseError> {
        let guard = self.ack.lock().await;
        let initial = !self.is_sent();

        let data = if initial {
            self.http
                .send_message(self.id, self.token.as_str(), kind, true, &body)
                .await?
        } else {
            tracing::debug!("Interaction already acknowledged, editing original message");
            self.http
                .edit_message(self.token.as_str(), MessageTarget::Original, &body)
                .await?
        };

        self.sent.store(true, Ordering::SeqCst);
        if completes {
            self.completed.store(true, Ordering::SeqCst);
        } else {
            self.deferred.store(true, Ordering::SeqCst);
        }
        drop(guard);

        let message = message::parse_message(data).unwrap_or_else(|err| {
            tracing::error!(?err, "Failed to read response message");
            None
        });
        let msg = InteractionMessage::new(
            self.http.clone(),
            self.token.clone(),
            MessageTarget::Original,
            message,
        );

        if let Some(delay) = body.get_delete_after() {
            msg.delete_later(delay);
        }

        Ok(msg)
    }

    /// Acknowledge the interaction without content, showing a loading state
    ///
    /// If the interaction was already acknowledged this issues an empty edit
    /// of the original message instead.
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    pub async fn defer(&self, ephemeral: bool) -> Result<(), ResponseError> {
        self.acknowledge(
            CallbackType::DeferredChannelMessageWithSource,
            MessageBody::default().ephemeral(ephemeral),
            false,
        )
        .await
        .map(|_| ())
    }

    /// Respond with a message
    ///
    /// The first response creates the interaction's initial message; any
    /// later call (including after [`defer`](Self::defer)) edits that message
    /// instead.
    ///
    /// # Errors
    /// This method returns an error if the API call fails, including when a
    /// concurrent caller has already acknowledged the interaction by some
    /// other route.
    pub async fn send(
        &self,
        body: impl Into<MessageBody>,
    ) -> Result<InteractionMessage, ResponseError> {
        self.acknowledge(CallbackType::ChannelMessageWithSource, body.into(), true)
            .await
    }

    /// Alias for [`send`](Self::send)
    ///
    /// # Errors
    /// See [`send`](Self::send).
    #[inline]
    pub async fn reply(
        &self,
        body: impl Into<MessageBody>,
    ) -> Result<InteractionMessage, ResponseError> {
        self.send(body).await
    }

    /// Post an additional message after the interaction has been acknowledged
    ///
    /// # Errors
    /// This method returns [`ResponseError::NotAcknowledged`] if no initial
    /// acknowledgment has been sent, or an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self, body), fields(id = %self.id))]
    pub async fn followup(
        &self,
        body: impl Into<MessageBody>,
    ) -> Result<InteractionMessage, ResponseError> {
        if !self.is_sent() {
            return Err(ResponseError::NotAcknowledged);
        }

        let body = body.into();
        let data = self
            .http
            .send_message(
                self.id,
                self.token.as_str(),
                CallbackType::ChannelMessageWithSource,
                false,
                &body,
            )
            .await?;

        let message = message::parse_message(data)?;
        let target = message
            .as_ref()
            .map_or(MessageTarget::Original, |m| MessageTarget::Followup(m.id));
        let msg = InteractionMessage::new(self.http.clone(), self.token.clone(), target, message);

        if let Some(delay) = body.get_delete_after() {
            if let MessageTarget::Followup(_) = target {
                msg.delete_later(delay);
            }
        }

        Ok(msg)
    }

    /// Delete the original response message
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    pub async fn delete_original(&self) -> Result<(), ResponseError> {
        self.http
            .delete_message(self.token.as_str(), MessageTarget::Original)
            .await
            .map_err(Into::into)
    }
}
