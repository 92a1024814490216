use std::time::Duration;

use serde::Serialize;
use serenity::{
    builder::{CreateActionRow, CreateAllowedMentions, CreateEmbed},
    model::id::MessageId,
};

use super::{ResponseError, Token};
use crate::{
    http::{InteractionsHttp, MessageTarget},
    model::Message,
};

const EPHEMERAL: u64 = 1 << 6;

/// The content of a response, follow-up or edit
///
/// Every field is optional; a default body serializes to an empty object,
/// which is how deferred acknowledgments carry no data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    tts: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<CreateEmbed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_mentions: Option<CreateAllowedMentions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<Vec<CreateActionRow>>,
    #[serde(skip)]
    delete_after: Option<Duration>,
}

impl MessageBody {
    /// Construct a body containing only text
    #[inline]
    #[must_use]
    pub fn plain(content: impl Into<String>) -> Self { Self::default().content(content) }

    /// Set the text content
    #[inline]
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Request text-to-speech playback
    #[inline]
    #[must_use]
    pub fn tts(mut self, tts: bool) -> Self {
        self.tts = tts;
        self
    }

    /// Append an embed
    #[inline]
    #[must_use]
    pub fn embed(mut self, embed: CreateEmbed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Append several embeds
    #[inline]
    #[must_use]
    pub fn embeds(mut self, embeds: impl IntoIterator<Item = CreateEmbed>) -> Self {
        self.embeds.extend(embeds);
        self
    }

    /// Set the mention policy for this message, overriding the client default
    #[inline]
    #[must_use]
    pub fn allowed_mentions(mut self, mentions: CreateAllowedMentions) -> Self {
        self.allowed_mentions = Some(mentions);
        self
    }

    /// Make the message visible only to the invoking user
    #[inline]
    #[must_use]
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.flags = ephemeral.then_some(EPHEMERAL);
        self
    }

    /// Replace the message's component rows
    ///
    /// An empty list clears any existing components on edit.
    #[inline]
    #[must_use]
    pub fn components(mut self, rows: Vec<CreateActionRow>) -> Self {
        self.components = Some(rows);
        self
    }

    /// Delete the resulting message after the given delay
    #[inline]
    #[must_use]
    pub fn delete_after(mut self, delay: Duration) -> Self {
        self.delete_after = Some(delay);
        self
    }

    /// Whether this body requests an ephemeral message
    #[inline]
    #[must_use]
    pub fn is_ephemeral(&self) -> bool { self.flags.is_some_and(|f| f & EPHEMERAL != 0) }

    /// The requested auto-delete delay, if any
    #[inline]
    #[must_use]
    pub fn get_delete_after(&self) -> Option<Duration> { self.delete_after }

    /// Strip the fields the edit endpoints do not accept
    #[must_use]
    pub fn for_edit(&self) -> Self {
        Self {
            tts: false,
            flags: None,
            delete_after: None,
            ..self.clone()
        }
    }
}

impl From<&str> for MessageBody {
    fn from(value: &str) -> Self { Self::plain(value) }
}

impl From<String> for MessageBody {
    fn from(value: String) -> Self { Self::plain(value) }
}

/// Read a message object out of a response, if the endpoint returned one
pub(super) fn parse_message(data: serde_json::Value) -> Result<Option<Message>, ResponseError> {
    if data.is_null() {
        return Ok(None);
    }

    serde_json::from_value(data)
        .map(Some)
        .map_err(ResponseError::Malformed)
}

/// A handle to a message created by responding to an interaction
#[derive(Debug, Clone)]
pub struct InteractionMessage {
    http: InteractionsHttp,
    token: Token,
    target: MessageTarget,
    message: Option<Message>,
}

impl InteractionMessage {
    pub(super) fn new(
        http: InteractionsHttp,
        token: Token,
        target: MessageTarget,
        message: Option<Message>,
    ) -> Self {
        Self {
            http,
            token,
            target,
            message,
        }
    }

    /// Which interaction message this handle refers to
    #[inline]
    #[must_use]
    pub fn target(&self) -> MessageTarget { self.target }

    /// The message as returned by the API, if it returned one
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&Message> { self.message.as_ref() }

    /// The message's ID, if known
    #[must_use]
    pub fn id(&self) -> Option<MessageId> {
        match self.target {
            MessageTarget::Followup(id) => Some(id),
            MessageTarget::Original => self.message.as_ref().map(|m| m.id),
        }
    }

    /// Edit this message
    ///
    /// # Errors
    /// This method returns an error if the API call fails or returns
    /// malformed data.
    pub async fn edit(&mut self, body: impl Into<MessageBody>) -> Result<(), ResponseError> {
        let data = self
            .http
            .edit_message(self.token.as_str(), self.target, &body.into())
            .await?;

        if let Some(msg) = parse_message(data)? {
            self.message = Some(msg);
        }

        Ok(())
    }

    /// Delete this message now
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    pub async fn delete(&self) -> Result<(), ResponseError> {
        self.http
            .delete_message(self.token.as_str(), self.target)
            .await
            .map_err(Into::into)
    }

    /// Delete this message after a delay, on a detached task
    ///
    /// Failures (e.g. the message was already deleted) are logged and
    /// otherwise ignored.
    pub fn delete_later(&self, delay: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if let Err(err) = this.delete().await {
                tracing::debug!(?err, target = %this.target, "Delayed delete failed");
            }
        })
    }
}
