//! Request construction for the command registration and interaction
//! response endpoints
//!
//! [`InteractionsHttp`] never retries or rate-limits; each method builds a
//! single [`Route`] and body and hands them to the host-supplied
//! [`Transport`].

mod transport;

use std::{fmt, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use serenity::{
    builder::CreateAllowedMentions,
    model::id::{ApplicationId, CommandId, GuildId, InteractionId, MessageId},
};
pub use transport::*;

use crate::{
    command::{CommandEdit, CommandRequest},
    interaction::MessageBody,
};

/// An error arising from an API call
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The API responded with a non-success status
    #[error("{route} returned HTTP {status}: {body}")]
    Status {
        /// The route that was requested
        route: String,
        /// The HTTP status code
        status: u16,
        /// The raw response body
        body: String,
    },
    /// The request could not be sent or the response could not be read
    #[error("Error sending request to {route}")]
    Send {
        /// The route that was requested
        route: String,
        /// The underlying client error
        #[source]
        source: reqwest::Error,
    },
    /// The request body could not be serialized
    #[error("Error encoding request body")]
    Encode(#[source] serde_json::Error),
    /// The response body was not valid JSON
    #[error("Error decoding response from {route}")]
    Decode {
        /// The route that was requested
        route: String,
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

/// An HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

const TOKEN: &str = "{token}";

/// A method and path relative to the versioned API base
///
/// Paths containing an interaction token store it separately, so that
/// formatting a route for logs never leaks the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    path: String,
    token: Option<String>,
}

impl Route {
    /// Construct a route with no secret components
    #[inline]
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            token: None,
        }
    }

    /// Construct a route whose path contains the placeholder `{token}`, which
    /// is substituted by [`resolved_path`](Self::resolved_path)
    #[inline]
    #[must_use]
    pub fn with_token(method: Method, path: impl Into<String>, token: &str) -> Self {
        Self {
            method,
            path: path.into(),
            token: Some(token.into()),
        }
    }

    /// The request method
    #[inline]
    #[must_use]
    pub fn method(&self) -> Method { self.method }

    /// The path template, with any token left as a placeholder
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str { &self.path }

    /// The interaction token embedded in this route, if any
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    /// The full path to request, including the token
    #[must_use]
    pub fn resolved_path(&self) -> String {
        match self.token {
            Some(ref t) => self.path.replace(TOKEN, t),
            None => self.path.clone(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// The interaction callback type sent with an initial acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallbackType {
    /// Acknowledge a ping
    Pong = 1,
    /// Respond with a new message
    ChannelMessageWithSource = 4,
    /// Acknowledge now, send a message later
    DeferredChannelMessageWithSource = 5,
    /// Acknowledge a component interaction without changing its message yet
    DeferredUpdateMessage = 6,
    /// Edit the message a component is attached to
    UpdateMessage = 7,
}

/// Which interaction message an edit or delete call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    /// The message created (or updated) by the initial response
    Original,
    /// A follow-up message
    Followup(MessageId),
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("@original"),
            Self::Followup(i) => write!(f, "{i}"),
        }
    }
}

fn encode(body: &impl Serialize) -> Result<Value, HttpError> {
    serde_json::to_value(body).map_err(HttpError::Encode)
}

/// Stateless request builder for the registration and response endpoints
#[derive(Debug, Clone)]
pub struct InteractionsHttp {
    transport: Arc<dyn Transport>,
    application_id: ApplicationId,
    allowed_mentions: Option<CreateAllowedMentions>,
}

impl InteractionsHttp {
    /// Construct a new client acting as the given application
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, application_id: ApplicationId) -> Self {
        Self {
            transport,
            application_id,
            allowed_mentions: None,
        }
    }

    /// Set the allowed-mentions policy applied to messages that do not
    /// specify their own
    #[must_use]
    pub fn default_allowed_mentions(mut self, mentions: Option<CreateAllowedMentions>) -> Self {
        self.allowed_mentions = mentions;
        self
    }

    /// The application this client acts as
    #[inline]
    #[must_use]
    pub fn application_id(&self) -> ApplicationId { self.application_id }

    /// Look up the ID of the application owning the transport's credentials
    ///
    /// # Errors
    /// This function returns an error if the API call fails or returns no ID.
    #[tracing::instrument(level = "debug", skip(transport))]
    pub async fn current_application(transport: &dyn Transport) -> Result<ApplicationId, HttpError> {
        #[derive(serde::Deserialize)]
        struct App {
            id: ApplicationId,
        }

        let route = Route::new(Method::Get, "/oauth2/applications/@me");
        let data = transport.request(&route, None).await?;
        let App { id } = serde_json::from_value(data).map_err(|source| HttpError::Decode {
            route: route.to_string(),
            source,
        })?;

        Ok(id)
    }

    #[inline]
    async fn request(&self, route: Route, body: Option<Value>) -> Result<Value, HttpError> {
        self.transport.request(&route, body.as_ref()).await
    }

    fn commands_path(&self, guild: Option<GuildId>) -> String {
        match guild {
            Some(g) => format!("/applications/{}/guilds/{g}/commands", self.application_id),
            None => format!("/applications/{}/commands", self.application_id),
        }
    }

    // Global commands

    /// Register a new global command
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn add_slash_command(&self, command: CommandRequest<'_>) -> Result<Value, HttpError> {
        let route = Route::new(Method::Post, self.commands_path(None));
        self.request(route, Some(encode(&command)?)).await
    }

    /// Partially update a global command
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn edit_slash_command(
        &self,
        command_id: CommandId,
        command: &CommandEdit,
    ) -> Result<Value, HttpError> {
        let route = Route::new(
            Method::Patch,
            format!("{}/{command_id}", self.commands_path(None)),
        );
        self.request(route, Some(encode(command)?)).await
    }

    /// Delete a global command
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove_slash_command(&self, command_id: CommandId) -> Result<(), HttpError> {
        let route = Route::new(
            Method::Delete,
            format!("{}/{command_id}", self.commands_path(None)),
        );
        self.request(route, None).await.map(|_| ())
    }

    /// List all global commands
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_slash_commands(&self) -> Result<Value, HttpError> {
        let route = Route::new(Method::Get, self.commands_path(None));
        self.request(route, None).await
    }

    /// Replace every global command with the given list
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self, commands), fields(count = commands.len()))]
    pub async fn put_slash_commands(
        &self,
        commands: &[CommandRequest<'_>],
    ) -> Result<Value, HttpError> {
        let route = Route::new(Method::Put, self.commands_path(None));
        self.request(route, Some(encode(&commands)?)).await
    }

    // Guild commands

    /// Register a new command scoped to a guild
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn add_guild_slash_command(
        &self,
        guild_id: GuildId,
        command: CommandRequest<'_>,
    ) -> Result<Value, HttpError> {
        let route = Route::new(Method::Post, self.commands_path(Some(guild_id)));
        self.request(route, Some(encode(&command)?)).await
    }

    /// Partially update a guild command
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn edit_guild_slash_command(
        &self,
        guild_id: GuildId,
        command_id: CommandId,
        command: &CommandEdit,
    ) -> Result<Value, HttpError> {
        let route = Route::new(
            Method::Patch,
            format!("{}/{command_id}", self.commands_path(Some(guild_id))),
        );
        self.request(route, Some(encode(command)?)).await
    }

    /// Delete a guild command
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn remove_guild_slash_command(
        &self,
        guild_id: GuildId,
        command_id: CommandId,
    ) -> Result<(), HttpError> {
        let route = Route::new(
            Method::Delete,
            format!("{}/{command_id}", self.commands_path(Some(guild_id))),
        );
        self.request(route, None).await.map(|_| ())
    }

    /// List all commands scoped to a guild
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_guild_slash_commands(&self, guild_id: GuildId) -> Result<Value, HttpError> {
        let route = Route::new(Method::Get, self.commands_path(Some(guild_id)));
        self.request(route, None).await
    }

    /// Replace every command scoped to a guild with the given list
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self, commands), fields(count = commands.len()))]
    pub async fn put_guild_slash_commands(
        &self,
        guild_id: GuildId,
        commands: &[CommandRequest<'_>],
    ) -> Result<Value, HttpError> {
        let route = Route::new(Method::Put, self.commands_path(Some(guild_id)));
        self.request(route, Some(encode(&commands)?)).await
    }

    // Interaction responses

    /// Serialize a message body, filling in the default allowed mentions
    ///
    /// Returns `None` if the body carries no data at all.
    fn message_data(&self, body: &MessageBody) -> Result<Option<Value>, HttpError> {
        let mut data = encode(body)?;
        let Some(obj) = data.as_object_mut() else {
            return Ok(None);
        };

        if obj.is_empty() {
            return Ok(None);
        }

        if !obj.contains_key("allowed_mentions") {
            if let Some(ref mentions) = self.allowed_mentions {
                obj.insert("allowed_mentions".into(), encode(mentions)?);
            }
        }

        Ok(Some(data))
    }

    /// Send a response message for an interaction
    ///
    /// If `initial_response` is set this creates the interaction's one initial
    /// acknowledgment, wrapping the body in a `{type, data}` envelope.
    /// Otherwise the bare body is posted as a follow-up message.  The caller
    /// alone decides which applies; this method does not track it.
    ///
    /// # Errors
    /// This method returns an error if the body cannot be encoded or the API
    /// call fails.
    #[tracing::instrument(level = "debug", skip(self, token, body))]
    pub async fn send_message(
        &self,
        interaction_id: InteractionId,
        token: &str,
        kind: CallbackType,
        initial_response: bool,
        body: &MessageBody,
    ) -> Result<Value, HttpError> {
        let data = self.message_data(body)?;

        let (route, payload) = if initial_response {
            let mut payload = serde_json::Map::new();
            payload.insert("type".into(), (kind as u8).into());
            if let Some(data) = data {
                payload.insert("data".into(), data);
            }

            (
                Route::with_token(
                    Method::Post,
                    format!("/interactions/{interaction_id}/{TOKEN}/callback"),
                    token,
                ),
                Value::Object(payload),
            )
        } else {
            (
                Route::with_token(
                    Method::Post,
                    format!("/webhooks/{}/{TOKEN}", self.application_id),
                    token,
                ),
                data.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            )
        };

        tracing::debug!(initial_response, ?payload, "Sending response");
        self.request(route, Some(payload)).await
    }

    /// Edit the original response or a follow-up message
    ///
    /// # Errors
    /// This method returns an error if the body cannot be encoded or the API
    /// call fails.
    #[tracing::instrument(level = "debug", skip(self, token, body))]
    pub async fn edit_message(
        &self,
        token: &str,
        target: MessageTarget,
        body: &MessageBody,
    ) -> Result<Value, HttpError> {
        let route = Route::with_token(
            Method::Patch,
            format!("/webhooks/{}/{TOKEN}/messages/{target}", self.application_id),
            token,
        );

        let payload = self
            .message_data(&body.for_edit())?
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        tracing::debug!(?payload, "Editing response");
        self.request(route, Some(payload)).await
    }

    /// Delete the original response or a follow-up message
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    #[tracing::instrument(level = "debug", skip(self, token))]
    pub async fn delete_message(&self, token: &str, target: MessageTarget) -> Result<(), HttpError> {
        let route = Route::with_token(
            Method::Delete,
            format!("/webhooks/{}/{TOKEN}/messages/{target}", self.application_id),
            token,
        );
        self.request(route, None).await.map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::{
        command::{SlashCommand, SlashOption, SlashOptionType},
        test_util::FakeTransport,
    };

    fn client() -> (Arc<FakeTransport>, InteractionsHttp) {
        let fake = Arc::new(FakeTransport::default());
        let http = InteractionsHttp::new(
            Arc::clone(&fake) as Arc<dyn Transport>,
            ApplicationId::new(100),
        );
        (fake, http)
    }

    #[test]
    fn test_route_redaction() {
        let route = Route::with_token(Method::Post, "/webhooks/1/{token}", "s3cret");
        assert_eq!(route.to_string(), "POST /webhooks/1/{token}");
        assert_eq!(format!("{route:?}"), "POST /webhooks/1/{token}");
        assert_eq!(route.resolved_path(), "/webhooks/1/s3cret");
    }

    #[tokio::test]
    async fn test_command_routes() {
        let (fake, http) = client();
        let cmd = SlashCommand::new("ping", "Ping!").option(SlashOption::new(
            SlashOptionType::String,
            "msg",
            "Message",
        ));

        http.add_slash_command(cmd.to_request()).await.unwrap();
        http.add_guild_slash_command(GuildId::new(5), cmd.to_request())
            .await
            .unwrap();
        http.edit_slash_command(CommandId::new(7), &CommandEdit {
            name: Some("pong".into()),
            ..CommandEdit::default()
        })
        .await
        .unwrap();
        http.remove_guild_slash_command(GuildId::new(5), CommandId::new(7))
            .await
            .unwrap();
        http.put_slash_commands(&[cmd.to_request()]).await.unwrap();
        http.get_guild_slash_commands(GuildId::new(5)).await.unwrap();

        let calls = fake.calls();
        let routes: Vec<_> = calls.iter().map(|(r, _)| r.to_string()).collect();
        assert_eq!(routes, [
            "POST /applications/100/commands",
            "POST /applications/100/guilds/5/commands",
            "PATCH /applications/100/commands/7",
            "DELETE /applications/100/guilds/5/commands/7",
            "PUT /applications/100/commands",
            "GET /applications/100/guilds/5/commands",
        ]);

        assert_eq!(calls[0].1.as_ref().unwrap()["name"], "ping");
        assert_eq!(calls[2].1, Some(json!({ "name": "pong" })));
        assert_eq!(calls[3].1, None);
        assert_eq!(calls[4].1.as_ref().unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initial_vs_followup() {
        let (fake, http) = client();
        let body = MessageBody::plain("hello");

        http.send_message(
            InteractionId::new(1),
            "tok",
            CallbackType::ChannelMessageWithSource,
            true,
            &body,
        )
        .await
        .unwrap();
        http.send_message(
            InteractionId::new(1),
            "tok",
            CallbackType::ChannelMessageWithSource,
            false,
            &body,
        )
        .await
        .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].0.to_string(), "POST /interactions/1/{token}/callback");
        assert_eq!(calls[0].0.resolved_path(), "/interactions/1/tok/callback");
        assert_eq!(
            calls[0].1,
            Some(json!({ "type": 4, "data": { "content": "hello" } }))
        );

        assert_eq!(calls[1].0.resolved_path(), "/webhooks/100/tok");
        assert_eq!(calls[1].1, Some(json!({ "content": "hello" })));
    }

    #[tokio::test]
    async fn test_empty_defer_envelope() {
        let (fake, http) = client();
        let http = http.default_allowed_mentions(Some(CreateAllowedMentions::new()));

        http.send_message(
            InteractionId::new(1),
            "tok",
            CallbackType::DeferredChannelMessageWithSource,
            true,
            &MessageBody::default(),
        )
        .await
        .unwrap();
        http.send_message(
            InteractionId::new(1),
            "tok",
            CallbackType::DeferredChannelMessageWithSource,
            true,
            &MessageBody::default().ephemeral(true),
        )
        .await
        .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].1, Some(json!({ "type": 5 })));

        let data = &calls[1].1.as_ref().unwrap()["data"];
        assert_eq!(data["flags"], 64);
        assert!(data.get("allowed_mentions").is_some());
    }

    #[tokio::test]
    async fn test_edit_and_delete_targets() {
        let (fake, http) = client();
        let body = MessageBody::plain("edited").tts(true).ephemeral(true);

        http.edit_message("tok", MessageTarget::Original, &body)
            .await
            .unwrap();
        http.edit_message("tok", MessageTarget::Followup(MessageId::new(9)), &body)
            .await
            .unwrap();
        http.delete_message("tok", MessageTarget::Original)
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].0.resolved_path(), "/webhooks/100/tok/messages/@original");
        assert_eq!(calls[0].1, Some(json!({ "content": "edited" })));
        assert_eq!(calls[1].0.resolved_path(), "/webhooks/100/tok/messages/9");
        assert_eq!(calls[2].0.to_string(), "DELETE /webhooks/100/{token}/messages/@original");
    }

    #[tokio::test]
    async fn test_current_application() {
        let fake = FakeTransport::default();
        fake.push_ok(json!({ "id": "123", "name": "bot" }));

        let id = InteractionsHttp::current_application(&fake).await.unwrap();
        assert_eq!(id, ApplicationId::new(123));
        assert_eq!(fake.calls()[0].0.path(), "/oauth2/applications/@me");
    }

    #[tokio::test]
    async fn test_status_error_propagates() {
        let (fake, http) = client();
        fake.push_status(400, "Interaction has already been acknowledged");

        let err = http
            .send_message(
                InteractionId::new(1),
                "tok",
                CallbackType::ChannelMessageWithSource,
                true,
                &MessageBody::plain("x"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Status { status: 400, .. }));
    }
}
