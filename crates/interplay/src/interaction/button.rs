use std::{fmt, ops::Deref};

use serde::Deserialize;
use serde_json::Value;
use serenity::model::id::ChannelId;

use super::{
    InteractionMessage, InteractionResponse, MessageBody, PayloadError, RawInteraction,
    ResponseError,
};
use crate::{
    http::{CallbackType, InteractionsHttp},
    model::Message,
};

#[derive(Debug, Deserialize)]
struct ButtonData {
    custom_id: String,
    component_type: u8,
}

/// Read the message a component was attached to
///
/// References without a channel inherit the interaction's channel.  A
/// message that cannot be read is logged and dropped, since the interaction
/// itself is still usable.
fn parse_message(mut message: Value, channel_id: Option<ChannelId>) -> Option<Message> {
    if let (Some(reference), Some(channel)) = (
        message
            .get_mut("message_reference")
            .and_then(Value::as_object_mut),
        channel_id,
    ) {
        reference
            .entry("channel_id")
            .or_insert_with(|| channel.to_string().into());
    }

    serde_json::from_value(message)
        .map_err(|err| tracing::error!(?err, "Error reading message for button interaction"))
        .ok()
}

/// A button press on a message component
pub struct InteractionButton {
    base: InteractionResponse,
    custom_id: String,
    component_type: u8,
    message: Option<Message>,
}

impl fmt::Debug for InteractionButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionButton")
            .field("base", &self.base)
            .field("custom_id", &self.custom_id)
            .field("message", &self.message.as_ref().map(|m| m.id))
            .finish_non_exhaustive()
    }
}

impl Deref for InteractionButton {
    type Target = InteractionResponse;

    fn deref(&self) -> &Self::Target { &self.base }
}

impl InteractionButton {
    pub(crate) fn from_raw(
        http: InteractionsHttp,
        mut raw: RawInteraction,
    ) -> Result<Self, PayloadError> {
        let message = raw.message.take();
        let channel_id = raw.channel_id;
        let base = InteractionResponse::from_raw(http, raw)?;
        let ButtonData {
            custom_id,
            component_type,
        } = ButtonData::deserialize(base.data())?;

        Ok(Self {
            base,
            custom_id,
            component_type,
            message: message.and_then(|m| parse_message(m, channel_id)),
        })
    }

    /// The developer-defined ID of the pressed button
    #[inline]
    #[must_use]
    pub fn custom_id(&self) -> &str { &self.custom_id }

    /// The raw component type code
    #[inline]
    #[must_use]
    pub fn component_type(&self) -> u8 { self.component_type }

    /// The message the button is attached to, if it could be read
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&Message> { self.message.as_ref() }

    /// Acknowledge the press without changing the attached message yet
    ///
    /// If the interaction was already acknowledged this issues an empty edit
    /// of the attached message instead.
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    pub async fn defer_update(&self, ephemeral: bool) -> Result<(), ResponseError> {
        self.acknowledge(
            CallbackType::DeferredUpdateMessage,
            MessageBody::default().ephemeral(ephemeral),
            false,
        )
        .await
        .map(|_| ())
    }

    /// Edit the message the button is attached to
    ///
    /// The first response does this through the acknowledgment itself; any
    /// later call edits the original message.
    ///
    /// # Errors
    /// This method returns an error if the API call fails.
    pub async fn update(
        &self,
        body: impl Into<MessageBody>,
    ) -> Result<InteractionMessage, ResponseError> {
        self.acknowledge(CallbackType::UpdateMessage, body.into(), true)
            .await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;
    use serenity::model::id::MessageId;

    use super::*;
    use crate::test_util::FakeTransport;

    fn payload() -> Value {
        json!({
            "id": "1",
            "type": 3,
            "token": "t",
            "version": 1,
            "guild_id": "1",
            "channel_id": "2",
            "member": { "user": { "id": "9", "username": "alice" } },
            "data": { "custom_id": "confirm", "component_type": 2 },
            "message": {
                "id": "50",
                "channel_id": "2",
                "content": "Are you sure?",
                "message_reference": { "message_id": "49" },
            },
        })
    }

    fn build(fake: &Arc<FakeTransport>, payload: Value) -> InteractionButton {
        InteractionButton::from_raw(
            super::super::test::http(fake),
            RawInteraction::parse(payload).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_fields_and_reference_fixup() {
        let fake = Arc::new(FakeTransport::default());
        let button = build(&fake, payload());

        assert_eq!(button.custom_id(), "confirm");
        assert_eq!(button.component_type(), 2);

        let msg = button.message().unwrap();
        assert_eq!(msg.id, MessageId::new(50));
        let reference = msg.message_reference.unwrap();
        assert_eq!(reference.message_id, Some(MessageId::new(49)));
        assert_eq!(reference.channel_id, Some(ChannelId::new(2)));
    }

    #[test]
    fn test_bad_message_is_dropped() {
        let mut payload = payload();
        payload["message"] = json!({ "content": "no id" });

        let fake = Arc::new(FakeTransport::default());
        let button = build(&fake, payload);
        assert!(button.message().is_none());
        assert_eq!(button.custom_id(), "confirm");
    }

    #[tokio::test]
    async fn test_defer_update_then_update() {
        let fake = Arc::new(FakeTransport::default());
        let button = build(&fake, payload());

        button.defer_update(false).await.unwrap();
        button
            .update(MessageBody::plain("Done").components(vec![]))
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, Some(json!({ "type": 6 })));
        assert_eq!(calls[1].0.path(), "/webhooks/100/{token}/messages/@original");
        assert_eq!(
            calls[1].1,
            Some(json!({ "content": "Done", "components": [] }))
        );
    }

    #[tokio::test]
    async fn test_update_initial() {
        let fake = Arc::new(FakeTransport::default());
        let button = build(&fake, payload());

        button.update("Updated").await.unwrap();
        assert!(button.is_sent() && button.is_completed());
        assert_eq!(
            fake.calls()[0].1,
            Some(json!({ "type": 7, "data": { "content": "Updated" } }))
        );
    }
}
