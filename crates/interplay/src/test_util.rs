use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::{json, Value};

use crate::{
    host::{EventSink, InteractionEvent},
    http::{HttpError, Route, Transport},
};

#[derive(Debug)]
enum Canned {
    Ok(Value),
    Status(u16, String),
}

/// A [`Transport`] that records every request and answers from a queue,
/// falling back to `null` once the queue is empty
#[derive(Debug, Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<(Route, Option<Value>)>>,
    responses: Mutex<VecDeque<Canned>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<(Route, Option<Value>)> { self.calls.lock().unwrap().clone() }

    pub fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Canned::Ok(value));
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Canned::Status(status, body.into()));
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn request(&self, route: &Route, body: Option<&Value>) -> Result<Value, HttpError> {
        self.calls
            .lock()
            .unwrap()
            .push((route.clone(), body.cloned()));

        match self.responses.lock().unwrap().pop_front() {
            Some(Canned::Ok(v)) => Ok(v),
            Some(Canned::Status(status, body)) => Err(HttpError::Status {
                route: route.to_string(),
                status,
                body,
            }),
            None => Ok(Value::Null),
        }
    }
}

/// An [`EventSink`] collecting events into a vector
#[derive(Debug, Default, Clone)]
pub struct CollectSink(pub Arc<Mutex<Vec<InteractionEvent>>>);

impl CollectSink {
    pub fn take(&self) -> Vec<InteractionEvent> { std::mem::take(&mut *self.0.lock().unwrap()) }
}

impl EventSink for CollectSink {
    fn dispatch(&self, event: InteractionEvent) { self.0.lock().unwrap().push(event); }
}

/// A minimal guild slash command interaction payload
pub fn slash_payload(command_id: u64, name: &str, options: Value) -> Value {
    json!({
        "id": "1000",
        "application_id": "100",
        "type": 2,
        "token": "tok",
        "version": 1,
        "guild_id": "1",
        "channel_id": "2",
        "member": {
            "user": { "id": "9", "username": "alice" },
            "roles": [],
            "nick": null,
        },
        "data": {
            "id": command_id.to_string(),
            "name": name,
            "type": 1,
            "options": options,
        },
    })
}
