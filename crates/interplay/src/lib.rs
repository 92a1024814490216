//! Slash command and button interaction dispatch for gateway-connected bots
//!
//! The host process owns the gateway socket and hands raw `INTERACTION_CREATE`
//! payloads to an [`InteractionState`], which classifies them, builds typed
//! [`InteractionCommand`] and [`InteractionButton`] objects, and re-emits
//! them to the host's [`EventSink`](host::EventSink).  Handlers then respond
//! through the objects they receive, which track whether the interaction has
//! been acknowledged and pick the correct endpoint for each call.

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod host;
pub mod http;
pub mod interaction;
pub mod model;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_util;

pub use command::{CommandRef, SlashCommand, SlashOption, SlashOptionChoice, SlashOptionType};
pub use config::{Config, UnknownInteractionPolicy};
pub use interaction::{
    InteractionButton, InteractionCommand, InteractionMessage, InteractionResponse, MessageBody,
};
pub use state::InteractionState;
