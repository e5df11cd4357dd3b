//! Slack Integration - approval workflow bot interface
//!
//! This crate provides everything that talks to Slack:
//! - **Web API** (`api`) - `users.list`, `views.open`, `chat.postMessage`, `chat.update`
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/approval-test` opens the request form
//! - **Interactions** (`interactions`) - form submissions and Approve/Reject clicks
//! - **Events** (`events`) - envelope parsing and the route table
//! - **Block Kit** (`blocks`) - modal and message builders
//! - **Signatures** (`signature`) - `X-Slack-Signature` verification for HTTP delivery
//!
//! # Architecture
//!
//! ```text
//! Socket Mode / HTTP → SlackEvent → EventDispatcher → handler → SlackApi
//!                                     (RouteKey)
//! ```
//!
//! # Key Types
//!
//! - `SocketModeRunner` - WebSocket event loop with reconnection logic
//! - `EventDispatcher` - Routes commands, form submissions and button clicks
//! - `SlackApi` - Trait over the Web API methods the workflow calls
//! - `DecisionPayload` (from `signoff-core`) - state carried on the decision buttons

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod interactions;
pub mod signature;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{SlackApi, SlackApiError, WebApiClient};
pub use events::{approval_dispatcher, EventContext, EventDispatcher, SlackEnvelope, SlackEvent};
