//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for live class-day subscriptions.

use crate::web::rest::{QuestionBoardResponse, UnderstandingResponse, WindowResponse};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Watches one class day. Replaces any earlier subscription on the connection.
    Subscribe {
        course: String,
        date_key: String,
        #[serde(default)]
        hide_names: bool,
    },

    /// Stops watching without starting a new subscription.
    Unsubscribe,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Everything a class-day screen shows, projected for the subscriber.
#[derive(Serialize, Debug, Clone)]
pub struct DaySnapshot {
    pub course: String,
    pub date_key: String,
    pub can_submit: bool,
    pub understanding: UnderstandingResponse,
    pub questions: QuestionBoardResponse,
    pub window: WindowResponse,
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full state of the subscribed day. Sent on subscribe and after every change.
    Snapshot { snapshot: Box<DaySnapshot> },

    /// Confirms that the previous subscription has ended.
    Unsubscribed,

    /// Reports a rejected message or an unreadable store; the connection stays open.
    Error { message: String },
}
