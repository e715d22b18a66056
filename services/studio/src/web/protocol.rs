//! services/studio/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the admin panel and the
//! studio service. The socket carries sync notices so the panel can re-render
//! after remote changes and show the result of background pushes.

use crate::sync::{EntityGroup, SyncNotice};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Pushes a group now, like the "Save" buttons.
    Save { group: EntityGroup },

    Ping,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the upgrade. `origin` tags this workspace's writes.
    Connected { origin: Uuid },

    /// A push finished, failed, or remote state was merged.
    Sync { notice: SyncNotice },

    /// Reply to a `save` request.
    Saved { group: EntityGroup, rows: usize },

    Pong,

    /// Reports an error to the client, which should display the message.
    Error { message: String },
}
