use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::monitor::ColourClass;

/// Marker message that tells subscribers to drop a target's representation.
pub const REMOVED_MESSAGE: &str = "DELETED";

/// One state-change push to dashboard subscribers. Field names are part of the
/// wire contract consumed by the web client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetEvent {
    pub display_name: String,
    pub address: IpAddr,
    pub colour: ColourClass,
    pub last_contact: String,
    pub is_paused: bool,
    pub alerting: bool,
    pub message: String,
}

impl TargetEvent {
    pub fn is_removal(&self) -> bool {
        self.message == REMOVED_MESSAGE
    }
}

/// First message a websocket client sends after connecting.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "Token")]
    pub token: String,
}

/// Reply shape shared by the management routes and the websocket handshake.
#[derive(Debug, Clone, Serialize)]
pub struct ApiReply {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ApiReply {
    pub fn ok() -> Self {
        Self {
            error: false,
            result: None,
        }
    }

    pub fn ok_with(result: impl Into<String>) -> Self {
        Self {
            error: false,
            result: Some(result.into()),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            error: true,
            result: Some(reason.into()),
        }
    }
}
