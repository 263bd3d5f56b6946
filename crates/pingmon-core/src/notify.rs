use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

const API_URL: &str = "https://webexapis.com/v1/";

/// Outbound chat integration. Implementations must swallow their own delivery
/// failures; the monitoring loop never depends on a send succeeding.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Returns true when the message was accepted by the service.
    async fn send_message(&self, text: &str, markdown: &str) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct RoomList {
    items: Vec<Room>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload<'a> {
    room_id: &'a str,
    text: &'a str,
    markdown: &'a str,
}

/// Bot posting into one Webex room.
pub struct WebexNotifier {
    client: reqwest::Client,
    token: String,
    room_id: String,
}

impl WebexNotifier {
    pub fn new(token: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            room_id: room_id.into(),
        }
    }

    /// Group rooms the bot is a member of, oldest first.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, reqwest::Error> {
        let rooms: RoomList = self
            .client
            .get(format!("{API_URL}rooms"))
            .query(&[("type", "group"), ("sortBy", "created")])
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rooms.items)
    }
}

#[async_trait]
impl ChatNotifier for WebexNotifier {
    async fn send_message(&self, text: &str, markdown: &str) -> bool {
        let payload = MessagePayload {
            room_id: &self.room_id,
            text,
            markdown,
        };

        let sent = self
            .client
            .post(format!("{API_URL}messages"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "chat message rejected");
                false
            }
            Err(err) => {
                warn!(error = %err, "unable to reach chat api");
                false
            }
        }
    }
}
