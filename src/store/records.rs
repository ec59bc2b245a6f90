//! Typed records for the known collections
//!
//! Each collection the host persists has a concrete record type; only the
//! pending-action payload stays schema-less, because queued writes carry
//! whatever body the host page was about to send.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::Method;

/// A record that can be persisted in a named collection, keyed by id
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this record type lives in
    fn collection() -> &'static str;

    /// Primary key within the collection
    fn key(&self) -> String;
}

/// A user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Record for UserRecord {
    fn collection() -> &'static str {
        "users"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A chat room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Record for RoomRecord {
    fn collection() -> &'static str {
        "rooms"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A message posted in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessageRecord {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub body: String,
    /// Creation timestamp, unix milliseconds
    pub created: i64,
}

impl Record for RoomMessageRecord {
    fn collection() -> &'static str {
        "messages"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A direct-message conversation between users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub participant_ids: Vec<i64>,
}

impl Record for ConversationRecord {
    fn collection() -> &'static str {
        "conversations"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A single direct message within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessageRecord {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub body: String,
    /// Creation timestamp, unix milliseconds
    pub created: i64,
}

impl Record for DirectMessageRecord {
    fn collection() -> &'static str {
        "direct_messages"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Follower/following counts for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowStatsRecord {
    pub id: i64,
    pub user_id: i64,
    pub followers: u64,
    pub following: u64,
}

impl Record for FollowStatsRecord {
    fn collection() -> &'static str {
        "follow_stats"
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A write attempted while disconnected, persisted until replayed.
///
/// Owned by the queue from enqueue to retirement; the payload is
/// deliberately schema-less because it is whatever body the host was
/// about to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Auto-assigned monotonic id
    pub id: i64,
    /// Target URL of the replay
    pub url: String,
    pub method: Method,
    pub payload: serde_json::Value,
    /// Enqueue timestamp, unix milliseconds; drives drain order
    pub queued_at: i64,
    /// Always false while queued; retirement deletes the row instead of
    /// flipping this
    pub synced: bool,
}

// Method serializes as its wire name so payload rows stay readable
impl Serialize for Method {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Method::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown HTTP method '{}'", s)))
    }
}
