use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::ChannelId;
use super::role::RoleId;

pub type UserId = String;

/// The platform identity a membership describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// Point-in-time member payload used to construct or refresh a member.
///
/// Every key is required on the wire, including the nullable ones; a payload
/// missing one fails to deserialize instead of being applied partially.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub user: User,
    pub roles: Vec<RoleId>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub nick: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub deaf: bool,
    pub mute: bool,
    pub self_deaf: bool,
    pub self_mute: bool,
    #[serde(deserialize_with = "Option::deserialize")]
    pub session_id: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub channel_id: Option<ChannelId>,
}

impl MemberSnapshot {
    /// A snapshot with no roles, no nickname and no voice state.
    pub fn new(user: User, joined_at: DateTime<Utc>) -> Self {
        Self {
            user,
            roles: Vec::new(),
            nick: None,
            joined_at,
            deaf: false,
            mute: false,
            self_deaf: false,
            self_mute: false,
            session_id: None,
            channel_id: None,
        }
    }
}
