use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::channel::ChannelId;
use super::guild::GuildId;
use super::role::RoleId;
use super::snapshot::{MemberSnapshot, UserId};

/// Addresses one membership on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

/// A single voice-state field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum VoiceStateUpdate {
    Mute(bool),
    Deaf(bool),
    /// Move to a voice channel, or disconnect with `None`.
    Channel(Option<ChannelId>),
}

/// Member-scoped mutation handed to a [`CommandExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberRequest {
    SetVoiceState {
        update: VoiceStateUpdate,
    },
    SetNickname {
        nick: Option<String>,
    },
    /// Full replacement of the member's explicit role list.
    SetRoles {
        role_ids: Vec<RoleId>,
    },
    /// Remove the member from the guild; `ban` carries the history
    /// deletion window when the removal is a ban.
    RemoveMember {
        ban: Option<BanRequest>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    DeleteDmChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRequest {
    pub delete_message_days: u8,
}

impl MemberRequest {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetVoiceState { .. } => "set_voice_state",
            Self::SetNickname { .. } => "set_nickname",
            Self::SetRoles { .. } => "set_roles",
            Self::RemoveMember { ban: None, .. } => "kick",
            Self::RemoveMember { ban: Some(_), .. } => "ban",
            Self::DeleteDmChannel => "delete_dm_channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("missing permissions: {0}")]
    Forbidden(String),
    #[error("member not found")]
    NotFound,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Turns member requests into platform operations.
///
/// Implementations own transport, retries, timeouts and cancellation. On
/// success they resolve to the member as the platform now sees it.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn submit(
        &self,
        target: MemberRef,
        request: MemberRequest,
    ) -> Result<MemberSnapshot, CommandError>;
}

/// In-memory executor that applies requests to its own snapshot table.
///
/// Stands in for the platform in dry runs and tests. Every submitted request
/// is recorded in order.
#[derive(Default)]
pub struct LocalExecutor {
    members: DashMap<MemberRef, MemberSnapshot>,
    bans: DashMap<MemberRef, u8>,
    log: Mutex<Vec<(MemberRef, MemberRequest)>>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a member known to the executor.
    pub fn seed(&self, guild_id: &str, snapshot: MemberSnapshot) {
        let key = MemberRef {
            guild_id: guild_id.to_string(),
            user_id: snapshot.user.id.clone(),
        };
        self.members.insert(key, snapshot);
    }

    pub fn snapshot(&self, guild_id: &str, user_id: &str) -> Option<MemberSnapshot> {
        self.members
            .get(&member_ref(guild_id, user_id))
            .map(|s| s.value().clone())
    }

    /// History-deletion window of a recorded ban, if the member was banned.
    pub fn ban_of(&self, guild_id: &str, user_id: &str) -> Option<u8> {
        self.bans.get(&member_ref(guild_id, user_id)).map(|d| *d)
    }

    pub async fn requests(&self) -> Vec<(MemberRef, MemberRequest)> {
        self.log.lock().await.clone()
    }
}

fn member_ref(guild_id: &str, user_id: &str) -> MemberRef {
    MemberRef {
        guild_id: guild_id.to_string(),
        user_id: user_id.to_string(),
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn submit(
        &self,
        target: MemberRef,
        request: MemberRequest,
    ) -> Result<MemberSnapshot, CommandError> {
        self.log.lock().await.push((target.clone(), request.clone()));

        let Some(mut entry) = self.members.get_mut(&target) else {
            return Err(CommandError::NotFound);
        };

        match request {
            MemberRequest::SetVoiceState { update } => match update {
                VoiceStateUpdate::Mute(mute) => entry.mute = mute,
                VoiceStateUpdate::Deaf(deaf) => entry.deaf = deaf,
                VoiceStateUpdate::Channel(Some(channel_id)) => {
                    if entry.session_id.is_none() {
                        entry.session_id = Some(Uuid::new_v4().simple().to_string());
                    }
                    entry.channel_id = Some(channel_id);
                }
                VoiceStateUpdate::Channel(None) => {
                    entry.session_id = None;
                    entry.channel_id = None;
                }
            },
            MemberRequest::SetNickname { nick } => entry.nick = nick,
            MemberRequest::SetRoles { role_ids } => entry.roles = role_ids,
            MemberRequest::RemoveMember { ban, .. } => {
                let removed = entry.value().clone();
                drop(entry);
                self.members.remove(&target);
                if let Some(ban) = ban {
                    self.bans.insert(target.clone(), ban.delete_message_days);
                }
                debug!(
                    guild_id = %target.guild_id,
                    user_id = %target.user_id,
                    "local member removed"
                );
                return Ok(removed);
            }
            MemberRequest::DeleteDmChannel => {}
        }

        Ok(entry.value().clone())
    }
}
