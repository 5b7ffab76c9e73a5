use thiserror::Error;

use crate::engine::channel::ChannelId;
use crate::engine::commands::CommandError;
use crate::engine::guild::GuildId;
use crate::engine::role::RoleId;

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("malformed member snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
    #[error("member has no user attached yet")]
    Unpopulated,
    #[error("guild {0} is no longer available")]
    GuildUnavailable(GuildId),
    #[error("unknown role: {0}")]
    UnknownRole(RoleId),
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),
    #[error("channel {0} is not a voice channel")]
    NotVoiceChannel(ChannelId),
    #[error("{0}")]
    Validation(String),
    #[error("{0} is not supported on a guild member")]
    Unsupported(&'static str),
    #[error(transparent)]
    Command(#[from] CommandError),
}
