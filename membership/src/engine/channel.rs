use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::permissions::ChannelOverride;

pub type ChannelId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

/// A guild channel as held by the channel registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub overrides: Vec<ChannelOverride>,
}

impl Channel {
    pub fn new(id: impl Into<ChannelId>, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            position: 0,
            overrides: Vec::new(),
        }
    }

    pub fn is_voice(&self) -> bool {
        self.kind == ChannelKind::Voice
    }
}

/// Anything that can name a channel: a bare id or a channel object.
pub trait AsChannelId {
    fn as_channel_id(&self) -> &str;
}

impl AsChannelId for str {
    fn as_channel_id(&self) -> &str {
        self
    }
}

impl AsChannelId for String {
    fn as_channel_id(&self) -> &str {
        self
    }
}

impl AsChannelId for Channel {
    fn as_channel_id(&self) -> &str {
        &self.id
    }
}

impl<T: AsChannelId + ?Sized> AsChannelId for &T {
    fn as_channel_id(&self) -> &str {
        (**self).as_channel_id()
    }
}

/// Guild-owned channel table, read by members at access time.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, channel: Channel) -> Option<Channel> {
        self.channels.insert(channel.id.clone(), channel)
    }

    pub fn remove(&self, id: &str) -> Option<Channel> {
        self.channels.remove(id).map(|(_, ch)| ch)
    }

    pub fn get(&self, id: &str) -> Option<Channel> {
        self.channels.get(id).map(|c| c.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
