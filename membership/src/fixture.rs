use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::engine::channel::Channel;
use crate::engine::commands::LocalExecutor;
use crate::engine::guild::{Guild, GuildId, MemberLimits};
use crate::engine::permissions::DEFAULT_EVERYONE;
use crate::engine::role::Role;
use crate::engine::snapshot::{MemberSnapshot, UserId};

/// A guild described as JSON: registries plus member snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildFixture {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub members: Vec<MemberSnapshot>,
}

impl GuildFixture {
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    /// Build the guild against a [`LocalExecutor`] that knows every member.
    ///
    /// A fixture that doesn't list the default role gets `@everyone` with the
    /// default permission set, as a newly created guild would.
    pub fn build_local(self, limits: MemberLimits) -> (Arc<Guild>, Arc<LocalExecutor>) {
        let executor = Arc::new(LocalExecutor::new());
        let guild = Guild::new(self.id, self.name, self.owner_id, executor.clone(), limits);

        for role in self.roles {
            guild.roles().insert(role);
        }
        if !guild.roles().contains(&guild.id) {
            let everyone = Role::new(guild.id.clone(), "@everyone", 0);
            guild.roles().insert(everyone.with_permissions(DEFAULT_EVERYONE));
        }
        for channel in self.channels {
            guild.channels().insert(channel);
        }
        for snapshot in self.members {
            executor.seed(&guild.id, snapshot.clone());
            guild.upsert_member(snapshot);
        }

        (guild, executor)
    }
}
