use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use super::channel::ChannelRegistry;
use super::commands::CommandExecutor;
use super::member::GuildMember;
use super::role::RoleRegistry;
use super::snapshot::{MemberSnapshot, UserId};
use super::validation::{MAX_NICKNAME_LENGTH, MAX_ROLES_PER_MEMBER};

/// Guild identifier; also the id of the guild's default role.
pub type GuildId = String;

/// Local argument limits applied before a request is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLimits {
    pub max_nickname_length: usize,
    pub max_roles_per_member: usize,
}

impl Default for MemberLimits {
    fn default() -> Self {
        Self {
            max_nickname_length: MAX_NICKNAME_LENGTH,
            max_roles_per_member: MAX_ROLES_PER_MEMBER,
        }
    }
}

/// In-memory state for a guild: its registries and the members it owns.
///
/// Members only hold a weak handle back to the guild, so evicting the guild
/// never leaks through its members.
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
    roles: RoleRegistry,
    channels: ChannelRegistry,
    /// Cached members keyed by user ID.
    members: DashMap<UserId, GuildMember>,
    executor: Arc<dyn CommandExecutor>,
    limits: MemberLimits,
}

impl Guild {
    pub fn new(
        id: GuildId,
        name: String,
        owner_id: UserId,
        executor: Arc<dyn CommandExecutor>,
        limits: MemberLimits,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            owner_id,
            roles: RoleRegistry::new(),
            channels: ChannelRegistry::new(),
            members: DashMap::new(),
            executor,
            limits,
        })
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        self.executor.clone()
    }

    pub fn limits(&self) -> MemberLimits {
        self.limits
    }

    /// Apply a member snapshot from the event path: refresh the cached
    /// member if present, otherwise construct and cache a new one.
    /// Returns a copy of the member as now cached.
    ///
    /// Construct-or-refresh happens under the entry's shard lock, so racing
    /// first snapshots for one user never replace each other.
    pub fn upsert_member(self: &Arc<Self>, snapshot: MemberSnapshot) -> GuildMember {
        let user_id = snapshot.user.id.clone();

        match self.members.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().refresh(snapshot);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let member = GuildMember::new(self, Some(snapshot));
                entry.insert(member.clone());
                info!(guild_id = %self.id, %user_id, "member cached");
                member
            }
        }
    }

    /// Evict a member that left the guild.
    pub fn remove_member(&self, user_id: &str) -> Option<GuildMember> {
        let removed = self.members.remove(user_id).map(|(_, m)| m);
        if removed.is_some() {
            info!(guild_id = %self.id, %user_id, "member evicted");
        }
        removed
    }

    pub fn member(&self, user_id: &str) -> Option<GuildMember> {
        self.members.get(user_id).map(|m| m.value().clone())
    }

    /// Voice-activity signal. Returns false if the member isn't cached.
    pub fn set_speaking(&self, user_id: &str, speaking: bool) -> bool {
        match self.members.get_mut(user_id) {
            Some(mut member) => {
                member.set_speaking(speaking);
                true
            }
            None => false,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
