use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::channel::{AsChannelId, Channel, ChannelId};
use super::commands::{BanRequest, CommandExecutor, MemberRef, MemberRequest, VoiceStateUpdate};
use super::guild::{Guild, GuildId, MemberLimits};
use super::permissions::{Permissions, compute_effective_permissions};
use super::role::{AsRoleId, Role, RoleId, RoleRegistry};
use super::snapshot::{MemberSnapshot, User};
use super::validation;
use crate::error::MemberError;

/// Ordered role view: default role first, then stored roles in stored order.
pub type RoleMap = IndexMap<RoleId, Role>;

/// Options for [`GuildMember::ban`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanOptions {
    /// Days of message history to delete, `0..=7`.
    pub delete_message_days: i64,
    pub reason: Option<String>,
}

/// Resolve stored role ids against a registry.
///
/// The default role (keyed by the guild id) comes first, followed by each
/// stored id that still resolves. Unresolved ids are dropped.
pub fn effective_roles(
    default_role_id: &str,
    stored: &[RoleId],
    registry: &RoleRegistry,
) -> RoleMap {
    let mut roles = RoleMap::with_capacity(stored.len() + 1);
    if let Some(default) = registry.get(default_role_id) {
        roles.insert(default.id.clone(), default);
    }
    for id in stored {
        if let Some(role) = registry.get(id) {
            roles.entry(id.clone()).or_insert(role);
        }
    }
    roles
}

/// Drop duplicates and the default role id, keeping first-seen order.
fn normalize_role_ids(guild_id: &str, ids: Vec<RoleId>) -> Vec<RoleId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| id != guild_id && seen.insert(id.clone()))
        .collect()
}

/// One user's membership in one guild.
///
/// Stored attributes only change through [`refresh`](Self::refresh) and the
/// speaking signal. Mutation methods submit a request to the guild's
/// executor and leave this value untouched; the returned snapshot (or the
/// next event) is applied through the owning [`Guild`].
#[derive(Clone)]
pub struct GuildMember {
    guild: Weak<Guild>,
    guild_id: GuildId,
    executor: Arc<dyn CommandExecutor>,
    limits: MemberLimits,

    user: Option<User>,
    role_ids: Vec<RoleId>,
    server_deaf: bool,
    server_mute: bool,
    self_deaf: bool,
    self_mute: bool,
    voice_session_id: Option<String>,
    voice_channel_id: Option<ChannelId>,
    nickname: Option<String>,
    joined_at: Option<DateTime<Utc>>,
    speaking: Option<bool>,
}

impl fmt::Debug for GuildMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuildMember")
            .field("guild_id", &self.guild_id)
            .field("user", &self.user)
            .field("role_ids", &self.role_ids)
            .field("nickname", &self.nickname)
            .field("joined_at", &self.joined_at)
            .field("voice_channel_id", &self.voice_channel_id)
            .field("speaking", &self.speaking)
            .finish_non_exhaustive()
    }
}

impl GuildMember {
    /// Bind a member to `guild`, applying `snapshot` immediately if given.
    pub fn new(guild: &Arc<Guild>, snapshot: Option<MemberSnapshot>) -> Self {
        let mut member = Self {
            guild: Arc::downgrade(guild),
            guild_id: guild.id.clone(),
            executor: guild.executor(),
            limits: guild.limits(),
            user: None,
            role_ids: Vec::new(),
            server_deaf: false,
            server_mute: false,
            self_deaf: false,
            self_mute: false,
            voice_session_id: None,
            voice_channel_id: None,
            nickname: None,
            joined_at: None,
            speaking: None,
        };
        if let Some(snapshot) = snapshot {
            member.refresh(snapshot);
        }
        member
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Overwrite every stored attribute from `snapshot`.
    ///
    /// `speaking` is left alone, and the join timestamp is only taken from
    /// the first snapshot ever applied.
    pub fn refresh(&mut self, snapshot: MemberSnapshot) {
        let received = snapshot.roles.len();
        self.role_ids = normalize_role_ids(&self.guild_id, snapshot.roles);
        if self.role_ids.len() != received {
            debug!(
                guild_id = %self.guild_id,
                user_id = %snapshot.user.id,
                received,
                kept = self.role_ids.len(),
                "dropped duplicate or default role ids from snapshot"
            );
        }

        match self.joined_at {
            None => self.joined_at = Some(snapshot.joined_at),
            Some(existing) if existing != snapshot.joined_at => {
                warn!(
                    guild_id = %self.guild_id,
                    user_id = %snapshot.user.id,
                    %existing,
                    incoming = %snapshot.joined_at,
                    "ignoring join timestamp change on refresh"
                );
            }
            Some(_) => {}
        }

        self.user = Some(snapshot.user);
        self.nickname = snapshot.nick;
        self.server_deaf = snapshot.deaf;
        self.server_mute = snapshot.mute;
        self.self_deaf = snapshot.self_deaf;
        self.self_mute = snapshot.self_mute;
        self.voice_session_id = snapshot.session_id;
        self.voice_channel_id = snapshot.channel_id;
    }

    /// Deserialize a raw payload and refresh from it. A malformed payload is
    /// returned as an error and nothing is applied.
    pub fn refresh_from_value(&mut self, payload: serde_json::Value) -> Result<(), MemberError> {
        let snapshot: MemberSnapshot = serde_json::from_value(payload)?;
        self.refresh(snapshot);
        Ok(())
    }

    /// Voice-activity signal; independent of refresh.
    pub fn set_speaking(&mut self, speaking: bool) {
        self.speaking = Some(speaking);
    }

    // ── Stored attributes ───────────────────────────────────────────

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn guild(&self) -> Result<Arc<Guild>, MemberError> {
        self.guild
            .upgrade()
            .ok_or_else(|| MemberError::GuildUnavailable(self.guild_id.clone()))
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The member's user id, or `None` before the first snapshot.
    pub fn id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Explicitly assigned role ids, without the default role.
    pub fn role_ids(&self) -> &[RoleId] {
        &self.role_ids
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Nickname if set, otherwise the username.
    pub fn display_name(&self) -> Option<&str> {
        self.nickname
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.username.as_str()))
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    pub fn server_mute(&self) -> bool {
        self.server_mute
    }

    pub fn server_deaf(&self) -> bool {
        self.server_deaf
    }

    pub fn self_mute(&self) -> bool {
        self.self_mute
    }

    pub fn self_deaf(&self) -> bool {
        self.self_deaf
    }

    pub fn is_muted(&self) -> bool {
        self.self_mute || self.server_mute
    }

    pub fn is_deafened(&self) -> bool {
        self.self_deaf || self.server_deaf
    }

    pub fn voice_session_id(&self) -> Option<&str> {
        self.voice_session_id.as_deref()
    }

    pub fn voice_channel_id(&self) -> Option<&str> {
        self.voice_channel_id.as_deref()
    }

    pub fn speaking(&self) -> Option<bool> {
        self.speaking
    }

    // ── Derived views ───────────────────────────────────────────────

    /// The effective role set, rebuilt from the live registry on each call.
    pub fn roles(&self) -> Result<RoleMap, MemberError> {
        let guild = self.guild()?;
        Ok(effective_roles(&self.guild_id, &self.role_ids, guild.roles()))
    }

    pub fn has_role(&self, role: impl AsRoleId) -> Result<bool, MemberError> {
        Ok(self.roles()?.contains_key(role.as_role_id()))
    }

    pub fn highest_role(&self) -> Result<Option<Role>, MemberError> {
        Ok(top_role(self.roles()?.into_values()))
    }

    /// Highest role with a non-zero color.
    pub fn color_role(&self) -> Result<Option<Role>, MemberError> {
        Ok(top_role(self.roles()?.into_values().filter(|r| r.color != 0)))
    }

    /// Highest hoisted role.
    pub fn hoist_role(&self) -> Result<Option<Role>, MemberError> {
        Ok(top_role(self.roles()?.into_values().filter(|r| r.hoist)))
    }

    /// The voice channel the member is connected to, if it still exists.
    pub fn voice_channel(&self) -> Option<Channel> {
        let channel_id = self.voice_channel_id.as_deref()?;
        self.guild.upgrade()?.channels().get(channel_id)
    }

    /// Guild-level permissions from the effective role set.
    pub fn permissions(&self) -> Result<Permissions, MemberError> {
        self.permissions_with_overrides(None)
    }

    /// Permissions inside `channel`, applying its overrides.
    pub fn permissions_in(&self, channel: &Channel) -> Result<Permissions, MemberError> {
        self.permissions_with_overrides(Some(channel))
    }

    pub fn has_permission(&self, permission: Permissions) -> Result<bool, MemberError> {
        Ok(self.permissions()?.contains(permission))
    }

    fn permissions_with_overrides(
        &self,
        channel: Option<&Channel>,
    ) -> Result<Permissions, MemberError> {
        let guild = self.guild()?;
        let user_id = self.id().ok_or(MemberError::Unpopulated)?;
        let roles = effective_roles(&self.guild_id, &self.role_ids, guild.roles());
        let role_permissions: Vec<(&str, Permissions)> = roles
            .values()
            .map(|r| (r.id.as_str(), r.permissions))
            .collect();

        Ok(compute_effective_permissions(
            &role_permissions,
            channel.map(|c| c.overrides.as_slice()).unwrap_or_default(),
            &self.guild_id,
            user_id,
            guild.owner_id == user_id,
        ))
    }

    // ── Mutations ───────────────────────────────────────────────────

    pub async fn set_mute(&self, mute: bool) -> Result<MemberSnapshot, MemberError> {
        self.submit(MemberRequest::SetVoiceState {
            update: VoiceStateUpdate::Mute(mute),
        })
        .await
    }

    pub async fn set_deaf(&self, deaf: bool) -> Result<MemberSnapshot, MemberError> {
        self.submit(MemberRequest::SetVoiceState {
            update: VoiceStateUpdate::Deaf(deaf),
        })
        .await
    }

    /// Move the member to a voice channel of this guild.
    pub async fn set_voice_channel(
        &self,
        channel: impl AsChannelId,
    ) -> Result<MemberSnapshot, MemberError> {
        let channel_id = channel.as_channel_id().to_string();
        let resolved = self
            .guild()?
            .channels()
            .get(&channel_id)
            .ok_or_else(|| MemberError::UnknownChannel(channel_id.clone()))?;
        if !resolved.is_voice() {
            return Err(MemberError::NotVoiceChannel(channel_id));
        }

        self.submit(MemberRequest::SetVoiceState {
            update: VoiceStateUpdate::Channel(Some(channel_id)),
        })
        .await
    }

    pub async fn disconnect_voice(&self) -> Result<MemberSnapshot, MemberError> {
        self.submit(MemberRequest::SetVoiceState {
            update: VoiceStateUpdate::Channel(None),
        })
        .await
    }

    /// Set or clear (`None` / empty) the per-guild nickname.
    pub async fn set_nickname(&self, nick: Option<&str>) -> Result<MemberSnapshot, MemberError> {
        let nick = validation::validate_nickname(nick, self.limits.max_nickname_length)
            .map_err(MemberError::Validation)?;
        self.submit(MemberRequest::SetNickname { nick }).await
    }

    /// Replace the whole role list. Accepts role objects or ids.
    pub async fn set_roles<I, R>(&self, roles: I) -> Result<MemberSnapshot, MemberError>
    where
        I: IntoIterator<Item = R>,
        R: AsRoleId,
    {
        let role_ids = self.resolve_requested(roles)?;
        self.submit_roles(role_ids).await
    }

    pub async fn add_role(&self, role: impl AsRoleId) -> Result<MemberSnapshot, MemberError> {
        self.add_roles([role]).await
    }

    /// Append roles not already held, keeping existing order.
    pub async fn add_roles<I, R>(&self, roles: I) -> Result<MemberSnapshot, MemberError>
    where
        I: IntoIterator<Item = R>,
        R: AsRoleId,
    {
        let mut role_ids = self.role_ids.clone();
        for id in self.resolve_requested(roles)? {
            if !role_ids.contains(&id) {
                role_ids.push(id);
            }
        }
        self.submit_roles(role_ids).await
    }

    pub async fn remove_role(&self, role: impl AsRoleId) -> Result<MemberSnapshot, MemberError> {
        self.remove_roles([role]).await
    }

    /// Drop the given roles. Ids the member doesn't hold are ignored.
    pub async fn remove_roles<I, R>(&self, roles: I) -> Result<MemberSnapshot, MemberError>
    where
        I: IntoIterator<Item = R>,
        R: AsRoleId,
    {
        let removed: HashSet<String> = roles
            .into_iter()
            .map(|r| r.as_role_id().to_string())
            .collect();
        let role_ids = self
            .role_ids
            .iter()
            .filter(|id| !removed.contains(*id))
            .cloned()
            .collect();
        self.submit_roles(role_ids).await
    }

    pub async fn kick(&self, reason: Option<&str>) -> Result<MemberSnapshot, MemberError> {
        self.submit(MemberRequest::RemoveMember {
            ban: None,
            reason: reason.map(str::to_string),
        })
        .await
    }

    /// Ban the member. `delete_message_days` outside `0..=7` is rejected
    /// before anything is submitted.
    pub async fn ban(&self, options: BanOptions) -> Result<MemberSnapshot, MemberError> {
        let delete_message_days =
            validation::validate_delete_message_days(options.delete_message_days)
                .map_err(MemberError::Validation)?;
        self.submit(MemberRequest::RemoveMember {
            ban: Some(BanRequest { delete_message_days }),
            reason: options.reason,
        })
        .await
    }

    /// Close the direct-message channel with this member's user.
    pub async fn delete_dm(&self) -> Result<MemberSnapshot, MemberError> {
        self.submit(MemberRequest::DeleteDmChannel).await
    }

    /// Members are not message targets; use the user's DM channel instead.
    pub fn send_message(&self, _content: &str) -> Result<(), MemberError> {
        Err(MemberError::Unsupported("send_message"))
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Normalize requested roles to ids, skipping the default role and
    /// repeats, and rejecting ids the registry doesn't know.
    fn resolve_requested<I, R>(&self, roles: I) -> Result<Vec<RoleId>, MemberError>
    where
        I: IntoIterator<Item = R>,
        R: AsRoleId,
    {
        let guild = self.guild()?;
        let mut ids: Vec<RoleId> = Vec::new();
        for role in roles {
            let id = role.as_role_id();
            if id == self.guild_id || ids.iter().any(|existing| existing == id) {
                continue;
            }
            if !guild.roles().contains(id) {
                return Err(MemberError::UnknownRole(id.to_string()));
            }
            ids.push(id.to_string());
        }
        Ok(ids)
    }

    async fn submit_roles(&self, role_ids: Vec<RoleId>) -> Result<MemberSnapshot, MemberError> {
        validation::validate_role_count(role_ids.len(), self.limits.max_roles_per_member)
            .map_err(MemberError::Validation)?;
        self.submit(MemberRequest::SetRoles { role_ids }).await
    }

    fn member_ref(&self) -> Result<MemberRef, MemberError> {
        let user_id = self.id().ok_or(MemberError::Unpopulated)?;
        Ok(MemberRef {
            guild_id: self.guild_id.clone(),
            user_id: user_id.to_string(),
        })
    }

    async fn submit(&self, request: MemberRequest) -> Result<MemberSnapshot, MemberError> {
        let target = self.member_ref()?;
        let kind = request.kind();
        debug!(
            guild_id = %target.guild_id,
            user_id = %target.user_id,
            kind,
            "submitting member request"
        );

        self.executor
            .submit(target, request)
            .await
            .inspect_err(|e| {
                debug!(guild_id = %self.guild_id, kind, error = %e, "member request failed")
            })
            .map_err(MemberError::from)
    }
}

fn top_role(roles: impl Iterator<Item = Role>) -> Option<Role> {
    roles.reduce(|best, role| if role.outranks(&best) { role } else { best })
}
