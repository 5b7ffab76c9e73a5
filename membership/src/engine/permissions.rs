use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Permission bitfield carried by every role and channel override.
    /// Serialized as the raw `u64` the platform sends.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        // ── General ──
        const VIEW_CHANNELS         = 1 << 0;
        const MANAGE_CHANNELS       = 1 << 1;
        const MANAGE_ROLES          = 1 << 2;
        const MANAGE_SERVER         = 1 << 3;
        const CREATE_INVITES        = 1 << 4;
        const KICK_MEMBERS          = 1 << 5;
        const BAN_MEMBERS           = 1 << 6;
        const ADMINISTRATOR         = 1 << 7;
        const CHANGE_NICKNAME       = 1 << 8;
        const MANAGE_NICKNAMES      = 1 << 9;

        // ── Channel text ──
        const SEND_MESSAGES         = 1 << 10;
        const EMBED_LINKS           = 1 << 11;
        const ATTACH_FILES          = 1 << 12;
        const ADD_REACTIONS         = 1 << 13;
        const MENTION_EVERYONE      = 1 << 14;
        const MANAGE_MESSAGES       = 1 << 15;
        const READ_MESSAGE_HISTORY  = 1 << 16;

        // ── Voice ──
        const CONNECT               = 1 << 20;
        const SPEAK                 = 1 << 21;
        const MUTE_MEMBERS          = 1 << 22;
        const DEAFEN_MEMBERS        = 1 << 23;
        const MOVE_MEMBERS          = 1 << 24;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Permissions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    /// Unknown bits are dropped rather than rejected; the platform may grow
    /// new flags before this crate learns about them.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        Ok(Permissions::from_bits_truncate(bits))
    }
}

/// Default permissions for the @everyone role.
pub const DEFAULT_EVERYONE: Permissions = Permissions::VIEW_CHANNELS
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::EMBED_LINKS)
    .union(Permissions::ATTACH_FILES)
    .union(Permissions::ADD_REACTIONS)
    .union(Permissions::READ_MESSAGE_HISTORY)
    .union(Permissions::CREATE_INVITES)
    .union(Permissions::CHANGE_NICKNAME)
    .union(Permissions::CONNECT)
    .union(Permissions::SPEAK);

/// A channel permission override (allow/deny pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOverride {
    pub target_type: OverrideTargetType,
    pub target_id: String,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideTargetType {
    Role,
    User,
}

/// Compute a member's effective permissions, optionally inside a channel.
///
/// `role_permissions` is the member's effective role set in order, and must
/// include the default role (keyed by `everyone_role_id`) when the registry
/// has one. Resolution order:
///   1. Guild owner gets all permissions unconditionally.
///   2. OR together every role's base permissions.
///   3. If ADMINISTRATOR is set, return all permissions.
///   4. Apply the `@everyone` channel override.
///   5. OR all other role allows, then AND NOT all other role denies.
///   6. Apply the member-specific override last.
pub fn compute_effective_permissions(
    role_permissions: &[(&str, Permissions)],
    channel_overrides: &[ChannelOverride],
    everyone_role_id: &str,
    user_id: &str,
    is_owner: bool,
) -> Permissions {
    if is_owner {
        return Permissions::all();
    }

    let mut perms = role_permissions
        .iter()
        .fold(Permissions::empty(), |acc, (_, p)| acc | *p);

    if perms.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    if channel_overrides.is_empty() {
        return perms;
    }

    for ov in channel_overrides {
        if ov.target_type == OverrideTargetType::Role && ov.target_id == everyone_role_id {
            perms |= ov.allow;
            perms &= !ov.deny;
        }
    }

    let mut role_allow = Permissions::empty();
    let mut role_deny = Permissions::empty();
    for ov in channel_overrides {
        if ov.target_type == OverrideTargetType::Role
            && ov.target_id != everyone_role_id
            && role_permissions.iter().any(|(id, _)| *id == ov.target_id)
        {
            role_allow |= ov.allow;
            role_deny |= ov.deny;
        }
    }
    perms |= role_allow;
    perms &= !role_deny;

    for ov in channel_overrides {
        if ov.target_type == OverrideTargetType::User && ov.target_id == user_id {
            perms |= ov.allow;
            perms &= !ov.deny;
        }
    }

    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_override(id: &str, allow: Permissions, deny: Permissions) -> ChannelOverride {
        ChannelOverride {
            target_type: OverrideTargetType::Role,
            target_id: id.to_string(),
            allow,
            deny,
        }
    }

    fn user_override(id: &str, allow: Permissions, deny: Permissions) -> ChannelOverride {
        ChannelOverride {
            target_type: OverrideTargetType::User,
            target_id: id.to_string(),
            allow,
            deny,
        }
    }

    #[test]
    fn test_everyone_only() {
        let perms =
            compute_effective_permissions(&[("G", DEFAULT_EVERYONE)], &[], "G", "user1", false);
        assert_eq!(perms, DEFAULT_EVERYONE);
        assert!(!perms.contains(Permissions::KICK_MEMBERS));
    }

    #[test]
    fn test_roles_are_ored() {
        let perms = compute_effective_permissions(
            &[
                ("G", Permissions::VIEW_CHANNELS),
                ("kick", Permissions::KICK_MEMBERS),
                ("ban", Permissions::BAN_MEMBERS),
            ],
            &[],
            "G",
            "user1",
            false,
        );
        assert!(perms.contains(Permissions::VIEW_CHANNELS));
        assert!(perms.contains(Permissions::KICK_MEMBERS));
        assert!(perms.contains(Permissions::BAN_MEMBERS));
        assert!(!perms.contains(Permissions::MANAGE_ROLES));
    }

    #[test]
    fn test_no_roles_gives_nothing() {
        let perms = compute_effective_permissions(&[], &[], "G", "user1", false);
        assert_eq!(perms, Permissions::empty());
    }

    #[test]
    fn test_owner_bypass() {
        let perms = compute_effective_permissions(
            &[],
            &[user_override("owner", Permissions::empty(), Permissions::all())],
            "G",
            "owner",
            true,
        );
        assert_eq!(perms, Permissions::all());
    }

    #[test]
    fn test_administrator_ignores_denies() {
        let perms = compute_effective_permissions(
            &[("G", DEFAULT_EVERYONE), ("admin", Permissions::ADMINISTRATOR)],
            &[
                role_override("G", Permissions::empty(), Permissions::all()),
                user_override("user1", Permissions::empty(), Permissions::all()),
            ],
            "G",
            "user1",
            false,
        );
        assert_eq!(perms, Permissions::all());
    }

    #[test]
    fn test_everyone_override_denies() {
        let perms = compute_effective_permissions(
            &[("G", DEFAULT_EVERYONE)],
            &[role_override("G", Permissions::empty(), Permissions::SEND_MESSAGES)],
            "G",
            "user1",
            false,
        );
        assert!(perms.contains(Permissions::VIEW_CHANNELS));
        assert!(!perms.contains(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_role_override_reallows_after_everyone_deny() {
        let perms = compute_effective_permissions(
            &[("G", DEFAULT_EVERYONE), ("mod", Permissions::KICK_MEMBERS)],
            &[
                role_override("G", Permissions::empty(), Permissions::SEND_MESSAGES),
                role_override("mod", Permissions::SEND_MESSAGES, Permissions::empty()),
            ],
            "G",
            "user1",
            false,
        );
        assert!(perms.contains(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_override_for_role_not_held_is_ignored() {
        let perms = compute_effective_permissions(
            &[("G", DEFAULT_EVERYONE)],
            &[role_override("other", Permissions::empty(), Permissions::SEND_MESSAGES)],
            "G",
            "user1",
            false,
        );
        assert!(perms.contains(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_user_override_applies_last() {
        let perms = compute_effective_permissions(
            &[("G", DEFAULT_EVERYONE), ("mod", Permissions::empty())],
            &[
                role_override("mod", Permissions::MANAGE_CHANNELS, Permissions::empty()),
                user_override(
                    "user1",
                    Permissions::SEND_MESSAGES,
                    Permissions::MANAGE_CHANNELS | Permissions::SEND_MESSAGES,
                ),
            ],
            "G",
            "user1",
            false,
        );
        // deny is applied after allow within one override
        assert!(!perms.contains(Permissions::SEND_MESSAGES));
        assert!(!perms.contains(Permissions::MANAGE_CHANNELS));
        assert!(perms.contains(Permissions::VIEW_CHANNELS));
    }

    #[test]
    fn test_everyone_defaults_exclude_moderation() {
        assert!(DEFAULT_EVERYONE.contains(Permissions::CHANGE_NICKNAME));
        assert!(DEFAULT_EVERYONE.contains(Permissions::CONNECT));
        assert!(!DEFAULT_EVERYONE.contains(Permissions::MANAGE_NICKNAMES));
        assert!(!DEFAULT_EVERYONE.contains(Permissions::MUTE_MEMBERS));
        assert!(!DEFAULT_EVERYONE.contains(Permissions::ADMINISTRATOR));
    }

    #[test]
    fn test_serde_uses_raw_bits() {
        let perms = Permissions::VIEW_CHANNELS | Permissions::SEND_MESSAGES;
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(json, perms.bits().to_string());

        let unknown_bit = 1u64 << 60;
        let parsed: Permissions =
            serde_json::from_str(&(perms.bits() | unknown_bit).to_string()).unwrap();
        assert_eq!(parsed, perms);
    }

    #[test]
    fn test_override_deserializes_with_missing_allow() {
        let ov: ChannelOverride =
            serde_json::from_str(r#"{"target_type":"user","target_id":"u1","deny":1024}"#)
                .unwrap();
        assert_eq!(ov.target_type, OverrideTargetType::User);
        assert!(ov.allow.is_empty());
        assert_eq!(ov.deny, Permissions::SEND_MESSAGES);
    }
}
