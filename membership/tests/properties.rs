//! Property-based tests for role resolution and refresh.
//!
//! Uses proptest to generate stored role lists and registry contents and
//! verify that:
//! 1. The default role always leads the effective role set
//! 2. The effective set tracks the live registry without a refresh
//! 3. Refresh leaves no residue from the previous snapshot
//! 4. Role additions/removals keep stored order and never duplicate

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use concord_membership::engine::role::Role;
use concord_membership::{Guild, GuildMember, LocalExecutor, MemberLimits, MemberSnapshot, User};

const GUILD_ID: &str = "G";

// =============================================================================
// STRATEGIES
// =============================================================================

fn role_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("R[0-9]").expect("valid regex")
}

/// Stored role lists may contain repeats and the default role id.
fn stored_roles_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![9 => role_id_strategy(), 1 => Just(GUILD_ID.to_string())],
        0..12,
    )
}

/// Registry contents in insertion order, default role somewhere inside.
fn registry_strategy() -> impl Strategy<Value = Vec<String>> {
    (prop::collection::hash_set(role_id_strategy(), 0..6), any::<prop::sample::Index>()).prop_map(
        |(ids, at)| {
            let mut ids: Vec<String> = ids.into_iter().collect();
            let at = at.index(ids.len() + 1);
            ids.insert(at, GUILD_ID.to_string());
            ids
        },
    )
}

fn snapshot_strategy() -> impl Strategy<Value = MemberSnapshot> {
    (
        stored_roles_strategy(),
        prop::option::of("[a-z]{1,8}"),
        any::<[bool; 4]>(),
        prop::option::of("V[0-9]"),
        "[a-z]{1,8}",
    )
        .prop_map(|(roles, nick, flags, channel, username)| MemberSnapshot {
            user: User {
                id: "U1".into(),
                username,
                avatar_url: None,
                bot: false,
            },
            roles,
            nick,
            joined_at: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            deaf: flags[0],
            mute: flags[1],
            self_deaf: flags[2],
            self_mute: flags[3],
            session_id: channel.as_ref().map(|c| format!("session-{c}")),
            channel_id: channel,
        })
}

fn guild_with(registry: &[String]) -> (Arc<Guild>, Arc<LocalExecutor>) {
    let executor = Arc::new(LocalExecutor::new());
    let guild = Guild::new(
        GUILD_ID.into(),
        "Prop Guild".into(),
        "OWNER".into(),
        executor.clone(),
        MemberLimits::default(),
    );
    for (position, id) in registry.iter().enumerate() {
        guild.roles().insert(Role::new(id.clone(), id.clone(), position as i32));
    }
    (guild, executor)
}

/// Expected effective ids: default first, then stored resolvable ids in
/// first-seen order.
fn expected_ids(stored: &[String], registry: &[String]) -> Vec<String> {
    let mut ids = vec![GUILD_ID.to_string()];
    for id in stored {
        if registry.contains(id) && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn default_role_always_first(
        stored in stored_roles_strategy(),
        registry in registry_strategy(),
    ) {
        let (guild, _) = guild_with(&registry);
        let mut snapshot = MemberSnapshot::new(
            User { id: "U1".into(), username: "u".into(), avatar_url: None, bot: false },
            Utc::now(),
        );
        snapshot.roles = stored.clone();
        let member = GuildMember::new(&guild, Some(snapshot));

        let ids: Vec<String> = member.roles().unwrap().into_keys().collect();
        prop_assert_eq!(ids.first().map(String::as_str), Some(GUILD_ID));
        prop_assert_eq!(ids, expected_ids(&stored, &registry));
        prop_assert!(!member.role_ids().iter().any(|id| id == GUILD_ID));
    }

    #[test]
    fn registry_removal_is_seen_without_refresh(
        stored in stored_roles_strategy(),
        registry in registry_strategy(),
        victim in any::<prop::sample::Index>(),
    ) {
        let (guild, _) = guild_with(&registry);
        let mut snapshot = MemberSnapshot::new(
            User { id: "U1".into(), username: "u".into(), avatar_url: None, bot: false },
            Utc::now(),
        );
        snapshot.roles = stored.clone();
        let member = GuildMember::new(&guild, Some(snapshot));
        let before = member.roles().unwrap();

        let removable: Vec<&String> = registry.iter().filter(|id| *id != GUILD_ID).collect();
        prop_assume!(!removable.is_empty());
        let removed = removable[victim.index(removable.len())].clone();
        guild.roles().remove(&removed);

        let after = member.roles().unwrap();
        prop_assert!(!after.contains_key(&removed));
        prop_assert_eq!(after.len(), before.len() - usize::from(before.contains_key(&removed)));
    }

    #[test]
    fn refresh_leaves_no_residue(
        first in snapshot_strategy(),
        second in snapshot_strategy(),
        speaking in any::<bool>(),
    ) {
        let (guild, _) = guild_with(&[GUILD_ID.to_string()]);
        let mut member = GuildMember::new(&guild, Some(first));
        member.set_speaking(speaking);
        member.refresh(second.clone());

        let mut expected_roles: Vec<String> = Vec::new();
        for id in &second.roles {
            if id != GUILD_ID && !expected_roles.contains(id) {
                expected_roles.push(id.clone());
            }
        }
        prop_assert_eq!(member.role_ids(), expected_roles.as_slice());
        prop_assert_eq!(member.nickname(), second.nick.as_deref());
        prop_assert_eq!(member.user(), Some(&second.user));
        prop_assert_eq!(member.server_deaf(), second.deaf);
        prop_assert_eq!(member.server_mute(), second.mute);
        prop_assert_eq!(member.self_deaf(), second.self_deaf);
        prop_assert_eq!(member.self_mute(), second.self_mute);
        prop_assert_eq!(member.is_muted(), second.mute || second.self_mute);
        prop_assert_eq!(member.is_deafened(), second.deaf || second.self_deaf);
        prop_assert_eq!(member.voice_session_id(), second.session_id.as_deref());
        prop_assert_eq!(member.voice_channel_id(), second.channel_id.as_deref());
        prop_assert_eq!(member.speaking(), Some(speaking));
    }

    #[test]
    fn add_then_remove_keeps_order(
        held in prop::collection::hash_set(role_id_strategy(), 0..5),
        extra in prop::collection::vec(role_id_strategy(), 1..5),
    ) {
        let registry: Vec<String> = (0..10)
            .map(|i| format!("R{i}"))
            .chain([GUILD_ID.to_string()])
            .collect();
        let (guild, executor) = guild_with(&registry);
        let held: Vec<String> = held.into_iter().collect();
        let mut snapshot = MemberSnapshot::new(
            User { id: "U1".into(), username: "u".into(), avatar_url: None, bot: false },
            Utc::now(),
        );
        snapshot.roles = held.clone();
        executor.seed(GUILD_ID, snapshot.clone());
        let member = guild.upsert_member(snapshot);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let added = runtime.block_on(member.add_roles(&extra)).unwrap();

        // pre-existing first, in order; new ones appended once each
        prop_assert_eq!(&added.roles[..held.len()], held.as_slice());
        let mut seen = std::collections::HashSet::new();
        prop_assert!(added.roles.iter().all(|id| seen.insert(id.clone())));
        for id in &extra {
            prop_assert!(added.roles.contains(id));
        }

        let member = guild.upsert_member(added.clone());
        let first = extra[0].clone();
        let removed = runtime.block_on(member.remove_roles([&first])).unwrap();
        let expected: Vec<String> =
            added.roles.iter().filter(|id| **id != first).cloned().collect();
        prop_assert_eq!(removed.roles, expected);
    }
}
