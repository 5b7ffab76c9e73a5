use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use concord_membership::config::MembershipConfig;
use concord_membership::fixture::GuildFixture;
use concord_membership::{BanOptions, Guild, GuildMember, MemberSnapshot};

/// Inspect guild members from a fixture and dry-run member mutations.
#[derive(Parser)]
#[command(name = "concord-members", version)]
struct Cli {
    /// Guild fixture (JSON): roles, channels and member snapshots.
    #[arg(long)]
    fixture: PathBuf,
    #[arg(long, default_value = "concord-members.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a member's stored and derived state.
    Show { user_id: String },
    AddRoles {
        user_id: String,
        #[arg(required = true)]
        role_ids: Vec<String>,
    },
    RemoveRoles {
        user_id: String,
        #[arg(required = true)]
        role_ids: Vec<String>,
    },
    /// Set the nickname; omit it to clear.
    Nick { user_id: String, nick: Option<String> },
    Mute {
        user_id: String,
        #[arg(action = clap::ArgAction::Set)]
        mute: bool,
    },
    Deafen {
        user_id: String,
        #[arg(action = clap::ArgAction::Set)]
        deaf: bool,
    },
    /// Move into a voice channel.
    Move { user_id: String, channel_id: String },
    Kick {
        user_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Ban {
        user_id: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        delete_days: i64,
        #[arg(long)]
        reason: Option<String>,
    },
}

impl Command {
    fn user_id(&self) -> &str {
        match self {
            Self::Show { user_id }
            | Self::AddRoles { user_id, .. }
            | Self::RemoveRoles { user_id, .. }
            | Self::Nick { user_id, .. }
            | Self::Mute { user_id, .. }
            | Self::Deafen { user_id, .. }
            | Self::Move { user_id, .. }
            | Self::Kick { user_id, .. }
            | Self::Ban { user_id, .. } => user_id,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MembershipConfig::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let fixture = GuildFixture::load(&cli.fixture)?;
    let (guild, _executor) = fixture.build_local(config.limits());
    info!(guild_id = %guild.id, members = guild.member_count(), "fixture loaded");

    let member = guild
        .member(cli.command.user_id())
        .with_context(|| format!("no member {} in guild {}", cli.command.user_id(), guild.id))?;

    let updated = match cli.command {
        Command::Show { .. } => {
            println!("{}", serde_json::to_string_pretty(&describe(&member)?)?);
            return Ok(());
        }
        Command::AddRoles { role_ids, .. } => member.add_roles(&role_ids).await?,
        Command::RemoveRoles { role_ids, .. } => member.remove_roles(&role_ids).await?,
        Command::Nick { nick, .. } => member.set_nickname(nick.as_deref()).await?,
        Command::Mute { mute, .. } => member.set_mute(mute).await?,
        Command::Deafen { deaf, .. } => member.set_deaf(deaf).await?,
        Command::Move { channel_id, .. } => member.set_voice_channel(channel_id).await?,
        Command::Kick { reason, .. } => {
            member.kick(reason.as_deref()).await?;
            return report_removal(&guild, member);
        }
        Command::Ban {
            delete_days,
            reason,
            ..
        } => {
            member
                .ban(BanOptions {
                    delete_message_days: delete_days,
                    reason,
                })
                .await?;
            return report_removal(&guild, member);
        }
    };

    let refreshed = apply(&guild, updated);
    println!("{}", serde_json::to_string_pretty(&describe(&refreshed)?)?);
    Ok(())
}

/// Feed an executor result back through the guild, as the event path would.
fn apply(guild: &Arc<Guild>, snapshot: MemberSnapshot) -> GuildMember {
    guild.upsert_member(snapshot)
}

fn report_removal(guild: &Guild, member: GuildMember) -> anyhow::Result<()> {
    let user_id = member.id().unwrap_or_default();
    guild.remove_member(user_id);
    println!(
        "{}",
        json!({ "removed": user_id, "remaining_members": guild.member_count() })
    );
    Ok(())
}

fn describe(member: &GuildMember) -> anyhow::Result<serde_json::Value> {
    let roles = member.roles()?;
    Ok(json!({
        "id": member.id(),
        "display_name": member.display_name(),
        "nickname": member.nickname(),
        "joined_at": member.joined_at(),
        "stored_role_ids": member.role_ids(),
        "effective_roles": roles
            .values()
            .map(|r| json!({ "id": r.id, "name": r.name }))
            .collect::<Vec<_>>(),
        "highest_role": member.highest_role()?.map(|r| r.id),
        "permissions": member.permissions()?.bits(),
        "muted": member.is_muted(),
        "deafened": member.is_deafened(),
        "voice_channel": member.voice_channel().map(|c| c.name),
        "speaking": member.speaking(),
    }))
}
