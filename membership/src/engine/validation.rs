/// Maximum nickname length (characters) when no config overrides it.
pub const MAX_NICKNAME_LENGTH: usize = 32;

/// Maximum number of explicitly assigned roles per member.
pub const MAX_ROLES_PER_MEMBER: usize = 250;

/// Inclusive upper bound for message-history deletion on ban.
pub const MAX_DELETE_MESSAGE_DAYS: i64 = 7;

/// Validate a per-guild nickname. `None` or an empty string clears it;
/// otherwise it must be at most `max_len` characters and not all whitespace.
pub fn validate_nickname(nick: Option<&str>, max_len: usize) -> Result<Option<String>, String> {
    let Some(nick) = nick.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if nick.trim().is_empty() {
        return Err("Nickname cannot be only whitespace".into());
    }
    if nick.chars().count() > max_len {
        return Err(format!("Nickname too long (max {} characters)", max_len));
    }
    Ok(Some(nick.to_string()))
}

/// Validate the number of days of message history to delete on ban.
/// Values outside `0..=7` are rejected, never clamped.
pub fn validate_delete_message_days(days: i64) -> Result<u8, String> {
    if !(0..=MAX_DELETE_MESSAGE_DAYS).contains(&days) {
        return Err(format!(
            "delete_message_days must be between 0 and {} (got {})",
            MAX_DELETE_MESSAGE_DAYS, days
        ));
    }
    Ok(days as u8)
}

/// Validate the size of a full role replacement list.
pub fn validate_role_count(count: usize, max: usize) -> Result<(), String> {
    if count > max {
        return Err(format!("Too many roles (max {})", max));
    }
    Ok(())
}
