use crate::error::{CommunityError, CommunityResult};
use crate::helper::membership_helpers::{begin_immediate, require_tier, resolve_community, resolve_user};
use crate::helper::sanitization_helpers::strip_all_html;
use crate::models::db_operations::{community_db_operations, membership_db_operations};
use crate::models::ModeratorTier;
use rusqlite::Connection;

#[derive(Debug, PartialEq, Eq)]
pub enum BanOutcome {
    Banned,
    ReasonUpdated,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Bans `follower_id` from the named community. Re-banning only overwrites the reason.
pub fn ban(
    conn: &mut Connection,
    actor_id: i64,
    follower_id: Option<i64>,
    reason: Option<&str>,
    community_name: Option<&str>,
) -> CommunityResult<BanOutcome> {
    let reason = reason.map(strip_all_html);
    let (follower_id, reason, community_name) =
        match (follower_id, non_empty(reason.as_deref()), non_empty(community_name)) {
            (Some(id), Some(reason), Some(name)) => (id, reason, name),
            _ => {
                return Err(CommunityError::Validation(
                    "Missing follower_id, reason, or instance name".to_string(),
                ))
            }
        };

    let tx = begin_immediate(conn)?;
    let community = resolve_community(&tx, community_name)?;
    let actor = require_tier(&tx, actor_id, community.id, ModeratorTier::Moderator)?;
    resolve_user(&tx, follower_id)?;

    if follower_id == actor_id {
        return Err(CommunityError::Validation("You can not ban yourself.".to_string()));
    }
    if let Some(target) = community_db_operations::read_moderator_tier(&tx, follower_id, community.id)? {
        if target == ModeratorTier::Owner || target >= actor {
            return Err(CommunityError::Forbidden(
                "You can not ban a manager at or above your own rank.".to_string(),
            ));
        }
    }

    let inserted = membership_db_operations::upsert_ban(&tx, follower_id, community.id, reason)?;
    tx.commit()?;

    log::info!("User {} banned user {} from '{}': {}", actor_id, follower_id, community.name, reason);
    Ok(if inserted { BanOutcome::Banned } else { BanOutcome::ReasonUpdated })
}

/// Lifts a ban in the named community only.
pub fn unban(
    conn: &mut Connection,
    actor_id: i64,
    banned_user_id: Option<i64>,
    community_name: Option<&str>,
) -> CommunityResult<()> {
    let (banned_user_id, community_name) = match (banned_user_id, non_empty(community_name)) {
        (Some(id), Some(name)) => (id, name),
        _ => return Err(CommunityError::Validation("Missing banned_user_id or instance name".to_string())),
    };

    let tx = begin_immediate(conn)?;
    let community = resolve_community(&tx, community_name)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Moderator)?;

    if membership_db_operations::delete_ban(&tx, banned_user_id, community.id)? == 0 {
        return Err(CommunityError::not_found("Ban"));
    }
    tx.commit()?;

    log::info!("User {} lifted the ban on user {} in '{}'", actor_id, banned_user_id, community.name);
    Ok(())
}
