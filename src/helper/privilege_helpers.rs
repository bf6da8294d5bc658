use crate::error::{CommunityError, CommunityResult};
use crate::helper::membership_helpers::{begin_immediate, resolve_user};
use crate::models::db_operations::community_db_operations;
use crate::models::{Community, ModeratorTier};
use rusqlite::Connection;

#[derive(Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    Unchanged,
}

/// The lowest tier allowed to hand out `tier`.
fn required_to_grant(tier: ModeratorTier) -> CommunityResult<ModeratorTier> {
    match tier {
        ModeratorTier::Owner => Err(CommunityError::Validation(
            "Ownership can not be granted. A community keeps the owner it was created with.".to_string(),
        )),
        ModeratorTier::Admin => Ok(ModeratorTier::Owner),
        ModeratorTier::Moderator => Ok(ModeratorTier::Admin),
    }
}

fn actor_tier(conn: &Connection, actor_id: i64, community_id: i64) -> CommunityResult<ModeratorTier> {
    community_db_operations::read_moderator_tier(conn, actor_id, community_id)?
        .ok_or_else(|| CommunityError::Forbidden("You are not a manager of this community.".to_string()))
}

pub fn grant_privilege(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    target_user_id: i64,
    tier: ModeratorTier,
) -> CommunityResult<GrantOutcome> {
    let minimum = required_to_grant(tier)?;

    let tx = begin_immediate(conn)?;
    let actor = actor_tier(&tx, actor_id, community.id)?;
    if actor < minimum {
        return Err(CommunityError::Forbidden(format!(
            "Only the {} or above can grant the {} privilege.",
            minimum, tier
        )));
    }
    resolve_user(&tx, target_user_id)?;

    let current = community_db_operations::read_moderator_tier(&tx, target_user_id, community.id)?;
    if let Some(existing) = current {
        if existing >= actor {
            return Err(CommunityError::Forbidden(
                "You can not change the privileges of a manager at or above your own rank.".to_string(),
            ));
        }
        // A grant only raises a tier. Lowering one goes through revoke.
        if existing >= tier {
            log::debug!("User {} already holds {} in '{}'", target_user_id, existing, community.name);
            return Ok(GrantOutcome::Unchanged);
        }
    }

    let changed = community_db_operations::upsert_moderator(&tx, target_user_id, community.id, tier)?;
    tx.commit()?;

    if changed {
        log::info!(
            "User {} granted {} to user {} in '{}'",
            actor_id,
            tier,
            target_user_id,
            community.name
        );
        Ok(GrantOutcome::Granted)
    } else {
        Ok(GrantOutcome::Unchanged)
    }
}

/// Deletes the manager row, so no tier survives the revocation.
pub fn revoke_privilege(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    moderator_id: i64,
) -> CommunityResult<()> {
    let tx = begin_immediate(conn)?;
    let actor = actor_tier(&tx, actor_id, community.id)?;
    let row = community_db_operations::read_moderator_by_id(&tx, moderator_id, community.id)?
        .ok_or_else(|| CommunityError::not_found("Manager"))?;

    if row.tier == ModeratorTier::Owner {
        return Err(CommunityError::Forbidden("The owner's privileges can not be removed.".to_string()));
    }
    if row.tier >= actor {
        return Err(CommunityError::Forbidden(
            "You can only remove managers ranked below you.".to_string(),
        ));
    }

    community_db_operations::delete_moderator(&tx, row.id, community.id)?;
    tx.commit()?;

    log::info!(
        "User {} removed {} privileges from user {} in '{}'",
        actor_id,
        row.tier,
        row.user_id,
        community.name
    );
    Ok(())
}
