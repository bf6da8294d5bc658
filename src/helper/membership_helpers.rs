//! Follow state, follow toggling and the follow-request workflow.
//!
//! Every transition runs in a single `IMMEDIATE` transaction so the
//! get-or-create, the flag change and any count read are consistent.
//! Notifications are returned as events and delivered by the caller after
//! commit.

use crate::error::{CommunityError, CommunityResult};
use crate::helper::notification_helpers::CommunityEvent;
use crate::models::db_operations::{community_db_operations, membership_db_operations, users_db_operations};
use crate::models::{BlackListEntry, Community, FollowRequest, ModeratorTier, User};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

/// Everything the membership store knows about one (user, community) pair.
#[derive(Debug, Serialize)]
pub struct MembershipState {
    pub is_following: bool,
    pub ban: Option<BlackListEntry>,
    pub tier: Option<ModeratorTier>,
    pub request: Option<FollowRequest>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FollowToggle {
    pub followers_count: i64,
    pub is_following: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequestToggle {
    Cancelled,
    Sent { request_status: bool },
}

#[derive(Debug)]
pub struct Transition<T> {
    pub value: T,
    pub events: Vec<CommunityEvent>,
}

pub(crate) fn begin_immediate(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

pub fn resolve_community(conn: &Connection, name: &str) -> CommunityResult<Community> {
    community_db_operations::read_community_by_name(conn, name)?
        .ok_or_else(|| CommunityError::not_found("Community"))
}

pub fn resolve_user(conn: &Connection, user_id: i64) -> CommunityResult<User> {
    users_db_operations::read_user_by_id(conn, user_id)?.ok_or_else(|| CommunityError::not_found("User"))
}

pub fn membership_state(conn: &Connection, user_id: i64, community_id: i64) -> CommunityResult<MembershipState> {
    Ok(MembershipState {
        is_following: membership_db_operations::is_following(conn, user_id, community_id)?,
        ban: membership_db_operations::read_ban(conn, user_id, community_id)?,
        tier: community_db_operations::read_moderator_tier(conn, user_id, community_id)?,
        request: membership_db_operations::read_follow_request(conn, user_id, community_id)?,
    })
}

/// Fails unless `user_id` holds at least `minimum` in the community. No row means no tier.
pub fn require_tier(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    minimum: ModeratorTier,
) -> CommunityResult<ModeratorTier> {
    match community_db_operations::read_moderator_tier(conn, user_id, community_id)? {
        Some(tier) if tier >= minimum => Ok(tier),
        _ => Err(CommunityError::Forbidden(format!(
            "This action requires the {} privilege.",
            minimum
        ))),
    }
}

fn ensure_not_banned(conn: &Connection, user_id: i64, community_id: i64) -> CommunityResult<()> {
    if membership_db_operations::is_banned(conn, user_id, community_id)? {
        return Err(CommunityError::Forbidden("You are banned from this community.".to_string()));
    }
    Ok(())
}

// ====================================================================
// =========================== FOLLOW TOGGLE ==========================
// ====================================================================

pub fn toggle_follow(conn: &mut Connection, user_id: i64, community: &Community) -> CommunityResult<FollowToggle> {
    let tx = begin_immediate(conn)?;

    let currently_following = membership_db_operations::is_following(&tx, user_id, community.id)?;
    if !currently_following {
        ensure_not_banned(&tx, user_id, community.id)?;
        if community.is_private {
            return Err(CommunityError::Forbidden(
                "This community is private. Send a follow request instead.".to_string(),
            ));
        }
    }

    membership_db_operations::ensure_follower_row(&tx, user_id, community.id)?;
    membership_db_operations::set_follow_flag(&tx, user_id, community.id, !currently_following)?;
    let followers_count = membership_db_operations::count_followers(&tx, community.id)?;
    tx.commit()?;

    log::info!(
        "User {} {} community '{}'",
        user_id,
        if currently_following { "unfollowed" } else { "followed" },
        community.name
    );
    Ok(FollowToggle { followers_count, is_following: !currently_following })
}

// ====================================================================
// ========================= FOLLOW REQUESTS ==========================
// ====================================================================

fn send_request_in(conn: &Connection, requester: &User, community: &Community) -> CommunityResult<Transition<bool>> {
    ensure_not_banned(conn, requester.id, community.id)?;
    if !community.is_private {
        return Err(CommunityError::Validation(
            "This community is public. Follow it directly.".to_string(),
        ));
    }
    if membership_db_operations::is_following(conn, requester.id, community.id)? {
        return Err(CommunityError::Validation("You already follow this community.".to_string()));
    }

    membership_db_operations::ensure_follow_request_row(conn, requester.id, community.id)?;
    let request = membership_db_operations::read_follow_request(conn, requester.id, community.id)?
        .ok_or_else(|| CommunityError::not_found("Follow request"))?;

    let mut events = Vec::new();
    if !request.send_status {
        let owner = community_db_operations::read_owner(conn, community.id)?
            .ok_or_else(|| CommunityError::not_found("Community owner"))?;
        membership_db_operations::mark_follow_request_sent(conn, request.id)?;
        events.push(CommunityEvent::FollowRequestSent {
            community_id: community.id,
            community_name: community.name.clone(),
            owner_id: owner.user_id,
            requester_username: requester.username.clone(),
        });
    }
    Ok(Transition { value: true, events })
}

/// Idempotent once the request has been sent: a repeat call notifies nobody.
pub fn send_follow_request(
    conn: &mut Connection,
    requester: &User,
    community: &Community,
) -> CommunityResult<Transition<bool>> {
    let tx = begin_immediate(conn)?;
    let transition = send_request_in(&tx, requester, community)?;
    tx.commit()?;
    Ok(transition)
}

pub fn cancel_follow_request(conn: &mut Connection, requester_id: i64, community: &Community) -> CommunityResult<()> {
    let tx = begin_immediate(conn)?;
    let request = membership_db_operations::read_pending_follow_request(&tx, requester_id, community.id)?
        .ok_or_else(|| CommunityError::not_found("Follow request"))?;
    membership_db_operations::delete_follow_request(&tx, request.id)?;
    tx.commit()?;
    Ok(())
}

/// A pending request is cancelled, anything else is (re)sent.
pub fn toggle_follow_request(
    conn: &mut Connection,
    requester: &User,
    community: &Community,
) -> CommunityResult<Transition<RequestToggle>> {
    let tx = begin_immediate(conn)?;
    let transition = match membership_db_operations::read_pending_follow_request(&tx, requester.id, community.id)? {
        Some(pending) => {
            membership_db_operations::delete_follow_request(&tx, pending.id)?;
            Transition { value: RequestToggle::Cancelled, events: Vec::new() }
        }
        None => {
            let sent = send_request_in(&tx, requester, community)?;
            Transition { value: RequestToggle::Sent { request_status: sent.value }, events: sent.events }
        }
    };
    tx.commit()?;
    Ok(transition)
}

pub fn pending_follow_requests(
    conn: &Connection,
    actor_id: i64,
    community: &Community,
) -> CommunityResult<Vec<FollowRequest>> {
    require_tier(conn, actor_id, community.id, ModeratorTier::Owner)?;
    Ok(membership_db_operations::list_pending_follow_requests(conn, community.id)?)
}

pub fn accept_follow_request(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    requester_id: i64,
) -> CommunityResult<()> {
    let tx = begin_immediate(conn)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Owner)?;
    let request = membership_db_operations::read_pending_follow_request(&tx, requester_id, community.id)?
        .ok_or_else(|| CommunityError::not_found("Follow request"))?;

    membership_db_operations::delete_follow_request(&tx, request.id)?;
    membership_db_operations::ensure_follower_row(&tx, requester_id, community.id)?;
    membership_db_operations::set_follow_flag(&tx, requester_id, community.id, true)?;
    tx.commit()?;

    log::info!("Follow request from user {} accepted in '{}'", requester_id, community.name);
    Ok(())
}

pub fn reject_follow_request(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    requester_id: i64,
) -> CommunityResult<()> {
    let tx = begin_immediate(conn)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Owner)?;
    let request = membership_db_operations::read_pending_follow_request(&tx, requester_id, community.id)?
        .ok_or_else(|| CommunityError::not_found("Follow request"))?;

    membership_db_operations::delete_follow_request(&tx, request.id)?;
    tx.commit()?;

    log::info!("Follow request from user {} rejected in '{}'", requester_id, community.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::community_helpers::{create_community, edit_community, NewCommunity};
    use crate::helper::notification_helpers::record_notification;
    use crate::models::db_operations::notifications_db_operations::count_notifications_for_user;
    use crate::models::db_operations::test_support::{insert_user, open_test_db};
    use pretty_assertions::assert_eq;

    fn community(conn: &mut Connection, owner: i64, name: &str, is_private: bool) -> Community {
        let form = NewCommunity { name: name.to_string(), description: String::new(), is_private };
        create_community(conn, owner, &form).unwrap()
    }

    fn user(conn: &Connection, id: i64) -> User {
        resolve_user(conn, id).unwrap()
    }

    #[test]
    fn toggling_twice_restores_state_and_count() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let devs = community(&mut conn, owner, "devs", false);

        let before = membership_db_operations::count_followers(&conn, devs.id).unwrap();
        let first = toggle_follow(&mut conn, bob, &devs).unwrap();
        assert_eq!(first, FollowToggle { followers_count: before + 1, is_following: true });

        let second = toggle_follow(&mut conn, bob, &devs).unwrap();
        assert_eq!(second, FollowToggle { followers_count: before, is_following: false });
        assert!(membership_db_operations::has_follower_row(&conn, bob, devs.id).unwrap());
    }

    #[test]
    fn private_community_requires_a_request() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);

        assert!(matches!(toggle_follow(&mut conn, bob, &secret), Err(CommunityError::Forbidden(_))));
    }

    #[test]
    fn banned_users_cannot_follow_but_keep_existing_flag() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let carl = insert_user(&conn, "carl");
        let devs = community(&mut conn, owner, "devs", false);

        toggle_follow(&mut conn, bob, &devs).unwrap();
        membership_db_operations::upsert_ban(&conn, bob, devs.id, "spam").unwrap();
        membership_db_operations::upsert_ban(&conn, carl, devs.id, "spam").unwrap();

        assert!(membership_db_operations::is_following(&conn, bob, devs.id).unwrap());
        assert!(matches!(toggle_follow(&mut conn, carl, &devs), Err(CommunityError::Forbidden(_))));
    }

    #[test]
    fn sending_twice_notifies_once() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);
        let requester = user(&conn, bob);

        let first = send_follow_request(&mut conn, &requester, &secret).unwrap();
        let second = send_follow_request(&mut conn, &requester, &secret).unwrap();
        for event in first.events.iter().chain(second.events.iter()) {
            record_notification(&conn, event).unwrap();
        }

        assert!(first.value && second.value);
        assert_eq!(first.events.len(), 1);
        assert!(second.events.is_empty());
        assert_eq!(count_notifications_for_user(&conn, owner).unwrap(), 1);
        let request = membership_db_operations::read_follow_request(&conn, bob, secret.id).unwrap().unwrap();
        assert!(request.send_status);
    }

    #[test]
    fn toggle_while_pending_cancels() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);
        let requester = user(&conn, bob);

        let sent = toggle_follow_request(&mut conn, &requester, &secret).unwrap();
        assert_eq!(sent.value, RequestToggle::Sent { request_status: true });
        assert_eq!(sent.events.len(), 1);

        let cancelled = toggle_follow_request(&mut conn, &requester, &secret).unwrap();
        assert_eq!(cancelled.value, RequestToggle::Cancelled);
        assert!(membership_db_operations::read_follow_request(&conn, bob, secret.id).unwrap().is_none());
    }

    #[test]
    fn cancelling_without_request_is_not_found() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);

        assert!(matches!(
            cancel_follow_request(&mut conn, bob, &secret),
            Err(CommunityError::NotFound(_))
        ));
    }

    #[test]
    fn accepting_creates_follow_and_clears_request() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);
        let requester = user(&conn, bob);
        send_follow_request(&mut conn, &requester, &secret).unwrap();

        accept_follow_request(&mut conn, owner, &secret, bob).unwrap();

        assert!(membership_db_operations::is_following(&conn, bob, secret.id).unwrap());
        assert!(membership_db_operations::read_follow_request(&conn, bob, secret.id).unwrap().is_none());
        assert!(pending_follow_requests(&conn, owner, &secret).unwrap().is_empty());
    }

    #[test]
    fn rejecting_leaves_follow_state_untouched() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let secret = community(&mut conn, owner, "secret", true);
        let requester = user(&conn, bob);
        send_follow_request(&mut conn, &requester, &secret).unwrap();

        reject_follow_request(&mut conn, owner, &secret, bob).unwrap();

        assert!(!membership_db_operations::has_follower_row(&conn, bob, secret.id).unwrap());
        assert!(membership_db_operations::read_follow_request(&conn, bob, secret.id).unwrap().is_none());
    }

    #[test]
    fn rejecting_keeps_an_existing_unfollowed_row() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let devs = community(&mut conn, owner, "devs", false);
        toggle_follow(&mut conn, bob, &devs).unwrap();
        toggle_follow(&mut conn, bob, &devs).unwrap();
        edit_community(&mut conn, owner, &devs, "", true).unwrap();
        let devs = resolve_community(&conn, "devs").unwrap();
        let requester = user(&conn, bob);
        send_follow_request(&mut conn, &requester, &devs).unwrap();

        reject_follow_request(&mut conn, owner, &devs, bob).unwrap();

        assert!(membership_db_operations::has_follower_row(&conn, bob, devs.id).unwrap());
        assert!(!membership_db_operations::is_following(&conn, bob, devs.id).unwrap());
        assert!(membership_db_operations::read_follow_request(&conn, bob, devs.id).unwrap().is_none());
    }

    #[test]
    fn only_the_owner_resolves_requests() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let mallory = insert_user(&conn, "mallory");
        let secret = community(&mut conn, owner, "secret", true);
        let requester = user(&conn, bob);
        send_follow_request(&mut conn, &requester, &secret).unwrap();

        assert!(matches!(
            accept_follow_request(&mut conn, mallory, &secret, bob),
            Err(CommunityError::Forbidden(_))
        ));
        assert!(matches!(
            pending_follow_requests(&conn, mallory, &secret),
            Err(CommunityError::Forbidden(_))
        ));
        assert_eq!(pending_follow_requests(&conn, owner, &secret).unwrap().len(), 1);
    }

    #[test]
    fn public_communities_reject_requests() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let devs = community(&mut conn, owner, "devs", false);
        let requester = user(&conn, bob);

        assert!(matches!(
            send_follow_request(&mut conn, &requester, &devs),
            Err(CommunityError::Validation(_))
        ));
    }

    #[test]
    fn membership_state_reports_independent_facts() {
        let mut conn = open_test_db();
        let owner = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let devs = community(&mut conn, owner, "devs", false);

        let owner_state = membership_state(&conn, owner, devs.id).unwrap();
        assert_eq!(owner_state.tier, Some(ModeratorTier::Owner));
        assert!(!owner_state.is_following);

        toggle_follow(&mut conn, bob, &devs).unwrap();
        membership_db_operations::upsert_ban(&conn, bob, devs.id, "spam").unwrap();
        let bob_state = membership_state(&conn, bob, devs.id).unwrap();
        assert!(bob_state.is_following);
        assert_eq!(bob_state.ban.map(|b| b.reason), Some("spam".to_string()));
        assert_eq!(bob_state.tier, None);
    }
}
