//! User-to-user follows and direct messages.

use crate::error::{CommunityError, CommunityResult};
use crate::helper::membership_helpers::begin_immediate;
use crate::helper::sanitization_helpers::sanitize_markdown_content;
use crate::models::db_operations::{social_db_operations, users_db_operations};
use crate::models::{ConversationSummary, DirectMessage, User, UserSummary};
use rusqlite::Connection;
use serde::Serialize;

const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserFollowToggle {
    pub followers_count: i64,
    pub is_following: bool,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub user: UserSummary,
    pub followers_count: i64,
    pub followings_count: i64,
    /// Whether the viewer follows this user. Absent for anonymous viewers.
    pub is_following: Option<bool>,
}

pub fn resolve_username(conn: &Connection, username: &str) -> CommunityResult<User> {
    users_db_operations::read_user_by_username(conn, username.trim())?
        .filter(|user| user.is_active)
        .ok_or_else(|| CommunityError::not_found("User"))
}

fn summary(user: &User) -> UserSummary {
    UserSummary { id: user.id, username: user.username.clone() }
}

pub fn all_users(conn: &Connection, viewer_id: Option<i64>) -> CommunityResult<Vec<UserSummary>> {
    Ok(social_db_operations::list_user_summaries(conn, viewer_id)?)
}

pub fn user_page(conn: &Connection, username: &str, viewer_id: Option<i64>) -> CommunityResult<UserPage> {
    let user = resolve_username(conn, username)?;
    let is_following = match viewer_id {
        Some(viewer) if viewer != user.id => Some(social_db_operations::is_following_user(conn, viewer, user.id)?),
        Some(_) => Some(false),
        None => None,
    };
    Ok(UserPage {
        followers_count: social_db_operations::count_user_followers(conn, user.id)?,
        followings_count: social_db_operations::count_user_followings(conn, user.id)?,
        user: summary(&user),
        is_following,
    })
}

// ====================================================================
// =========================== USER FOLLOWS ===========================
// ====================================================================

/// Flips the follow flag from `follower_id` to `username`, creating the row on first use.
pub fn toggle_user_follow(conn: &mut Connection, follower_id: i64, username: &str) -> CommunityResult<UserFollowToggle> {
    let tx = begin_immediate(conn)?;
    let target = resolve_username(&tx, username)?;
    if target.id == follower_id {
        return Err(CommunityError::Validation("You can not follow yourself.".to_string()));
    }

    social_db_operations::ensure_user_follow_row(&tx, follower_id, target.id)?;
    let now_following = !social_db_operations::is_following_user(&tx, follower_id, target.id)?;
    social_db_operations::set_user_follow_flag(&tx, follower_id, target.id, now_following)?;
    let followers_count = social_db_operations::count_user_followers(&tx, target.id)?;
    tx.commit()?;

    log::debug!(
        "User {} {} user {}",
        follower_id,
        if now_following { "followed" } else { "unfollowed" },
        target.id
    );
    Ok(UserFollowToggle { followers_count, is_following: now_following })
}

pub fn user_followers(conn: &Connection, username: &str) -> CommunityResult<(UserSummary, Vec<UserSummary>)> {
    let user = resolve_username(conn, username)?;
    let followers = social_db_operations::list_user_followers(conn, user.id)?;
    Ok((summary(&user), followers))
}

pub fn user_followings(conn: &Connection, username: &str) -> CommunityResult<(UserSummary, Vec<UserSummary>)> {
    let user = resolve_username(conn, username)?;
    let followings = social_db_operations::list_user_followings(conn, user.id)?;
    Ok((summary(&user), followings))
}

// ====================================================================
// ========================= DIRECT MESSAGES ==========================
// ====================================================================

pub fn send_direct_message(
    conn: &Connection,
    sender_id: i64,
    recipient_username: &str,
    body: &str,
) -> CommunityResult<DirectMessage> {
    let body = sanitize_markdown_content(body.trim());
    if body.is_empty() {
        return Err(CommunityError::Validation("Message text is required.".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(CommunityError::Validation(format!(
            "Messages are limited to {} characters.",
            MAX_MESSAGE_LEN
        )));
    }
    let recipient = resolve_username(conn, recipient_username)?;
    if recipient.id == sender_id {
        return Err(CommunityError::Validation("You can not message yourself.".to_string()));
    }

    let id = social_db_operations::create_direct_message(conn, sender_id, recipient.id, &body)?;
    log::debug!("User {} sent message {} to user {}", sender_id, id, recipient.id);
    social_db_operations::read_direct_message(conn, id)?.ok_or_else(|| CommunityError::not_found("Message"))
}

/// Opens the chat with `partner_username`. Messages the partner sent are marked read.
pub fn open_conversation(
    conn: &mut Connection,
    user_id: i64,
    partner_username: &str,
) -> CommunityResult<(UserSummary, Vec<DirectMessage>)> {
    let tx = begin_immediate(conn)?;
    let partner = resolve_username(&tx, partner_username)?;
    if partner.id == user_id {
        return Err(CommunityError::Validation("You can not chat with yourself.".to_string()));
    }
    let messages = social_db_operations::list_conversation(&tx, user_id, partner.id)?;
    social_db_operations::mark_conversation_read(&tx, user_id, partner.id)?;
    tx.commit()?;
    Ok((summary(&partner), messages))
}

pub fn conversations(conn: &Connection, user_id: i64) -> CommunityResult<Vec<ConversationSummary>> {
    Ok(social_db_operations::list_conversations(conn, user_id)?)
}
