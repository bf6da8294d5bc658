use crate::error::{conflict_on_unique, CommunityError, CommunityResult};
use crate::helper::membership_helpers::{begin_immediate, membership_state, require_tier, resolve_community};
use crate::helper::sanitization_helpers::{is_valid_community_name, sanitize_markdown_content, strip_all_html};
use crate::models::db_operations::{community_db_operations, content_db_operations, membership_db_operations};
use crate::models::{
    BlackListEntry, Community, CommunityFollower, CommunitySummary, Moderator, ModeratorTier, Publication,
};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const RECENT_ACTIVITY_HOURS: i64 = 48;

#[derive(Debug, Deserialize)]
pub struct NewCommunity {
    pub name: String,
    pub description: String,
    pub is_private: bool,
}

/// What the community page shows to one actor.
#[derive(Debug, Serialize)]
pub struct CommunityDetail {
    pub community: Community,
    pub owner_id: Option<i64>,
    pub followers_count: i64,
    pub is_following: bool,
    pub request_status: bool,
    pub is_owner: bool,
    pub is_banned: bool,
    pub tier: Option<ModeratorTier>,
}

#[derive(Debug, Serialize)]
pub struct AdminPanel {
    pub community: Community,
    pub followers_count: i64,
    pub last_actions: Vec<Publication>,
    pub all_posts: Vec<Publication>,
}

#[derive(Debug, Serialize)]
pub struct ManagersList {
    pub owner: Option<Moderator>,
    pub admins: Vec<Moderator>,
    pub moderators: Vec<Moderator>,
}

#[derive(Debug, Serialize)]
pub struct UsersManagement {
    pub banned_users: Vec<BlackListEntry>,
    pub followers: Vec<CommunityFollower>,
}

// ====================================================================
// ============================ LIFECYCLE =============================
// ====================================================================

/// Creates the community and makes `owner_id` its owner in one transaction.
pub fn create_community(conn: &mut Connection, owner_id: i64, form: &NewCommunity) -> CommunityResult<Community> {
    let name = form.name.trim();
    if !is_valid_community_name(name) {
        return Err(CommunityError::Validation(
            "Community names may only contain letters, digits, '_' and '-'.".to_string(),
        ));
    }
    let description = strip_all_html(form.description.trim());

    let tx = begin_immediate(conn)?;
    let community_id = community_db_operations::create_community(&tx, name, &description, form.is_private)
        .map_err(|e| conflict_on_unique(e, "A community with this name already exists."))?;
    community_db_operations::upsert_moderator(&tx, owner_id, community_id, ModeratorTier::Owner)?;
    let community = resolve_community(&tx, name)?;
    tx.commit()?;

    log::info!("User {} created community '{}' (id {})", owner_id, community.name, community.id);
    Ok(community)
}

pub fn list_communities(conn: &Connection) -> CommunityResult<Vec<CommunitySummary>> {
    Ok(community_db_operations::read_all_communities(conn)?)
}

pub fn community_detail(conn: &Connection, name: &str, actor_id: Option<i64>) -> CommunityResult<CommunityDetail> {
    let community = resolve_community(conn, name)?;
    let owner_id = community_db_operations::read_owner(conn, community.id)?.map(|m| m.user_id);
    let followers_count = membership_db_operations::count_followers(conn, community.id)?;

    let mut detail = CommunityDetail {
        community,
        owner_id,
        followers_count,
        is_following: false,
        request_status: false,
        is_owner: false,
        is_banned: false,
        tier: None,
    };
    if let Some(actor_id) = actor_id {
        let state = membership_state(conn, actor_id, detail.community.id)?;
        detail.is_following = state.is_following;
        detail.request_status = state.request.map(|r| r.send_status && !r.accepted).unwrap_or(false);
        detail.is_owner = state.tier == Some(ModeratorTier::Owner);
        detail.is_banned = state.ban.is_some();
        detail.tier = state.tier;
    }
    Ok(detail)
}

pub fn edit_community(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    description: &str,
    is_private: bool,
) -> CommunityResult<Community> {
    let tx = begin_immediate(conn)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Owner)?;
    community_db_operations::update_community(&tx, community.id, &strip_all_html(description.trim()), is_private)?;
    let updated = resolve_community(&tx, &community.name)?;
    tx.commit()?;

    log::info!("Community '{}' updated by user {}", community.name, actor_id);
    Ok(updated)
}

pub fn delete_community(conn: &mut Connection, actor_id: i64, community: &Community) -> CommunityResult<()> {
    let tx = begin_immediate(conn)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Owner)?;
    community_db_operations::delete_community(&tx, community.id)?;
    tx.commit()?;

    log::warn!("Community '{}' deleted by user {}", community.name, actor_id);
    Ok(())
}

// ====================================================================
// ============================ LISTINGS ==============================
// ====================================================================

pub fn followers(conn: &Connection, community: &Community) -> CommunityResult<Vec<CommunityFollower>> {
    Ok(membership_db_operations::list_followers(conn, community.id)?)
}

pub fn admin_panel(conn: &Connection, actor_id: i64, community: &Community) -> CommunityResult<AdminPanel> {
    require_tier(conn, actor_id, community.id, ModeratorTier::Owner)?;

    let since = Utc::now() - Duration::hours(RECENT_ACTIVITY_HOURS);
    let last_actions = content_db_operations::list_community_publications(conn, community.id, None, Some(since))?;
    let all_posts = match community_db_operations::read_owner(conn, community.id)? {
        Some(owner) => content_db_operations::list_community_publications(conn, community.id, Some(owner.user_id), None)?,
        None => Vec::new(),
    };

    Ok(AdminPanel {
        community: community.clone(),
        followers_count: membership_db_operations::count_followers(conn, community.id)?,
        last_actions,
        all_posts,
    })
}

pub fn managers_list(conn: &Connection, actor_id: i64, community: &Community) -> CommunityResult<ManagersList> {
    require_tier(conn, actor_id, community.id, ModeratorTier::Moderator)?;
    Ok(ManagersList {
        owner: community_db_operations::read_owner(conn, community.id)?,
        admins: community_db_operations::list_moderators_with_tier(conn, community.id, ModeratorTier::Admin)?,
        moderators: community_db_operations::list_moderators_with_tier(conn, community.id, ModeratorTier::Moderator)?,
    })
}

pub fn users_management(conn: &Connection, actor_id: i64, community: &Community) -> CommunityResult<UsersManagement> {
    require_tier(conn, actor_id, community.id, ModeratorTier::Moderator)?;
    Ok(UsersManagement {
        banned_users: membership_db_operations::list_bans(conn, community.id)?,
        followers: membership_db_operations::list_followers(conn, community.id)?,
    })
}

// ====================================================================
// =========================== PUBLISHING =============================
// ====================================================================

/// Owner-only. The publication is created and attached in one transaction.
pub fn publish_post(
    conn: &mut Connection,
    actor_id: i64,
    community: &Community,
    title: &str,
    content: &str,
) -> CommunityResult<Publication> {
    let title = strip_all_html(title.trim());
    if title.is_empty() {
        return Err(CommunityError::Validation("Publication title is required.".to_string()));
    }
    let content = sanitize_markdown_content(content);

    let tx = begin_immediate(conn)?;
    require_tier(&tx, actor_id, community.id, ModeratorTier::Owner)?;
    let publication_id = content_db_operations::create_publication(&tx, actor_id, &title, &content)?;
    content_db_operations::attach_publication(&tx, community.id, publication_id)?;
    let publication = content_db_operations::read_publication(&tx, publication_id)?
        .ok_or_else(|| CommunityError::not_found("Publication"))?;
    tx.commit()?;

    log::info!("User {} published '{}' in '{}'", actor_id, publication.title, community.name);
    Ok(publication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::membership_helpers::toggle_follow;
    use crate::helper::privilege_helpers::grant_privilege;
    use crate::models::db_operations::test_support::{insert_user, open_test_db};
    use pretty_assertions::assert_eq;

    fn form(name: &str, is_private: bool) -> NewCommunity {
        NewCommunity { name: name.to_string(), description: "<i>Builders</i> welcome".to_string(), is_private }
    }

    #[test]
    fn creator_becomes_the_only_owner() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let community = create_community(&mut conn, alice, &form("robotics", true)).unwrap();

        assert_eq!(community.description, "Builders welcome");
        let owner = community_db_operations::read_owner(&conn, community.id).unwrap().unwrap();
        assert_eq!(owner.user_id, alice);
        assert_eq!(owner.tier, ModeratorTier::Owner);
    }

    #[test]
    fn duplicate_and_malformed_names_are_rejected() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        create_community(&mut conn, alice, &form("robotics", false)).unwrap();

        assert!(matches!(
            create_community(&mut conn, alice, &form("robotics", false)),
            Err(CommunityError::Conflict(_))
        ));
        assert!(matches!(
            create_community(&mut conn, alice, &form("robo tics", false)),
            Err(CommunityError::Validation(_))
        ));
        assert_eq!(list_communities(&conn).unwrap().len(), 1);
    }

    #[test]
    fn detail_reflects_the_actor() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();
        toggle_follow(&mut conn, bob, &community).unwrap();

        let for_bob = community_detail(&conn, "devs", Some(bob)).unwrap();
        assert!(for_bob.is_following);
        assert!(!for_bob.is_owner);
        assert_eq!(for_bob.followers_count, 1);
        assert_eq!(for_bob.owner_id, Some(alice));

        let anonymous = community_detail(&conn, "devs", None).unwrap();
        assert!(!anonymous.is_following);
        assert!(matches!(community_detail(&conn, "nope", None), Err(CommunityError::NotFound(_))));
    }

    #[test]
    fn only_the_owner_edits() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();
        grant_privilege(&mut conn, alice, &community, bob, ModeratorTier::Admin).unwrap();

        assert!(matches!(
            edit_community(&mut conn, bob, &community, "hijacked", true),
            Err(CommunityError::Forbidden(_))
        ));
        let updated = edit_community(&mut conn, alice, &community, "Hardware people", true).unwrap();
        assert!(updated.is_private);
        assert_eq!(updated.description, "Hardware people");
    }

    #[test]
    fn admin_panel_lists_owner_posts() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();
        publish_post(&mut conn, alice, &community, "Kickoff", "Meet on <b>Friday</b>").unwrap();

        let panel = admin_panel(&conn, alice, &community).unwrap();
        assert_eq!(panel.last_actions.len(), 1);
        assert_eq!(panel.all_posts.len(), 1);
        assert_eq!(panel.all_posts[0].content, "Meet on &lt;b&gt;Friday&lt;/b&gt;");
    }

    #[test]
    fn only_the_owner_publishes() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();

        assert!(matches!(
            publish_post(&mut conn, bob, &community, "Spam", "spam"),
            Err(CommunityError::Forbidden(_))
        ));
    }

    #[test]
    fn managers_are_grouped_by_tier() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let carl = insert_user(&conn, "carl");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();
        grant_privilege(&mut conn, alice, &community, bob, ModeratorTier::Admin).unwrap();
        grant_privilege(&mut conn, alice, &community, carl, ModeratorTier::Moderator).unwrap();

        let managers = managers_list(&conn, carl, &community).unwrap();
        assert_eq!(managers.owner.map(|o| o.user_id), Some(alice));
        assert_eq!(managers.admins.len(), 1);
        assert_eq!(managers.moderators[0].username, "carl");
    }

    #[test]
    fn deleting_cascades_memberships() {
        let mut conn = open_test_db();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        let community = create_community(&mut conn, alice, &form("devs", false)).unwrap();
        toggle_follow(&mut conn, bob, &community).unwrap();

        delete_community(&mut conn, alice, &community).unwrap();

        assert!(!membership_db_operations::has_follower_row(&conn, bob, community.id).unwrap());
        assert!(list_communities(&conn).unwrap().is_empty());
    }
}
