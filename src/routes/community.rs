use crate::error::CommunityError;
use crate::helper::community_helpers::{self, NewCommunity};
use crate::helper::membership_helpers::{self, RequestToggle};
use crate::helper::notification_helpers::dispatch_all;
use crate::helper::{form_helpers, moderation_helpers, privilege_helpers};
use crate::middleware::AuthenticatedUser;
use crate::models::ModeratorTier;
use crate::{AppState, DbPool};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

pub fn config_community(cfg: &mut web::ServiceConfig) {
    cfg.route("/community/create/", web::post().to(create_community))
        .service(
            web::scope("/community/name-{name}")
                .route("/", web::get().to(community_page))
                .route("/", web::post().to(community_action))
                .route("/followers/", web::get().to(followers_list))
                .route("/follow-requests/", web::get().to(follow_requests_list))
                .route("/follow-requests/", web::post().to(resolve_follow_request))
                .route("/admin-panel/", web::get().to(admin_panel))
                .route("/admin-panel/", web::post().to(edit_community))
                .route("/delete/", web::post().to(delete_community))
                .route("/users-management/", web::get().to(users_management))
                .route("/users-management/", web::post().to(users_management_action)),
        );
}

#[derive(Deserialize)]
struct ManagementQuery {
    managers_list: Option<String>,
}

/// Body of the users-management endpoint. Field names follow what the admin panel script sends.
#[derive(Deserialize)]
struct UsersManagementRequest {
    action: String,
    follower_id: Option<i64>,
    reason: Option<String>,
    instance: Option<String>,
    #[serde(rename = "bannedUserId")]
    banned_user_id: Option<i64>,
    privilege: Option<String>,
    manager_id: Option<i64>,
}

// ====================================================================
// ========================= COMMUNITY PAGE ===========================
// ====================================================================

async fn create_community(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let new_community = NewCommunity {
        name: form_helpers::required_field(&parsed, "name")?.to_string(),
        description: form_helpers::optional_field(&parsed, "description").to_string(),
        is_private: form_helpers::checkbox_field(&parsed, "is_private"),
    };

    let mut conn = pool.get()?;
    let community = community_helpers::create_community(&mut conn, actor.user_id, &new_community)?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "community": community })))
}

async fn community_page(
    session: Session,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let actor = AuthenticatedUser::from_session(&session);
    let conn = pool.get()?;
    let detail = community_helpers::community_detail(&conn, &name, actor.map(|a| a.user_id))?;
    Ok(HttpResponse::Ok().json(detail))
}

/// Dispatches the named actions a community page can submit.
async fn community_action(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    name: web::Path<String>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let action = form_helpers::required_field(&parsed, "action")?;

    let mut conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;

    match action {
        "follow" | "unfollow" => {
            let toggled = membership_helpers::toggle_follow(&mut conn, actor.user_id, &community)?;
            Ok(HttpResponse::Ok().json(toggled))
        }
        "send_request" | "remove_request" => {
            let requester = membership_helpers::resolve_user(&conn, actor.user_id)?;
            let transition = membership_helpers::toggle_follow_request(&mut conn, &requester, &community)?;
            drop(conn);
            dispatch_all(state.dispatcher.as_ref(), &transition.events);

            Ok(match transition.value {
                RequestToggle::Cancelled => HttpResponse::Ok().json(json!({ "success": true })),
                RequestToggle::Sent { request_status } => {
                    HttpResponse::Ok().json(json!({ "request_status": request_status }))
                }
            })
        }
        "new_post" => {
            let title = form_helpers::required_field(&parsed, "title")?;
            let content = form_helpers::optional_field(&parsed, "content");
            let publication = community_helpers::publish_post(&mut conn, actor.user_id, &community, title, content)?;
            Ok(HttpResponse::Created().json(json!({ "status": "success", "publication": publication })))
        }
        other => Err(CommunityError::Validation(format!("Unknown action '{}'.", other))),
    }
}

async fn followers_list(pool: web::Data<DbPool>, name: web::Path<String>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    let followers = community_helpers::followers(&conn, &community)?;
    Ok(HttpResponse::Ok().json(json!({ "community": community, "followers": followers })))
}

// ====================================================================
// ========================= FOLLOW REQUESTS ==========================
// ====================================================================

async fn follow_requests_list(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    let requests = membership_helpers::pending_follow_requests(&conn, actor.user_id, &community)?;
    Ok(HttpResponse::Ok().json(json!({ "community": community, "follow_requests": requests })))
}

async fn resolve_follow_request(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let action = form_helpers::required_field(&parsed, "action")?;
    let requester_id = form_helpers::id_field(&parsed, "user")?;

    let mut conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    match action {
        "accept" => membership_helpers::accept_follow_request(&mut conn, actor.user_id, &community, requester_id)?,
        "reject" => membership_helpers::reject_follow_request(&mut conn, actor.user_id, &community, requester_id)?,
        other => return Err(CommunityError::Validation(format!("Unknown action '{}'.", other))),
    }
    Ok(HttpResponse::Ok().json(json!({ "success": "ok" })))
}

// ====================================================================
// =========================== ADMIN PANEL ============================
// ====================================================================

async fn admin_panel(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    let panel = community_helpers::admin_panel(&conn, actor.user_id, &community)?;
    Ok(HttpResponse::Ok().json(panel))
}

async fn edit_community(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let description = form_helpers::optional_field(&parsed, "description");
    let is_private = form_helpers::checkbox_field(&parsed, "is_private");

    let mut conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    let updated = community_helpers::edit_community(&mut conn, actor.user_id, &community, description, is_private)?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "community": updated })))
}

async fn delete_community(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let mut conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    community_helpers::delete_community(&mut conn, actor.user_id, &community)?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

// ====================================================================
// ======================== USERS MANAGEMENT ==========================
// ====================================================================

async fn users_management(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    query: web::Query<ManagementQuery>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let community = membership_helpers::resolve_community(&conn, &name)?;
    if query.managers_list.is_some() {
        let managers = community_helpers::managers_list(&conn, actor.user_id, &community)?;
        return Ok(HttpResponse::Ok().json(managers));
    }
    let listing = community_helpers::users_management(&conn, actor.user_id, &community)?;
    Ok(HttpResponse::Ok().json(listing))
}

async fn users_management_action(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    body: web::Json<UsersManagementRequest>,
) -> Result<HttpResponse, CommunityError> {
    let request = body.into_inner();
    if let Some(instance) = request.instance.as_deref() {
        if !instance.trim().is_empty() && instance.trim() != name.as_str() {
            return Err(CommunityError::Validation(
                "The instance does not match the community in the URL.".to_string(),
            ));
        }
    }
    let mut conn = pool.get()?;

    match request.action.as_str() {
        "put_ban" => {
            moderation_helpers::ban(
                &mut conn,
                actor.user_id,
                request.follower_id,
                request.reason.as_deref(),
                request.instance.as_deref(),
            )?;
        }
        "remove_ban" => {
            moderation_helpers::unban(&mut conn, actor.user_id, request.banned_user_id, Some(name.as_str()))?;
        }
        "grant_privileges" => {
            let target = request
                .follower_id
                .ok_or_else(|| CommunityError::Validation("Missing follower_id".to_string()))?;
            let tier: ModeratorTier = request
                .privilege
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(CommunityError::Validation)?;
            let community = membership_helpers::resolve_community(&conn, &name)?;
            privilege_helpers::grant_privilege(&mut conn, actor.user_id, &community, target, tier)?;
        }
        "remove_privileges" => {
            let manager_id = request
                .manager_id
                .ok_or_else(|| CommunityError::Validation("Missing manager_id".to_string()))?;
            let community = membership_helpers::resolve_community(&conn, &name)?;
            privilege_helpers::revoke_privilege(&mut conn, actor.user_id, &community, manager_id)?;
        }
        other => return Err(CommunityError::Validation(format!("Unknown action '{}'.", other))),
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}
