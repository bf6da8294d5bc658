use crate::error::CommunityError;
use crate::helper::{form_helpers, social_helpers};
use crate::middleware::AuthenticatedUser;
use crate::DbPool;
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn config_social(cfg: &mut web::ServiceConfig) {
    cfg.route("/make-friends/", web::get().to(all_users))
        .route("/user-chats/", web::get().to(chat_list))
        .service(
            web::scope("/user-page/{username}")
                .route("/", web::get().to(user_page))
                .route("/follow/", web::post().to(toggle_follow))
                .route("/followers/", web::get().to(followers_list))
                .route("/followings/", web::get().to(followings_list))
                .route("/chat/", web::get().to(conversation))
                .route("/chat/", web::post().to(send_message)),
        );
}

// ====================================================================
// ============================ USER PAGE =============================
// ====================================================================

async fn all_users(session: Session, pool: web::Data<DbPool>) -> Result<HttpResponse, CommunityError> {
    let viewer = AuthenticatedUser::from_session(&session);
    let conn = pool.get()?;
    let users = social_helpers::all_users(&conn, viewer.map(|v| v.user_id))?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

async fn user_page(
    session: Session,
    pool: web::Data<DbPool>,
    username: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let viewer = AuthenticatedUser::from_session(&session);
    let conn = pool.get()?;
    let page = social_helpers::user_page(&conn, &username, viewer.map(|v| v.user_id))?;
    Ok(HttpResponse::Ok().json(page))
}

async fn toggle_follow(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    username: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let mut conn = pool.get()?;
    let toggled = social_helpers::toggle_user_follow(&mut conn, actor.user_id, &username)?;
    Ok(HttpResponse::Ok().json(toggled))
}

async fn followers_list(pool: web::Data<DbPool>, username: web::Path<String>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let (user, followers) = social_helpers::user_followers(&conn, &username)?;
    Ok(HttpResponse::Ok().json(json!({ "user": user, "followers": followers })))
}

async fn followings_list(pool: web::Data<DbPool>, username: web::Path<String>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let (user, followings) = social_helpers::user_followings(&conn, &username)?;
    Ok(HttpResponse::Ok().json(json!({ "user": user, "followings": followings })))
}

// ====================================================================
// ============================== CHATS ===============================
// ====================================================================

async fn chat_list(actor: AuthenticatedUser, pool: web::Data<DbPool>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let chats = social_helpers::conversations(&conn, actor.user_id)?;
    Ok(HttpResponse::Ok().json(json!({ "chats": chats })))
}

async fn conversation(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    username: web::Path<String>,
) -> Result<HttpResponse, CommunityError> {
    let mut conn = pool.get()?;
    let (partner, messages) = social_helpers::open_conversation(&mut conn, actor.user_id, &username)?;
    Ok(HttpResponse::Ok().json(json!({ "partner": partner, "messages": messages })))
}

async fn send_message(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    username: web::Path<String>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let body = form_helpers::required_field(&parsed, "body")?;

    let conn = pool.get()?;
    let message = social_helpers::send_direct_message(&conn, actor.user_id, &username, body)?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "message": message })))
}
