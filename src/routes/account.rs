use crate::error::CommunityError;
use crate::helper::{account_helpers, form_helpers, notification_helpers};
use crate::middleware::{end_session, start_session, AuthenticatedUser};
use crate::models::db_operations::notifications_db_operations;
use crate::DbPool;
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn config_account(cfg: &mut web::ServiceConfig) {
    cfg.route("/register/", web::post().to(handle_register))
        .route("/login/", web::post().to(handle_login))
        .route("/logout/", web::post().to(handle_logout))
        .route("/notifications/", web::get().to(list_notifications))
        .route("/notifications/{id}/", web::delete().to(delete_notification));
}

async fn handle_register(
    session: Session,
    pool: web::Data<DbPool>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let username = form_helpers::required_field(&parsed, "username")?;
    let email = form_helpers::required_field(&parsed, "email")?;
    let password = form_helpers::required_field(&parsed, "password")?;

    let conn = pool.get()?;
    let user = account_helpers::register(&conn, username, email, password)?;
    start_session(&session, &user)?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "user": user })))
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let username = form_helpers::required_field(&parsed, "username")?;
    let password = form_helpers::required_field(&parsed, "password")?;

    let conn = pool.get()?;
    let user = account_helpers::login(&conn, username, password)?;
    start_session(&session, &user)?;
    log::info!("User '{}' logged in", user.username);
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "user": user })))
}

async fn handle_logout(session: Session) -> HttpResponse {
    end_session(&session);
    HttpResponse::Ok().json(json!({ "status": "success" }))
}

async fn list_notifications(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let notifications = notification_helpers::list_notifications(&conn, actor.user_id)?;
    Ok(HttpResponse::Ok().json(notifications))
}

async fn delete_notification(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    id: web::Path<i64>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    if notifications_db_operations::delete_notification(&conn, id.into_inner(), actor.user_id)? == 0 {
        return Err(CommunityError::not_found("Notification"));
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}
