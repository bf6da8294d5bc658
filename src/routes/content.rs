use crate::error::CommunityError;
use crate::helper::{content_helpers, form_helpers};
use crate::middleware::AuthenticatedUser;
use crate::models::CommentTarget;
use crate::DbPool;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

pub fn config_content(cfg: &mut web::ServiceConfig) {
    cfg.route("/threads/", web::post().to(create_thread))
        .route("/threads/{id}/comments/", web::get().to(thread_comments))
        .route("/publications/{id}/", web::get().to(publication_detail))
        .route("/comments/", web::post().to(add_comment))
        .route("/comments/{id}/", web::delete().to(remove_comment));
}

#[derive(Deserialize)]
struct NewComment {
    target: CommentTarget,
    context: String,
}

async fn create_thread(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    form: web::Bytes,
) -> Result<HttpResponse, CommunityError> {
    let parsed = form_helpers::parse_form(&form)?;
    let title = form_helpers::required_field(&parsed, "title")?;
    let context = form_helpers::optional_field(&parsed, "context");

    let conn = pool.get()?;
    let thread = content_helpers::create_thread(&conn, actor.user_id, title, context)?;
    Ok(HttpResponse::Created().json(thread))
}

async fn thread_comments(pool: web::Data<DbPool>, id: web::Path<i64>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let comments = content_helpers::list_comments(&conn, CommentTarget::Thread(id.into_inner()))?;
    Ok(HttpResponse::Ok().json(comments))
}

async fn publication_detail(pool: web::Data<DbPool>, id: web::Path<i64>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let (publication, comments) = content_helpers::publication_detail(&conn, id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "publication": publication, "comments": comments })))
}

async fn add_comment(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<NewComment>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let comment = content_helpers::add_comment(&conn, actor.user_id, body.target, &body.context)?;
    Ok(HttpResponse::Created().json(comment))
}

async fn remove_comment(
    actor: AuthenticatedUser,
    pool: web::Data<DbPool>,
    id: web::Path<i64>,
) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    content_helpers::remove_comment(&conn, actor.user_id, id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}
