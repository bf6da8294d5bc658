use crate::error::{CommunityError, CommunityResult};
use crate::helper::sanitization_helpers::{sanitize_markdown_content, strip_all_html};
use crate::models::db_operations::content_db_operations;
use crate::models::{Comment, CommentTarget, Commentable, Publication, Thread};
use rusqlite::Connection;

/// Loads whatever the target points at, behind the `Commentable` capability.
fn resolve_target(conn: &Connection, target: CommentTarget) -> CommunityResult<Box<dyn Commentable>> {
    match target {
        CommentTarget::Thread(id) => match content_db_operations::read_thread(conn, id)? {
            Some(thread) => Ok(Box::new(thread)),
            None => Err(CommunityError::not_found("Thread")),
        },
        CommentTarget::Publication(id) => match content_db_operations::read_publication(conn, id)? {
            Some(publication) => Ok(Box::new(publication)),
            None => Err(CommunityError::not_found("Publication")),
        },
    }
}

pub fn create_thread(conn: &Connection, author_id: i64, title: &str, context: &str) -> CommunityResult<Thread> {
    let title = strip_all_html(title.trim());
    if title.is_empty() {
        return Err(CommunityError::Validation("Thread title is required.".to_string()));
    }
    let id = content_db_operations::create_thread(conn, author_id, &title, &sanitize_markdown_content(context))?;
    content_db_operations::read_thread(conn, id)?.ok_or_else(|| CommunityError::not_found("Thread"))
}

pub fn publication_detail(conn: &Connection, publication_id: i64) -> CommunityResult<(Publication, Vec<Comment>)> {
    let publication = content_db_operations::read_publication(conn, publication_id)?
        .ok_or_else(|| CommunityError::not_found("Publication"))?;
    let comments = content_db_operations::list_comments(conn, publication.target())?;
    Ok((publication, comments))
}

/// The comment takes the title of whatever it is attached to.
pub fn add_comment(conn: &Connection, user_id: i64, target: CommentTarget, context: &str) -> CommunityResult<Comment> {
    let context = sanitize_markdown_content(context.trim());
    if context.is_empty() {
        return Err(CommunityError::Validation("Comment text is required.".to_string()));
    }
    let commentable = resolve_target(conn, target)?;
    let id = content_db_operations::create_comment(conn, user_id, commentable.title(), &context, commentable.target())?;
    log::debug!("User {} commented on {} {}", user_id, target.kind(), commentable.id());
    content_db_operations::read_comment(conn, id)?.ok_or_else(|| CommunityError::not_found("Comment"))
}

pub fn list_comments(conn: &Connection, target: CommentTarget) -> CommunityResult<Vec<Comment>> {
    resolve_target(conn, target)?;
    Ok(content_db_operations::list_comments(conn, target)?)
}

pub fn remove_comment(conn: &Connection, user_id: i64, comment_id: i64) -> CommunityResult<()> {
    let comment = content_db_operations::read_comment(conn, comment_id)?
        .ok_or_else(|| CommunityError::not_found("Comment"))?;
    if comment.user_id != user_id {
        return Err(CommunityError::Forbidden("Only the author can remove a comment.".to_string()));
    }
    content_db_operations::delete_comment(conn, comment_id)?;
    Ok(())
}
