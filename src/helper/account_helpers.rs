use crate::error::{conflict_on_unique, CommunityError, CommunityResult};
use crate::models::db_operations::users_db_operations;
use crate::models::User;
use rusqlite::Connection;

const MIN_PASSWORD_LEN: usize = 8;

fn validate_registration(username: &str, email: &str, password: &str) -> CommunityResult<()> {
    if username.len() < 3
        || username.len() > 32
        || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CommunityError::Validation(
            "Username must be 3-32 characters of letters, digits or '_'.".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(CommunityError::Validation("A valid email is required.".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(CommunityError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn register(conn: &Connection, username: &str, email: &str, password: &str) -> CommunityResult<User> {
    let username = username.trim();
    let email = email.trim();
    validate_registration(username, email, password)?;

    let user_id = users_db_operations::create_user(conn, username, email, password)
        .map_err(|e| conflict_on_unique(e, "This username is already taken."))?;
    log::info!("Registered user '{}' (id {})", username, user_id);
    users_db_operations::read_user_by_id(conn, user_id)?.ok_or_else(|| CommunityError::not_found("User"))
}

pub fn login(conn: &Connection, username: &str, password: &str) -> CommunityResult<User> {
    match users_db_operations::verify_credentials(conn, username.trim(), password) {
        Some(user) => {
            if let Err(e) = users_db_operations::update_last_login_time(conn, user.id) {
                log::error!("Failed to update last login time for user {}: {}", user.id, e);
            }
            Ok(user)
        }
        None => {
            log::warn!("Failed login attempt for username '{}'", username.trim());
            Err(CommunityError::InvalidCredentials)
        }
    }
}
