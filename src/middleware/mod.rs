use crate::error::CommunityError;
use crate::models::User;
use actix_session::{Session, SessionExt, SessionInsertError};
use actix_web::{dev, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

const SESSION_USER_ID: &str = "user_id";
const SESSION_USERNAME: &str = "username";

/// The current actor, read from the session cookie. Rejects anonymous requests with 401.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

impl AuthenticatedUser {
    /// Same lookup as the extractor, for pages that also serve anonymous visitors.
    pub fn from_session(session: &Session) -> Option<Self> {
        match (session.get::<i64>(SESSION_USER_ID), session.get::<String>(SESSION_USERNAME)) {
            (Ok(Some(user_id)), Ok(Some(username))) => Some(AuthenticatedUser { user_id, username }),
            _ => None,
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = CommunityError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(AuthenticatedUser::from_session(&req.get_session()).ok_or(CommunityError::Unauthorized))
    }
}

pub fn start_session(session: &Session, user: &User) -> Result<(), SessionInsertError> {
    session.renew();
    session.insert(SESSION_USER_ID, user.id)?;
    session.insert(SESSION_USERNAME, &user.username)
}

pub fn end_session(session: &Session) {
    session.purge();
}
