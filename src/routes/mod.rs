use crate::error::CommunityError;
use actix_web::web;

pub mod account;
pub mod community;
pub mod content;
pub mod public;
pub mod social;

/// Mounts every route. Malformed JSON bodies come back in the same error shape as everything else.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| CommunityError::Validation(format!("Invalid JSON: {}", err)).into()),
    )
    .configure(public::config_api)
    .configure(account::config_account)
    .configure(community::config_community)
    .configure(content::config_content)
    .configure(social::config_social);
}
