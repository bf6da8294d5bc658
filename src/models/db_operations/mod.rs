pub mod community_db_operations;
pub mod content_db_operations;
pub mod membership_db_operations;
pub mod notifications_db_operations;
pub mod social_db_operations;
pub mod users_db_operations;
