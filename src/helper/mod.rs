pub mod account_helpers;
pub mod community_helpers;
pub mod content_helpers;
pub mod form_helpers;
pub mod membership_helpers;
pub mod moderation_helpers;
pub mod notification_helpers;
pub mod privilege_helpers;
pub mod sanitization_helpers;
pub mod social_helpers;
