use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_time: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CommunitySummary {
    pub community: Community,
    pub followers_count: i64,
}

/// Privilege tiers, highest first. A user holds at most one tier per community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeratorTier {
    Moderator,
    Admin,
    Owner,
}

impl ModeratorTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeratorTier::Owner => "owner",
            ModeratorTier::Admin => "admin",
            ModeratorTier::Moderator => "moderator",
        }
    }
}

impl fmt::Display for ModeratorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeratorTier {
    type Err = String;

    /// Accepts the stored lowercase form as well as the capitalised names clients send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(ModeratorTier::Owner),
            "admin" => Ok(ModeratorTier::Admin),
            "moderator" => Ok(ModeratorTier::Moderator),
            other => Err(format!("Unknown privilege '{}'.", other)),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Moderator {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub community_id: i64,
    pub tier: ModeratorTier,
}

#[derive(Debug, Serialize, Clone)]
pub struct CommunityFollower {
    pub user_id: i64,
    pub username: String,
    pub community_id: i64,
    pub is_follow: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct FollowRequest {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub community_id: i64,
    pub send_status: bool,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct BlackListEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub community_id: i64,
    pub reason: String,
    pub banned_at: DateTime<Utc>,
}

/// Public view of a user; never carries the email.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct DirectMessage {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub recipient_id: i64,
    pub body: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

/// One row of the chat list: the other participant and the latest activity with them.
#[derive(Debug, Serialize, Clone)]
pub struct ConversationSummary {
    pub partner: UserSummary,
    pub last_message: String,
    pub last_sent_at: DateTime<Utc>,
    pub unread_count: i64,
}

/// What a notification is about. Stored as a (content type, object id) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "content_type", content = "object_id", rename_all = "lowercase")]
pub enum EntityRef {
    Community(i64),
    Thread(i64),
    Publication(i64),
}

impl EntityRef {
    pub fn content_type(&self) -> &'static str {
        match self {
            EntityRef::Community(_) => "community",
            EntityRef::Thread(_) => "thread",
            EntityRef::Publication(_) => "publication",
        }
    }

    pub fn object_id(&self) -> i64 {
        match self {
            EntityRef::Community(id) | EntityRef::Thread(id) | EntityRef::Publication(id) => *id,
        }
    }

    pub fn from_parts(content_type: &str, object_id: i64) -> Option<Self> {
        match content_type {
            "community" => Some(EntityRef::Community(object_id)),
            "thread" => Some(EntityRef::Thread(object_id)),
            "publication" => Some(EntityRef::Publication(object_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub subject: EntityRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Publication {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Thread {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub context: String,
    pub created: DateTime<Utc>,
}

/// Content a comment can hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CommentTarget {
    Thread(i64),
    Publication(i64),
}

impl CommentTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            CommentTarget::Thread(_) => "thread",
            CommentTarget::Publication(_) => "publication",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            CommentTarget::Thread(id) | CommentTarget::Publication(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "thread" => Some(CommentTarget::Thread(id)),
            "publication" => Some(CommentTarget::Publication(id)),
            _ => None,
        }
    }
}

pub trait Commentable {
    fn title(&self) -> &str;
    fn id(&self) -> i64;
    fn target(&self) -> CommentTarget;
}

impl Commentable for Thread {
    fn title(&self) -> &str {
        &self.title
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn target(&self) -> CommentTarget {
        CommentTarget::Thread(self.id)
    }
}

impl Commentable for Publication {
    fn title(&self) -> &str {
        &self.title
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn target(&self) -> CommentTarget {
        CommentTarget::Publication(self.id)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub context: String,
    pub target: CommentTarget,
    pub created: DateTime<Utc>,
}

pub mod db_operations;
