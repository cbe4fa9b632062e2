//! Data models
//!
//! Rust structs representing database entities and cache items.
//! Rows use SQLite integer IDs and chrono timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Users
// =============================================================================

/// A board member
///
/// Accounts are provisioned out of band (startup bootstrap or directly in
/// the database); there is no public signup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this user may edit or delete a row owned by `owner_id`
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.is_superuser || self.id == owner_id
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Posts-per-page options
pub const PAGINATION_CHOICES: [i64; 6] = [5, 10, 15, 20, 25, 50];
/// Number of newest comments revealed under each post
pub const COMMENT_FILTER_CHOICES: [i64; 5] = [1, 3, 5, 10, 20];
/// Latest-activity list lengths
pub const ACTIVITY_CHOICES: [i64; 5] = [5, 10, 15, 20, 25];

pub const DEFAULT_PAGINATION: i64 = 10;
pub const DEFAULT_COMMENT_FILTER: i64 = 5;
pub const DEFAULT_ACTIVITY: i64 = 10;

/// Longest activity list any profile can ask for
pub fn activity_max() -> i64 {
    ACTIVITY_CHOICES.iter().copied().max().unwrap_or(DEFAULT_ACTIVITY)
}

/// Per-user display preferences, 1:1 with `User` (same id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub pagination: i64,
    pub comment_filter: i64,
    pub activity: i64,
    pub nightmode: bool,
}

impl UserProfile {
    /// Profile with default settings for `user_id`
    pub fn with_defaults(user_id: i64) -> Self {
        Self {
            id: user_id,
            pagination: DEFAULT_PAGINATION,
            comment_filter: DEFAULT_COMMENT_FILTER,
            activity: DEFAULT_ACTIVITY,
            nightmode: false,
        }
    }

    /// Apply submitted settings, accepting only the listed choices
    pub fn with_choices(
        &self,
        pagination: i64,
        comment_filter: i64,
        activity: i64,
        nightmode: bool,
    ) -> Result<Self, crate::error::AppError> {
        let checks = [
            ("pagination", pagination, &PAGINATION_CHOICES[..]),
            ("comment_filter", comment_filter, &COMMENT_FILTER_CHOICES[..]),
            ("activity", activity, &ACTIVITY_CHOICES[..]),
        ];
        for (field, value, choices) in checks {
            if !choices.contains(&value) {
                return Err(crate::error::AppError::Validation(format!(
                    "Select a valid choice for {}. {} is not one of the available choices.",
                    field, value
                )));
            }
        }

        Ok(Self {
            id: self.id,
            pagination,
            comment_filter,
            activity,
            nightmode,
        })
    }
}

// =============================================================================
// Posts and comments
// =============================================================================

/// Top-level board entry
///
/// `modified_at` tracks the newest comment, or `created_at` without comments.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    /// Owner username (joined from users)
    pub username: String,
    pub title: String,
    pub body: String,
    /// Stored media file name (content hash + extension)
    pub image: Option<String>,
    /// Embedded media link (YouTube, Vimeo, SoundCloud)
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Reply attached to a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    /// Owner username (joined from users)
    pub username: String,
    pub body: String,
    pub image: Option<String>,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub media_url: Option<String>,
}

/// Insert payload for a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub body: String,
    pub image: Option<String>,
    pub media_url: Option<String>,
}

/// Media names freed by a delete, to be checked for remaining references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasedMedia(pub Vec<String>);

impl ReleasedMedia {
    pub fn push(&mut self, name: Option<String>) {
        if let Some(name) = name {
            if !self.0.contains(&name) {
                self.0.push(name);
            }
        }
    }
}

// =============================================================================
// Source attributes
// =============================================================================

/// Decoded media metadata, keyed by stored file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceAttributes {
    pub name: String,
    /// Format code from the decoder table (e.g. "GIF"), `None` when unknown
    pub format: Option<String>,
    pub animated: bool,
}

// =============================================================================
// Activity
// =============================================================================

/// Kind of entry in the latest-activity list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Post,
    Comment,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

/// One entry of the merged latest-activity list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    /// Post or comment id
    pub id: i64,
    /// Post the entry belongs to (itself for posts)
    pub post_id: i64,
    pub post_title: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// Feed page holding `post_id` for the pagination this list was built for
    pub post_page: i64,
}

/// Activity row as read from the database, before page annotation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: i64,
    pub post_id: i64,
    pub post_title: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_can_modify_any_row() {
        let mut user = User {
            id: 1,
            username: "alice".to_string(),
            password_hash: String::new(),
            is_superuser: false,
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(user.can_modify(1));
        assert!(!user.can_modify(2));

        user.is_superuser = true;
        assert!(user.can_modify(2));
    }

    #[test]
    fn released_media_skips_duplicates_and_empty_names() {
        let mut released = ReleasedMedia::default();
        released.push(Some("a.png".to_string()));
        released.push(None);
        released.push(Some("a.png".to_string()));
        assert_eq!(released.0, vec!["a.png".to_string()]);
    }

    #[test]
    fn profile_accepts_only_listed_choices() {
        let profile = UserProfile::with_defaults(3);

        let updated = profile.with_choices(50, 1, 25, true).unwrap();
        assert_eq!(updated.id, 3);
        assert_eq!(updated.pagination, 50);
        assert!(updated.nightmode);

        assert!(profile.with_choices(7, 1, 25, false).is_err());
        assert!(profile.with_choices(10, 2, 25, false).is_err());
        assert!(profile.with_choices(10, 1, 30, false).is_err());
    }

    #[test]
    fn activity_max_is_largest_choice() {
        assert_eq!(activity_max(), 25);
    }
}
