//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-checked queries and embedded migrations.

use chrono::Utc;
use sqlx::{Executor, Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const POST_COLUMNS: &str = r#"
    p.id, p.user_id, u.username, p.title, p.body, p.image, p.media_url,
    p.created_at, p.modified_at
"#;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.post_id, c.user_id, u.username, c.body, c.image, c.media_url, c.created_at
"#;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Set `modified_at` to the newest comment time, or the post's own creation time.
async fn recompute_modified<'e, E>(executor: E, post_id: i64) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET modified_at = COALESCE(
            (SELECT MAX(created_at) FROM comments WHERE comments.post_id = posts.id),
            created_at
        )
        WHERE id = ?
        "#,
    )
    .bind(post_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user and return the stored row
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        is_superuser: bool,
    ) -> Result<User, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, is_superuser, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_superuser)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get_user(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Get user by ID
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Replace password hash and superuser flag
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching user exists.
    pub async fn update_user_credentials(
        &self,
        id: i64,
        password_hash: &str,
        is_superuser: bool,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, is_superuser = ? WHERE id = ?")
                .bind(password_hash)
                .bind(is_superuser)
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Enable or disable a user account
    pub async fn set_user_active(&self, id: i64, is_active: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Get the user's profile, creating it with defaults on first access
    pub async fn get_or_create_profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        let defaults = UserProfile::with_defaults(user_id);

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_profiles (id, pagination, comment_filter, activity, nightmode)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(defaults.id)
        .bind(defaults.pagination)
        .bind(defaults.comment_filter)
        .bind(defaults.activity)
        .bind(defaults.nightmode)
        .execute(&self.pool)
        .await?;

        let profile =
            sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(profile)
    }

    /// Persist profile settings
    pub async fn update_profile(&self, profile: &UserProfile) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_profiles
            SET pagination = ?, comment_filter = ?, activity = ?, nightmode = ?
            WHERE id = ?
            "#,
        )
        .bind(profile.pagination)
        .bind(profile.comment_filter)
        .bind(profile.activity)
        .bind(profile.nightmode)
        .bind(profile.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post; `modified_at` starts equal to `created_at`
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (user_id, title, body, image, media_url, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.image)
        .bind(&post.media_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_post(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Get post by ID
    pub async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let query = format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?"
        );
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    /// Update editable post fields
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching post exists.
    pub async fn update_post(
        &self,
        id: i64,
        title: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE posts SET title = ?, body = ?, media_url = ? WHERE id = ?")
                .bind(title)
                .bind(body)
                .bind(media_url)
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a post together with its comments
    ///
    /// # Returns
    /// Media names the deleted rows referenced, or `None` if the post did not exist.
    pub async fn delete_post(&self, id: i64) -> Result<Option<ReleasedMedia>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(post_image) =
            sqlx::query_scalar::<_, Option<String>>("SELECT image FROM posts WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        let comment_images = sqlx::query_scalar::<_, Option<String>>(
            "SELECT image FROM comments WHERE post_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut released = ReleasedMedia::default();
        released.push(post_image);
        for image in comment_images {
            released.push(image);
        }

        Ok(Some(released))
    }

    /// Count all posts
    pub async fn count_posts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// List posts by latest activity
    pub async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p JOIN users u ON u.id = p.user_id
            ORDER BY p.modified_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        );
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Count posts carrying an image
    pub async fn count_gallery_posts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE image IS NOT NULL AND image != ''",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// List posts carrying an image, by latest activity
    pub async fn list_gallery_posts(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p JOIN users u ON u.id = p.user_id
            WHERE p.image IS NOT NULL AND p.image != ''
            ORDER BY p.modified_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        );
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    /// Number of posts active at or after the given post's `modified_at`
    ///
    /// This is the post's 1-based position in the feed ordering (ties counted
    /// inclusively). Returns `None` if the post does not exist.
    pub async fn post_rank(&self, post_id: i64) -> Result<Option<i64>, AppError> {
        let rank = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE modified_at >= (SELECT modified_at FROM posts WHERE id = ?)
            "#,
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((rank > 0).then_some(rank))
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert a comment and bump the parent post's `modified_at`
    ///
    /// # Returns
    /// The stored comment, or `None` if the parent post does not exist.
    pub async fn insert_comment(&self, comment: &NewComment) -> Result<Option<Comment>, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let parent_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE id = ?")
            .bind(comment.post_id)
            .fetch_one(&mut *tx)
            .await?
            > 0;
        if !parent_exists {
            return Ok(None);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO comments (post_id, user_id, body, image, media_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(&comment.body)
        .bind(&comment.image)
        .bind(&comment.media_url)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET modified_at = ? WHERE id = ?")
            .bind(now)
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_comment(result.last_insert_rowid()).await
    }

    /// Get comment by ID
    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id WHERE c.id = ?"
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    /// Update editable comment fields
    pub async fn update_comment(
        &self,
        id: i64,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE comments SET body = ?, media_url = ? WHERE id = ?")
            .bind(body)
            .bind(media_url)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a comment and recompute the parent post's `modified_at`
    ///
    /// # Returns
    /// Media the comment referenced, or `None` if the comment did not exist.
    pub async fn delete_comment(&self, id: i64) -> Result<Option<ReleasedMedia>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some((post_id, image)) = sqlx::query_as::<_, (i64, Option<String>)>(
            "SELECT post_id, image FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        recompute_modified(&mut *tx, post_id).await?;

        tx.commit().await?;

        let mut released = ReleasedMedia::default();
        released.push(image);
        Ok(Some(released))
    }

    /// Recompute `modified_at` of one post from its comments
    ///
    /// Repairs rows written outside the service layer.
    pub async fn recompute_post_modified(&self, post_id: i64) -> Result<bool, AppError> {
        recompute_modified(&self.pool, post_id).await
    }

    /// Comments of the given posts, oldest first
    pub async fn get_comments_for_posts(&self, post_ids: &[i64]) -> Result<Vec<Comment>, AppError> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        // SQLite limits bound parameters per statement
        let mut all_comments = Vec::new();

        for chunk in post_ids.chunks(100) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                r#"
                SELECT {COMMENT_COLUMNS}
                FROM comments c JOIN users u ON u.id = c.user_id
                WHERE c.post_id IN ({placeholders})
                ORDER BY c.created_at ASC, c.id ASC
                "#
            );

            let mut query_builder = sqlx::query_as::<_, Comment>(&query);
            for post_id in chunk {
                query_builder = query_builder.bind(post_id);
            }

            all_comments.extend(query_builder.fetch_all(&self.pool).await?);
        }

        Ok(all_comments)
    }

    // =========================================================================
    // Media references
    // =========================================================================

    /// Number of posts and comments referencing a stored file
    pub async fn count_media_references(&self, name: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT (SELECT COUNT(*) FROM posts WHERE image = ?)
                 + (SELECT COUNT(*) FROM comments WHERE image = ?)
            "#,
        )
        .bind(name)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Source attributes
    // =========================================================================

    /// Get cached attributes for a stored file
    pub async fn get_source_attributes(
        &self,
        name: &str,
    ) -> Result<Option<SourceAttributes>, AppError> {
        let attributes =
            sqlx::query_as::<_, SourceAttributes>("SELECT * FROM source_attributes WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(attributes)
    }

    /// Insert attributes unless a row already exists
    ///
    /// # Returns
    /// `true` if inserted.
    pub async fn insert_source_attributes_if_absent(
        &self,
        attributes: &SourceAttributes,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO source_attributes (name, format, animated) VALUES (?, ?, ?)",
        )
        .bind(&attributes.name)
        .bind(&attributes.format)
        .bind(attributes.animated)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert or overwrite attributes
    pub async fn upsert_source_attributes(
        &self,
        attributes: &SourceAttributes,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO source_attributes (name, format, animated) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET format = excluded.format, animated = excluded.animated
            "#,
        )
        .bind(&attributes.name)
        .bind(&attributes.format)
        .bind(attributes.animated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drop cached attributes for a stored file
    pub async fn delete_source_attributes(&self, name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM source_attributes WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Activity
    // =========================================================================

    /// Newest posts by id, as activity rows
    pub async fn latest_post_activity(&self, limit: i64) -> Result<Vec<ActivityRow>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT p.id, p.id AS post_id, p.title AS post_title, u.username, p.created_at
            FROM posts p JOIN users u ON u.id = p.user_id
            ORDER BY p.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Newest comments by id, as activity rows
    pub async fn latest_comment_activity(&self, limit: i64) -> Result<Vec<ActivityRow>, AppError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT c.id, c.post_id, p.title AS post_title, u.username, c.created_at
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            JOIN users u ON u.id = c.user_id
            ORDER BY c.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Backdate a post, used to stage feed orderings in tests
    #[cfg(test)]
    pub(crate) async fn set_post_times(
        &self,
        post_id: i64,
        created_at: chrono::DateTime<Utc>,
        modified_at: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET created_at = ?, modified_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(modified_at)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
