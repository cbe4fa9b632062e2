//! Post service
//!
//! Handles post and comment writes: validation, media storage with
//! reference-counted release, ownership checks and activity invalidation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::FormatSpec;
use crate::data::{Comment, Database, NewComment, NewPost, Post, ReleasedMedia, User};
use crate::error::AppError;
use crate::service::{ActivityService, AttributeService, embed};
use crate::storage::{MediaStorage, UploadError, probe};

const MAX_TITLE_CHARS: usize = 200;

/// File received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Fields of the new-post form
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub title: String,
    pub body: String,
    pub image: Option<UploadedFile>,
    pub media_url: Option<String>,
}

/// Fields of the edit-post form
#[derive(Debug, Clone, Default)]
pub struct EditPost {
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
}

/// Fields of the new-comment form
#[derive(Debug, Clone, Default)]
pub struct CommentInput {
    pub body: String,
    pub image: Option<UploadedFile>,
    pub media_url: Option<String>,
}

/// Fields of the edit-comment form
#[derive(Debug, Clone, Default)]
pub struct EditComment {
    pub body: String,
    pub media_url: Option<String>,
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    attributes: Arc<AttributeService>,
    activity: Arc<ActivityService>,
    formats: Arc<BTreeMap<String, FormatSpec>>,
    max_upload_bytes: usize,
    thumbnail_size: u32,
    /// Serialises "store or reuse a file" against "release an unreferenced file"
    media_lock: Mutex<()>,
}

impl PostService {
    /// Create new post service
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        attributes: Arc<AttributeService>,
        activity: Arc<ActivityService>,
        formats: Arc<BTreeMap<String, FormatSpec>>,
        max_upload_bytes: usize,
        thumbnail_size: u32,
    ) -> Self {
        Self {
            db,
            storage,
            attributes,
            activity,
            formats,
            max_upload_bytes,
            thumbnail_size,
            media_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Create a post
    ///
    /// # Side Effects
    /// - Stores the image (deduplicated by content hash) and its thumbnail
    /// - Refreshes source attributes of the stored file
    /// - Drops the activity cache
    pub async fn create_post(&self, user: &User, input: PostInput) -> Result<Post, AppError> {
        let title = validate_title(&input.title)?;
        let body = required_text(&input.body, "body")?;
        let media_url = embed::validate_link(input.media_url.as_deref())?;
        let upload = input
            .image
            .ok_or_else(|| AppError::Validation("An image is required.".to_string()))?;

        let _guard = self.media_lock.lock().await;
        let image = self.store_upload(upload).await?;

        let result = self
            .db
            .insert_post(&NewPost {
                user_id: user.id,
                title,
                body,
                image: Some(image.clone()),
                media_url,
            })
            .await;

        let post = match result {
            Ok(post) => post,
            Err(error) => {
                self.release_unlocked(ReleasedMedia(vec![image])).await;
                return Err(error);
            }
        };

        self.activity.invalidate();
        crate::metrics::POSTS_TOTAL.inc();
        tracing::info!(post_id = post.id, user = %user.username, "Post created");
        Ok(post)
    }

    /// Edit a post's text and media link
    pub async fn edit_post(&self, user: &User, post_id: i64, input: EditPost) -> Result<Post, AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        if !user.can_modify(post.user_id) {
            return Err(AppError::Forbidden);
        }

        let title = validate_title(&input.title)?;
        let body = required_text(&input.body, "body")?;
        let media_url = embed::validate_link(input.media_url.as_deref())?;

        if !self
            .db
            .update_post(post_id, &title, &body, media_url.as_deref())
            .await?
        {
            return Err(AppError::NotFound);
        }

        self.activity.invalidate();
        tracing::info!(post_id, user = %user.username, "Post edited");
        self.db.get_post(post_id).await?.ok_or(AppError::NotFound)
    }

    /// Delete a post with its comments, releasing unreferenced media
    pub async fn delete_post(&self, user: &User, post_id: i64) -> Result<(), AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        if !user.can_modify(post.user_id) {
            return Err(AppError::Forbidden);
        }

        let _guard = self.media_lock.lock().await;
        let released = self.db.delete_post(post_id).await?.ok_or(AppError::NotFound)?;
        self.release_unlocked(released).await;

        self.activity.invalidate();
        crate::metrics::POSTS_TOTAL.dec();
        tracing::info!(post_id, user = %user.username, "Post deleted");
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comment on a post; the image is optional
    ///
    /// Bumps the post's `modified_at` to the comment time.
    pub async fn create_comment(
        &self,
        user: &User,
        post_id: i64,
        input: CommentInput,
    ) -> Result<Comment, AppError> {
        if self.db.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let body = required_text(&input.body, "body")?;
        let media_url = embed::validate_link(input.media_url.as_deref())?;

        let _guard = self.media_lock.lock().await;
        let image = match input.image {
            Some(upload) => Some(self.store_upload(upload).await?),
            None => None,
        };

        let result = self
            .db
            .insert_comment(&NewComment {
                post_id,
                user_id: user.id,
                body,
                image: image.clone(),
                media_url,
            })
            .await;

        let failure = match result {
            Ok(Some(comment)) => {
                self.activity.invalidate();
                tracing::info!(post_id, comment_id = comment.id, user = %user.username, "Comment created");
                return Ok(comment);
            }
            // Parent deleted since the check above
            Ok(None) => AppError::NotFound,
            Err(error) => error,
        };

        let mut released = ReleasedMedia::default();
        released.push(image);
        self.release_unlocked(released).await;
        Err(failure)
    }

    /// Edit a comment's text and media link
    pub async fn edit_comment(
        &self,
        user: &User,
        post_id: i64,
        comment_id: i64,
        input: EditComment,
    ) -> Result<Comment, AppError> {
        let comment = self.comment_of_post(post_id, comment_id).await?;
        if !user.can_modify(comment.user_id) {
            return Err(AppError::Forbidden);
        }

        let body = required_text(&input.body, "body")?;
        let media_url = embed::validate_link(input.media_url.as_deref())?;

        if !self
            .db
            .update_comment(comment_id, &body, media_url.as_deref())
            .await?
        {
            return Err(AppError::NotFound);
        }

        self.activity.invalidate();
        tracing::info!(post_id, comment_id, user = %user.username, "Comment edited");
        self.db.get_comment(comment_id).await?.ok_or(AppError::NotFound)
    }

    /// Delete a comment, recomputing the post's `modified_at`
    pub async fn delete_comment(&self, user: &User, post_id: i64, comment_id: i64) -> Result<(), AppError> {
        let comment = self.comment_of_post(post_id, comment_id).await?;
        if !user.can_modify(comment.user_id) {
            return Err(AppError::Forbidden);
        }

        let _guard = self.media_lock.lock().await;
        let released = self
            .db
            .delete_comment(comment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.release_unlocked(released).await;

        self.activity.invalidate();
        tracing::info!(post_id, comment_id, user = %user.username, "Comment deleted");
        Ok(())
    }

    /// Get a comment, checking it belongs to `post_id`
    pub async fn comment_of_post(&self, post_id: i64, comment_id: i64) -> Result<Comment, AppError> {
        self.db
            .get_comment(comment_id)
            .await?
            .filter(|comment| comment.post_id == post_id)
            .ok_or(AppError::NotFound)
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Validate and store an upload; caller holds `media_lock`
    async fn store_upload(&self, upload: UploadedFile) -> Result<String, AppError> {
        let formats = Arc::clone(&self.formats);
        let max_bytes = self.max_upload_bytes;
        let file_name = upload.file_name.clone();

        let validated = tokio::task::spawn_blocking(move || {
            probe::validate_upload(&upload.file_name, upload.data, &formats, max_bytes)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("upload validation task failed: {}", e)))?
        .map_err(|error: UploadError| {
            crate::metrics::UPLOAD_REJECTIONS_TOTAL
                .with_label_values(&[error.reason()])
                .inc();
            tracing::info!(file = %file_name, reason = error.reason(), "Upload rejected");
            AppError::Validation(error.to_string())
        })?;

        let size = validated.data.len();
        let is_video = validated.probe.is_video();
        let thumbnail_source = (!is_video).then(|| validated.data.clone());

        let stored = self
            .storage
            .store(validated.data, &validated.probe.extension)
            .await?;

        {
            use crate::metrics::{MEDIA_BYTES_UPLOADED, MEDIA_DEDUPLICATED_TOTAL, MEDIA_UPLOADS_TOTAL};
            MEDIA_UPLOADS_TOTAL.inc();
            MEDIA_BYTES_UPLOADED.inc_by(size as f64);
            if stored.deduplicated {
                MEDIA_DEDUPLICATED_TOTAL.inc();
            }
        }

        if let Some(data) = thumbnail_source {
            self.ensure_thumbnail(&stored.name, data).await;
        }

        if let Err(error) = self.attributes.refresh(&stored.name).await {
            tracing::warn!(name = %stored.name, %error, "Failed to refresh source attributes");
        }

        Ok(stored.name)
    }

    async fn ensure_thumbnail(&self, name: &str, data: Vec<u8>) {
        match self.storage.thumbnail_exists(name).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(name = %name, %error, "Failed to check thumbnail");
                return;
            }
        }

        let size = self.thumbnail_size;
        let rendered = tokio::task::spawn_blocking(move || probe::render_thumbnail(&data, size))
            .await
            .ok()
            .flatten();

        let Some(jpeg) = rendered else {
            tracing::warn!(name = %name, "Could not render thumbnail");
            return;
        };

        if let Err(error) = self.storage.store_thumbnail(name, jpeg).await {
            tracing::warn!(name = %name, %error, "Failed to store thumbnail");
        }
    }

    /// Delete released files nothing references any more; caller holds `media_lock`
    ///
    /// Failures are logged, never returned.
    async fn release_unlocked(&self, released: ReleasedMedia) {
        for name in released.0 {
            match self.db.count_media_references(&name).await {
                Ok(0) => {}
                Ok(_) => continue,
                Err(error) => {
                    tracing::warn!(name = %name, %error, "Failed to count media references");
                    continue;
                }
            }

            if let Err(error) = self.storage.delete(&name).await {
                tracing::warn!(name = %name, %error, "Failed to delete media file");
            }
            if let Err(error) = self.attributes.invalidate(&name).await {
                tracing::warn!(name = %name, %error, "Failed to drop source attributes");
            }
            crate::metrics::MEDIA_RELEASED_TOTAL.inc();
        }
    }
}

fn validate_title(value: &str) -> Result<String, AppError> {
    let title = required_text(value, "title")?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Ensure the title has at most {} characters.",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title)
}

/// Trimmed non-empty form text
fn required_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("The {} field is required.", field)));
    }
    Ok(trimmed.to_string())
}
