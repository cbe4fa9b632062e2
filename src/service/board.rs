//! Board service
//!
//! Assembles feed and gallery pages: paginated posts with their revealed
//! comments, media attributes and embed info.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{Comment, Database, EmbedInfo, Post, UserProfile};
use crate::error::AppError;
use crate::service::embed::Embed;
use crate::service::pagination::{Page, Paginator, page_for_rank};
use crate::service::{AttributeService, EmbedService};
use crate::storage::MediaStorage;

/// Stored image or video as shown on a page
#[derive(Debug, Clone)]
pub struct MediaView {
    pub name: String,
    pub url: String,
    /// `None` for videos and files without a thumbnail
    pub thumbnail_url: Option<String>,
    /// Format code from source attributes (e.g. "GIF", "VIDEO")
    pub format: Option<String>,
    pub animated: bool,
}

impl MediaView {
    pub fn is_video(&self) -> bool {
        self.format.as_deref() == Some("VIDEO")
    }
}

/// Embedded media link as shown on a page
#[derive(Debug, Clone)]
pub struct EmbedView {
    pub url: String,
    pub backend: &'static str,
    pub player_url: String,
    pub width: u32,
    pub height: u32,
    pub info: Option<Arc<EmbedInfo>>,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: Comment,
    pub media: Option<MediaView>,
    pub embed: Option<EmbedView>,
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub post: Post,
    pub media: Option<MediaView>,
    pub embed: Option<EmbedView>,
    /// Newest comments, oldest first
    pub comments: Vec<CommentView>,
    /// Older comments not revealed by the viewer's comment filter
    pub hidden_comments: usize,
}

/// One page of posts
#[derive(Debug, Clone)]
pub struct BoardPage {
    pub page: Page,
    pub posts: Vec<PostView>,
}

/// Board service
pub struct BoardService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    attributes: Arc<AttributeService>,
    embed: Arc<EmbedService>,
    gallery_page_size: i64,
}

impl BoardService {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        attributes: Arc<AttributeService>,
        embed: Arc<EmbedService>,
        gallery_page_size: i64,
    ) -> Self {
        Self {
            db,
            storage,
            attributes,
            embed,
            gallery_page_size,
        }
    }

    /// Feed page for a viewer
    ///
    /// Posts are ordered by latest activity; each shows only the newest
    /// `comment_filter` comments.
    pub async fn feed(&self, profile: &UserProfile, raw_page: Option<&str>) -> Result<BoardPage, AppError> {
        let count = self.db.count_posts().await?;
        crate::metrics::POSTS_TOTAL.set(count);

        let page = Paginator::new(count, profile.pagination).page(raw_page);
        let posts = self.db.list_posts(page.per_page, page.offset()).await?;

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut comments_by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in self.db.get_comments_for_posts(&post_ids).await? {
            comments_by_post.entry(comment.post_id).or_default().push(comment);
        }

        let reveal = profile.comment_filter.max(0) as usize;
        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            let mut comments = comments_by_post.remove(&post.id).unwrap_or_default();
            let hidden = comments.len().saturating_sub(reveal);
            let revealed = comments.split_off(hidden);

            let mut comment_views = Vec::with_capacity(revealed.len());
            for comment in revealed {
                comment_views.push(self.comment_view(comment).await);
            }

            views.push(PostView {
                media: self.media_view(post.image.as_deref()).await,
                embed: self.embed_view(post.media_url.as_deref()).await,
                post,
                comments: comment_views,
                hidden_comments: hidden,
            });
        }

        Ok(BoardPage { page, posts: views })
    }

    /// Gallery page: posts carrying an image, without comments
    pub async fn gallery(&self, raw_page: Option<&str>) -> Result<BoardPage, AppError> {
        let count = self.db.count_gallery_posts().await?;
        let page = Paginator::new(count, self.gallery_page_size).page(raw_page);
        let posts = self.db.list_gallery_posts(page.per_page, page.offset()).await?;

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(PostView {
                media: self.media_view(post.image.as_deref()).await,
                embed: None,
                post,
                comments: Vec::new(),
                hidden_comments: 0,
            });
        }

        Ok(BoardPage { page, posts: views })
    }

    /// Feed page holding a post for the given pagination
    pub async fn post_page(&self, post_id: i64, pagination: i64) -> Result<Option<i64>, AppError> {
        let rank = self.db.post_rank(post_id).await?;
        Ok(rank.map(|rank| page_for_rank(rank, pagination)))
    }

    /// Single post for edit forms
    pub async fn post_view(&self, post_id: i64) -> Result<PostView, AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        Ok(PostView {
            media: self.media_view(post.image.as_deref()).await,
            embed: self.embed_view(post.media_url.as_deref()).await,
            post,
            comments: Vec::new(),
            hidden_comments: 0,
        })
    }

    async fn comment_view(&self, comment: Comment) -> CommentView {
        CommentView {
            media: self.media_view(comment.image.as_deref()).await,
            embed: self.embed_view(comment.media_url.as_deref()).await,
            comment,
        }
    }

    async fn media_view(&self, name: Option<&str>) -> Option<MediaView> {
        let name = name.filter(|n| !n.is_empty())?;

        let (format, animated) = match self.attributes.get(name).await {
            Ok(attributes) => (attributes.format, attributes.animated),
            Err(error) => {
                tracing::warn!(name = %name, %error, "Failed to read source attributes");
                (None, false)
            }
        };

        let has_thumbnail = self.storage.thumbnail_exists(name).await.unwrap_or(false);

        Some(MediaView {
            name: name.to_string(),
            url: self.storage.public_url(name),
            thumbnail_url: if has_thumbnail {
                self.storage.thumbnail_url(name)
            } else {
                None
            },
            format,
            animated,
        })
    }

    async fn embed_view(&self, media_url: Option<&str>) -> Option<EmbedView> {
        let embed = Embed::parse(media_url?)?;
        let info = self.embed.info(&embed).await;

        Some(EmbedView {
            backend: embed.backend.name(),
            player_url: embed.player_url(),
            width: embed.max_width(),
            height: embed.max_height(),
            url: embed.url,
            info,
        })
    }
}
