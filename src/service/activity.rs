//! Latest activity service
//!
//! Builds the merged post/comment activity list shown beside the feed.
//! Each list is annotated with the feed page of every entry's post, which
//! depends on the viewer's pagination, so one list is cached per pagination
//! choice.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{
    ActivityCache, ActivityItem, ActivityKind, ActivityRow, Database, PAGINATION_CHOICES,
    UserProfile, activity_max,
};
use crate::error::AppError;
use crate::service::pagination::page_for_rank;

/// Latest activity service
pub struct ActivityService {
    db: Arc<Database>,
    cache: Arc<ActivityCache>,
}

impl ActivityService {
    pub fn new(db: Arc<Database>, cache: Arc<ActivityCache>) -> Self {
        Self { db, cache }
    }

    /// Activity list for a viewer, cut to their activity setting
    pub async fn latest(&self, profile: &UserProfile) -> Result<Vec<ActivityItem>, AppError> {
        let limit = profile.activity.max(0) as usize;

        if let Some(items) = self.cache.get(profile.pagination).await {
            return Ok(items.iter().take(limit).cloned().collect());
        }

        let generation = self.cache.generation();
        let mut lists = self.generate(profile.pagination).await?;
        let items = lists.remove(&profile.pagination).unwrap_or_default();
        for (pagination, list) in lists {
            self.cache.insert(pagination, list, generation).await;
        }
        if !self.cache.insert(profile.pagination, items.clone(), generation).await {
            tracing::debug!("Activity changed while building lists, not caching");
        }

        Ok(items.into_iter().take(limit).collect())
    }

    /// Drop every cached list
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
        tracing::debug!("Invalidated activity cache");
    }

    /// Build the annotated list for every pagination choice
    ///
    /// `extra` is included when it is not one of the standard choices.
    async fn generate(&self, extra: i64) -> Result<HashMap<i64, Vec<ActivityItem>>, AppError> {
        let max = activity_max();
        let posts = self.db.latest_post_activity(max).await?;
        let comments = self.db.latest_comment_activity(max).await?;
        let merged = merge_rows(posts, comments, max as usize);

        let mut ranks: HashMap<i64, i64> = HashMap::new();
        for (_, row) in &merged {
            if ranks.contains_key(&row.post_id) {
                continue;
            }
            let rank = self.db.post_rank(row.post_id).await?.unwrap_or(1);
            ranks.insert(row.post_id, rank);
        }

        let mut paginations = PAGINATION_CHOICES.to_vec();
        if !paginations.contains(&extra) {
            paginations.push(extra);
        }

        let lists = paginations
            .into_iter()
            .map(|pagination| {
                let items = merged
                    .iter()
                    .map(|(kind, row)| ActivityItem {
                        kind: *kind,
                        id: row.id,
                        post_id: row.post_id,
                        post_title: row.post_title.clone(),
                        username: row.username.clone(),
                        created_at: row.created_at,
                        post_page: page_for_rank(ranks[&row.post_id], pagination),
                    })
                    .collect();
                (pagination, items)
            })
            .collect();

        tracing::debug!(entries = merged.len(), "Generated activity lists");
        Ok(lists)
    }
}

/// Merge post and comment rows, newest first, keeping at most `limit`
fn merge_rows(
    posts: Vec<ActivityRow>,
    comments: Vec<ActivityRow>,
    limit: usize,
) -> Vec<(ActivityKind, ActivityRow)> {
    let mut merged: Vec<(ActivityKind, ActivityRow)> = posts
        .into_iter()
        .map(|row| (ActivityKind::Post, row))
        .chain(comments.into_iter().map(|row| (ActivityKind::Comment, row)))
        .collect();

    merged.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
    merged.truncate(limit);
    merged
}
