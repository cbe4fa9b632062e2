//! Source attribute service
//!
//! Keeps the decoded format code and animated flag of every stored file in
//! the `source_attributes` table, so pages never decode media while rendering.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::FormatSpec;
use crate::data::{Database, SourceAttributes};
use crate::error::AppError;
use crate::storage::{MediaStorage, probe};

/// Source attribute service
pub struct AttributeService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    formats: Arc<BTreeMap<String, FormatSpec>>,
}

impl AttributeService {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        formats: Arc<BTreeMap<String, FormatSpec>>,
    ) -> Self {
        Self {
            db,
            storage,
            formats,
        }
    }

    /// Get attributes for a stored file, decoding it on first access
    pub async fn get(&self, name: &str) -> Result<SourceAttributes, AppError> {
        if let Some(attributes) = self.db.get_source_attributes(name).await? {
            return Ok(attributes);
        }

        let attributes = self.decode(name).await?;
        if !self.db.insert_source_attributes_if_absent(&attributes).await? {
            // A concurrent request stored them first
            if let Some(stored) = self.db.get_source_attributes(name).await? {
                return Ok(stored);
            }
        }

        Ok(attributes)
    }

    /// Decode a stored file and overwrite its attributes
    pub async fn refresh(&self, name: &str) -> Result<SourceAttributes, AppError> {
        let attributes = self.decode(name).await?;
        self.db.upsert_source_attributes(&attributes).await?;

        tracing::debug!(
            name = %name,
            format = ?attributes.format,
            animated = attributes.animated,
            "Refreshed source attributes"
        );
        Ok(attributes)
    }

    /// Drop attributes of a released file
    pub async fn invalidate(&self, name: &str) -> Result<(), AppError> {
        self.db.delete_source_attributes(name).await?;
        Ok(())
    }

    async fn decode(&self, name: &str) -> Result<SourceAttributes, AppError> {
        let path = self.storage.path(name)?;
        let formats = Arc::clone(&self.formats);

        let (animated, format) =
            tokio::task::spawn_blocking(move || probe::read_attributes(&path, &formats))
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("attribute task failed: {}", e)))?;

        Ok(SourceAttributes {
            name: name.to_string(),
            format,
            animated,
        })
    }
}
