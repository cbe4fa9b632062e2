//! Form decoding for board submissions

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use serde::Deserialize;

use super::views::FormValues;
use crate::error::AppError;
use crate::service::{CommentInput, EditComment, EditPost, PostInput, UploadedFile};
use crate::storage::UploadError;

/// Text part of the edit forms
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TextForm {
    pub title: String,
    pub body: String,
    pub media_url: String,
}

impl TextForm {
    pub fn values(&self) -> FormValues {
        FormValues {
            title: self.title.clone(),
            body: self.body.clone(),
            media_url: self.media_url.clone(),
        }
    }

    pub fn into_edit_post(self) -> EditPost {
        EditPost {
            title: self.title,
            body: self.body,
            media_url: non_blank(self.media_url),
        }
    }

    pub fn into_edit_comment(self) -> EditComment {
        EditComment {
            body: self.body,
            media_url: non_blank(self.media_url),
        }
    }
}

/// Multipart submission of the post and comment forms
#[derive(Debug, Default)]
pub struct UploadForm {
    pub text: TextForm,
    pub image: Option<UploadedFile>,
}

impl UploadForm {
    /// Read every field of a multipart body
    ///
    /// An empty file input (no file chosen) counts as no image.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    if !file_name.is_empty() || !data.is_empty() {
                        form.image = Some(UploadedFile {
                            file_name,
                            data: data.to_vec(),
                        });
                    }
                }
                "title" => form.text.title = field.text().await.map_err(multipart_error)?,
                "body" => form.text.body = field.text().await.map_err(multipart_error)?,
                "media_url" => form.text.media_url = field.text().await.map_err(multipart_error)?,
                other => tracing::debug!(field = %other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    pub fn into_post_input(self) -> PostInput {
        PostInput {
            title: self.text.title,
            body: self.text.body,
            image: self.image,
            media_url: non_blank(self.text.media_url),
        }
    }

    pub fn into_comment_input(self) -> CommentInput {
        CommentInput {
            body: self.text.body,
            image: self.image,
            media_url: non_blank(self.text.media_url),
        }
    }
}

/// Profile settings form
///
/// Choices arrive as strings so a tampered value is a form error rather
/// than a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub pagination: String,
    pub comment_filter: String,
    pub activity: String,
    pub nightmode: Option<String>,
}

impl ProfileForm {
    /// Parse the three choices and the checkbox
    pub fn parse(&self) -> Result<(i64, i64, i64, bool), AppError> {
        let number = |field: &str, value: &str| {
            value.trim().parse::<i64>().map_err(|_| {
                AppError::Validation(format!("Select a valid choice for {}.", field))
            })
        };

        Ok((
            number("pagination", &self.pagination)?,
            number("comment_filter", &self.comment_filter)?,
            number("activity", &self.activity)?,
            self.nightmode.as_deref().is_some_and(|v| !v.is_empty() && v != "off"),
        ))
    }
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation(UploadError::TooLarge.to_string())
    } else {
        AppError::Validation(error.body_text())
    }
}
