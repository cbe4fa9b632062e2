//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database, cache, and media storage operations.

mod activity;
mod attributes;
mod board;
pub mod embed;
pub mod pagination;
mod post;

pub use activity::ActivityService;
pub use attributes::AttributeService;
pub use board::{BoardPage, BoardService, CommentView, EmbedView, MediaView, PostView};
pub use embed::EmbedService;
pub use post::{CommentInput, EditComment, EditPost, PostInput, PostService, UploadedFile};
