//! Media storage module
//!
//! Handles:
//! - Content-addressed media files on the local filesystem
//! - Format probing, upload validation and thumbnails

mod media;
pub mod probe;

pub use media::{MediaStorage, StoredMedia};
pub use probe::{Probe, UploadError, ValidatedUpload};
