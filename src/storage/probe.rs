//! Media format probing
//!
//! Identifies uploads by content rather than by client-supplied type,
//! validates them against the enabled decoder table and renders thumbnails.

use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageOutputFormat};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::config::FormatSpec;

/// Decoder name shared by every recognised video container
pub const VIDEO_DECODER: &str = "FFMPEG";

/// Shortest video header accepted as intact
const MIN_VIDEO_HEADER: usize = 12;

/// What a byte buffer was recognised as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Decoder name, key into the format table (e.g. "PNG", "FFMPEG")
    pub decoder: String,
    /// Canonical file extension without the dot
    pub extension: String,
    /// Image format, `None` for video containers
    pub image_format: Option<ImageFormat>,
}

impl Probe {
    pub fn is_video(&self) -> bool {
        self.image_format.is_none()
    }
}

/// Upload rejected by validation; the message is shown as a form error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("This file is too large (5MB Limit).")]
    TooLarge,

    #[error("File has no valid extension.")]
    NoExtension,

    #[error("Invalid file, supported files: JPG, PNG, GIF, ICO, WEBM, MP4.")]
    Unrecognised,

    #[error("{0} is corrupt.")]
    Corrupt(String),

    #[error("This format is unsupported, supported formats are: JPG, PNG, GIF, ICO, WEBM, MP4.")]
    Unsupported,
}

impl UploadError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::NoExtension => "no_extension",
            Self::Unrecognised => "unrecognised",
            Self::Corrupt(_) => "corrupt",
            Self::Unsupported => "unsupported",
        }
    }
}

/// An upload that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub probe: Probe,
    pub data: Vec<u8>,
}

/// Sniff the container of a byte buffer
pub fn probe(bytes: &[u8]) -> Option<Probe> {
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(video_probe("webm"));
    }
    if is_mp4_video(bytes) {
        return Some(video_probe("mp4"));
    }

    let format = image::guess_format(bytes).ok()?;
    let decoder = format!("{:?}", format).to_ascii_uppercase();
    let extension = match format {
        ImageFormat::Jpeg => "jpg".to_string(),
        _ => decoder.to_ascii_lowercase(),
    };

    Some(Probe {
        decoder,
        extension,
        image_format: Some(format),
    })
}

/// ISO base media brands of MP4 and QuickTime video
///
/// Still-image brands sharing the container (`avif`, `heic`, `mif1`) are
/// left to the image sniffer.
const MP4_BRANDS: &[&[u8; 4]] = &[
    b"isom", b"iso2", b"iso4", b"iso5", b"iso6", b"mp41", b"mp42", b"avc1", b"M4V ", b"qt  ",
    b"dash", b"mmp4", b"MSNV", b"3gp4", b"3gp5", b"3g2a",
];

fn is_mp4_video(bytes: &[u8]) -> bool {
    bytes.len() >= 12
        && &bytes[4..8] == b"ftyp"
        && MP4_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

fn video_probe(extension: &str) -> Probe {
    Probe {
        decoder: VIDEO_DECODER.to_string(),
        extension: extension.to_string(),
        image_format: None,
    }
}

/// Validate an upload
///
/// Checks run in a fixed order: size, extension, recognition, integrity,
/// then whether the decoder is enabled.
pub fn validate_upload(
    file_name: &str,
    data: Vec<u8>,
    formats: &BTreeMap<String, FormatSpec>,
    max_bytes: usize,
) -> Result<ValidatedUpload, UploadError> {
    if data.len() > max_bytes {
        return Err(UploadError::TooLarge);
    }

    let has_extension = Path::new(file_name)
        .extension()
        .is_some_and(|ext| !ext.is_empty());
    if !has_extension {
        return Err(UploadError::NoExtension);
    }

    let probe = probe(&data).ok_or(UploadError::Unrecognised)?;

    let intact = match probe.image_format {
        Some(format) => image::load_from_memory_with_format(&data, format).is_ok(),
        None => data.len() >= MIN_VIDEO_HEADER,
    };
    if !intact {
        return Err(UploadError::Corrupt(file_name.to_string()));
    }

    if !formats.contains_key(&probe.decoder) {
        return Err(UploadError::Unsupported);
    }

    Ok(ValidatedUpload { probe, data })
}

/// Read `(animated, format code)` of a stored file
///
/// Any failure yields `(false, None)`. GIFs only count as animated when a
/// second frame decodes.
pub fn read_attributes(path: &Path, formats: &BTreeMap<String, FormatSpec>) -> (bool, Option<String>) {
    let Ok(data) = std::fs::read(path) else {
        return (false, None);
    };
    attributes_of(&data, formats)
}

/// Same as [`read_attributes`], for bytes already in memory
pub fn attributes_of(data: &[u8], formats: &BTreeMap<String, FormatSpec>) -> (bool, Option<String>) {
    let Some(probe) = probe(data) else {
        return (false, None);
    };
    let Some(spec) = formats.get(&probe.decoder) else {
        return (false, None);
    };

    let mut animated = spec.animated;
    if animated && probe.image_format == Some(ImageFormat::Gif) {
        animated = gif_frame_count(data, 2) >= 2;
    }

    (animated, Some(spec.code.clone()))
}

/// Count decodable GIF frames, stopping at `limit`
fn gif_frame_count(data: &[u8], limit: usize) -> usize {
    let Ok(decoder) = image::codecs::gif::GifDecoder::new(Cursor::new(data)) else {
        return 0;
    };

    decoder
        .into_frames()
        .take(limit)
        .take_while(|frame| frame.is_ok())
        .count()
}

/// Render a JPEG thumbnail of the first frame, fitted into a square box
///
/// Returns `None` for videos and undecodable images.
pub fn render_thumbnail(data: &[u8], max_edge: u32) -> Option<Vec<u8>> {
    let probe = probe(data)?;
    let format = probe.image_format?;
    let image = image::load_from_memory_with_format(data, format).ok()?;

    let thumbnail = DynamicImage::ImageRgb8(image.thumbnail(max_edge, max_edge).to_rgb8());
    let mut buffer = Vec::new();
    thumbnail
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Jpeg(85))
        .ok()?;

    Some(buffer)
}

#[cfg(test)]
pub(crate) mod test_images {
    //! Small in-memory images for tests

    use image::codecs::gif::GifEncoder;
    use image::{Frame, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
            .unwrap();
        buffer
    }

    pub fn gif(frames: usize) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buffer);
            let frames = (0..frames).map(|i| {
                let shade = (i * 60 % 255) as u8;
                Frame::new(RgbaImage::from_pixel(4, 4, Rgba([shade, shade, shade, 255])))
            });
            encoder.encode_frames(frames).unwrap();
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::test_images::{gif, png};
    use super::*;
    use crate::config::default_media_formats;

    const LIMIT: usize = 5 * 1024 * 1024;

    #[test]
    fn probe_recognises_images_and_videos() {
        let probe_png = probe(&png(2, 2)).unwrap();
        assert_eq!(probe_png.decoder, "PNG");
        assert_eq!(probe_png.extension, "png");
        assert!(!probe_png.is_video());

        let webm = [0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(probe(&webm).unwrap().extension, "webm");

        let mp4 = b"\0\0\0\x18ftypmp42\0\0\0\0";
        let probe_mp4 = probe(mp4).unwrap();
        assert_eq!(probe_mp4.decoder, VIDEO_DECODER);
        assert_eq!(probe_mp4.extension, "mp4");

        assert!(probe(b"plain text").is_none());
    }

    #[test]
    fn probe_leaves_still_image_brands_to_image_sniffing() {
        let quicktime = b"\0\0\0\x14ftypqt  \0\0\0\0";
        assert!(probe(quicktime).unwrap().is_video());

        for header in [
            &b"\0\0\0\x1cftypavif\0\0\0\0avifmif1miaf"[..],
            &b"\0\0\0\x18ftypheic\0\0\0\0mif1heic"[..],
        ] {
            assert!(
                probe(header).map_or(true, |probe| !probe.is_video()),
                "{:?} classified as video",
                String::from_utf8_lossy(header)
            );
        }
    }

    #[test]
    fn validate_accepts_png() {
        let upload = validate_upload("cat.png", png(8, 8), &default_media_formats(), LIMIT).unwrap();
        assert_eq!(upload.probe.extension, "png");
    }

    #[test]
    fn validate_checks_size_first() {
        let result = validate_upload("cat", vec![0; 11], &default_media_formats(), 10);
        assert_eq!(result.unwrap_err(), UploadError::TooLarge);
    }

    #[test]
    fn validate_requires_extension() {
        let result = validate_upload("cat", png(2, 2), &default_media_formats(), LIMIT);
        assert_eq!(result.unwrap_err(), UploadError::NoExtension);
    }

    #[test]
    fn validate_rejects_unknown_content() {
        let result = validate_upload("notes.txt", b"hello".to_vec(), &default_media_formats(), LIMIT);
        let error = result.unwrap_err();
        assert_eq!(error, UploadError::Unrecognised);
        assert_eq!(
            error.to_string(),
            "Invalid file, supported files: JPG, PNG, GIF, ICO, WEBM, MP4."
        );
    }

    #[test]
    fn validate_reports_truncated_image_as_corrupt() {
        let mut data = png(16, 16);
        data.truncate(40);

        let error = validate_upload("cat.png", data, &default_media_formats(), LIMIT).unwrap_err();
        assert_eq!(error.to_string(), "cat.png is corrupt.");
    }

    #[test]
    fn validate_reports_truncated_video_as_corrupt() {
        let data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x01];
        let error = validate_upload("clip.webm", data, &default_media_formats(), LIMIT).unwrap_err();
        assert_eq!(error, UploadError::Corrupt("clip.webm".to_string()));
    }

    #[test]
    fn validate_rejects_disabled_decoder() {
        let mut formats = default_media_formats();
        formats.remove("PNG");

        let error = validate_upload("cat.png", png(2, 2), &formats, LIMIT).unwrap_err();
        assert_eq!(error, UploadError::Unsupported);
    }

    #[test]
    fn attributes_detect_animated_gif() {
        let formats = default_media_formats();

        assert_eq!(attributes_of(&gif(3), &formats), (true, Some("GIF".to_string())));
        assert_eq!(attributes_of(&gif(1), &formats), (false, Some("GIF".to_string())));
        assert_eq!(attributes_of(&png(2, 2), &formats), (false, Some("PNG".to_string())));
    }

    #[test]
    fn attributes_fail_silently() {
        let formats = default_media_formats();
        assert_eq!(attributes_of(b"garbage", &formats), (false, None));
        assert_eq!(
            read_attributes(Path::new("/nonexistent/file.png"), &formats),
            (false, None)
        );

        let mut without_png = formats.clone();
        without_png.remove("PNG");
        assert_eq!(attributes_of(&png(2, 2), &without_png), (false, None));
    }

    #[test]
    fn thumbnail_fits_box_and_is_jpeg() {
        let thumbnail = render_thumbnail(&png(100, 50), 20).unwrap();
        let decoded = image::load_from_memory(&thumbnail).unwrap();

        assert_eq!(image::guess_format(&thumbnail).unwrap(), ImageFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn videos_get_no_thumbnail() {
        let webm = [0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(render_thumbnail(&webm, 20).is_none());
    }
}
