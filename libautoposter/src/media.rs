//! Media payload handling
//!
//! Media crosses the HTTP boundary base64-encoded, either as a bare string or
//! as a `{filename, data, alt?}` object. Everything here turns those payloads
//! into [`MediaItem`]s or short-lived files on disk.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::MediaError;
use crate::types::MediaItem;

/// Supported image MIME types, detected from content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect the type from the leading magic bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if data.starts_with(b"GIF8") {
            Some(Self::Gif)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

/// MIME string for an upload, falling back to octet-stream
pub fn mime_for(item: &MediaItem) -> &'static str {
    ImageMimeType::sniff(&item.data)
        .or_else(|| {
            Path::new(&item.filename)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ImageMimeType::from_extension)
        })
        .map(|m| m.as_str())
        .unwrap_or("application/octet-stream")
}

/// Media as it arrives over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaPayload {
    Encoded(String),
    File {
        #[serde(default)]
        filename: Option<String>,
        data: String,
        #[serde(default)]
        alt: Option<String>,
    },
}

impl MediaPayload {
    /// Decode into bytes plus a filename
    ///
    /// `index` names anonymous payloads (`media-1.png`, `media-2.jpg`, ...).
    pub fn decode(&self, index: usize) -> Result<MediaItem, MediaError> {
        match self {
            MediaPayload::Encoded(data) => {
                let bytes = decode_base64(data)?;
                let filename = default_filename(index, &bytes);
                Ok(MediaItem::new(bytes, filename))
            }
            MediaPayload::File {
                filename,
                data,
                alt,
            } => {
                let bytes = decode_base64(data)?;
                let filename = match filename {
                    Some(name) if !name.trim().is_empty() => name.clone(),
                    _ => default_filename(index, &bytes),
                };
                Ok(MediaItem {
                    data: bytes,
                    filename,
                    alt: alt.clone(),
                })
            }
        }
    }
}

fn default_filename(index: usize, data: &[u8]) -> String {
    match ImageMimeType::sniff(data) {
        Some(mime) => format!("media-{}.{}", index + 1, mime.extension()),
        None => format!("media-{}", index + 1),
    }
}

/// Decode standard base64, tolerating a `data:` URL prefix and line breaks
pub fn decode_base64(input: &str) -> Result<Vec<u8>, MediaError> {
    let payload = match input.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => input,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(cleaned)?)
}

pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Filename without its final extension
pub fn filename_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// A decoded payload written to disk for the lifetime of the guard
///
/// The file is removed when the guard drops, whether the upload that used it
/// succeeded or not.
pub struct TempMediaFile {
    file: NamedTempFile,
}

impl TempMediaFile {
    pub fn write(data: &[u8]) -> Result<Self, MediaError> {
        use std::io::Write;

        let suffix = ImageMimeType::sniff(data)
            .map(|m| format!(".{}", m.extension()))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("autoposter-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn from_payload(payload: &MediaPayload, index: usize) -> Result<Self, MediaError> {
        let item = payload.decode(index)?;
        Self::write(&item.data)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_base64_round_trip() {
        let original: Vec<u8> = (0u8..=255).collect();
        let encoded = encode_base64(&original);
        assert_eq!(decode_base64(&encoded).unwrap(), original);
    }

    #[test]
    fn test_decode_data_url_and_whitespace() {
        let encoded = encode_base64(b"imgdata");
        let data_url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_base64(&data_url).unwrap(), b"imgdata");

        let wrapped = format!("{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"imgdata");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_base64("not*base64!").unwrap_err();
        assert!(err.to_string().contains("Invalid base64"));
    }

    #[test]
    fn test_payload_shapes_deserialize() {
        let bare: MediaPayload = serde_json::from_str(r#""aGVsbG8=""#).unwrap();
        assert_eq!(bare, MediaPayload::Encoded("aGVsbG8=".to_string()));

        let object: MediaPayload =
            serde_json::from_str(r#"{"filename": "a.png", "data": "aGVsbG8=", "alt": "hi"}"#)
                .unwrap();
        let item = object.decode(0).unwrap();
        assert_eq!(item.filename, "a.png");
        assert_eq!(item.data, b"hello");
        assert_eq!(item.alt.as_deref(), Some("hi"));
    }

    #[test]
    fn test_anonymous_payload_filename() {
        let mut png = PNG_HEADER.to_vec();
        png.extend_from_slice(b"rest");
        let item = MediaPayload::Encoded(encode_base64(&png)).decode(1).unwrap();
        assert_eq!(item.filename, "media-2.png");

        let item = MediaPayload::Encoded(encode_base64(b"imgdata")).decode(0).unwrap();
        assert_eq!(item.filename, "media-1");
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ImageMimeType::sniff(&PNG_HEADER), Some(ImageMimeType::Png));
        assert_eq!(ImageMimeType::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageMimeType::Jpeg));
        assert_eq!(ImageMimeType::sniff(b"GIF89a"), Some(ImageMimeType::Gif));
        assert_eq!(ImageMimeType::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageMimeType::WebP));
        assert_eq!(ImageMimeType::sniff(b"plain"), None);
    }

    #[test]
    fn test_mime_for_falls_back_to_extension() {
        let item = MediaItem::new(b"???".to_vec(), "photo.JPG");
        assert_eq!(mime_for(&item), "image/jpeg");

        let item = MediaItem::new(b"???".to_vec(), "blob");
        assert_eq!(mime_for(&item), "application/octet-stream");
    }

    #[test]
    fn test_filename_stem() {
        assert_eq!(filename_stem("cat.png"), "cat");
        assert_eq!(filename_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(filename_stem("noext"), "noext");
    }

    #[test]
    fn test_temp_media_file_removed_on_drop() {
        let mut png = PNG_HEADER.to_vec();
        png.extend_from_slice(b"body");

        let guard = TempMediaFile::write(&png).unwrap();
        let path = guard.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(std::fs::read(&path).unwrap(), png);

        drop(guard);
        assert!(!path.exists());
    }
}
