//! Core data models for Shelf
//!
//! `ClipData` is the in-memory normalized form of one clipboard snapshot.
//! It is never stored in the database directly: the payload goes to a file
//! (see `PayloadEnvelope`) and only a `ClipRecord` row points at it.


use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interface::{ClipContent, ClipType};

/// Stored titles are capped at this many characters
pub const MAX_TITLE_CHARS: usize = 10_000;

/// Current payload envelope version
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported payload version {0}")]
    UnsupportedVersion(u32),
    #[error("Unknown clip type tag {0:?}")]
    UnknownType(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// CLIP DATA
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized clipboard snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipData {
    /// Captured types, in the pasteboard's declared order
    pub types: Vec<ClipType>,
    pub string_value: String,
    /// RTFD when available, RTF otherwise
    pub rtf_data: Option<Vec<u8>>,
    pub pdf: Option<Vec<u8>>,
    pub file_names: Vec<String>,
    pub urls: Vec<String>,
    /// TIFF bytes as read from the pasteboard
    pub image: Option<Vec<u8>>,
}

impl ClipData {
    /// Plain-text clip, as produced by history import
    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            types: vec![ClipType::String],
            string_value: value.into(),
            ..Default::default()
        }
    }

    /// True when nothing was captured; callers must not persist empty data
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// First captured type in declared order
    pub fn primary_type(&self) -> Option<ClipType> {
        self.types.first().copied()
    }

    /// Content hash used as the dedup key.
    ///
    /// Seeded from the joined type tags, then XOR-mixed with the image
    /// length, one of {file names, URLs, PDF length, string} in that
    /// priority, and finally the RTF length. Collisions are expected and
    /// tolerated; this only needs to catch repeated copies.
    pub fn data_hash(&self) -> i64 {
        let joined: String = self.types.iter().map(|t| t.raw_value()).collect();
        let mut hash = hash_str(&joined);

        if let Some(image) = &self.image {
            hash ^= image.len() as u64;
        }

        if !self.file_names.is_empty() {
            for name in &self.file_names {
                hash ^= hash_str(name);
            }
        } else if !self.urls.is_empty() {
            for url in &self.urls {
                hash ^= hash_str(url);
            }
        } else if let Some(pdf) = &self.pdf {
            hash ^= pdf.len() as u64;
        } else if !self.string_value.is_empty() {
            hash ^= hash_str(&self.string_value);
        }

        if let Some(rtf) = &self.rtf_data {
            hash ^= rtf.len() as u64;
        }

        hash as i64
    }

    /// Stored title: the string value capped at `MAX_TITLE_CHARS`
    pub fn title(&self) -> String {
        self.string_value.chars().take(MAX_TITLE_CHARS).collect()
    }

    pub fn to_content(&self) -> ClipContent {
        ClipContent {
            types: self.types.clone(),
            string_value: self.string_value.clone(),
            rtf_data: self.rtf_data.clone(),
            pdf: self.pdf.clone(),
            file_names: self.file_names.clone(),
            urls: self.urls.clone(),
            image: self.image.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payload serialization
    // ─────────────────────────────────────────────────────────────────────────

    pub fn encode_payload(&self) -> Result<Vec<u8>, PayloadError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let envelope = PayloadEnvelope {
            version: PAYLOAD_VERSION,
            types: self.types.iter().map(|t| t.raw_value().to_string()).collect(),
            string_value: self.string_value.clone(),
            rtf_data: self.rtf_data.as_ref().map(|d| engine.encode(d)),
            pdf: self.pdf.as_ref().map(|d| engine.encode(d)),
            file_names: self.file_names.clone(),
            urls: self.urls.clone(),
            image: self.image.as_ref().map(|d| engine.encode(d)),
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    pub fn decode_payload(bytes: &[u8]) -> Result<Self, PayloadError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let envelope: PayloadEnvelope = serde_json::from_slice(bytes)?;
        if envelope.version != PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(envelope.version));
        }

        let types = envelope
            .types
            .iter()
            .map(|raw| ClipType::from_raw_value(raw).ok_or_else(|| PayloadError::UnknownType(raw.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let decode = |field: Option<String>| -> Result<Option<Vec<u8>>, PayloadError> {
            field.map(|s| engine.decode(s)).transpose().map_err(PayloadError::from)
        };

        Ok(Self {
            types,
            string_value: envelope.string_value,
            rtf_data: decode(envelope.rtf_data)?,
            pdf: decode(envelope.pdf)?,
            file_names: envelope.file_names,
            urls: envelope.urls,
            image: decode(envelope.image)?,
        })
    }
}

impl From<ClipContent> for ClipData {
    fn from(content: ClipContent) -> Self {
        Self {
            types: content.types,
            string_value: content.string_value,
            rtf_data: content.rtf_data,
            pdf: content.pdf,
            file_names: content.file_names,
            urls: content.urls,
            image: content.image,
        }
    }
}

/// On-disk form of `ClipData`. Binary fields are base64 strings.
#[derive(Debug, Serialize, Deserialize)]
struct PayloadEnvelope {
    version: u32,
    types: Vec<String>,
    #[serde(default)]
    string_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rtf_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pdf: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    file_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

/// Stable 64-bit string hash; the value is persisted as a primary key, so
/// it must not depend on the toolchain
fn hash_str(s: &str) -> u64 {
    let digest = blake3::hash(s.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

// ─────────────────────────────────────────────────────────────────────────────
// THUMBNAIL GENERATION
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a PNG thumbnail bounded by `max_width` x `max_height`.
/// Returns None if the image cannot be decoded
pub fn generate_thumbnail(image_data: &[u8], max_width: u32, max_height: u32) -> Option<Vec<u8>> {
    use image::GenericImageView;

    let img = image::load_from_memory(image_data).ok()?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return None;
    }

    let resized = if width <= max_width && height <= max_height {
        img
    } else {
        // Keep aspect ratio, fit inside the bounding box
        let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        img.thumbnail(new_width, new_height)
    };

    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    resized.write_to(&mut cursor, image::ImageFormat::Png).ok()?;
    Some(buf)
}
