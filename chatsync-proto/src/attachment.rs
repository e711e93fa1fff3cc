//! Attachment types: raw upload payloads, stored-resource descriptors,
//! and the attachment record owned by a message.

use serde::{Deserialize, Serialize};

/// Resolvable location of an attachment's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentUrl {
    /// Transient local preview URL, valid only before upload completes.
    LocalPreview(String),
    /// Durable server URL, valid after upload.
    Stored(String),
}

impl AttachmentUrl {
    /// Returns the URL string regardless of variant.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LocalPreview(url) | Self::Stored(url) => url,
        }
    }

    /// Returns `true` once the attachment has a durable server URL.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

/// Attachment record owned exclusively by its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    /// MIME type of the content.
    pub mime_type: String,
    /// Whether the content is an image (renderable inline).
    pub is_image: bool,
    /// Where the bytes can be fetched from.
    pub url: AttachmentUrl,
}

/// Stored-resource descriptor returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Original file name.
    pub file_name: String,
    /// Server-side path of the stored file.
    pub file_path: String,
    /// Size in bytes.
    pub file_size: u64,
    /// MIME type of the content.
    pub mime_type: String,
    /// Whether the content is an image.
    pub is_image: bool,
}

impl StoredFile {
    /// Converts this descriptor into a durable [`Attachment`].
    #[must_use]
    pub fn into_attachment(self) -> Attachment {
        Attachment {
            file_name: self.file_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            is_image: self.is_image,
            url: AttachmentUrl::Stored(self.file_path),
        }
    }
}

/// Raw binary payload handed to the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    /// Original file name.
    pub file_name: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// The file bytes.
    pub bytes: Vec<u8>,
}

impl AttachmentPayload {
    /// Returns `true` for MIME types rendered inline as images.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Builds the transient pre-upload attachment shown while the upload
    /// is in flight, pointing at a local preview URL.
    #[must_use]
    pub fn preview_attachment(&self, preview_url: impl Into<String>) -> Attachment {
        Attachment {
            file_name: self.file_name.clone(),
            file_size: self.bytes.len() as u64,
            mime_type: self.mime_type.clone(),
            is_image: self.is_image(),
            url: AttachmentUrl::LocalPreview(preview_url.into()),
        }
    }
}
