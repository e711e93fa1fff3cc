//! Attachment upload pipeline.
//!
//! Payloads are validated against local limits before any network call;
//! only a payload that passes is handed to the resource API, which returns
//! the stored-file descriptor the send pipeline embeds in the message.

use chatsync_proto::attachment::{AttachmentPayload, StoredFile};

use crate::channel::{ApiError, ResourceApi};

/// Errors from the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The payload has no bytes.
    #[error("attachment is empty")]
    Empty,

    /// The payload exceeds the configured ceiling.
    #[error("attachment too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual payload size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        max: u64,
    },

    /// The resource API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Validates and uploads attachment payloads.
#[derive(Debug, Clone, Copy)]
pub struct Uploader {
    max_bytes: u64,
}

impl Uploader {
    /// Creates an uploader with the given size ceiling in bytes.
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Validates a payload against local limits without touching the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Empty`] for a zero-byte payload and
    /// [`UploadError::TooLarge`] for one over the ceiling.
    pub fn check(&self, payload: &AttachmentPayload) -> Result<(), UploadError> {
        let size = payload.bytes.len() as u64;
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Validates, then uploads the payload through the resource API.
    ///
    /// # Errors
    ///
    /// Local validation errors are returned before any network call;
    /// [`UploadError::Api`] wraps transport failures.
    pub async fn upload<A: ResourceApi>(
        &self,
        api: &A,
        payload: &AttachmentPayload,
    ) -> Result<StoredFile, UploadError> {
        self.check(payload)?;
        tracing::debug!(
            file_name = %payload.file_name,
            size = payload.bytes.len(),
            "uploading attachment"
        );
        Ok(api.upload(payload).await?)
    }
}
