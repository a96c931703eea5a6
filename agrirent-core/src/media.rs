use async_trait::async_trait;

/// External image storage for damage/proof photos.
///
/// Photos arrive from clients as base64 payloads; the store hands back a
/// durable URL. Upload failures propagate as [`UploadError`] before any
/// booking field is touched.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, data: &str) -> Result<String, UploadError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Image upload failed: {0}")]
pub struct UploadError(pub String);

/// Test double that "stores" images by hashing length into a fake URL.
pub struct MockImageStore;

#[async_trait]
impl ImageStore for MockImageStore {
    async fn upload(&self, data: &str) -> Result<String, UploadError> {
        if data.is_empty() {
            return Err(UploadError("empty payload".to_string()));
        }
        tracing::debug!(bytes = data.len(), "Mock image store accepted upload");
        Ok(format!("https://images.agrirent.local/{}", uuid::Uuid::new_v4()))
    }
}
