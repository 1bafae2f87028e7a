use crate::backend::{error_message, BackendClient};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// Extension used when the local file has none
const FALLBACK_EXTENSION: &str = "jpg";

/// Result of a successful image upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Publicly resolvable address of the object
    pub public_url: String,
    /// Generated object key inside the bucket
    pub storage_path: String,
}

/// Destination for picked photos.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload the file behind `local_uri` and return where it can be read back.
    async fn upload_image(&self, local_uri: &str) -> Result<UploadedImage>;
}

/// Object storage client writing photos into one public bucket
pub struct StorageClient {
    backend: Arc<BackendClient>,
    bucket: String,
}

impl StorageClient {
    /// Create a new storage client
    pub fn new(backend: Arc<BackendClient>, config: &StorageConfig) -> Self {
        info!(bucket = %config.bucket, "Storage client initialized");

        Self {
            backend,
            bucket: config.bucket.clone(),
        }
    }

    /// Generate a unique object key for a local file.
    /// Format: {uuid-v4}.{extension}
    ///
    /// The user's file name never reaches the bucket; only its extension does.
    pub fn generate_object_key(&self, local_path: &Path) -> String {
        format!("{}.{}", Uuid::new_v4(), file_extension(local_path))
    }

    /// Public read address for an object key
    pub fn public_url(&self, storage_path: &str) -> String {
        self.backend.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            self.bucket, storage_path
        ))
    }

    fn upload_url(&self, storage_path: &str) -> String {
        self.backend
            .endpoint(&format!("storage/v1/object/{}/{}", self.bucket, storage_path))
    }
}

#[async_trait]
impl ImageStore for StorageClient {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn upload_image(&self, local_uri: &str) -> Result<UploadedImage> {
        if local_uri.trim().is_empty() {
            return Err(Error::Validation("No image selected".to_string()));
        }

        let local_path = resolve_local_path(local_uri)?;

        // Distinguish "file vanished" from "network failed"
        if !tokio::fs::try_exists(&local_path).await? {
            return Err(Error::NotFound(local_path.display().to_string()));
        }

        let storage_path = self.generate_object_key(&local_path);
        let extension = file_extension(&local_path);
        let bytes = tokio::fs::read(&local_path).await?;

        debug!(
            storage_path = %storage_path,
            size_bytes = bytes.len(),
            "Uploading image to storage"
        );

        let part = Part::bytes(bytes)
            .file_name(storage_path.clone())
            .mime_str(&get_content_type(&extension))?;
        let form = Form::new().part("file", part);

        let response = self
            .backend
            .http()
            .post(self.upload_url(&storage_path))
            .multipart(form)
            .timeout(self.backend.timeout())
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Error::Upload {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let public_url = self.public_url(&storage_path);

        info!(
            storage_path = %storage_path,
            status = status.as_u16(),
            "Image uploaded successfully"
        );

        Ok(UploadedImage {
            public_url,
            storage_path,
        })
    }
}

/// Turn a `file://` URI or a plain path into a filesystem path
pub(crate) fn resolve_local_path(local_uri: &str) -> Result<PathBuf> {
    let local_uri = local_uri.trim();

    if local_uri.starts_with("file:") {
        let url = Url::parse(local_uri)
            .map_err(|e| Error::Validation(format!("Invalid file URI {local_uri}: {e}")))?;
        return url
            .to_file_path()
            .map_err(|_| Error::Validation(format!("Invalid file URI {local_uri}")));
    }

    Ok(PathBuf::from(local_uri))
}

/// Lower-cased, sanitized extension of a local file, `jpg` when absent
fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(sanitize_extension)
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Keep only ASCII alphanumerics so the key stays a single path component
fn sanitize_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Get content type for an image extension
fn get_content_type(extension: &str) -> String {
    match extension {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, header, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_client(base_url: &str) -> StorageClient {
        let backend = BackendClient::new(&BackendConfig::new(base_url, "anon-key")).unwrap();
        StorageClient::new(Arc::new(backend), &StorageConfig::default())
    }

    fn create_photo(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"fake image bytes").unwrap();
        path
    }

    fn file_uri(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(Path::new("/tmp/photo.png")), "png");
        assert_eq!(file_extension(Path::new("/tmp/photo.JPG")), "jpg");
        assert_eq!(file_extension(Path::new("/tmp/photo")), "jpg");
        assert_eq!(file_extension(Path::new("/tmp/photo.")), "jpg");
        assert_eq!(file_extension(Path::new("/tmp/photo.we/bp")), "jpg");
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("png"), "png");
        assert_eq!(sanitize_extension("P N-G"), "png");
        assert_eq!(sanitize_extension("../"), "");
    }

    #[test]
    fn test_get_content_type() {
        assert_eq!(get_content_type("jpg"), "image/jpeg");
        assert_eq!(get_content_type("jpeg"), "image/jpeg");
        assert_eq!(get_content_type("png"), "image/png");
        assert_eq!(get_content_type("heic"), "image/heic");
    }

    #[test]
    fn test_resolve_local_path() {
        assert_eq!(
            resolve_local_path("file:///tmp/photo.png").unwrap(),
            PathBuf::from("/tmp/photo.png")
        );
        assert_eq!(
            resolve_local_path("/tmp/photo.png").unwrap(),
            PathBuf::from("/tmp/photo.png")
        );
        assert!(matches!(
            resolve_local_path("file://remote-host/photo.png"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_object_keys_are_unique() {
        let client = create_client("https://example.supabase.co");
        let path = Path::new("/tmp/photo.png");

        let first = client.generate_object_key(path);
        let second = client.generate_object_key(path);

        assert_ne!(first, second);
        assert!(first.ends_with(".png"));
        assert!(Uuid::parse_str(first.trim_end_matches(".png")).is_ok());
    }

    #[test]
    fn test_public_url() {
        let client = create_client("https://example.supabase.co");
        assert_eq!(
            client.public_url("abc.png"),
            "https://example.supabase.co/storage/v1/object/public/memories/abc.png"
        );
    }

    #[tokio::test]
    async fn test_upload_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/storage/v1/object/memories/[0-9a-f-]{36}\.png$"))
            .and(header("authorization", "Bearer anon-key"))
            .and(header("apikey", "anon-key"))
            .and(body_string_contains("name=\"file\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "memories/ignored.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = create_photo(&dir, "photo.png");
        let client = create_client(&server.uri());

        let uploaded = client.upload_image(&file_uri(&photo)).await.unwrap();

        let stem = uploaded.storage_path.trim_end_matches(".png");
        assert!(uploaded.storage_path.ends_with(".png"));
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(
            uploaded.public_url,
            format!(
                "{}/storage/v1/object/public/memories/{}",
                server.uri(),
                uploaded.storage_path
            )
        );
    }

    #[tokio::test]
    async fn test_upload_accepts_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = create_photo(&dir, "photo.jpeg");
        let client = create_client(&server.uri());

        let uploaded = client.upload_image(photo.to_str().unwrap()).await.unwrap();
        assert!(uploaded.storage_path.ends_with(".jpeg"));
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "storage unavailable"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = create_photo(&dir, "photo.png");
        let client = create_client(&server.uri());

        let err = client.upload_image(&file_uri(&photo)).await.unwrap_err();
        match err {
            Error::Upload { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "storage unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_other_success_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let photo = create_photo(&dir, "photo.png");
        let client = create_client(&server.uri());

        let err = client.upload_image(&file_uri(&photo)).await.unwrap_err();
        assert!(matches!(err, Error::Upload { status: 204, .. }));
    }

    #[tokio::test]
    async fn test_missing_file_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.png");
        let client = create_client(&server.uri());

        let err = client.upload_image(&file_uri(&missing)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Bind then release a port so nothing listens on it
        let base_url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };

        let dir = tempfile::tempdir().unwrap();
        let photo = create_photo(&dir, "beach.jpg");
        let client = create_client(&base_url);

        let err = client.upload_image(&file_uri(&photo)).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_empty_uri_is_validation_error() {
        let client = create_client("https://example.supabase.co");
        let err = client.upload_image("  ").await.unwrap_err();
        assert!(err.is_validation());
    }
}
