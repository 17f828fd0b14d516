//! File storage on AWS S3 (or an S3-compatible endpoint).
//!
//! Bucket, region, endpoint and key prefix are stored in `aws_s3_settings`;
//! the access keys come from the environment. Objects are written with
//! SigV4-signed `PUT` requests and served through presigned `GET` URLs.

pub mod sigv4;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use url::Url;

use crate::config::S3Credentials;
use crate::db::{RepositoryError, StorageSettingsRepository};
use crate::models::content::S3Settings;

use sigv4::Keys;

/// Upload size cap for receipts and images.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default lifetime of presigned download links.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(60 * 60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// File kinds the platform accepts, detected from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Png,
    Webp,
    Pdf,
}

impl FileKind {
    pub const IMAGES: &'static [Self] = &[Self::Jpeg, Self::Png, Self::Webp];
    pub const RECEIPTS: &'static [Self] = &[Self::Jpeg, Self::Png, Self::Webp, Self::Pdf];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }

    /// Detect from magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
            Some(Self::Webp)
        } else if bytes.starts_with(b"%PDF-") {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file storage is not configured")]
    NotConfigured,

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("S3 returned {status}: {message}")]
    S3 { status: u16, message: String },

    #[error("invalid storage URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Check size and content type against an allow-list.
///
/// # Errors
///
/// Returns `StorageError::TooLarge` or `UnsupportedFileType`.
pub fn check_upload(bytes: &[u8], allowed: &[FileKind]) -> Result<FileKind, StorageError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(StorageError::TooLarge {
            size: bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }
    FileKind::sniff(bytes)
        .filter(|kind| allowed.contains(kind))
        .ok_or_else(|| {
            let allowed: Vec<&str> = allowed.iter().map(|k| k.extension()).collect();
            StorageError::UnsupportedFileType(format!("expected one of {}", allowed.join(", ")))
        })
}

/// Reject keys that could escape the prefix or need escaping in URLs.
///
/// # Errors
///
/// Returns `StorageError::InvalidKey`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key.len() <= 512
        && !key.starts_with('/')
        && key.split('/').all(|s| !s.is_empty() && s != "." && s != "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_owned()))
    }
}

/// `{prefix}/{folder}/{uuid}.{ext}`.
#[must_use]
pub fn object_key(prefix: &str, folder: &str, kind: FileKind) -> String {
    let prefix = prefix.trim_matches('/');
    let folder = folder.trim_matches('/');
    let name = format!("{}.{}", uuid::Uuid::new_v4(), kind.extension());
    [prefix, folder, name.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Object URL: virtual-hosted on AWS, path-style on custom endpoints.
///
/// # Errors
///
/// Returns `StorageError::Url` if the endpoint is malformed.
pub fn object_url(settings: &S3Settings, key: &str) -> Result<Url, StorageError> {
    let base = match &settings.endpoint {
        Some(endpoint) => format!(
            "{}/{}/",
            endpoint.trim_end_matches('/'),
            settings.bucket_name
        ),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/",
            settings.bucket_name, settings.region
        ),
    };
    Ok(Url::parse(&base)?.join(key)?)
}

/// Where an upload landed.
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub mime_type: &'static str,
    pub size: usize,
}

/// S3 client.
#[derive(Clone)]
pub struct StorageService {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    client: reqwest::Client,
    credentials: Option<S3Credentials>,
}

impl StorageService {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(credentials: Option<S3Credentials>) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(StorageInner {
                client,
                credentials,
            }),
        })
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.inner.credentials.is_some()
    }

    async fn active(&self, pool: &PgPool) -> Result<(S3Settings, &S3Credentials), StorageError> {
        let credentials = self
            .inner
            .credentials
            .as_ref()
            .ok_or(StorageError::NotConfigured)?;
        let settings = match StorageSettingsRepository::new(pool).get().await {
            Ok(s) if s.is_active => s,
            Ok(_) | Err(RepositoryError::NotFound) => return Err(StorageError::NotConfigured),
            Err(e) => return Err(e.into()),
        };
        Ok((settings, credentials))
    }

    /// Validate and store a file under `folder`.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any network call, then S3 errors.
    #[tracing::instrument(skip(self, pool, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        pool: &PgPool,
        folder: &str,
        bytes: Vec<u8>,
        allowed: &[FileKind],
    ) -> Result<StoredObject, StorageError> {
        let kind = check_upload(&bytes, allowed)?;
        let (settings, credentials) = self.active(pool).await?;

        let key = object_key(&settings.path_prefix, folder, kind);
        let url = object_url(&settings, &key)?;
        let size = bytes.len();
        let payload_hash = sigv4::sha256_hex(&bytes);
        let signed = sigv4::sign_request(
            keys(credentials),
            &settings.region,
            "PUT",
            &url,
            &[("content-type", kind.mime_type())],
            &payload_hash,
            Utc::now(),
        );

        let response = self
            .inner
            .client
            .put(url.clone())
            .header("content-type", kind.mime_type())
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("authorization", &signed.authorization)
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;

        let public = settings
            .public_url
            .as_deref()
            .map(|base| format!("{}/{key}", base.trim_end_matches('/')))
            .unwrap_or_else(|| url.to_string());
        tracing::info!(key = %key, "Object stored");

        Ok(StoredObject {
            key,
            url: public,
            mime_type: kind.mime_type(),
            size,
        })
    }

    /// Delete an object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` for unsafe keys.
    pub async fn delete(&self, pool: &PgPool, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let (settings, credentials) = self.active(pool).await?;
        let url = object_url(&settings, key)?;
        self.signed_empty(reqwest::Method::DELETE, &settings, credentials, url)
            .await
    }

    /// A time-limited download link.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` for unsafe keys.
    pub async fn presigned_get(
        &self,
        pool: &PgPool,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let (settings, credentials) = self.active(pool).await?;
        let url = object_url(&settings, key)?;
        Ok(sigv4::presign_url(
            keys(credentials),
            &settings.region,
            "GET",
            &url,
            ttl.as_secs(),
            Utc::now(),
        )
        .to_string())
    }

    /// `HEAD` the bucket and record the result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotConfigured` without credentials, otherwise
    /// the failure that was recorded.
    pub async fn test_connection(&self, pool: &PgPool) -> Result<(), StorageError> {
        let credentials = self
            .inner
            .credentials
            .as_ref()
            .ok_or(StorageError::NotConfigured)?;
        let repo = StorageSettingsRepository::new(pool);
        let settings = repo.get().await?;

        let bucket_url = object_url(&settings, "")?;
        let result = self
            .signed_empty(reqwest::Method::HEAD, &settings, credentials, bucket_url)
            .await;

        repo.record_test(result.is_ok()).await?;
        if let Err(e) = &result {
            tracing::warn!(bucket = %settings.bucket_name, error = %e, "S3 connection test failed");
        }
        result
    }

    async fn signed_empty(
        &self,
        method: reqwest::Method,
        settings: &S3Settings,
        credentials: &S3Credentials,
        url: Url,
    ) -> Result<(), StorageError> {
        let payload_hash = sigv4::sha256_hex(b"");
        let signed = sigv4::sign_request(
            keys(credentials),
            &settings.region,
            method.as_str(),
            &url,
            &[],
            &payload_hash,
            Utc::now(),
        );
        let response = self
            .inner
            .client
            .request(method, url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("authorization", &signed.authorization)
            .send()
            .await?;
        check_status(response).await
    }
}

fn keys(credentials: &S3Credentials) -> Keys<'_> {
    Keys {
        access_key_id: &credentials.access_key_id,
        secret_access_key: credentials.secret_access_key.expose_secret(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::S3 {
        status: status.as_u16(),
        message: body.chars().take(300).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings(endpoint: Option<&str>) -> S3Settings {
        S3Settings {
            region: "eu-central-1".to_owned(),
            bucket_name: "momtazchem-files".to_owned(),
            endpoint: endpoint.map(str::to_owned),
            public_url: None,
            path_prefix: "uploads".to_owned(),
            is_active: true,
            test_status: "untested".to_owned(),
            last_tested: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sniff_file_kinds() {
        assert_eq!(FileKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(FileKind::Jpeg));
        assert_eq!(
            FileKind::sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Some(FileKind::Png)
        );
        assert_eq!(FileKind::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(FileKind::Webp));
        assert_eq!(FileKind::sniff(b"%PDF-1.7\n"), Some(FileKind::Pdf));
        assert_eq!(FileKind::sniff(b"<html>"), None);
    }

    #[test]
    fn test_check_upload_rules() {
        assert_eq!(check_upload(b"%PDF-1.4", FileKind::RECEIPTS).unwrap(), FileKind::Pdf);
        assert!(matches!(
            check_upload(b"%PDF-1.4", FileKind::IMAGES),
            Err(StorageError::UnsupportedFileType(_))
        ));
        let mut big = b"%PDF-".to_vec();
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        assert!(matches!(
            check_upload(&big, FileKind::RECEIPTS),
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("uploads/receipts/4f1c.png").is_ok());
        for bad in ["", "/abs", "uploads/../secret", "a//b", "space name.png", "q?x=1"] {
            assert!(validate_key(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_object_key_layout() {
        let key = object_key("uploads/", "/receipts", FileKind::Png);
        assert!(key.starts_with("uploads/receipts/"));
        assert!(key.ends_with(".png"));
        assert!(validate_key(&key).is_ok());
        assert!(object_key("", "images", FileKind::Jpeg).starts_with("images/"));
    }

    #[test]
    fn test_object_url_styles() {
        let aws = object_url(&settings(None), "uploads/a.png").unwrap();
        assert_eq!(
            aws.as_str(),
            "https://momtazchem-files.s3.eu-central-1.amazonaws.com/uploads/a.png"
        );
        let custom = object_url(&settings(Some("https://storage.example.ir/")), "uploads/a.png").unwrap();
        assert_eq!(
            custom.as_str(),
            "https://storage.example.ir/momtazchem-files/uploads/a.png"
        );
    }
}
