use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use super::{BlobError, BlobStore};
use crate::config::S3Settings;

/// S3-backed blob store. Works against AWS or any S3-compatible endpoint.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Result<Self, BlobError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse::<Region>()
                .map_err(|e| BlobError::Unavailable(format!("region: {}", e)))?,
        };

        let credentials = Credentials::new(
            Some(settings.access_key_id.as_str()),
            Some(settings.secret_access_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| BlobError::Unavailable(format!("credentials: {}", e)))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| BlobError::Unavailable(format!("bucket: {}", e)))?;
        if settings.endpoint.is_some() {
            bucket.set_path_style();
        }

        Ok(Self {
            bucket,
            public_base_url: public_base_url(settings),
        })
    }
}

/// Virtual-hosted AWS URLs by default, path-style under a custom endpoint.
fn public_base_url(settings: &S3Settings) -> String {
    match &settings.endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), settings.bucket),
        None => format!(
            "https://{}.s3.{}.amazonaws.com",
            settings.bucket, settings.region
        ),
    }
}

/// Everything except RFC 3986 unreserved characters is escaped inside a key segment.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn map_s3_error(e: S3Error) -> BlobError {
    BlobError::Unavailable(format!("s3: {}", e))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), BlobError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| {
                log::error!("S3 upload of {} failed: {}", key, e);
                map_s3_error(e)
            })?;

        if response.status_code() >= 300 {
            return Err(BlobError::Unavailable(format!(
                "s3 put {}: status {}",
                key,
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let response = self.bucket.delete_object(key).await.map_err(map_s3_error)?;
        // S3 answers 204 for missing keys too; 404 only shows up on some compatible stores.
        match response.status_code() {
            code if code < 300 || code == 404 => Ok(()),
            code => Err(BlobError::Unavailable(format!(
                "s3 delete {}: status {}",
                key, code
            ))),
        }
    }

    fn resolve_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, encode_key(key))
    }
}
