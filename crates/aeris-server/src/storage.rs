//! Object storage for raster blobs (S3 or MinIO-compatible).
//!
//! Storage is optional: `from_config` returns `None` when no provider is
//! configured and every consumer documents its fallback.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::config::Config;

pub struct ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ObjectStorage {
    /// Build a client when a provider is configured, otherwise `None`.
    /// MinIO needs an endpoint URL; plain S3 needs credentials.
    pub async fn from_config(config: &Config) -> Option<ObjectStorage> {
        let provider = config
            .object_storage_provider
            .as_deref()
            .map(|p| p.to_lowercase())?;
        match provider.as_str() {
            "minio" => config.object_storage_endpoint_url.as_ref()?,
            "s3" => {
                config.aws_access_key_id.as_ref()?;
                config.aws_secret_access_key.as_ref()?
            }
            _ => return None,
        };

        let region = config
            .aws_region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let (Some(key), Some(secret)) =
            (&config.aws_access_key_id, &config.aws_secret_access_key)
        {
            builder = builder.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "aeris-config",
            ));
        }
        if provider == "minio" {
            if let Some(endpoint) = &config.object_storage_endpoint_url {
                builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
            }
        }

        info!("Object storage configured: provider={provider}");
        Some(ObjectStorage {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.object_storage_bucket.clone(),
        })
    }

    /// Upload bytes under a key; returns the key as the bucket path.
    pub async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("object upload failed for {key}"))?;
        Ok(key.to_string())
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("object download failed for {key}"))?;
        let bytes = object
            .body
            .collect()
            .await
            .with_context(|| format!("object body read failed for {key}"))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

/// Object-store key for an hour's audit GeoTIFF.
pub fn audit_key(gas: &str, timestamp: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "audit/geotiff/{}/{}_{}.tif",
        timestamp.format("%Y-%m-%d"),
        gas,
        timestamp.format("%H"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_audit_key_shape() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        assert_eq!(audit_key("NO2", ts), "audit/geotiff/2026-03-01/NO2_14.tif");
    }
}
