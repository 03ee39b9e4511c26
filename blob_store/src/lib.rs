use std::{env, sync::Arc};

use anyhow::{anyhow, Context, Result};
use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, StreamExt};
use object_store::{
    aws::{AmazonS3Builder, AmazonS3ConfigKey, S3ConditionalPut},
    parse_url,
    parse_url_opts,
    path::Path,
    ObjectStore,
    ObjectStoreScheme,
    PutMode,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub path: Option<String>,
}

impl BlobStorageConfig {
    pub fn new(path: &str) -> Self {
        BlobStorageConfig {
            path: Some(format!("file://{}", path)),
        }
    }
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        let blob_store_path = format!(
            "file://{}",
            env::current_dir()
                .unwrap()
                .join("schemahub_storage/blobs")
                .to_str()
                .unwrap()
        );
        info!("using blob store path: {}", blob_store_path);
        BlobStorageConfig {
            path: Some(blob_store_path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub url: String,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

#[derive(Clone)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,
    path: Path,
}

impl BlobStorage {
    pub fn new(config: BlobStorageConfig) -> Result<Self> {
        let url = config
            .path
            .ok_or(anyhow!("blob storage path is not configured"))?;
        let (object_store, path) = Self::build_object_store(&url)?;
        Ok(Self {
            object_store: Arc::new(object_store),
            path,
        })
    }

    fn build_object_store(url_str: &str) -> Result<(Box<dyn ObjectStore>, Path)> {
        let url = &url_str.parse::<Url>()?;
        let (scheme, _) = ObjectStoreScheme::parse(url)?;
        match scheme {
            ObjectStoreScheme::AmazonS3 => {
                // inject AWS environment variables to prioritize keys over
                // instance metadata credentials.
                let opts: Vec<(AmazonS3ConfigKey, String)> = std::env::vars_os()
                    .filter_map(|(os_key, os_value)| {
                        if let (Some(key), Some(value)) = (os_key.to_str(), os_value.to_str()) {
                            if key.starts_with("AWS_") {
                                if let Ok(config_key) = key.to_ascii_lowercase().parse() {
                                    return Some((config_key, String::from(value)));
                                }
                            }
                        }
                        None
                    })
                    .collect();

                let mut s3_builder = AmazonS3Builder::new().with_url(url_str);
                for (key, value) in opts.iter() {
                    s3_builder = s3_builder.with_config(*key, value.clone());
                }
                // create-only puts require conditional put support on S3
                let s3 = s3_builder
                    .with_conditional_put(S3ConditionalPut::ETagMatch)
                    .build()?;
                let (_, path) = parse_url_opts(url, opts)?;
                Ok((Box::new(s3), path))
            }
            _ => Ok(parse_url(url)?),
        }
    }

    /// Writes a blob under `key` and never replaces an existing object.
    /// Versioned keys are allocated once, so a collision means the version
    /// was already committed or its blob leaked; both must fail loudly.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<PutResult> {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let hash = format!("{:x}", hasher.finalize());
        let size_bytes = data.len() as u64;

        let path = self.absolute_path(key);
        self.object_store
            .put_opts(&path, data.into(), PutMode::Create.into())
            .await
            .with_context(|| format!("failed to write blob at {}", path))?;

        Ok(PutResult {
            url: path.to_string(),
            size_bytes,
            sha256_hash: hash,
        })
    }

    fn absolute_path(&self, key: &str) -> Path {
        Path::from(format!("{}/{}", self.path, key))
    }

    pub async fn get(&self, path: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let client_clone = self.object_store.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let get_result = client_clone
            .get(&path.into())
            .await
            .map_err(|e| anyhow!("can't read object {:?}: {:?}", path, e))?;
        let path = path.to_string();
        tokio::spawn(async move {
            let mut stream = get_result.into_stream();
            while let Some(chunk) = stream.next().await {
                let _ = tx.send(
                    chunk.map_err(|e| anyhow!("error reading object {:?}: {:?}", path.clone(), e)),
                );
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    pub async fn read_bytes(&self, path: &str) -> Result<Bytes> {
        let mut reader = self.get(path).await?;
        let mut bytes = BytesMut::new();
        while let Some(chunk) = reader.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage(dir: &tempfile::TempDir) -> BlobStorage {
        let config = BlobStorageConfig::new(dir.path().to_str().unwrap());
        BlobStorage::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_put_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir);
        let content = Bytes::from_static(b"{\"openapi\":\"3.0.0\"}");
        let result = storage
            .put("demoapp/svc1/v1__openapi.json", content.clone())
            .await
            .unwrap();
        assert_eq!(result.size_bytes, content.len() as u64);
        assert_eq!(result.sha256_hash.len(), 64);

        let read_back = storage.read_bytes(&result.url).await.unwrap();
        assert_eq!(read_back, content);
    }

    #[tokio::test]
    async fn test_put_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir);
        storage
            .put("demoapp/_app/v1__schema.json", Bytes::from_static(b"a"))
            .await
            .unwrap();
        let second = storage
            .put("demoapp/_app/v1__schema.json", Bytes::from_static(b"b"))
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir);
        let result = storage.get("demoapp/svc1/v9__missing.json").await;
        assert!(result.is_err());
    }
}
