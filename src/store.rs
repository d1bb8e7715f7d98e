//! Blob store client: whole-object get and put.
//!
//! The handler only ever needs two calls, so the trait is tiny. The S3
//! implementation wraps an already-configured [`aws_sdk_s3::Client`]; the
//! caller builds it once per execution environment and passes it in.
//! [`MemoryBlobStore`] stands in for S3 in tests and local runs.

use crate::error::HandlerError;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the whole object. Missing objects are a `StoreRead` error.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, HandlerError>;

    /// Write the whole object, replacing any existing one. Returns the key.
    async fn store(&self, bucket: &str, key: &str, bytes: Vec<u8>)
        -> Result<String, HandlerError>;
}

// ── S3 ───────────────────────────────────────────────────────────────────

pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, HandlerError> {
        let read_err = |reason: String| HandlerError::StoreRead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| read_err(DisplayErrorContext(&e).to_string()))?;

        let data = res
            .body
            .collect()
            .await
            .map_err(|e| read_err(e.to_string()))?
            .to_vec();

        debug!("Fetched s3://{bucket}/{key} ({} bytes)", data.len());
        Ok(data)
    }

    async fn store(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, HandlerError> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type_for(key).map(str::to_string))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| HandlerError::StoreWrite {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        info!("Uploaded s3://{bucket}/{key} ({len} bytes)");
        Ok(key.to_string())
    }
}

fn content_type_for(key: &str) -> Option<&'static str> {
    key.to_ascii_lowercase()
        .ends_with(".pdf")
        .then_some("application/pdf")
}

// ── In-memory ────────────────────────────────────────────────────────────

/// A bucket map held in memory, with call counters for assertions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fetches: AtomicUsize,
    stores: AtomicUsize,
    reject_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.to_string(), key.to_string()), bytes.into());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of `fetch` calls so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `store` calls so far, successful or not.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Make every subsequent `store` fail as if access were denied.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, HandlerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.get(bucket, key).ok_or_else(|| HandlerError::StoreRead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: "NoSuchKey: the specified key does not exist".to_string(),
        })
    }

    async fn store(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, HandlerError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(HandlerError::StoreWrite {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "AccessDenied".to_string(),
            });
        }
        self.insert(bucket, key, bytes);
        Ok(key.to_string())
    }
}
