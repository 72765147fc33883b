//! Reads images from object storage.

use crate::trigger::ImageReference;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, instrument};

/// Anything images can be read from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads the whole content of an object.
    async fn fetch(&self, image: &ImageReference) -> Result<Vec<u8>>;
}

/// An image reference together with the content read for it.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub reference: ImageReference,
    pub content: Vec<u8>,
}

/// Object store backed by the S3-compatible storage API.
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Initialize a store reading through the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn fetch(&self, image: &ImageReference) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&image.bucket_id)
            .key(&image.object_id)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to download object {:?} from bucket {:?}",
                    image.object_id, image.bucket_id
                )
            })?;
        // Collecting drains the body, so the connection is released here
        let content = response
            .body
            .collect()
            .await
            .with_context(|| {
                format!(
                    "Failed to read the contents of object {:?} from bucket {:?}",
                    image.object_id, image.bucket_id
                )
            })?
            .into_bytes();
        if content.is_empty() {
            bail!(
                "Got an empty body for object {:?} from bucket {:?}",
                image.object_id,
                image.bucket_id
            );
        }
        Ok(content.to_vec())
    }
}

/// Reads every referenced image, keeping at most `concurrency`
/// reads in flight. Results keep the order of `images`. The first
/// failure stops the whole operation and nothing after it is read.
#[instrument(skip(store, images), fields(images = images.len()))]
pub async fn fetch_all(
    store: &dyn ObjectStore,
    images: Vec<ImageReference>,
    concurrency: usize,
) -> Result<Vec<FetchedImage>> {
    stream::iter(images)
        .map(|reference| async move {
            let content = store.fetch(&reference).await?;
            info!(image = %reference, size_bytes = content.len(), "Read image");
            Ok::<_, anyhow::Error>(FetchedImage { reference, content })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
