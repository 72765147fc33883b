//! Builds the object storage and message queue clients.

use crate::conf::{resolve_endpoint, Settings, QUEUE_SERVICE, STORAGE_SERVICE};
use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Region;
use tracing::info;

/// Load the shared AWS configuration (credentials and the like) from
/// the environment, pinned to the configured region.
pub async fn load_shared_config(settings: &Settings) -> SdkConfig {
    aws_config::from_env()
        .region(Region::new(settings.region.clone()))
        .load()
        .await
}

/// Build an object storage client pointed at the storage endpoint of
/// the region.
pub fn storage_client(shared: &SdkConfig, region: &str) -> Result<aws_sdk_s3::Client> {
    let endpoint_url = resolve_endpoint(STORAGE_SERVICE, region)?;
    let config = aws_sdk_s3::config::Builder::from(shared)
        .region(Region::new(region.to_string()))
        .endpoint_url(endpoint_url)
        .build();
    info!(%endpoint_url, %region, "Object storage client initialized");
    Ok(aws_sdk_s3::Client::from_conf(config))
}

/// Build a message queue client pointed at the queue endpoint of the
/// region.
pub fn queue_client(shared: &SdkConfig, region: &str) -> Result<aws_sdk_sqs::Client> {
    let endpoint_url = resolve_endpoint(QUEUE_SERVICE, region)?;
    let config = aws_sdk_sqs::config::Builder::from(shared)
        .region(aws_sdk_sqs::config::Region::new(region.to_string()))
        .endpoint_url(endpoint_url)
        .build();
    info!(%endpoint_url, %region, "Message queue client initialized");
    Ok(aws_sdk_sqs::Client::from_conf(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::REGION_ID;

    fn shared() -> SdkConfig {
        SdkConfig::builder()
            .region(Region::new(REGION_ID))
            .build()
    }

    #[test]
    fn test_clients_for_unknown_region() {
        assert!(storage_client(&shared(), "us-east-1").is_err());
        assert!(queue_client(&shared(), "us-east-1").is_err());
    }
}
