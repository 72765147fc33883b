//! Defines configuration as read from the environment, and the static
//! table used to resolve service endpoints.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

/// The only region the service endpoints can be resolved for.
pub const REGION_ID: &str = "ru-central1";

/// Service name of the object store, for endpoint resolution.
pub const STORAGE_SERVICE: &str = "s3";

/// Service name of the message queue, for endpoint resolution.
pub const QUEUE_SERVICE: &str = "sqs";

/// Default `region` value.
fn default_region() -> String {
    String::from(REGION_ID)
}

/// Default `vision_url` value.
fn default_vision_url() -> String {
    String::from("https://vision.api.cloud.yandex.net/vision/v1/batchAnalyze")
}

/// Default `concurrency` value.
fn default_concurrency() -> usize {
    1
}

/// The bridge pulls images from object storage, sends them to the
/// face detection service and pushes summaries to a message
/// queue. The configuration must be given as environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// The session token, used as the bearer credential for the
    /// vision service.
    pub aws_session_token: String,

    /// The URL of the queue that receives the detection summaries.
    pub queue_url: String,

    /// The folder the vision service bills and authorizes requests
    /// against.
    pub folder_id: String,

    /// The region used to resolve the storage and queue endpoints.
    #[serde(default = "default_region")]
    pub region: String,

    /// The face detection endpoint.
    #[serde(default = "default_vision_url")]
    pub vision_url: String,

    /// How many fetches or vision calls may be in flight at once. The
    /// default of `1` processes images strictly one after another.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout for the vision service, in seconds. Omitting
    /// it leaves the transport defaults in place.
    #[serde(default)]
    pub vision_timeout_secs: Option<u64>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let settings: Self =
            envy::from_env().context("Failed to read settings from the environment")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values that can't be used.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("CONCURRENCY must be at least 1");
        }
        resolve_endpoint(STORAGE_SERVICE, &self.region)?;
        resolve_endpoint(QUEUE_SERVICE, &self.region)?;
        Ok(())
    }
}

/// Resolve the endpoint of a service in a region, using the static
/// endpoint table.
pub fn resolve_endpoint(service: &str, region: &str) -> Result<&'static str> {
    let url = match service {
        STORAGE_SERVICE => "https://storage.yandexcloud.net",
        QUEUE_SERVICE => "https://message-queue.api.cloud.yandex.net",
        _ => return Err(anyhow!("unknown service name: {:?}", service)),
    };
    if region != REGION_ID {
        bail!(
            "unknown endpoint requested for service {:?} in region {:?}",
            service,
            region
        );
    }
    Ok(url)
}
