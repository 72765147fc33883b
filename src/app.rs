//! Defines the application state and the pipeline run for each
//! trigger.

use crate::aggregate::aggregate_all;
use crate::client;
use crate::conf::Settings;
use crate::error::{Error, Result};
use crate::queue::{publish_all, MessageQueue, SqsQueue};
use crate::storage::{fetch_all, ObjectStore, S3Store};
use crate::trigger::TriggerNotification;
use crate::vision::{analyze_all, FaceDetector, VisionClient};
use tracing::{info, instrument, warn};

/// The value returned for a successfully handled trigger.
pub const SUCCESS: &str = "OK";

/// An App holds the collaborators the pipeline talks to. It is built
/// once at startup and handles any number of triggers.
pub struct App {
    store: Box<dyn ObjectStore>,
    detector: Box<dyn FaceDetector>,
    queue: Box<dyn MessageQueue>,
    concurrency: usize,
}

impl App {
    /// Initialize an App with the given collaborators, processing
    /// images one at a time.
    pub fn new(
        store: Box<dyn ObjectStore>,
        detector: Box<dyn FaceDetector>,
        queue: Box<dyn MessageQueue>,
    ) -> Self {
        App {
            store,
            detector,
            queue,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` fetches or vision calls in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Initialize an App that talks to the real services, given a
    /// settings struct.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate().map_err(Error::Config)?;
        let shared = client::load_shared_config(settings).await;
        let store = S3Store::new(
            client::storage_client(&shared, &settings.region).map_err(Error::Config)?,
        );
        let queue = SqsQueue::new(
            client::queue_client(&shared, &settings.region).map_err(Error::Config)?,
            settings.queue_url.clone(),
        );
        let detector = VisionClient::from_settings(settings).map_err(Error::Config)?;
        Ok(App::new(Box::new(store), Box::new(detector), Box::new(queue))
            .with_concurrency(settings.concurrency))
    }

    /// Handle a raw trigger payload.
    pub async fn handle_payload(&self, payload: &str) -> Result<&'static str> {
        let notification = TriggerNotification::from_json(payload).map_err(|e| {
            warn!(stage = "decode", "Failed to decode trigger: {}", e);
            Error::Decode(e)
        })?;
        self.handle(&notification).await
    }

    /// Handle a trigger: read every created image, detect faces in
    /// it, and publish a summary for each image with faces. Stops at
    /// the first error.
    #[instrument(skip_all, fields(events = notification.messages.len()))]
    pub async fn handle(&self, notification: &TriggerNotification) -> Result<&'static str> {
        let result = self.run(notification).await;
        if let Err(e) = &result {
            warn!(stage = e.stage(), "Failed to handle trigger: {}", e);
        }
        result
    }

    async fn run(&self, notification: &TriggerNotification) -> Result<&'static str> {
        let images = notification.image_references();
        if images.is_empty() {
            info!("No object creation events in trigger");
            return Ok(SUCCESS);
        }
        let fetched = fetch_all(self.store.as_ref(), images, self.concurrency)
            .await
            .map_err(Error::Fetch)?;
        let analyzed = analyze_all(self.detector.as_ref(), fetched, self.concurrency)
            .await
            .map_err(Error::Vision)?;
        let messages = aggregate_all(analyzed);
        let published = publish_all(self.queue.as_ref(), &messages)
            .await
            .map_err(Error::Publish)?;
        info!(images = messages.len(), published, "Handled trigger");
        Ok(SUCCESS)
    }
}
