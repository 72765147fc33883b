//! Defines the _trigger_, the notification sent by object storage
//! when objects change, and the image references extracted from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// The event type of an object creation notification. Every other
/// event type is ignored.
pub const OBJECT_CREATE_EVENT: &str = "yandex.cloud.events.storage.ObjectCreate";

/// A batch of object storage notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerNotification {
    /// The notifications, in the order they were emitted.
    #[serde(default)]
    pub messages: Vec<TriggerMessage>,
}

/// A single notification. Only object creation events are required
/// to carry details; other events may have none.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerMessage {
    /// What happened and when.
    #[serde(default)]
    pub event_metadata: EventMetadata,

    /// The object the event is about.
    #[serde(default)]
    pub details: Option<ImageReference>,
}

/// Describes what happened and when.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracing_context: Option<TracingContext>,
    #[serde(default)]
    pub cloud_id: String,
    #[serde(default)]
    pub folder_id: String,
}

/// Distributed tracing identifiers attached to the event.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingContext {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: String,
}

/// Identifies one image in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// The bucket holding the image.
    pub bucket_id: String,

    /// The key of the image within its bucket.
    pub object_id: String,
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket_id, self.object_id)
    }
}

impl TriggerNotification {
    /// Decode a raw trigger payload.
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// Extracts the images referenced by object creation events, in
    /// the order they appear.
    #[instrument(skip(self), fields(events = self.messages.len()))]
    pub fn image_references(&self) -> Vec<ImageReference> {
        let images: Vec<ImageReference> = self
            .messages
            .iter()
            .filter(|message| message.event_metadata.event_type == OBJECT_CREATE_EVENT)
            .filter_map(|message| {
                if message.details.is_none() {
                    warn!(
                        event_id = %message.event_metadata.event_id,
                        "Object creation event without details; skipping"
                    );
                }
                message.details.clone()
            })
            .collect();
        debug!(
            skipped = self.messages.len() - images.len(),
            "Selected object creation events"
        );
        images
    }
}
