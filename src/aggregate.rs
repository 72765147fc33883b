//! Flattens detection results into one summary per image.

use crate::trigger::ImageReference;
use crate::vision::{AnalyzedImage, DetectionResponse, Polygon};
use serde::{Deserialize, Serialize};

/// The summary published for an image: where it is, and the bounding
/// box of every face found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMessage {
    #[serde(rename = "file_data")]
    pub image: ImageReference,
    pub coordinates: Vec<Polygon>,
}

impl AggregatedMessage {
    /// Whether any face was found.
    pub fn has_faces(&self) -> bool {
        !self.coordinates.is_empty()
    }
}

impl DetectionResponse {
    /// Iterate over the bounding box of every face, in result group
    /// order and then in face order.
    pub fn bounding_boxes(&self) -> impl Iterator<Item = &Polygon> {
        self.results
            .iter()
            .flat_map(|group| group.results.iter())
            .flat_map(|result| result.face_detection.faces.iter())
            .map(|face| &face.bounding_box.vertices)
    }
}

/// Build the summary of a single image.
pub fn aggregate(image: ImageReference, response: &DetectionResponse) -> AggregatedMessage {
    AggregatedMessage {
        image,
        coordinates: response.bounding_boxes().cloned().collect(),
    }
}

/// Build one summary per analyzed image, in the same order.
pub fn aggregate_all(images: Vec<AnalyzedImage>) -> Vec<AggregatedMessage> {
    images
        .into_iter()
        .map(|analyzed| aggregate(analyzed.reference, &analyzed.response))
        .collect()
}
