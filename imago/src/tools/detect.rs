//! Object detection tool.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{Tool, ToolResult};

use super::inference::InferenceClient;
use super::input::{ImagePathArgs, load_image};

/// Pixel-space box of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub xmin: f64,
    /// Top edge.
    pub ymin: f64,
    /// Right edge.
    pub xmax: f64,
    /// Bottom edge.
    pub ymax: f64,
}

/// One object found in the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
    /// Where the object is.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl fmt::Display for Detection {
    /// `[x1, y1, x2, y2] label score`, coordinates truncated to whole pixels.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bbox;
        write!(
            f,
            "[{:.0}, {:.0}, {:.0}, {:.0}] {} {}",
            b.xmin.trunc(),
            b.ymin.trunc(),
            b.xmax.trunc(),
            b.ymax.trunc(),
            self.label,
            self.score
        )
    }
}

/// Text returned when nothing clears the threshold.
pub(crate) const NO_OBJECTS: &str = "No objects detected.";

/// Lists the objects in an image with their boxes and confidences.
#[derive(Debug, Clone)]
pub struct ObjectDetectionTool {
    client: InferenceClient,
}

impl ObjectDetectionTool {
    /// Creates the tool over an inference client.
    #[must_use]
    pub const fn new(client: InferenceClient) -> Self {
        Self { client }
    }

    fn render(detections: &[Detection], threshold: f64) -> String {
        let lines: Vec<String> = detections
            .iter()
            .filter(|d| d.score >= threshold)
            .map(ToString::to_string)
            .collect();

        if lines.is_empty() {
            NO_OBJECTS.to_owned()
        } else {
            lines.join("\n")
        }
    }
}

#[async_trait]
impl Tool for ObjectDetectionTool {
    const NAME: &'static str = "object_detector";
    type Args = ImagePathArgs;
    type Output = String;

    fn description(&self) -> String {
        "Use this tool when given the path to an image that you would like to detect objects. \
         It will return a list of all detected objects. Each element in the list in the format: \
         [x1, y1, x2, y2] class_name confidence_score."
            .to_owned()
    }

    fn parameters_schema(&self) -> Value {
        ImagePathArgs::schema()
    }

    async fn call(&self, args: Self::Args) -> ToolResult<Self::Output> {
        let image = load_image(&args.image_path).await?;
        let config = self.client.config();

        let detections: Vec<Detection> =
            self.client.infer(&config.detection_model, &image).await?;
        tracing::debug!(found = detections.len(), "Detector responded");

        Ok(Self::render(&detections, config.detection_threshold))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::tools::InferenceConfig;

    fn detection(label: &str, score: f64) -> Detection {
        Detection {
            label: label.to_owned(),
            score,
            bbox: BoundingBox {
                xmin: 10.0,
                ymin: 20.7,
                xmax: 110.2,
                ymax: 220.0,
            },
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(detection("cat", 0.998).to_string(), "[10, 20, 110, 220] cat 0.998");
    }

    #[test]
    fn render_filters_below_threshold() {
        let found = [detection("cat", 0.97), detection("remote", 0.42), detection("dog", 0.9)];
        let text = ObjectDetectionTool::render(&found, 0.9);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("cat 0.97"));
        assert!(lines[1].ends_with("dog 0.9"));
    }

    #[test]
    fn render_reports_nothing_found() {
        assert_eq!(ObjectDetectionTool::render(&[], 0.9), NO_OBJECTS);
        assert_eq!(
            ObjectDetectionTool::render(&[detection("cup", 0.5)], 0.9),
            NO_OBJECTS
        );
    }

    #[tokio::test]
    async fn calls_detection_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/detr-resnet-50");
                then.status(200).json_body(json!([
                    {"score": 0.995, "label": "cat", "box": {"xmin": 12, "ymin": 50, "xmax": 320, "ymax": 470}},
                    {"score": 0.31, "label": "remote", "box": {"xmin": 40, "ymin": 70, "xmax": 175, "ymax": 118}}
                ]));
            })
            .await;

        let config = InferenceConfig::default().with_base_url(server.base_url());
        let tool = ObjectDetectionTool::new(InferenceClient::new(config).unwrap());
        let text = tool
            .call(ImagePathArgs {
                image_path: format!("find things in {}", path.display()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "[12, 50, 320, 470] cat 0.995");
    }

    #[tokio::test]
    async fn default_threshold_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/facebook/detr-resnet-50");
                then.status(200).json_body(json!([
                    {"score": 0.899_999_99, "label": "lamp", "box": {"xmin": 1, "ymin": 2, "xmax": 3, "ymax": 4}},
                    {"score": 0.9, "label": "mug", "box": {"xmin": 5, "ymin": 6, "xmax": 7, "ymax": 8}}
                ]));
            })
            .await;

        let config = InferenceConfig::default().with_base_url(server.base_url());
        let tool = ObjectDetectionTool::new(InferenceClient::new(config).unwrap());
        let text = tool
            .call(ImagePathArgs {
                image_path: path.to_str().unwrap().to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(text, "[5, 6, 7, 8] mug 0.9");
    }
}
