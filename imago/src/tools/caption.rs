//! Image captioning tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::tool::{Tool, ToolResult};

use super::inference::InferenceClient;
use super::input::{ImagePathArgs, load_image};

#[derive(Debug, Deserialize)]
struct CaptionOutput {
    generated_text: String,
}

/// Describes an image in one sentence.
#[derive(Debug, Clone)]
pub struct ImageCaptionTool {
    client: InferenceClient,
}

impl ImageCaptionTool {
    /// Creates the tool over an inference client.
    #[must_use]
    pub const fn new(client: InferenceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ImageCaptionTool {
    const NAME: &'static str = "image_captioner";
    type Args = ImagePathArgs;
    type Output = String;

    fn description(&self) -> String {
        "Use this tool when given the path to an image that you would like to be described. \
         It will return a simple caption describing the image."
            .to_owned()
    }

    fn parameters_schema(&self) -> Value {
        ImagePathArgs::schema()
    }

    async fn call(&self, args: Self::Args) -> ToolResult<Self::Output> {
        let image = load_image(&args.image_path).await?;
        let model = &self.client.config().caption_model;

        let outputs: Vec<CaptionOutput> = self.client.infer(model, &image).await?;
        let caption = outputs
            .into_iter()
            .map(|o| o.generated_text.trim().to_owned())
            .find(|text| !text.is_empty())
            .ok_or_else(|| ToolError::execution(format!("{model} returned no caption")))?;

        Ok(caption)
    }
}
