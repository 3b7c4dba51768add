//! Vision tools the agent uses to look at an image.
//!
//! Both tools take the path of an image file and answer in plain text:
//!
//! - [`ImageCaptionTool`] (`image_captioner`) describes the image.
//! - [`ObjectDetectionTool`] (`object_detector`) lists the objects it finds.
//!
//! Inference runs on a hosted endpoint through [`InferenceClient`].

mod caption;
mod detect;
mod inference;
mod input;

pub use self::caption::ImageCaptionTool;
pub use self::detect::{BoundingBox, Detection, ObjectDetectionTool};
pub use self::inference::{InferenceClient, InferenceConfig};
pub use self::input::{ImagePathArgs, LoadedImage, extract_path, load_image};

use crate::error::Result;
use crate::tool::BoxedTool;

/// Builds the captioner and the detector over one shared inference client.
///
/// # Errors
///
/// Fails when the HTTP client cannot be built.
pub fn vision_tools(config: InferenceConfig) -> Result<Vec<BoxedTool>> {
    let client = InferenceClient::new(config)?;
    Ok(vec![
        Box::new(ImageCaptionTool::new(client.clone())),
        Box::new(ObjectDetectionTool::new(client)),
    ])
}
