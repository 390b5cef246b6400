//! Logo image generation.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::client::GeminiClient;
use super::error::GenaiError;

/// Output format requested from the image model.
pub const IMAGE_MIME_TYPE: &str = "image/png";

/// Style template wrapped around every logo prompt.
const LOGO_PROMPT_TEMPLATE: &str = "A professional, clean, vector-style logo for a company. \
The logo should be centered on a solid white background. Description: ";

/// Build the prompt actually sent to the image model.
pub fn logo_prompt(description: &str) -> String {
    format!("{}{}", LOGO_PROMPT_TEMPLATE, description.trim())
}

/// Reject empty or whitespace-only prompts.
pub fn validate_prompt(prompt: &str) -> Result<(), GenaiError> {
    if prompt.trim().is_empty() {
        return Err(GenaiError::InvalidInput(
            "Please enter a description for your logo.".to_string(),
        ));
    }
    Ok(())
}

/// A logo image held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct LogoImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for LogoImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl LogoImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Decode a base64 payload as returned by the provider.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self, GenaiError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        Ok(Self::new(bytes, mime_type))
    }

    /// Load a user-supplied image, guessing its type from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, GenaiError> {
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .filter(|mime| mime.starts_with("image/"))
            .ok_or_else(|| {
                GenaiError::InvalidInput(format!(
                    "'{}' is not a recognised image file",
                    path.display()
                ))
            })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Write the image into `dir` under a content-derived name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        save_payload(dir, "logo", &self.bytes, &self.mime_type)
    }
}

/// Check that a mime type has the `image/<subtype>` shape.
pub(crate) fn parse_image_mime(mime_type: &str) -> Result<&str, GenaiError> {
    let valid = mime_type
        .strip_prefix("image/")
        .map(|subtype| {
            !subtype.is_empty()
                && subtype
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        })
        .unwrap_or(false);
    if valid {
        Ok(mime_type)
    } else {
        Err(GenaiError::InvalidInput(format!(
            "Invalid image format '{}'",
            mime_type
        )))
    }
}

/// Hex digest (first 16 bytes of SHA-256) used for output file names.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

pub(crate) fn save_payload(
    dir: &Path,
    prefix: &str,
    bytes: &[u8],
    mime_type: &str,
) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}-{}.{}",
        prefix,
        content_hash(bytes),
        extension_for(mime_type)
    ));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    instances: [PromptInstance<'a>; 1],
    parameters: ImageParameters<'a>,
}

#[derive(Debug, Serialize)]
struct PromptInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
    output_options: OutputOptions<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputOptions<'a> {
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<ImagePrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

/// Outcome of one image request after boundary validation.
#[derive(Debug)]
enum ImageOutcome {
    Image(LogoImage),
    Empty { reason: Option<String> },
}

impl PredictResponse {
    fn into_outcome(self) -> Result<ImageOutcome, GenaiError> {
        let mut reason = None;
        for prediction in self.predictions {
            match prediction.bytes_base64_encoded {
                Some(data) if !data.is_empty() => {
                    let mime = prediction
                        .mime_type
                        .unwrap_or_else(|| IMAGE_MIME_TYPE.to_string());
                    return Ok(ImageOutcome::Image(LogoImage::from_base64(&data, mime)?));
                }
                _ => reason = reason.or(prediction.rai_filtered_reason),
            }
        }
        Ok(ImageOutcome::Empty { reason })
    }
}

impl GeminiClient {
    /// Generate one square PNG logo from a description.
    ///
    /// The description is wrapped in a fixed style template. A single request
    /// is made; no retries.
    ///
    /// # Errors
    ///
    /// `GenaiError::InvalidInput` for an empty prompt (no request is sent),
    /// `GenaiError::Auth` when no key is available, and
    /// `GenaiError::GenerationFailed` when the provider returns no image.
    pub async fn generate_image(&self, prompt: &str) -> Result<LogoImage, GenaiError> {
        validate_prompt(prompt)?;
        let key = self.current_key()?;

        let full_prompt = logo_prompt(prompt);
        let body = PredictRequest {
            instances: [PromptInstance {
                prompt: &full_prompt,
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio: "1:1",
                output_options: OutputOptions {
                    mime_type: IMAGE_MIME_TYPE,
                },
            },
        };

        log::info!("Requesting logo image from {}", self.image_model());
        let url = self.model_url(self.image_model(), "predict");
        let response: PredictResponse = self.post_json(&url, &key, &body).await?;

        match response.into_outcome()? {
            ImageOutcome::Image(image) => {
                log::info!("Received logo image ({} bytes)", image.bytes().len());
                Ok(image)
            }
            ImageOutcome::Empty { reason } => {
                let detail = reason.unwrap_or_else(|| "no image returned".to_string());
                log::warn!("Image generation returned no image: {}", detail);
                Err(GenaiError::GenerationFailed(format!(
                    "Image generation failed to produce an image ({})",
                    detail
                )))
            }
        }
    }
}
