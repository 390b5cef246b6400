//! Logo animation: long-running video operations.
//!
//! A video job is submitted once, then polled at a fixed interval until the
//! server reports it done. The finished video is downloaded into memory so
//! the caller can play or save it without another network round trip.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::client::{GeminiClient, ProviderStatus};
use super::error::GenaiError;
use super::image::{parse_image_mime, save_payload, LogoImage};

/// Status phrases shown while a video job runs, cycled in order.
pub const LOADING_MESSAGES: [&str; 6] = [
    "Warming up the animation studio...",
    "Casting your logo for the lead role...",
    "Our digital artists are sketching the first frames...",
    "Rendering the animation... this can take a minute.",
    "Adding the final touches and polish...",
    "Almost there, preparing for the premiere!",
];

/// Status phrase shown once the job is done, before the download.
pub const FINALIZING_MESSAGE: &str = "Finalizing your video...";

/// Animation prompt used when the user leaves it empty.
pub const DEFAULT_ANIMATION_PROMPT: &str = "An elegant and dynamic animation of this logo.";

/// Delay between status checks (5 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Status checks before giving up (10 minutes at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Content type assumed for downloads that don't declare one.
const DEFAULT_VIDEO_MIME_TYPE: &str = "video/mp4";

/// How often, and for how long, an operation is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the server reports completion.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_POLL_ATTEMPTS),
        }
    }
}

/// Output aspect ratio of the generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// 16:9
    #[default]
    Landscape,
    /// 9:16
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "16:9" | "landscape" => Ok(AspectRatio::Landscape),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait),
            other => Err(format!(
                "Unknown aspect ratio '{}'. Use 16:9 or 9:16",
                other
            )),
        }
    }
}

/// Everything needed to animate one logo.
#[derive(Debug, Clone)]
pub struct AnimationRequest {
    pub image: LogoImage,
    pub prompt: Option<String>,
    pub aspect_ratio: AspectRatio,
}

impl AnimationRequest {
    pub fn new(image: LogoImage, prompt: Option<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            image,
            prompt,
            aspect_ratio,
        }
    }

    /// The user's prompt, or the default one when it is empty.
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_ANIMATION_PROMPT)
    }
}

/// Client-side view of a server-tracked video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    name: String,
    done: bool,
    video_uri: Option<String>,
    error: Option<String>,
}

impl VideoOperation {
    /// Opaque handle assigned by the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Signed download link of the first generated video, once done.
    pub fn video_uri(&self) -> Option<&str> {
        self.video_uri.as_deref()
    }

    /// Failure reported by the server for a finished job.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// A downloaded video, ready to play or save.
#[derive(Clone, PartialEq, Eq)]
pub struct AnimatedVideo {
    bytes: Vec<u8>,
    mime_type: String,
}

impl fmt::Debug for AnimatedVideo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedVideo")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AnimatedVideo {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Write the video into `dir` under a content-derived name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        save_payload(dir, "animation", &self.bytes, &self.mime_type)
    }
}

#[derive(Debug, Serialize)]
struct GenerateVideosRequest<'a> {
    instances: [VideoInstance<'a>; 1],
    parameters: VideoParameters<'a>,
}

#[derive(Debug, Serialize)]
struct VideoInstance<'a> {
    prompt: &'a str,
    image: InlineImage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage<'a> {
    bytes_base64_encoded: String,
    mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters<'a> {
    aspect_ratio: &'a str,
    resolution: &'a str,
    sample_count: u32,
}

/// Operation resource as returned by submit and poll.
#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResult>,
    #[serde(default)]
    error: Option<ProviderStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

impl OperationResponse {
    /// Convert to a [`VideoOperation`], keeping `fallback_name` when the
    /// server omits the name.
    fn into_operation(self, fallback_name: Option<&str>) -> Result<VideoOperation, GenaiError> {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| fallback_name.map(str::to_string))
            .ok_or_else(|| {
                GenaiError::UnknownProvider("Operation response has no name".to_string())
            })?;

        let video_uri = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| video.uri)
            .filter(|uri| !uri.is_empty());

        let error = self.error.map(|status| {
            log::warn!(
                "Video operation {} failed: code={:?} status={:?}",
                name,
                status.code,
                status.status
            );
            status.message
        });

        Ok(VideoOperation {
            name,
            done: self.done,
            video_uri,
            error,
        })
    }
}

impl GeminiClient {
    /// Submit a video generation job for a logo.
    ///
    /// # Errors
    ///
    /// `GenaiError::Auth` when no key is available, `GenaiError::InvalidInput`
    /// when the image type cannot be determined, or a provider error.
    pub async fn submit_animation(
        &self,
        request: &AnimationRequest,
    ) -> Result<VideoOperation, GenaiError> {
        let key = self.current_key()?;
        let mime_type = parse_image_mime(request.image.mime_type())?;

        let body = GenerateVideosRequest {
            instances: [VideoInstance {
                prompt: request.effective_prompt(),
                image: InlineImage {
                    bytes_base64_encoded: request.image.to_base64(),
                    mime_type,
                },
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio.as_str(),
                resolution: self.resolution(),
                sample_count: 1,
            },
        };

        let url = self.model_url(self.video_model(), "predictLongRunning");
        let response: OperationResponse = self.post_json(&url, &key, &body).await?;
        let operation = response.into_operation(None)?;
        log::info!("Video job submitted: {}", operation.name());
        Ok(operation)
    }

    /// Fetch the latest state of `operation` from the server.
    ///
    /// A finished operation is returned unchanged without a request.
    pub async fn poll_operation(
        &self,
        operation: &VideoOperation,
    ) -> Result<VideoOperation, GenaiError> {
        if operation.is_done() {
            return Ok(operation.clone());
        }

        let key = self.current_key()?;
        let url = self.resource_url(operation.name());
        let response: OperationResponse = self.get_json(&url, &key).await?;
        response.into_operation(Some(operation.name()))
    }

    /// Download a finished video. The API key is added as the `key` query
    /// parameter of the signed link.
    pub async fn download_video(&self, uri: &str) -> Result<AnimatedVideo, GenaiError> {
        let key = self.current_key()?;

        let response = self
            .http()
            .get(uri)
            .query(&[("key", key.expose())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.is_empty())
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(GenaiError::DownloadFailed {
                status: status.as_u16(),
                message,
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or_else(|| DEFAULT_VIDEO_MIME_TYPE.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        log::info!("Downloaded video ({} bytes, {})", bytes.len(), mime_type);
        Ok(AnimatedVideo::new(bytes, mime_type))
    }

    /// Animate a logo end to end: submit, poll until done, download.
    ///
    /// `on_progress` receives the first status phrase as soon as the job is
    /// accepted, one phrase per status check (cycling through
    /// [`LOADING_MESSAGES`]), and [`FINALIZING_MESSAGE`] once the job is done.
    ///
    /// # Errors
    ///
    /// `GenaiError::Auth` or `GenaiError::InvalidInput` before any request is
    /// sent, `GenaiError::Timeout` when the poll policy runs out,
    /// `GenaiError::ResultMissing` when the finished job has no video link,
    /// and `GenaiError::DownloadFailed` when the download is rejected.
    pub async fn animate<F>(
        &self,
        request: AnimationRequest,
        mut on_progress: F,
    ) -> Result<AnimatedVideo, GenaiError>
    where
        F: FnMut(&str),
    {
        self.current_key()?;
        parse_image_mime(request.image.mime_type())?;

        log::info!(
            "Animating logo ({}, {}): {}",
            request.aspect_ratio,
            self.resolution(),
            request.effective_prompt()
        );
        let mut operation = self.submit_animation(&request).await?;

        let mut message_index = 0;
        on_progress(LOADING_MESSAGES[message_index]);

        let policy = self.poll_policy();
        let mut attempts = 0u32;
        while !operation.is_done() {
            if let Some(max) = policy.max_attempts {
                if attempts >= max {
                    log::error!(
                        "Video job {} still running after {} status checks",
                        operation.name(),
                        attempts
                    );
                    return Err(GenaiError::Timeout { attempts });
                }
            }

            tokio::time::sleep(policy.interval).await;
            message_index = (message_index + 1) % LOADING_MESSAGES.len();
            on_progress(LOADING_MESSAGES[message_index]);

            operation = self.poll_operation(&operation).await?;
            attempts += 1;
            log::debug!(
                "Poll {} for {}: done={}",
                attempts,
                operation.name(),
                operation.is_done()
            );
        }

        on_progress(FINALIZING_MESSAGE);

        if let Some(error) = operation.error() {
            return Err(GenaiError::UnknownProvider(error.to_string()));
        }
        let uri = operation.video_uri().ok_or(GenaiError::ResultMissing)?;
        self.download_video(uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OperationResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_loading_messages_cycle_length() {
        assert_eq!(LOADING_MESSAGES.len(), 6);
        assert_eq!(LOADING_MESSAGES[0], "Warming up the animation studio...");
    }

    #[test]
    fn test_default_poll_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(5000));
        assert_eq!(policy.max_attempts, Some(120));
    }

    #[test]
    fn test_aspect_ratio_parsing() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("portrait".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("4:3".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::default().to_string(), "16:9");
    }

    #[test]
    fn test_effective_prompt_defaults_when_blank() {
        let image = LogoImage::new(vec![1], "image/png");
        let request = AnimationRequest::new(image.clone(), None, AspectRatio::Landscape);
        assert_eq!(request.effective_prompt(), DEFAULT_ANIMATION_PROMPT);

        let request =
            AnimationRequest::new(image.clone(), Some("   ".to_string()), AspectRatio::Landscape);
        assert_eq!(request.effective_prompt(), DEFAULT_ANIMATION_PROMPT);

        let request = AnimationRequest::new(
            image,
            Some("logo materializes from sparkling dust".to_string()),
            AspectRatio::Portrait,
        );
        assert_eq!(
            request.effective_prompt(),
            "logo materializes from sparkling dust"
        );
    }

    #[test]
    fn test_request_serialization() {
        let body = GenerateVideosRequest {
            instances: [VideoInstance {
                prompt: "spin",
                image: InlineImage {
                    bytes_base64_encoded: "AQID".to_string(),
                    mime_type: "image/png",
                },
            }],
            parameters: VideoParameters {
                aspect_ratio: "9:16",
                resolution: "720p",
                sample_count: 1,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "instances": [{
                    "prompt": "spin",
                    "image": {"bytesBase64Encoded": "AQID", "mimeType": "image/png"}
                }],
                "parameters": {"aspectRatio": "9:16", "resolution": "720p", "sampleCount": 1}
            })
        );
    }

    #[test]
    fn test_pending_operation() {
        let op = parse(r#"{"name": "models/veo/operations/op1"}"#)
            .into_operation(None)
            .unwrap();
        assert_eq!(op.name(), "models/veo/operations/op1");
        assert!(!op.is_done());
        assert!(op.video_uri().is_none());
    }

    #[test]
    fn test_completed_operation_extracts_uri() {
        let op = parse(
            r#"{
                "name": "models/veo/operations/op1",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [{"video": {"uri": "https://files.example/v1?alt=media"}}]
                    }
                }
            }"#,
        )
        .into_operation(None)
        .unwrap();
        assert!(op.is_done());
        assert_eq!(op.video_uri(), Some("https://files.example/v1?alt=media"));
    }

    #[test]
    fn test_completed_operation_without_samples() {
        let op = parse(
            r#"{"name": "op", "done": true, "response": {"generateVideoResponse": {"generatedSamples": []}}}"#,
        )
        .into_operation(None)
        .unwrap();
        assert!(op.is_done());
        assert!(op.video_uri().is_none());
    }

    #[test]
    fn test_failed_operation_keeps_message() {
        let op = parse(
            r#"{"name": "op", "done": true, "error": {"code": 3, "message": "bad image", "status": "INVALID_ARGUMENT"}}"#,
        )
        .into_operation(None)
        .unwrap();
        assert_eq!(op.error(), Some("bad image"));
    }

    #[test]
    fn test_missing_name_uses_fallback() {
        let op = parse(r#"{"done": false}"#)
            .into_operation(Some("models/veo/operations/op1"))
            .unwrap();
        assert_eq!(op.name(), "models/veo/operations/op1");

        let result = parse(r#"{"done": false}"#).into_operation(None);
        assert!(matches!(result, Err(GenaiError::UnknownProvider(_))));
    }

    #[test]
    fn test_animated_video_save() {
        let dir = tempfile::tempdir().unwrap();
        let video = AnimatedVideo::new(vec![0, 0, 0, 0x18], "video/mp4");
        let path = video.save_to(dir.path()).unwrap();
        assert!(path.to_string_lossy().ends_with(".mp4"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("animation-"));
        assert_eq!(std::fs::read(path).unwrap(), vec![0, 0, 0, 0x18]);
    }
}
