//! GeminiClient - handles communication with the Gemini REST API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::GenaiError;
use super::video::PollPolicy;
use crate::credential::{ApiKey, KeyStore};

/// Default base URL for the Gemini API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for logo image generation.
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/// Default model for logo animation.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Default output resolution for generated videos.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// Header carrying the API key on provider requests.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default timeout for HTTP requests (60 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error envelope returned by the API on non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderStatus,
}

/// Provider error object, also embedded in failed operations.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderStatus {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Map a non-success provider response to a [`GenaiError`].
///
/// The JSON error message is preferred over the raw body when present.
fn provider_error(status: reqwest::StatusCode, body: &str) -> GenaiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        401 | 403 => GenaiError::Auth { message },
        _ => GenaiError::UnknownProvider(format!("{} ({})", message, status)),
    }
}

/// Client for the image and video generation endpoints.
///
/// The API key is not stored in the client; it is read from the shared
/// [`KeyStore`] at the start of each request.
pub struct GeminiClient {
    keys: KeyStore,
    base_url: String,
    image_model: String,
    video_model: String,
    resolution: String,
    poll_policy: PollPolicy,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client against the public Gemini endpoint.
    pub fn new(keys: KeyStore) -> Result<Self, GenaiError> {
        Self::with_base_url(keys, GEMINI_API_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(keys: KeyStore, base_url: String) -> Result<Self, GenaiError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            keys,
            base_url: base_url.trim_end_matches('/').to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            poll_policy: PollPolicy::default(),
            http_client,
        })
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn video_model(&self) -> &str {
        &self.video_model
    }

    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// The key to use for the request about to be sent.
    pub(crate) fn current_key(&self) -> Result<ApiKey, GenaiError> {
        self.keys.get().ok_or_else(GenaiError::missing_key)
    }

    /// URL of a model method, e.g. `models/{model}:predict`.
    pub(crate) fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    /// URL of a resource returned by the API, e.g. an operation name.
    pub(crate) fn resource_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name.trim_start_matches('/'))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// POST a JSON body and decode the JSON response.
    pub(crate) async fn post_json<B, T>(
        &self,
        url: &str,
        key: &ApiKey,
        body: &B,
    ) -> Result<T, GenaiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(url)
            .header(API_KEY_HEADER, key.expose())
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// GET a resource and decode the JSON response.
    pub(crate) async fn get_json<T>(&self, url: &str, key: &ApiKey) -> Result<T, GenaiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http_client
            .get(url)
            .header(API_KEY_HEADER, key.expose())
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GenaiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = provider_error(status, &body);
            log::warn!("Gemini API request failed: {}", err);
            return Err(err);
        }
        Ok(response.json().await?)
    }
}
