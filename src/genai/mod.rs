//! Gemini image and video generation.
//!
//! Logos are generated from a text prompt with an Imagen model, then animated
//! with a Veo model through a long-running operation that is polled until the
//! video is ready and downloaded into memory.

mod client;
mod error;
mod image;
mod video;

pub use client::{
    GeminiClient, DEFAULT_IMAGE_MODEL, DEFAULT_RESOLUTION, DEFAULT_VIDEO_MODEL,
    GEMINI_API_BASE_URL,
};
pub use error::{ErrorKind, GenaiError, CREDENTIAL_NOT_FOUND_MARKER};
pub use image::{content_hash, logo_prompt, validate_prompt, LogoImage, IMAGE_MIME_TYPE};
pub use video::{
    AnimatedVideo, AnimationRequest, AspectRatio, PollPolicy, VideoOperation,
    DEFAULT_ANIMATION_PROMPT, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL,
    FINALIZING_MESSAGE, LOADING_MESSAGES,
};
