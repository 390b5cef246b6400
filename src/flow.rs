//! Application flow: generate a logo, animate it, show the result.
//!
//! [`FlowController`] owns the only copy of the shared state (current logo,
//! current video, loading status, error banner) and exposes one method per
//! user action. Client failures never escape as panics: each is turned into a
//! banner message on the state and also returned to the caller.

use crate::credential::CredentialGate;
use crate::genai::{
    validate_prompt, AnimatedVideo, AnimationRequest, AspectRatio, ErrorKind, GeminiClient,
    GenaiError, LogoImage, LOADING_MESSAGES,
};

/// Loading message shown while the logo image is generated.
pub const LOGO_LOADING_MESSAGE: &str = "Generating your unique logo...";

/// Banner shown when the provider no longer recognises the selected key.
pub const KEY_NOT_FOUND_MESSAGE: &str =
    "Your API key was not found. Please select a valid key and try again.";

/// Banner shown when animation is attempted without a selected key.
pub const KEY_REQUIRED_MESSAGE: &str = "Please select an API key before animating your logo.";

/// Where the user is in the two-step flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    GeneratingLogo,
    AnimatingLogo,
    Result,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowState {
    step: Step,
    logo: Option<LogoImage>,
    video: Option<AnimatedVideo>,
    loading: bool,
    loading_message: String,
    error: Option<String>,
}

impl FlowState {
    pub fn step(&self) -> Step {
        self.step
    }

    /// The generated (or uploaded) logo. During `GeneratingLogo` this is the
    /// unconfirmed preview.
    pub fn logo(&self) -> Option<&LogoImage> {
        self.logo.as_ref()
    }

    pub fn video(&self) -> Option<&AnimatedVideo> {
        self.video.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn loading_message(&self) -> &str {
        &self.loading_message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn begin_loading(&mut self, message: &str) {
        self.loading = true;
        self.loading_message = message.to_string();
    }

    fn finish_loading(&mut self) {
        self.loading = false;
    }
}

/// Errors returned by flow actions.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Action not available in step {actual:?} (expected {expected:?})")]
    WrongStep { expected: Step, actual: Step },

    #[error("No logo to animate")]
    NoLogo,

    #[error("An API key must be selected first")]
    KeyRequired,

    #[error(transparent)]
    Genai(#[from] GenaiError),
}

impl FlowError {
    /// Error class for failures that came from a generation call.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FlowError::Genai(err) => Some(err.kind()),
            FlowError::KeyRequired => Some(ErrorKind::Auth),
            _ => None,
        }
    }
}

/// The top-level state machine.
pub struct FlowController {
    state: FlowState,
    gate: CredentialGate,
    client: GeminiClient,
}

impl FlowController {
    pub fn new(client: GeminiClient, gate: CredentialGate) -> Self {
        Self {
            state: FlowState::default(),
            gate,
            client,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut CredentialGate {
        &mut self.gate
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }

    /// Generate a logo preview from `prompt`.
    ///
    /// An empty prompt sets the banner without contacting the provider. The
    /// preview replaces any earlier one; the step does not change until
    /// [`confirm_logo`](Self::confirm_logo).
    pub async fn generate_logo(&mut self, prompt: &str) -> Result<(), FlowError> {
        self.expect_step(Step::GeneratingLogo)?;

        if let Err(err) = validate_prompt(prompt) {
            self.state.error = Some(user_message(&err));
            return Err(err.into());
        }

        self.state.error = None;
        self.state.logo = None;
        self.state.begin_loading(LOGO_LOADING_MESSAGE);

        let result = self.client.generate_image(prompt).await;
        self.state.finish_loading();

        match result {
            Ok(image) => {
                log::info!("Logo preview ready");
                self.state.logo = Some(image);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Accept the current preview and move on to animation.
    pub fn confirm_logo(&mut self) -> Result<(), FlowError> {
        self.expect_step(Step::GeneratingLogo)?;
        if self.state.logo.is_none() {
            return Err(FlowError::NoLogo);
        }
        self.state.error = None;
        self.state.step = Step::AnimatingLogo;
        log::info!("Logo confirmed");
        Ok(())
    }

    /// Swap the confirmed logo for a user-supplied image.
    pub fn replace_logo(&mut self, image: LogoImage) -> Result<(), FlowError> {
        self.expect_step(Step::AnimatingLogo)?;
        self.state.error = None;
        self.state.logo = Some(image);
        Ok(())
    }

    /// Animate the confirmed logo.
    ///
    /// The loading message follows the provider's progress; `on_progress`
    /// receives the same phrases.
    pub async fn animate<F>(
        &mut self,
        prompt: Option<String>,
        aspect_ratio: AspectRatio,
        mut on_progress: F,
    ) -> Result<(), FlowError>
    where
        F: FnMut(&str),
    {
        self.expect_step(Step::AnimatingLogo)?;
        let logo = self.state.logo.clone().ok_or(FlowError::NoLogo)?;

        if !self.gate.is_present() {
            self.state.error = Some(KEY_REQUIRED_MESSAGE.to_string());
            return Err(FlowError::KeyRequired);
        }

        self.state.error = None;
        self.state.begin_loading(LOADING_MESSAGES[0]);

        let request = AnimationRequest::new(logo, prompt, aspect_ratio);
        let state = &mut self.state;
        let result = self
            .client
            .animate(request, |message| {
                state.loading_message = message.to_string();
                on_progress(message);
            })
            .await;
        self.state.finish_loading();

        match result {
            Ok(video) => {
                log::info!("Animation complete");
                self.state.video = Some(video);
                self.state.step = Step::Result;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Return from animation to logo generation, discarding the logo.
    pub fn back(&mut self) -> Result<(), FlowError> {
        self.expect_step(Step::AnimatingLogo)?;
        self.state.step = Step::GeneratingLogo;
        self.state.logo = None;
        self.state.error = None;
        Ok(())
    }

    /// Drop everything and return to the first step.
    pub fn start_over(&mut self) {
        log::info!("Starting over");
        self.state = FlowState::default();
    }

    fn expect_step(&self, expected: Step) -> Result<(), FlowError> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(FlowError::WrongStep {
                expected,
                actual: self.state.step,
            })
        }
    }

    /// Record a client failure on the banner.
    ///
    /// A "key not found" provider error becomes an auth error and resets the
    /// gate so the next attempt asks for a key again.
    fn fail(&mut self, err: GenaiError) -> FlowError {
        if err.is_credential_not_found() {
            log::warn!("Selected API key was not found by the provider");
            self.gate.reset_credential();
            self.state.error = Some(KEY_NOT_FOUND_MESSAGE.to_string());
            return FlowError::Genai(GenaiError::Auth {
                message: err.to_string(),
            });
        }

        log::warn!("Generation failed: {}", err);
        self.state.error = Some(user_message(&err));
        FlowError::Genai(err)
    }
}

/// Text shown on the error banner for a client failure.
pub fn user_message(err: &GenaiError) -> String {
    match err {
        GenaiError::InvalidInput(message) => message.clone(),
        GenaiError::Auth { .. } => format!("{}. Please select a valid API key.", err),
        _ => err.to_string(),
    }
}
