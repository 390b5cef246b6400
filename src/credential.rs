//! API key handling and the credential gate.
//!
//! The [`KeyStore`] holds the single active key and is shared between the gate
//! (the only writer) and the generation client, which reads it fresh on every
//! request so that a key rotated between calls is always picked up.

use std::fmt;
use std::io::{BufRead, Write};
use std::sync::{Arc, RwLock};

/// Primary environment variable for the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Fallback environment variable for the API key.
pub const API_KEY_ENV_FALLBACK: &str = "API_KEY";

/// An API key. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting empty or whitespace-only values.
    pub fn new(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::EmptyKey);
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Shared, process-wide slot for the active API key.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    inner: Arc<RwLock<Option<ApiKey>>>,
}

impl KeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `key`.
    pub fn with_key(key: ApiKey) -> Self {
        let store = Self::new();
        store.set(key);
        store
    }

    /// Create a store seeded from `GEMINI_API_KEY` or `API_KEY`.
    pub fn from_env() -> Self {
        let store = Self::new();
        if let Some(key) = key_from_env() {
            store.set(key);
        }
        store
    }

    /// The current key, if any.
    pub fn get(&self) -> Option<ApiKey> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, key: ApiKey) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(key),
            Err(poisoned) => *poisoned.into_inner() = Some(key),
        }
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

fn key_from_env() -> Option<ApiKey> {
    [API_KEY_ENV, API_KEY_ENV_FALLBACK]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|value| ApiKey::new(value).ok())
}

/// External collaborator able to report and change the selected key.
pub trait CredentialProvider: Send {
    /// Whether a key has been selected.
    fn has_selected_key(&self) -> bool;

    /// Let the user pick a key, talking over `input`/`output`. Returns once
    /// the selection UI closes.
    fn open_select_key(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), CredentialError>;
}

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Checking,
    Present,
    Absent,
}

/// Decides whether generation calls may be attempted.
pub struct CredentialGate {
    provider: Option<Box<dyn CredentialProvider>>,
    store: KeyStore,
    status: KeyStatus,
}

impl CredentialGate {
    /// Gate backed by an external provider.
    pub fn new(provider: Box<dyn CredentialProvider>, store: KeyStore) -> Self {
        Self {
            provider: Some(provider),
            store,
            status: KeyStatus::Checking,
        }
    }

    /// Gate without a provider; only the environment-configured key counts.
    pub fn env_only(store: KeyStore) -> Self {
        Self {
            provider: None,
            store,
            status: KeyStatus::Checking,
        }
    }

    pub fn status(&self) -> KeyStatus {
        self.status
    }

    pub fn is_present(&self) -> bool {
        self.status == KeyStatus::Present
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    /// Query the provider, or fall back to the store, in one round trip.
    pub fn check_credential(&mut self) -> bool {
        self.status = KeyStatus::Checking;
        let present = match &self.provider {
            Some(provider) => provider.has_selected_key(),
            None => self.store.is_set(),
        };
        self.status = if present {
            KeyStatus::Present
        } else {
            KeyStatus::Absent
        };
        log::debug!("Credential check: {:?}", self.status);
        present
    }

    /// Open the provider's key selection on the caller's streams and mark the
    /// key present.
    ///
    /// The selection is not verified afterwards: the provider gives no reliable
    /// completion signal, so the gate assumes the user picked a key. A failed
    /// selection leaves the status unchanged.
    pub fn request_credential(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), CredentialError> {
        let provider = self
            .provider
            .as_mut()
            .ok_or(CredentialError::SelectionUnavailable)?;
        provider.open_select_key(input, output)?;
        self.status = KeyStatus::Present;
        log::info!("API key selected");
        Ok(())
    }

    /// Mark the key absent so the next attempt prompts for a new one.
    pub fn reset_credential(&mut self) {
        log::warn!("Resetting API key selection");
        self.status = KeyStatus::Absent;
    }
}

/// Prompts for a key on the interactive session's own streams.
pub struct TerminalKeySelector {
    store: KeyStore,
}

impl TerminalKeySelector {
    pub fn new(store: KeyStore) -> Self {
        Self { store }
    }
}

impl CredentialProvider for TerminalKeySelector {
    fn has_selected_key(&self) -> bool {
        self.store.is_set()
    }

    fn open_select_key(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), CredentialError> {
        writeln!(output, "A Gemini API key is required to generate logos and videos.")?;
        writeln!(
            output,
            "See https://ai.google.dev/gemini-api/docs/billing for billing details."
        )?;
        write!(output, "API key: ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        self.store.set(ApiKey::new(line)?);
        Ok(())
    }
}

/// Errors from key selection.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("API key selection is not available in this environment")]
    SelectionUnavailable,

    #[error("API key must not be empty")]
    EmptyKey,

    #[error("Failed to read API key: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        selected: bool,
        opened: Arc<AtomicUsize>,
    }

    impl CredentialProvider for FakeProvider {
        fn has_selected_key(&self) -> bool {
            self.selected
        }

        fn open_select_key(
            &mut self,
            _input: &mut dyn BufRead,
            _output: &mut dyn Write,
        ) -> Result<(), CredentialError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_api_key_rejects_blank() {
        assert!(matches!(ApiKey::new("   "), Err(CredentialError::EmptyKey)));
        assert_eq!(ApiKey::new(" abc \n").unwrap().expose(), "abc");
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("secret-value").unwrap();
        assert!(!format!("{:?}", key).contains("secret"));
    }

    #[test]
    fn test_key_store_clones_share_state() {
        let store = KeyStore::new();
        let reader = store.clone();
        assert!(!reader.is_set());

        store.set(ApiKey::new("first").unwrap());
        assert_eq!(reader.get().unwrap().expose(), "first");

        store.set(ApiKey::new("second").unwrap());
        assert_eq!(reader.get().unwrap().expose(), "second");
    }

    #[test]
    fn test_gate_starts_checking() {
        let gate = CredentialGate::env_only(KeyStore::new());
        assert_eq!(gate.status(), KeyStatus::Checking);
    }

    #[test]
    fn test_env_only_gate_uses_store() {
        let mut gate = CredentialGate::env_only(KeyStore::new());
        assert!(!gate.check_credential());
        assert_eq!(gate.status(), KeyStatus::Absent);

        let mut gate = CredentialGate::env_only(KeyStore::with_key(ApiKey::new("k").unwrap()));
        assert!(gate.check_credential());
        assert!(gate.is_present());
    }

    #[test]
    fn test_env_only_gate_cannot_request() {
        let mut gate = CredentialGate::env_only(KeyStore::new());
        assert!(matches!(
            gate.request_credential(&mut std::io::empty(), &mut std::io::sink()),
            Err(CredentialError::SelectionUnavailable)
        ));
        assert!(!gate.is_present());
    }

    #[test]
    fn test_provider_gate_marks_present_optimistically() {
        let opened = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            selected: false,
            opened: opened.clone(),
        };
        let mut gate = CredentialGate::new(Box::new(provider), KeyStore::new());

        assert!(!gate.check_credential());
        gate.request_credential(&mut std::io::empty(), &mut std::io::sink()).unwrap();

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(gate.is_present());
    }

    #[test]
    fn test_reset_marks_absent() {
        let mut gate = CredentialGate::env_only(KeyStore::with_key(ApiKey::new("k").unwrap()));
        gate.check_credential();
        gate.reset_credential();
        assert_eq!(gate.status(), KeyStatus::Absent);
    }

    #[test]
    fn test_terminal_selector_reads_key() {
        let store = KeyStore::new();
        let mut selector = TerminalKeySelector::new(store.clone());
        let mut input = std::io::Cursor::new(b"my-new-key\nleftover\n".to_vec());
        let mut output = Vec::new();

        selector.open_select_key(&mut input, &mut output).unwrap();

        assert_eq!(store.get().unwrap().expose(), "my-new-key");
        assert!(String::from_utf8(output).unwrap().contains("API key: "));

        // Only the key line is consumed
        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "leftover\n");
    }

    #[test]
    fn test_gate_requests_through_terminal_selector() {
        let store = KeyStore::new();
        let mut gate = CredentialGate::new(
            Box::new(TerminalKeySelector::new(store.clone())),
            store.clone(),
        );
        assert!(!gate.check_credential());

        let mut input = std::io::Cursor::new(b"typed-key\n".to_vec());
        let mut output = Vec::new();
        gate.request_credential(&mut input, &mut output).unwrap();

        assert!(gate.is_present());
        assert_eq!(store.get().unwrap().expose(), "typed-key");
    }

    #[test]
    fn test_terminal_selector_rejects_empty_line() {
        let store = KeyStore::new();
        let mut gate = CredentialGate::new(
            Box::new(TerminalKeySelector::new(store.clone())),
            store.clone(),
        );
        gate.check_credential();

        let mut input = std::io::Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        let result = gate.request_credential(&mut input, &mut output);

        assert!(matches!(result, Err(CredentialError::EmptyKey)));
        assert!(!store.is_set());
        assert_eq!(gate.status(), KeyStatus::Absent);
    }
}
