//! Interactive session controller.
//!
//! Owns everything the front end shows: identity, consent, the key list,
//! the selected record, loading flags and the current error. Every store and
//! retrieve goes through the [`ConsentGate`] first.
//!
//! State lives behind a mutex that is never held across an `.await`, so
//! several operations may be in flight at once. Overlapping retrieves are not
//! fenced; whichever response lands last is what gets displayed.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::consent::{ConsentGate, ConsentState, Gate};
use crate::error::ProxyError;
use crate::model::DataRecord;
use crate::proxy::ProxyApi;

pub const WAIT_FOR_CONSENT: &str = "Please wait while we verify consent status...";
pub const INVALID_JSON: &str = "Invalid JSON format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    #[default]
    Text,
    Json,
}

/// A store or retrieve that was held back waiting for consent.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
    Store {
        key: String,
        payload: Value,
        mode: DataMode,
    },
    Retrieve {
        key: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loading {
    pub login: bool,
    pub keys: bool,
    pub store: bool,
    pub retrieve: bool,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub username: Option<String>,
    pub gate: ConsentGate<PendingOperation>,
    pub keys: Vec<String>,
    pub keys_expanded: bool,
    pub selected_key: Option<String>,
    pub record: Option<DataRecord>,
    /// Bumped each time a retrieve starts; a new value means a new record
    /// even when its content matches the previous one.
    pub retrievals: u64,
    pub loading: Loading,
    pub error: Option<String>,
    /// Inline error for the store form's payload field.
    pub json_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            username: None,
            gate: ConsentGate::new(),
            keys: Vec::new(),
            keys_expanded: true,
            selected_key: None,
            record: None,
            retrievals: 0,
            loading: Loading::default(),
            error: None,
            json_error: None,
        }
    }
}

impl SessionState {
    pub fn consent(&self) -> ConsentState {
        self.gate.state()
    }

    pub fn logged_in(&self) -> bool {
        self.username.is_some()
    }
}

/// Validates store-form input. JSON mode payloads must parse.
pub fn prepare_payload(text: &str, mode: DataMode) -> Result<Value, String> {
    match mode {
        DataMode::Text => Ok(Value::String(text.to_string())),
        DataMode::Json => serde_json::from_str(text).map_err(|_| INVALID_JSON.to_string()),
    }
}

/// Why a proxy call failed, with `fallback` standing in for a rejection
/// that carried no message.
fn reason(err: &ProxyError, fallback: &str) -> String {
    match err {
        ProxyError::Rejected { message, .. } if message.is_empty() => fallback.to_string(),
        other => other.to_string(),
    }
}

/// Message shown for a failed proxy call: the proxy's own message (or
/// `fallback`) when it answered, otherwise `context: error`.
fn describe(context: &str, fallback: &str, err: &ProxyError) -> String {
    match err {
        ProxyError::Rejected { .. } => reason(err, fallback),
        other => format!("{}: {}", context, other),
    }
}

pub struct Session {
    api: Arc<dyn ProxyApi>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(api: Arc<dyn ProxyApi>) -> Self {
        Self {
            api,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    fn username(&self) -> Option<String> {
        self.lock().username.clone()
    }

    fn fail(&self, message: String) {
        self.update(|s| s.error = Some(message));
    }

    /// Checks the service is reachable, then switches identity and looks up
    /// the user's consent. Returns whether the login went through.
    pub async fn login(&self, username: &str) -> bool {
        if username.trim().is_empty() {
            self.fail("Please enter a username".into());
            return false;
        }
        self.update(|s| {
            s.loading.login = true;
            s.error = None;
        });

        match self.api.health().await {
            Ok(details) => {
                log::info!("API health: {}", details);
                self.update(|s| {
                    *s = SessionState {
                        username: Some(username.to_string()),
                        ..SessionState::default()
                    };
                });
                self.check_consent_status().await;
                true
            }
            Err(e) => {
                self.update(|s| {
                    s.loading.login = false;
                    s.error = Some(format!("Error logging in: {}", e));
                });
                false
            }
        }
    }

    pub fn logout(&self) {
        self.update(|s| *s = SessionState::default());
    }

    /// Failures are logged only. The consent state then stays unknown and
    /// gated actions keep asking the user to wait.
    pub async fn check_consent_status(&self) {
        let Some(username) = self.username() else {
            return;
        };
        match self.api.consent_status(&username).await {
            Ok(has_consent) => {
                self.update(|s| s.gate.resolve(has_consent));
                if has_consent {
                    self.load_user_keys().await;
                }
            }
            Err(e) => log::warn!("Error checking consent status for {}: {}", username, e),
        }
    }

    pub async fn load_user_keys(&self) {
        let Some(username) = self.username() else {
            return;
        };
        self.update(|s| {
            s.loading.keys = true;
            s.error = None;
        });
        let result = self.api.user_keys(&username).await;
        self.update(|s| {
            match result {
                Ok(keys) => s.keys = keys,
                Err(e) => s.error = Some(describe("Error loading keys", "Failed to load keys", &e)),
            }
            s.loading.keys = false;
        });
    }

    pub fn toggle_keys_expanded(&self) {
        self.update(|s| s.keys_expanded = !s.keys_expanded);
    }

    /// Banner action: show the dialog without anything parked.
    pub fn open_consent_dialog(&self) {
        self.update(|s| s.gate.request_dialog());
    }

    /// Answers the consent dialog. Does nothing unless the dialog is open.
    pub async fn grant_consent(&self) {
        let Some(username) = self.username() else {
            return;
        };
        if !self.update(|s| s.gate.dialog_open()) {
            log::debug!("grant ignored: consent dialog is not open");
            return;
        }
        self.update(|s| {
            s.loading.keys = true;
            s.error = None;
        });

        match self.api.grant_consent(&username).await {
            Ok(()) => {
                let pending = self.update(|s| s.gate.granted());
                if let Some(op) = pending {
                    self.run_pending(&username, op).await;
                }
                self.load_user_keys().await;
            }
            Err(e) => {
                let message = reason(&e, "Failed to grant consent");
                self.update(|s| {
                    s.gate.grant_failed();
                    s.error = Some(format!("Error granting consent: {}", message));
                });
            }
        }
        self.update(|s| s.loading.keys = false);
    }

    pub fn cancel_consent(&self) {
        self.update(|s| {
            s.gate.cancel();
            s.loading.keys = false;
        });
    }

    /// Local state is reset whether or not the service confirmed the revoke.
    pub async fn revoke_consent(&self) {
        let Some(username) = self.username() else {
            return;
        };
        self.update(|s| {
            s.loading.keys = true;
            s.error = None;
        });
        let result = self.api.revoke_consent(&username).await;
        self.update(|s| {
            s.gate.revoked();
            s.keys.clear();
            s.record = None;
            s.selected_key = None;
            if let Err(e) = result {
                s.error = Some(format!("Error revoking consent: {}", e));
            }
            s.loading.keys = false;
        });
    }

    pub async fn store(&self, key: &str, text: &str, mode: DataMode) {
        let username = self.username();
        let Some(username) = username.filter(|_| !key.is_empty() && !text.is_empty()) else {
            self.fail("Please provide a key and data to store".into());
            return;
        };
        let payload = match prepare_payload(text, mode) {
            Ok(payload) => payload,
            Err(field_error) => {
                self.update(|s| s.json_error = Some(field_error));
                return;
            }
        };
        self.update(|s| s.json_error = None);

        let op = PendingOperation::Store {
            key: key.to_string(),
            payload: payload.clone(),
            mode,
        };
        match self.update(|s| s.gate.ensure(op)) {
            Gate::Proceed(_) => self.run_store(&username, key, payload, mode).await,
            Gate::Deferred => log::debug!("store of {} waiting for consent", key),
            Gate::NotReady => self.fail(WAIT_FOR_CONSENT.into()),
        }
    }

    pub async fn retrieve(&self, key: &str) {
        let username = self.username();
        let Some(username) = username.filter(|_| !key.is_empty()) else {
            self.fail("Please provide a key to retrieve".into());
            return;
        };
        let op = PendingOperation::Retrieve {
            key: key.to_string(),
        };
        match self.update(|s| s.gate.ensure(op)) {
            Gate::Proceed(_) => self.run_retrieve(&username, key).await,
            Gate::Deferred => log::debug!("retrieve of {} waiting for consent", key),
            Gate::NotReady => self.fail(WAIT_FOR_CONSENT.into()),
        }
    }

    async fn run_pending(&self, username: &str, op: PendingOperation) {
        match op {
            PendingOperation::Store { key, payload, mode } => {
                self.run_store(username, &key, payload, mode).await
            }
            PendingOperation::Retrieve { key } => self.run_retrieve(username, &key).await,
        }
    }

    async fn run_store(&self, username: &str, key: &str, payload: Value, mode: DataMode) {
        self.update(|s| {
            s.loading.store = true;
            s.error = None;
        });

        match self
            .api
            .encrypt(username, key, payload, mode == DataMode::Json)
            .await
        {
            Ok(receipt) => {
                log::info!("stored {} (version {})", key, receipt.version);
                self.load_user_keys().await;
                // show what was just written
                self.update(|s| s.selected_key = Some(key.to_string()));
                self.retrieve(key).await;
            }
            Err(e) => self.fail(format!(
                "Error storing data: {}",
                reason(&e, "Failed to store data")
            )),
        }

        self.update(|s| s.loading.store = false);
    }

    async fn run_retrieve(&self, username: &str, key: &str) {
        self.update(|s| {
            s.loading.retrieve = true;
            s.error = None;
            s.selected_key = Some(key.to_string());
            s.record = None;
            s.retrievals += 1;
        });

        let result = self.api.decrypt(username, key).await;
        self.update(|s| {
            match result {
                Ok(Some(record)) => s.record = Some(record.reparsed()),
                Ok(None) => {
                    s.error = Some("Error retrieving data: No data returned from API".into())
                }
                Err(e) => {
                    s.error = Some(format!(
                        "Error retrieving data: {}",
                        reason(&e, "Failed to decrypt data")
                    ))
                }
            }
            s.loading.retrieve = false;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_payload_is_wrapped_verbatim() {
        assert_eq!(
            prepare_payload("{not json", DataMode::Text),
            Ok(json!("{not json"))
        );
    }

    #[test]
    fn json_payload_must_parse() {
        assert_eq!(
            prepare_payload(r#"{"a":1}"#, DataMode::Json),
            Ok(json!({"a": 1}))
        );
        assert_eq!(
            prepare_payload("{not json", DataMode::Json),
            Err(INVALID_JSON.to_string())
        );
    }

    #[test]
    fn rejected_calls_show_proxy_message() {
        let err = ProxyError::Rejected {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(describe("Error loading keys", "Failed to load keys", &err), "boom");
        let err = ProxyError::Decode("bad json".into());
        assert_eq!(
            describe("Error loading keys", "Failed to load keys", &err),
            "Error loading keys: bad json"
        );
    }

    #[test]
    fn empty_rejections_use_fallback() {
        let err = ProxyError::Rejected {
            status: 500,
            message: String::new(),
        };
        assert_eq!(
            describe("Error loading keys", "Failed to load keys", &err),
            "Failed to load keys"
        );
        assert_eq!(reason(&err, "Failed to store data"), "Failed to store data");
        let err = ProxyError::Rejected {
            status: 500,
            message: "quota exceeded".into(),
        };
        assert_eq!(reason(&err, "Failed to store data"), "quota exceeded");
    }

    #[test]
    fn fresh_state_keeps_key_list_open() {
        let state = SessionState::default();
        assert!(state.keys_expanded);
        assert_eq!(state.consent(), ConsentState::Unknown);
        assert!(!state.logged_in());
    }
}
