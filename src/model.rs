use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type Metadata = Map<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserIdKind {
    Plaintext,
}

/// Owner of stored data and of a consent record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    #[serde(rename = "type")]
    pub kind: UserIdKind,
    pub value: String,
}

impl UserId {
    pub fn plaintext(value: impl Into<String>) -> Self {
        Self {
            kind: UserIdKind::Plaintext,
            value: value.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptReceipt {
    pub ciphertext: String,
    pub version: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A decrypted item as handed back by the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub data: Value,
    pub version: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DataRecord {
    /// Applies [`reparse_payload`] to `data`.
    pub fn reparsed(self) -> Self {
        Self {
            data: reparse_payload(self.data),
            ..self
        }
    }
}

/// If `value` is a string holding valid JSON text, returns the parsed value.
/// Anything else, including text that fails to parse, comes back unchanged.
pub fn reparse_payload(value: Value) -> Value {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("payload kept as text: {}", e);
                Value::String(text)
            }
        },
        other => other,
    }
}

// Proxy wire types

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorEnvelope {
    pub status: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// `{status, message, ...body}` as returned by every successful route.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope<T> {
    pub status: String,
    pub message: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, body: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            body,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConsentBody {
    pub has_consent: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResultBody<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeysBody {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthBody {
    #[serde(default)]
    pub details: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct UsernameParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EncryptRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    /// `None` only when the field is absent; an explicit `null` is kept.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_json: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DecryptRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub api_url: String,
}
