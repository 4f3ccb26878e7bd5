//! Client for the Swift Protocol API.
//!
//! The service owns encryption, key management and the consent ledger. This
//! module only speaks its HTTP dialect: JSON bodies, an `x-api-key` header,
//! and `{message}` / `{error}` bodies on failure.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SwiftConfig;
use crate::error::SwiftError;
use crate::model::{DataRecord, EncryptReceipt, UserId};

pub type SwiftResult<T> = Result<T, SwiftError>;

/// Operations offered by the external encryption and consent service.
#[async_trait]
pub trait SwiftApi: Send + Sync {
    async fn encrypt(&self, user: &UserId, data_key: &str, data: &Value)
        -> SwiftResult<EncryptReceipt>;
    async fn decrypt(&self, user: &UserId, data_key: &str) -> SwiftResult<DataRecord>;
    async fn list_user_keys(&self, user: &UserId) -> SwiftResult<Vec<String>>;
    async fn grant_consent(&self, user: &UserId) -> SwiftResult<()>;
    async fn verify_consent(&self, user: &UserId) -> SwiftResult<bool>;
    async fn revoke_consent(&self, user: &UserId) -> SwiftResult<()>;
    async fn health(&self) -> SwiftResult<Value>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRequest<'a> {
    user_id: &'a UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyRequest<'a> {
    user_id: &'a UserId,
    data_key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest<'a> {
    user_id: &'a UserId,
    data_key: &'a str,
    data: &'a Value,
}

#[derive(Deserialize)]
struct KeysResponse {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    has_consent: bool,
}

#[derive(Deserialize, Default)]
struct FailureBody {
    message: Option<String>,
    error: Option<String>,
}

pub struct SwiftClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SwiftClient {
    pub fn new(config: &SwiftConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SwiftResult<reqwest::Response> {
        let response = self
            .http
            .post(self.url(path))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        check(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> SwiftResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SwiftError::Decode(e.to_string()))
    }
}

/// Turns non-success responses into [`SwiftError::Api`].
async fn check(response: reqwest::Response) -> SwiftResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(SwiftError::Api {
        status: status.as_u16(),
        message: failure_message(status, &text),
    })
}

fn failure_message(status: StatusCode, body: &str) -> String {
    let parsed: FailureBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

#[async_trait]
impl SwiftApi for SwiftClient {
    async fn encrypt(
        &self,
        user: &UserId,
        data_key: &str,
        data: &Value,
    ) -> SwiftResult<EncryptReceipt> {
        let body = EncryptRequest {
            user_id: user,
            data_key,
            data,
        };
        self.post_json("/encrypt", &body).await
    }

    async fn decrypt(&self, user: &UserId, data_key: &str) -> SwiftResult<DataRecord> {
        let body = KeyRequest {
            user_id: user,
            data_key,
        };
        self.post_json("/decrypt", &body).await
    }

    async fn list_user_keys(&self, user: &UserId) -> SwiftResult<Vec<String>> {
        match self
            .post_json::<_, KeysResponse>("/keys", &UserRequest { user_id: user })
            .await
        {
            Ok(resp) => Ok(resp.keys),
            // A user with nothing stored yet is reported as 404.
            Err(e) if e.status() == Some(404) => {
                log::debug!("no keys stored for {}: {}", user.value, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn grant_consent(&self, user: &UserId) -> SwiftResult<()> {
        self.post("/consent/grant", &UserRequest { user_id: user })
            .await
            .map(|_| ())
    }

    async fn verify_consent(&self, user: &UserId) -> SwiftResult<bool> {
        let resp: VerifyResponse = self
            .post_json("/consent/verify", &UserRequest { user_id: user })
            .await?;
        Ok(resp.has_consent)
    }

    async fn revoke_consent(&self, user: &UserId) -> SwiftResult<()> {
        self.post("/consent/revoke", &UserRequest { user_id: user })
            .await
            .map(|_| ())
    }

    async fn health(&self) -> SwiftResult<Value> {
        let response = self
            .http
            .get(self.url("/health"))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let response = check(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| SwiftError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_prefers_message_field() {
        let msg = failure_message(
            StatusCode::BAD_REQUEST,
            r#"{"message":"bad key","error":"other"}"#,
        );
        assert_eq!(msg, "bad key");
    }

    #[test]
    fn failure_message_falls_back_to_error_then_reason() {
        assert_eq!(
            failure_message(StatusCode::NOT_FOUND, r#"{"error":"No data keys found for this user"}"#),
            "No data keys found for this user"
        );
        assert_eq!(
            failure_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "Bad Gateway"
        );
    }

    #[test]
    fn base_url_has_no_trailing_slash() {
        let client = SwiftClient::new(&SwiftConfig {
            api_url: "http://localhost:9000/".into(),
            api_key: "k".into(),
        });
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.url("/health"), "http://localhost:9000/health");
    }
}
