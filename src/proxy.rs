//! Client for the proxy routes, used by the interactive front end.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProxyError;
use crate::model::{
    ConsentBody, DataRecord, DecryptRequest, EncryptReceipt, EncryptRequest, Envelope,
    ErrorEnvelope, HealthBody, KeysBody, ResultBody, UsernameParams,
};

pub type ProxyResult<T> = Result<T, ProxyError>;

#[async_trait]
pub trait ProxyApi: Send + Sync {
    async fn health(&self) -> ProxyResult<Value>;
    async fn consent_status(&self, username: &str) -> ProxyResult<bool>;
    async fn grant_consent(&self, username: &str) -> ProxyResult<()>;
    async fn revoke_consent(&self, username: &str) -> ProxyResult<()>;
    async fn user_keys(&self, username: &str) -> ProxyResult<Vec<String>>;
    async fn encrypt(
        &self,
        username: &str,
        data_key: &str,
        data: Value,
        is_json: bool,
    ) -> ProxyResult<EncryptReceipt>;
    /// `Ok(None)` when the proxy reported success without a result.
    async fn decrypt(&self, username: &str, data_key: &str) -> ProxyResult<Option<DataRecord>>;
}

pub struct HttpProxy {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProxy {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/api/swift{}", self.base_url, route)
    }

    fn username_body(username: &str) -> UsernameParams {
        UsernameParams {
            username: Some(username.to_string()),
        }
    }
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> ProxyResult<Envelope<T>> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
            .map(|e| e.message)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ProxyError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    let envelope: Envelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| ProxyError::Decode(e.to_string()))?;
    if envelope.status != "success" {
        return Err(ProxyError::Rejected {
            status: status.as_u16(),
            message: envelope.message,
        });
    }
    Ok(envelope)
}

#[async_trait]
impl ProxyApi for HttpProxy {
    async fn health(&self) -> ProxyResult<Value> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(read::<HealthBody>(response).await?.body.details)
    }

    async fn consent_status(&self, username: &str) -> ProxyResult<bool> {
        let response = self
            .http
            .get(self.url("/consent"))
            .query(&Self::username_body(username))
            .send()
            .await?;
        Ok(read::<ConsentBody>(response).await?.body.has_consent)
    }

    async fn grant_consent(&self, username: &str) -> ProxyResult<()> {
        let response = self
            .http
            .post(self.url("/consent"))
            .json(&Self::username_body(username))
            .send()
            .await?;
        read::<ConsentBody>(response).await.map(|_| ())
    }

    async fn revoke_consent(&self, username: &str) -> ProxyResult<()> {
        let response = self
            .http
            .delete(self.url("/consent"))
            .json(&Self::username_body(username))
            .send()
            .await?;
        read::<ConsentBody>(response).await.map(|_| ())
    }

    async fn user_keys(&self, username: &str) -> ProxyResult<Vec<String>> {
        let response = self
            .http
            .get(self.url("/user-keys"))
            .query(&Self::username_body(username))
            .send()
            .await?;
        Ok(read::<KeysBody>(response).await?.body.keys)
    }

    async fn encrypt(
        &self,
        username: &str,
        data_key: &str,
        data: Value,
        is_json: bool,
    ) -> ProxyResult<EncryptReceipt> {
        let body = EncryptRequest {
            username: Some(username.to_string()),
            data_key: Some(data_key.to_string()),
            data: Some(data),
            is_json: Some(is_json),
        };
        let response = self.http.post(self.url("/encrypt")).json(&body).send().await?;
        read::<ResultBody<EncryptReceipt>>(response)
            .await?
            .body
            .result
            .ok_or_else(|| ProxyError::Decode("No data returned from API".into()))
    }

    async fn decrypt(&self, username: &str, data_key: &str) -> ProxyResult<Option<DataRecord>> {
        let body = DecryptRequest {
            username: Some(username.to_string()),
            data_key: Some(data_key.to_string()),
        };
        let response = self.http.post(self.url("/decrypt")).json(&body).send().await?;
        Ok(read::<ResultBody<DataRecord>>(response).await?.body.result)
    }
}
