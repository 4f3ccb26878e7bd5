#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use swift_example::error::SwiftError;
use swift_example::model::{DataRecord, EncryptReceipt, UserId};
use swift_example::swift::{SwiftApi, SwiftResult};

/// In-memory stand-in for the Swift Protocol service.
#[derive(Default)]
pub struct FakeSwift {
    state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub consent: HashSet<String>,
    pub items: BTreeMap<(String, String), (Value, u64)>,
    pub calls: Vec<String>,
    /// When set, every operation fails with this message.
    pub fail_with: Option<String>,
}

impl FakeSwift {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    fn record(&self, call: String) -> SwiftResult<()> {
        self.with(|s| {
            s.calls.push(call);
            match &s.fail_with {
                Some(message) => Err(SwiftError::Api {
                    status: 503,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        })
    }
}

#[async_trait]
impl SwiftApi for FakeSwift {
    async fn encrypt(
        &self,
        user: &UserId,
        data_key: &str,
        data: &Value,
    ) -> SwiftResult<EncryptReceipt> {
        self.record(format!("encrypt:{}:{}", user.value, data_key))?;
        let version = self.with(|s| {
            let entry = s
                .items
                .entry((user.value.clone(), data_key.to_string()))
                .or_insert((Value::Null, 0));
            entry.0 = data.clone();
            entry.1 += 1;
            entry.1
        });
        Ok(EncryptReceipt {
            ciphertext: format!("ct-{}-{}", data_key, version),
            version,
            metadata: Map::new(),
        })
    }

    async fn decrypt(&self, user: &UserId, data_key: &str) -> SwiftResult<DataRecord> {
        self.record(format!("decrypt:{}:{}", user.value, data_key))?;
        self.with(|s| s.items.get(&(user.value.clone(), data_key.to_string())).cloned())
            .map(|(data, version)| {
                let mut metadata = Map::new();
                metadata.insert("algorithm".into(), json!("APUS-v2"));
                DataRecord {
                    data,
                    version,
                    metadata,
                }
            })
            .ok_or(SwiftError::Api {
                status: 404,
                message: "Data not found".into(),
            })
    }

    async fn list_user_keys(&self, user: &UserId) -> SwiftResult<Vec<String>> {
        self.record(format!("keys:{}", user.value))?;
        Ok(self.with(|s| {
            s.items
                .keys()
                .filter(|(owner, _)| owner == &user.value)
                .map(|(_, key)| key.clone())
                .collect()
        }))
    }

    async fn grant_consent(&self, user: &UserId) -> SwiftResult<()> {
        self.record(format!("grant:{}", user.value))?;
        self.with(|s| s.consent.insert(user.value.clone()));
        Ok(())
    }

    async fn verify_consent(&self, user: &UserId) -> SwiftResult<bool> {
        self.record(format!("verify:{}", user.value))?;
        Ok(self.with(|s| s.consent.contains(&user.value)))
    }

    async fn revoke_consent(&self, user: &UserId) -> SwiftResult<()> {
        self.record(format!("revoke:{}", user.value))?;
        self.with(|s| s.consent.remove(&user.value));
        Ok(())
    }

    async fn health(&self) -> SwiftResult<Value> {
        self.record("health".into())?;
        Ok(json!({"status": "ok"}))
    }
}
