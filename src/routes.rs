//! HTTP proxy in front of the Swift Protocol API.
//!
//! Handlers are stateless: each validates its inputs, calls the service and
//! wraps the outcome in the `{status, message, ...}` envelope.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::{ApiError, SwiftError};
use crate::model::{
    ConsentBody, DataRecord, DecryptRequest, EncryptReceipt, EncryptRequest, Envelope,
    HealthBody, KeysBody, PublicConfig, ResultBody, UserId, UsernameParams,
};
use crate::swift::SwiftApi;

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    swift: Arc<dyn SwiftApi>,
    public_api_url: String,
}

impl AppState {
    pub fn new(swift: Arc<dyn SwiftApi>, public_api_url: impl Into<String>) -> Self {
        Self {
            swift,
            public_api_url: public_api_url.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let swift = Router::new()
        .route(
            "/consent",
            get(verify_consent)
                .post(grant_consent)
                .delete(revoke_consent)
                .fallback(method_not_allowed),
        )
        .route("/encrypt", post(encrypt).fallback(method_not_allowed))
        .route("/decrypt", post(decrypt).fallback(method_not_allowed))
        .route("/user-keys", get(user_keys).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed));

    Router::new()
        .nest("/api/swift", swift)
        .route("/api/config", get(public_config))
        .with_state(state)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// An unreadable body is handled like an empty one so the caller gets the
/// field-naming validation message.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(body)) => body,
        Err(e) => {
            log::debug!("unreadable request body: {}", e);
            T::default()
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn upstream(context: &str, fallback: &str, err: SwiftError) -> ApiError {
    log::error!("{}: {}", context, err);
    ApiError::upstream(&err, fallback)
}

fn require_username(username: Option<String>) -> Result<UserId, ApiError> {
    present(username)
        .map(UserId::plaintext)
        .ok_or_else(|| ApiError::Validation("Missing required parameter: username".into()))
}

async fn verify_consent(
    State(state): State<AppState>,
    Query(params): Query<UsernameParams>,
) -> ApiResult<ConsentBody> {
    let user = require_username(params.username)?;
    let has_consent = state
        .swift
        .verify_consent(&user)
        .await
        .map_err(|e| upstream("Consent operation error", "Failed to perform consent operation", e))?;
    let message = if has_consent {
        "User has granted consent"
    } else {
        "User has not granted consent"
    };
    Ok(Json(Envelope::success(message, ConsentBody { has_consent })))
}

async fn grant_consent(
    State(state): State<AppState>,
    body: Result<Json<UsernameParams>, JsonRejection>,
) -> ApiResult<ConsentBody> {
    let user = require_username(body_or_default(body).username)?;
    state
        .swift
        .grant_consent(&user)
        .await
        .map_err(|e| upstream("Consent operation error", "Failed to perform consent operation", e))?;
    Ok(Json(Envelope::success(
        "Consent granted successfully",
        ConsentBody { has_consent: true },
    )))
}

async fn revoke_consent(
    State(state): State<AppState>,
    body: Result<Json<UsernameParams>, JsonRejection>,
) -> ApiResult<ConsentBody> {
    let user = require_username(body_or_default(body).username)?;
    state
        .swift
        .revoke_consent(&user)
        .await
        .map_err(|e| upstream("Consent operation error", "Failed to perform consent operation", e))?;
    Ok(Json(Envelope::success(
        "Consent revoked successfully",
        ConsentBody { has_consent: false },
    )))
}

async fn encrypt(
    State(state): State<AppState>,
    body: Result<Json<EncryptRequest>, JsonRejection>,
) -> ApiResult<ResultBody<EncryptReceipt>> {
    let req = body_or_default(body);
    let (Some(username), Some(data_key), Some(data)) =
        (present(req.username), present(req.data_key), req.data)
    else {
        return Err(ApiError::Validation(
            "Missing required fields: username, dataKey, and data are required".into(),
        ));
    };
    let user = UserId::plaintext(username);
    log::debug!(
        "encrypting {} for {} (json: {})",
        data_key,
        user.value,
        req.is_json.unwrap_or(false)
    );

    // Storing always (re)grants consent first.
    state
        .swift
        .grant_consent(&user)
        .await
        .map_err(|e| upstream("Encryption error", "Failed to encrypt data", e))?;
    let receipt = state
        .swift
        .encrypt(&user, &data_key, &data)
        .await
        .map_err(|e| upstream("Encryption error", "Failed to encrypt data", e))?;

    Ok(Json(Envelope::success(
        "Data encrypted successfully",
        ResultBody {
            result: Some(receipt),
        },
    )))
}

async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> ApiResult<ResultBody<DataRecord>> {
    let req = body_or_default(body);
    let (Some(username), Some(data_key)) = (present(req.username), present(req.data_key)) else {
        return Err(ApiError::Validation(
            "Missing required fields: username and dataKey are required".into(),
        ));
    };
    let user = UserId::plaintext(username);

    // Grants consent on the user's behalf when it is missing, unlike the
    // interactive flow which asks first.
    let has_consent = state
        .swift
        .verify_consent(&user)
        .await
        .map_err(|e| upstream("Decryption error", "Failed to decrypt data", e))?;
    if !has_consent {
        log::info!("auto-granting consent for {} before decrypt", user.value);
        state
            .swift
            .grant_consent(&user)
            .await
            .map_err(|e| upstream("Decryption error", "Failed to decrypt data", e))?;
    }

    let record = state
        .swift
        .decrypt(&user, &data_key)
        .await
        .map_err(|e| upstream("Decryption error", "Failed to decrypt data", e))?;

    Ok(Json(Envelope::success(
        "Data decrypted successfully",
        ResultBody {
            result: Some(record),
        },
    )))
}

async fn user_keys(
    State(state): State<AppState>,
    Query(params): Query<UsernameParams>,
) -> ApiResult<KeysBody> {
    let Some(username) = present(params.username) else {
        return Err(ApiError::Validation(
            "Missing required query parameter: username".into(),
        ));
    };
    let user = UserId::plaintext(username);
    let keys = state
        .swift
        .list_user_keys(&user)
        .await
        .map_err(|e| upstream("Error retrieving user keys", "Failed to retrieve user keys", e))?;
    Ok(Json(Envelope::success(
        "User keys retrieved successfully",
        KeysBody { keys },
    )))
}

async fn health(State(state): State<AppState>) -> ApiResult<HealthBody> {
    let details = state
        .swift
        .health()
        .await
        .map_err(|e| upstream("Health check error", "Failed to check API health", e))?;
    Ok(Json(Envelope::success("API is healthy", HealthBody { details })))
}

async fn public_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig {
        api_url: state.public_api_url.clone(),
    })
}
