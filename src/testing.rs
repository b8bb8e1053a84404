// Test doubles for the transport and credential store

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::auth::REFRESH_PATH;
use crate::error::{StoreError, TransportError};
use crate::store::{CredentialSlot, CredentialStore};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// How the fake backend answers `POST /auth/refresh`
#[derive(Debug, Clone)]
pub enum RefreshScript {
    Issue(String),
    /// New access token plus a rotated refresh token
    Rotate(String, String),
    Reject,
    NetworkError,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
    pub retried: bool,
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(u16, String),
    Fail,
}

/// In-memory backend. Business endpoints answer 200 when the request
/// carries the currently valid bearer token and 401 otherwise.
pub struct ScriptedTransport {
    valid_token: Mutex<String>,
    refresh: Mutex<RefreshScript>,
    overrides: Mutex<HashMap<String, Scripted>>,
    authorized_bodies: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<RecordedCall>>,
    held: AtomicBool,
    gate: Semaphore,
}

impl ScriptedTransport {
    pub fn new(valid_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refresh: Mutex::new(RefreshScript::Reject),
            overrides: Mutex::new(HashMap::new()),
            authorized_bodies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    pub fn set_refresh(&self, script: RefreshScript) {
        *self.refresh.lock().unwrap() = script;
    }

    /// Answer every request to `path` with a fixed response
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.overrides
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Respond(status, body.to_string()));
    }

    /// Body returned for `path` when the bearer token is valid
    pub fn succeed_with(&self, path: &str, body: &str) {
        self.authorized_bodies
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_string());
    }

    /// Fail every request to `path` with a connection error
    pub fn fail(&self, path: &str) {
        self.overrides
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Fail);
    }

    /// Keep renewal exchanges open until `release_refresh`
    pub fn hold_refresh(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_refresh(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1 << 20);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls_to(REFRESH_PATH).len()
    }

    fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
        ApiResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.to_string(),
        )
    }

    async fn answer_refresh(&self) -> Result<ApiResponse, TransportError> {
        if self.held.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.unwrap();
        }

        let script = self.refresh.lock().unwrap().clone();
        match script {
            RefreshScript::Issue(token) => {
                *self.valid_token.lock().unwrap() = token.clone();
                Ok(Self::json_response(
                    200,
                    json!({ "access_token": token, "token": token }),
                ))
            }
            RefreshScript::Rotate(token, refresh) => {
                *self.valid_token.lock().unwrap() = token.clone();
                Ok(Self::json_response(
                    200,
                    json!({ "access_token": token, "refresh_token": refresh }),
                ))
            }
            RefreshScript::Reject => Ok(Self::json_response(
                401,
                json!({ "error": "Invalid refresh token" }),
            )),
            RefreshScript::NetworkError => Err(TransportError::Connect(
                "connection refused".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let authorization = request.bearer().map(str::to_string);
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            authorization: authorization.clone(),
            body: request.body.clone(),
            retried: request.is_retried(),
        });

        let scripted = self.overrides.lock().unwrap().get(&request.path).cloned();
        match scripted {
            Some(Scripted::Respond(status, body)) => {
                return Ok(ApiResponse::new(
                    StatusCode::from_u16(status).unwrap(),
                    HeaderMap::new(),
                    body,
                ))
            }
            Some(Scripted::Fail) => {
                return Err(TransportError::Connect("connection refused".to_string()))
            }
            None => {}
        }

        if request.path == REFRESH_PATH {
            return self.answer_refresh().await;
        }

        // Let other tasks interleave, as a real round trip would
        tokio::task::yield_now().await;

        let valid = self.valid_token.lock().unwrap().clone();
        if authorization.as_deref() == Some(valid.as_str()) {
            let body = self.authorized_bodies.lock().unwrap().get(&request.path).cloned();
            match body {
                Some(body) => Ok(ApiResponse::new(StatusCode::OK, HeaderMap::new(), body)),
                None => Ok(Self::json_response(
                    200,
                    json!({ "ok": true, "path": request.path, "token": valid }),
                )),
            }
        } else {
            Ok(Self::json_response(
                401,
                json!({ "error": "Token is invalid" }),
            ))
        }
    }
}

/// Store whose every operation fails
pub struct BrokenStore;

#[async_trait]
impl CredentialStore for BrokenStore {
    async fn get(&self, _slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "keychain locked").into())
    }

    async fn set(&self, _slot: CredentialSlot, _value: &str) -> Result<(), StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "keychain locked").into())
    }

    async fn delete(&self, _slot: CredentialSlot) -> Result<(), StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "keychain locked").into())
    }
}

/// Poll until `condition` holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
