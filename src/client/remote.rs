//! Sync server client
//!
//! Talks to the optional remote server that stores budget files. Every
//! response uses the envelope `{"status": "ok", "data": ...}`; anything else
//! is reported as a sync error carrying the server's `reason`.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::storage::BudgetSnapshot;

const TOKEN_HEADER: &str = "x-actual-token";
const FILE_ID_HEADER: &str = "x-actual-file-id";

/// Error reasons that mean the token must be renewed
const AUTH_REASONS: &[&str] = &["unauthorized", "token-expired", "invalid-token"];

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    reason: Option<String>,
}

enum Reply<T> {
    Data(T),
    Unauthorized(String),
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

/// A budget file stored on the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub file_id: String,
    pub name: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A downloaded budget file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBudget {
    pub name: String,
    #[serde(default)]
    pub group_id: Option<String>,
    pub snapshot: BudgetSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Upload<'a> {
    file_id: &'a str,
    name: &'a str,
    group_id: Option<&'a str>,
    snapshot: &'a BudgetSnapshot,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    #[serde(default)]
    group_id: Option<String>,
}

/// Client for the remote sync server
pub struct SyncServer {
    base_url: String,
    password: Option<String>,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl SyncServer {
    pub fn new(base_url: &str, password: Option<String>) -> EnvelopeResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("envelope-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EnvelopeError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            password,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> EnvelopeResult<T> {
        match Self::read_reply(response).await? {
            Reply::Data(data) => Ok(data),
            Reply::Unauthorized(reason) => Err(EnvelopeError::Sync(reason)),
        }
    }

    async fn read_reply<T: DeserializeOwned>(response: reqwest::Response) -> EnvelopeResult<Reply<T>> {
        let status = response.status();
        let body = response.text().await?;
        let envelope: Option<Envelope<T>> = serde_json::from_str(&body).ok();

        let reason = envelope.as_ref().and_then(|e| e.reason.clone());
        let rejected = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            || reason.as_deref().is_some_and(|r| AUTH_REASONS.contains(&r));
        if rejected {
            return Ok(Reply::Unauthorized(
                reason.unwrap_or_else(|| format!("Server returned {}", status)),
            ));
        }

        let envelope = envelope.ok_or_else(|| {
            EnvelopeError::Sync(format!("Unexpected response ({}): {}", status, body.trim()))
        })?;
        if envelope.status != "ok" {
            return Err(EnvelopeError::Sync(
                envelope.reason.unwrap_or_else(|| format!("Server returned {}", status)),
            ));
        }
        envelope
            .data
            .map(Reply::Data)
            .ok_or_else(|| EnvelopeError::Sync("Response is missing data".into()))
    }

    /// Log in and remember the token
    ///
    /// An explicit password wins over the configured one.
    async fn login(&self, slot: &mut Option<String>, password: Option<&str>) -> EnvelopeResult<String> {
        *slot = None;
        let password = password
            .or(self.password.as_deref())
            .ok_or_else(|| EnvelopeError::Config("A server password is required".into()))?;
        let response = self
            .http
            .post(self.url("/account/login"))
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await?;
        let login: LoginData = Self::unwrap_envelope(response).await?;
        debug!(server = %self.base_url, "Logged in to sync server");

        *slot = Some(login.token.clone());
        Ok(login.token)
    }

    /// The token to send, logging in when there is none or a password is given
    async fn token(&self, password: Option<&str>) -> EnvelopeResult<String> {
        let mut slot = self.token.lock().await;
        if let (Some(existing), None) = (slot.clone(), password) {
            return Ok(existing);
        }
        self.login(&mut slot, password).await
    }

    /// Send an authenticated request, logging in again once if the token is refused
    async fn call<T, F>(&self, password: Option<&str>, request: F) -> EnvelopeResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.token(password).await?;
        let reason = match Self::read_reply(request(&token).send().await?).await? {
            Reply::Data(data) => return Ok(data),
            Reply::Unauthorized(reason) => reason,
        };

        debug!(server = %self.base_url, %reason, "Sync token refused; logging in again");
        let token = {
            let mut slot = self.token.lock().await;
            // Another request may already have refreshed it
            match slot.clone() {
                Some(current) if current != token && password.is_none() => current,
                _ => self.login(&mut slot, password).await?,
            }
        };
        Self::unwrap_envelope(request(&token).send().await?).await
    }

    /// Files available on the server, excluding deleted ones
    pub async fn list_files(&self) -> EnvelopeResult<Vec<RemoteFile>> {
        let files: Vec<RemoteFile> = self
            .call(None, |token| {
                self.http
                    .get(self.url("/sync/list-user-files"))
                    .header(TOKEN_HEADER, token)
            })
            .await?;
        Ok(files.into_iter().filter(|f| !f.deleted).collect())
    }

    /// Download a budget file
    pub async fn download(&self, file_id: &str, password: Option<&str>) -> EnvelopeResult<RemoteBudget> {
        self.call(password, |token| {
            self.http
                .get(self.url("/sync/download-user-file"))
                .header(TOKEN_HEADER, token)
                .header(FILE_ID_HEADER, file_id)
        })
        .await
    }

    /// Upload a budget file, returning the group id assigned by the server
    pub async fn upload(
        &self,
        file_id: &str,
        name: &str,
        group_id: Option<&str>,
        snapshot: &BudgetSnapshot,
    ) -> EnvelopeResult<Option<String>> {
        let body = Upload {
            file_id,
            name,
            group_id,
            snapshot,
        };
        let data: UploadData = self
            .call(None, |token| {
                self.http
                    .post(self.url("/sync/upload-user-file"))
                    .header(TOKEN_HEADER, token)
                    .header(FILE_ID_HEADER, file_id)
                    .json(&body)
            })
            .await?;
        Ok(data.group_id.or_else(|| group_id.map(str::to_string)))
    }
}
