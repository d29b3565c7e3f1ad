//! HTTP client for the notes backend.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{NotesApi, RemoteError, RemoteNote};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::NoteFields;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Cookie carrying the session token issued at login
const SESSION_COOKIE: &str = "notes_token";

/// reqwest-backed [`NotesApi`] talking to `{base}/api/notes`.
#[derive(Debug, Clone)]
pub struct HttpNotesApi {
    base_url: String,
    session_token: Option<String>,
    client: reqwest::Client,
}

impl HttpNotesApi {
    /// Builds a client for an explicit API base URL.
    ///
    /// No timeout is applied unless `timeout` is given.
    pub fn new(
        base_url: impl Into<String>,
        session_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            base_url,
            session_token: normalize_text_option(session_token),
            client,
        })
    }

    /// Builds a client from configuration.
    ///
    /// Returns `Ok(None)` when no API URL is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Option<Self>> {
        let Some(base_url) = config.api_base_url.clone() else {
            return Ok(None);
        };
        Self::new(base_url, config.session_token.clone(), config.request_timeout()).map(Some)
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks whether the backend answers at all.
    ///
    /// Any HTTP response counts as reachable, including auth failures.
    pub async fn probe(&self) -> bool {
        match self
            .request(Method::GET, "/api/notes?page=1&pageSize=1")
            .send()
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Reachability probe failed: {error}");
                false
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.session_token {
            request = request.header(reqwest::header::COOKIE, format!("{SESSION_COOKIE}={token}"));
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<reqwest::Response, RemoteError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

impl NotesApi for HttpNotesApi {
    async fn create_note(&self, payload: &NoteFields) -> std::result::Result<RemoteNote, RemoteError> {
        let response = self
            .send(self.request(Method::POST, "/api/notes").json(payload))
            .await?;
        Ok(response.json::<RemoteNote>().await?)
    }

    async fn update_note(
        &self,
        id: i64,
        payload: &NoteFields,
    ) -> std::result::Result<RemoteNote, RemoteError> {
        let response = self
            .send(self.request(Method::PUT, &format!("/api/notes/{id}")).json(payload))
            .await?;
        Ok(response.json::<RemoteNote>().await?)
    }

    async fn delete_note(&self, id: i64) -> std::result::Result<(), RemoteError> {
        self.send(self.request(Method::DELETE, &format!("/api/notes/{id}")))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if !is_http_url(&value) {
        return Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}
