//! HTTP client for the storefront REST API.
//!
//! Implements the cart and journal collaborators used by the offline layer,
//! plus the health check behind the reachability probe.

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use storefront_core::cart::{Cart, CartApi};
use storefront_core::journal::{validate_entry_id, JournalApi, JournalEntry, JournalPayload};

use crate::error::{ApiError, Result};
use crate::types::*;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

const CART_PATH: &str = "/cart";
const JOURNAL_ENTRIES_PATH: &str = "/journal/entries";
const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone)]
pub struct StorefrontClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl StorefrontClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[StorefrontApi] response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[StorefrontApi] response error ({}): {}", status, preview);
    }

    /// Create a client for `base_url` (e.g. "https://api.example.com").
    ///
    /// `access_token` is sent as a bearer token when present.
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ApiError::invalid_request("API base URL is empty"));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            access_token: access_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.access_token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::auth("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(ApiError::api(status.as_u16(), error.describe()));
            }
            return Err(ApiError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                "[StorefrontApi] failed to deserialize response. Body: {}, Error: {}",
                body, e
            );
            ApiError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────────

    /// GET /cart
    pub async fn fetch_cart(&self) -> Result<Cart> {
        let response = self
            .client
            .get(self.url(CART_PATH))
            .headers(self.headers()?)
            .send()
            .await?;

        let body: CartResponse = Self::parse_response(response).await?;
        Ok(body.cart)
    }

    /// POST a queued or live cart mutation to `endpoint` (e.g. "/cart/update").
    pub async fn post_cart_action(&self, endpoint: &str, payload: &Value) -> Result<Cart> {
        if !endpoint.starts_with('/') {
            return Err(ApiError::invalid_request(format!(
                "Cart endpoint must be a path, got '{}'",
                endpoint
            )));
        }
        debug!("[StorefrontApi] POST {}", endpoint);

        let response = self
            .client
            .post(self.url(endpoint))
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;

        let body: CartResponse = Self::parse_response(response).await?;
        Ok(body.cart)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Journal
    // ─────────────────────────────────────────────────────────────────────────

    /// POST /journal/entries
    pub async fn create_journal_entry(&self, payload: &JournalPayload) -> Result<JournalEntry> {
        let response = self
            .client
            .post(self.url(JOURNAL_ENTRIES_PATH))
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;

        let body: JournalEntryResponse = Self::parse_response(response).await?;
        Ok(body.entry)
    }

    /// PUT /journal/entries/{id}
    pub async fn put_journal_entry(
        &self,
        id: &str,
        payload: &JournalPayload,
    ) -> Result<JournalEntry> {
        validate_entry_id(id).map_err(|e| ApiError::invalid_request(e.to_string()))?;
        let url = format!("{}/{}", self.url(JOURNAL_ENTRIES_PATH), id);

        let response = self
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;

        let body: JournalEntryResponse = Self::parse_response(response).await?;
        Ok(body.entry)
    }

    /// GET /journal/entries
    pub async fn list_journal_entries(&self) -> Result<Vec<JournalEntry>> {
        let response = self
            .client
            .get(self.url(JOURNAL_ENTRIES_PATH))
            .headers(self.headers()?)
            .send()
            .await?;

        let body: JournalEntriesResponse = Self::parse_response(response).await?;
        Ok(body.entries)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reachability
    // ─────────────────────────────────────────────────────────────────────────

    /// GET /health. Any 2xx counts as reachable; the body is ignored.
    pub async fn check_health(&self) -> Result<()> {
        let response = self.client.get(self.url(HEALTH_PATH)).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Self::log_response(status, &body);
        Err(ApiError::api(status.as_u16(), "Health check failed"))
    }
}

#[async_trait]
impl CartApi for StorefrontClient {
    async fn get_cart(&self) -> storefront_core::Result<Cart> {
        Ok(self.fetch_cart().await?)
    }

    async fn post_cart(&self, endpoint: &str, payload: &Value) -> storefront_core::Result<Cart> {
        Ok(self.post_cart_action(endpoint, payload).await?)
    }
}

#[async_trait]
impl JournalApi for StorefrontClient {
    async fn add_journal(&self, payload: &JournalPayload) -> storefront_core::Result<JournalEntry> {
        Ok(self.create_journal_entry(payload).await?)
    }

    async fn update_journal(
        &self,
        id: &str,
        payload: &JournalPayload,
    ) -> storefront_core::Result<JournalEntry> {
        Ok(self.put_journal_entry(id, payload).await?)
    }

    async fn list_journal(&self) -> storefront_core::Result<Vec<JournalEntry>> {
        Ok(self.list_journal_entries().await?)
    }
}
