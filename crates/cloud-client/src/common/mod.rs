//! Common utilities for the cloud gateway client
//!
//! Provides shared request/response handling used by all operations.

use crate::error::CloudError;
use crate::models::ApiErrorBody;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// HTTP client wrapper with authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
    }

    /// Make a GET request with query filters
    pub async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .authorized(self.client.get(&url))
            .query(query)
            .send()
            .await?;

        let response = check_status("GET", path, response).await?;
        decode(path, response).await
    }

    /// Make a POST request, discarding the response body
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), CloudError> {
        self.post_raw(path, body).await.map(|_| ())
    }

    /// Make a POST request and decode the response body
    pub async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, CloudError> {
        let response = self.post_raw(path, body).await?;
        decode(path, response).await
    }

    async fn post_raw(&self, path: &str, body: &serde_json::Value) -> Result<Response, CloudError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        check_status("POST", path, response).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("PUT {}", url);

        let response = self
            .authorized(self.client.put(&url))
            .json(body)
            .send()
            .await?;

        check_status("PUT", path, response).await.map(|_| ())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self.authorized(self.client.delete(&url)).send().await?;

        check_status("DELETE", path, response).await.map(|_| ())
    }
}

/// Maps non-success responses onto the sentinel error variants.
///
/// The gateway reports a machine-readable `code` in its error body; the HTTP
/// status is used when the body cannot be decoded.
pub(crate) async fn check_status(
    method: &str,
    path: &str,
    response: Response,
) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let code = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.code)
        .unwrap_or_default();
    let detail = format!("{} {} failed: {} - {}", method, path, status, body);

    Err(classify(status, &code, detail))
}

pub(crate) fn classify(status: StatusCode, code: &str, detail: String) -> CloudError {
    match code {
        "NotFound" => return CloudError::NotFound(detail),
        "AlreadyExists" => return CloudError::AlreadyExists(detail),
        "InProgress" => return CloudError::InProgress(detail),
        _ => {}
    }

    match status {
        StatusCode::NOT_FOUND => CloudError::NotFound(detail),
        StatusCode::CONFLICT => CloudError::AlreadyExists(detail),
        StatusCode::LOCKED => CloudError::InProgress(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Authentication(detail),
        _ => CloudError::Api(detail),
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(path: &str, response: Response) -> Result<T, CloudError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        CloudError::Api(format!(
            "error decoding response body from {}: {} - Response (first 500 chars): {}",
            path,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}
