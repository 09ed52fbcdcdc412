use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::error::ApiError;

/// Thin HTTP client for the clinic backend.
///
/// Every call resolves to either the decoded JSON body or an [`ApiError`]
/// already classified for the sync layer (401 fatal, 409/422 conflict,
/// transport failures transient, undecodable bodies malformed).
#[derive(Clone)]
pub struct ClinicApiClient {
    client: Client,
    base_url: String,
    session_token: String,
}

impl ClinicApiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_token(&config.clinic_api_url, &config.session_token)
    }

    pub fn with_token(base_url: &str, session_token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: session_token.to_string(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if !self.session_token.is_empty() {
            match HeaderValue::from_str(&format!("Bearer {}", self.session_token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Session token contains invalid header characters, sending unauthenticated"),
            }
        }

        headers
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers());

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| {
            warn!("Transport failure for {}: {}", url, e);
            ApiError::Transient(e.to_string())
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ApiError::Transient(e.to_string()))?;

        if !status.is_success() {
            let error_text = String::from_utf8_lossy(&bytes);
            error!("API error ({}): {}", status, error_text);
            return Err(classify_failure(status, extract_detail(&error_text)));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| ApiError::MalformedResponse(format!("{} returned undecodable JSON: {}", path, e)))
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(Method::POST, path, body).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn classify_failure(status: StatusCode, detail: Option<String>) -> ApiError {
    match status.as_u16() {
        401 => ApiError::Unauthorized(detail.unwrap_or_default()),
        409 | 422 => ApiError::Conflict {
            status: status.as_u16(),
            detail: detail.unwrap_or_default(),
        },
        code if status.is_server_error() => {
            ApiError::Transient(detail.unwrap_or_else(|| format!("server error {}", code)))
        }
        code => ApiError::Rejected { status: code, detail },
    }
}

/// Pull the human-readable `detail` out of an error body.
///
/// Accepts `{"detail": "text"}` and validation-style `{"detail": [{"msg": ...}]}`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail")? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}
