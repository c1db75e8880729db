//! HTTP utilities for Datahub REST API calls

use super::auth::{canonical_resource, Credentials};
use super::error::{DatahubError, Result};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Every request body is JSON
const JSON_CONTENT_TYPE: &str = "application/json";

/// Datahub REST protocol version sent with each request
pub const CLIENT_VERSION: &str = "1.1";

/// Header carrying the service-assigned request id
pub const REQUEST_ID_HEADER: &str = "x-datahub-request-id";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Error document returned by Datahub on failure
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "ErrorCode", default)]
    code: String,
    #[serde(rename = "ErrorMessage", default)]
    message: String,
}

/// HTTP client wrapper for Datahub API calls
#[derive(Clone)]
pub struct DatahubHttpClient {
    client: Client,
}

impl DatahubHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("datahub-provider/{}", crate::VERSION))
            .build()?;

        Ok(Self { client })
    }

    /// Send a signed request and return the parsed JSON body
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        credentials: &Credentials,
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let headers = signed_headers(&method, url, credentials)?;
        let mut request = self.client.request(method, url.clone()).headers(headers);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let response_body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} [{}] - {}",
                status,
                request_id,
                sanitize_for_log(&response_body)
            );
            return Err(api_error(status.as_u16(), request_id, &response_body));
        }

        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body)
            .map_err(|e| DatahubError::Decode(format!("invalid JSON body: {}", e)))
    }
}

/// Headers common to every request, including the signature
fn signed_headers(method: &Method, url: &Url, credentials: &Credentials) -> Result<HeaderMap> {
    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let mut datahub_headers = BTreeMap::new();
    datahub_headers.insert(
        "x-datahub-client-version".to_string(),
        CLIENT_VERSION.to_string(),
    );
    if let Some(token) = &credentials.security_token {
        datahub_headers.insert("x-datahub-security-token".to_string(), token.clone());
    }

    let authorization = credentials.authorization(
        method.as_str(),
        JSON_CONTENT_TYPE,
        &date,
        &datahub_headers,
        &canonical_resource(url),
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(DATE, header_value(&date)?);
    headers.insert(AUTHORIZATION, header_value(&authorization)?);
    for (name, value) in &datahub_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| DatahubError::Credentials(format!("invalid header name: {}", e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| DatahubError::Credentials(format!("invalid header value: {}", e)))
}

/// Turn an error response into a typed error
///
/// Bodies that are not Datahub error documents still produce an error
/// carrying the HTTP status.
fn api_error(status: u16, request_id: String, body: &str) -> DatahubError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(err) if !err.code.is_empty() => (err.code, err.message),
        _ => (format!("Http{}", status), sanitize_for_log(body)),
    };

    DatahubError::Api {
        status,
        code,
        message,
        request_id,
    }
}
