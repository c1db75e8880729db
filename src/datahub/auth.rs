//! Datahub Authentication
//!
//! Access key credentials and the `DATAHUB` request signature.

use super::error::{DatahubError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// Prefix shared by every header that takes part in the signature
pub const DATAHUB_HEADER_PREFIX: &str = "x-datahub-";

/// Environment variables checked for the access key id, in order
const ACCESS_KEY_VARS: &[&str] = &["ALICLOUD_ACCESS_KEY", "ALIBABA_CLOUD_ACCESS_KEY_ID"];

/// Environment variables checked for the access key secret, in order
const SECRET_KEY_VARS: &[&str] = &["ALICLOUD_SECRET_KEY", "ALIBABA_CLOUD_ACCESS_KEY_SECRET"];

/// Environment variables checked for an STS security token, in order
const SECURITY_TOKEN_VARS: &[&str] = &["ALICLOUD_SECURITY_TOKEN", "ALIBABA_CLOUD_SECURITY_TOKEN"];

/// Access key pair, optionally with an STS token
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    access_key_secret: String,
    pub security_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .field("security_token", &self.security_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    /// Load credentials from the standard Alibaba Cloud environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_or(None)
    }

    /// Like [`Credentials::from_env`], falling back to `access_key_id` when
    /// no access key variable is set. The secret always comes from the
    /// environment.
    pub fn from_env_or(access_key_id: Option<&str>) -> Result<Self> {
        let access_key_id = first_env(ACCESS_KEY_VARS)
            .or_else(|| access_key_id.map(str::to_string))
            .ok_or_else(|| {
                DatahubError::Credentials(format!("set one of {}", ACCESS_KEY_VARS.join(", ")))
            })?;
        let access_key_secret = first_env(SECRET_KEY_VARS).ok_or_else(|| {
            DatahubError::Credentials(format!("set one of {}", SECRET_KEY_VARS.join(", ")))
        })?;

        let mut credentials = Self::new(access_key_id, access_key_secret);
        if let Some(token) = first_env(SECURITY_TOKEN_VARS) {
            credentials = credentials.with_security_token(token);
        }
        Ok(credentials)
    }

    /// Compute the `Authorization` header value for a request
    ///
    /// The signed string is `METHOD\nContent-Type\nDate\n`, then every
    /// `x-datahub-*` header as `key:value\n` in key order, then the
    /// canonical resource (path plus sorted query).
    pub fn authorization(
        &self,
        method: &str,
        content_type: &str,
        date: &str,
        headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> String {
        let string_to_sign = string_to_sign(method, content_type, date, headers, resource);
        format!(
            "DATAHUB {}:{}",
            self.access_key_id,
            self.signature(&string_to_sign)
        )
    }

    fn signature(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.access_key_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Build the canonical string covered by the signature
pub fn string_to_sign(
    method: &str,
    content_type: &str,
    date: &str,
    headers: &BTreeMap<String, String>,
    resource: &str,
) -> String {
    let mut out = format!("{}\n{}\n{}\n", method, content_type, date);

    for (key, value) in headers {
        let key = key.to_lowercase();
        if key.starts_with(DATAHUB_HEADER_PREFIX) {
            out.push_str(&key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
    }

    out.push_str(resource);
    out
}

/// Canonical resource: the URL path, then query pairs sorted by key
pub fn canonical_resource(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        return url.path().to_string();
    }

    pairs.sort();
    let query = pairs
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", url.path(), query)
}
