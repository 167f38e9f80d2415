// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::ApiConfig;

/// Header carrying the static API credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Create a configured asynchronous HTTP client.
///
/// The credential is installed as a default header, so every request made
/// through the client is authenticated.
pub fn create_async_client(config: &ApiConfig, api_key: &str) -> Result<reqwest::Client> {
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| AppError::authentication("API key contains characters not valid in a header"))?;
    key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}
