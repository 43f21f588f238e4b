use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_ENCODING, HOST};
use reqwest::Request;
use std::path::PathBuf;

use crate::{body::ContentEncoding, config::HttpInputConfig, error::FetchError};

/// Pre-send modification of an outbound request
///
/// Runs after the body has been attached and before the request is sent.
#[async_trait]
pub trait Augmenter: Send + Sync {
    async fn augment(&self, request: &mut Request) -> Result<(), FetchError>;
}

/// Applies the authentication and headers configured for an input
#[derive(Debug, Clone, Default)]
pub struct ConfigAugmenter {
    bearer_token: Option<PathBuf>,
    token: Option<String>,
    content_encoding: ContentEncoding,
    headers: Vec<(String, String)>,
    basic_auth: Option<(String, String)>,
}

impl ConfigAugmenter {
    pub fn from_config(config: &HttpInputConfig) -> Self {
        let mut headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.sort();

        let username = config.username.clone().unwrap_or_default();
        let password = config.password.clone().unwrap_or_default();
        let basic_auth = if username.is_empty() && password.is_empty() {
            None
        } else {
            Some((username, password))
        };

        Self {
            bearer_token: config.bearer_token.clone(),
            token: config.token.clone(),
            content_encoding: config.content_encoding,
            headers,
            basic_auth,
        }
    }

    async fn bearer(&self) -> Result<Option<String>, FetchError> {
        if let Some(path) = &self.bearer_token {
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FetchError::TokenFile {
                    path: path.clone(),
                    source,
                })?;
            return Ok(Some(contents.trim().to_string()));
        }

        Ok(self.token.clone())
    }
}

#[async_trait]
impl Augmenter for ConfigAugmenter {
    async fn augment(&self, request: &mut Request) -> Result<(), FetchError> {
        if let Some(token) = self.bearer().await? {
            let value = sensitive_value("Authorization", &format!("Bearer {}", token))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        if let Some(encoding) = self.content_encoding.header_value() {
            request
                .headers_mut()
                .insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }

        for (name, value) in &self.headers {
            let header_value = header_value(name, value)?;
            if name.eq_ignore_ascii_case("host") {
                request.headers_mut().insert(HOST, header_value);
                continue;
            }

            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            request.headers_mut().append(header_name, header_value);
        }

        if let Some((username, password)) = &self.basic_auth {
            let credentials = STANDARD.encode(format!("{}:{}", username, password));
            let value = sensitive_value("Authorization", &format!("Basic {}", credentials))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(())
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn sensitive_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    let mut value = header_value(name, value)?;
    value.set_sensitive(true);
    Ok(value)
}
