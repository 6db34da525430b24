//! Kubernetes API client used by the flatteners

use super::KubeStateConfig;
use crate::error::{InputError, Result};
use k8s_openapi::{List, ListableResource};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Certificate, Client, Identity};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Thin list-only client for the cluster API server
pub struct KubeClient {
    client: Client,
    base_url: Url,
}

impl KubeClient {
    pub fn new(config: &KubeStateConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = bearer_token(config)? {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| InputError::Config(format!("invalid bearer token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(config.response_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify);

        if let Some(ca) = &config.tls_ca {
            let pem = read_pem(ca)?;
            let cert = Certificate::from_pem(&pem).map_err(|e| InputError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        match (&config.tls_cert, &config.tls_key) {
            (Some(cert), Some(key)) => {
                let mut pem = read_pem(cert)?;
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
                let identity =
                    Identity::from_pem(&pem).map_err(|e| InputError::Tls(e.to_string()))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(InputError::Tls(
                    "tls_cert and tls_key must be set together".to_string(),
                ))
            }
        }

        let client = builder
            .build()
            .map_err(|e| InputError::Tls(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET a list endpoint and return its items
    pub async fn get_list<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: ListableResource + DeserializeOwned,
    {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        debug!(url = %url, kind = T::LIST_KIND, "Kubernetes list request");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InputError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let list: List<T> = serde_json::from_slice(&bytes)?;
        Ok(list.items)
    }
}

/// Token from `bearer_token` (file) or else `bearer_token_string`
fn bearer_token(config: &KubeStateConfig) -> Result<Option<String>> {
    if let Some(path) = &config.bearer_token {
        let token = std::fs::read_to_string(path).map_err(|source| InputError::TokenRead {
            path: path.clone(),
            source,
        })?;
        return Ok(Some(token.trim().to_string()));
    }

    Ok(config
        .bearer_token_string
        .as_ref()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| InputError::Tls(format!("{}: {}", path.display(), e)))
}
