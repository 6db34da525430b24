//! HTTP session against the Storage Center REST API

use super::models::{HistoricalUsageRequest, ScVolume, ScVolumeIoStat, ScVolumeStorageUsage};
use crate::error::{InputError, Result};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Version header sent when none is configured
pub const DEFAULT_API_VERSION: &str = "4.1";

const API_VERSION_HEADER: &str = "x-dell-api-version";
const REST_PREFIX: &str = "api/rest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lookback for I/O usage samples
pub const IO_USAGE_LOOKBACK_MINUTES: i64 = 15;
/// Lookback for storage usage samples
pub const STORAGE_USAGE_LOOKBACK_MINUTES: i64 = 240;

/// Authenticated session; the login cookie lives in the client's cookie store
pub struct ApiConnection {
    client: Client,
    base_url: String,
    api_version: String,
    username: String,
    password: String,
}

impl ApiConnection {
    /// Create a session. Nothing is sent until [`ApiConnection::login`].
    pub fn new(
        base_url: impl Into<String>,
        api_version: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Log in with HTTP basic auth
    pub async fn login(&self) -> Result<()> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(InputError::MissingCredentials);
        }

        let request = self
            .request(Method::POST, "/ApiConnection/Login")
            .basic_auth(&self.username, Some(&self.password));
        self.send(request).await?;

        debug!(base_url = %self.base_url, "Logged in to Storage Center");
        Ok(())
    }

    /// List every volume known to the array
    pub async fn get_volume_list(&self) -> Result<Vec<ScVolume>> {
        self.post::<_, ()>("/StorageCenter/ScVolume/GetList", None)
            .await
    }

    /// Most recent I/O usage point(s) of a volume
    pub async fn get_volume_io_usage(&self, instance_id: &str) -> Result<Vec<ScVolumeIoStat>> {
        let body = HistoricalUsageRequest::latest(Utc::now(), IO_USAGE_LOOKBACK_MINUTES);
        self.post(
            &format!("/StorageCenter/ScVolume/{}/GetHistoricalIoUsage", instance_id),
            Some(&body),
        )
        .await
    }

    /// Most recent storage usage point(s) of a volume
    pub async fn get_volume_storage_usage(
        &self,
        instance_id: &str,
    ) -> Result<Vec<ScVolumeStorageUsage>> {
        let body = HistoricalUsageRequest::latest(Utc::now(), STORAGE_USAGE_LOOKBACK_MINUTES);
        self.post(
            &format!(
                "/StorageCenter/ScVolume/{}/GetHistoricalStorageUsage",
                instance_id
            ),
            Some(&body),
        )
        .await
    }

    /// Make a POST request with an optional JSON body and decode the JSON response
    pub async fn post<T, B>(&self, resource: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize,
    {
        self.invoke(Method::POST, resource, body).await
    }

    async fn invoke<T, B>(&self, method: Method, resource: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize,
    {
        let mut request = self.request(method, resource);
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = self.send(request).await?;
        let bytes = response.bytes().await?;

        // The array answers some calls with an empty 200
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        let url = self.url(resource);
        debug!(method = %method, url = %url, "Storage Center request");

        let version = if self.api_version.is_empty() {
            DEFAULT_API_VERSION
        } else {
            self.api_version.as_str()
        };

        self.client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(API_VERSION_HEADER, version)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InputError::UnexpectedStatus { status, body });
        }

        Ok(response)
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            REST_PREFIX,
            resource.trim_matches('/')
        )
    }
}
