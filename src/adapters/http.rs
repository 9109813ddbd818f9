use crate::config::settings::ApiSettings;
use crate::domain::model::{DeploymentDefinition, StoredDeployment, WorkPool};
use crate::domain::ports::BackendClient;
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// 編排後端的 HTTP 用戶端
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpBackendClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| DeployError::InvalidConfigValueError {
            field: "api.url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
            timeout: Duration::from_secs(timeout_seconds),
        })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        Self::new(&settings.url, settings.key.clone(), settings.timeout_seconds)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DeployError::InvalidConfigValueError {
                field: "api.url".to_string(),
                value: self.base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Content-Type", "application/json")
            .timeout(self.timeout);

        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.prepare(request).send().await?;
        tracing::debug!("📡 {} {}", response.status(), response.url());
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeployError::BackendError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn read_work_pool(&self, name: &str) -> Result<Option<WorkPool>> {
        let url = self.endpoint(&["work_pools", name])?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(response).await.map(Some)
    }

    async fn list_work_pools(&self) -> Result<Vec<WorkPool>> {
        let url = self.endpoint(&["work_pools", ""])?;
        let response = self.send(self.client.get(url)).await?;
        Self::parse(response).await
    }

    async fn create_or_update_work_pool(&self, pool: &WorkPool) -> Result<WorkPool> {
        let url = self.endpoint(&["work_pools", ""])?;
        let response = self.send(self.client.post(url).json(pool)).await?;
        Self::parse(response).await
    }

    async fn create_or_update_deployment(
        &self,
        definition: &DeploymentDefinition,
    ) -> Result<StoredDeployment> {
        let url = self.endpoint(&["deployments", ""])?;
        let response = self.send(self.client.post(url).json(definition)).await?;
        Self::parse(response).await
    }

    async fn read_deployment_by_name(&self, qualified_name: &str) -> Result<StoredDeployment> {
        let (flow_name, name) = qualified_name.split_once('/').ok_or_else(|| {
            DeployError::DeploymentNotFoundError {
                name: qualified_name.to_string(),
            }
        })?;

        let url = self.endpoint(&["deployments", "name", flow_name, name])?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DeployError::DeploymentNotFoundError {
                name: qualified_name.to_string(),
            });
        }
        Self::parse(response).await
    }

    async fn list_deployments(&self) -> Result<Vec<StoredDeployment>> {
        let url = self.endpoint(&["deployments", ""])?;
        let response = self.send(self.client.get(url)).await?;
        Self::parse(response).await
    }
}
