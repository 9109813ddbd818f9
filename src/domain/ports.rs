use crate::domain::model::{DeploymentDefinition, StoredDeployment, ValueMap, WorkPool};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 已註冊的步驟實作：輸入 mapping，輸出 mapping
#[async_trait]
pub trait Step: Send + Sync {
    /// `workdir` 為專案根目錄，相對路徑一律以它為基準
    async fn execute(&self, inputs: &ValueMap, workdir: &Path) -> Result<ValueMap>;
}

/// 編排後端
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn read_work_pool(&self, name: &str) -> Result<Option<WorkPool>>;

    async fn list_work_pools(&self) -> Result<Vec<WorkPool>>;

    async fn create_or_update_work_pool(&self, pool: &WorkPool) -> Result<WorkPool>;

    async fn create_or_update_deployment(
        &self,
        definition: &DeploymentDefinition,
    ) -> Result<StoredDeployment>;

    async fn read_deployment_by_name(&self, qualified_name: &str) -> Result<StoredDeployment>;

    async fn list_deployments(&self) -> Result<Vec<StoredDeployment>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub description: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// 互動提示；沒有答案時回傳 `None`，呼叫端改走非互動的錯誤
pub trait Prompt {
    fn is_interactive(&self) -> bool;

    fn select(&mut self, message: &str, options: &[SelectOption]) -> Option<usize>;

    fn confirm(&mut self, message: &str, default: bool) -> Option<bool>;

    fn text(&mut self, message: &str) -> Option<String>;

    /// 僅在互動模式顯示的提示訊息
    fn notify(&mut self, _message: &str) {}
}
