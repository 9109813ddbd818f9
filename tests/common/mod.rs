#![allow(dead_code)]

use async_trait::async_trait;
use flow_deploy::domain::model::{DeploymentDefinition, StoredDeployment, ValueMap, WorkPool};
use flow_deploy::domain::ports::{BackendClient, Step};
use flow_deploy::{DeployError, ProjectContext, Result, StepRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TEST_STEP: &str = "flowdeploy.testing.steps.produce_outputs";
pub const FAILING_STEP: &str = "flowdeploy.testing.steps.always_fails";

/// 回傳輸入內容並附帶 `output1` / `output2`
#[derive(Clone, Default)]
pub struct ProduceOutputs {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Step for ProduceOutputs {
    async fn execute(&self, inputs: &ValueMap, _workdir: &Path) -> Result<ValueMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outputs = inputs.clone();
        outputs.insert("output1".to_string(), json!(1));
        outputs.insert("output2".to_string(), json!(["b", 2, 3]));
        Ok(outputs)
    }
}

pub struct AlwaysFails;

#[async_trait]
impl Step for AlwaysFails {
    async fn execute(&self, _inputs: &ValueMap, _workdir: &Path) -> Result<ValueMap> {
        Err(DeployError::StepExecutionError {
            identifier: FAILING_STEP.to_string(),
            message: "exit status 1".to_string(),
        })
    }
}

pub fn registry() -> (StepRegistry, Arc<AtomicUsize>) {
    let step = ProduceOutputs::default();
    let calls = step.calls.clone();
    let registry = StepRegistry::with_builtins()
        .with_step(TEST_STEP, step)
        .with_step(FAILING_STEP, AlwaysFails);
    (registry, calls)
}

/// 記憶體內的後端，以 `<flow>/<name>` 為鍵
#[derive(Default)]
pub struct InMemoryBackend {
    pools: Mutex<Vec<WorkPool>>,
    deployments: Mutex<HashMap<String, StoredDeployment>>,
    submissions: AtomicUsize,
}

impl InMemoryBackend {
    pub fn with_pools(pools: &[(&str, &str)]) -> Self {
        let backend = Self::default();
        {
            let mut guard = backend.pools.lock().expect("pool lock");
            for (name, pool_type) in pools {
                guard.push(WorkPool {
                    name: name.to_string(),
                    pool_type: pool_type.to_string(),
                });
            }
        }
        backend
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.pools
            .lock()
            .expect("pool lock")
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn read_work_pool(&self, name: &str) -> Result<Option<WorkPool>> {
        Ok(self
            .pools
            .lock()
            .expect("pool lock")
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_work_pools(&self) -> Result<Vec<WorkPool>> {
        Ok(self.pools.lock().expect("pool lock").clone())
    }

    async fn create_or_update_work_pool(&self, pool: &WorkPool) -> Result<WorkPool> {
        let mut pools = self.pools.lock().expect("pool lock");
        pools.retain(|p| p.name != pool.name);
        pools.push(pool.clone());
        Ok(pool.clone())
    }

    async fn create_or_update_deployment(
        &self,
        definition: &DeploymentDefinition,
    ) -> Result<StoredDeployment> {
        let count = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = StoredDeployment {
            id: format!("deployment-{}", count),
            definition: definition.clone(),
        };
        self.deployments
            .lock()
            .expect("deployment lock")
            .insert(definition.qualified_name(), stored.clone());
        Ok(stored)
    }

    async fn read_deployment_by_name(&self, qualified_name: &str) -> Result<StoredDeployment> {
        self.deployments
            .lock()
            .expect("deployment lock")
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| DeployError::DeploymentNotFoundError {
                name: qualified_name.to_string(),
            })
    }

    async fn list_deployments(&self) -> Result<Vec<StoredDeployment>> {
        let mut deployments: Vec<StoredDeployment> = self
            .deployments
            .lock()
            .expect("deployment lock")
            .values()
            .cloned()
            .collect();
        deployments.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
        Ok(deployments)
    }
}

/// 在暫存目錄建立專案檔案並載入
pub struct TestProject {
    pub dir: TempDir,
    pub context: ProjectContext,
}

impl TestProject {
    pub fn new(manifest: Value, declarations: Option<Value>) -> Self {
        Self::with_flows(manifest, declarations, None)
    }

    pub fn with_flows(manifest: Value, declarations: Option<Value>, flows: Option<Value>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");

        fs::write(
            dir.path().join("flowdeploy.yaml"),
            serde_yaml_ng::to_string(&manifest).expect("manifest yaml"),
        )
        .expect("write manifest");

        if let Some(declarations) = declarations {
            fs::write(
                dir.path().join("deployment.yaml"),
                serde_yaml_ng::to_string(&declarations).expect("declarations yaml"),
            )
            .expect("write declarations");
        }

        if let Some(flows) = flows {
            fs::create_dir_all(dir.path().join(".flowdeploy")).expect("registry dir");
            fs::write(
                dir.path().join(".flowdeploy/flows.json"),
                serde_json::to_string(&flows).expect("flows json"),
            )
            .expect("write flows");
        }

        let context = ProjectContext::load(dir.path()).expect("load project");
        Self { dir, context }
    }
}

/// build 產生 output1/output2，pull 引用 output1 與一個 secret block
pub fn templated_manifest() -> Value {
    json!({
        "build": [
            {TEST_STEP: {"input": "foo"}}
        ],
        "pull": [
            {TEST_STEP: {
                "input": "{{ output1 }}",
                "secret-input": "{{ flowdeploy.blocks.secret.test-secret }}"
            }}
        ]
    })
}

pub fn empty_manifest() -> Value {
    json!({"build": null, "pull": null})
}
