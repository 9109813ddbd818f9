use crate::config::project::ProjectContext;
use crate::core::schedule::ScheduleResolver;
use crate::core::selector::{Candidate, DeploymentSelector};
use crate::core::steps::{StepExecutor, StepRegistry};
use crate::core::template::{TemplateContext, TemplateRenderer};
use crate::domain::model::{
    DeploymentDefinition, SelectionRequest, StoredDeployment, WorkPool,
};
use crate::domain::ports::{BackendClient, Prompt, SelectOption};
use crate::utils::error::{DeployError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 舊式 agent 使用的工作池型別，專案式部署不支援
pub const AGENT_POOL_TYPE: &str = "agent";
pub const WORK_POOL_TYPES: [&str; 3] = ["process", "docker", "kubernetes"];

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Created(StoredDeployment),
    DryRun(DeploymentDefinition),
}

impl Submission {
    pub fn definition(&self) -> &DeploymentDefinition {
        match self {
            Submission::Created(stored) => &stored.definition,
            Submission::DryRun(definition) => definition,
        }
    }
}

/// 單一部署的處理結果
#[derive(Debug)]
pub struct DeploymentOutcome {
    /// `<flow>/<name>`，若解析前就失敗則為宣告名稱
    pub name: String,
    pub result: Result<Submission>,
    pub duration: Duration,
}

impl DeploymentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct DeployReport {
    pub outcomes: Vec<DeploymentOutcome>,
    pub skipped: Vec<String>,
    pub not_found: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeployReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// 有嘗試的部署全部失敗才回傳 1
    pub fn exit_code(&self) -> i32 {
        if !self.outcomes.is_empty() && self.succeeded() == 0 {
            1
        } else {
            0
        }
    }

    /// 獲取執行摘要
    pub fn get_execution_summary(&self) -> HashMap<String, Value> {
        let mut summary = HashMap::new();

        let total_duration: Duration = self.outcomes.iter().map(|o| o.duration).sum();

        summary.insert("total".to_string(), Value::Number(self.outcomes.len().into()));
        summary.insert("succeeded".to_string(), Value::Number(self.succeeded().into()));
        summary.insert("failed".to_string(), Value::Number(self.failed().into()));
        summary.insert("skipped".to_string(), Value::Number(self.skipped.len().into()));
        summary.insert("not_found".to_string(), Value::Number(self.not_found.len().into()));
        summary.insert(
            "total_duration_ms".to_string(),
            Value::Number((total_duration.as_millis() as u64).into()),
        );

        let deployments: Vec<Value> = self
            .outcomes
            .iter()
            .map(|o| Value::String(o.name.clone()))
            .collect();
        summary.insert("deployments".to_string(), Value::Array(deployments));

        summary
    }
}

/// 依序處理每個被選中的部署：目標 → 名稱 → 工作池 → build 步驟 → 渲染 → pull → 排程 → 送出
pub struct Orchestrator<'a> {
    project: &'a ProjectContext,
    backend: &'a dyn BackendClient,
    registry: &'a StepRegistry,
    renderer: TemplateRenderer,
    dry_run: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        project: &'a ProjectContext,
        backend: &'a dyn BackendClient,
        registry: &'a StepRegistry,
    ) -> Self {
        Self {
            project,
            backend,
            registry,
            renderer: TemplateRenderer::default(),
            dry_run: false,
        }
    }

    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 執行層級錯誤以 `Err` 回傳；單一部署的失敗記錄在報告中
    pub async fn run(&self, request: &SelectionRequest, prompt: &mut dyn Prompt) -> Result<DeployReport> {
        ScheduleResolver::validate_cli(&request.overrides.schedule)?;

        let selection = DeploymentSelector::new(&self.project.declarations).select(request, prompt)?;

        let mut report = DeployReport {
            outcomes: Vec::with_capacity(selection.candidates.len()),
            skipped: selection.skipped,
            not_found: selection.not_found,
            warnings: selection.warnings,
        };

        let total = selection.candidates.len();
        for (index, candidate) in selection.candidates.into_iter().enumerate() {
            let start_time = Instant::now();
            let mut name = candidate.declaration.display_name();

            tracing::info!("🔧 Processing deployment {}/{}: {}", index + 1, total, name);

            let result = self.deploy(candidate, prompt, &mut name).await;
            let duration = start_time.elapsed();

            match &result {
                Ok(submission) => tracing::info!(
                    "✅ Deployment resolved: {} (pool: {}, duration: {:?})",
                    name,
                    submission.definition().work_pool_name,
                    duration
                ),
                Err(e) => tracing::error!("❌ Deployment '{}' failed: {}", name, e),
            }

            report.outcomes.push(DeploymentOutcome {
                name,
                result,
                duration,
            });
        }

        Ok(report)
    }

    async fn deploy(
        &self,
        candidate: Candidate,
        prompt: &mut dyn Prompt,
        label: &mut String,
    ) -> Result<Submission> {
        let Candidate {
            declaration,
            cli_schedule,
        } = candidate;

        let (entrypoint, flow_name) =
            self.resolve_target(declaration.entrypoint.clone(), declaration.flow_name.clone())?;

        let name = self.resolve_name(declaration.name.clone(), prompt)?;
        *label = format!("{}/{}", flow_name, name);

        let work_pool_name = self
            .resolve_work_pool(declaration.work_pool.name.clone(), prompt)
            .await?;

        let mut context = TemplateContext::new();
        let executor = StepExecutor::new(self.registry, &self.renderer, &self.project.root);
        executor.run(&self.project.manifest.build, &mut context).await?;
        tracing::debug!("📦 Build context keys: {:?}", context.keys().collect::<Vec<_>>());

        let version = self.render_optional(&declaration.version, &context, "version")?;
        let description = self.render_optional(&declaration.description, &context, "description")?;
        let tags = self.render_tags(&declaration.tags, &context)?;
        let parameters = self.renderer.render_map(&declaration.parameters, &context)?;
        let job_variables = self
            .renderer
            .render_map(&declaration.work_pool.job_variables, &context)?;

        let pull_steps = declaration
            .pull
            .as_deref()
            .unwrap_or(&self.project.manifest.pull);
        let pull_steps = executor.render_only(pull_steps, &context)?;

        let schedule = ScheduleResolver::resolve(cli_schedule.as_ref(), declaration.schedule.as_ref())?;

        let definition = DeploymentDefinition {
            name,
            flow_name,
            entrypoint,
            work_pool_name,
            work_queue_name: declaration.work_pool.work_queue_name.clone(),
            job_variables,
            parameters,
            version,
            tags,
            description,
            schedule,
            pull_steps,
        };

        if self.dry_run {
            return Ok(Submission::DryRun(definition));
        }

        let stored = self.backend.create_or_update_deployment(&definition).await?;
        Ok(Submission::Created(stored))
    }

    fn resolve_name(&self, declared: Option<String>, prompt: &mut dyn Prompt) -> Result<String> {
        let name = match declared {
            Some(name) => Some(name),
            None => prompt.text("Deployment name"),
        };

        name.map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(DeployError::MissingNameError)
    }

    fn resolve_target(
        &self,
        entrypoint: Option<String>,
        flow_name: Option<String>,
    ) -> Result<(String, String)> {
        match (entrypoint, flow_name) {
            (Some(_), Some(_)) => Err(DeployError::ConflictingIdentifierError),
            (Some(entrypoint), None) => {
                let flow_name = derive_flow_name(&entrypoint)?;
                Ok((entrypoint, flow_name))
            }
            (None, Some(flow_name)) => {
                let entrypoint = self
                    .project
                    .entrypoint_for(&flow_name)
                    .ok_or_else(|| DeployError::FlowNotRegisteredError {
                        flow_name: flow_name.clone(),
                    })?
                    .to_string();
                Ok((entrypoint, flow_name))
            }
            (None, None) => Err(DeployError::MissingTargetError),
        }
    }

    async fn resolve_work_pool(&self, declared: Option<String>, prompt: &mut dyn Prompt) -> Result<String> {
        let Some(name) = declared else {
            return self.choose_work_pool(prompt).await;
        };

        let pool = self
            .backend
            .read_work_pool(&name)
            .await?
            .ok_or_else(|| DeployError::WorkPoolNotFoundError { name: name.clone() })?;

        if pool.pool_type != AGENT_POOL_TYPE {
            return Ok(pool.name);
        }

        let error = DeployError::UnsupportedWorkPoolTypeError {
            name: pool.name,
            pool_type: pool.pool_type,
        };
        if !prompt.is_interactive() {
            return Err(error);
        }

        prompt.notify(&format!(
            "{} Please choose a work pool served by workers.",
            error
        ));
        self.choose_work_pool(prompt).await.map_err(|_| error)
    }

    /// 互動選擇或建立工作池；無法互動時回傳 MissingWorkPoolError
    async fn choose_work_pool(&self, prompt: &mut dyn Prompt) -> Result<String> {
        if !prompt.is_interactive() {
            return Err(DeployError::MissingWorkPoolError);
        }

        let pools: Vec<WorkPool> = self
            .backend
            .list_work_pools()
            .await?
            .into_iter()
            .filter(|pool| pool.pool_type != AGENT_POOL_TYPE)
            .collect();

        if !pools.is_empty() {
            let options: Vec<SelectOption> = pools
                .iter()
                .map(|pool| SelectOption::new(&pool.name).with_description(Some(pool.pool_type.clone())))
                .collect();

            return prompt
                .select("Which work pool would you like to deploy this flow to?", &options)
                .and_then(|index| pools.get(index))
                .map(|pool| pool.name.clone())
                .ok_or(DeployError::MissingWorkPoolError);
        }

        let create = prompt.confirm(
            "Looks like you don't have any work pools this flow can be deployed to. Would you like to create one?",
            true,
        );
        if create != Some(true) {
            return Err(DeployError::MissingWorkPoolError);
        }

        let type_options: Vec<SelectOption> = WORK_POOL_TYPES.iter().map(|t| SelectOption::new(*t)).collect();
        let pool_type = prompt
            .select(
                "What infrastructure type would you like to use for your new work pool?",
                &type_options,
            )
            .and_then(|index| WORK_POOL_TYPES.get(index))
            .ok_or(DeployError::MissingWorkPoolError)?;

        let name = prompt
            .text("Work pool name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(DeployError::MissingWorkPoolError)?;

        let created = self
            .backend
            .create_or_update_work_pool(&WorkPool {
                name,
                pool_type: pool_type.to_string(),
            })
            .await?;

        tracing::info!("✅ Created work pool '{}' ({})", created.name, created.pool_type);
        Ok(created.name)
    }

    fn render_optional(
        &self,
        value: &Option<Value>,
        context: &TemplateContext,
        field: &str,
    ) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };

        match self.renderer.render_value(value, context)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            scalar @ (Value::Number(_) | Value::Bool(_)) => Ok(Some(scalar.to_string())),
            other => Err(DeployError::InvalidFieldError {
                field: field.to_string(),
                reason: format!("expected a string, found {}", other),
            }),
        }
    }

    fn render_tags(&self, value: &Option<Value>, context: &TemplateContext) -> Result<Vec<String>> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };

        let items = match self.renderer.render_value(value, context)? {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            single @ Value::String(_) => vec![single],
            other => {
                return Err(DeployError::InvalidFieldError {
                    field: "tags".to_string(),
                    reason: format!("expected a list, found {}", other),
                })
            }
        };

        items
            .into_iter()
            .flat_map(|item| match item {
                Value::Array(nested) => nested,
                other => vec![other],
            })
            .map(|item| match item {
                Value::String(s) => Ok(s),
                scalar @ (Value::Number(_) | Value::Bool(_)) => Ok(scalar.to_string()),
                other => Err(DeployError::InvalidFieldError {
                    field: "tags".to_string(),
                    reason: format!("tags must be strings, found {}", other),
                }),
            })
            .collect()
    }
}

/// `path/to/file.py:my_flow` → `my-flow`
pub fn derive_flow_name(entrypoint: &str) -> Result<String> {
    let invalid = || DeployError::InvalidFieldError {
        field: "entrypoint".to_string(),
        reason: format!("'{}' must have the form <path>:<flow function>", entrypoint),
    };

    let (path, object) = entrypoint.rsplit_once(':').ok_or_else(invalid)?;
    let object = object.trim();
    if path.trim().is_empty() || object.is_empty() {
        return Err(invalid());
    }

    Ok(object.replace('_', "-"))
}
