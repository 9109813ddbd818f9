use crate::core::template::{stringify, TemplateContext, TemplateRenderer};
use crate::domain::model::{StepSpec, ValueMap};
use crate::domain::ports::Step;
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

pub const RUN_SHELL_SCRIPT: &str = "flowdeploy.deployments.steps.run_shell_script";
pub const GIT_CLONE: &str = "flowdeploy.deployments.steps.git_clone";
pub const SET_WORKING_DIRECTORY: &str = "flowdeploy.deployments.steps.set_working_directory";

/// 步驟識別字 → 實作的固定對照表；未註冊的識別字直接失敗
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.identifiers())
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 內建步驟
    pub fn with_builtins() -> Self {
        Self::new()
            .with_step(RUN_SHELL_SCRIPT, RunShellScript)
            .with_step(GIT_CLONE, GitClone)
            .with_step(SET_WORKING_DIRECTORY, SetWorkingDirectory)
    }

    pub fn with_step(mut self, identifier: impl Into<String>, step: impl Step + 'static) -> Self {
        self.register(identifier, step);
        self
    }

    pub fn register(&mut self, identifier: impl Into<String>, step: impl Step + 'static) {
        self.steps.insert(identifier.into(), Arc::new(step));
    }

    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Step>> {
        self.steps
            .get(identifier)
            .cloned()
            .ok_or_else(|| DeployError::UnregisteredStepError {
                identifier: identifier.to_string(),
            })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.steps.contains_key(identifier)
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }
}

/// 依序執行步驟；每一步只看得到之前步驟的輸出，並在專案根目錄下執行
pub struct StepExecutor<'a> {
    registry: &'a StepRegistry,
    renderer: &'a TemplateRenderer,
    root: &'a Path,
}

impl<'a> StepExecutor<'a> {
    pub fn new(registry: &'a StepRegistry, renderer: &'a TemplateRenderer, root: &'a Path) -> Self {
        Self {
            registry,
            renderer,
            root,
        }
    }

    /// 執行步驟並把輸出併入 context，回傳渲染後的步驟定義
    pub async fn run(
        &self,
        steps: &[StepSpec],
        context: &mut TemplateContext,
    ) -> Result<Vec<StepSpec>> {
        let mut executed = Vec::with_capacity(steps.len());

        for (index, spec) in steps.iter().enumerate() {
            let step = self.registry.resolve(&spec.identifier)?;
            let inputs = self.renderer.render_map(&spec.inputs, context)?;

            tracing::debug!(
                "🔧 Step {}/{}: {} ({} inputs)",
                index + 1,
                steps.len(),
                spec.identifier,
                inputs.len()
            );

            let outputs = step.execute(&inputs, self.root).await.map_err(|e| match e {
                DeployError::StepExecutionError { .. } => e,
                other => DeployError::StepExecutionError {
                    identifier: spec.identifier.clone(),
                    message: other.to_string(),
                },
            })?;

            tracing::debug!(
                "✅ Step {} produced outputs: {:?}",
                spec.identifier,
                outputs.keys().collect::<Vec<_>>()
            );

            context.extend(outputs);
            executed.push(StepSpec::new(spec.identifier.clone(), inputs));
        }

        Ok(executed)
    }

    /// 只解析與渲染，不執行（pull 步驟在 flow run 時才由 worker 執行）
    pub fn render_only(&self, steps: &[StepSpec], context: &TemplateContext) -> Result<Vec<StepSpec>> {
        steps
            .iter()
            .map(|spec| {
                self.registry.resolve(&spec.identifier)?;
                let inputs = self.renderer.render_map(&spec.inputs, context)?;
                Ok(StepSpec::new(spec.identifier.clone(), inputs))
            })
            .collect()
    }
}

fn step_error(identifier: &str, message: impl Into<String>) -> DeployError {
    DeployError::StepExecutionError {
        identifier: identifier.to_string(),
        message: message.into(),
    }
}

fn required_str<'a>(inputs: &'a ValueMap, key: &str, identifier: &str) -> Result<&'a str> {
    inputs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| step_error(identifier, format!("missing string input '{}'", key)))
}

fn optional_str<'a>(inputs: &'a ValueMap, key: &str) -> Option<&'a str> {
    inputs.get(key).and_then(Value::as_str)
}

/// 相對路徑以 `workdir` 為基準，絕對路徑原樣使用
fn resolve_dir(workdir: &Path, directory: &str) -> PathBuf {
    let path = Path::new(directory);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

/// 每行一個指令，以 shell-words 切分後直接執行（不經過 shell）
pub struct RunShellScript;

#[async_trait]
impl Step for RunShellScript {
    async fn execute(&self, inputs: &ValueMap, workdir: &Path) -> Result<ValueMap> {
        let script = required_str(inputs, "script", RUN_SHELL_SCRIPT)?;
        let directory = optional_str(inputs, "directory")
            .map(|d| resolve_dir(workdir, d))
            .unwrap_or_else(|| workdir.to_path_buf());
        let env = inputs.get("env").and_then(Value::as_object);

        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();

        for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let argv = shell_words::split(line).map_err(|e| {
                step_error(RUN_SHELL_SCRIPT, format!("cannot parse '{}': {}", line, e))
            })?;
            let Some((program, args)) = argv.split_first() else {
                continue;
            };

            let mut command = tokio::process::Command::new(program);
            command.args(args).current_dir(&directory);
            if let Some(env) = env {
                for (key, value) in env {
                    command.env(key, stringify(value));
                }
            }

            tracing::info!("📦 Running: {}", line);
            let output = command.output().await.map_err(|e| {
                step_error(RUN_SHELL_SCRIPT, format!("failed to start '{}': {}", program, e))
            })?;

            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            if !output.status.success() {
                return Err(step_error(
                    RUN_SHELL_SCRIPT,
                    format!("'{}' exited with {}: {}", line, output.status, stderr),
                ));
            }

            if !stdout.is_empty() {
                stdout_lines.push(stdout);
            }
            if !stderr.is_empty() {
                stderr_lines.push(stderr);
            }
        }

        let mut outputs = ValueMap::new();
        outputs.insert("stdout".to_string(), Value::String(stdout_lines.join("\n")));
        outputs.insert("stderr".to_string(), Value::String(stderr_lines.join("\n")));
        Ok(outputs)
    }
}

pub struct GitClone;

impl GitClone {
    fn directory_for(repository: &str) -> String {
        repository
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(repository)
            .trim_end_matches(".git")
            .to_string()
    }

    fn authenticated_url(repository: &str, access_token: Option<&str>) -> Result<String> {
        let Some(token) = access_token else {
            return Ok(repository.to_string());
        };

        let mut url = Url::parse(repository)
            .map_err(|e| step_error(GIT_CLONE, format!("invalid repository URL: {}", e)))?;
        url.set_username(token)
            .map_err(|_| step_error(GIT_CLONE, "repository URL cannot carry credentials"))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Step for GitClone {
    async fn execute(&self, inputs: &ValueMap, workdir: &Path) -> Result<ValueMap> {
        let repository = required_str(inputs, "repository", GIT_CLONE)?;
        let branch = optional_str(inputs, "branch");
        let url = Self::authenticated_url(repository, optional_str(inputs, "access_token"))?;
        let directory = Self::directory_for(repository);

        let mut command = tokio::process::Command::new("git");
        command.args(["clone", "--depth", "1"]);
        if let Some(branch) = branch {
            command.args(["--branch", branch]);
        }
        command
            .arg(&url)
            .arg(resolve_dir(workdir, &directory))
            .current_dir(workdir);

        tracing::info!("📦 Cloning {} into {}", repository, workdir.join(&directory).display());
        let output = command
            .output()
            .await
            .map_err(|e| step_error(GIT_CLONE, format!("failed to start git: {}", e)))?;

        if !output.status.success() {
            return Err(step_error(
                GIT_CLONE,
                format!(
                    "git clone of {} failed: {}",
                    repository,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let mut outputs = ValueMap::new();
        outputs.insert("directory".to_string(), Value::String(directory));
        Ok(outputs)
    }
}

/// 只回報目錄，不改變行程的工作目錄
pub struct SetWorkingDirectory;

#[async_trait]
impl Step for SetWorkingDirectory {
    async fn execute(&self, inputs: &ValueMap, _workdir: &Path) -> Result<ValueMap> {
        let directory = required_str(inputs, "directory", SET_WORKING_DIRECTORY)?;

        let mut outputs = ValueMap::new();
        outputs.insert("directory".to_string(), Value::String(directory.to_string()));
        Ok(outputs)
    }
}
