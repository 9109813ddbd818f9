use crate::domain::model::{DeploymentDeclaration, ProjectManifest};
use crate::utils::error::{DeployError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILES: [&str; 3] = ["flowdeploy.yaml", "flowdeploy.yml", "flowdeploy.toml"];
pub const DECLARATION_FILES: [&str; 3] = ["deployment.yaml", "deployment.yml", "deployment.toml"];
pub const FLOW_REGISTRY_FILE: &str = ".flowdeploy/flows.json";

/// 一次執行所需的全部專案資料，載入後唯讀
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub manifest: ProjectManifest,
    pub declarations: Vec<DeploymentDeclaration>,
    /// flow 名稱 → entrypoint
    pub flows: HashMap<String, String>,
}

impl ProjectContext {
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let manifest_path = find_first(&root, &MANIFEST_FILES).ok_or_else(|| {
            DeployError::ConfigLoadError {
                path: root.join(MANIFEST_FILES[0]).display().to_string(),
                message: format!(
                    "We were unable to find a flowdeploy.yaml file in {}. To get started deploying flows please initialize a new project.",
                    root.display()
                ),
            }
        })?;
        let manifest = load_manifest(&manifest_path)?;
        // 步驟以此為工作目錄，轉成絕對路徑
        let root = root.canonicalize()?;

        let declarations = match find_first(&root, &DECLARATION_FILES) {
            Some(path) => load_declarations(&path)?,
            None => Vec::new(),
        };

        let flows = load_flow_registry(&root.join(FLOW_REGISTRY_FILE))?;

        tracing::debug!(
            "📦 Loaded project {}: {} build step(s), {} pull step(s), {} declaration(s), {} registered flow(s)",
            root.display(),
            manifest.build.len(),
            manifest.pull.len(),
            declarations.len(),
            flows.len()
        );

        Ok(Self {
            root,
            manifest,
            declarations,
            flows,
        })
    }

    pub fn entrypoint_for(&self, flow_name: &str) -> Option<&str> {
        self.flows.get(flow_name).map(String::as_str)
    }
}

fn find_first(root: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// YAML 或 TOML 轉成 `Value` 樹；空檔案為 `Null`
pub fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let load_error = |message: String| DeployError::ConfigLoadError {
        path: path.display().to_string(),
        message: format!("Unable to parse {}: {}", path.display(), message),
    };

    if content.trim().is_empty() {
        return Ok(Value::Null);
    }

    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    if is_toml {
        let table: toml::Table = toml::from_str(&content).map_err(|e| load_error(e.to_string()))?;
        serde_json::to_value(table).map_err(|e| load_error(e.to_string()))
    } else {
        serde_yaml_ng::from_str(&content).map_err(|e| load_error(e.to_string()))
    }
}

pub fn load_manifest(path: &Path) -> Result<ProjectManifest> {
    let document = read_document(path)?;
    if document.is_null() {
        return Ok(ProjectManifest::default());
    }

    serde_json::from_value(document).map_err(|e| DeployError::ConfigLoadError {
        path: path.display().to_string(),
        message: format!("Invalid project manifest {}: {}", path.display(), e),
    })
}

/// 單一宣告物件，或 `deployments:` 清單；空內容代表零個宣告
pub fn load_declarations(path: &Path) -> Result<Vec<DeploymentDeclaration>> {
    parse_declarations(read_document(path)?).map_err(|e| DeployError::ConfigLoadError {
        path: path.display().to_string(),
        message: format!("Invalid deployment declarations in {}: {}", path.display(), e),
    })
}

pub fn parse_declarations(document: Value) -> std::result::Result<Vec<DeploymentDeclaration>, serde_json::Error> {
    match document {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Object(mut map) if map.contains_key("deployments") => {
            match map.remove("deployments").unwrap_or(Value::Null) {
                Value::Null => Ok(Vec::new()),
                list => serde_json::from_value(list),
            }
        }
        single => serde_json::from_value(single).map(|declaration| vec![declaration]),
    }
}

fn load_flow_registry(path: &Path) -> Result<HashMap<String, String>> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}
