use crate::core::template::DEFAULT_BLOCK_NAMESPACE;
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:4200/api";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const SETTINGS_FILE: &str = ".flowdeploy/settings.toml";

/// `.flowdeploy/settings.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub templating: TemplatingSettings,
    #[serde(default)]
    pub prompts: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatingSettings {
    #[serde(default = "default_block_namespace")]
    pub block_namespace: String,
}

impl Default for TemplatingSettings {
    fn default() -> Self {
        Self {
            block_namespace: default_block_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default = "default_true")]
    pub interactive: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { interactive: true }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_block_namespace() -> String {
    DEFAULT_BLOCK_NAMESPACE.to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// 讀取設定檔；`explicit` 未指定且專案內沒有設定檔時使用預設值
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => project_root.join(SETTINGS_FILE),
        };

        let mut settings = if path.exists() {
            tracing::debug!("🔧 Loading settings from {}", path.display());
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(DeployError::ConfigLoadError {
                path: path.display().to_string(),
                message: format!("Settings file {} does not exist", path.display()),
            });
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            DeployError::ConfigLoadError { message, .. } => DeployError::ConfigLoadError {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let substituted = substitute_env_vars(content);
        toml::from_str(&substituted).map_err(|e| DeployError::ConfigLoadError {
            path: SETTINGS_FILE.to_string(),
            message: format!("Invalid settings: {}", e),
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLOWDEPLOY_API_URL") {
            if !url.trim().is_empty() {
                self.api.url = url;
            }
        }
        if let Ok(key) = std::env::var("FLOWDEPLOY_API_KEY") {
            if !key.trim().is_empty() {
                self.api.key = Some(key);
            }
        }
    }
}

/// `${VAR}` 換成環境變數；未定義的變數保留原文
fn substitute_env_vars(content: &str) -> String {
    let re = match Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("api.url", &self.api.url)?;
        validate_positive_number("api.timeout_seconds", self.api.timeout_seconds, 1)?;
        validate_non_empty_string("templating.block_namespace", &self.templating.block_namespace)?;

        if self.templating.block_namespace.contains('.') {
            return Err(DeployError::ConfigValidationError {
                field: "templating.block_namespace".to_string(),
                message: "namespace must be a single identifier without dots".to_string(),
            });
        }
        Ok(())
    }
}
