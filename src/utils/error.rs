use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("{message}")]
    ConfigLoadError { path: String, message: String },

    #[error(
        "Discovered multiple deployments declared in deployment.yaml, but no name was given. \
         Please specify the name of at least one deployment to create or update. \
         ({count} deployments found)"
    )]
    AmbiguousSelectionError { count: usize },

    #[error(
        "Multiple deployment names were provided, but only one deployment was found in \
         deployment.yaml. Please provide a single deployment name."
    )]
    MultipleNamesError,

    #[error("Only one schedule type can be provided.")]
    ConflictingScheduleError,

    #[error("An anchor date can only be provided with an interval schedule")]
    AnchorWithoutIntervalError,

    #[error("Invalid schedule {field}: {reason}")]
    InvalidScheduleError { field: String, reason: String },

    #[error(
        "Received an entrypoint and a flow name for this deployment. Please provide either \
         an entrypoint or a flow name."
    )]
    ConflictingIdentifierError,

    #[error("An entrypoint or flow name must be provided.")]
    MissingTargetError,

    #[error("A deployment name must be provided.")]
    MissingNameError,

    #[error("Flow '{flow_name}' is not registered in this project")]
    FlowNotRegisteredError { flow_name: String },

    #[error(
        "A work pool is required to deploy this flow. Please specify a work pool name via \
         the '--pool' flag or in your deployment.yaml file."
    )]
    MissingWorkPoolError,

    #[error("Work pool '{name}' does not exist")]
    WorkPoolNotFoundError { name: String },

    #[error("Cannot create a project-style deployment with work pool of type '{pool_type}'.")]
    UnsupportedWorkPoolTypeError { name: String, pool_type: String },

    #[error("Step '{identifier}' is not registered")]
    UnregisteredStepError { identifier: String },

    #[error("Invalid step definition: {message}")]
    InvalidStepError { message: String },

    #[error("Unresolved placeholder '{{{{ {key} }}}}': no step produced an output named '{key}'")]
    UnresolvedPlaceholderError { key: String },

    #[error("Step '{identifier}' failed: {message}")]
    StepExecutionError { identifier: String, message: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidFieldError { field: String, reason: String },

    #[error("Deployment '{name}' not found")]
    DeploymentNotFoundError { name: String },

    #[error("Backend request failed with status {status}: {message}")]
    BackendError { status: u16, message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// 錯誤影響範圍：整個執行或單一部署
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Run,
    Deployment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Selection,
    Schedule,
    Target,
    WorkPool,
    Step,
    Template,
    Backend,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeployError {
    /// 執行層級錯誤會中止整個執行，其餘只算該部署失敗
    pub fn scope(&self) -> ErrorScope {
        match self {
            DeployError::ConfigLoadError { .. }
            | DeployError::AmbiguousSelectionError { .. }
            | DeployError::MultipleNamesError
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. } => ErrorScope::Run,
            _ => ErrorScope::Deployment,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::ConfigLoadError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. }
            | DeployError::InvalidFieldError { .. } => ErrorCategory::Config,
            DeployError::AmbiguousSelectionError { .. }
            | DeployError::MultipleNamesError
            | DeployError::MissingNameError => ErrorCategory::Selection,
            DeployError::ConflictingScheduleError
            | DeployError::AnchorWithoutIntervalError
            | DeployError::InvalidScheduleError { .. } => ErrorCategory::Schedule,
            DeployError::ConflictingIdentifierError
            | DeployError::MissingTargetError
            | DeployError::FlowNotRegisteredError { .. } => ErrorCategory::Target,
            DeployError::MissingWorkPoolError
            | DeployError::WorkPoolNotFoundError { .. }
            | DeployError::UnsupportedWorkPoolTypeError { .. } => ErrorCategory::WorkPool,
            DeployError::UnregisteredStepError { .. }
            | DeployError::InvalidStepError { .. }
            | DeployError::StepExecutionError { .. } => ErrorCategory::Step,
            DeployError::UnresolvedPlaceholderError { .. } => ErrorCategory::Template,
            DeployError::DeploymentNotFoundError { .. }
            | DeployError::BackendError { .. }
            | DeployError::ApiError(_) => ErrorCategory::Backend,
            DeployError::IoError(_) | DeployError::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Backend => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeployError::ConfigLoadError { message, .. } => message.clone(),
            DeployError::ApiError(e) if e.is_connect() => {
                "Could not reach the orchestration API".to_string()
            }
            DeployError::ApiError(e) if e.is_timeout() => {
                "The orchestration API did not answer in time".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DeployError::ConfigLoadError { path, .. } => {
                format!("Check that '{}' exists and is valid YAML or TOML", path)
            }
            DeployError::AmbiguousSelectionError { .. } => {
                "Pass --name <NAME> to pick a deployment, or --all to deploy every one".to_string()
            }
            DeployError::MultipleNamesError => "Pass a single --name".to_string(),
            DeployError::ConflictingScheduleError => {
                "Use only one of --cron, --interval or --rrule".to_string()
            }
            DeployError::AnchorWithoutIntervalError => {
                "Add --interval <SECONDS> or drop --anchor-date".to_string()
            }
            DeployError::InvalidScheduleError { field, .. } => {
                format!("Fix the schedule '{}' value", field)
            }
            DeployError::ConflictingIdentifierError => {
                "Remove either the entrypoint or the flow name".to_string()
            }
            DeployError::MissingTargetError => {
                "Pass an entrypoint such as ./flows/hello.py:my_flow, or --flow <NAME>".to_string()
            }
            DeployError::MissingNameError => "Pass --name <NAME>".to_string(),
            DeployError::FlowNotRegisteredError { .. } => {
                "Register the flow in .flowdeploy/flows.json or deploy it by entrypoint".to_string()
            }
            DeployError::MissingWorkPoolError | DeployError::WorkPoolNotFoundError { .. } => {
                "Pass --pool <NAME> with an existing work pool".to_string()
            }
            DeployError::UnsupportedWorkPoolTypeError { .. } => {
                "Choose a work pool served by workers instead of agents".to_string()
            }
            DeployError::UnregisteredStepError { .. } | DeployError::InvalidStepError { .. } => {
                "Check the step identifiers in the project manifest".to_string()
            }
            DeployError::UnresolvedPlaceholderError { .. } => {
                "Make sure an earlier build step produces this output".to_string()
            }
            DeployError::StepExecutionError { .. } => {
                "Inspect the step inputs and rerun with --verbose".to_string()
            }
            DeployError::InvalidFieldError { field, .. } => {
                format!("Fix the '{}' field of the deployment declaration", field)
            }
            DeployError::DeploymentNotFoundError { .. } => {
                "Check the flow and deployment names".to_string()
            }
            DeployError::BackendError { .. } | DeployError::ApiError(_) => {
                "Check the API URL and key in .flowdeploy/settings.toml".to_string()
            }
            DeployError::IoError(_) => "Check file permissions and paths".to_string(),
            DeployError::SerializationError(_) => {
                "Check that the document is well-formed JSON".to_string()
            }
            DeployError::ConfigValidationError { field, .. }
            | DeployError::InvalidConfigValueError { field, .. } => {
                format!("Fix the '{}' setting", field)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
