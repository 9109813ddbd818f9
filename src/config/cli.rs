use crate::domain::model::{CliOverrides, ScheduleFields, SelectionRequest, ValueMap};
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{parse_key_value, Validate};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "flowdeploy")]
#[command(about = "Create or update flow deployments from project configuration")]
pub struct DeployArgs {
    /// Flow entrypoint, e.g. ./flows/hello.py:my_flow
    #[arg(value_name = "ENTRYPOINT")]
    pub entrypoint: Option<String>,

    #[arg(short = 'f', long = "flow", value_name = "FLOW_NAME")]
    pub flow_name: Option<String>,

    /// Deployment name; repeat to select several declarations
    #[arg(short = 'n', long = "name")]
    pub names: Vec<String>,

    /// Deploy every declaration in deployment.yaml
    #[arg(long)]
    pub all: bool,

    #[arg(short = 'p', long)]
    pub pool: Option<String>,

    #[arg(short = 'q', long)]
    pub work_queue: Option<String>,

    /// Job variable override, KEY=VALUE
    #[arg(short = 'v', long = "variable", value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    #[arg(long)]
    pub version: Option<String>,

    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Parameter override, KEY=VALUE (value parsed as JSON when possible)
    #[arg(long = "param", value_name = "KEY=VALUE", conflicts_with = "params")]
    pub param: Vec<String>,

    /// Parameter overrides as a JSON object
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,

    #[arg(long)]
    pub cron: Option<String>,

    /// Interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    #[arg(long)]
    pub rrule: Option<String>,

    /// Interval anchor, RFC 3339 or YYYY-MM-DD
    #[arg(long)]
    pub anchor_date: Option<String>,

    #[arg(long)]
    pub timezone: Option<String>,

    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Never prompt, fail instead
    #[arg(long)]
    pub no_prompt: bool,

    /// Resolve everything but print the definitions instead of submitting
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl DeployArgs {
    pub fn schedule_fields(&self) -> ScheduleFields {
        ScheduleFields {
            cron: self.cron.clone(),
            interval: self.interval,
            anchor_date: self.anchor_date.clone(),
            timezone: self.timezone.clone(),
            rrule: self.rrule.clone(),
        }
    }

    pub fn parameters(&self) -> Result<ValueMap> {
        if let Some(raw) = &self.params {
            return match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(DeployError::InvalidConfigValueError {
                    field: "--params".to_string(),
                    value: raw.clone(),
                    reason: "Expected a JSON object".to_string(),
                }),
                Err(e) => Err(DeployError::InvalidConfigValueError {
                    field: "--params".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                }),
            };
        }

        collect_pairs("--param", &self.param)
    }

    pub fn overrides(&self) -> Result<CliOverrides> {
        Ok(CliOverrides {
            entrypoint: self.entrypoint.clone(),
            flow_name: self.flow_name.clone(),
            work_pool: self.pool.clone(),
            work_queue: self.work_queue.clone(),
            job_variables: collect_pairs("--variable", &self.variables)?,
            version: self.version.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            parameters: self.parameters()?,
            schedule: self.schedule_fields(),
        })
    }

    pub fn selection_request(&self) -> Result<SelectionRequest> {
        Ok(SelectionRequest::new(
            self.names.iter().cloned(),
            self.all,
            self.overrides()?,
        ))
    }
}

fn collect_pairs(field: &str, raw: &[String]) -> Result<ValueMap> {
    let mut map = ValueMap::new();
    for item in raw {
        let (key, value) = parse_key_value(field, item)?;
        map.insert(key, value);
    }
    Ok(map)
}

impl Validate for DeployArgs {
    fn validate(&self) -> Result<()> {
        for name in &self.names {
            if name.trim().is_empty() {
                return Err(DeployError::InvalidConfigValueError {
                    field: "--name".to_string(),
                    value: name.clone(),
                    reason: "Deployment names cannot be empty".to_string(),
                });
            }
        }

        if !self.project_dir.is_dir() {
            return Err(DeployError::InvalidConfigValueError {
                field: "--project-dir".to_string(),
                value: self.project_dir.display().to_string(),
                reason: "Not a directory".to_string(),
            });
        }

        Ok(())
    }
}
