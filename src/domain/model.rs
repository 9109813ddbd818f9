use crate::utils::error::DeployError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type ValueMap = Map<String, Value>;

/// YAML 中的 `key: null` 視為預設值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// 單一步驟：`{ <identifier>: { <input>: <value>, ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct StepSpec {
    pub identifier: String,
    pub inputs: ValueMap,
}

impl StepSpec {
    pub fn new(identifier: impl Into<String>, inputs: ValueMap) -> Self {
        Self {
            identifier: identifier.into(),
            inputs,
        }
    }
}

impl TryFrom<Value> for StepSpec {
    type Error = DeployError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(DeployError::InvalidStepError {
                message: format!("expected a single-key mapping, found {}", value),
            });
        };

        if map.len() != 1 {
            return Err(DeployError::InvalidStepError {
                message: format!(
                    "expected exactly one step identifier, found {}",
                    map.len()
                ),
            });
        }

        let Some((identifier, inputs)) = map.into_iter().next() else {
            return Err(DeployError::InvalidStepError {
                message: "empty step definition".to_string(),
            });
        };

        let inputs = match inputs {
            Value::Object(inputs) => inputs,
            Value::Null => ValueMap::new(),
            other => {
                return Err(DeployError::InvalidStepError {
                    message: format!("inputs of '{}' must be a mapping, found {}", identifier, other),
                })
            }
        };

        Ok(Self { identifier, inputs })
    }
}

impl From<StepSpec> for Value {
    fn from(step: StepSpec) -> Self {
        let mut map = ValueMap::new();
        map.insert(step.identifier, Value::Object(step.inputs));
        Value::Object(map)
    }
}

/// 專案清單：build 與 pull 兩個階段的步驟
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub build: Vec<StepSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pull: Vec<StepSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkPoolRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub work_queue_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_variables: ValueMap,
}

/// 排程欄位的鬆散形式，檔案與 CLI 共用；驗證後才轉成 `ScheduleSpec`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleFields {
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub anchor_date: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub rrule: Option<String>,
}

impl ScheduleFields {
    pub fn is_empty(&self) -> bool {
        self == &ScheduleFields::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleSpec {
    Cron {
        cron: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    Interval {
        interval: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor_date: Option<NaiveDateTime>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    RRule {
        rrule: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
}

/// 部署宣告。可模板化的欄位保留為 `Value`，渲染後才轉型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDeclaration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub flow_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work_pool: WorkPoolRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: ValueMap,
    #[serde(default)]
    pub schedule: Option<ScheduleFields>,
    #[serde(default)]
    pub pull: Option<Vec<StepSpec>>,
}

impl DeploymentDeclaration {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| "<unnamed deployment>".to_string())
    }
}

/// 送往後端的完整部署定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    pub name: String,
    pub flow_name: String,
    pub entrypoint: String,
    pub work_pool_name: String,
    #[serde(default)]
    pub work_queue_name: Option<String>,
    #[serde(default)]
    pub job_variables: ValueMap,
    #[serde(default)]
    pub parameters: ValueMap,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default)]
    pub pull_steps: Vec<StepSpec>,
}

impl DeploymentDefinition {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.flow_name, self.name)
    }
}

/// 後端回傳的權威定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDeployment {
    pub id: String,
    #[serde(flatten)]
    pub definition: DeploymentDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPool {
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: String,
}

/// CLI 逐欄位覆寫
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub entrypoint: Option<String>,
    pub flow_name: Option<String>,
    pub work_pool: Option<String>,
    pub work_queue: Option<String>,
    pub job_variables: ValueMap,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub parameters: ValueMap,
    pub schedule: ScheduleFields,
}

impl CliOverrides {
    pub fn is_empty(&self) -> bool {
        self == &CliOverrides::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRequest {
    pub names: Vec<String>,
    pub all: bool,
    pub overrides: CliOverrides,
}

impl SelectionRequest {
    /// 名稱去重，保留第一次出現的順序
    pub fn new(names: impl IntoIterator<Item = String>, all: bool, overrides: CliOverrides) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        Self {
            names: unique,
            all,
            overrides,
        }
    }
}
